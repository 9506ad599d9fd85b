//! Data models for riskcheck-ai projects
//!
//! - [`project`]: project record and pipeline state machine

pub mod project;

pub use project::{NewProject, PipelineState, Project, ProjectStatus, StepPayload, StepStatus};
