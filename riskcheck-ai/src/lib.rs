//! riskcheck-ai library interface
//!
//! Social and legal risk analysis for advertising media: extraction through
//! a generative judgement service, heuristic screening against a risk
//! taxonomy, multi-run consensus and burn-risk scoring.

pub mod config;
pub mod error;
pub mod fusion;
pub mod judge;
pub mod models;
pub mod screener;
pub mod taxonomy;
pub mod types;
pub mod workflow;

pub use crate::error::{PipelineError, PipelineResult};
