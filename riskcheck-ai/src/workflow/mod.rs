//! Per-project analysis workflow
//!
//! - [`store`]: project state records behind the [`ProjectStore`] contract
//! - [`artifacts`]: text / JSON snapshots of every stage
//! - [`report`]: step previews and the final report document
//! - [`pipeline`]: the orchestrator driving one project from `created` to a
//!   terminal state

pub mod artifacts;
pub mod pipeline;
pub mod report;
pub mod store;

pub use pipeline::{AnalysisPipeline, PipelineConfig};
pub use report::FinalReport;
pub use store::{InMemoryProjectStore, ProjectStore};
