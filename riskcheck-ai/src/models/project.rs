//! Project pipeline state machine
//!
//! A project moves `created → analyzing → {completed | failed}`. Starting
//! while `analyzing` is a conflict; starting from a terminal state is a
//! restart and resets the step table.

use crate::error::{PipelineError, PipelineResult};
use crate::types::MediaType;
use chrono::{DateTime, Utc};
use riskcheck_common::events::StepName;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;
use uuid::Uuid;

/// Characters of a step preview kept in the store
pub const PREVIEW_LIMIT: usize = 300;

/// Project lifecycle status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProjectStatus {
    Created,
    Analyzing,
    Completed,
    Failed,
}

impl ProjectStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, ProjectStatus::Completed | ProjectStatus::Failed)
    }
}

/// Per-step status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StepStatus {
    Pending,
    Running,
    Completed,
}

/// Pipeline state of one project
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineState {
    pub status: ProjectStatus,
    pub step_status: BTreeMap<StepName, StepStatus>,
    pub current_iteration: usize,
    pub total_iterations: usize,
}

impl Default for PipelineState {
    fn default() -> Self {
        Self {
            status: ProjectStatus::Created,
            step_status: pending_steps(),
            current_iteration: 0,
            total_iterations: 0,
        }
    }
}

fn pending_steps() -> BTreeMap<StepName, StepStatus> {
    StepName::ALL
        .iter()
        .map(|step| (*step, StepStatus::Pending))
        .collect()
}

/// Latest output recorded for a step
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StepPayload {
    /// Human-readable preview, truncated to [`PREVIEW_LIMIT`] characters
    pub preview: String,
    pub data: serde_json::Value,
}

/// Parameters for a new project
#[derive(Debug, Clone)]
pub struct NewProject {
    pub title: String,
    pub media_path: PathBuf,
    pub media_type: MediaType,
    /// Parent of the per-project workspace directories
    pub projects_dir: PathBuf,
}

/// Project record held by the project store
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Project {
    pub id: Uuid,
    pub title: String,
    pub media_path: PathBuf,
    pub file_name: String,
    pub media_type: MediaType,
    /// Artifact directory, `<projects_dir>/<id>`
    pub workspace_dir: PathBuf,
    pub state: PipelineState,
    /// Completed steps / total steps, 0.0 - 1.0
    pub progress: f64,
    pub logs: Vec<String>,
    pub payloads: BTreeMap<StepName, StepPayload>,
    pub final_report: Option<serde_json::Value>,
    pub failure_reason: Option<String>,
    pub created_at: DateTime<Utc>,
    pub last_updated: DateTime<Utc>,
    pub analysis_started_at: Option<DateTime<Utc>>,
    pub analysis_completed_at: Option<DateTime<Utc>>,
    pub analysis_duration_seconds: Option<f64>,
}

impl Project {
    pub fn new(id: Uuid, params: NewProject) -> Self {
        let now = Utc::now();
        let file_name = params
            .media_path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        Self {
            id,
            title: params.title,
            media_path: params.media_path,
            file_name,
            media_type: params.media_type,
            workspace_dir: params.projects_dir.join(id.to_string()),
            state: PipelineState::default(),
            progress: 0.0,
            logs: vec!["Project created".to_string()],
            payloads: BTreeMap::new(),
            final_report: None,
            failure_reason: None,
            created_at: now,
            last_updated: now,
            analysis_started_at: None,
            analysis_completed_at: None,
            analysis_duration_seconds: None,
        }
    }

    fn touch(&mut self, now: DateTime<Utc>, log: String) {
        self.logs.push(log);
        self.last_updated = now;
    }

    fn record_duration(&mut self, now: DateTime<Utc>) {
        self.analysis_completed_at = Some(now);
        self.analysis_duration_seconds = self
            .analysis_started_at
            .map(|started| ((now - started).num_milliseconds() as f64 / 1000.0).max(0.0));
    }

    fn recompute_progress(&mut self) {
        let completed = self
            .state
            .step_status
            .values()
            .filter(|s| **s == StepStatus::Completed)
            .count();
        self.progress = completed as f64 / StepName::ALL.len() as f64;
    }

    /// Transition into `analyzing`
    pub fn start(&mut self, now: DateTime<Utc>) -> PipelineResult<()> {
        if self.state.status == ProjectStatus::Analyzing {
            return Err(PipelineError::Conflict(format!(
                "project {} is already analyzing",
                self.id
            )));
        }
        self.state = PipelineState {
            status: ProjectStatus::Analyzing,
            ..PipelineState::default()
        };
        self.progress = 0.0;
        self.final_report = None;
        self.failure_reason = None;
        self.analysis_started_at = Some(now);
        self.analysis_completed_at = None;
        self.analysis_duration_seconds = None;
        self.touch(now, "Analysis pipeline started".to_string());
        Ok(())
    }

    fn require_analyzing(&self, operation: &str) -> PipelineResult<()> {
        if self.state.status != ProjectStatus::Analyzing {
            return Err(PipelineError::Store(format!(
                "{} requires an analyzing project (status: {:?})",
                operation, self.state.status
            )));
        }
        Ok(())
    }

    pub fn step_running(&mut self, step: StepName, now: DateTime<Utc>) -> PipelineResult<()> {
        self.require_analyzing("mark_step_running")?;
        self.state.step_status.insert(step, StepStatus::Running);
        self.touch(now, format!("{} started", step));
        Ok(())
    }

    pub fn step_completed(
        &mut self,
        step: StepName,
        preview: &str,
        data: serde_json::Value,
        now: DateTime<Utc>,
    ) -> PipelineResult<()> {
        self.require_analyzing("update_status")?;
        self.state.step_status.insert(step, StepStatus::Completed);
        self.payloads.insert(
            step,
            StepPayload {
                preview: preview.chars().take(PREVIEW_LIMIT).collect(),
                data,
            },
        );
        self.recompute_progress();
        self.touch(now, format!("{} completed", step));
        Ok(())
    }

    pub fn set_iteration(&mut self, current: usize, total: usize, now: DateTime<Utc>) -> PipelineResult<()> {
        self.require_analyzing("update_iteration")?;
        if current > total {
            return Err(PipelineError::Store(format!(
                "iteration {} exceeds total {}",
                current, total
            )));
        }
        self.state.current_iteration = current;
        self.state.total_iterations = total;
        self.last_updated = now;
        Ok(())
    }

    pub fn complete(&mut self, final_report: serde_json::Value, now: DateTime<Utc>) -> PipelineResult<()> {
        self.require_analyzing("mark_completed")?;
        self.state.status = ProjectStatus::Completed;
        self.progress = 1.0;
        self.final_report = Some(final_report);
        self.record_duration(now);
        self.touch(now, "Analysis pipeline completed".to_string());
        Ok(())
    }

    /// Transition into `failed`; allowed from any state
    pub fn fail(&mut self, reason: &str, now: DateTime<Utc>) {
        self.state.status = ProjectStatus::Failed;
        self.failure_reason = Some(reason.to_string());
        self.record_duration(now);
        self.touch(now, format!("Analysis pipeline failed: {}", reason));
    }
}
