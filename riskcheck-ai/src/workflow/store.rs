//! Project store
//!
//! [`ProjectStore`] is the contract the orchestrator drives. The in-memory
//! implementation guards each project record with its own mutex, so every
//! read-modify-write on a project's pipeline state is serialised while
//! different projects never contend.

use crate::error::{PipelineError, PipelineResult};
use crate::models::{NewProject, Project};
use async_trait::async_trait;
use chrono::Utc;
use riskcheck_common::events::StepName;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{Mutex, RwLock};
use tracing::debug;
use uuid::Uuid;

/// Project lifecycle operations used by the pipeline
#[async_trait]
pub trait ProjectStore: Send + Sync {
    async fn create_project(&self, params: NewProject) -> PipelineResult<Project>;

    async fn get_project(&self, id: Uuid) -> PipelineResult<Project>;

    /// All projects, most recently updated first
    async fn list_projects(&self) -> Vec<Project>;

    /// Enter `analyzing`; a project already analyzing is a conflict
    async fn mark_started(&self, id: Uuid) -> PipelineResult<Project>;

    async fn mark_step_running(&self, id: Uuid, step: StepName) -> PipelineResult<()>;

    /// Mark a step completed and record its preview and data
    async fn update_status(
        &self,
        id: Uuid,
        step: StepName,
        preview: &str,
        data: serde_json::Value,
    ) -> PipelineResult<()>;

    async fn update_iteration(&self, id: Uuid, current: usize, total: usize) -> PipelineResult<()>;

    async fn mark_completed(&self, id: Uuid, final_report: serde_json::Value) -> PipelineResult<()>;

    async fn mark_failed(&self, id: Uuid, reason: &str) -> PipelineResult<()>;
}

/// In-memory project store
#[derive(Debug, Default)]
pub struct InMemoryProjectStore {
    projects: RwLock<HashMap<Uuid, Arc<Mutex<Project>>>>,
}

impl InMemoryProjectStore {
    pub fn new() -> Self {
        Self::default()
    }

    async fn handle(&self, id: Uuid) -> PipelineResult<Arc<Mutex<Project>>> {
        self.projects
            .read()
            .await
            .get(&id)
            .cloned()
            .ok_or(PipelineError::NotFound(id))
    }

    /// Apply `update` to one project under its lock
    async fn with_project<T, F>(&self, id: Uuid, update: F) -> PipelineResult<T>
    where
        F: FnOnce(&mut Project) -> PipelineResult<T> + Send,
        T: Send,
    {
        let handle = self.handle(id).await?;
        let mut project = handle.lock().await;
        update(&mut project)
    }
}

#[async_trait]
impl ProjectStore for InMemoryProjectStore {
    async fn create_project(&self, params: NewProject) -> PipelineResult<Project> {
        let project = Project::new(Uuid::new_v4(), params);
        debug!(project_id = %project.id, title = %project.title, "Project created");
        self.projects
            .write()
            .await
            .insert(project.id, Arc::new(Mutex::new(project.clone())));
        Ok(project)
    }

    async fn get_project(&self, id: Uuid) -> PipelineResult<Project> {
        let handle = self.handle(id).await?;
        let project = handle.lock().await.clone();
        Ok(project)
    }

    async fn list_projects(&self) -> Vec<Project> {
        let handles: Vec<_> = self.projects.read().await.values().cloned().collect();
        let mut projects = Vec::with_capacity(handles.len());
        for handle in handles {
            projects.push(handle.lock().await.clone());
        }
        projects.sort_by(|a, b| b.last_updated.cmp(&a.last_updated));
        projects
    }

    async fn mark_started(&self, id: Uuid) -> PipelineResult<Project> {
        self.with_project(id, |project| {
            project.start(Utc::now())?;
            Ok(project.clone())
        })
        .await
    }

    async fn mark_step_running(&self, id: Uuid, step: StepName) -> PipelineResult<()> {
        self.with_project(id, |project| project.step_running(step, Utc::now()))
            .await
    }

    async fn update_status(
        &self,
        id: Uuid,
        step: StepName,
        preview: &str,
        data: serde_json::Value,
    ) -> PipelineResult<()> {
        self.with_project(id, |project| {
            project.step_completed(step, preview, data, Utc::now())
        })
        .await
    }

    async fn update_iteration(&self, id: Uuid, current: usize, total: usize) -> PipelineResult<()> {
        self.with_project(id, |project| project.set_iteration(current, total, Utc::now()))
            .await
    }

    async fn mark_completed(&self, id: Uuid, final_report: serde_json::Value) -> PipelineResult<()> {
        self.with_project(id, |project| project.complete(final_report, Utc::now()))
            .await
    }

    async fn mark_failed(&self, id: Uuid, reason: &str) -> PipelineResult<()> {
        self.with_project(id, |project| {
            project.fail(reason, Utc::now());
            Ok(())
        })
        .await
    }
}
