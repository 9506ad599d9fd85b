//! Event types for pipeline progress reporting

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use tokio::sync::broadcast;
use tracing::{debug, warn};
use uuid::Uuid;

/// Pipeline step names, in execution order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepName {
    /// Speech transcription (skipped for still images)
    Transcription,
    /// On-screen text extraction
    Ocr,
    /// Scene / composition analysis
    VisualAnalysis,
    /// Risk judgement runs plus consensus
    RiskIntegration,
}

impl StepName {
    /// All steps in execution order
    pub const ALL: [StepName; 4] = [
        StepName::Transcription,
        StepName::Ocr,
        StepName::VisualAnalysis,
        StepName::RiskIntegration,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            StepName::Transcription => "transcription",
            StepName::Ocr => "ocr",
            StepName::VisualAnalysis => "visual_analysis",
            StepName::RiskIntegration => "risk_integration",
        }
    }
}

impl fmt::Display for StepName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Pipeline events broadcast to observers
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum PipelineEvent {
    /// Project entered `analyzing`
    PipelineStarted {
        project_id: Uuid,
        timestamp: DateTime<Utc>,
    },

    /// A step began executing (extraction steps fire once per run)
    StepStarted {
        project_id: Uuid,
        step: StepName,
        /// Extraction run (1 or 2) or judgement iteration
        run: usize,
    },

    /// A step produced its output
    StepCompleted {
        project_id: Uuid,
        step: StepName,
        run: usize,
        /// True when the step returned a fallback value
        fallback: bool,
    },

    /// The extraction selector picked one of two runs
    ExtractionSelected {
        project_id: Uuid,
        step: StepName,
        selected_run: usize,
        arbitrated: bool,
    },

    /// A risk judgement iteration started
    IterationStarted {
        project_id: Uuid,
        current: usize,
        total: usize,
    },

    /// A risk judgement iteration finished
    IterationCompleted {
        project_id: Uuid,
        current: usize,
        total: usize,
    },

    /// Project reached `completed`
    PipelineCompleted {
        project_id: Uuid,
        timestamp: DateTime<Utc>,
    },

    /// Project reached `failed`
    PipelineFailed {
        project_id: Uuid,
        reason: String,
        timestamp: DateTime<Utc>,
    },
}

/// Broadcast bus for pipeline events
///
/// Cloning shares the underlying channel.
#[derive(Debug, Clone)]
pub struct EventBus {
    tx: broadcast::Sender<PipelineEvent>,
    capacity: usize,
}

impl EventBus {
    /// Creates a new EventBus with specified channel capacity
    ///
    /// * `capacity` - Number of events to buffer before lagging receivers drop old events
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx, capacity }
    }

    /// Subscribe to all future events
    ///
    /// Events emitted before subscription are not received.
    pub fn subscribe(&self) -> broadcast::Receiver<PipelineEvent> {
        self.tx.subscribe()
    }

    /// Emit an event to all subscribers
    ///
    /// Returns `Err` if no subscribers are listening.
    #[allow(clippy::result_large_err)]
    pub fn emit(
        &self,
        event: PipelineEvent,
    ) -> Result<usize, broadcast::error::SendError<PipelineEvent>> {
        self.tx.send(event)
    }

    /// Emit an event, ignoring if no subscribers are listening
    pub fn emit_lossy(&self, event: PipelineEvent) {
        let _ = self.tx.send(event);
    }

    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

/// Log events at debug level until every sender is dropped
///
/// A lagging receiver skips the overwritten events and keeps going.
/// Returns the number of events logged.
pub async fn log_events(mut rx: broadcast::Receiver<PipelineEvent>) -> usize {
    let mut logged = 0;
    loop {
        match rx.recv().await {
            Ok(event) => {
                debug!(?event, "Pipeline event");
                logged += 1;
            }
            Err(broadcast::error::RecvError::Lagged(skipped)) => {
                warn!(skipped, "Event logger lagged, skipping events");
            }
            Err(broadcast::error::RecvError::Closed) => break,
        }
    }
    logged
}
