//! Analysis pipeline orchestrator
//!
//! One project runs as one sequential task:
//! 1. Extraction (transcription, OCR, visual analysis) twice, then one run
//!    selected per step
//! 2. Risk judgement `total_iterations` times over the selected outputs
//! 3. Heuristic screening and risk consensus (burn risk included)
//! 4. Artifacts, final report, `completed`
//!
//! Per-step service failures never reach this level: the judgement adapter
//! turns them into fallback values. Anything that does fail here (store,
//! artifact IO, serialization, a panic inside a run) marks the project
//! `failed`, which leaves it restartable.

use crate::config::Settings;
use crate::error::{PipelineError, PipelineResult};
use crate::fusion::extraction_selector::{
    select_text, select_visual, Selection, SelectionMethod, SelectorConfig,
};
use crate::fusion::{aggregate_judged, score_burn_risk, MergePolicy};
use crate::judge::JudgementAdapter;
use crate::models::Project;
use crate::screener::{self, ScreenerConfig};
use crate::types::{
    ExtractionResult, ExtractionSource, Judged, MediaType, RiskAssessmentResult, VisualExtraction,
};
use crate::workflow::artifacts::{
    run_file_name, ArtifactWriter, FINAL_REPORT_FILE, OCR_FILE, RISK_ASSESSMENT_FILE,
    TRANSCRIPTION_FILE, VIDEO_ANALYSIS_FILE,
};
use crate::workflow::report::{
    build_final_report, format_ocr, format_risk, format_transcript, format_visual, FinalReport,
    IterationRecord, ReportFiles, SelectedOutputs,
};
use crate::workflow::store::ProjectStore;
use chrono::Utc;
use futures::FutureExt;
use riskcheck_common::events::{EventBus, PipelineEvent, StepName};
use serde_json::json;
use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::{error, info, warn};
use uuid::Uuid;

/// Extraction steps run this many times before selection
pub const EXTRACTION_RUNS: usize = 2;

pub const IMAGE_TRANSCRIPTION_NOTE: &str = "Still image: speech transcription skipped.";
pub const IMAGE_VISUAL_NOTE: &str = "Still image analysed as a single frame.";
pub const STUB_VISUAL_NOTE: &str =
    "No API key configured: visual analysis returned a stub result.";

/// Orchestration parameters
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PipelineConfig {
    pub total_iterations: usize,
    pub merge_policy: MergePolicy,
    pub screener: ScreenerConfig,
    pub selector: SelectorConfig,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            total_iterations: 3,
            merge_policy: MergePolicy::default(),
            screener: ScreenerConfig::default(),
            selector: SelectorConfig::default(),
        }
    }
}

impl From<&Settings> for PipelineConfig {
    fn from(settings: &Settings) -> Self {
        Self {
            total_iterations: settings.total_iterations,
            merge_policy: settings.merge_policy,
            screener: settings.screener,
            selector: settings.selector,
        }
    }
}

/// Outputs of one extraction pass
#[derive(Debug, Clone)]
struct ExtractionRun {
    transcript: ExtractionResult,
    ocr: ExtractionResult,
    visual: VisualExtraction,
}

/// Drives projects through the analysis pipeline
pub struct AnalysisPipeline {
    store: Arc<dyn ProjectStore>,
    adapter: JudgementAdapter,
    config: PipelineConfig,
    events: EventBus,
}

impl AnalysisPipeline {
    pub fn new(
        store: Arc<dyn ProjectStore>,
        adapter: JudgementAdapter,
        config: PipelineConfig,
        events: EventBus,
    ) -> Self {
        Self {
            store,
            adapter,
            config,
            events,
        }
    }

    pub fn store(&self) -> &Arc<dyn ProjectStore> {
        &self.store
    }

    pub fn events(&self) -> &EventBus {
        &self.events
    }

    /// Run the pipeline for one project to completion
    ///
    /// A conflict or unknown project is returned without touching the
    /// project; any later error marks it `failed` before being returned.
    pub async fn run(&self, project_id: Uuid) -> PipelineResult<FinalReport> {
        let project = self.begin(project_id).await?;
        self.run_started(project).await
    }

    /// Start the pipeline on a background task
    ///
    /// The `analyzing` transition happens before this returns, so a second
    /// call for the same project reports a conflict immediately.
    pub async fn spawn(
        self: Arc<Self>,
        project_id: Uuid,
    ) -> PipelineResult<JoinHandle<PipelineResult<FinalReport>>> {
        let project = self.begin(project_id).await?;
        Ok(tokio::spawn(async move { self.run_started(project).await }))
    }

    async fn begin(&self, project_id: Uuid) -> PipelineResult<Project> {
        let project = self.store.mark_started(project_id).await?;
        info!(
            project_id = %project_id,
            media_type = ?project.media_type,
            iterations = self.config.total_iterations,
            policy = self.config.merge_policy.name(),
            "Analysis pipeline started"
        );
        self.events.emit_lossy(PipelineEvent::PipelineStarted {
            project_id,
            timestamp: Utc::now(),
        });
        Ok(project)
    }

    async fn run_started(&self, project: Project) -> PipelineResult<FinalReport> {
        let project_id = project.id;
        let outcome = AssertUnwindSafe(self.execute(&project))
            .catch_unwind()
            .await
            .unwrap_or_else(|payload| Err(PipelineError::Internal(panic_message(&*payload))));
        match outcome {
            Ok(report) => Ok(report),
            Err(e) => {
                self.handle_failure(project_id, &e).await;
                Err(e)
            }
        }
    }

    async fn handle_failure(&self, project_id: Uuid, failure: &PipelineError) {
        let reason = failure.to_string();
        error!(project_id = %project_id, error = %reason, "Analysis pipeline failed");

        if let Err(e) = self.store.mark_failed(project_id, &reason).await {
            error!(project_id = %project_id, error = %e, "Failed to record pipeline failure");
        }
        self.events.emit_lossy(PipelineEvent::PipelineFailed {
            project_id,
            reason,
            timestamp: Utc::now(),
        });
    }

    async fn execute(&self, project: &Project) -> PipelineResult<FinalReport> {
        let project_id = project.id;
        let total = self.config.total_iterations.max(1);
        self.store.update_iteration(project_id, 0, total).await?;

        let artifacts = ArtifactWriter::create(&project.workspace_dir).await?;

        // Extraction
        let mut runs = Vec::with_capacity(EXTRACTION_RUNS);
        for run in 1..=EXTRACTION_RUNS {
            runs.push(self.extraction_run(project, &artifacts, run).await?);
        }
        let (first, second) = (&runs[0], &runs[1]);

        let transcript_choice = match project.media_type {
            MediaType::Image => Selection {
                run: 1,
                method: SelectionMethod::Skipped,
            },
            MediaType::Video => {
                select_text(
                    &self.adapter,
                    "transcription",
                    &first.transcript,
                    &second.transcript,
                    &self.config.selector,
                )
                .await
            }
        };
        let transcript = transcript_choice.pick(&first.transcript, &second.transcript);
        let transcript_path = artifacts.write_text(TRANSCRIPTION_FILE, &transcript.text).await?;
        self.record_selection(
            project_id,
            StepName::Transcription,
            transcript_choice,
            &format_transcript(&transcript.text),
            json!({
                "transcript": transcript.text,
                "source": transcript.source,
                "note": transcript.note,
                "file_path": transcript_path,
            }),
        )
        .await?;

        let ocr_choice = select_text(
            &self.adapter,
            "OCR",
            &first.ocr,
            &second.ocr,
            &self.config.selector,
        )
        .await;
        let ocr = ocr_choice.pick(&first.ocr, &second.ocr);
        let ocr_path = artifacts.write_text(OCR_FILE, &ocr.text).await?;
        self.record_selection(
            project_id,
            StepName::Ocr,
            ocr_choice,
            &format_ocr(&ocr.text),
            json!({
                "ocr_text": ocr.text,
                "source": ocr.source,
                "note": ocr.note,
                "file_path": ocr_path,
            }),
        )
        .await?;

        let visual_choice = select_visual(
            &self.adapter,
            &first.visual.result,
            &second.visual.result,
            &self.config.selector,
        )
        .await;
        let visual = visual_choice.pick(&first.visual, &second.visual);
        let visual_path = artifacts.write_json(VIDEO_ANALYSIS_FILE, &visual.result).await?;
        self.record_selection(
            project_id,
            StepName::VisualAnalysis,
            visual_choice,
            &format_visual(&visual.result),
            json!({
                "raw": visual.result,
                "source": visual.source,
                "note": visual.note,
                "file_path": visual_path,
            }),
        )
        .await?;

        // Risk judgement
        let taxonomy = &self.adapter.reference().taxonomy;
        let mut judged_runs: Vec<Judged<RiskAssessmentResult>> = Vec::with_capacity(total);
        for iteration in 1..=total {
            self.store.update_iteration(project_id, iteration, total).await?;
            self.events.emit_lossy(PipelineEvent::IterationStarted {
                project_id,
                current: iteration,
                total,
            });
            self.step_started(project_id, StepName::RiskIntegration, iteration)
                .await?;

            let judged = self
                .adapter
                .judge_risk(&transcript.text, &ocr.text, &visual.result)
                .await
                .map(|mut result| {
                    result.burn_risk = Some(score_burn_risk(&result.tags, taxonomy));
                    result
                });
            if let Some(note) = judged.note() {
                warn!(project_id = %project_id, iteration, note, "Risk judgement fell back");
            }
            artifacts
                .write_json(&run_file_name(RISK_ASSESSMENT_FILE, iteration), judged.value())
                .await?;

            self.step_finished(
                project_id,
                StepName::RiskIntegration,
                iteration,
                judged.is_fallback(),
            );
            self.events.emit_lossy(PipelineEvent::IterationCompleted {
                project_id,
                current: iteration,
                total,
            });
            info!(
                project_id = %project_id,
                iteration,
                total,
                social = %judged.value().social.grade,
                legal = %judged.value().legal.grade,
                "Risk judgement iteration completed"
            );
            judged_runs.push(judged);
        }

        // Consensus
        let reference = self.adapter.reference();
        let candidates = screener::screen(
            reference,
            transcript.evidence_text(),
            ocr.evidence_text(),
            &self.config.screener,
        );
        let merged = aggregate_judged(
            &judged_runs,
            &candidates,
            self.config.merge_policy,
            &reference.taxonomy,
        )
        .map_err(|e| PipelineError::Internal(e.to_string()))?;

        let risk_path = artifacts.write_json(RISK_ASSESSMENT_FILE, &merged).await?;
        self.store
            .update_status(
                project_id,
                StepName::RiskIntegration,
                &format_risk(&merged),
                json!({
                    "risk": merged,
                    "runs": judged_runs.len(),
                    "fallback_runs": judged_runs.iter().filter(|r| r.is_fallback()).count(),
                    "screener_candidates": candidates.len(),
                    "merge_policy": self.config.merge_policy.name(),
                    "file_path": risk_path,
                }),
            )
            .await?;

        // Report
        let iterations = judged_runs
            .iter()
            .enumerate()
            .map(|(i, judged)| IterationRecord {
                index: i + 1,
                transcription: runs.get(i).map(|r| r.transcript.text.clone()),
                ocr: runs.get(i).map(|r| r.ocr.text.clone()),
                video_analysis: runs.get(i).map(|r| r.visual.result.clone()),
                risk: judged.value().clone(),
            })
            .collect();

        let report = build_final_report(
            SelectedOutputs {
                transcript: &transcript.text,
                transcription_source: transcript.source,
                transcription_note: transcript.note.clone(),
                ocr_text: &ocr.text,
                ocr_note: ocr.note.clone(),
                visual: &visual.result,
                video_note: visual.note.clone(),
            },
            ReportFiles {
                transcription: transcript_path,
                ocr: ocr_path,
                video_analysis: visual_path,
                risk_assessment: risk_path,
            },
            merged,
            iterations,
        );

        artifacts.write_json(FINAL_REPORT_FILE, &report).await?;
        self.store
            .mark_completed(project_id, serde_json::to_value(&report)?)
            .await?;

        info!(
            project_id = %project_id,
            social = %report.risk.social.grade,
            legal = %report.risk.legal.grade,
            tags = report.risk.tags.len(),
            "Analysis pipeline completed"
        );
        self.events.emit_lossy(PipelineEvent::PipelineCompleted {
            project_id,
            timestamp: Utc::now(),
        });
        Ok(report)
    }

    async fn extraction_run(
        &self,
        project: &Project,
        artifacts: &ArtifactWriter,
        run: usize,
    ) -> PipelineResult<ExtractionRun> {
        let project_id = project.id;
        let media = project.media_path.as_path();

        self.step_started(project_id, StepName::Transcription, run).await?;
        let transcript = match project.media_type {
            MediaType::Image => {
                info!(project_id = %project_id, run, "Skipping transcription for still image");
                ExtractionResult::skipped("", IMAGE_TRANSCRIPTION_NOTE)
            }
            MediaType::Video => ExtractionResult::from_judged(
                self.adapter.transcribe(media, project.media_type).await,
            ),
        };
        artifacts
            .write_text(&run_file_name(TRANSCRIPTION_FILE, run), &transcript.text)
            .await?;
        self.step_finished(
            project_id,
            StepName::Transcription,
            run,
            transcript.source == ExtractionSource::Fallback,
        );

        self.step_started(project_id, StepName::Ocr, run).await?;
        let ocr = ExtractionResult::from_judged(self.adapter.ocr(media, project.media_type).await);
        artifacts
            .write_text(&run_file_name(OCR_FILE, run), &ocr.text)
            .await?;
        self.step_finished(
            project_id,
            StepName::Ocr,
            run,
            ocr.source == ExtractionSource::Fallback,
        );

        self.step_started(project_id, StepName::VisualAnalysis, run).await?;
        let mut visual = VisualExtraction::from_judged(
            self.adapter.analyze_visual(media, project.media_type).await,
        );
        if visual.note.is_none() {
            if visual.result.is_stub() {
                info!(project_id = %project_id, run, "Visual analysis returned a stub result");
                visual.note = Some(STUB_VISUAL_NOTE.to_string());
            } else if project.media_type == MediaType::Image {
                visual.note = Some(IMAGE_VISUAL_NOTE.to_string());
            }
        }
        artifacts
            .write_json(&run_file_name(VIDEO_ANALYSIS_FILE, run), &visual.result)
            .await?;
        self.step_finished(
            project_id,
            StepName::VisualAnalysis,
            run,
            visual.source == ExtractionSource::Fallback,
        );

        Ok(ExtractionRun {
            transcript,
            ocr,
            visual,
        })
    }

    async fn step_started(&self, project_id: Uuid, step: StepName, run: usize) -> PipelineResult<()> {
        self.store.mark_step_running(project_id, step).await?;
        self.events.emit_lossy(PipelineEvent::StepStarted {
            project_id,
            step,
            run,
        });
        Ok(())
    }

    fn step_finished(&self, project_id: Uuid, step: StepName, run: usize, fallback: bool) {
        self.events.emit_lossy(PipelineEvent::StepCompleted {
            project_id,
            step,
            run,
            fallback,
        });
    }

    async fn record_selection(
        &self,
        project_id: Uuid,
        step: StepName,
        selection: Selection,
        preview: &str,
        mut data: serde_json::Value,
    ) -> PipelineResult<()> {
        if let Some(fields) = data.as_object_mut() {
            fields.insert("selected_run".to_string(), json!(selection.run));
            fields.insert("selection_method".to_string(), json!(selection.method));
        }
        self.store
            .update_status(project_id, step, preview, data)
            .await?;
        info!(
            project_id = %project_id,
            step = %step,
            run = selection.run,
            method = ?selection.method,
            "Extraction run selected"
        );
        self.events.emit_lossy(PipelineEvent::ExtractionSelected {
            project_id,
            step,
            selected_run: selection.run,
            arbitrated: selection.arbitrated(),
        });
        Ok(())
    }
}

/// Failure reason for a panic caught on the pipeline task
fn panic_message(payload: &(dyn Any + Send)) -> String {
    let detail = payload
        .downcast_ref::<&str>()
        .map(|s| s.to_string())
        .or_else(|| payload.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "unknown panic payload".to_string());
    format!("pipeline panicked: {}", detail)
}
