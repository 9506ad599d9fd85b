//! Artifact sink
//!
//! Every stage's output is written under the project workspace as UTF-8
//! text or pretty-printed JSON. Per-run snapshots carry a `.runN` infix;
//! the selected / merged outputs use the bare names.

use crate::error::PipelineResult;
use serde::Serialize;
use std::path::{Path, PathBuf};
use tracing::debug;

pub const TRANSCRIPTION_FILE: &str = "transcription.txt";
pub const OCR_FILE: &str = "ocr.txt";
pub const VIDEO_ANALYSIS_FILE: &str = "video_analysis.json";
pub const RISK_ASSESSMENT_FILE: &str = "risk_assessment.json";
pub const FINAL_REPORT_FILE: &str = "final_report.json";

/// `transcription.txt` + run 2 → `transcription.run2.txt`
pub fn run_file_name(base: &str, run: usize) -> String {
    match base.rsplit_once('.') {
        Some((stem, ext)) => format!("{}.run{}.{}", stem, run, ext),
        None => format!("{}.run{}", base, run),
    }
}

/// Writes artifacts into one project workspace
#[derive(Debug, Clone)]
pub struct ArtifactWriter {
    dir: PathBuf,
}

impl ArtifactWriter {
    /// Create the workspace directory (and parents) if missing
    pub async fn create(dir: impl Into<PathBuf>) -> PipelineResult<Self> {
        let dir = dir.into();
        tokio::fs::create_dir_all(&dir).await?;
        Ok(Self { dir })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub async fn write_text(&self, name: &str, content: &str) -> PipelineResult<PathBuf> {
        let path = self.dir.join(name);
        tokio::fs::write(&path, content).await?;
        debug!(path = %path.display(), bytes = content.len(), "Artifact written");
        Ok(path)
    }

    pub async fn write_json<T: Serialize + ?Sized>(&self, name: &str, value: &T) -> PipelineResult<PathBuf> {
        let json = serde_json::to_string_pretty(value)?;
        self.write_text(name, &json).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_run_file_name() {
        assert_eq!(run_file_name(TRANSCRIPTION_FILE, 1), "transcription.run1.txt");
        assert_eq!(run_file_name(RISK_ASSESSMENT_FILE, 3), "risk_assessment.run3.json");
        assert_eq!(run_file_name("notes", 2), "notes.run2");
    }

    #[tokio::test]
    async fn test_writes_into_nested_workspace() {
        let root = TempDir::new().unwrap();
        let writer = ArtifactWriter::create(root.path().join("projects").join("p1"))
            .await
            .unwrap();

        let text = writer.write_text(OCR_FILE, "※ 個人の感想です").await.unwrap();
        assert_eq!(std::fs::read_to_string(text).unwrap(), "※ 個人の感想です");

        let json = writer
            .write_json(VIDEO_ANALYSIS_FILE, &serde_json::json!({"summary": "s"}))
            .await
            .unwrap();
        let parsed: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(json).unwrap()).unwrap();
        assert_eq!(parsed["summary"], "s");
    }
}
