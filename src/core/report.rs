//! Per-directory result reports.

use anyhow::{Context, Result};
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use tracing::info;

use crate::core::models::BatchReport;

/// Everything the report writer needs about one processed directory.
#[derive(Debug, Clone)]
pub struct DirectoryReport {
    pub run_id: String,
    pub run_date: String,
    pub dry_run: bool,
    pub volume_id: String,
    pub source_dir: PathBuf,
    pub batch: BatchReport,
}

impl DirectoryReport {
    pub fn tag(&self) -> &'static str {
        if self.dry_run { "dry_run" } else { "backup" }
    }

    /// Plain text: a date header, a blank line, then `STATUS: file` per result.
    pub fn render_text(&self) -> String {
        let lines: String = self
            .batch
            .results
            .iter()
            .map(|result| {
                format!(
                    "{}: {}\n",
                    result.status.as_str().to_uppercase(),
                    result.file.display()
                )
            })
            .collect();
        format!("Backup Date: {}\n\n{}", self.run_date, lines)
    }

    /// Structured list of `{file, status}` objects.
    pub fn render_json(&self) -> Result<String> {
        serde_json::to_string_pretty(&self.batch.results).context("Failed to serialize report")
    }
}

/// Receives each directory's results once its batch has fully drained.
#[async_trait]
pub trait ReportSink: Send + Sync {
    async fn publish(&self, report: &DirectoryReport) -> Result<()>;
}

/// Writes `<tag>_<date>_<volume>_<dir>.txt` and `.json` into a log directory.
pub struct FileReportSink {
    log_dir: PathBuf,
}

impl FileReportSink {
    pub fn new(log_dir: impl Into<PathBuf>) -> Self {
        Self {
            log_dir: log_dir.into(),
        }
    }

    pub fn paths_for(&self, report: &DirectoryReport) -> (PathBuf, PathBuf) {
        let dir_name = report
            .source_dir
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "root".to_string());
        let stem = format!(
            "{}_{}_{}_{}",
            report.tag(),
            report.run_date,
            report.volume_id,
            dir_name
        );
        (
            self.log_dir.join(format!("{}.txt", stem)),
            self.log_dir.join(format!("{}.json", stem)),
        )
    }
}

#[async_trait]
impl ReportSink for FileReportSink {
    async fn publish(&self, report: &DirectoryReport) -> Result<()> {
        let (txt_path, json_path) = self.paths_for(report);
        let text = report.render_text();
        let json = report.render_json()?;
        let log_dir = self.log_dir.clone();

        tokio::task::spawn_blocking(move || write_pair(&log_dir, &txt_path, &text, &json_path, &json))
            .await??;

        info!(
            run_id = %report.run_id,
            directory = %report.source_dir.display(),
            "Report written"
        );
        Ok(())
    }
}

fn write_pair(log_dir: &Path, txt_path: &Path, text: &str, json_path: &Path, json: &str) -> Result<()> {
    std::fs::create_dir_all(log_dir)
        .with_context(|| format!("Failed to create log directory {}", log_dir.display()))?;
    std::fs::write(txt_path, text)
        .with_context(|| format!("Failed to write {}", txt_path.display()))?;
    std::fs::write(json_path, json)
        .with_context(|| format!("Failed to write {}", json_path.display()))?;
    Ok(())
}

/// Keeps reports in memory.
#[derive(Clone, Default)]
pub struct MemoryReportSink {
    reports: Arc<Mutex<Vec<DirectoryReport>>>,
}

impl MemoryReportSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn reports(&self) -> Vec<DirectoryReport> {
        self.reports
            .lock()
            .map(|r| r.clone())
            .unwrap_or_default()
    }
}

#[async_trait]
impl ReportSink for MemoryReportSink {
    async fn publish(&self, report: &DirectoryReport) -> Result<()> {
        self.reports
            .lock()
            .map_err(|_| anyhow::anyhow!("report store poisoned"))?
            .push(report.clone());
        Ok(())
    }
}
