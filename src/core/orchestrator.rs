//! The backup run state machine.
//!
//! A single control flow walks the configured volumes in order and, within each
//! mounted volume, its top-level directories in order. The admission window is
//! checked before every directory, and the checkpoint is persisted after every
//! completed directory and every exhausted or skipped volume.

use anyhow::{Context, Result};
use std::path::PathBuf;
use tracing::{Instrument, debug, info, info_span, warn};
use uuid::Uuid;

use crate::context::AppContext;
use crate::core::admission::AdmissionController;
use crate::core::hardware::resolve_volumes;
use crate::core::job_builder::{build_jobs, top_level_directories};
use crate::core::models::{BatchReport, Checkpoint, CopyStatus, RunSummary};
use crate::core::pool::WorkerPool;
use crate::core::report::DirectoryReport;
use crate::core::worker::VerifiedCopyWorker;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunState {
    Idle,
    WaitingForWindow,
    ResolvingVolumes,
    ProcessingDirectory,
    AdvancingCheckpoint,
    Done,
}

/// The mounted volume currently being worked through.
struct VolumeCursor {
    volume_id: String,
    directories: Vec<PathBuf>,
}

pub struct Orchestrator {
    ctx: AppContext,
    admission: AdmissionController,
    pool: WorkerPool,
    run_id: String,
    state: RunState,
}

impl Orchestrator {
    pub fn new(ctx: AppContext) -> Self {
        let admission = AdmissionController::new(
            ctx.config.admission_window(),
            ctx.config.poll_interval(),
            ctx.clock.clone(),
        );
        let worker = VerifiedCopyWorker::new(ctx.engine.clone(), ctx.config.retry_policy());

        Self {
            ctx,
            admission,
            pool: WorkerPool::new(worker),
            run_id: Uuid::now_v7().to_string(),
            state: RunState::Idle,
        }
    }

    pub fn run_id(&self) -> &str {
        &self.run_id
    }

    pub fn state(&self) -> RunState {
        self.state
    }

    /// Drive the state machine to `Done`.
    ///
    /// Per-file failures are reported, never returned as errors. Errors come
    /// only from checkpoint persistence, volume resolution, listing a mounted
    /// volume, or the report writer; progress recorded before the error is kept.
    pub async fn run(&mut self) -> Result<RunSummary> {
        let mut checkpoint = self.load_checkpoint().await?;
        let mut summary = RunSummary::default();
        let mut cursor: Option<VolumeCursor> = None;
        let mut admitted = false;

        info!(
            run_id = %self.run_id,
            dry_run = self.ctx.run.dry_run,
            volume_index = checkpoint.volume_index,
            directory_index = checkpoint.directory_index,
            "Starting backup run"
        );

        loop {
            match self.state {
                RunState::Idle => {
                    if checkpoint.volume_index >= self.ctx.config.volumes.len() {
                        self.transition(RunState::Done);
                    } else {
                        self.transition(RunState::WaitingForWindow);
                    }
                }

                RunState::WaitingForWindow => {
                    self.admission
                        .wait_until_allowed(self.ctx.run.force_admission)
                        .await;
                    admitted = true;
                    if cursor.is_some() {
                        self.transition(RunState::ProcessingDirectory);
                    } else {
                        self.transition(RunState::ResolvingVolumes);
                    }
                }

                RunState::ResolvingVolumes => {
                    let Some(volume_id) = self.ctx.config.volumes.get(checkpoint.volume_index).cloned()
                    else {
                        self.transition(RunState::Done);
                        continue;
                    };

                    let Some(mount_path) = self.resolve_mount(&volume_id).await? else {
                        warn!(volume = %volume_id, "Volume not mounted, skipping");
                        summary.volumes_skipped += 1;
                        checkpoint.advance_volume();
                        self.persist(&checkpoint).await?;
                        continue;
                    };

                    let directories = self.list_directories(mount_path.clone()).await?;
                    info!(
                        volume = %volume_id,
                        mount_path = %mount_path.display(),
                        directories = directories.len(),
                        start_at = checkpoint.directory_index,
                        "Volume resolved"
                    );

                    if checkpoint.directory_index >= directories.len() {
                        debug!(volume = %volume_id, "Volume has no remaining directories");
                        checkpoint.advance_volume();
                        self.persist(&checkpoint).await?;
                        continue;
                    }

                    cursor = Some(VolumeCursor {
                        volume_id,
                        directories,
                    });
                    if admitted {
                        self.transition(RunState::ProcessingDirectory);
                    } else {
                        self.transition(RunState::WaitingForWindow);
                    }
                }

                RunState::ProcessingDirectory => {
                    admitted = false;
                    let Some(current) = cursor.as_ref() else {
                        self.transition(RunState::ResolvingVolumes);
                        continue;
                    };
                    let source_dir = current.directories[checkpoint.directory_index].clone();
                    let volume_id = current.volume_id.clone();

                    let report = self.process_directory(&volume_id, source_dir).await?;
                    summary.record(&report.batch);
                    self.transition(RunState::AdvancingCheckpoint);
                }

                RunState::AdvancingCheckpoint => {
                    checkpoint.advance_directory();
                    self.persist(&checkpoint).await?;

                    let remaining = cursor
                        .as_ref()
                        .is_some_and(|c| checkpoint.directory_index < c.directories.len());
                    if remaining {
                        self.transition(RunState::WaitingForWindow);
                    } else {
                        checkpoint.advance_volume();
                        self.persist(&checkpoint).await?;
                        cursor = None;
                        self.transition(RunState::ResolvingVolumes);
                    }
                }

                RunState::Done => break,
            }
        }

        info!(
            run_id = %self.run_id,
            directories = summary.directories_processed,
            verified = summary.verified,
            simulated = summary.simulated,
            failed = summary.failed,
            volumes_skipped = summary.volumes_skipped,
            "Backup run complete"
        );
        Ok(summary)
    }

    fn transition(&mut self, next: RunState) {
        debug!(from = ?self.state, to = ?next, "State transition");
        self.state = next;
    }

    async fn load_checkpoint(&self) -> Result<Checkpoint> {
        let store = self.ctx.checkpoints.clone();
        let checkpoint = tokio::task::spawn_blocking(move || store.load())
            .await?
            .context("Failed to load checkpoint")?;
        Ok(checkpoint)
    }

    async fn persist(&self, checkpoint: &Checkpoint) -> Result<()> {
        let store = self.ctx.checkpoints.clone();
        let checkpoint = *checkpoint;
        tokio::task::spawn_blocking(move || store.save(&checkpoint))
            .await?
            .context("Failed to persist checkpoint")?;
        Ok(())
    }

    async fn resolve_mount(&self, volume_id: &str) -> Result<Option<PathBuf>> {
        let resolver = self.ctx.resolver.clone();
        let ids = vec![volume_id.to_string()];
        let volumes = tokio::task::spawn_blocking(move || resolve_volumes(resolver.as_ref(), &ids))
            .await?
            .with_context(|| format!("Failed to resolve mount for volume {}", volume_id))?;
        Ok(volumes.into_iter().next().and_then(|v| v.mount_path))
    }

    async fn list_directories(&self, mount_path: PathBuf) -> Result<Vec<PathBuf>> {
        let listed = tokio::task::spawn_blocking({
            let mount_path = mount_path.clone();
            move || top_level_directories(&mount_path)
        })
        .await?;
        listed.with_context(|| format!("Failed to list {}", mount_path.display()))
    }

    async fn process_directory(&self, volume_id: &str, source_dir: PathBuf) -> Result<DirectoryReport> {
        let dry_run = self.ctx.run.dry_run;
        let run_date = self.ctx.clock.now().format("%Y-%m-%d").to_string();
        let span = info_span!(
            "backup_directory",
            volume = %volume_id,
            directory = %source_dir.display()
        );

        async {
            info!(
                dry_run,
                "{}",
                if dry_run { "Simulating directory" } else { "Backing up directory" }
            );

            let jobs = tokio::task::spawn_blocking({
                let source_dir = source_dir.clone();
                let destination_root = self.ctx.config.destination_root.clone();
                let run_date = run_date.clone();
                move || build_jobs(&source_dir, &destination_root, &run_date, dry_run)
            })
            .await?;

            let batch: BatchReport = self
                .pool
                .run(jobs, self.ctx.run.max_parallel_workers)
                .await;

            let report = DirectoryReport {
                run_id: self.run_id.clone(),
                run_date,
                dry_run,
                volume_id: volume_id.to_string(),
                source_dir: source_dir.clone(),
                batch,
            };
            self.ctx
                .reports
                .publish(&report)
                .await
                .with_context(|| format!("Failed to publish report for {}", source_dir.display()))?;

            info!(
                files = report.batch.len(),
                failed = report.batch.count(CopyStatus::Failed),
                "Directory complete"
            );
            Ok::<_, anyhow::Error>(report)
        }
        .instrument(span)
        .await
    }
}
