//! Job builder -> worker pool -> verified copy, without the orchestrator.

mod common;

use common::create_file;
use drivemirror::core::job_builder::build_jobs;
use drivemirror::core::transfer_engine::{CopyEngine, NativeCopyEngine};
use drivemirror::core::{CopyStatus, RetryPolicy, VerifiedCopyWorker, WorkerPool, digest};
use std::collections::HashMap;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tempfile::tempdir;

/// Corrupts the first `n` copies of selected files, then copies faithfully.
struct FlakyEngine {
    corrupt: HashMap<String, u32>,
    attempts: Mutex<HashMap<PathBuf, u32>>,
}

impl FlakyEngine {
    fn new(corrupt: &[(&str, u32)]) -> Self {
        Self {
            corrupt: corrupt.iter().map(|(n, c)| (n.to_string(), *c)).collect(),
            attempts: Mutex::new(HashMap::new()),
        }
    }

    fn attempts_for(&self, source: &Path) -> u32 {
        self.attempts.lock().unwrap().get(source).copied().unwrap_or(0)
    }
}

impl CopyEngine for FlakyEngine {
    fn copy_file(&self, source: &Path, destination: &Path) -> io::Result<u64> {
        let attempt = {
            let mut attempts = self.attempts.lock().unwrap();
            let count = attempts.entry(source.to_path_buf()).or_insert(0);
            *count += 1;
            *count
        };

        let name = source.file_name().unwrap().to_string_lossy().into_owned();
        let corrupt_for = self.corrupt.get(&name).copied().unwrap_or(0);
        if attempt <= corrupt_for {
            std::fs::write(destination, b"garbage")?;
            return Ok(7);
        }
        NativeCopyEngine { sync_files: false }.copy_file(source, destination)
    }
}

fn pool_with(engine: Arc<dyn CopyEngine>) -> WorkerPool {
    WorkerPool::new(VerifiedCopyWorker::new(
        engine,
        RetryPolicy {
            limit: 3,
            backoff: Duration::ZERO,
        },
    ))
}

#[tokio::test]
async fn test_transient_mismatch_recovers_within_retry_budget() {
    let temp = tempdir().unwrap();
    let src = temp.path().join("card/DCIM");
    create_file(&src.join("file1.jpg"), b"one");
    create_file(&src.join("file2.jpg"), b"two");
    create_file(&src.join("file3.jpg"), b"three");

    let jobs = build_jobs(&src, &temp.path().join("backup"), "2024-05-01", false);
    assert_eq!(jobs.len(), 3);

    let engine = Arc::new(FlakyEngine::new(&[("file2.jpg", 2)]));
    let report = pool_with(engine.clone()).run(jobs.clone(), 3).await;

    assert_eq!(
        report.statuses(),
        vec![CopyStatus::Verified, CopyStatus::Verified, CopyStatus::Verified]
    );
    assert_eq!(engine.attempts_for(&src.join("file1.jpg")), 1);
    assert_eq!(engine.attempts_for(&src.join("file2.jpg")), 3);
    assert_eq!(report.results[1].attempts, 3);

    for job in &jobs {
        assert_eq!(digest(&job.source).unwrap(), digest(&job.destination).unwrap());
    }
}

#[tokio::test]
async fn test_persistent_mismatch_stops_after_exactly_three_attempts() {
    let temp = tempdir().unwrap();
    let src = temp.path().join("card/DCIM");
    create_file(&src.join("bad.jpg"), b"bad");
    create_file(&src.join("good.jpg"), b"good");

    let jobs = build_jobs(&src, &temp.path().join("backup"), "2024-05-01", false);
    let engine = Arc::new(FlakyEngine::new(&[("bad.jpg", u32::MAX)]));
    let report = pool_with(engine.clone()).run(jobs.clone(), 2).await;

    assert_eq!(report.statuses(), vec![CopyStatus::Failed, CopyStatus::Verified]);
    assert_eq!(engine.attempts_for(&src.join("bad.jpg")), 3);
    assert!(!jobs[0].destination.exists());
}

#[tokio::test]
async fn test_report_order_matches_walk_order_at_any_parallelism() {
    let temp = tempdir().unwrap();
    let src = temp.path().join("card/DCIM");
    for i in 0..20 {
        create_file(&src.join(format!("dir{}/f{:02}.bin", i % 3, i)), &vec![i as u8; 1024 * (i + 1)]);
    }
    let jobs = build_jobs(&src, &temp.path().join("backup"), "2024-05-01", false);
    let expected: Vec<PathBuf> = jobs.iter().map(|j| j.destination.clone()).collect();

    for parallelism in [1, 3, 20, 64] {
        let report = pool_with(Arc::new(NativeCopyEngine::default()))
            .run(jobs.clone(), parallelism)
            .await;
        let files: Vec<PathBuf> = report.results.iter().map(|r| r.file.clone()).collect();
        assert_eq!(files, expected, "parallelism {}", parallelism);
        assert_eq!(report.count(CopyStatus::Verified), 20);
    }
}
