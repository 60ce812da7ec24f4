#![allow(dead_code)]

use async_trait::async_trait;
use chrono::{DateTime, Local, TimeZone};
use drivemirror::adapters::StaticResolver;
use drivemirror::config::AppConfig;
use drivemirror::context::AppContext;
use drivemirror::core::{Clock, MemoryReportSink, RunConfig};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Clock that only moves when slept on.
pub struct FakeClock {
    now: Mutex<DateTime<Local>>,
    pub sleeps: Mutex<u32>,
}

impl FakeClock {
    pub fn at_hour(hour: u32) -> Arc<Self> {
        let now = Local
            .with_ymd_and_hms(2024, 5, 1, hour, 0, 0)
            .single()
            .unwrap();
        Arc::new(Self {
            now: Mutex::new(now),
            sleeps: Mutex::new(0),
        })
    }

    /// Jump to `hour:00` on the current day without sleeping.
    pub fn set_hour(&self, hour: u32) {
        let mut now = self.now.lock().unwrap();
        *now = now
            .date_naive()
            .and_hms_opt(hour, 0, 0)
            .and_then(|t| Local.from_local_datetime(&t).single())
            .unwrap();
    }

    pub fn sleep_count(&self) -> u32 {
        *self.sleeps.lock().unwrap()
    }
}

#[async_trait]
impl Clock for FakeClock {
    fn now(&self) -> DateTime<Local> {
        *self.now.lock().unwrap()
    }

    async fn sleep(&self, duration: Duration) {
        *self.sleeps.lock().unwrap() += 1;
        let mut now = self.now.lock().unwrap();
        *now += chrono::Duration::from_std(duration).unwrap();
    }
}

pub fn create_file(path: &Path, content: &[u8]) {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).unwrap();
    }
    std::fs::write(path, content).unwrap();
}

/// Create `dirs` top-level directories under `mount`, each holding two files.
pub fn populate_volume(mount: &Path, dirs: &[&str]) {
    for dir in dirs {
        create_file(&mount.join(dir).join("a.txt"), format!("{} a", dir).as_bytes());
        create_file(
            &mount.join(dir).join("sub/b.txt"),
            format!("{} b", dir).as_bytes(),
        );
    }
}

pub struct Harness {
    pub root: PathBuf,
    pub config: AppConfig,
    pub resolver: StaticResolver,
    pub clock: Arc<FakeClock>,
    pub reports: MemoryReportSink,
}

impl Harness {
    pub fn new(root: &Path, volumes: &[&str]) -> Self {
        let config = AppConfig {
            volumes: volumes.iter().map(|v| v.to_string()).collect(),
            destination_root: root.join("backup"),
            state_file: root.join("state/backup_state.json"),
            log_dir: root.join("logs"),
            retry_backoff_ms: 0,
            max_parallel_workers: 4,
            ..AppConfig::default()
        };

        Self {
            root: root.to_path_buf(),
            config,
            resolver: StaticResolver::default(),
            clock: FakeClock::at_hour(5),
            reports: MemoryReportSink::new(),
        }
    }

    /// Mount a fixture directory as `volume_id` and return its path.
    pub fn mount(&mut self, volume_id: &str) -> PathBuf {
        let path = self.root.join("media").join(volume_id);
        std::fs::create_dir_all(&path).unwrap();
        self.resolver = std::mem::take(&mut self.resolver).with_mount(volume_id, &path);
        path
    }

    pub fn context(&self, dry_run: bool, force: bool) -> AppContext {
        let run = RunConfig {
            dry_run,
            max_parallel_workers: self.config.max_parallel_workers,
            force_admission: force,
        };
        AppContext::new(self.config.clone(), run)
            .with_resolver(Arc::new(self.resolver.clone()))
            .with_clock(self.clock.clone())
            .with_reports(Arc::new(self.reports.clone()))
    }

    pub fn reported_dirs(&self) -> Vec<String> {
        self.reports
            .reports()
            .iter()
            .map(|r| {
                r.source_dir
                    .file_name()
                    .unwrap()
                    .to_string_lossy()
                    .into_owned()
            })
            .collect()
    }
}

/// Every file under `root`, relative and sorted, with its contents.
pub fn snapshot(root: &Path) -> Vec<(PathBuf, Vec<u8>)> {
    let mut out = Vec::new();
    if !root.exists() {
        return out;
    }
    let mut stack = vec![root.to_path_buf()];
    while let Some(dir) = stack.pop() {
        for entry in std::fs::read_dir(&dir).unwrap() {
            let path = entry.unwrap().path();
            if path.is_dir() {
                out.push((path.strip_prefix(root).unwrap().to_path_buf(), Vec::new()));
                stack.push(path);
            } else {
                out.push((
                    path.strip_prefix(root).unwrap().to_path_buf(),
                    std::fs::read(&path).unwrap(),
                ));
            }
        }
    }
    out.sort();
    out
}
