use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;

/// A removable volume, as reported by the mount resolver.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Volume {
    pub id: String,
    pub mount_path: Option<PathBuf>,
}

/// Options fixed for the lifetime of a single run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunConfig {
    pub dry_run: bool,
    pub max_parallel_workers: usize,
    pub force_admission: bool,
}

/// Two-level resume cursor: which volume, and which top-level directory inside it.
///
/// Serialized with the field names of the original state file so existing
/// checkpoints keep working.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Checkpoint {
    #[serde(rename = "drive_index")]
    pub volume_index: usize,
    #[serde(rename = "dir_index")]
    pub directory_index: usize,
}

impl Checkpoint {
    pub fn new(volume_index: usize, directory_index: usize) -> Self {
        Self {
            volume_index,
            directory_index,
        }
    }

    /// Mark the current directory as complete.
    pub fn advance_directory(&mut self) {
        self.directory_index += 1;
    }

    /// Move on to the next volume, starting at its first directory.
    pub fn advance_volume(&mut self) {
        self.volume_index += 1;
        self.directory_index = 0;
    }
}

/// One file to copy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CopyJob {
    pub source: PathBuf,
    pub destination: PathBuf,
    pub dry_run: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CopyStatus {
    Verified,
    Simulated,
    Failed,
}

impl CopyStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Verified => "verified",
            Self::Simulated => "simulated",
            Self::Failed => "failed",
        }
    }
}

impl fmt::Display for CopyStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outcome of a single [`CopyJob`]. Produced exactly once per job.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CopyResult {
    pub file: PathBuf,
    pub status: CopyStatus,
    /// Copy attempts made; zero for simulated jobs.
    #[serde(skip)]
    pub attempts: u32,
}

impl CopyResult {
    pub fn simulated(file: PathBuf) -> Self {
        Self {
            file,
            status: CopyStatus::Simulated,
            attempts: 0,
        }
    }

    pub fn verified(file: PathBuf, attempts: u32) -> Self {
        Self {
            file,
            status: CopyStatus::Verified,
            attempts,
        }
    }

    pub fn failed(file: PathBuf, attempts: u32) -> Self {
        Self {
            file,
            status: CopyStatus::Failed,
            attempts,
        }
    }
}

/// Results for one batch, in the order the jobs were submitted.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BatchReport {
    pub results: Vec<CopyResult>,
}

impl BatchReport {
    pub fn len(&self) -> usize {
        self.results.len()
    }

    pub fn is_empty(&self) -> bool {
        self.results.is_empty()
    }

    pub fn count(&self, status: CopyStatus) -> usize {
        self.results.iter().filter(|r| r.status == status).count()
    }

    pub fn statuses(&self) -> Vec<CopyStatus> {
        self.results.iter().map(|r| r.status).collect()
    }
}

/// Totals for a whole run, returned by the orchestrator once it reaches `Done`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub directories_processed: usize,
    pub volumes_skipped: usize,
    pub verified: usize,
    pub simulated: usize,
    pub failed: usize,
}

impl RunSummary {
    pub fn record(&mut self, report: &BatchReport) {
        self.directories_processed += 1;
        self.verified += report.count(CopyStatus::Verified);
        self.simulated += report.count(CopyStatus::Simulated);
        self.failed += report.count(CopyStatus::Failed);
    }
}
