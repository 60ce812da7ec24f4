//! Verified copy of a single file with bounded retry.

use std::fmt;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

use crate::core::models::{CopyJob, CopyResult};
use crate::core::transfer_engine::{CopyEngine, is_device_removed_error};
use crate::core::verifier::{self, HashError};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total copy attempts per file, including the first.
    pub limit: u32,
    pub backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            limit: 3,
            backoff: Duration::from_secs(1),
        }
    }
}

/// Why one attempt did not produce a verified copy.
enum AttemptFailure {
    Copy(std::io::Error),
    Hash(HashError),
    Mismatch,
}

impl AttemptFailure {
    fn device_removed(&self) -> bool {
        match self {
            Self::Copy(e) => is_device_removed_error(e),
            Self::Hash(e) => is_device_removed_error(e.io_error()),
            Self::Mismatch => false,
        }
    }
}

impl fmt::Display for AttemptFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Copy(e) => write!(f, "copy failed: {}", e),
            Self::Hash(e) => write!(f, "{}", e),
            Self::Mismatch => f.write_str("hash mismatch"),
        }
    }
}

/// Copies one file and confirms the copy by comparing content digests.
///
/// `execute` never fails: every error path resolves to a `failed` result once
/// the retry budget is spent.
#[derive(Clone)]
pub struct VerifiedCopyWorker {
    engine: Arc<dyn CopyEngine>,
    retry: RetryPolicy,
}

impl VerifiedCopyWorker {
    pub fn new(engine: Arc<dyn CopyEngine>, retry: RetryPolicy) -> Self {
        Self { engine, retry }
    }

    /// Blocking; call from a blocking thread.
    pub fn execute(&self, job: &CopyJob) -> CopyResult {
        if job.dry_run {
            return CopyResult::simulated(job.destination.clone());
        }

        let limit = self.retry.limit.max(1);
        for attempt in 1..=limit {
            match self.attempt(&job.source, &job.destination) {
                Ok(()) => {
                    debug!(file = %job.destination.display(), attempt, "Copy verified");
                    return CopyResult::verified(job.destination.clone(), attempt);
                }
                Err(failure) => {
                    warn!(
                        file = %job.source.display(),
                        attempt,
                        limit,
                        device_removed = failure.device_removed(),
                        error = %failure,
                        "Copy attempt failed"
                    );
                    if attempt < limit && !self.retry.backoff.is_zero() {
                        std::thread::sleep(self.retry.backoff);
                    }
                }
            }
        }

        // Nothing unverified stays under the mirror
        if let Err(e) = std::fs::remove_file(&job.destination) {
            if e.kind() != std::io::ErrorKind::NotFound {
                debug!(file = %job.destination.display(), error = %e, "Failed to remove unverified copy");
            }
        }

        CopyResult::failed(job.destination.clone(), limit)
    }

    fn attempt(&self, source: &Path, destination: &Path) -> Result<(), AttemptFailure> {
        self.engine
            .copy_file(source, destination)
            .map_err(AttemptFailure::Copy)?;

        if verifier::contents_match(source, destination).map_err(AttemptFailure::Hash)? {
            Ok(())
        } else {
            Err(AttemptFailure::Mismatch)
        }
    }
}
