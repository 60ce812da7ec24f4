pub mod admission;
pub mod checkpoint;
pub mod hardware;
pub mod job_builder;
pub mod models;
pub mod orchestrator;
pub mod pool;
pub mod report;
pub mod transfer_engine;
pub mod verifier;
pub mod worker;

pub use admission::{AdmissionController, AdmissionWindow, Clock, SystemClock};
pub use checkpoint::{CheckpointError, CheckpointStore};
pub use hardware::{MountMap, MountResolver};
pub use models::{
    BatchReport, Checkpoint, CopyJob, CopyResult, CopyStatus, RunConfig, RunSummary, Volume,
};
pub use orchestrator::{Orchestrator, RunState};
pub use pool::WorkerPool;
pub use report::{DirectoryReport, FileReportSink, MemoryReportSink, ReportSink};
pub use verifier::{Digest, HashError, digest};
pub use worker::{RetryPolicy, VerifiedCopyWorker};
