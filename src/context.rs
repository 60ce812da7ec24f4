use std::sync::Arc;

use crate::adapters;
use crate::config::AppConfig;
use crate::core::admission::{Clock, SystemClock};
use crate::core::checkpoint::CheckpointStore;
use crate::core::hardware::MountResolver;
use crate::core::models::RunConfig;
use crate::core::report::{FileReportSink, ReportSink};
use crate::core::transfer_engine::{self, CopyEngine};

/// Everything one backup run needs, wired once at startup.
#[derive(Clone)]
pub struct AppContext {
    pub config: Arc<AppConfig>,
    pub run: RunConfig,
    pub resolver: Arc<dyn MountResolver>,
    pub clock: Arc<dyn Clock>,
    pub engine: Arc<dyn CopyEngine>,
    pub checkpoints: CheckpointStore,
    pub reports: Arc<dyn ReportSink>,
}

impl AppContext {
    /// Production wiring: lsblk (or the static table in simulation mode), the
    /// system clock, native copies and file reports.
    pub fn new(config: AppConfig, run: RunConfig) -> Self {
        let resolver = adapters::get_resolver(config.simulation, &config.mounts);
        let checkpoints = CheckpointStore::new(&config.state_file);
        let reports = Arc::new(FileReportSink::new(&config.log_dir));

        Self {
            config: Arc::new(config),
            run,
            resolver,
            clock: Arc::new(SystemClock),
            engine: transfer_engine::create_engine(),
            checkpoints,
            reports,
        }
    }

    pub fn with_resolver(mut self, resolver: Arc<dyn MountResolver>) -> Self {
        self.resolver = resolver;
        self
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn with_engine(mut self, engine: Arc<dyn CopyEngine>) -> Self {
        self.engine = engine;
        self
    }

    pub fn with_reports(mut self, reports: Arc<dyn ReportSink>) -> Self {
        self.reports = reports;
        self
    }
}
