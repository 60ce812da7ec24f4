//! Wall-clock admission window.

use async_trait::async_trait;
use chrono::{DateTime, Local, Timelike};
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

/// Source of local time and of sleeping. Injected so tests can simulate time.
#[async_trait]
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Local>;

    async fn sleep(&self, duration: Duration);
}

pub struct SystemClock;

#[async_trait]
impl Clock for SystemClock {
    fn now(&self) -> DateTime<Local> {
        Local::now()
    }

    async fn sleep(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }
}

/// Half-open interval of local hours `[start_hour, end_hour)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AdmissionWindow {
    pub start_hour: u32,
    pub end_hour: u32,
}

impl AdmissionWindow {
    pub fn new(start_hour: u32, end_hour: u32) -> Self {
        Self {
            start_hour,
            end_hour,
        }
    }

    /// An interval with `start_hour >= end_hour` contains no hour.
    pub fn contains(&self, hour: u32) -> bool {
        self.start_hour <= hour && hour < self.end_hour
    }
}

pub struct AdmissionController {
    window: AdmissionWindow,
    poll_interval: Duration,
    clock: Arc<dyn Clock>,
}

impl AdmissionController {
    pub fn new(window: AdmissionWindow, poll_interval: Duration, clock: Arc<dyn Clock>) -> Self {
        Self {
            window,
            poll_interval,
            clock,
        }
    }

    pub fn is_open(&self) -> bool {
        self.window.contains(self.clock.now().hour())
    }

    /// Wait until the current hour is inside the window, or return at once if `force`.
    ///
    /// Only process termination cancels the wait.
    pub async fn wait_until_allowed(&self, force: bool) {
        if force {
            return;
        }

        while !self.is_open() {
            info!(
                start_hour = self.window.start_hour,
                end_hour = self.window.end_hour,
                retry_in_secs = self.poll_interval.as_secs(),
                "Waiting for allowed backup window"
            );
            self.clock.sleep(self.poll_interval).await;
        }
    }
}
