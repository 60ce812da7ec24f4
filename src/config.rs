use anyhow::{Result, bail};
use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::time::Duration;
use tracing::warn;

use crate::core::admission::AdmissionWindow;
use crate::core::worker::RetryPolicy;

const DEFAULT_CONFIG_PATH: &str = "/etc/drivemirror/config.toml";
const CONFIG_PATH_ENV: &str = "DRIVEMIRROR_CONFIG";
const ENV_PREFIX: &str = "DRIVEMIRROR_";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Volume ids in backup order. The checkpoint indexes into this list.
    pub volumes: Vec<String>,
    /// Static mount table used when `simulation` is set.
    pub mounts: BTreeMap<String, PathBuf>,
    pub destination_root: PathBuf,
    pub state_file: PathBuf,
    pub log_dir: PathBuf,
    pub window_start_hour: u32,
    pub window_end_hour: u32,
    pub window_poll_secs: u64,
    pub retry_limit: u32,
    pub retry_backoff_ms: u64,
    pub max_parallel_workers: usize,
    pub simulation: bool,
    pub verbose: bool,
    pub json_logs: bool,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            volumes: Vec::new(),
            mounts: BTreeMap::new(),
            destination_root: PathBuf::from("/mnt/backup_drive/blink"),
            state_file: PathBuf::from("backup_state.json"),
            log_dir: PathBuf::from("backup_logs"),
            window_start_hour: 1,
            window_end_hour: 11,
            window_poll_secs: 600,
            retry_limit: 3,
            retry_backoff_ms: 1000,
            max_parallel_workers: default_parallelism(),
            simulation: false,
            verbose: false,
            json_logs: false,
        }
    }
}

fn default_parallelism() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1)
        .min(8)
}

fn config_path() -> PathBuf {
    std::env::var_os(CONFIG_PATH_ENV)
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_PATH))
}

impl AppConfig {
    /// Defaults, then the TOML file, then `DRIVEMIRROR_*` env vars, then `overrides`.
    pub fn new<T: Serialize>(overrides: Option<&T>) -> Result<Self> {
        Self::from_figment(Self::figment(overrides))
    }

    pub fn figment<T: Serialize>(overrides: Option<&T>) -> Figment {
        let mut figment = Figment::from(Serialized::defaults(AppConfig::default()))
            .merge(Toml::file(config_path()))
            .merge(Env::prefixed(ENV_PREFIX).ignore(&["config"]));

        if let Some(overrides) = overrides {
            figment = figment.merge(Serialized::defaults(overrides));
        }

        figment
    }

    pub fn from_figment(figment: Figment) -> Result<Self> {
        let config: AppConfig = figment.extract()?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.retry_limit == 0 {
            bail!("retry_limit must be at least 1");
        }
        if self.max_parallel_workers == 0 {
            bail!("max_parallel_workers must be at least 1");
        }
        if self.window_start_hour > 24 || self.window_end_hour > 24 {
            bail!(
                "window hours must be within 0..=24 (got {}..{})",
                self.window_start_hour,
                self.window_end_hour
            );
        }
        if self.window_poll_secs == 0 {
            bail!("window_poll_secs must be at least 1");
        }
        Ok(())
    }

    /// Log settings that load fine but are probably a mistake.
    ///
    /// Kept out of `validate` because config loads before the subscriber exists.
    pub fn warn_suspicious(&self) -> usize {
        let mut warnings = 0;
        if self.window_is_empty() {
            warn!(
                start_hour = self.window_start_hour,
                end_hour = self.window_end_hour,
                "Admission window is empty; runs will only proceed with --force"
            );
            warnings += 1;
        }
        warnings
    }

    pub fn window_is_empty(&self) -> bool {
        self.window_start_hour >= self.window_end_hour
    }

    pub fn admission_window(&self) -> AdmissionWindow {
        AdmissionWindow::new(self.window_start_hour, self.window_end_hour)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.window_poll_secs)
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            limit: self.retry_limit,
            backoff: Duration::from_millis(self.retry_backoff_ms),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use figment::Jail;

    #[derive(Serialize)]
    struct Overrides {
        #[serde(skip_serializing_if = "Option::is_none")]
        retry_limit: Option<u32>,
    }

    #[test]
    fn test_defaults_match_reference_behaviour() {
        let config = AppConfig::default();
        assert_eq!(config.admission_window(), AdmissionWindow::new(1, 11));
        assert_eq!(config.retry_limit, 3);
        assert_eq!(config.poll_interval(), Duration::from_secs(600));
        assert!(config.max_parallel_workers >= 1 && config.max_parallel_workers <= 8);
    }

    #[test]
    fn test_layers_file_env_and_overrides() {
        Jail::expect_with(|jail| {
            jail.create_file(
                "config.toml",
                r#"
                volumes = ["8453-95FD", "1234-ABCD"]
                destination_root = "/backup"
                retry_limit = 4
                window_end_hour = 12

                [mounts]
                "8453-95FD" = "/media/lexar/blink"
                "#,
            )?;
            jail.set_env("DRIVEMIRROR_CONFIG", "config.toml");
            jail.set_env("DRIVEMIRROR_WINDOW_END_HOUR", "9");

            let config = AppConfig::new(None::<&Overrides>).expect("config loads");
            assert_eq!(config.volumes, vec!["8453-95FD", "1234-ABCD"]);
            assert_eq!(config.destination_root, PathBuf::from("/backup"));
            assert_eq!(config.retry_limit, 4);
            assert_eq!(config.window_end_hour, 9);
            assert_eq!(
                config.mounts.get("8453-95FD"),
                Some(&PathBuf::from("/media/lexar/blink"))
            );

            let overridden = AppConfig::new(Some(&Overrides {
                retry_limit: Some(7),
            }))
            .expect("config loads");
            assert_eq!(overridden.retry_limit, 7);

            let untouched = AppConfig::new(Some(&Overrides { retry_limit: None })).expect("config loads");
            assert_eq!(untouched.retry_limit, 4);
            Ok(())
        });
    }

    #[test]
    fn test_rejects_zero_retry_limit() {
        let config = AppConfig {
            retry_limit: 0,
            ..AppConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_inverted_window_is_accepted() {
        let config = AppConfig {
            window_start_hour: 11,
            window_end_hour: 1,
            ..AppConfig::default()
        };
        assert!(config.validate().is_ok());
        assert!(config.window_is_empty());
        assert_eq!(config.warn_suspicious(), 1);
    }

    #[test]
    fn test_default_window_has_no_warnings() {
        let config = AppConfig::default();
        assert!(!config.window_is_empty());
        assert_eq!(config.warn_suspicious(), 0);
    }
}
