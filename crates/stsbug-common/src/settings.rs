use std::{env, path::PathBuf, sync::OnceLock, time::Duration};

use anyhow::Context;
use config::{Environment, File};
use log::LevelFilter;
use serde::{Deserialize, Serialize};
use std::fs::canonicalize;

pub static CONFIG_INSTANCE: OnceLock<Settings> = OnceLock::new();

use crate::error::{StsBugError, StsBugResult};

pub const DEFAULT_IMAGE: &str = "k8s.gcr.io/gninx-slim:0.8";

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
pub struct OperatorSettings {
    /// Namespace to watch; `None` watches the whole cluster.
    #[serde(default)]
    pub namespace: Option<String>,

    /// Upper bound on reconciliations running in parallel (distinct keys only).
    #[serde(default = "default_concurrency")]
    pub concurrency: u16,

    #[serde(default = "default_reconcile_timeout_secs")]
    pub reconcile_timeout_secs: u64,

    #[serde(default = "default_error_requeue_secs")]
    pub error_requeue_secs: u64,

    #[serde(default = "default_max_error_requeue_secs")]
    pub max_error_requeue_secs: u64,

    #[serde(default = "default_image")]
    pub image: String,

    #[serde(default = "default_replicas")]
    pub replicas: i32,
}

impl Default for OperatorSettings {
    fn default() -> Self {
        Self {
            namespace: None,
            concurrency: default_concurrency(),
            reconcile_timeout_secs: default_reconcile_timeout_secs(),
            error_requeue_secs: default_error_requeue_secs(),
            max_error_requeue_secs: default_max_error_requeue_secs(),
            image: default_image(),
            replicas: default_replicas(),
        }
    }
}

impl OperatorSettings {
    pub fn reconcile_timeout(&self) -> Duration {
        Duration::from_secs(self.reconcile_timeout_secs)
    }

    pub fn error_requeue(&self) -> Duration {
        Duration::from_secs(self.error_requeue_secs)
    }

    pub fn max_error_requeue(&self) -> Duration {
        Duration::from_secs(self.max_error_requeue_secs)
    }
}

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
pub struct Settings {
    #[serde(default = "default_log_level")]
    pub log_level: LevelFilter,

    #[serde(default)]
    pub operator: OperatorSettings,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            operator: OperatorSettings::default(),
        }
    }
}

pub fn get_config() -> StsBugResult<&'static Settings> {
    CONFIG_INSTANCE.get().ok_or(StsBugError::ConfigNotInitialized)
}

pub fn init_config(settings: Settings) -> StsBugResult<&'static Settings> {
    CONFIG_INSTANCE
        .set(settings)
        .map_err(|_| StsBugError::ConfigAlreadyInitialized)?;
    get_config()
}

impl Settings {
    /// Layers, lowest priority first: `root` (when it is a file, otherwise
    /// `<root>/config`), `config`, `config/default`, `config.<RUN_MODE>`,
    /// then `STSBUG_*` environment variables (`__` separates sections).
    pub fn from_root(root: Option<PathBuf>) -> StsBugResult<Self> {
        let curr_dir = std::env::current_dir().context("unable to get working directory")?;
        let root = root.unwrap_or(curr_dir);
        let root = canonicalize(root).context("unable to canonicalize root directory")?;

        let run_mode = env::var("RUN_MODE").unwrap_or_else(|_| "development".to_string());

        let mut s = config::Config::builder();
        if root.is_file() {
            s = s.add_source(File::from(root.as_path()));
        } else {
            s = s.add_source(File::from(root.join("config")).required(false));
        }
        let s = s
            .add_source(File::with_name("config").required(false))
            .add_source(File::with_name("config/default").required(false))
            .add_source(File::with_name(&format!("config.{}", run_mode)).required(false))
            .add_source(
                Environment::with_prefix("STSBUG")
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        let cfg = s.try_deserialize()?;
        Ok(cfg)
    }
}

fn default_log_level() -> LevelFilter {
    LevelFilter::Info
}

fn default_concurrency() -> u16 {
    4
}

fn default_reconcile_timeout_secs() -> u64 {
    30
}

fn default_error_requeue_secs() -> u64 {
    5
}

fn default_max_error_requeue_secs() -> u64 {
    300
}

fn default_image() -> String {
    DEFAULT_IMAGE.to_string()
}

fn default_replicas() -> i32 {
    1
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;

    #[test]
    fn test_defaults_without_files() {
        let temp_root = tempfile::tempdir().unwrap();
        let settings = Settings::from_root(Some(temp_root.path().to_path_buf())).unwrap();
        assert_eq!(settings.log_level, LevelFilter::Info);
        assert_eq!(settings.operator.concurrency, 4);
        assert_eq!(settings.operator.image, DEFAULT_IMAGE);
        assert_eq!(settings.operator.namespace, None);
        assert_eq!(settings.operator.reconcile_timeout(), Duration::from_secs(30));
    }

    #[test]
    fn test_settings_file_overrides_defaults() {
        let temp_root = tempfile::tempdir().unwrap();
        let path = temp_root.path().join("settings.yaml");
        let mut file = std::fs::File::create(&path).unwrap();
        writeln!(
            file,
            "log_level: debug\noperator:\n  namespace: demo\n  concurrency: 8\n  replicas: 3"
        )
        .unwrap();

        let settings = Settings::from_root(Some(path)).unwrap();
        assert_eq!(settings.log_level, LevelFilter::Debug);
        assert_eq!(settings.operator.namespace.as_deref(), Some("demo"));
        assert_eq!(settings.operator.concurrency, 8);
        assert_eq!(settings.operator.replicas, 3);
        // untouched keys keep their defaults
        assert_eq!(settings.operator.error_requeue_secs, 5);
    }

    #[test]
    fn test_config_file_in_root_directory() {
        let temp_root = tempfile::tempdir().unwrap();
        std::fs::write(
            temp_root.path().join("config.yaml"),
            "operator:\n  image: nginx:latest\n",
        )
        .unwrap();

        let settings = Settings::from_root(Some(temp_root.path().to_path_buf())).unwrap();
        assert_eq!(settings.operator.image, "nginx:latest");
    }
}
