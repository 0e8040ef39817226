use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use serde::Deserialize;

use crate::cli::CliArgs;
use crate::controller::ControllerSettings;
use crate::display::Timings;

const MIN_INTERVAL_MS: u64 = 50;

/// Settings file contents merged with command-line overrides.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(default, deny_unknown_fields)]
pub struct Settings {
    pub refresh_ms: u64,
    pub log_poll_ms: u64,
    pub request_timeout_ms: u64,
    pub max_backoff_ms: u64,
    pub snapshot_dir: PathBuf,
    pub namespace: Option<String>,
    pub kubeconfig: Option<PathBuf>,
    pub context: Option<String>,
    #[serde(skip)]
    pub source: Option<PathBuf>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            refresh_ms: 500,
            log_poll_ms: 1_000,
            request_timeout_ms: 4_000,
            max_backoff_ms: 8_000,
            snapshot_dir: PathBuf::from("."),
            namespace: None,
            kubeconfig: None,
            context: None,
            source: None,
        }
    }
}

impl Settings {
    /// Reads `explicit` if given, otherwise the first settings file found.
    /// No file at all means defaults.
    pub fn load(explicit: Option<&Path>) -> Result<Self> {
        let Some(path) = explicit.map(Path::to_path_buf).or_else(discover_config_path) else {
            return Ok(Self::default());
        };

        let raw = fs::read_to_string(&path)
            .with_context(|| format!("failed to read settings {}", path.display()))?;
        let mut settings = Self::parse(&raw)
            .with_context(|| format!("failed to parse settings {}", path.display()))?;
        settings.source = Some(path);
        Ok(settings)
    }

    pub fn parse(raw: &str) -> Result<Self> {
        if raw.trim().is_empty() {
            return Ok(Self::default());
        }
        Ok(serde_yaml::from_str(raw)?)
    }

    pub fn apply_cli(&mut self, args: &CliArgs) {
        if let Some(value) = args.refresh_ms {
            self.refresh_ms = value;
        }
        if let Some(value) = args.log_poll_ms {
            self.log_poll_ms = value;
        }
        if let Some(value) = args.request_timeout_ms {
            self.request_timeout_ms = value;
        }
        if let Some(value) = &args.snapshot_dir {
            self.snapshot_dir = value.clone();
        }
        if let Some(value) = &args.namespace {
            self.namespace = Some(value.clone());
        }
        if let Some(value) = &args.kubeconfig {
            self.kubeconfig = Some(value.clone());
        }
        if let Some(value) = &args.context {
            self.context = Some(value.clone());
        }
    }

    pub fn timings(&self) -> Timings {
        Timings {
            render_interval: floored(self.refresh_ms),
            log_poll_interval: floored(self.log_poll_ms),
            request_timeout: floored(self.request_timeout_ms),
            max_backoff: floored(self.max_backoff_ms),
        }
    }

    pub fn controller_settings(&self) -> ControllerSettings {
        ControllerSettings {
            timings: self.timings(),
            snapshot_dir: self.snapshot_dir.clone(),
        }
    }

    /// Configured namespace, else the kubeconfig default, else `default`.
    pub fn initial_namespace(&self, kube_default: &str) -> String {
        self.namespace
            .as_deref()
            .map(str::trim)
            .filter(|value| !value.is_empty())
            .or(Some(kube_default.trim()).filter(|value| !value.is_empty()))
            .unwrap_or("default")
            .to_string()
    }
}

fn floored(ms: u64) -> Duration {
    Duration::from_millis(ms.max(MIN_INTERVAL_MS))
}

fn discover_config_path() -> Option<PathBuf> {
    if let Ok(path) = std::env::var("KUBEDECK_CONFIG")
        && !path.trim().is_empty()
    {
        return Some(PathBuf::from(path));
    }

    let cwd_candidates = [
        PathBuf::from("kubedeck.yaml"),
        PathBuf::from("kubedeck.yml"),
        PathBuf::from(".kubedeck.yaml"),
    ];
    for candidate in cwd_candidates {
        if candidate.exists() {
            return Some(candidate);
        }
    }

    if let Ok(home) = std::env::var("HOME") {
        let user_candidates = [
            PathBuf::from(&home).join(".config/kubedeck/config.yaml"),
            PathBuf::from(&home).join(".config/kubedeck/config.yml"),
        ];
        for candidate in user_candidates {
            if candidate.exists() {
                return Some(candidate);
            }
        }
    }

    None
}
