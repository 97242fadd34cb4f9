//! Layered settings: defaults, TOML file, `STAR_TYPE_*` environment, CLI flags.

use std::path::{Path, PathBuf};

use clap::Parser;
use figment::providers::{Env, Format, Serialized, Toml};
use figment::Figment;
use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

pub const DEFAULT_CONFIG_FILE: &str = "star-type.toml";
pub const ENV_PREFIX: &str = "STAR_TYPE_";

#[derive(Debug, Parser)]
#[command(name = "star-type-server", version, about = "Star type classification service")]
pub struct Cli {
    /// Path to a TOML config file.
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    #[arg(long)]
    pub host: Option<String>,

    #[arg(long)]
    pub port: Option<u16>,

    /// ONNX model file.
    #[arg(long)]
    pub model: Option<PathBuf>,

    /// JSON array of class labels in model output order.
    #[arg(long)]
    pub labels: Option<PathBuf>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Settings {
    #[serde(default)]
    pub server: ServerSettings,
    #[serde(default)]
    pub model: ModelSettings,
    #[serde(default)]
    pub log: LogSettings,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServerSettings {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    /// Defaults to the number of physical cores when unset.
    #[serde(default)]
    pub workers: Option<usize>,
    #[serde(default = "default_max_upload_bytes")]
    pub max_upload_bytes: usize,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            workers: None,
            max_upload_bytes: default_max_upload_bytes(),
        }
    }
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    8080
}

fn default_max_upload_bytes() -> usize {
    2 * 1024 * 1024
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelSettings {
    #[serde(default = "default_model_path")]
    pub path: PathBuf,
    #[serde(default = "default_labels_path")]
    pub labels_path: PathBuf,
}

impl Default for ModelSettings {
    fn default() -> Self {
        Self {
            path: default_model_path(),
            labels_path: default_labels_path(),
        }
    }
}

fn default_model_path() -> PathBuf {
    PathBuf::from("pipeline/star_type_classifier.onnx")
}

fn default_labels_path() -> PathBuf {
    PathBuf::from("pipeline/star_type_classifier.labels.json")
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogSettings {
    /// `EnvFilter` directive; `RUST_LOG` wins when set.
    #[serde(default = "default_log_level")]
    pub level: String,
    #[serde(default)]
    pub json: bool,
}

impl Default for LogSettings {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json: false,
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Settings {
    pub fn figment(config_file: &Path) -> Figment {
        Figment::from(Serialized::defaults(Settings::default()))
            .merge(Toml::file(config_file))
            .merge(Env::prefixed(ENV_PREFIX).split("__"))
    }

    pub fn load(cli: &Cli) -> Result<Self, ConfigError> {
        let file = match &cli.config {
            Some(path) if !path.exists() => return Err(ConfigError::MissingFile(path.clone())),
            Some(path) => path.clone(),
            None => PathBuf::from(DEFAULT_CONFIG_FILE),
        };

        let mut settings: Settings = Self::figment(&file).extract()?;
        settings.apply_cli(cli);
        settings.validate()?;
        Ok(settings)
    }

    fn apply_cli(&mut self, cli: &Cli) {
        if let Some(host) = &cli.host {
            self.server.host = host.clone();
        }
        if let Some(port) = cli.port {
            self.server.port = port;
        }
        if let Some(model) = &cli.model {
            self.model.path = model.clone();
        }
        if let Some(labels) = &cli.labels {
            self.model.labels_path = labels.clone();
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.server.max_upload_bytes == 0 {
            return Err(ConfigError::Invalid(
                "server.max_upload_bytes must be greater than zero".into(),
            ));
        }
        if self.server.workers == Some(0) {
            return Err(ConfigError::Invalid("server.workers must be at least 1".into()));
        }
        Ok(())
    }
}
