use crate::errors::TallyError;
use crate::runtime::FileSystem;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

#[derive(Debug, Clone, Default)]
pub struct CliOverrides {
    pub config_path: Option<PathBuf>,
    pub log_path: Option<PathBuf>,
    pub quiet: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct AppConfig {
    pub display: DisplayConfig,
    pub session: SessionConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct DisplayConfig {
    pub width: u16,
    pub height: u16,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SessionConfig {
    /// Per-key acknowledgement lines ("recorded yes", ...).
    pub feedback: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct LoggingConfig {
    /// JSONL event log destination; absent means logging is disabled.
    pub path: Option<PathBuf>,
    pub max_payload_bytes: usize,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            display: DisplayConfig {
                width: 60,
                height: 12,
            },
            session: SessionConfig { feedback: true },
            logging: LoggingConfig {
                path: None,
                max_payload_bytes: 4096,
            },
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
struct PartialAppConfig {
    display: Option<PartialDisplayConfig>,
    session: Option<PartialSessionConfig>,
    logging: Option<PartialLoggingConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
struct PartialDisplayConfig {
    width: Option<u16>,
    height: Option<u16>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
struct PartialSessionConfig {
    feedback: Option<bool>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
struct PartialLoggingConfig {
    path: Option<PathBuf>,
    max_payload_bytes: Option<usize>,
}

pub fn load_config(
    overrides: &CliOverrides,
    fs: &dyn FileSystem,
) -> Result<AppConfig, TallyError> {
    let mut cfg = AppConfig::default();

    if let Some(path) = &overrides.config_path {
        let file_contents = fs.read_to_string(path)?;
        let partial: PartialAppConfig =
            toml::from_str(&file_contents).map_err(|e| TallyError::ConfigParse(e.to_string()))?;
        merge_partial_config(&mut cfg, partial);
    }

    apply_cli_overrides(&mut cfg, overrides);
    validate_config(&cfg)?;
    Ok(cfg)
}

fn merge_partial_config(cfg: &mut AppConfig, partial: PartialAppConfig) {
    if let Some(display) = partial.display {
        if let Some(width) = display.width {
            cfg.display.width = width;
        }
        if let Some(height) = display.height {
            cfg.display.height = height;
        }
    }

    if let Some(session) = partial.session {
        if let Some(feedback) = session.feedback {
            cfg.session.feedback = feedback;
        }
    }

    if let Some(logging) = partial.logging {
        if let Some(path) = logging.path {
            cfg.logging.path = Some(path);
        }
        if let Some(max_payload_bytes) = logging.max_payload_bytes {
            cfg.logging.max_payload_bytes = max_payload_bytes;
        }
    }
}

fn apply_cli_overrides(cfg: &mut AppConfig, overrides: &CliOverrides) {
    if let Some(log_path) = &overrides.log_path {
        cfg.logging.path = Some(log_path.clone());
    }
    if overrides.quiet {
        cfg.session.feedback = false;
    }
}

fn validate_config(cfg: &AppConfig) -> Result<(), TallyError> {
    if cfg.display.width == 0 || cfg.display.height == 0 {
        return Err(TallyError::InvalidConfig(
            "display dimensions must be greater than zero".to_string(),
        ));
    }
    if cfg.logging.max_payload_bytes == 0 {
        return Err(TallyError::InvalidConfig(
            "logging.max_payload_bytes must be greater than zero".to_string(),
        ));
    }
    Ok(())
}
