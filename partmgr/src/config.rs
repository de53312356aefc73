// SPDX-License-Identifier: GPL-3.0-only

use std::path::{Path, PathBuf};

use anyhow::{Context, bail};
use serde::{Deserialize, Serialize};

use crate::naming::VolumeSequence;

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, Eq, PartialEq)]
#[serde(rename_all = "lowercase")]
pub enum LoggingLevel {
    Error,
    Warn,
    #[default]
    Info,
    Debug,
    Trace,
}

impl LoggingLevel {
    pub fn as_directive(self) -> &'static str {
        match self {
            Self::Error => "error",
            Self::Warn => "warn",
            Self::Info => "info",
            Self::Debug => "debug",
            Self::Trace => "trace",
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, Eq, PartialEq)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: LoggingLevel,
    pub log_to_disk: bool,
    /// Overrides the resolved log directory
    pub log_dir: Option<PathBuf>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Eq, PartialEq)]
#[serde(default)]
pub struct PartMgrConfig {
    /// First `HarddiskVolume` number handed out
    pub first_volume_number: u32,
    pub logging: LoggingConfig,
}

impl Default for PartMgrConfig {
    fn default() -> Self {
        Self {
            first_volume_number: 1,
            logging: LoggingConfig::default(),
        }
    }
}

impl PartMgrConfig {
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config {}", path.display()))?;
        Self::from_toml_str(&raw).with_context(|| format!("invalid config {}", path.display()))
    }

    pub fn from_toml_str(raw: &str) -> anyhow::Result<Self> {
        let config: Self = toml::from_str(raw).context("failed to parse config TOML")?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> anyhow::Result<()> {
        if self.first_volume_number == 0 {
            bail!("first_volume_number must be at least 1");
        }
        Ok(())
    }

    pub fn volume_sequence(&self) -> VolumeSequence {
        VolumeSequence::starting_at(self.first_volume_number)
    }
}
