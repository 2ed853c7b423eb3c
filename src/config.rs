//! Topology Configuration
//!
//! Startup parameters for the topology mapper, loaded from a YAML file
//! by the host's configuration layer. Validation is strict: a config
//! that fails `validate()` must abort startup before the core begins
//! operating, since a zero sampling interval or hop budget would make
//! the flood and sampler behavior undefined.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

use crate::identity::ProducerName;

/// Default seconds between link samples.
pub const DEFAULT_SAMPLE_INTERVAL_SECS: u16 = 5;

/// Default maximum number of times a message is replicated.
pub const DEFAULT_MAX_HOPS: u16 = 6;

/// Errors that can occur during configuration loading and validation.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    ReadFile {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to parse config file {path}: {source}")]
    ParseYaml {
        path: PathBuf,
        source: serde_yaml::Error,
    },

    #[error("bp_name is required and must not be empty")]
    MissingBpName,

    #[error("sample interval must be greater than zero")]
    ZeroSampleInterval,

    #[error("max hops must be greater than zero")]
    ZeroMaxHops,

    #[error("production quota must be greater than zero")]
    ZeroProductionQuota,
}

/// Topology mapper configuration.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct TopologyConfig {
    /// Reporter identifier: a block-producer name, or any label that
    /// localizes a set of hosts. Becomes the prefix of the local node's
    /// location string.
    #[serde(default)]
    pub bp_name: String,

    /// Seconds between link samples.
    #[serde(default = "default_sample_interval")]
    pub sample_interval_secs: u16,

    /// Maximum number of times a given message is replicated when
    /// distributing.
    #[serde(default = "default_max_hops")]
    pub max_hops: u16,

    /// Blocks a producer may produce per turn before hand-off.
    #[serde(default = "default_production_quota")]
    pub production_quota: u16,

    /// Block-producer accounts hosted locally.
    #[serde(default)]
    pub producers: Vec<String>,
}

fn default_sample_interval() -> u16 {
    DEFAULT_SAMPLE_INTERVAL_SECS
}

fn default_max_hops() -> u16 {
    DEFAULT_MAX_HOPS
}

fn default_production_quota() -> u16 {
    crate::deviation::DEFAULT_PRODUCTION_QUOTA
}

impl Default for TopologyConfig {
    fn default() -> Self {
        Self {
            bp_name: String::new(),
            sample_interval_secs: DEFAULT_SAMPLE_INTERVAL_SECS,
            max_hops: DEFAULT_MAX_HOPS,
            production_quota: crate::deviation::DEFAULT_PRODUCTION_QUOTA,
            producers: Vec::new(),
        }
    }
}

impl TopologyConfig {
    /// Create a config with defaults and the given reporter name.
    pub fn with_bp_name(bp_name: impl Into<String>) -> Self {
        Self {
            bp_name: bp_name.into(),
            ..Self::default()
        }
    }

    /// Load configuration from a YAML file.
    pub fn load_from_path(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::ReadFile {
            path: path.to_path_buf(),
            source,
        })?;
        serde_yaml::from_str(&contents).map_err(|source| ConfigError::ParseYaml {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Validate startup parameters. Failures here are fatal: the core
    /// must not start with a rejected configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.bp_name.is_empty() {
            return Err(ConfigError::MissingBpName);
        }
        if self.sample_interval_secs == 0 {
            return Err(ConfigError::ZeroSampleInterval);
        }
        if self.max_hops == 0 {
            return Err(ConfigError::ZeroMaxHops);
        }
        if self.production_quota == 0 {
            return Err(ConfigError::ZeroProductionQuota);
        }
        Ok(())
    }

    /// The sampling cadence for the host's scheduler.
    pub fn sample_interval(&self) -> Duration {
        Duration::from_secs(self.sample_interval_secs as u64)
    }

    /// Locally hosted producer accounts as typed names.
    pub fn producer_names(&self) -> Vec<ProducerName> {
        self.producers
            .iter()
            .map(|p| ProducerName::new(p.clone()))
            .collect()
    }
}
