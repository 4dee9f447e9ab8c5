//! standbyd.toml configuration parser.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use standby_controller::ControllerConfig;
use standby_sizer::SizerPolicy;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StandbydConfig {
    pub store: StoreConfig,
    pub controller: ControllerConfig,
    pub sizer: SizerPolicy,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// redb file holding fleets and floor records.
    pub path: PathBuf,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("/var/lib/standbyd/standby.redb"),
        }
    }
}

impl StandbydConfig {
    pub fn from_file(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: StandbydConfig = toml::from_str(&content)?;
        config.sizer.validate()?;
        Ok(config)
    }

    /// Read `path` if given, otherwise use defaults.
    pub fn load(path: Option<&Path>) -> anyhow::Result<Self> {
        match path {
            Some(path) => Self::from_file(path),
            None => Ok(Self::default()),
        }
    }

    pub fn to_toml_string(&self) -> anyhow::Result<String> {
        Ok(toml::to_string_pretty(self)?)
    }
}
