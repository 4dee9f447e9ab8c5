//! Controller settings.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::index::FleetKind;

/// Shortest deadline a pass is given; anything below cancels every pass.
const MIN_PASS_TIMEOUT_MS: u64 = 100;

/// Driver configuration, usually the `[controller]` table of the daemon's
/// config file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ControllerConfig {
    /// Seconds between full resyncs of every fleet.
    pub resync_interval_secs: u64,
    /// Deadline for a single pass.
    pub pass_timeout_ms: u64,
    /// Passes allowed to run at once across all fleets.
    pub max_concurrent_passes: usize,
    /// `apiVersion` of the fleet resource.
    pub owner_api_version: String,
    /// `kind` of the fleet resource.
    pub owner_kind: String,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        let kind = FleetKind::default();
        Self {
            resync_interval_secs: 30,
            pass_timeout_ms: 5000,
            max_concurrent_passes: 8,
            owner_api_version: kind.api_version,
            owner_kind: kind.kind,
        }
    }
}

impl ControllerConfig {
    pub fn resync_interval(&self) -> Duration {
        Duration::from_secs(self.resync_interval_secs.max(1))
    }

    pub fn pass_timeout(&self) -> Duration {
        Duration::from_millis(self.pass_timeout_ms.max(MIN_PASS_TIMEOUT_MS))
    }

    pub fn concurrency(&self) -> usize {
        self.max_concurrent_passes.max(1)
    }

    pub fn fleet_kind(&self) -> FleetKind {
        FleetKind {
            api_version: self.owner_api_version.clone(),
            kind: self.owner_kind.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let config = ControllerConfig::default();
        assert_eq!(config.resync_interval(), Duration::from_secs(30));
        assert_eq!(config.pass_timeout(), Duration::from_secs(5));
        assert_eq!(config.fleet_kind(), FleetKind::default());
    }

    #[test]
    fn zero_values_are_clamped() {
        let config = ControllerConfig {
            resync_interval_secs: 0,
            pass_timeout_ms: 0,
            max_concurrent_passes: 0,
            ..ControllerConfig::default()
        };
        assert_eq!(config.resync_interval(), Duration::from_secs(1));
        assert_eq!(config.pass_timeout(), Duration::from_millis(100));
        assert_eq!(config.concurrency(), 1);
    }

    #[test]
    fn parse_partial_table() {
        let config: ControllerConfig = toml::from_str(
            r#"
resync_interval_secs = 10
owner_kind = "GameServerBuild"
"#,
        )
        .unwrap();
        assert_eq!(config.resync_interval_secs, 10);
        assert_eq!(config.owner_kind, "GameServerBuild");
        assert_eq!(config.max_concurrent_passes, 8);
    }
}
