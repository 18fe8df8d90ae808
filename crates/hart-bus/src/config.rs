//! Simulator configuration

use hart_sim::{default_roster, DeviceConfig};
use serde::{Deserialize, Serialize};

use crate::master::MasterSettings;

/// Simulator configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimulatorConfig {
    /// Master frame settings
    pub master: MasterSettings,
    /// Seed for the reading generator
    pub seed: u64,
    /// Devices attached at start, registered at their configured addresses
    pub devices: Vec<DeviceConfig>,
}

impl Default for SimulatorConfig {
    fn default() -> Self {
        Self {
            master: MasterSettings::default(),
            seed: 0x4841_5254,
            devices: default_roster(),
        }
    }
}

impl SimulatorConfig {
    /// Configuration with no devices attached
    pub fn empty() -> Self {
        Self {
            devices: Vec::new(),
            ..Default::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::master::FrameFormat;

    #[test]
    fn test_default_config() {
        let config = SimulatorConfig::default();
        assert_eq!(config.devices.len(), 15);
        assert_eq!(config.master.preamble_count, 5);
        assert!(SimulatorConfig::empty().devices.is_empty());
    }

    #[test]
    fn test_partial_json() {
        let config: SimulatorConfig =
            serde_json::from_str(r#"{ "seed": 7, "master": { "frame_format": "Long" } }"#).unwrap();
        assert_eq!(config.seed, 7);
        assert_eq!(config.master.frame_format, FrameFormat::Long);
        assert_eq!(config.master.preamble_count, 5);
        assert_eq!(config.devices.len(), 15);
    }

    #[test]
    fn test_json_roundtrip() {
        let mut config = SimulatorConfig::default();
        config.master.preamble_count = 8;
        config.devices.truncate(2);

        let json = serde_json::to_string(&config).unwrap();
        let back: SimulatorConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(back, config);
    }
}
