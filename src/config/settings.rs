use crate::error::{BlockchainError, Result};
use serde::{Deserialize, Serialize};
use std::env;
use std::fs;
use std::ops::RangeInclusive;
use std::path::Path;
use std::time::Duration;

const HOST_KEY: &str = "LEDGER_HOST";
const PORT_KEY: &str = "LEDGER_PORT";
const MINING_ADDRESS_KEY: &str = "MINING_ADDRESS";
const MINING_DIFFICULTY_KEY: &str = "MINING_DIFFICULTY";
const MINING_REWARD_KEY: &str = "MINING_REWARD";

/// Most leading zero hex digits a SHA-256 hash can have
const MAX_DIFFICULTY: usize = 64;

/// Everything one ledger node needs to start.
///
/// Built from defaults, then an optional TOML file, then environment
/// variables; the CLI applies its flags last. The node owns its copy, there
/// is no process-wide config.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LedgerConfig {
    pub host: String,
    pub port: u16,
    /// Address mining rewards are paid to; a wallet is generated when unset
    pub blockchain_address: Option<String>,
    pub difficulty: usize,
    pub mining_reward: f32,
    pub mining_interval_secs: u64,
    pub neighbor_sync_interval_secs: u64,
    pub port_range_start: u16,
    pub port_range_end: u16,
    pub ip_range_start: u8,
    pub ip_range_end: u8,
    pub peer_timeout_millis: u64,
    pub probe_timeout_millis: u64,
}

impl Default for LedgerConfig {
    fn default() -> Self {
        LedgerConfig {
            host: "127.0.0.1".to_string(),
            port: 5000,
            blockchain_address: None,
            difficulty: 3,
            mining_reward: 1.0,
            mining_interval_secs: 20,
            neighbor_sync_interval_secs: 20,
            port_range_start: 5000,
            port_range_end: 5003,
            ip_range_start: 0,
            ip_range_end: 0,
            peer_timeout_millis: 3000,
            probe_timeout_millis: 1000,
        }
    }
}

impl LedgerConfig {
    pub fn from_toml_str(content: &str) -> Result<LedgerConfig> {
        Ok(toml::from_str(content)?)
    }

    pub fn from_file(path: &Path) -> Result<LedgerConfig> {
        let content = fs::read_to_string(path).map_err(|e| {
            BlockchainError::Config(format!("Failed to read {}: {e}", path.display()))
        })?;
        Self::from_toml_str(&content)
    }

    /// Defaults, then `path` when given, then the process environment.
    pub fn load(path: Option<&Path>) -> Result<LedgerConfig> {
        let mut config = match path {
            Some(path) => Self::from_file(path)?,
            None => LedgerConfig::default(),
        };
        config.apply_overrides(|key| env::var(key).ok())?;
        Ok(config)
    }

    /// Applies `LEDGER_HOST`, `LEDGER_PORT`, `MINING_ADDRESS`,
    /// `MINING_DIFFICULTY` and `MINING_REWARD` as returned by `lookup`.
    pub fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) -> Result<()> {
        if let Some(host) = lookup(HOST_KEY) {
            self.host = host;
        }
        if let Some(port) = lookup(PORT_KEY) {
            self.port = parse_value(PORT_KEY, &port)?;
        }
        if let Some(address) = lookup(MINING_ADDRESS_KEY) {
            self.blockchain_address = Some(address);
        }
        if let Some(difficulty) = lookup(MINING_DIFFICULTY_KEY) {
            self.difficulty = parse_value(MINING_DIFFICULTY_KEY, &difficulty)?;
        }
        if let Some(reward) = lookup(MINING_REWARD_KEY) {
            self.mining_reward = parse_value(MINING_REWARD_KEY, &reward)?;
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        if self.port_range_start > self.port_range_end {
            return Err(BlockchainError::Config(format!(
                "Port range {}..={} is empty",
                self.port_range_start, self.port_range_end
            )));
        }
        if self.ip_range_start > self.ip_range_end {
            return Err(BlockchainError::Config(format!(
                "IP range {}..={} is inverted",
                self.ip_range_start, self.ip_range_end
            )));
        }
        if self.difficulty > MAX_DIFFICULTY {
            return Err(BlockchainError::Config(format!(
                "Difficulty {} exceeds {MAX_DIFFICULTY} hex digits",
                self.difficulty
            )));
        }
        if !self.mining_reward.is_finite() || self.mining_reward < 0.0 {
            return Err(BlockchainError::Config(format!(
                "Mining reward {} must be a non-negative number",
                self.mining_reward
            )));
        }
        Ok(())
    }

    pub fn node_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn port_range(&self) -> RangeInclusive<u16> {
        self.port_range_start..=self.port_range_end
    }

    pub fn ip_range(&self) -> RangeInclusive<u8> {
        self.ip_range_start..=self.ip_range_end
    }

    pub fn mining_interval(&self) -> Duration {
        Duration::from_secs(self.mining_interval_secs)
    }

    pub fn neighbor_sync_interval(&self) -> Duration {
        Duration::from_secs(self.neighbor_sync_interval_secs)
    }

    pub fn peer_timeout(&self) -> Duration {
        Duration::from_millis(self.peer_timeout_millis)
    }

    pub fn probe_timeout(&self) -> Duration {
        Duration::from_millis(self.probe_timeout_millis)
    }
}

fn parse_value<T: std::str::FromStr>(key: &str, raw: &str) -> Result<T>
where
    T::Err: std::fmt::Display,
{
    raw.trim()
        .parse()
        .map_err(|e| BlockchainError::Config(format!("Invalid {key} value '{raw}': {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::io::Write;

    #[test]
    fn test_defaults() {
        let config = LedgerConfig::default();
        assert_eq!(config.node_addr(), "127.0.0.1:5000");
        assert_eq!(config.difficulty, 3);
        assert_eq!(config.mining_reward, 1.0);
        assert_eq!(config.port_range(), 5000..=5003);
        assert_eq!(config.ip_range(), 0..=0);
        assert_eq!(config.mining_interval(), Duration::from_secs(20));
        assert!(config.blockchain_address.is_none());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let config = LedgerConfig::from_toml_str("port = 5002\ndifficulty = 2\n").unwrap();
        assert_eq!(config.port, 5002);
        assert_eq!(config.difficulty, 2);
        assert_eq!(config.host, "127.0.0.1");
        assert_eq!(config.neighbor_sync_interval_secs, 20);
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "host = \"10.0.0.5\"").unwrap();
        writeln!(file, "blockchain_address = \"1miner\"").unwrap();
        writeln!(file, "ip_range_end = 2").unwrap();
        let config = LedgerConfig::from_file(file.path()).unwrap();
        assert_eq!(config.host, "10.0.0.5");
        assert_eq!(config.blockchain_address.as_deref(), Some("1miner"));
        assert_eq!(config.ip_range(), 0..=2);
    }

    #[test]
    fn test_missing_file_is_config_error() {
        let dir = tempfile::tempdir().unwrap();
        let result = LedgerConfig::from_file(&dir.path().join("absent.toml"));
        assert!(matches!(result, Err(BlockchainError::Config(_))));
    }

    #[test]
    fn test_bad_toml_is_rejected() {
        assert!(LedgerConfig::from_toml_str("port = \"five\"").is_err());
    }

    #[test]
    fn test_env_overrides() {
        let env: HashMap<&str, &str> = [
            ("LEDGER_HOST", "192.168.0.7"),
            ("LEDGER_PORT", "5003"),
            ("MINING_ADDRESS", "1abc"),
            ("MINING_DIFFICULTY", "4"),
            ("MINING_REWARD", "2.5"),
        ]
        .into_iter()
        .collect();
        let mut config = LedgerConfig::default();
        config
            .apply_overrides(|key| env.get(key).map(|v| v.to_string()))
            .unwrap();
        assert_eq!(config.node_addr(), "192.168.0.7:5003");
        assert_eq!(config.blockchain_address.as_deref(), Some("1abc"));
        assert_eq!(config.difficulty, 4);
        assert_eq!(config.mining_reward, 2.5);
    }

    #[test]
    fn test_unparsable_override() {
        let mut config = LedgerConfig::default();
        let result = config.apply_overrides(|key| (key == PORT_KEY).then(|| "70000".to_string()));
        assert!(matches!(result, Err(BlockchainError::Config(_))));
    }

    #[test]
    fn test_validate_rejects_bad_ranges() {
        let config = LedgerConfig {
            port_range_start: 5004,
            port_range_end: 5003,
            ..LedgerConfig::default()
        };
        assert!(config.validate().is_err());

        let config = LedgerConfig {
            ip_range_start: 3,
            ip_range_end: 1,
            ..LedgerConfig::default()
        };
        assert!(config.validate().is_err());

        let config = LedgerConfig {
            difficulty: 65,
            ..LedgerConfig::default()
        };
        assert!(config.validate().is_err());
    }
}
