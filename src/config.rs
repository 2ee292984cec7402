/// Defaults, data directory layout, and logging verbosity.
use std::{
    fs,
    path::{Path, PathBuf},
};

use anyhow::{anyhow, Context, Result};
use log::LevelFilter;
use rand::Rng;
use serde::{Deserialize, Serialize};

/// Port the server listens on for node connections when none is given.
pub const DEFAULT_SERVER_PORT: u16 = 3636;

/// Port the status interface listens on when none is given.
pub const DEFAULT_WEB_SERVER_PORT: u16 = 8080;

/// Substitute the documented default when the user gave no port or port 0.
pub fn resolve_port(value: Option<u16>, default: u16) -> u16 {
    match value {
        Some(0) | None => default,
        Some(port) => port,
    }
}

/// Verbosity from the global flags. Quiet wins over debug, debug and dev
/// win over the info default.
pub fn log_level(debug: bool, dev: bool, quiet: bool) -> LevelFilter {
    if quiet {
        LevelFilter::Error
    } else if debug || dev {
        LevelFilter::Debug
    } else {
        LevelFilter::Info
    }
}

/// Data directory shared by every role (`~/.envdb`). Created on first use.
pub fn data_dir() -> Result<PathBuf> {
    let home = dirs::home_dir().ok_or_else(|| anyhow!("cannot determine home directory"))?;
    let dir = home.join(".envdb");
    fs::create_dir_all(&dir)
        .with_context(|| format!("failed to create data directory {}", dir.display()))?;
    Ok(dir)
}

/// Node-local settings, kept in `node.toml` under the data directory.
///
/// The node id is generated once and reused on every later run so the
/// server sees the same identity across restarts.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeConfig {
    pub node_id: String,
}

impl NodeConfig {
    pub fn load() -> Result<Self> {
        Self::load_from(&data_dir()?)
    }

    pub fn load_from(dir: &Path) -> Result<Self> {
        let path = dir.join("node.toml");

        if path.exists() {
            let contents = fs::read_to_string(&path)
                .with_context(|| format!("failed to read {}", path.display()))?;
            let config = toml::from_str(&contents)
                .with_context(|| format!("failed to parse {}", path.display()))?;
            return Ok(config);
        }

        let config = NodeConfig {
            node_id: generate_node_id(),
        };
        let contents = toml::to_string(&config).context("failed to serialize node config")?;
        fs::write(&path, contents).with_context(|| format!("failed to write {}", path.display()))?;

        Ok(config)
    }
}

fn generate_node_id() -> String {
    format!("{:016x}", rand::rng().random::<u64>())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolve_port_substitutes_default_for_unset_or_zero() {
        assert_eq!(resolve_port(None, DEFAULT_SERVER_PORT), DEFAULT_SERVER_PORT);
        assert_eq!(resolve_port(Some(0), DEFAULT_SERVER_PORT), DEFAULT_SERVER_PORT);
    }

    #[test]
    fn resolve_port_keeps_explicit_value() {
        assert_eq!(resolve_port(Some(9000), DEFAULT_SERVER_PORT), 9000);
        assert_eq!(resolve_port(Some(1), DEFAULT_WEB_SERVER_PORT), 1);
    }

    #[test]
    fn log_level_defaults_to_info() {
        assert_eq!(log_level(false, false, false), LevelFilter::Info);
    }

    #[test]
    fn log_level_debug_and_dev_raise_verbosity() {
        assert_eq!(log_level(true, false, false), LevelFilter::Debug);
        assert_eq!(log_level(false, true, false), LevelFilter::Debug);
    }

    #[test]
    fn log_level_quiet_wins_over_everything() {
        assert_eq!(log_level(true, true, true), LevelFilter::Error);
        assert_eq!(log_level(false, false, true), LevelFilter::Error);
    }

    #[test]
    fn node_config_keeps_its_id_across_loads() {
        let dir = tempfile::tempdir().unwrap();

        let first = NodeConfig::load_from(dir.path()).unwrap();
        let second = NodeConfig::load_from(dir.path()).unwrap();

        assert_eq!(first.node_id, second.node_id);
        assert_eq!(first.node_id.len(), 16);
    }

    #[test]
    fn node_config_rejects_unparseable_file() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("node.toml"), "not valid toml [").unwrap();

        assert!(NodeConfig::load_from(dir.path()).is_err());
    }
}
