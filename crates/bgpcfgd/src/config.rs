//! Configuration file support for bgpcfgd
//!
//! Loads and validates bgpcfgd configuration from TOML files.
//! Default location: /etc/sonic/bgpcfgd.toml

use std::collections::HashSet;
use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};
use sonic_bgpcfg_common::{shell::VTYSH_CMD, CfgMgrError, CfgMgrResult, DbId};

/// Default configuration file location
pub const DEFAULT_CONFIG_PATH: &str = "/etc/sonic/bgpcfgd.toml";

/// Redis server configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RedisConfig {
    /// Redis host
    #[serde(default = "default_redis_host")]
    pub host: String,

    /// Redis port
    #[serde(default = "default_redis_port")]
    pub port: u16,
}

/// One logical database of the config store
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DatabaseConfig {
    /// Logical name, e.g. CONFIG_DB
    pub name: String,

    /// Redis database number
    pub id: u32,

    /// Separator between table name and key
    #[serde(default = "default_separator")]
    pub separator: String,
}

impl DatabaseConfig {
    fn from_db(db: DbId) -> Self {
        Self {
            name: db.name().to_string(),
            id: db.id(),
            separator: db.separator().to_string(),
        }
    }

    /// Separator as a single character
    pub fn separator_char(&self) -> char {
        self.separator.chars().next().unwrap_or('|')
    }
}

/// Routing daemon shell configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VtyshConfig {
    /// Path of the vtysh binary
    #[serde(default = "default_vtysh_path")]
    pub path: String,
}

/// Logging configuration
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogConfig {
    /// Filter directive, overridden by the command line. When unset,
    /// RUST_LOG applies, then `info`.
    #[serde(default)]
    pub level: Option<String>,
}

/// Complete bgpcfgd configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DaemonConfig {
    /// Redis server
    #[serde(default)]
    pub redis: RedisConfig,

    /// Databases to watch
    #[serde(default = "default_databases")]
    pub databases: Vec<DatabaseConfig>,

    /// vtysh invocation
    #[serde(default)]
    pub vtysh: VtyshConfig,

    /// Logging
    #[serde(default)]
    pub log: LogConfig,
}

// Default functions
fn default_redis_host() -> String {
    "127.0.0.1".to_string()
}

fn default_redis_port() -> u16 {
    6379
}

fn default_separator() -> String {
    "|".to_string()
}

fn default_databases() -> Vec<DatabaseConfig> {
    [DbId::ConfigDb, DbId::ApplDb, DbId::StateDb]
        .into_iter()
        .map(DatabaseConfig::from_db)
        .collect()
}

fn default_vtysh_path() -> String {
    VTYSH_CMD.to_string()
}

// Default implementations
impl Default for RedisConfig {
    fn default() -> Self {
        Self {
            host: default_redis_host(),
            port: default_redis_port(),
        }
    }
}

impl Default for VtyshConfig {
    fn default() -> Self {
        Self {
            path: default_vtysh_path(),
        }
    }
}

impl Default for DaemonConfig {
    fn default() -> Self {
        Self {
            redis: RedisConfig::default(),
            databases: default_databases(),
            vtysh: VtyshConfig::default(),
            log: LogConfig::default(),
        }
    }
}

impl DaemonConfig {
    /// Load configuration from file, falling back to defaults if file not found
    pub fn load(path: impl AsRef<Path>) -> CfgMgrResult<Self> {
        let path = path.as_ref();

        let config = match fs::read_to_string(path) {
            Ok(content) => Self::from_toml(&content)
                .map_err(|e| CfgMgrError::config_file(path.display().to_string(), e.to_string()))?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                eprintln!(
                    "bgpcfgd: Config file {} not found, using defaults",
                    path.display()
                );
                Self::default()
            }
            Err(e) => {
                return Err(CfgMgrError::config_file(
                    path.display().to_string(),
                    e.to_string(),
                ))
            }
        };

        config.validate()?;
        Ok(config)
    }

    /// Parse configuration from TOML text
    pub fn from_toml(content: &str) -> CfgMgrResult<Self> {
        toml::from_str(content).map_err(|e| CfgMgrError::invalid_config("toml", e.to_string()))
    }

    /// Redis connection URL for a database number
    pub fn redis_url(&self, id: u32) -> String {
        format!("redis://{}:{}/{}", self.redis.host, self.redis.port, id)
    }

    /// Look up a database by logical name
    pub fn database(&self, name: &str) -> Option<&DatabaseConfig> {
        self.databases.iter().find(|db| db.name == name)
    }

    /// Validate configuration
    pub fn validate(&self) -> CfgMgrResult<()> {
        if self.redis.port == 0 {
            return Err(CfgMgrError::invalid_config("redis.port", "must be > 0"));
        }

        if self.databases.is_empty() {
            return Err(CfgMgrError::invalid_config(
                "databases",
                "at least one database is required",
            ));
        }

        let mut names = HashSet::new();
        let mut ids = HashSet::new();
        for db in &self.databases {
            if db.name.is_empty() {
                return Err(CfgMgrError::invalid_config("databases.name", "must not be empty"));
            }
            if !names.insert(db.name.as_str()) {
                return Err(CfgMgrError::invalid_config(
                    "databases.name",
                    format!("duplicate database {}", db.name),
                ));
            }
            if !ids.insert(db.id) {
                return Err(CfgMgrError::invalid_config(
                    "databases.id",
                    format!("database id {} used twice", db.id),
                ));
            }
            if db.separator.chars().count() != 1 {
                return Err(CfgMgrError::invalid_config(
                    "databases.separator",
                    format!("{} separator must be one character", db.name),
                ));
            }
        }

        if self.vtysh.path.trim().is_empty() {
            return Err(CfgMgrError::invalid_config("vtysh.path", "must not be empty"));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::io::Write;

    #[test]
    fn test_default_config() {
        let config = DaemonConfig::default();
        assert_eq!(config.redis.host, "127.0.0.1");
        assert_eq!(config.redis.port, 6379);
        assert_eq!(config.vtysh.path, "/usr/bin/vtysh");
        assert_eq!(config.log.level, None);
        assert!(config.validate().is_ok());

        let config_db = config.database("CONFIG_DB").unwrap();
        assert_eq!(config_db.id, 4);
        assert_eq!(config_db.separator_char(), '|');
        assert_eq!(config.database("APPL_DB").unwrap().separator_char(), ':');
        assert_eq!(config.database("STATE_DB").unwrap().id, 6);
    }

    #[test]
    fn test_toml_deserialization() {
        let config = DaemonConfig::from_toml(
            r#"
[redis]
host = "10.0.0.5"

[[databases]]
name = "CONFIG_DB"
id = 4

[vtysh]
path = "/usr/local/bin/vtysh"
"#,
        )
        .unwrap();

        assert_eq!(config.redis.host, "10.0.0.5");
        // Unspecified values should use defaults
        assert_eq!(config.redis.port, 6379);
        assert_eq!(config.databases.len(), 1);
        assert_eq!(config.databases[0].separator, "|");
        assert_eq!(config.vtysh.path, "/usr/local/bin/vtysh");
        assert_eq!(config.log.level, None);
        assert_eq!(config.redis_url(4), "redis://10.0.0.5:6379/4");
    }

    #[test]
    fn test_validate_rejects_bad_databases() {
        let mut config = DaemonConfig::default();
        config.databases[1].name = "CONFIG_DB".to_string();
        assert!(config.validate().is_err());

        let mut config = DaemonConfig::default();
        config.databases[1].id = 4;
        assert!(config.validate().is_err());

        let mut config = DaemonConfig::default();
        config.databases[0].separator = "||".to_string();
        assert!(config.validate().is_err());

        let mut config = DaemonConfig::default();
        config.databases.clear();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_empty_vtysh_path() {
        let mut config = DaemonConfig::default();
        config.vtysh.path = "  ".to_string();
        assert!(config.validate().is_err());

        let mut config = DaemonConfig::default();
        config.redis.port = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_load_nonexistent_file_defaults() {
        let config = DaemonConfig::load("/nonexistent/bgpcfgd.toml").unwrap();
        assert_eq!(config, DaemonConfig::default());
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[log]\nlevel = \"debug\"").unwrap();

        let config = DaemonConfig::load(file.path()).unwrap();
        assert_eq!(config.log.level.as_deref(), Some("debug"));
        assert_eq!(config.databases, DaemonConfig::default().databases);
    }

    #[test]
    fn test_load_invalid_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[redis]\nport = \"not a number\"").unwrap();
        assert!(matches!(
            DaemonConfig::load(file.path()),
            Err(CfgMgrError::ConfigFile { .. })
        ));

        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[vtysh]\npath = \"\"").unwrap();
        assert!(matches!(
            DaemonConfig::load(file.path()),
            Err(CfgMgrError::InvalidConfig { .. })
        ));
    }
}
