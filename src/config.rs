// Panel configuration - static defaults, JSON file and environment overrides

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file {path:?}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Invalid config file {path:?}: {source}")]
    Parse {
        path: PathBuf,
        source: serde_json::Error,
    },

    #[error("Invalid value for environment variable {key}: {value}")]
    InvalidEnv { key: String, value: String },
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct PanelConfig {
    pub http: HttpConfig,
    pub rcon: RconDefaults,
    pub service: ServiceDefaults,
    pub operations: OperationsConfig,
    pub backups: BackupConfig,
    /// Path to `instances.json`. Without it the panel manages a single
    /// instance built from `service` and `rcon`.
    pub instances_path: Option<PathBuf>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct HttpConfig {
    pub bind: String,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            bind: "0.0.0.0:3000".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct RconDefaults {
    pub host: String,
    pub port: u16,
    pub password: String,
    pub timeout_ms: u64,
}

impl Default for RconDefaults {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 27015,
            password: String::new(),
            timeout_ms: 3000,
        }
    }
}

impl RconDefaults {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ServiceDefaults {
    pub service_name: String,
    pub install_dir: PathBuf,
    pub ini_path: Option<PathBuf>,
    pub log_path: Option<PathBuf>,
    pub maintenance_log_path: Option<PathBuf>,
}

impl Default for ServiceDefaults {
    fn default() -> Self {
        Self {
            service_name: "pzserver".to_string(),
            install_dir: PathBuf::from("/opt/pzserver"),
            ini_path: None,
            log_path: None,
            maintenance_log_path: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct OperationsConfig {
    /// Prefix service control and journal commands with `sudo`
    pub use_sudo: bool,
    pub systemctl: String,
    pub journalctl: String,
    pub journal_lines: u32,
    /// Wait between a successful service command and the journal fetch
    pub settle_delay_ms: u64,
    pub steamcmd: String,
    pub steam_app_id: u32,
    /// Used for uptime and memory of the service's main process
    pub ps: String,
}

impl Default for OperationsConfig {
    fn default() -> Self {
        Self {
            use_sudo: true,
            systemctl: "systemctl".to_string(),
            journalctl: "journalctl".to_string(),
            journal_lines: 20,
            settle_delay_ms: 2000,
            steamcmd: "steamcmd".to_string(),
            steam_app_id: 380870,
            ps: "ps".to_string(),
        }
    }
}

impl OperationsConfig {
    pub fn settle_delay(&self) -> Duration {
        Duration::from_millis(self.settle_delay_ms)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct BackupConfig {
    pub dir: PathBuf,
    /// Full command line, split with shell quoting rules
    pub command: String,
}

impl Default for BackupConfig {
    fn default() -> Self {
        Self {
            dir: PathBuf::from("/opt/pzserver/backups"),
            command: "sudo /opt/pzserver/scripts/backup.sh".to_string(),
        }
    }
}

impl PanelConfig {
    /// Load the config file if present, then apply environment overrides.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let mut config = if path.exists() {
            let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
                path: path.to_path_buf(),
                source,
            })?;
            serde_json::from_str(&content).map_err(|source| ConfigError::Parse {
                path: path.to_path_buf(),
                source,
            })?
        } else {
            tracing::info!("No config file at {:?}, using defaults", path);
            PanelConfig::default()
        };

        config.apply_overrides(|key| std::env::var(key).ok())?;
        Ok(config)
    }

    /// `$PZPANEL_CONFIG`, or `~/PzPanel/config/panel.json`
    pub fn default_path() -> PathBuf {
        if let Ok(path) = std::env::var("PZPANEL_CONFIG") {
            return PathBuf::from(path);
        }

        directories::UserDirs::new()
            .map(|d| d.home_dir().to_path_buf())
            .unwrap_or_else(|| PathBuf::from("."))
            .join("PzPanel")
            .join("config")
            .join("panel.json")
    }

    fn apply_overrides<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(host) = lookup("PZ_RCON_HOST") {
            self.rcon.host = host;
        }
        if let Some(port) = lookup("PZ_RCON_PORT") {
            self.rcon.port = port.trim().parse().map_err(|_| ConfigError::InvalidEnv {
                key: "PZ_RCON_PORT".to_string(),
                value: port.clone(),
            })?;
        }
        if let Some(password) = lookup("PZ_RCON_PASSWORD") {
            self.rcon.password = password;
        }
        if let Some(service) = lookup("PZ_SERVICE") {
            self.service.service_name = service;
        }
        if let Some(dir) = lookup("PZ_DIR") {
            self.service.install_dir = PathBuf::from(dir);
        }
        if let Some(ini) = lookup("PZ_INI_PATH") {
            self.service.ini_path = Some(PathBuf::from(ini));
        }
        if let Some(log) = lookup("PZ_LOG_PATH") {
            self.service.log_path = Some(PathBuf::from(log));
        }
        if let Some(log) = lookup("PZ_MAINTENANCE_LOG_PATH") {
            self.service.maintenance_log_path = Some(PathBuf::from(log));
        }
        if let Some(steamcmd) = lookup("PZ_STEAMCMD_PATH") {
            self.operations.steamcmd = steamcmd;
        }
        if let Some(bind) = lookup("PZPANEL_BIND") {
            self.http.bind = bind;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_partial_json_keeps_defaults() {
        let json = r#"{"rcon": {"port": 16262}, "operations": {"settleDelayMs": 500}}"#;
        let config: PanelConfig = serde_json::from_str(json).unwrap();

        assert_eq!(config.rcon.port, 16262);
        assert_eq!(config.rcon.host, "127.0.0.1");
        assert_eq!(config.rcon.timeout_ms, 3000);
        assert_eq!(config.operations.settle_delay(), Duration::from_millis(500));
        assert_eq!(config.operations.journal_lines, 20);
        assert_eq!(config.operations.steam_app_id, 380870);
    }

    #[test]
    fn test_env_overrides() {
        let mut env = HashMap::new();
        env.insert("PZ_RCON_PORT", "27020");
        env.insert("PZ_RCON_PASSWORD", "hunter2");
        env.insert("PZ_SERVICE", "pz-north");
        env.insert("PZ_LOG_PATH", "/var/log/pz/server.log");

        let mut config = PanelConfig::default();
        config
            .apply_overrides(|key| env.get(key).map(|v| v.to_string()))
            .unwrap();

        assert_eq!(config.rcon.port, 27020);
        assert_eq!(config.rcon.password, "hunter2");
        assert_eq!(config.service.service_name, "pz-north");
        assert_eq!(config.service.log_path, Some(PathBuf::from("/var/log/pz/server.log")));
        assert_eq!(config.service.maintenance_log_path, None);
    }

    #[test]
    fn test_invalid_port_override() {
        let mut config = PanelConfig::default();
        let result = config.apply_overrides(|key| {
            (key == "PZ_RCON_PORT").then(|| "not-a-port".to_string())
        });

        assert!(matches!(result, Err(ConfigError::InvalidEnv { .. })));
    }

    #[test]
    fn test_missing_file_uses_defaults() {
        let path = std::env::temp_dir().join(format!("pzpanel-{}.json", uuid::Uuid::new_v4()));
        let config = PanelConfig::load(&path).unwrap();
        assert_eq!(config.backups.dir, PathBuf::from("/opt/pzserver/backups"));
    }
}
