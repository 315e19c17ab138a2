// Instance registry - server instances read from instances.json

use crate::config::PanelConfig;
use crate::instances::ini::{read_rcon_password_from_ini, read_rcon_port_from_ini};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

pub const DEFAULT_INSTANCE_ID: &str = "default";

#[derive(Error, Debug)]
pub enum RegistryError {
    #[error("Instance with ID {0} not found")]
    NotFound(String),

    #[error("Failed to load instances configuration: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid instances configuration: {0}")]
    Parse(#[from] serde_json::Error),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServerInstance {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub service_name: String,
    pub pz_dir: PathBuf,
    pub ini_path: PathBuf,
    /// 0 means "not known yet"
    #[serde(default)]
    pub rcon_port: u16,
    #[serde(default)]
    pub rcon_host: Option<String>,
    #[serde(default)]
    pub log_path: Option<PathBuf>,
    #[serde(default)]
    pub maintenance_log_path: Option<PathBuf>,
}

#[derive(Debug, Deserialize)]
struct InstancesFile {
    instances: Vec<ServerInstance>,
}

/// Everything an RCON call or a stream operation needs to address one server
#[derive(Debug, Clone, PartialEq)]
pub struct ServerTarget {
    pub id: String,
    pub host: String,
    pub rcon_port: u16,
    pub ini_path: Option<PathBuf>,
    pub service_name: String,
    pub install_dir: PathBuf,
    pub log_path: Option<PathBuf>,
    pub maintenance_log_path: Option<PathBuf>,
}

pub struct InstanceRegistry {
    instances: Vec<ServerInstance>,
    default_host: String,
    default_port: u16,
}

impl InstanceRegistry {
    pub fn load(path: &Path, config: &PanelConfig) -> Result<Self, RegistryError> {
        let content = std::fs::read_to_string(path)?;
        let file: InstancesFile = serde_json::from_str(&content)?;
        tracing::info!("Loaded {} instance(s) from {:?}", file.instances.len(), path);
        Ok(Self::from_instances(file.instances, config))
    }

    pub fn from_instances(instances: Vec<ServerInstance>, config: &PanelConfig) -> Self {
        Self {
            instances,
            default_host: config.rcon.host.clone(),
            default_port: config.rcon.port,
        }
    }

    /// Single-instance registry built from the static service and RCON defaults
    pub fn single(config: &PanelConfig) -> Self {
        let instance = ServerInstance {
            id: DEFAULT_INSTANCE_ID.to_string(),
            name: config.service.service_name.clone(),
            description: String::new(),
            service_name: config.service.service_name.clone(),
            pz_dir: config.service.install_dir.clone(),
            ini_path: config.service.ini_path.clone().unwrap_or_default(),
            rcon_port: config.rcon.port,
            rcon_host: Some(config.rcon.host.clone()),
            log_path: config.service.log_path.clone(),
            maintenance_log_path: config.service.maintenance_log_path.clone(),
        };
        Self::from_instances(vec![instance], config)
    }

    pub fn list(&self) -> &[ServerInstance] {
        &self.instances
    }

    pub fn get(&self, id: &str) -> Option<&ServerInstance> {
        self.instances.iter().find(|i| i.id == id)
    }

    pub fn resolve_instance(&self, id: &str) -> Result<ServerTarget, RegistryError> {
        let instance = self
            .get(id)
            .ok_or_else(|| RegistryError::NotFound(id.to_string()))?;

        let ini_path = if instance.ini_path.as_os_str().is_empty() {
            None
        } else {
            Some(instance.ini_path.clone())
        };

        let rcon_port = if instance.rcon_port != 0 {
            instance.rcon_port
        } else {
            ini_path
                .as_deref()
                .and_then(read_rcon_port_from_ini)
                .unwrap_or(self.default_port)
        };

        Ok(ServerTarget {
            id: instance.id.clone(),
            host: instance
                .rcon_host
                .clone()
                .unwrap_or_else(|| self.default_host.clone()),
            rcon_port,
            ini_path,
            service_name: instance.service_name.clone(),
            install_dir: instance.pz_dir.clone(),
            log_path: instance.log_path.clone(),
            maintenance_log_path: instance.maintenance_log_path.clone(),
        })
    }
}

/// INI password if the instance has one, else the statically configured default
pub fn resolve_rcon_password(target: &ServerTarget, default_password: &str) -> String {
    target
        .ini_path
        .as_deref()
        .and_then(read_rcon_password_from_ini)
        .unwrap_or_else(|| default_password.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_file(name: &str, content: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!("pzpanel-{}", uuid::Uuid::new_v4()));
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join(name);
        std::fs::write(&path, content).unwrap();
        path
    }

    #[test]
    fn test_load_instances_file() {
        let json = r#"{
            "instances": [
                {
                    "id": "north",
                    "name": "North",
                    "serviceName": "pz-north",
                    "pzDir": "/opt/pz-north",
                    "iniPath": "/home/pz/Zomboid/Server/north.ini",
                    "rconPort": 27016,
                    "gamePort": 16261,
                    "logPath": "/home/pz/Zomboid/server-console.txt"
                }
            ]
        }"#;
        let path = temp_file("instances.json", json);
        let registry = InstanceRegistry::load(&path, &PanelConfig::default()).unwrap();

        assert_eq!(registry.list().len(), 1);
        let target = registry.resolve_instance("north").unwrap();
        assert_eq!(target.host, "127.0.0.1");
        assert_eq!(target.rcon_port, 27016);
        assert_eq!(target.service_name, "pz-north");
        assert_eq!(
            target.log_path,
            Some(PathBuf::from("/home/pz/Zomboid/server-console.txt"))
        );
        assert_eq!(target.maintenance_log_path, None);
    }

    #[test]
    fn test_unknown_instance() {
        let registry = InstanceRegistry::single(&PanelConfig::default());
        let err = registry.resolve_instance("south").unwrap_err();
        assert!(matches!(err, RegistryError::NotFound(id) if id == "south"));
    }

    #[test]
    fn test_zero_port_falls_back_to_ini() {
        let ini = temp_file("server.ini", "RCONPort=27099\nRCONPassword=fromini\n");
        let instance = ServerInstance {
            id: "custom".to_string(),
            name: "Custom".to_string(),
            description: String::new(),
            service_name: "pz-custom".to_string(),
            pz_dir: PathBuf::from("/opt/custom"),
            ini_path: ini,
            rcon_port: 0,
            rcon_host: None,
            log_path: None,
            maintenance_log_path: None,
        };
        let registry = InstanceRegistry::from_instances(vec![instance], &PanelConfig::default());
        let target = registry.resolve_instance("custom").unwrap();

        assert_eq!(target.rcon_port, 27099);
        assert_eq!(resolve_rcon_password(&target, "fallback"), "fromini");
    }

    #[test]
    fn test_password_falls_back_to_default() {
        let mut config = PanelConfig::default();
        config.rcon.password = "static".to_string();
        let registry = InstanceRegistry::single(&config);
        let target = registry.resolve_instance(DEFAULT_INSTANCE_ID).unwrap();

        assert_eq!(target.ini_path, None);
        assert_eq!(resolve_rcon_password(&target, &config.rcon.password), "static");
    }
}
