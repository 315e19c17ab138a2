// Console service - RCON commands, broadcasts and player lists per instance

use crate::config::RconDefaults;
use crate::instances::{resolve_rcon_password, InstanceRegistry, RegistryError};
use crate::rcon::{RconClient, RconError};
use std::sync::Arc;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConsoleError {
    #[error(transparent)]
    Instance(#[from] RegistryError),

    #[error(transparent)]
    Rcon(#[from] RconError),

    #[error("Message is required")]
    EmptyMessage,
}

pub struct ConsoleService {
    registry: Arc<InstanceRegistry>,
    defaults: RconDefaults,
}

impl ConsoleService {
    pub fn new(registry: Arc<InstanceRegistry>, defaults: RconDefaults) -> Self {
        Self { registry, defaults }
    }

    /// Run one raw RCON command against an instance and return its reply
    pub async fn run_rcon_command(
        &self,
        instance_id: &str,
        command: &str,
    ) -> Result<String, ConsoleError> {
        let target = self.registry.resolve_instance(instance_id)?;
        let password = resolve_rcon_password(&target, &self.defaults.password);

        let client = RconClient::new(target.host.clone(), target.rcon_port, password)
            .with_timeout(self.defaults.timeout());

        match client.run(command).await {
            Ok(response) => Ok(response),
            Err(e) => {
                tracing::warn!(
                    "RCON command failed on {} ({}:{}): {}",
                    instance_id,
                    target.host,
                    target.rcon_port,
                    e
                );
                Err(e.into())
            }
        }
    }

    /// Broadcast an in-game message. Resolves only after the server answered.
    pub async fn send_server_message(
        &self,
        instance_id: &str,
        message: &str,
    ) -> Result<(), ConsoleError> {
        let message = message.trim();
        if message.is_empty() {
            return Err(ConsoleError::EmptyMessage);
        }

        let command = servermsg_command(message);
        let reply = self.run_rcon_command(instance_id, &command).await?;
        tracing::info!("Broadcast sent to {}: {}", instance_id, reply);
        Ok(())
    }

    pub async fn list_players(&self, instance_id: &str) -> Result<Vec<String>, ConsoleError> {
        let raw = self.run_rcon_command(instance_id, "players").await?;
        Ok(parse_players(&raw))
    }
}

/// The message goes out verbatim inside the quotes, as the server console receives it
fn servermsg_command(message: &str) -> String {
    format!("servermsg \"{}\"", message)
}

/// Player names from a `players` reply
pub fn parse_players(raw: &str) -> Vec<String> {
    raw.lines()
        .map(|line| line.trim())
        .filter(|line| !line.is_empty())
        .filter(|line| !line.starts_with("Players connected") && !line.starts_with("There are no"))
        .map(|line| line.trim_start_matches('-').trim().to_string())
        .filter(|name| !name.is_empty())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::PanelConfig;
    use crate::instances::DEFAULT_INSTANCE_ID;
    use crate::rcon::mock::{MockMode, MockServer};

    fn service_for(port: u16, password: &str) -> ConsoleService {
        let mut config = PanelConfig::default();
        config.rcon.port = port;
        config.rcon.password = password.to_string();
        config.rcon.timeout_ms = 500;
        let registry = Arc::new(InstanceRegistry::single(&config));
        ConsoleService::new(registry, config.rcon)
    }

    #[test]
    fn test_parse_players() {
        let raw = "Players connected (2):\n-alice\n-bob\n";
        assert_eq!(parse_players(raw), vec!["alice", "bob"]);
    }

    #[test]
    fn test_parse_no_players() {
        assert!(parse_players("Players connected (0):").is_empty());
        assert!(parse_players("There are no players connected").is_empty());
        assert!(parse_players("").is_empty());
    }

    #[test]
    fn test_servermsg_sends_message_verbatim() {
        assert_eq!(
            servermsg_command("Restart in 5 minutes"),
            r#"servermsg "Restart in 5 minutes""#
        );
        assert_eq!(
            servermsg_command(r#"Say "hi""#),
            r#"servermsg "Say "hi"""#
        );
    }

    #[tokio::test]
    async fn test_list_players_over_rcon() {
        let server = MockServer::spawn("secret", MockMode::Answer).await;
        let service = service_for(server.port(), "secret");

        let players = service.list_players(DEFAULT_INSTANCE_ID).await.unwrap();
        assert!(players.is_empty());
    }

    #[tokio::test]
    async fn test_broadcast_waits_for_reply() {
        let server = MockServer::spawn("secret", MockMode::Answer).await;
        let service = service_for(server.port(), "secret");

        service
            .send_server_message(DEFAULT_INSTANCE_ID, "Server restarting")
            .await
            .unwrap();
        assert_eq!(
            server.received()[0],
            "recv servermsg \"Server restarting\"".to_string()
        );
    }

    #[tokio::test]
    async fn test_broadcast_surfaces_auth_failure() {
        let server = MockServer::spawn("secret", MockMode::Answer).await;
        let service = service_for(server.port(), "wrong");

        let err = service
            .send_server_message(DEFAULT_INSTANCE_ID, "hello")
            .await
            .unwrap_err();
        assert!(matches!(err, ConsoleError::Rcon(RconError::Auth)));
    }

    #[tokio::test]
    async fn test_empty_broadcast_rejected() {
        let service = service_for(1, "secret");
        let err = service
            .send_server_message(DEFAULT_INSTANCE_ID, "   ")
            .await
            .unwrap_err();
        assert!(matches!(err, ConsoleError::EmptyMessage));
    }

    #[tokio::test]
    async fn test_unknown_instance() {
        let service = service_for(1, "secret");
        let err = service.run_rcon_command("nope", "players").await.unwrap_err();
        assert!(matches!(err, ConsoleError::Instance(RegistryError::NotFound(_))));
    }
}
