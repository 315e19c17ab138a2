// RCON client - one authenticated command/response exchange per connection

use crate::rcon::packet::{
    Packet, AUTH_FAILED_ID, SERVERDATA_AUTH_RESPONSE, SERVERDATA_RESPONSE_VALUE,
};
use crate::rcon::RconError;
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use tokio::net::TcpStream;
use tokio::sync::Mutex;

pub const DEFAULT_TIMEOUT: Duration = Duration::from_millis(3000);

/// A single RCON connection. At most one command is in flight at a time;
/// any failure closes the socket.
pub struct RconSession {
    stream: Option<TcpStream>,
    timeout: Duration,
    next_id: i32,
    authenticated: bool,
    pending_command: Option<String>,
}

impl RconSession {
    pub async fn connect(host: &str, port: u16, timeout: Duration) -> Result<Self, RconError> {
        let addr = format!("{}:{}", host, port);

        let stream = match tokio::time::timeout(timeout, TcpStream::connect(&addr)).await {
            Ok(Ok(stream)) => stream,
            Ok(Err(e)) => return Err(RconError::Connection(format!("{}: {}", addr, e))),
            Err(_) => {
                return Err(RconError::Connection(format!(
                    "{}: connect timed out after {:?}",
                    addr, timeout
                )))
            }
        };

        stream.set_nodelay(true).ok();

        Ok(Self {
            stream: Some(stream),
            timeout,
            next_id: 1,
            authenticated: false,
            pending_command: None,
        })
    }

    pub fn is_authenticated(&self) -> bool {
        self.authenticated
    }

    pub fn pending_command(&self) -> Option<&str> {
        self.pending_command.as_deref()
    }

    pub async fn authenticate(&mut self, password: &str) -> Result<(), RconError> {
        let id = self.allocate_id();
        let result = self.auth_exchange(id, password).await;
        self.close_on_error(result)
    }

    /// Send one command and wait for its response body (trimmed).
    pub async fn exec(&mut self, command: &str) -> Result<String, RconError> {
        if let Some(pending) = &self.pending_command {
            return Err(RconError::CommandPending(pending.clone()));
        }
        if !self.authenticated {
            return Err(RconError::Protocol(
                "command sent before authentication".to_string(),
            ));
        }

        let id = self.allocate_id();
        self.pending_command = Some(command.to_string());
        let result = self.exec_exchange(id, command).await;
        self.pending_command = None;
        self.close_on_error(result)
    }

    pub async fn close(mut self) {
        if let Some(mut stream) = self.stream.take() {
            stream.shutdown().await.ok();
        }
    }

    async fn auth_exchange(&mut self, id: i32, password: &str) -> Result<(), RconError> {
        let timeout = self.timeout;
        let stream = self.stream_mut()?;

        Packet::auth(id, password).write_to(stream).await?;

        let reply = tokio::time::timeout(timeout, async {
            loop {
                let packet = Packet::read_from(stream).await?;
                if packet.kind == SERVERDATA_AUTH_RESPONSE {
                    return Ok::<_, RconError>(packet);
                }
                // Source servers send an empty RESPONSE_VALUE ahead of the auth result
                tracing::debug!("Skipping packet type {} during auth", packet.kind);
            }
        })
        .await
        .map_err(|_| RconError::Timeout(timeout))??;

        if reply.id == AUTH_FAILED_ID {
            return Err(RconError::Auth);
        }
        if reply.id != id {
            return Err(RconError::Protocol(format!(
                "auth response id {} does not match request id {}",
                reply.id, id
            )));
        }

        self.authenticated = true;
        Ok(())
    }

    async fn exec_exchange(&mut self, id: i32, command: &str) -> Result<String, RconError> {
        let timeout = self.timeout;
        let stream = self.stream_mut()?;

        Packet::exec(id, command).write_to(stream).await?;

        let reply = tokio::time::timeout(timeout, async {
            loop {
                let packet = Packet::read_from(stream).await?;
                if packet.kind == SERVERDATA_RESPONSE_VALUE && packet.id == id {
                    return Ok::<_, RconError>(packet);
                }
                tracing::debug!(
                    "Ignoring RCON packet id={} type={} while waiting for {}",
                    packet.id,
                    packet.kind,
                    id
                );
            }
        })
        .await
        .map_err(|_| RconError::Timeout(timeout))??;

        Ok(reply.body.trim().to_string())
    }

    fn stream_mut(&mut self) -> Result<&mut TcpStream, RconError> {
        self.stream
            .as_mut()
            .ok_or_else(|| RconError::Connection("session is closed".to_string()))
    }

    fn allocate_id(&mut self) -> i32 {
        let id = self.next_id;
        self.next_id = self.next_id.wrapping_add(1).max(1);
        id
    }

    fn close_on_error<T>(&mut self, result: Result<T, RconError>) -> Result<T, RconError> {
        if result.is_err() {
            // Dropping the stream closes the socket immediately
            self.stream = None;
            self.authenticated = false;
        }
        result
    }
}

/// Connection parameters for one server plus a lock that keeps calls
/// made through the same client strictly one after another.
pub struct RconClient {
    host: String,
    port: u16,
    password: String,
    timeout: Duration,
    exchange: Mutex<()>,
}

impl RconClient {
    pub fn new(host: impl Into<String>, port: u16, password: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            port,
            password: password.into(),
            timeout: DEFAULT_TIMEOUT,
            exchange: Mutex::new(()),
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Connect, authenticate, run `command`, disconnect.
    pub async fn run(&self, command: &str) -> Result<String, RconError> {
        let _exchange = self.exchange.lock().await;

        tracing::debug!("RCON {}:{} <- {}", self.host, self.port, command);

        let mut session = RconSession::connect(&self.host, self.port, self.timeout).await?;
        session.authenticate(&self.password).await?;
        let response = session.exec(command).await?;
        session.close().await;

        Ok(response)
    }
}
