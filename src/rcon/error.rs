use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum RconError {
    #[error("RCON connection error: {0}")]
    Connection(String),

    #[error("RCON authentication failed: password rejected")]
    Auth,

    #[error("RCON response not received within {0:?}")]
    Timeout(Duration),

    #[error("RCON command already pending: {0}")]
    CommandPending(String),

    #[error("RCON protocol error: {0}")]
    Protocol(String),
}

impl From<std::io::Error> for RconError {
    fn from(e: std::io::Error) -> Self {
        match e.kind() {
            std::io::ErrorKind::UnexpectedEof => {
                RconError::Connection("connection closed by server".to_string())
            }
            _ => RconError::Connection(e.to_string()),
        }
    }
}
