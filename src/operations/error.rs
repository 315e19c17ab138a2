use thiserror::Error;

#[derive(Error, Debug)]
pub enum OperationError {
    #[error("Unknown operation: {0}")]
    UnknownOperation(String),

    #[error("Invalid command line '{0}'")]
    InvalidCommand(String),

    #[error("Failed to start {program}: {source}")]
    Spawn {
        program: String,
        source: std::io::Error,
    },

    /// `code` is -1 when the process was terminated by a signal
    #[error("Command failed with exit code: {code}")]
    ProcessExit { code: i32, stderr: String },

    #[error("Process error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Backup failed: {0}")]
    Backup(String),
}
