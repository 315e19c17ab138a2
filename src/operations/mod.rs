mod backups;
mod bridge;
mod error;
mod events;
mod kind;
mod process;
mod status;

pub use backups::{format_bytes, BackupError, BackupInfo, BackupStore};
pub use bridge::{EventSink, OperationBridge, OperationOutcome, OperationStream, SinkClosed};
pub use error::OperationError;
pub use events::StreamEvent;
pub use kind::{FollowUp, OperationKind, OperationPlan};
pub use process::{capture_stdout, CommandSpec, OutputChunk, OutputStream, ProcessGuard};
pub use status::{service_status, ServiceStatus};
