// Operation stream bridge - runs one server operation and streams its progress
// to exactly one subscriber, killing the child process if the subscriber leaves

use crate::config::{BackupConfig, OperationsConfig};
use crate::instances::{InstanceRegistry, RegistryError, ServerTarget};
use crate::operations::backups::{BackupInfo, BackupStore};
use crate::operations::events::StreamEvent;
use crate::operations::kind::{FollowUp, OperationKind, OperationPlan};
use crate::operations::process::{CommandSpec, OutputStream, ProcessGuard};
use crate::operations::status::{service_status, ServiceStatus};
use crate::operations::OperationError;
use async_trait::async_trait;
use futures_util::Stream;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use thiserror::Error;
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use uuid::Uuid;

const EVENT_BUFFER: usize = 64;
const STDERR_TAIL_LIMIT: usize = 2048;

#[derive(Error, Debug)]
#[error("Subscriber disconnected")]
pub struct SinkClosed;

/// Where stream events go. `closed` resolves once the subscriber is gone.
#[async_trait]
pub trait EventSink: Send + Sync {
    async fn emit(&self, event: StreamEvent) -> Result<(), SinkClosed>;

    async fn closed(&self);
}

#[async_trait]
impl EventSink for mpsc::Sender<StreamEvent> {
    async fn emit(&self, event: StreamEvent) -> Result<(), SinkClosed> {
        self.send(event).await.map_err(|_| SinkClosed)
    }

    async fn closed(&self) {
        mpsc::Sender::closed(self).await
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OperationOutcome {
    Succeeded,
    Failed,
    /// The subscriber disconnected; no terminal event was sent
    Cancelled,
}

/// Marker for "subscriber is gone, stop writing"
struct Cancelled;

async fn emit(sink: &dyn EventSink, event: StreamEvent) -> Result<(), Cancelled> {
    sink.emit(event).await.map_err(|_| Cancelled)
}

/// Events of one running operation. Dropping the stream cancels the operation.
pub struct OperationStream {
    inner: ReceiverStream<StreamEvent>,
}

impl Stream for OperationStream {
    type Item = StreamEvent;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<StreamEvent>> {
        Pin::new(&mut self.inner).poll_next(cx)
    }
}

#[derive(Clone)]
pub struct OperationBridge {
    registry: Arc<InstanceRegistry>,
    ops: OperationsConfig,
    backups: BackupConfig,
}

impl OperationBridge {
    pub fn new(registry: Arc<InstanceRegistry>, ops: OperationsConfig, backups: BackupConfig) -> Self {
        Self {
            registry,
            ops,
            backups,
        }
    }

    /// Start `kind` against an instance in the background and return its event stream
    pub fn stream_operation(
        &self,
        instance_id: &str,
        kind: OperationKind,
    ) -> Result<OperationStream, RegistryError> {
        let target = self.registry.resolve_instance(instance_id)?;
        let (tx, rx) = mpsc::channel(EVENT_BUFFER);

        let bridge = self.clone();
        tokio::spawn(async move {
            bridge.run_kind(kind, &target, &tx).await;
        });

        Ok(OperationStream {
            inner: ReceiverStream::new(rx),
        })
    }

    /// Current systemd state of an instance's service
    pub async fn service_status(&self, instance_id: &str) -> Result<ServiceStatus, RegistryError> {
        let target = self.registry.resolve_instance(instance_id)?;
        Ok(service_status(&target, &self.ops).await)
    }

    pub async fn run_kind(
        &self,
        kind: OperationKind,
        target: &ServerTarget,
        sink: &dyn EventSink,
    ) -> OperationOutcome {
        match kind.plan(target, &self.ops, &self.backups) {
            Ok(plan) => self.run(plan, sink).await,
            Err(e) => {
                tracing::error!("Cannot plan {} for {}: {}", kind, target.id, e);
                match report_failure(sink, &e, "Operation failed").await {
                    Ok(()) => OperationOutcome::Failed,
                    Err(Cancelled) => OperationOutcome::Cancelled,
                }
            }
        }
    }

    pub async fn run(&self, plan: OperationPlan, sink: &dyn EventSink) -> OperationOutcome {
        let operation_id = Uuid::new_v4().to_string()[..8].to_string();
        tracing::info!(
            "Operation {} ({}) started: {}",
            operation_id,
            plan.kind,
            plan.primary.display()
        );

        let outcome = match self.drive(&plan, sink).await {
            Ok(true) => OperationOutcome::Succeeded,
            Ok(false) => OperationOutcome::Failed,
            Err(Cancelled) => OperationOutcome::Cancelled,
        };

        if outcome == OperationOutcome::Cancelled {
            tracing::info!("Operation {} aborted by client", operation_id);
        } else {
            tracing::info!("Operation {} finished: {:?}", operation_id, outcome);
        }
        outcome
    }

    /// Ok(true) on success, Ok(false) on a reported failure
    async fn drive(&self, plan: &OperationPlan, sink: &dyn EventSink) -> Result<bool, Cancelled> {
        for line in &plan.banner {
            emit(sink, StreamEvent::log(line.clone())).await?;
        }

        // Archives present before the command ran cannot be its result
        let existing = match &plan.follow_up {
            FollowUp::ReportArchive(dir) => match BackupStore::new(dir.clone()).list().await {
                Ok(existing) => existing,
                Err(e) => {
                    tracing::warn!("Cannot list {:?} before backup: {}", dir, e);
                    Vec::new()
                }
            },
            _ => Vec::new(),
        };

        if let Err(e) = self.run_command(&plan.primary, sink).await? {
            tracing::warn!("{} failed: {}", plan.kind, e);
            report_failure(sink, &e, &plan.failure_message).await?;
            return Ok(false);
        }
        emit(sink, StreamEvent::log(plan.success_log.clone())).await?;

        let message = match &plan.follow_up {
            FollowUp::None => plan.success_message.clone(),
            FollowUp::Journal(journal) => {
                self.settle(sink).await?;
                emit(sink, StreamEvent::log("📋 Fetching service logs...")).await?;
                // The service command already succeeded; a missing journal is only a warning
                if let Err(e) = self.run_command(journal, sink).await? {
                    tracing::warn!("Journal fetch failed: {}", e);
                    emit(sink, StreamEvent::log(format!("⚠️ Could not fetch service logs: {}", e)))
                        .await?;
                }
                plan.success_message.clone()
            }
            FollowUp::ReportArchive(dir) => {
                let latest = BackupStore::new(dir.clone())
                    .list()
                    .await
                    .map_err(|e| OperationError::Backup(e.to_string()))
                    .and_then(|after| {
                        new_archive(&existing, after).ok_or_else(|| {
                            OperationError::Backup(format!(
                                "backup command wrote no new archive to {}",
                                dir.display()
                            ))
                        })
                    });

                match latest {
                    Ok(backup) => {
                        emit(sink, StreamEvent::log(format!("✅ Backup created: {}", backup.filename)))
                            .await?;
                        emit(sink, StreamEvent::log(format!("📁 Path: {}", backup.path.display())))
                            .await?;
                        emit(
                            sink,
                            StreamEvent::log(format!(
                                "📦 Size: {:.2} MB",
                                backup.size as f64 / 1024.0 / 1024.0
                            )),
                        )
                        .await?;
                        format!("{}: {}", plan.success_message, backup.filename)
                    }
                    Err(e) => {
                        tracing::warn!("{}", e);
                        report_failure(sink, &e, &plan.failure_message).await?;
                        return Ok(false);
                    }
                }
            }
        };

        emit(sink, StreamEvent::complete(true, message)).await?;
        Ok(true)
    }

    /// Run one command to completion, forwarding every output chunk as a log event.
    /// The outer Err means the subscriber left and the child has been killed.
    async fn run_command(
        &self,
        spec: &CommandSpec,
        sink: &dyn EventSink,
    ) -> Result<Result<(), OperationError>, Cancelled> {
        let (mut process, mut output) = match ProcessGuard::spawn(spec) {
            Ok(spawned) => spawned,
            Err(e) => return Ok(Err(e)),
        };

        let mut stderr_tail = String::new();
        loop {
            let next = tokio::select! {
                _ = sink.closed() => None,
                chunk = output.recv() => Some(chunk),
            };

            let chunk = match next {
                Some(Some(chunk)) => chunk,
                Some(None) => break,
                None => {
                    process.kill_and_reap().await;
                    return Err(Cancelled);
                }
            };

            if chunk.stream == OutputStream::Stderr {
                push_tail(&mut stderr_tail, &chunk.text);
            }
            if emit(sink, StreamEvent::log(chunk.text)).await.is_err() {
                process.kill_and_reap().await;
                return Err(Cancelled);
            }
        }

        let waited = tokio::select! {
            _ = sink.closed() => None,
            status = process.wait() => Some(status),
        };

        let status = match waited {
            Some(status) => status,
            None => {
                process.kill_and_reap().await;
                return Err(Cancelled);
            }
        };

        Ok(match status {
            Ok(status) if status.success() => Ok(()),
            Ok(status) => Err(OperationError::ProcessExit {
                code: status.code().unwrap_or(-1),
                stderr: stderr_tail,
            }),
            Err(e) => Err(e),
        })
    }

    async fn settle(&self, sink: &dyn EventSink) -> Result<(), Cancelled> {
        let delay = self.ops.settle_delay();
        if delay.is_zero() {
            return Ok(());
        }

        let cancelled = tokio::select! {
            _ = sink.closed() => true,
            _ = tokio::time::sleep(delay) => false,
        };
        if cancelled {
            Err(Cancelled)
        } else {
            Ok(())
        }
    }
}

/// Newest archive in `after` that was absent from, or changed since, `before`
fn new_archive(before: &[BackupInfo], after: Vec<BackupInfo>) -> Option<BackupInfo> {
    after.into_iter().find(|archive| {
        !before.iter().any(|old| {
            old.filename == archive.filename
                && old.created == archive.created
                && old.size == archive.size
        })
    })
}

async fn report_failure(
    sink: &dyn EventSink,
    error: &OperationError,
    message: &str,
) -> Result<(), Cancelled> {
    let detail = match error {
        OperationError::ProcessExit { stderr, .. } if !stderr.trim().is_empty() => {
            format!("{}: {}", error, stderr.trim())
        }
        OperationError::Spawn { .. } => format!("Process error: {}", error),
        _ => error.to_string(),
    };

    emit(sink, StreamEvent::error(detail)).await?;
    emit(sink, StreamEvent::complete(false, message)).await
}

fn push_tail(tail: &mut String, text: &str) {
    tail.push_str(text);
    if tail.len() > STDERR_TAIL_LIMIT {
        let mut cut = tail.len() - STDERR_TAIL_LIMIT;
        while !tail.is_char_boundary(cut) {
            cut += 1;
        }
        tail.drain(..cut);
    }
}
