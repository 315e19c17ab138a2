// Process runner - spawns external commands and forwards their output in chunks

use crate::operations::OperationError;
#[cfg(unix)]
use nix::sys::signal::{killpg, Signal};
#[cfg(unix)]
use nix::unistd::Pid;
use std::process::{ExitStatus, Stdio};
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::process::{Child, Command};
use tokio::sync::mpsc;

const CHUNK_SIZE: usize = 4096;

/// How long a terminated group gets before SIGKILL
const KILL_GRACE: Duration = Duration::from_millis(500);

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandSpec {
    pub program: String,
    pub args: Vec<String>,
}

impl CommandSpec {
    pub fn new<I, S>(program: impl Into<String>, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            program: program.into(),
            args: args.into_iter().map(Into::into).collect(),
        }
    }

    /// Split a configured command line with shell quoting rules
    pub fn parse(line: &str) -> Result<Self, OperationError> {
        let words = shell_words::split(line)
            .map_err(|_| OperationError::InvalidCommand(line.to_string()))?;
        let mut words = words.into_iter();
        let program = words
            .next()
            .ok_or_else(|| OperationError::InvalidCommand(line.to_string()))?;
        Ok(Self::new(program, words))
    }

    pub fn display(&self) -> String {
        let mut words = vec![self.program.as_str()];
        words.extend(self.args.iter().map(String::as_str));
        shell_words::join(words)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputStream {
    Stdout,
    Stderr,
}

#[derive(Debug, Clone)]
pub struct OutputChunk {
    pub stream: OutputStream,
    pub text: String,
}

/// Owns a spawned child running in its own process group. Dropping the
/// guard kills the whole group unless the child has already been reaped;
/// SIGKILL is sent at most once.
pub struct ProcessGuard {
    child: Child,
    program: String,
    /// Process group id, equal to the child's pid
    pgid: Option<u32>,
    reaped: bool,
    killed: bool,
}

impl ProcessGuard {
    /// Spawn `spec` with piped stdout/stderr. Chunks from both pipes arrive
    /// on the returned channel in the order they were read; the channel
    /// closes once both pipes reach EOF.
    pub fn spawn(spec: &CommandSpec) -> Result<(Self, mpsc::Receiver<OutputChunk>), OperationError> {
        let mut command = Command::new(&spec.program);
        command
            .args(&spec.args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());
        // Wrappers like sudo fork the real worker; a group lets us signal both
        #[cfg(unix)]
        command.process_group(0);

        let mut child = command.spawn().map_err(|source| OperationError::Spawn {
            program: spec.program.clone(),
            source,
        })?;

        tracing::debug!("Spawned {} (pid {:?})", spec.display(), child.id());

        let (tx, rx) = mpsc::channel(64);
        if let Some(stdout) = child.stdout.take() {
            tokio::spawn(forward_output(stdout, OutputStream::Stdout, tx.clone()));
        }
        if let Some(stderr) = child.stderr.take() {
            tokio::spawn(forward_output(stderr, OutputStream::Stderr, tx));
        }

        Ok((
            Self {
                pgid: child.id(),
                child,
                program: spec.program.clone(),
                reaped: false,
                killed: false,
            },
            rx,
        ))
    }

    pub async fn wait(&mut self) -> Result<ExitStatus, OperationError> {
        let status = self.child.wait().await?;
        self.reaped = true;
        Ok(status)
    }

    /// SIGKILL the process group. No-op once the child is reaped or already killed.
    pub fn kill(&mut self) {
        if self.reaped || self.killed {
            return;
        }
        self.force_kill();
    }

    /// SIGTERM the group so sudo can relay it to its command, give it a short
    /// grace period, then SIGKILL whatever is left and reap the child.
    pub async fn kill_and_reap(&mut self) {
        if !self.reaped && !self.killed {
            self.signal_group(GroupSignal::Terminate);
            if let Ok(Ok(_)) = tokio::time::timeout(KILL_GRACE, self.child.wait()).await {
                self.reaped = true;
            }
        }

        // Descendants can outlive the group leader
        if !self.killed {
            self.force_kill();
        }

        if !self.reaped {
            if let Err(e) = self.wait().await {
                tracing::warn!("Failed to reap {}: {}", self.program, e);
            }
        }
    }

    fn force_kill(&mut self) {
        self.killed = true;
        if self.signal_group(GroupSignal::Kill) {
            tracing::info!("Killed {} (process group {:?})", self.program, self.pgid);
            return;
        }
        if self.reaped {
            return;
        }
        match self.child.start_kill() {
            Ok(()) => tracing::info!("Killed {} (pid {:?})", self.program, self.child.id()),
            Err(e) => tracing::warn!("Failed to kill {}: {}", self.program, e),
        }
    }

    /// Returns true when the signal reached the group
    #[cfg(unix)]
    fn signal_group(&self, signal: GroupSignal) -> bool {
        let Some(pgid) = self.pgid else {
            return false;
        };
        let signal = match signal {
            GroupSignal::Terminate => Signal::SIGTERM,
            GroupSignal::Kill => Signal::SIGKILL,
        };
        match killpg(Pid::from_raw(pgid as i32), signal) {
            Ok(()) => true,
            Err(nix::errno::Errno::ESRCH) => {
                tracing::debug!("Process group {} already exited", pgid);
                false
            }
            Err(e) => {
                tracing::warn!("Failed to send {:?} to process group {}: {}", signal, pgid, e);
                false
            }
        }
    }

    #[cfg(not(unix))]
    fn signal_group(&self, _signal: GroupSignal) -> bool {
        false
    }
}

#[derive(Debug, Clone, Copy)]
enum GroupSignal {
    Terminate,
    Kill,
}

impl Drop for ProcessGuard {
    fn drop(&mut self) {
        self.kill();
    }
}

/// Run `spec` to completion and collect its stdout. A non-zero exit is not an error here.
pub async fn capture_stdout(spec: &CommandSpec) -> Result<(ExitStatus, String), OperationError> {
    let (mut process, mut output) = ProcessGuard::spawn(spec)?;

    let mut stdout = String::new();
    while let Some(chunk) = output.recv().await {
        if chunk.stream == OutputStream::Stdout {
            stdout.push_str(&chunk.text);
        }
    }
    let status = process.wait().await?;
    Ok((status, stdout))
}

async fn forward_output<R>(mut reader: R, stream: OutputStream, tx: mpsc::Sender<OutputChunk>)
where
    R: AsyncRead + Unpin,
{
    let mut buf = vec![0u8; CHUNK_SIZE];
    loop {
        match reader.read(&mut buf).await {
            Ok(0) => break,
            Ok(n) => {
                let chunk = OutputChunk {
                    stream,
                    text: String::from_utf8_lossy(&buf[..n]).to_string(),
                };
                if tx.send(chunk).await.is_err() {
                    break;
                }
            }
            Err(e) => {
                tracing::debug!("Output pipe closed: {}", e);
                break;
            }
        }
    }
}
