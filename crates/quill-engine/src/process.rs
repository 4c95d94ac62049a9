//! Engine child process management.
//!
//! [`EngineProcess`] owns the engine child. Commands are written to its stdin
//! by a writer task; its stdout is read line by line, classified and delivered
//! as [`EngineEvent`]s on the channel returned from [`EngineProcess::spawn`].
//! Only the reader reports [`EngineEvent::Disconnect`]; a failed write just
//! stops the writer, which marks the transport as not connected.

use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;

use quill_core::{EngineEvent, EngineTransport, Error};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::process::{Child, ChildStdin, ChildStdout, Command};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::config::EngineConfig;
use crate::error::{EngineError, EngineResult};
use crate::protocol::{LineClassifier, encode_command};

/// How long a closed engine gets to exit before it is killed.
const SHUTDOWN_GRACE: Duration = Duration::from_secs(2);

/// Handle to a running engine process.
pub struct EngineProcess {
    /// The child process.
    child: Child,
    /// Lines waiting for the writer task.
    commands: mpsc::UnboundedSender<String>,
    /// Appended to commands that lack it.
    terminator: Option<String>,
    reader: JoinHandle<()>,
    writer: JoinHandle<()>,
}

impl EngineProcess {
    /// Start the engine described by `config`.
    ///
    /// Must be called from within a tokio runtime. The returned receiver yields
    /// every classified engine message and ends with [`EngineEvent::Disconnect`]
    /// once the engine closes its output.
    pub fn spawn(
        config: &EngineConfig,
    ) -> EngineResult<(Self, mpsc::UnboundedReceiver<EngineEvent>)> {
        let program = resolve_program(&config.program)?;

        let mut child = Command::new(&program)
            .args(&config.args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::inherit())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| EngineError::Spawn {
                program: program.display().to_string(),
                message: e.to_string(),
            })?;

        let stdin = child.stdin.take().ok_or_else(|| EngineError::Spawn {
            program: program.display().to_string(),
            message: "Failed to get engine stdin".to_string(),
        })?;
        let stdout = child.stdout.take().ok_or_else(|| EngineError::Spawn {
            program: program.display().to_string(),
            message: "Failed to get engine stdout".to_string(),
        })?;

        let (event_tx, event_rx) = mpsc::unbounded_channel();
        let (command_tx, command_rx) = mpsc::unbounded_channel();

        let classifier = LineClassifier::new(config.markers.clone());
        let reader = tokio::spawn(read_events(stdout, classifier, event_tx));
        let writer = tokio::spawn(write_commands(stdin, command_rx));

        info!(
            "Started engine {} (pid {:?})",
            program.display(),
            child.id()
        );

        let process = Self {
            child,
            commands: command_tx,
            terminator: config.command_terminator.clone(),
            reader,
            writer,
        };
        Ok((process, event_rx))
    }

    /// OS process id, while the child is running.
    pub fn id(&self) -> Option<u32> {
        self.child.id()
    }

    /// Close the engine's stdin and wait for it to exit, killing it if it
    /// does not exit in time.
    pub async fn shutdown(mut self) -> EngineResult<()> {
        drop(self.commands);
        let _ = self.writer.await;

        match tokio::time::timeout(SHUTDOWN_GRACE, self.child.wait()).await {
            Ok(status) => {
                let status = status?;
                debug!("Engine exited with {}", status);
            }
            Err(_) => {
                warn!("Engine did not exit after its input closed, killing it");
                self.child.kill().await?;
            }
        }

        self.reader.abort();
        Ok(())
    }
}

impl EngineTransport for EngineProcess {
    fn send_command(&mut self, command: &str) -> quill_core::Result<()> {
        let line = encode_command(command, self.terminator.as_deref());
        self.commands.send(line).map_err(|_| Error::NotConnected)
    }

    fn interrupt(&mut self) -> quill_core::Result<()> {
        let Some(pid) = self.child.id() else {
            return Err(Error::NotConnected);
        };

        #[cfg(unix)]
        {
            // SAFETY: `pid` belongs to a child we have not reaped yet.
            let rc = unsafe { libc::kill(pid as libc::pid_t, libc::SIGINT) };
            if rc != 0 {
                return Err(Error::Io(std::io::Error::last_os_error()));
            }
            debug!("Sent SIGINT to engine (pid {})", pid);
        }

        #[cfg(not(unix))]
        {
            // No soft interrupt here; the engine is restarted on reconnect
            self.child.start_kill()?;
            debug!("Killed engine (pid {})", pid);
        }

        Ok(())
    }

    fn is_connected(&self) -> bool {
        !self.commands.is_closed()
    }
}

/// Find the engine program.
///
/// Anything that looks like a path is used as given; bare names go through
/// PATH lookup.
fn resolve_program(program: &str) -> EngineResult<PathBuf> {
    if program.is_empty() {
        return Err(EngineError::ProgramNotFound(
            "no engine program configured".to_string(),
        ));
    }

    let path = Path::new(program);
    if path.components().count() > 1 || path.is_absolute() {
        if path.exists() {
            return Ok(path.to_path_buf());
        }
        return Err(EngineError::ProgramNotFound(program.to_string()));
    }

    which::which(program).map_err(|_| EngineError::ProgramNotFound(program.to_string()))
}

async fn read_events(
    stdout: ChildStdout,
    mut classifier: LineClassifier,
    events: mpsc::UnboundedSender<EngineEvent>,
) {
    let mut reader = BufReader::new(stdout);
    let mut buf = Vec::new();
    loop {
        buf.clear();
        match reader.read_until(b'\n', &mut buf).await {
            Ok(0) => {
                debug!("Engine closed its output");
                break;
            }
            Ok(_) => {
                // Engines may print text in a legacy encoding
                let line = String::from_utf8_lossy(&buf);
                if events.send(classifier.classify(&line)).is_err() {
                    return;
                }
            }
            Err(e) => {
                warn!("Failed to read engine output: {}", e);
                break;
            }
        }
    }
    let _ = events.send(EngineEvent::Disconnect);
}

async fn write_commands(mut stdin: ChildStdin, mut commands: mpsc::UnboundedReceiver<String>) {
    while let Some(line) = commands.recv().await {
        if let Err(e) = write_line(&mut stdin, &line).await {
            warn!("Failed to write to engine: {}", e);
            return;
        }
    }
}

async fn write_line(stdin: &mut ChildStdin, line: &str) -> std::io::Result<()> {
    stdin.write_all(line.as_bytes()).await?;
    stdin.flush().await
}
