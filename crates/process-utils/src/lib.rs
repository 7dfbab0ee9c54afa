//! Child-process helpers shared by capture backends.
//!
//! Provides command construction plus a cancellation-aware waiter that asks a
//! child to quit before killing it.

use std::collections::VecDeque;
use std::ffi::OsStr;
use std::io;
use std::process::ExitStatus;
use std::time::Duration;

use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWriteExt, BufReader};
use tokio::process::{Child, Command};
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace, warn};

#[cfg(windows)]
const CREATE_NO_WINDOW: u32 = 0x0800_0000;

/// Create a `tokio::process::Command` that is killed when its handle is
/// dropped and never opens a console window on Windows.
pub fn tokio_command(program: impl AsRef<OsStr>) -> Command {
    let mut cmd = Command::new(program);
    #[cfg(windows)]
    {
        cmd.creation_flags(CREATE_NO_WINDOW);
    }
    cmd.kill_on_drop(true);
    cmd
}

/// How a supervised child process ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcessExit {
    /// The process exited on its own.
    Exited(ExitStatus),
    /// Termination was requested through the cancellation token.
    ///
    /// `forced` is true when the process ignored the quit request and had to
    /// be killed after the grace period.
    Terminated { forced: bool },
}

impl ProcessExit {
    /// Exit code if the process exited on its own.
    pub fn code(&self) -> Option<i32> {
        match self {
            Self::Exited(status) => status.code(),
            Self::Terminated { .. } => None,
        }
    }
}

/// Wait for `child` to exit, or terminate it once `token` is cancelled.
///
/// On cancellation `quit_command` (if any) is written to the child's stdin and
/// stdin is closed. The child is killed if it is still running after `grace`.
pub async fn wait_or_terminate(
    mut child: Child,
    token: &CancellationToken,
    quit_command: Option<&[u8]>,
    grace: Duration,
) -> io::Result<ProcessExit> {
    tokio::select! {
        status = child.wait() => return status.map(ProcessExit::Exited),
        _ = token.cancelled() => {}
    }

    let pid = child.id();
    debug!(?pid, "Cancellation requested, stopping child process");

    if let Some(mut stdin) = child.stdin.take() {
        if let Some(command) = quit_command {
            if let Err(e) = stdin.write_all(command).await {
                debug!(?pid, error = %e, "Failed to send quit command");
            }
            let _ = stdin.flush().await;
        }
        drop(stdin);
    }

    match tokio::time::timeout(grace, child.wait()).await {
        Ok(status) => {
            let status = status?;
            debug!(?pid, %status, "Child process exited after quit request");
            Ok(ProcessExit::Terminated { forced: false })
        }
        Err(_) => {
            warn!(
                ?pid,
                ?grace,
                "Child process did not exit in time, killing"
            );
            child.kill().await?;
            Ok(ProcessExit::Terminated { forced: true })
        }
    }
}

/// Drain `reader` line by line, returning the last `max_lines` lines joined
/// with newlines. Invalid UTF-8 is replaced rather than treated as an error.
pub async fn read_tail<R>(reader: R, max_lines: usize) -> String
where
    R: AsyncRead + Unpin,
{
    let mut reader = BufReader::new(reader);
    let mut tail: VecDeque<String> = VecDeque::with_capacity(max_lines.min(256));
    let mut buf = Vec::new();

    loop {
        buf.clear();
        match reader.read_until(b'\n', &mut buf).await {
            Ok(0) => break,
            Ok(_) => {
                let line = String::from_utf8_lossy(&buf).trim_end().to_string();
                trace!(line = %line, "child output");
                if max_lines == 0 {
                    continue;
                }
                if tail.len() == max_lines {
                    tail.pop_front();
                }
                tail.push_back(line);
            }
            Err(e) => {
                debug!(error = %e, "Stopped reading child output");
                break;
            }
        }
    }

    Vec::from(tail).join("\n")
}
