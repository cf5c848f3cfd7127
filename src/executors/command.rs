use crate::core::errors::ScanFault;
use crate::plugins::types::ToolBinding;
use crate::utils::logging::quote_argv;
use crate::utils::time::format_duration;
use std::path::Path;
use std::process::{ExitStatus, Stdio};
use std::time::{Duration, Instant};
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::process::{Child, Command};
use tokio::sync::watch;

/// Captured output of one finished tool process.
#[derive(Debug, Clone)]
pub struct ProcessOutput {
    pub stdout: String,
    pub stderr: String,
    /// `-1` when the process was terminated by a signal.
    pub exit_code: i32,
    pub duration: Duration,
}

/// Checks that the binding can be started: a path must be an executable
/// file, a bare name must resolve on `PATH`, and interpreted tools need both
/// their interpreter and their script.
pub fn check_launchable(binding: &ToolBinding) -> Result<(), ScanFault> {
    let not_found = |path: &str| ScanFault::BinaryNotFound {
        tool: binding.tool.to_string(),
        path: path.to_string(),
    };

    match &binding.interpreter {
        Some(interpreter) => {
            if !is_runnable(Path::new(interpreter)) {
                return Err(not_found(interpreter));
            }
            if !binding.binary.is_file() {
                return Err(not_found(&binding.binary_arg()));
            }
        }
        None => {
            if !is_runnable(&binding.binary) {
                return Err(not_found(&binding.binary_arg()));
            }
        }
    }

    Ok(())
}

fn is_runnable(program: &Path) -> bool {
    let has_separator = program.components().count() > 1 || program.is_absolute();
    if has_separator {
        is_executable_file(program)
    } else {
        which::which(program).is_ok()
    }
}

#[cfg(unix)]
fn is_executable_file(path: &Path) -> bool {
    use std::os::unix::fs::PermissionsExt;
    path.metadata()
        .map(|m| m.is_file() && m.permissions().mode() & 0o111 != 0)
        .unwrap_or(false)
}

#[cfg(not(unix))]
fn is_executable_file(path: &Path) -> bool {
    path.is_file()
}

/// Runs one tool process under a wall-clock budget.
///
/// The child is placed in its own process group so that a timeout or a
/// cancellation kills everything it spawned, not only the direct child.
#[derive(Debug, Clone, Copy, Default)]
pub struct ProcessSupervisor;

impl ProcessSupervisor {
    pub fn new() -> Self {
        Self
    }

    /// Spawns `argv` (first element is the program), waits for it to exit
    /// and returns both streams decoded lossily.
    ///
    /// A non-zero exit status is not an error: the exit code is reported and
    /// the parser decides what the output is worth.
    pub async fn run(
        &self,
        binding: &ToolBinding,
        argv: &[String],
        cancel: Option<watch::Receiver<bool>>,
    ) -> Result<ProcessOutput, ScanFault> {
        let tool = binding.tool.to_string();
        let Some((program, args)) = argv.split_first() else {
            return Err(ScanFault::Execution {
                tool,
                message: "empty command line".to_string(),
            });
        };

        check_launchable(binding)?;

        tracing::debug!("[{}] exec: {}", tool, quote_argv(argv));
        let start = Instant::now();

        let mut cmd = Command::new(program);
        cmd.args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        #[cfg(unix)]
        cmd.process_group(0);

        let mut child = cmd.spawn().map_err(|e| match e.kind() {
            std::io::ErrorKind::NotFound => ScanFault::BinaryNotFound {
                tool: tool.clone(),
                path: program.clone(),
            },
            _ => ScanFault::Execution {
                tool: tool.clone(),
                message: format!("failed to spawn {}: {}", program, e),
            },
        })?;

        let (Some(stdout), Some(stderr)) = (child.stdout.take(), child.stderr.take()) else {
            kill_tree(&mut child).await;
            return Err(ScanFault::Execution {
                tool,
                message: "child output pipes unavailable".to_string(),
            });
        };

        let mut cancel = cancel;
        let outcome = {
            let collect = async {
                let (out, err, status) =
                    tokio::join!(read_all(stdout), read_all(stderr), child.wait());
                (out, err, status)
            };
            tokio::pin!(collect);

            tokio::select! {
                done = &mut collect => Outcome::Exited(done),
                _ = tokio::time::sleep(binding.timeout) => Outcome::TimedOut,
                _ = cancelled(&mut cancel) => Outcome::Cancelled,
            }
        };

        match outcome {
            Outcome::Exited((stdout, stderr, status)) => {
                let status = status.map_err(|e| ScanFault::Execution {
                    tool: tool.clone(),
                    message: format!("failed waiting for process: {}", e),
                })?;
                let output = ProcessOutput {
                    stdout: String::from_utf8_lossy(&stdout).into_owned(),
                    stderr: String::from_utf8_lossy(&stderr).into_owned(),
                    exit_code: exit_code(status),
                    duration: start.elapsed(),
                };
                tracing::debug!(
                    "[{}] exited with {} after {:.2}s ({} bytes stdout)",
                    tool,
                    output.exit_code,
                    output.duration.as_secs_f64(),
                    output.stdout.len()
                );
                Ok(output)
            }
            Outcome::TimedOut => {
                kill_tree(&mut child).await;
                tracing::error!("[{}] timeout after {}", tool, format_duration(binding.timeout));
                Err(ScanFault::Timeout {
                    tool,
                    limit: binding.timeout,
                })
            }
            Outcome::Cancelled => {
                kill_tree(&mut child).await;
                tracing::info!("[{}] cancelled, process tree killed", tool);
                Err(ScanFault::Cancelled { tool })
            }
        }
    }
}

enum Outcome {
    Exited((Vec<u8>, Vec<u8>, std::io::Result<ExitStatus>)),
    TimedOut,
    Cancelled,
}

async fn read_all<R: AsyncRead + Unpin>(mut reader: R) -> Vec<u8> {
    let mut buf = Vec::new();
    // a read error mid-stream keeps whatever arrived before it
    if let Err(e) = reader.read_to_end(&mut buf).await {
        tracing::debug!("output stream closed with error: {}", e);
    }
    buf
}

/// Resolves once cancellation is requested. Never resolves without a
/// receiver or after the sender is dropped.
async fn cancelled(cancel: &mut Option<watch::Receiver<bool>>) {
    let Some(rx) = cancel else {
        return std::future::pending().await;
    };
    loop {
        if *rx.borrow_and_update() {
            return;
        }
        if rx.changed().await.is_err() {
            return std::future::pending().await;
        }
    }
}

fn exit_code(status: ExitStatus) -> i32 {
    status.code().unwrap_or(-1)
}

/// Kills the child's whole process group, then reaps the child.
async fn kill_tree(child: &mut Child) {
    #[cfg(unix)]
    if let Some(pid) = child.id() {
        use nix::sys::signal::{Signal, killpg};
        use nix::unistd::Pid;

        let pgid = Pid::from_raw(pid as i32);
        if let Err(e) = killpg(pgid, Signal::SIGKILL) {
            tracing::debug!("killpg({}) failed: {}", pid, e);
        }
    }

    if let Err(e) = child.kill().await {
        tracing::debug!("kill after group signal: {}", e);
    }
}
