use crate::errors::{Result, VaultError};
use crate::git::remote_url::{has_inline_credentials, redact, scrub_userinfo};
use std::io::Read;
use std::path::{Path, PathBuf};
use std::process::{Child, Command, ExitStatus, Stdio};
use std::thread;
use std::time::{Duration, Instant};

/// Runs the `git` binary in a working directory.
///
/// Local operations block until the child exits. Network operations are
/// bounded by `network_timeout`; a child that outlives it is killed.
#[derive(Debug, Clone)]
pub struct GitCommand {
    workdir: PathBuf,
    program: PathBuf,
    network_timeout: Duration,
}

/// Captured output of a successful invocation.
#[derive(Debug, Clone, Default)]
pub struct CommandOutput {
    pub stdout: String,
    pub stderr: String,
}

impl GitCommand {
    const POLL_INTERVAL: Duration = Duration::from_millis(20);

    pub fn new(workdir: &Path, network_timeout: Duration) -> Self {
        Self {
            workdir: workdir.to_path_buf(),
            program: PathBuf::from("git"),
            network_timeout,
        }
    }

    /// Use a different executable (tests use this to simulate a missing binary).
    pub fn with_program(mut self, program: impl Into<PathBuf>) -> Self {
        self.program = program.into();
        self
    }

    pub fn workdir(&self) -> &Path {
        &self.workdir
    }

    /// Run a local-only operation (add, commit, config, checkout...).
    pub fn run_local(&self, args: &[&str]) -> Result<CommandOutput> {
        self.run(args, None)
    }

    /// Run an operation that talks to a remote.
    pub fn run_network(&self, args: &[&str]) -> Result<CommandOutput> {
        self.run(args, Some(self.network_timeout))
    }

    fn run(&self, args: &[&str], timeout: Option<Duration>) -> Result<CommandOutput> {
        let shown = display_args(args);
        tracing::debug!("git {}", shown);

        let child = Command::new(&self.program)
            .args(args)
            .current_dir(&self.workdir)
            .env("GIT_TERMINAL_PROMPT", "0")
            .env("GCM_INTERACTIVE", "never")
            .env("LC_ALL", "C")
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| {
                if e.kind() == std::io::ErrorKind::NotFound {
                    VaultError::ClientMissing(format!(
                        "'{}' was not found on PATH; install git to enable synchronization",
                        self.program.display()
                    ))
                } else {
                    VaultError::ClientMissing(format!(
                        "could not start '{}': {e}",
                        self.program.display()
                    ))
                }
            })?;

        let (status, stdout, stderr) = wait_with_deadline(child, timeout).map_err(|e| match e {
            WaitError::TimedOut => VaultError::Timeout {
                command: shown.clone(),
                seconds: timeout.map(|t| t.as_secs()).unwrap_or_default(),
            },
            WaitError::Io(err) => VaultError::Io(err),
        })?;

        let stdout = scrub_userinfo(&stdout);
        let stderr = scrub_userinfo(&stderr);

        if status.success() {
            Ok(CommandOutput { stdout, stderr })
        } else {
            tracing::debug!("git {} exited with {:?}: {}", shown, status.code(), stderr.trim());
            // Some porcelain (commit) reports its reason on stdout.
            let message = if stderr.trim().is_empty() {
                stdout
            } else {
                stderr
            };
            Err(VaultError::Command {
                command: shown,
                stderr: message.trim().to_string(),
                code: status.code(),
            })
        }
    }
}

fn display_args(args: &[&str]) -> String {
    args.iter()
        .map(|arg| {
            if has_inline_credentials(arg) {
                redact(arg)
            } else {
                (*arg).to_string()
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

enum WaitError {
    TimedOut,
    Io(std::io::Error),
}

fn drain<R: Read + Send + 'static>(reader: Option<R>) -> thread::JoinHandle<String> {
    thread::spawn(move || {
        let mut buf = Vec::new();
        if let Some(mut r) = reader {
            let _ = r.read_to_end(&mut buf);
        }
        String::from_utf8_lossy(&buf).into_owned()
    })
}

fn wait_with_deadline(
    mut child: Child,
    timeout: Option<Duration>,
) -> std::result::Result<(ExitStatus, String, String), WaitError> {
    // Pipes are drained on their own threads so a chatty child cannot block
    // on a full pipe while we wait for it.
    let stdout = drain(child.stdout.take());
    let stderr = drain(child.stderr.take());

    let status = match timeout {
        None => child.wait().map_err(WaitError::Io)?,
        Some(limit) => {
            let deadline = Instant::now() + limit;
            loop {
                if let Some(status) = child.try_wait().map_err(WaitError::Io)? {
                    break status;
                }
                if Instant::now() >= deadline {
                    let _ = child.kill();
                    let _ = child.wait();
                    return Err(WaitError::TimedOut);
                }
                thread::sleep(GitCommand::POLL_INTERVAL);
            }
        }
    };

    let stdout = stdout.join().unwrap_or_default();
    let stderr = stderr.join().unwrap_or_default();
    Ok((status, stdout, stderr))
}
