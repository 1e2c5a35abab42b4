//! Server child-process lifecycle.
//!
//! [`ServerTransport`] is the seam between the harness and how a server
//! process is obtained. The shipping implementation is [`StdioServer`], which
//! spawns the configured binary with piped stdin/stdout and wraps them in a
//! [`Channel`]. [`ServerProcess::shutdown`] closes stdin, signals termination,
//! and reaps the child so no zombie is left behind.
//!
//! Children are spawned with `kill_on_drop(true)`: if a [`ServerProcess`] is
//! dropped without an orderly shutdown (early return, panic), the child is
//! still killed.

use std::process::{ExitStatus, Stdio};
use std::time::Duration;

use async_trait::async_trait;
use tokio::process::{Child, ChildStdin, ChildStdout, Command};

use crate::channel::Channel;
use crate::config::HarnessConfig;
use crate::error::HarnessError;

/// Channel over a child's stdin/stdout pipes.
pub type StdioChannel = Channel<ChildStdin, ChildStdout>;

/// Program, argument vector, and environment for the server process.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerCommand {
    pub program: String,
    pub args: Vec<String>,
    pub env: Vec<(String, String)>,
    /// Pass the child's stderr through instead of discarding it.
    pub inherit_stderr: bool,
}

impl ServerCommand {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            env: Vec::new(),
            inherit_stderr: false,
        }
    }

    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.push((key.into(), value.into()));
        self
    }

    /// `<server_bin> -c <server_config> serve --transport <transport>`
    pub fn from_config(config: &HarnessConfig) -> Self {
        let mut cmd = Self::new(&config.server_bin)
            .arg("-c")
            .arg(&config.server_config)
            .arg("serve")
            .arg("--transport")
            .arg(&config.transport);
        cmd.inherit_stderr = config.inherit_stderr;
        cmd
    }
}

/// Obtains a running server process.
///
/// The trait is object-safe via [`async_trait`] so the harness can hold a
/// `&dyn ServerTransport`.
///
/// # Errors
///
/// `spawn` returns [`HarnessError::Spawn`] if the process cannot be started.
#[async_trait]
pub trait ServerTransport: Send + Sync + std::fmt::Debug {
    async fn spawn(&self) -> Result<ServerProcess, HarnessError>;
}

/// Transport that spawns the server as a subprocess speaking JSON-RPC on stdio.
#[derive(Debug, Clone)]
pub struct StdioServer {
    command: ServerCommand,
    max_noise_lines: Option<usize>,
}

impl StdioServer {
    pub fn new(command: ServerCommand) -> Self {
        Self {
            command,
            max_noise_lines: None,
        }
    }

    pub fn from_config(config: &HarnessConfig) -> Self {
        Self::new(ServerCommand::from_config(config)).with_noise_limit(config.max_noise_lines)
    }

    /// Cap on non-response lines skipped per exchange; `None` is unlimited.
    pub fn with_noise_limit(mut self, limit: Option<usize>) -> Self {
        self.max_noise_lines = limit;
        self
    }
}

#[async_trait]
impl ServerTransport for StdioServer {
    async fn spawn(&self) -> Result<ServerProcess, HarnessError> {
        let mut cmd = Command::new(&self.command.program);
        cmd.args(&self.command.args)
            .envs(self.command.env.iter().map(|(k, v)| (k, v)))
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(if self.command.inherit_stderr {
                Stdio::inherit()
            } else {
                Stdio::null()
            })
            .kill_on_drop(true);

        tracing::info!(program = %self.command.program, args = ?self.command.args, "spawning server process");
        let child = cmd.spawn().map_err(|source| HarnessError::Spawn {
            program: self.command.program.clone(),
            source,
        })?;

        let mut process = ServerProcess::from_child(child, &self.command.program)?;
        if self.max_noise_lines.is_some() {
            process.channel = process.channel.with_noise_limit(self.max_noise_lines);
        }
        Ok(process)
    }
}

/// A running server process and the channel over its stdio.
#[derive(Debug)]
pub struct ServerProcess {
    channel: StdioChannel,
    child: Child,
}

impl ServerProcess {
    /// Take the piped stdin/stdout out of `child` and wrap them in a channel.
    ///
    /// # Errors
    ///
    /// Returns [`HarnessError::Spawn`] if either pipe was not configured.
    pub fn from_child(mut child: Child, program: &str) -> Result<Self, HarnessError> {
        let missing = |what: &str| HarnessError::Spawn {
            program: program.to_string(),
            source: std::io::Error::other(format!("child {what} was not piped")),
        };
        let stdin = child.stdin.take().ok_or_else(|| missing("stdin"))?;
        let stdout = child.stdout.take().ok_or_else(|| missing("stdout"))?;
        Ok(Self {
            channel: Channel::new(stdin, stdout),
            child,
        })
    }

    pub fn channel(&mut self) -> &mut StdioChannel {
        &mut self.channel
    }

    /// OS process id, `None` once the child has been reaped.
    pub fn pid(&self) -> Option<u32> {
        self.child.id()
    }

    /// Exit status if the child has already exited, without blocking.
    pub fn try_exit_status(&mut self) -> Option<ExitStatus> {
        self.child.try_wait().ok().flatten()
    }

    /// Close stdin, signal termination, and wait for the child to exit.
    ///
    /// If the child has not exited within `grace` after the termination
    /// signal, it is force-killed. The returned status is the reaped exit
    /// status.
    ///
    /// # Errors
    ///
    /// Returns [`HarnessError::Shutdown`] if signalling or waiting fails.
    pub async fn shutdown(self, grace: Duration) -> Result<ExitStatus, HarnessError> {
        let Self { channel, mut child } = self;
        drop(channel);

        if let Some(status) = child.try_wait().map_err(HarnessError::Shutdown)? {
            tracing::info!(%status, "server process had already exited");
            return Ok(status);
        }

        terminate(&mut child);
        match tokio::time::timeout(grace, child.wait()).await {
            Ok(status) => {
                let status = status.map_err(HarnessError::Shutdown)?;
                tracing::info!(%status, "server process exited");
                Ok(status)
            }
            Err(_elapsed) => {
                tracing::warn!(
                    "server process ignored termination for {}ms; killing",
                    grace.as_millis()
                );
                child.kill().await.map_err(HarnessError::Shutdown)?;
                child.wait().await.map_err(HarnessError::Shutdown)
            }
        }
    }
}

#[cfg(unix)]
fn terminate(child: &mut Child) {
    let Some(pid) = child.id() else {
        return;
    };
    let Ok(pid) = libc::pid_t::try_from(pid) else {
        let _ = child.start_kill();
        return;
    };
    // SAFETY: `pid` is our own child, which has not been reaped yet
    // (`Child::id` returns `None` after reaping).
    let rc = unsafe { libc::kill(pid, libc::SIGTERM) };
    if rc != 0 {
        let _ = child.start_kill();
    }
}

#[cfg(not(unix))]
fn terminate(child: &mut Child) {
    let _ = child.start_kill();
}
