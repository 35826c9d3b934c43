use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use hostbridge_core::CommandProber;
use hostbridge_platform::HideWindow;
use log::{debug, warn};
use thiserror::Error;
use tokio::process::Command;

use crate::detect::{UserShell, detect_user_shell};

#[derive(Debug, Error)]
pub enum ProbeError {
    #[error("invalid command name: {0:?}")]
    InvalidName(String),
    #[error("failed to spawn {shell}: {source}")]
    Spawn {
        shell: &'static str,
        #[source]
        source: std::io::Error,
    },
    #[error("{shell} did not answer within {seconds}s")]
    Timeout { shell: &'static str, seconds: u64 },
}

/// Characters a command name may contain before it is interpolated into a
/// shell command line.
#[must_use]
pub fn is_valid_command_name(command: &str) -> bool {
    !command.is_empty()
        && !command.starts_with('-')
        && command
            .chars()
            .all(|ch| ch.is_ascii_alphanumeric() || matches!(ch, '-' | '_' | '.' | '+'))
}

/// Resolves commands the way the user's interactive shell would, so that
/// `PATH` additions from rc files are honored even when the host process was
/// started from a desktop launcher.
#[derive(Debug, Clone)]
pub struct ShellProbe {
    shell: UserShell,
    timeout: Duration,
}

impl ShellProbe {
    #[must_use]
    pub fn new(shell: UserShell, timeout: Duration) -> Self {
        Self { shell, timeout }
    }

    #[must_use]
    pub fn detect(timeout: Duration) -> Self {
        Self::new(detect_user_shell(), timeout)
    }

    #[must_use]
    pub fn shell(&self) -> &UserShell {
        &self.shell
    }

    /// Run the shell probe without falling back to a `PATH` lookup.
    ///
    /// # Errors
    /// Returns an error for an unsafe command name, when the shell cannot be
    /// spawned, or when it does not exit within the timeout.
    pub async fn probe_in_shell(&self, command: &str) -> Result<bool, ProbeError> {
        if !is_valid_command_name(command) {
            return Err(ProbeError::InvalidName(command.to_string()));
        }

        let shell = self.shell.kind.name();
        let mut cmd = Command::new(&self.shell.program);
        cmd.args(self.shell.kind.probe_args(command))
            .stdin(Stdio::null())
            .kill_on_drop(true)
            .hide_window();

        match tokio::time::timeout(self.timeout, cmd.output()).await {
            Ok(Ok(output)) => Ok(output.status.success()),
            Ok(Err(source)) => Err(ProbeError::Spawn { shell, source }),
            Err(_) => Err(ProbeError::Timeout {
                shell,
                seconds: self.timeout.as_secs(),
            }),
        }
    }
}

#[async_trait]
impl CommandProber for ShellProbe {
    async fn command_exists(&self, command: &str) -> bool {
        match self.probe_in_shell(command).await {
            Ok(found) => {
                debug!("Shell probe for {command}: {found}");
                found
            }
            Err(ProbeError::InvalidName(name)) => {
                debug!("Rejected command probe for {name:?}");
                false
            }
            Err(error) => {
                warn!("{error}; falling back to PATH lookup");
                which::which(command).is_ok()
            }
        }
    }
}
