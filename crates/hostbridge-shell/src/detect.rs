use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShellKind {
    Bash,
    Zsh,
    Fish,
    Sh,
    PowerShell,
}

impl ShellKind {
    /// Classify a shell from its executable path (`/usr/bin/zsh`, `pwsh.exe`).
    #[must_use]
    pub fn from_path(path: &Path) -> Option<Self> {
        let stem = path.file_stem()?.to_str()?.to_ascii_lowercase();
        match stem.as_str() {
            "bash" => Some(Self::Bash),
            "zsh" => Some(Self::Zsh),
            "fish" => Some(Self::Fish),
            "sh" | "dash" | "ash" | "ksh" => Some(Self::Sh),
            "pwsh" | "powershell" => Some(Self::PowerShell),
            _ => None,
        }
    }

    /// Arguments that make the shell exit successfully iff `command` resolves.
    ///
    /// `command` must already have passed [`crate::is_valid_command_name`].
    #[must_use]
    pub fn probe_args(self, command: &str) -> Vec<String> {
        match self {
            Self::Bash | Self::Zsh | Self::Sh => vec![
                "-i".to_string(),
                "-c".to_string(),
                format!("command -v {command}"),
            ],
            Self::Fish => vec![
                "-i".to_string(),
                "-c".to_string(),
                format!("type -q {command}"),
            ],
            Self::PowerShell => vec![
                "-NoProfile".to_string(),
                "-NonInteractive".to_string(),
                "-Command".to_string(),
                format!(
                    "if (Get-Command {command} -ErrorAction SilentlyContinue) {{ exit 0 }} else {{ exit 1 }}"
                ),
            ],
        }
    }

    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            Self::Bash => "bash",
            Self::Zsh => "zsh",
            Self::Fish => "fish",
            Self::Sh => "sh",
            Self::PowerShell => "powershell",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserShell {
    pub kind: ShellKind,
    pub program: PathBuf,
}

/// Resolve the shell the user's login environment runs in.
#[must_use]
pub fn detect_user_shell() -> UserShell {
    #[cfg(windows)]
    {
        let program = if which::which("pwsh").is_ok() {
            "pwsh"
        } else {
            "powershell"
        };
        UserShell {
            kind: ShellKind::PowerShell,
            program: PathBuf::from(program),
        }
    }

    #[cfg(not(windows))]
    {
        shell_from_env(std::env::var_os("SHELL").map(PathBuf::from))
    }
}

#[cfg(not(windows))]
fn shell_from_env(shell: Option<PathBuf>) -> UserShell {
    shell
        .filter(|path| !path.as_os_str().is_empty())
        .and_then(|program| {
            ShellKind::from_path(&program).map(|kind| UserShell { kind, program })
        })
        .unwrap_or_else(|| UserShell {
            kind: ShellKind::Sh,
            program: PathBuf::from("/bin/sh"),
        })
}
