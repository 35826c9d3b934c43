mod detect;
mod probe;

pub use detect::{ShellKind, UserShell, detect_user_shell};
pub use probe::{ProbeError, ShellProbe, is_valid_command_name};
