mod commands;
mod os;
mod paths;

pub use commands::HideWindow;
pub use os::{UNKNOWN_PLATFORM, current_platform, platform_identifier};
pub use paths::{AppPaths, AppPathsError};
