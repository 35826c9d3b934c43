use serde_json::Value;

use crate::error::BridgeError;

/// Channel names the UI addresses requests and push messages by.
pub mod channels {
    pub const GET_PLATFORM: &str = "system:getPlatform";
    pub const COMMAND_EXISTS: &str = "system:commandExists";
    pub const SUBMIT_FEEDBACK: &str = "system:submitFeedback";
    pub const CHECK_FOR_UPDATES: &str = "system:checkForUpdates";
    pub const INSTALL_UPDATE: &str = "system:installUpdate";
    pub const RESTART_APP: &str = "system:restartApp";

    pub const UPDATE_DOWNLOADED: &str = "update:downloaded";
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Request {
    GetPlatform,
    CommandExists { command: String },
    SubmitFeedback { feedback: String },
    CheckForUpdates,
    InstallUpdate,
    RestartApp,
}

impl Request {
    /// Route a `(channel, args)` invocation. Extra trailing arguments are ignored.
    ///
    /// # Errors
    /// Returns [`BridgeError::UnknownChannel`] for an unregistered channel and
    /// [`BridgeError::InvalidArguments`] when a required string argument is
    /// missing or has the wrong type.
    pub fn parse(channel: &str, args: &[Value]) -> Result<Self, BridgeError> {
        match channel {
            channels::GET_PLATFORM => Ok(Self::GetPlatform),
            channels::COMMAND_EXISTS => Ok(Self::CommandExists {
                command: string_arg(channels::COMMAND_EXISTS, args, "command")?,
            }),
            channels::SUBMIT_FEEDBACK => Ok(Self::SubmitFeedback {
                feedback: string_arg(channels::SUBMIT_FEEDBACK, args, "feedback")?,
            }),
            channels::CHECK_FOR_UPDATES => Ok(Self::CheckForUpdates),
            channels::INSTALL_UPDATE => Ok(Self::InstallUpdate),
            channels::RESTART_APP => Ok(Self::RestartApp),
            other => Err(BridgeError::UnknownChannel(other.to_string())),
        }
    }

    #[must_use]
    pub fn channel(&self) -> &'static str {
        match self {
            Self::GetPlatform => channels::GET_PLATFORM,
            Self::CommandExists { .. } => channels::COMMAND_EXISTS,
            Self::SubmitFeedback { .. } => channels::SUBMIT_FEEDBACK,
            Self::CheckForUpdates => channels::CHECK_FOR_UPDATES,
            Self::InstallUpdate => channels::INSTALL_UPDATE,
            Self::RestartApp => channels::RESTART_APP,
        }
    }
}

fn string_arg(
    channel: &'static str,
    args: &[Value],
    name: &'static str,
) -> Result<String, BridgeError> {
    match args.first() {
        Some(Value::String(value)) => Ok(value.clone()),
        Some(other) => Err(BridgeError::invalid_arguments(
            channel,
            format!("`{name}` must be a string, got {other}"),
        )),
        None => Err(BridgeError::invalid_arguments(
            channel,
            format!("missing `{name}` argument"),
        )),
    }
}
