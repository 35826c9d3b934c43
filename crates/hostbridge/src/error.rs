use thiserror::Error;

/// Failures at the dispatch layer. Handler bodies never produce these; they
/// cover requests the bridge cannot route or the bridge having stopped.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BridgeError {
    #[error("No handler registered for '{0}'")]
    UnknownChannel(String),
    #[error("Invalid arguments for '{channel}': {details}")]
    InvalidArguments {
        channel: &'static str,
        details: String,
    },
    #[error("Host bridge has shut down")]
    ShutDown,
}

impl BridgeError {
    pub(crate) fn invalid_arguments(channel: &'static str, details: impl Into<String>) -> Self {
        Self::InvalidArguments {
            channel,
            details: details.into(),
        }
    }
}
