use async_trait::async_trait;
use tokio::sync::mpsc;

use crate::delivery::UpdateDeliveryError;
use crate::feedback::FeedbackError;

/// Resolves whether a command is available in the user's shell environment.
#[async_trait]
pub trait CommandProber: Send + Sync {
    async fn command_exists(&self, command: &str) -> bool;
}

/// Delivers a feedback message and reports the HTTP status it was answered with.
#[async_trait]
pub trait FeedbackSender: Send + Sync {
    async fn send(&self, feedback: &str) -> Result<reqwest::StatusCode, FeedbackError>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UpdateEvent {
    Downloaded { version: String },
    Error(String),
}

/// Subscription handle registered with an [`UpdateDelivery`].
#[derive(Debug, Clone)]
pub struct UpdateListener {
    tx: mpsc::UnboundedSender<UpdateEvent>,
}

impl UpdateListener {
    #[must_use]
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<UpdateEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }

    /// Returns `false` once the subscriber has gone away.
    pub fn notify(&self, event: UpdateEvent) -> bool {
        self.tx.send(event).is_ok()
    }

    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}

/// Checks, downloads and installs application updates.
///
/// Implementations report `Downloaded` once a payload is staged and `Error`
/// whenever delivery cannot proceed.
pub trait UpdateDelivery: Send + Sync {
    fn subscribe(&self, listener: UpdateListener);

    /// Install the staged payload and start the new version.
    ///
    /// # Errors
    /// Returns an error when nothing is staged or the payload cannot be applied.
    fn install_and_relaunch(&self) -> Result<(), UpdateDeliveryError>;
}
