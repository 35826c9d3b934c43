use log::{debug, info};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::reply::PushMessage;

/// Ends the application. The caller treats this as terminal.
pub trait AppLifecycle: Send + Sync {
    fn quit(&self);
}

/// Delivers push messages to the UI process.
pub trait UiSink: Send + Sync {
    fn push(&self, message: PushMessage);
}

/// Quits by cancelling the token the host run loop is driven by.
#[derive(Debug, Clone, Default)]
pub struct ShutdownSignal {
    token: CancellationToken,
}

impl ShutdownSignal {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn token(&self) -> CancellationToken {
        self.token.clone()
    }
}

impl AppLifecycle for ShutdownSignal {
    fn quit(&self) {
        info!("Quit requested");
        self.token.cancel();
    }
}

#[derive(Debug, Clone)]
pub struct ChannelSink {
    tx: mpsc::UnboundedSender<PushMessage>,
}

impl ChannelSink {
    #[must_use]
    pub fn new(tx: mpsc::UnboundedSender<PushMessage>) -> Self {
        Self { tx }
    }
}

impl UiSink for ChannelSink {
    fn push(&self, message: PushMessage) {
        if self.tx.send(message).is_err() {
            debug!("UI channel closed, dropping push message");
        }
    }
}
