//! Host side of the UI bridge.
//!
//! [`HostBridge`] serves the `system:*` request channels, tracks whether a
//! downloaded update is waiting to be installed, and forwards update
//! notifications to the UI. [`transport`] carries requests, replies and push
//! messages over newline-delimited JSON.

mod bridge;
pub mod error;
pub mod host;
mod lifecycle;
pub mod logging;
mod reply;
mod request;
pub mod settings;
mod state;
pub mod transport;

#[cfg(test)]
mod test_support;

pub use bridge::{Collaborators, Handled, HostBridge, Invocation};
pub use error::BridgeError;
pub use lifecycle::{AppLifecycle, ChannelSink, ShutdownSignal, UiSink};
pub use reply::{PushMessage, Reply, UpdateStatus};
pub use request::{Request, channels};
pub use settings::BridgeSettings;
pub use state::UpdateState;
