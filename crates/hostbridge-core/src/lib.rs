//! UI-independent building blocks of the host bridge.
//!
//! - Collaborator seams the bridge depends on (command probing, feedback
//!   delivery, update delivery).
//! - The HTTP feedback client.
//! - Release discovery against GitHub and the update delivery that downloads,
//!   verifies, stages and installs a release payload.

mod collaborators;
pub mod delivery;
mod feedback;
mod release;
mod staging;

/// Traits the bridge talks to its collaborators through.
pub use collaborators::{
    CommandProber, FeedbackSender, UpdateDelivery, UpdateEvent, UpdateListener,
};
/// Release-backed update delivery and its error type.
pub use delivery::{ReleaseDelivery, ReleaseDeliveryConfig, UpdateDeliveryError};
/// JSON feedback client.
pub use feedback::{FeedbackClient, FeedbackError};
/// Release lookup and version comparison.
pub use release::{
    AvailableUpdate, ReleaseAsset, ReleaseCheckError, ReleaseFeed, asset_name, check_latest,
    is_newer_version,
};
