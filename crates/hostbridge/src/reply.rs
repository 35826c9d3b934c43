use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::request::channels;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateStatus {
    pub update_available: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reply {
    Bool(bool),
    Text(String),
    UpdateStatus(UpdateStatus),
}

impl Reply {
    #[must_use]
    pub fn into_value(self) -> Value {
        match self {
            Self::Bool(value) => Value::Bool(value),
            Self::Text(value) => Value::String(value),
            Self::UpdateStatus(status) => {
                serde_json::json!({ "updateAvailable": status.update_available })
            }
        }
    }
}

/// One-way notification from the host to the UI.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PushMessage {
    UpdateDownloaded(bool),
}

impl PushMessage {
    #[must_use]
    pub fn channel(&self) -> &'static str {
        match self {
            Self::UpdateDownloaded(_) => channels::UPDATE_DOWNLOADED,
        }
    }

    #[must_use]
    pub fn payload(&self) -> Value {
        match self {
            Self::UpdateDownloaded(ready) => Value::Bool(*ready),
        }
    }
}
