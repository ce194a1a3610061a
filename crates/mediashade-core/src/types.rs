//! Message and identifier types shared by the content script and the settings panel

use serde::{Deserialize, Serialize};

/// Unique identifier for a browser tab
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TabId(pub u64);

impl TabId {
    pub fn new() -> Self {
        use std::sync::atomic::{AtomicU64, Ordering};
        static COUNTER: AtomicU64 = AtomicU64::new(1);
        Self(COUNTER.fetch_add(1, Ordering::Relaxed))
    }
}

impl Default for TabId {
    fn default() -> Self {
        Self::new()
    }
}

/// Request sent from the settings panel to a content script.
///
/// Wire form is `{"action": "toggle"}` / `{"action": "getState"}`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "camelCase")]
pub enum ShieldRequest {
    Toggle,
    GetState,
    /// Any other action; content scripts do not answer these.
    #[serde(other)]
    Unknown,
}

/// Reply to [`ShieldRequest::Toggle`] and [`ShieldRequest::GetState`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StateResponse {
    pub enabled: bool,
}
