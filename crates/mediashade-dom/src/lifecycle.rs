//! Document ready state.
//!
//! Mirrors `document.readyState`; the state only ever advances.

/// Document ready state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub enum DocumentReadyState {
    /// The document is still loading.
    #[default]
    Loading,
    /// The document has finished parsing, but sub-resources are still loading.
    Interactive,
    /// The document and all sub-resources have finished loading.
    Complete,
}

impl DocumentReadyState {
    /// String form as exposed to page scripts.
    pub fn as_str(&self) -> &'static str {
        match self {
            DocumentReadyState::Loading => "loading",
            DocumentReadyState::Interactive => "interactive",
            DocumentReadyState::Complete => "complete",
        }
    }

    /// True until DOMContentLoaded would have fired.
    pub fn is_loading(&self) -> bool {
        matches!(self, DocumentReadyState::Loading)
    }
}
