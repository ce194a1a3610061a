//! Settings panel view model: one checkbox bound to the active tab's flag.

use mediashade_core::{flag_enabled, PreferenceStore, ShieldRequest};
use serde::Serialize;
use tracing::{debug, warn};

use crate::ipc::TabChannel;

pub const NO_ACTIVE_TAB: &str = "No active tab found.";
pub const COMMUNICATION_ERROR: &str = "Error: Could not communicate with extension.";

/// What the panel shows.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PanelView {
    pub checked: bool,
    pub loading: bool,
    pub error: Option<String>,
}

impl Default for PanelView {
    fn default() -> Self {
        Self {
            checked: true,
            loading: false,
            error: None,
        }
    }
}

pub struct SettingsPanel<T, S> {
    tabs: T,
    store: S,
    preference_key: String,
    tab: Option<mediashade_core::TabId>,
    view: PanelView,
}

impl<T: TabChannel, S: PreferenceStore> SettingsPanel<T, S> {
    pub fn new(tabs: T, store: S, preference_key: impl Into<String>) -> Self {
        Self {
            tabs,
            store,
            preference_key: preference_key.into(),
            tab: None,
            view: PanelView::default(),
        }
    }

    pub fn view(&self) -> &PanelView {
        &self.view
    }

    /// Populate the checkbox from the active tab, or from the store when
    /// the tab does not answer.
    pub async fn open(&mut self) -> &PanelView {
        self.view.loading = true;

        let Some(tab) = self.tabs.active_tab().await else {
            self.view.loading = false;
            self.view.error = Some(NO_ACTIVE_TAB.to_string());
            return &self.view;
        };
        self.tab = Some(tab);

        self.view.checked = match self.tabs.send(tab, ShieldRequest::GetState).await {
            Ok(state) => state.enabled,
            Err(e) => {
                debug!(error = %e, "Tab did not answer getState; reading the store");
                let stored = match self.store.get(&self.preference_key).await {
                    Ok(value) => value,
                    Err(e) => {
                        warn!(error = %e, "Preference store unavailable; assuming enabled");
                        None
                    }
                };
                flag_enabled(stored.as_ref())
            }
        };
        self.view.loading = false;
        &self.view
    }

    /// The user flipped the checkbox to `checked`.
    pub async fn on_toggle(&mut self, checked: bool) -> &PanelView {
        self.view.checked = checked;
        let Some(tab) = self.tab else {
            return &self.view;
        };

        match self.tabs.send(tab, ShieldRequest::Toggle).await {
            Ok(state) => self.view.checked = state.enabled,
            Err(e) => {
                warn!(error = %e, "Toggle request failed");
                self.view.error = Some(COMMUNICATION_ERROR.to_string());
            }
        }
        &self.view
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ipc::{ChannelError, ContentPort, LocalTabs};
    use mediashade_core::{MemoryStore, StateResponse};
    use serde_json::json;
    use std::time::Duration;

    const KEY: &str = "goodOldTwitterEnabled";

    fn tabs() -> LocalTabs {
        LocalTabs::new(Duration::from_millis(200))
    }

    #[tokio::test]
    async fn test_no_active_tab() {
        let mut panel = SettingsPanel::new(tabs(), MemoryStore::new(), KEY);
        let view = panel.open().await.clone();
        assert!(!view.loading);
        assert_eq!(view.error.as_deref(), Some(NO_ACTIVE_TAB));

        // without a tab the toggle goes nowhere
        let view = panel.on_toggle(false).await;
        assert!(!view.checked);
        assert_eq!(view.error.as_deref(), Some(NO_ACTIVE_TAB));
    }

    #[tokio::test]
    async fn test_falls_back_to_store() {
        let tabs = tabs();
        let (port, inbox) = ContentPort::channel();
        drop(inbox);
        tabs.open_tab(port);

        let store = MemoryStore::with_value(KEY, json!(false));
        let mut panel = SettingsPanel::new(tabs, store, KEY);
        let view = panel.open().await;
        assert!(!view.checked);
        assert!(!view.loading);
        assert_eq!(view.error, None);
    }

    #[tokio::test]
    async fn test_store_failure_defaults_to_enabled() {
        let tabs = tabs();
        let (port, inbox) = ContentPort::channel();
        drop(inbox);
        tabs.open_tab(port);

        let store = MemoryStore::with_value(KEY, json!(false));
        store.set_fail_reads(true);
        let mut panel = SettingsPanel::new(tabs, store, KEY);
        assert!(panel.open().await.checked);
    }

    #[tokio::test]
    async fn test_toggle_failure_surfaces_error() {
        let tabs = tabs();
        let (port, inbox) = ContentPort::channel();
        tabs.open_tab(port);
        drop(inbox);

        let mut panel = SettingsPanel::new(tabs, MemoryStore::new(), KEY);
        panel.open().await;
        let view = panel.on_toggle(false).await;
        assert_eq!(view.error.as_deref(), Some(COMMUNICATION_ERROR));
    }

    #[tokio::test]
    async fn test_toggle_uses_reply() {
        let tabs = tabs();
        let (port, mut inbox) = ContentPort::channel();
        tabs.open_tab(port);
        tokio::spawn(async move {
            while let Some(envelope) = inbox.recv().await {
                // a content script that refuses to turn off
                envelope.respond(Some(StateResponse { enabled: true }));
            }
        });

        let mut panel = SettingsPanel::new(tabs, MemoryStore::new(), KEY);
        assert!(panel.open().await.checked);
        assert!(panel.on_toggle(false).await.checked);
        assert_eq!(panel.view().error, None);
    }

    #[test]
    fn test_error_strings() {
        assert_eq!(
            ChannelError::Disconnected.to_string(),
            "content script is gone"
        );
        assert_eq!(COMMUNICATION_ERROR, "Error: Could not communicate with extension.");
    }
}
