//! Messaging between the settings panel and content scripts.
//!
//! Each tab's content script owns an inbox of [`Envelope`]s drained by its
//! coordinator loop. Senders hold a [`ContentPort`]; the panel reaches the
//! active tab through a [`TabChannel`].

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;

use mediashade_common::with_timeout;
use mediashade_core::{ShieldRequest, StateResponse, TabId, TimerConfig};
use thiserror::Error;
use tokio::sync::{mpsc, oneshot};
use tracing::debug;

const INBOX_CAPACITY: usize = 16;

#[derive(Error, Debug)]
pub enum ChannelError {
    #[error("no tab with id {0:?}")]
    NoSuchTab(TabId),

    #[error("content script is gone")]
    Disconnected,

    #[error("content script did not reply")]
    NoResponse,

    #[error("no reply within {0:?}")]
    Timeout(Duration),

    #[error("malformed message: {0}")]
    Malformed(#[from] serde_json::Error),
}

/// One request plus the slot its reply goes into.
#[derive(Debug)]
pub struct Envelope {
    pub request: ShieldRequest,
    reply: oneshot::Sender<StateResponse>,
}

impl Envelope {
    /// Send the reply. `None` drops the slot, which the sender sees as no reply.
    pub fn respond(self, response: Option<StateResponse>) {
        if let Some(response) = response {
            // The sender may have given up waiting.
            let _ = self.reply.send(response);
        }
    }
}

/// Sending half of a content script's inbox.
#[derive(Debug, Clone)]
pub struct ContentPort {
    tx: mpsc::Sender<Envelope>,
}

impl ContentPort {
    /// A port and the inbox the coordinator loop drains.
    pub fn channel() -> (Self, mpsc::Receiver<Envelope>) {
        let (tx, rx) = mpsc::channel(INBOX_CAPACITY);
        (Self { tx }, rx)
    }

    pub async fn request(&self, request: ShieldRequest) -> Result<StateResponse, ChannelError> {
        let (reply, response) = oneshot::channel();
        self.tx
            .send(Envelope { request, reply })
            .await
            .map_err(|_| ChannelError::Disconnected)?;
        response.await.map_err(|_| ChannelError::NoResponse)
    }

    /// Wire-level request: `{"action": ...}` in, `{"enabled": ...}` out.
    pub async fn request_json(&self, message: &str) -> Result<String, ChannelError> {
        let request: ShieldRequest = serde_json::from_str(message)?;
        let response = self.request(request).await?;
        Ok(serde_json::to_string(&response)?)
    }
}

/// Reach the content script of a browser tab.
#[allow(async_fn_in_trait)]
pub trait TabChannel {
    /// The tab the user is looking at, if any.
    async fn active_tab(&self) -> Option<TabId>;

    async fn send(&self, tab: TabId, request: ShieldRequest) -> Result<StateResponse, ChannelError>;
}

/// In-process tab registry.
pub struct LocalTabs {
    tabs: Mutex<HashMap<TabId, ContentPort>>,
    active: Mutex<Option<TabId>>,
    timeout: Duration,
}

impl LocalTabs {
    pub fn new(timeout: Duration) -> Self {
        Self {
            tabs: Mutex::new(HashMap::new()),
            active: Mutex::new(None),
            timeout,
        }
    }

    /// Registry whose requests give up after the configured message timeout.
    pub fn from_config(timers: &TimerConfig) -> Self {
        Self::new(timers.message_timeout())
    }

    /// Register a tab's port and make it the active tab.
    pub fn open_tab(&self, port: ContentPort) -> TabId {
        let id = TabId::new();
        lock(&self.tabs).insert(id, port);
        *lock(&self.active) = Some(id);
        debug!(tab = id.0, "Opened tab");
        id
    }

    pub fn close_tab(&self, id: TabId) {
        lock(&self.tabs).remove(&id);
        let mut active = lock(&self.active);
        if *active == Some(id) {
            *active = None;
        }
    }

    pub fn activate(&self, id: TabId) {
        *lock(&self.active) = Some(id);
    }
}

impl TabChannel for LocalTabs {
    async fn active_tab(&self) -> Option<TabId> {
        *lock(&self.active)
    }

    async fn send(&self, tab: TabId, request: ShieldRequest) -> Result<StateResponse, ChannelError> {
        let port = lock(&self.tabs)
            .get(&tab)
            .cloned()
            .ok_or(ChannelError::NoSuchTab(tab))?;

        with_timeout(self.timeout, port.request(request))
            .await
            .map_err(|_| ChannelError::Timeout(self.timeout))?
    }
}

fn lock<T>(mutex: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}
