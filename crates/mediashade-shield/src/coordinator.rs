//! The coordinator: owns the enabled flag and drives every component from
//! one event loop.

use std::future::Future;
use std::rc::Rc;

use mediashade_common::{retry_with_backoff, RetryConfig};
use mediashade_core::{
    flag_enabled, PreferenceChange, PreferenceStore, ShieldConfig, ShieldRequest, StateResponse,
};
use mediashade_dom::Document;
use serde::Serialize;
use serde_json::Value;
use tokio::sync::broadcast::error::RecvError;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, error, info, trace, warn};

use crate::engine::ConcealEngine;
use crate::error::ShieldResult;
use crate::guard::ZoneGuard;
use crate::ipc::Envelope;
use crate::sweep::SweepReport;
use crate::sweeper::{PeriodicSweeper, Tick};
use crate::watcher::{MutationWatcher, WatcherState};

/// Upper bound on drain rounds per mutation wakeup. Our own marker writes
/// produce one more round; anything beyond waits for the next wakeup.
const MAX_DELIVERY_ROUNDS: usize = 8;

/// Outcome of a full pass over the document.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct PassReport {
    pub sweep: SweepReport,
    pub repaired: usize,
}

/// A running content-script instance for one document.
///
/// `P` is the synced preference store, `L` the local fallback.
pub struct MediaShield<P, L> {
    doc: Rc<Document>,
    config: ShieldConfig,
    engine: ConcealEngine,
    enabled: bool,
    watcher: MutationWatcher,
    guard: ZoneGuard,
    primary: P,
    secondary: L,
}

impl<P: PreferenceStore, L: PreferenceStore> MediaShield<P, L> {
    /// Read the flag, start the watcher and guard, run the initial pass.
    pub async fn init(
        doc: Rc<Document>,
        config: ShieldConfig,
        primary: P,
        secondary: L,
    ) -> ShieldResult<Self> {
        config.validate()?;

        let enabled = read_enabled(&primary, &secondary, &config.preference_key).await;
        let engine = ConcealEngine::new(&config);

        let mut watcher = MutationWatcher::new();
        watcher.start(&doc)?;
        let guard = ZoneGuard::new(&doc);
        guard.refresh(&doc, engine.classifier())?;

        let shield = Self {
            doc,
            config,
            engine,
            enabled,
            watcher,
            guard,
            primary,
            secondary,
        };

        let report = shield.full_pass();
        info!(
            enabled,
            concealed = report.sweep.concealed,
            repaired = report.repaired,
            "MediaShade initialized"
        );
        Ok(shield)
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn state(&self) -> StateResponse {
        StateResponse {
            enabled: self.enabled,
        }
    }

    pub fn document(&self) -> &Rc<Document> {
        &self.doc
    }

    pub fn engine(&self) -> &ConcealEngine {
        &self.engine
    }

    pub fn config(&self) -> &ShieldConfig {
        &self.config
    }

    pub fn watcher_state(&self) -> WatcherState {
        self.watcher.state()
    }

    /// Light sweep of the whole document if enabled, then repair.
    pub fn full_pass(&self) -> PassReport {
        let root = self.doc.root();
        let sweep = if self.enabled {
            self.engine.sweep(root)
        } else {
            SweepReport::default()
        };
        PassReport {
            sweep,
            repaired: self.engine.repair(root),
        }
    }

    fn apply_flag(&mut self, enabled: bool) {
        self.enabled = enabled;
        if enabled {
            self.full_pass();
        } else {
            self.engine.reveal_all(self.doc.root());
        }
    }

    /// Flip the flag, apply it, persist it.
    pub async fn toggle(&mut self) -> bool {
        let enabled = !self.enabled;
        self.apply_flag(enabled);
        info!(enabled, "Toggled concealment");

        let key = &self.config.preference_key;
        if let Err(e) = self.primary.set(key, Value::Bool(enabled)).await {
            warn!(error = %e, "Could not persist flag to primary store; writing local store");
            if let Err(e) = self.secondary.set(key, Value::Bool(enabled)).await {
                warn!(error = %e, "Could not persist flag to local store");
            }
        }
        enabled
    }

    /// Answer a panel request. Unrecognized actions get no reply.
    pub async fn handle_request(&mut self, request: ShieldRequest) -> Option<StateResponse> {
        match request {
            ShieldRequest::Toggle => {
                let enabled = self.toggle().await;
                Some(StateResponse { enabled })
            }
            ShieldRequest::GetState => Some(self.state()),
            ShieldRequest::Unknown => {
                trace!("Ignoring unrecognized request");
                None
            }
        }
    }

    /// A change seen on the primary store, possibly from another device.
    pub fn on_preference_change(&mut self, change: &PreferenceChange) {
        if change.key != self.config.preference_key {
            return;
        }
        let enabled = flag_enabled(change.new_value.as_ref());
        if enabled == self.enabled {
            return;
        }
        info!(enabled, "Preference changed externally");
        self.apply_flag(enabled);
    }

    /// Drain and act on pending watcher and guard records.
    pub fn deliver_mutations(&mut self) {
        for _ in 0..MAX_DELIVERY_ROUNDS {
            let watched = self.watcher.take_records();
            let guarded = self.guard.take_records();
            if watched.is_empty() && guarded.is_empty() {
                return;
            }

            self.watcher.process(&self.engine, &watched, self.enabled);
            // guard last, so protection wins within a round
            self.guard.process(self.engine.marker(), &guarded);
        }
        debug!("Mutation delivery still busy; continuing on next wakeup");
    }

    /// React to one timer.
    pub fn on_tick(&mut self, tick: Tick) {
        match tick {
            Tick::Light => {
                if self.enabled {
                    self.full_pass();
                }
            }
            Tick::Aggressive => {
                if self.enabled {
                    let root = self.doc.root();
                    self.engine.sweep_aggressive(root);
                    self.engine.repair(root);
                }
            }
            Tick::GuardRefresh => {
                if let Err(e) = self.guard.refresh(&self.doc, self.engine.classifier()) {
                    warn!(error = %e, "Guard refresh failed");
                }
            }
        }
    }

    /// Finish a deferred watcher start.
    pub fn on_ready_state_change(&mut self) {
        match self.watcher.on_ready_state_change(&self.doc) {
            Ok(WatcherState::Observing) => {
                if let Err(e) = self.guard.refresh(&self.doc, self.engine.classifier()) {
                    warn!(error = %e, "Guard refresh failed");
                }
            }
            Ok(_) => {}
            Err(e) => warn!(error = %e, "Could not attach mutation watcher"),
        }
    }

    /// The event loop. Returns when `shutdown` fires or its sender is dropped.
    pub async fn run(mut self, mut inbox: mpsc::Receiver<Envelope>, mut shutdown: oneshot::Receiver<()>) {
        let signal = self.doc.mutation_signal();
        let mut ready = self.doc.ready_signal();
        let mut changes = self.primary.subscribe();
        let mut changes_open = true;
        let mut sweeper = PeriodicSweeper::new(&self.config.timers);

        // records queued during init
        self.deliver_mutations();

        loop {
            tokio::select! {
                _ = &mut shutdown => break,
                _ = signal.notified() => self.deliver_mutations(),
                tick = sweeper.tick() => self.on_tick(tick),
                Ok(()) = ready.changed() => self.on_ready_state_change(),
                Some(envelope) = inbox.recv() => {
                    let response = self.handle_request(envelope.request).await;
                    envelope.respond(response);
                }
                change = changes.recv(), if changes_open => match change {
                    Ok(change) => self.on_preference_change(&change),
                    Err(RecvError::Lagged(skipped)) => {
                        warn!(skipped, "Missed preference changes");
                    }
                    Err(RecvError::Closed) => changes_open = false,
                },
            }
        }

        self.watcher.stop();
        info!("MediaShade stopped");
    }
}

impl<P, L> MediaShield<P, L>
where
    P: PreferenceStore + Clone,
    L: PreferenceStore + Clone,
{
    /// [`MediaShield::init`] with one retry after the configured delay.
    /// `None` means both attempts failed and the page is left untouched.
    pub async fn bootstrap(
        doc: Rc<Document>,
        config: ShieldConfig,
        primary: P,
        secondary: L,
    ) -> Option<Self> {
        let retry = RetryConfig::once_after(config.timers.init_retry());
        start_with_retry(&retry, || {
            Self::init(doc.clone(), config.clone(), primary.clone(), secondary.clone())
        })
        .await
    }
}

/// Run `init`, retrying per `retry`. Final failure is logged and swallowed.
pub async fn start_with_retry<T, F, Fut>(retry: &RetryConfig, init: F) -> Option<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = ShieldResult<T>>,
{
    match retry_with_backoff(retry, init).await {
        Ok(started) => Some(started),
        Err(e) => {
            error!(error = %e, "Init failed");
            None
        }
    }
}

/// Primary store, then local store, then enabled.
async fn read_enabled<P: PreferenceStore, L: PreferenceStore>(
    primary: &P,
    secondary: &L,
    key: &str,
) -> bool {
    match primary.get(key).await {
        Ok(value) => flag_enabled(value.as_ref()),
        Err(e) => {
            warn!(error = %e, "Primary preference store unavailable; using local store");
            match secondary.get(key).await {
                Ok(value) => flag_enabled(value.as_ref()),
                Err(e) => {
                    warn!(error = %e, "Local preference store unavailable; assuming enabled");
                    true
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ShieldError;
    use mediashade_core::MemoryStore;
    use mediashade_dom::DomError;
    use serde_json::json;
    use std::cell::Cell;
    use std::time::Duration;

    const KEY: &str = "goodOldTwitterEnabled";

    async fn shield_with(primary: MemoryStore, secondary: MemoryStore) -> MediaShield<MemoryStore, MemoryStore> {
        let doc = Rc::new(Document::parse_html("<video id=\"v\"></video>").unwrap());
        MediaShield::init(doc, ShieldConfig::default(), primary, secondary)
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_flag_from_primary() {
        let shield = shield_with(MemoryStore::with_value(KEY, json!(false)), MemoryStore::new()).await;
        assert!(!shield.is_enabled());
    }

    #[tokio::test]
    async fn test_flag_falls_back_to_secondary() {
        let primary = MemoryStore::with_value(KEY, json!(true));
        primary.set_fail_reads(true);
        let secondary = MemoryStore::with_value(KEY, json!(false));
        let shield = shield_with(primary, secondary).await;
        assert!(!shield.is_enabled());
    }

    #[tokio::test]
    async fn test_flag_defaults_to_enabled() {
        let primary = MemoryStore::new();
        primary.set_fail_reads(true);
        let secondary = MemoryStore::new();
        secondary.set_fail_reads(true);
        let shield = shield_with(primary, secondary).await;
        assert!(shield.is_enabled());
    }

    #[tokio::test]
    async fn test_toggle_persists_with_fallback() {
        let primary = MemoryStore::new();
        let secondary = MemoryStore::new();
        let mut shield = shield_with(primary.clone(), secondary.clone()).await;

        assert!(!shield.toggle().await);
        assert_eq!(primary.get(KEY).await.unwrap(), Some(json!(false)));

        primary.set_fail_writes(true);
        assert!(shield.toggle().await);
        assert_eq!(secondary.get(KEY).await.unwrap(), Some(json!(true)));
    }

    #[tokio::test]
    async fn test_requests() {
        let mut shield = shield_with(MemoryStore::new(), MemoryStore::new()).await;
        assert_eq!(
            shield.handle_request(ShieldRequest::GetState).await,
            Some(StateResponse { enabled: true })
        );
        assert_eq!(
            shield.handle_request(ShieldRequest::Toggle).await,
            Some(StateResponse { enabled: false })
        );
        assert_eq!(shield.handle_request(ShieldRequest::Unknown).await, None);
        assert!(!shield.is_enabled());
    }

    #[tokio::test]
    async fn test_sweep_ticks_do_nothing_while_disabled() {
        let doc = Rc::new(
            Document::parse_html(
                r#"<article><img id="pic" src="https://pbs.twimg.com/media/a.jpg"></article>
                   <div><img id="stray" src="https://cdn.example.com/x.jpg" width="300" height="300"></div>"#,
            )
            .unwrap(),
        );
        let mut shield = MediaShield::init(
            doc.clone(),
            ShieldConfig::default(),
            MemoryStore::with_value(KEY, json!(false)),
            MemoryStore::new(),
        )
        .await
        .unwrap();
        assert!(shield.engine().marker().marked_in(doc.root()).is_empty());

        shield.on_tick(Tick::Light);
        shield.on_tick(Tick::Aggressive);
        assert!(shield.engine().marker().marked_in(doc.root()).is_empty());

        shield.apply_flag(true);
        shield.on_tick(Tick::Aggressive);
        assert!(doc.get_element_by_id("stray").unwrap().has_class("good-old-twitter-hidden"));
    }

    #[tokio::test]
    async fn test_external_change_for_other_key_is_ignored() {
        let mut shield = shield_with(MemoryStore::new(), MemoryStore::new()).await;
        shield.on_preference_change(&PreferenceChange {
            key: "somethingElse".into(),
            old_value: None,
            new_value: Some(json!(false)),
        });
        assert!(shield.is_enabled());
    }

    #[tokio::test(start_paused = true)]
    async fn test_start_with_retry_recovers() {
        let attempts = Cell::new(0);
        let started = start_with_retry(&RetryConfig::once_after(Duration::from_millis(500)), || {
            attempts.set(attempts.get() + 1);
            let attempt = attempts.get();
            async move {
                if attempt == 1 {
                    Err(ShieldError::Dom(DomError::NodeNotFound))
                } else {
                    Ok(attempt)
                }
            }
        })
        .await;
        assert_eq!(started, Some(2));
    }

    #[tokio::test(start_paused = true)]
    async fn test_start_with_retry_gives_up_after_one_retry() {
        let attempts = Cell::new(0);
        let start = tokio::time::Instant::now();
        let started: Option<()> =
            start_with_retry(&RetryConfig::once_after(Duration::from_millis(500)), || {
                attempts.set(attempts.get() + 1);
                async { Err(ShieldError::Dom(DomError::NodeNotFound)) }
            })
            .await;

        assert_eq!(started, None);
        assert_eq!(attempts.get(), 2);
        assert!(start.elapsed() >= Duration::from_millis(500));
    }

    #[tokio::test(start_paused = true)]
    async fn test_bootstrap_invalid_config_stays_inert() {
        let doc = Rc::new(Document::parse_html("<video id=\"v\"></video>").unwrap());
        let mut config = ShieldConfig::default();
        config.patterns.protected_zones.clear();

        let shield =
            MediaShield::bootstrap(doc.clone(), config, MemoryStore::new(), MemoryStore::new()).await;
        assert!(shield.is_none());
        assert!(!doc.get_element_by_id("v").unwrap().has_class("good-old-twitter-hidden"));
    }
}
