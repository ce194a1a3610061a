//! Media concealment for a social feed page.
//!
//! Decides, for a live and constantly mutating document, which elements are
//! content media (concealed via a marker class), which are decorative
//! (left alone) and which sit inside avatar zones (never concealed, and
//! repaired if they ever are).
//!
//! Layering:
//!
//! - [`Classifier`] answers pure questions about one element
//! - [`ConcealEngine`] attaches and removes the marker, sweeps and repairs
//! - [`MutationWatcher`] and [`ZoneGuard`] react to tree changes
//! - [`PeriodicSweeper`] provides the light/aggressive/guard timers
//! - [`MediaShield`] owns the enabled flag and runs everything on one loop
//! - [`SettingsPanel`] is the popup talking to a tab through [`TabChannel`]

pub mod applier;
pub mod classifier;
pub mod coordinator;
pub mod engine;
pub mod error;
pub mod guard;
pub mod ipc;
pub mod panel;
pub mod repair;
pub mod sweep;
pub mod sweeper;
pub mod watcher;

pub use applier::Concealed;
pub use classifier::{Classification, Classifier};
pub use coordinator::{start_with_retry, MediaShield, PassReport};
pub use engine::{ConcealEngine, Marker};
pub use error::{ShieldError, ShieldResult};
pub use guard::ZoneGuard;
pub use ipc::{ChannelError, ContentPort, Envelope, LocalTabs, TabChannel};
pub use panel::{PanelView, SettingsPanel, COMMUNICATION_ERROR, NO_ACTIVE_TAB};
pub use sweep::SweepReport;
pub use sweeper::{PeriodicSweeper, Tick};
pub use watcher::{MutationWatcher, WatchReport, WatcherState};
