//! MediaShade Core Library
//!
//! This crate provides shared types, errors, configuration, pattern tables and
//! preference storage for MediaShade.

pub mod config;
pub mod error;
pub mod preferences;
pub mod tables;
pub mod types;

pub use config::{ShieldConfig, TimerConfig};
pub use error::{MediaShadeError, MediaShadeResult};
pub use preferences::{
    flag_enabled, JsonFileStore, MemoryStore, PreferenceChange, PreferenceError, PreferenceStore,
};
pub use tables::{PatternTables, TABLES_REVISION};
pub use types::{ShieldRequest, StateResponse, TabId};
