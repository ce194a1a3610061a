//! Engine configuration
//!
//! Every heuristic threshold lives here so it can be tuned without touching
//! control flow. Missing fields in a config file take their defaults.

use crate::error::{MediaShadeError, MediaShadeResult};
use crate::tables::PatternTables;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Concealment engine configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ShieldConfig {
    /// Class attached to every concealed element
    pub marker_class: String,

    /// Preference key holding the enabled flag
    pub preference_key: String,

    /// Images smaller than this on either axis count as decorative (CSS px)
    pub min_media_dimension: f32,

    /// Case-insensitive markers of icons, emoji and avatars
    pub decorative_keywords: Vec<String>,

    /// Case-sensitive `data-testid` fragments that denote media
    pub media_keywords: Vec<String>,

    /// Case-sensitive class fragments that denote a media container
    pub container_keywords: Vec<String>,

    /// How many ancestor levels above a concealed element may be concealed too
    pub container_depth: usize,

    /// Sweep and guard timers
    pub timers: TimerConfig,

    /// Structural pattern tables
    pub patterns: PatternTables,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TimerConfig {
    /// Light sweep period in milliseconds
    pub light_sweep_ms: u64,

    /// Aggressive sweep period in milliseconds
    pub aggressive_sweep_ms: u64,

    /// Guard re-attachment period in milliseconds
    pub guard_refresh_ms: u64,

    /// Delay before the single startup retry
    pub init_retry_ms: u64,

    /// How long the settings panel waits for a content script reply
    pub message_timeout_ms: u64,
}

impl Default for ShieldConfig {
    fn default() -> Self {
        Self {
            marker_class: "good-old-twitter-hidden".to_string(),
            preference_key: "goodOldTwitterEnabled".to_string(),
            min_media_dimension: 24.0,
            decorative_keywords: strings(&["icon", "emoji", "avatar"]),
            media_keywords: strings(&["media", "photo", "video", "gif"]),
            container_keywords: strings(&["media", "photo", "image"]),
            container_depth: 3,
            timers: TimerConfig::default(),
            patterns: PatternTables::default(),
        }
    }
}

impl Default for TimerConfig {
    fn default() -> Self {
        Self {
            light_sweep_ms: 2_000,
            aggressive_sweep_ms: 10_000,
            guard_refresh_ms: 3_000,
            init_retry_ms: 500,
            message_timeout_ms: 1_000,
        }
    }
}

impl TimerConfig {
    pub fn light_sweep(&self) -> Duration {
        Duration::from_millis(self.light_sweep_ms)
    }

    pub fn aggressive_sweep(&self) -> Duration {
        Duration::from_millis(self.aggressive_sweep_ms)
    }

    pub fn guard_refresh(&self) -> Duration {
        Duration::from_millis(self.guard_refresh_ms)
    }

    pub fn init_retry(&self) -> Duration {
        Duration::from_millis(self.init_retry_ms)
    }

    pub fn message_timeout(&self) -> Duration {
        Duration::from_millis(self.message_timeout_ms)
    }
}

impl ShieldConfig {
    /// Load a config file. Fields it leaves out keep their defaults.
    pub fn load(path: &Path) -> MediaShadeResult<Self> {
        let raw = std::fs::read_to_string(path)?;
        let config: ShieldConfig = serde_json::from_str(&raw)?;
        config.validate()?;
        log::info!("Loaded shield config from {}", path.display());
        Ok(config)
    }

    /// Default location of the config file
    pub fn default_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("mediashade")
            .join("config.json")
    }

    /// Reject settings the engine cannot run with
    pub fn validate(&self) -> MediaShadeResult<()> {
        if self.marker_class.trim().is_empty() || self.marker_class.contains(char::is_whitespace)
        {
            return Err(MediaShadeError::config(format!(
                "marker_class must be a single class token, got {:?}",
                self.marker_class
            )));
        }
        if self.preference_key.is_empty() {
            return Err(MediaShadeError::config("preference_key is empty"));
        }
        if !self.min_media_dimension.is_finite() || self.min_media_dimension < 0.0 {
            return Err(MediaShadeError::config(format!(
                "min_media_dimension must be a non-negative number, got {}",
                self.min_media_dimension
            )));
        }

        let timers = [
            ("light_sweep_ms", self.timers.light_sweep_ms),
            ("aggressive_sweep_ms", self.timers.aggressive_sweep_ms),
            ("guard_refresh_ms", self.timers.guard_refresh_ms),
            ("message_timeout_ms", self.timers.message_timeout_ms),
        ];
        if let Some((name, _)) = timers.iter().find(|(_, ms)| *ms == 0) {
            return Err(MediaShadeError::config(format!("{name} must be non-zero")));
        }

        if self.patterns.protected_zones.is_empty() {
            return Err(MediaShadeError::config(
                "protected_zones is empty; avatars would be unprotected",
            ));
        }
        if let Some((table, pattern)) = self.patterns.first_invalid() {
            return Err(MediaShadeError::config(format!(
                "malformed pattern in {table}: {pattern:?}"
            )));
        }
        Ok(())
    }
}

fn strings(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}
