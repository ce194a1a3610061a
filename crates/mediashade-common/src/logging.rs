//! Subscriber setup shared by the binaries and tests.
//!
//! Output always goes to stderr so that tools printing machine-readable
//! reports on stdout stay parseable.

use std::str::FromStr;

use tracing::Level;
use tracing_subscriber::fmt::format::FmtSpan;
use tracing_subscriber::prelude::*;
use tracing_subscriber::{fmt, EnvFilter};

use crate::CommonError;

/// Crates that receive the configured level; everything else stays at `warn`.
const OWN_TARGETS: &[&str] = &[
    "mediashade_common",
    "mediashade_shield",
    "mediashade_dom",
    "mediashade_core",
    "mediashade_smoke",
];

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum LogFormat {
    /// Multi-line, with optional file and line.
    #[default]
    Pretty,
    /// One event per line.
    Compact,
    /// Newline-delimited JSON objects.
    Json,
}

impl FromStr for LogFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.eq_ignore_ascii_case("pretty") {
            Ok(Self::Pretty)
        } else if s.eq_ignore_ascii_case("compact") {
            Ok(Self::Compact)
        } else if s.eq_ignore_ascii_case("json") {
            Ok(Self::Json)
        } else {
            Err(format!("unknown log format: {s}"))
        }
    }
}

/// What to log and how to render it.
#[derive(Debug, Clone)]
pub struct LogConfig {
    /// Level for the MediaShade crates.
    pub level: Level,
    pub format: LogFormat,
    /// Print file and line with each event (pretty format only).
    pub include_location: bool,
    /// Emit span enter and close events.
    pub include_span_events: bool,
    /// Explicit `EnvFilter` directives; overrides `RUST_LOG`.
    pub filter: Option<String>,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: Level::INFO,
            format: LogFormat::default(),
            include_location: false,
            include_span_events: false,
            filter: None,
        }
    }
}

impl LogConfig {
    /// Sweep counts and store fallbacks become visible.
    pub fn debug() -> Self {
        Self {
            level: Level::DEBUG,
            include_location: true,
            ..Self::default()
        }
    }

    /// Adds swallowed pattern failures and span timing.
    pub fn trace() -> Self {
        Self {
            level: Level::TRACE,
            include_span_events: true,
            ..Self::debug()
        }
    }

    pub fn with_filter(self, filter: impl Into<String>) -> Self {
        Self {
            filter: Some(filter.into()),
            ..self
        }
    }

    pub fn with_format(self, format: LogFormat) -> Self {
        Self { format, ..self }
    }

    /// Directives used when neither an explicit filter nor `RUST_LOG` applies.
    pub fn default_directives(&self) -> String {
        let level = self.level.as_str().to_ascii_lowercase();
        let mut directives: Vec<String> = OWN_TARGETS
            .iter()
            .map(|target| format!("{target}={level}"))
            .collect();
        directives.push("warn".into());
        directives.join(",")
    }

    fn env_filter(&self) -> EnvFilter {
        let explicit = match &self.filter {
            Some(custom) => EnvFilter::try_new(custom).ok(),
            None => EnvFilter::try_from_default_env().ok(),
        };
        explicit.unwrap_or_else(|| EnvFilter::new(self.default_directives()))
    }

    fn span_events(&self) -> FmtSpan {
        if self.include_span_events {
            FmtSpan::ENTER | FmtSpan::CLOSE
        } else {
            FmtSpan::NONE
        }
    }
}

/// Install the global subscriber, reporting failure instead of panicking.
pub fn try_init_logging(config: LogConfig) -> Result<(), CommonError> {
    let base = fmt::layer()
        .with_writer(std::io::stderr)
        .with_span_events(config.span_events());

    let output = match config.format {
        LogFormat::Pretty => base
            .with_file(config.include_location)
            .with_line_number(config.include_location)
            .boxed(),
        LogFormat::Compact => base.compact().boxed(),
        LogFormat::Json => base.json().boxed(),
    };

    tracing_subscriber::registry()
        .with(config.env_filter())
        .with(output)
        .try_init()
        .map_err(|e| CommonError::Logging(e.to_string()))
}

/// Install the global subscriber. A second call is ignored.
pub fn init_logging(config: LogConfig) {
    if let Err(e) = try_init_logging(config) {
        tracing::debug!(error = %e, "Subscriber already installed");
    }
}
