//! Headless smoke run of the concealment engine.
//!
//! Parses an HTML snapshot of a feed page, starts a shield on it the same
//! way a content script would, and prints a JSON report:
//! - sweep and repair counts from the initial pass (and optionally the
//!   aggressive pass)
//! - how every image and video was classified
//! - any marker left inside a protected zone (should always be zero)
//!
//! Exits non-zero when the run fails or a protected zone ends up marked.

use std::fs;
use std::path::PathBuf;
use std::rc::Rc;

use anyhow::{bail, Context};
use clap::Parser;
use mediashade_common::{init_logging, LogConfig, LogFormat};
use mediashade_core::{MemoryStore, ShieldConfig, TABLES_REVISION};
use mediashade_dom::Document;
use mediashade_shield::{Classification, MediaShield, SweepReport};
use serde::Serialize;
use serde_json::json;
use tracing::{error, info};

#[derive(Parser, Debug)]
#[command(name = "mediashade-smoke")]
#[command(about = "Run the media concealment engine over an HTML snapshot")]
struct Args {
    /// Path to the HTML snapshot
    #[arg(long)]
    html_file: PathBuf,

    /// Shield config file (JSON); defaults are used when omitted
    #[arg(long)]
    config: Option<PathBuf>,

    /// Also run one aggressive sweep after the initial pass
    #[arg(long)]
    aggressive: bool,

    /// Start with concealment disabled
    #[arg(long)]
    disabled: bool,

    /// Write the annotated HTML here
    #[arg(long)]
    dump_html: Option<PathBuf>,

    /// Log format: pretty, compact or json
    #[arg(long, default_value = "compact")]
    log_format: LogFormat,

    /// Enable verbose output
    #[arg(long, short)]
    verbose: bool,
}

#[derive(Serialize, Default)]
struct ClassCounts {
    protected: usize,
    decorative: usize,
    media: usize,
    other: usize,
}

#[derive(Serialize)]
struct SmokeReport {
    status: String,
    html_file: String,
    tables_revision: u32,
    enabled: bool,
    protected_zones: usize,
    initial_marked: usize,
    aggressive: Option<SweepReport>,
    repaired_after_aggressive: usize,
    marked: usize,
    marked_in_zones: usize,
    media_elements: ClassCounts,
    html_path: Option<String>,
}

#[tokio::main(flavor = "current_thread")]
async fn main() {
    let args = Args::parse();

    let log_config = if args.verbose {
        LogConfig::debug()
    } else {
        LogConfig::default()
    };
    init_logging(log_config.with_format(args.log_format));

    match run(&args).await {
        Ok(report) => {
            println!("{}", json!(report));
            if report.status != "ok" {
                std::process::exit(1);
            }
        }
        Err(e) => {
            error!(error = %e, "Smoke run failed");
            println!(
                "{}",
                json!({
                    "status": "error",
                    "html_file": args.html_file.display().to_string(),
                    "error": format!("{e:#}"),
                })
            );
            std::process::exit(1);
        }
    }
}

async fn run(args: &Args) -> anyhow::Result<SmokeReport> {
    let config = match &args.config {
        Some(path) => ShieldConfig::load(path)
            .with_context(|| format!("loading config {}", path.display()))?,
        None => ShieldConfig::default(),
    };

    let html = fs::read_to_string(&args.html_file)
        .with_context(|| format!("reading {}", args.html_file.display()))?;
    let doc = Rc::new(Document::parse_html(&html)?);

    let primary = MemoryStore::with_value(&config.preference_key, json!(!args.disabled));
    let Some(shield) =
        MediaShield::bootstrap(doc.clone(), config, primary, MemoryStore::new()).await
    else {
        bail!("shield failed to start");
    };

    let engine = shield.engine();
    let root = doc.root();
    let initial_marked = engine.marker().marked_in(root).len();

    let (aggressive, repaired_after_aggressive) = if args.aggressive && shield.is_enabled() {
        let report = engine.sweep_aggressive(root);
        (Some(report), engine.repair(root))
    } else {
        (None, 0)
    };

    let classifier = engine.classifier();
    let zones = classifier.zones_in(root);
    let marked_in_zones: usize = zones
        .iter()
        .map(|zone| engine.marker().marked_in(zone).len())
        .sum();

    let mut counts = ClassCounts::default();
    let media = doc
        .get_elements_by_tag_name("img")
        .into_iter()
        .chain(doc.get_elements_by_tag_name("video"));
    for el in media {
        match classifier.classify(&el) {
            Classification::Protected => counts.protected += 1,
            Classification::Decorative => counts.decorative += 1,
            Classification::Media => counts.media += 1,
            Classification::Other => counts.other += 1,
        }
    }

    let html_path = match &args.dump_html {
        Some(path) => {
            fs::write(path, doc.to_html())
                .with_context(|| format!("writing {}", path.display()))?;
            Some(path.display().to_string())
        }
        None => None,
    };

    let marked = engine.marker().marked_in(root).len();
    info!(marked, marked_in_zones, "Smoke run complete");

    Ok(SmokeReport {
        status: (if marked_in_zones == 0 { "ok" } else { "zone_violation" }).to_string(),
        html_file: args.html_file.display().to_string(),
        tables_revision: TABLES_REVISION,
        enabled: shield.is_enabled(),
        protected_zones: zones.len(),
        initial_marked,
        aggressive,
        repaired_after_aggressive,
        marked,
        marked_in_zones,
        media_elements: counts,
        html_path,
    })
}
