//! Offline pattern scan
//!
//! Reads activity events from a JSON file and prints the pattern analysis.
//! The file holds either a bare array of events or an object with
//! `subject`, `events` and optional `indicators`.

use anyhow::{bail, Context};
use risk_engine::{ActivityEvent, PatternDetector, RiskConfig};
use serde::Deserialize;
use trust_ledger::SubjectId;

#[derive(Deserialize)]
#[serde(untagged)]
enum ScanInput {
    Events(Vec<ActivityEvent>),
    Batch {
        subject: String,
        events: Vec<ActivityEvent>,
        #[serde(default)]
        indicators: Vec<String>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .with_writer(std::io::stderr)
        .init();

    let path = match std::env::args().nth(1) {
        Some(path) => path,
        None => bail!("usage: pattern-scan <events.json>"),
    };

    let config = RiskConfig::from_env().context("loading risk engine config")?;
    let raw = tokio::fs::read_to_string(&path)
        .await
        .with_context(|| format!("reading {}", path))?;
    let input: ScanInput =
        serde_json::from_str(&raw).with_context(|| format!("parsing {}", path))?;

    let (subject, events, indicators) = match input {
        ScanInput::Events(events) => (SubjectId::new("anonymous"), events, Vec::new()),
        ScanInput::Batch {
            subject,
            events,
            indicators,
        } => (SubjectId::new(subject), events, indicators),
    };

    tracing::info!(subject = %subject, events = events.len(), "Scanning activity");

    let detector = PatternDetector::new(config.patterns);
    let analysis = detector.analyze(&subject, &events, &indicators);
    println!("{}", serde_json::to_string_pretty(&analysis)?);

    Ok(())
}
