//! Claim injection trigger
//!
//! Reads one issuance event as JSON from stdin and writes the augmented
//! event to stdout. Logs go to stderr so stdout carries only the event.

use std::io::{Read, Write};

use anyhow::{Context, Result};
use claims_trigger::{TriggerConfig, handle};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            EnvFilter::try_from_env("LOG_LEVEL")
                .or_else(|_| EnvFilter::try_from_default_env())
                .unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .json()
                .with_writer(std::io::stderr),
        )
        .init();

    let config = TriggerConfig::from_env().context("loading trigger configuration")?;
    info!(scope_claim = %config.scope_claim, "claims trigger configured");

    let mut input = String::new();
    std::io::stdin()
        .read_to_string(&mut input)
        .context("reading event from stdin")?;

    let event = serde_json::from_str(&input).unwrap_or_else(|e| {
        error!(error = %e, "issuance event is not valid JSON");
        serde_json::Value::Null
    });

    let output = handle(event, &config);

    let mut stdout = std::io::stdout().lock();
    serde_json::to_writer(&mut stdout, &output).context("writing event to stdout")?;
    stdout.write_all(b"\n").context("writing event to stdout")?;
    Ok(())
}
