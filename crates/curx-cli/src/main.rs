//! 🚀 curx-cli: the front door, the bouncer, the maitre d' of curx.
//!
//! 🎬 *[narrator voice]* "It all started with a scheduled trigger and a simple main()..."
//! 📦 This binary is the thin wrapper that sets up logging, loads config, builds
//! the invocation event, and lets the library do the heavy lifting. Like a manager. 🦆

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use comfy_table::{Cell, CellAlignment, Table, presets::UTF8_BORDERS_ONLY};
use curx::event::InvocationEvent;
use curx::{RunSummary, classify_failure};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

/// 🧾 Ship one AWS Cost and Usage Report invocation to a log ingestion endpoint.
#[derive(Debug, Parser)]
#[command(name = "curx", version, about)]
#[command(group(
    clap::ArgGroup::new("invocation")
        .required(true)
        .args(["event", "event_time"])
))]
struct Cli {
    /// 🔧 Optional TOML config file. Env vars still apply underneath it.
    #[arg(short, long, env = "CURX_CONFIG")]
    config: Option<PathBuf>,

    /// 📨 Scheduled-event JSON file: {"time": "...", "aws_access_key_id"?: "...", "aws_secret_access_key"?: "..."}
    #[arg(long, value_name = "FILE")]
    event: Option<PathBuf>,

    /// ⏰ Just the event time, e.g. 2024-03-15T06:00:00Z
    #[arg(long, value_name = "TIME")]
    event_time: Option<String>,
}

/// 📨 Either read the event file or wrap the bare time. clap guarantees exactly one is set.
async fn build_event(cli: &Cli) -> Result<InvocationEvent> {
    match (&cli.event, &cli.event_time) {
        (Some(path), _) => {
            let raw = tokio::fs::read_to_string(path).await.with_context(|| {
                format!("💀 Couldn't read the event file '{}'. Check the path, then check it again.", path.display())
            })?;
            Ok(InvocationEvent::from_json(&raw)?)
        }
        (None, Some(time)) => Ok(InvocationEvent::at(time.clone())),
        (None, None) => anyhow::bail!("💀 Either --event or --event-time is required"),
    }
}

/// 🍽️ The end-of-run receipt.
fn summary_table(summary: &RunSummary) -> Table {
    let mut table = Table::new();
    table.load_preset(UTF8_BORDERS_ONLY);
    let rows = [
        ("billing period", summary.manifest_period.clone()),
        ("report parts", summary.report_keys.len().to_string()),
        ("rows shipped", summary.rows_shipped.to_string()),
        ("batches delivered", summary.batches_delivered.to_string()),
        ("bytes delivered", summary.bytes_delivered.to_string()),
    ];
    for (label, value) in rows {
        table.add_row(vec![
            Cell::new(label),
            Cell::new(value).set_alignment(CellAlignment::Right),
        ]);
    }
    table
}

async fn run_cli(cli: Cli) -> Result<RunSummary> {
    let app_config = curx::app_config::load_config(cli.config.as_deref())
        .context("💀 In curx-cli, main, we couldn't load the config. Check the env vars and the file, make sure you didn't forget something obvious.")?;
    let event = build_event(&cli).await?;
    info!("⏰ invocation time: {}", event.time);
    curx::run(app_config, event).await
}

/// 🚀 main(): init tracing, parse args, run, print the receipt or the autopsy.
#[tokio::main]
async fn main() -> Result<()> {
    // 📡 RUST_LOG wins. Otherwise info, so an unattended run still leaves a trail.
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(env_filter).init();

    let cli = Cli::parse();

    match run_cli(cli).await {
        Ok(summary) => {
            println!("{}", summary_table(&summary));
            Ok(())
        }
        Err(err) => {
            error!("💀 error: {}", err);
            // -- 🧅 peel the onion of sadness, one layer at a time
            for cause in err.chain().skip(1) {
                error!("⚠️  cause: {}", cause);
            }
            let failure = classify_failure(&err);
            error!("🔧 hint ({:?}): {}", failure, failure.hint());
            std::process::exit(1);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn the_one_where_clap_agrees_with_itself() {
        Cli::command().debug_assert();
    }

    #[test]
    fn the_one_where_one_event_source_is_mandatory() {
        assert!(Cli::try_parse_from(["curx"]).is_err());
        assert!(
            Cli::try_parse_from(["curx", "--event", "e.json", "--event-time", "2024-03-15"]).is_err()
        );
        let cli = Cli::try_parse_from(["curx", "--event-time", "2024-03-15"]).unwrap();
        assert_eq!(cli.event_time.as_deref(), Some("2024-03-15"));
    }

    #[tokio::test]
    async fn the_one_where_an_event_file_brings_its_own_keys() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("event.json");
        std::fs::write(
            &path,
            r#"{"time": "2024-03-15T06:00:00Z", "aws_access_key_id": "AKIA", "aws_secret_access_key": "shh"}"#,
        )
        .unwrap();
        let cli = Cli::try_parse_from(["curx", "--event", path.to_str().unwrap()]).unwrap();
        let event = build_event(&cli).await.unwrap();
        assert_eq!(event.time, "2024-03-15T06:00:00Z");
        assert_eq!(event.aws_access_key_id.as_deref(), Some("AKIA"));
    }

    #[test]
    fn the_one_where_the_receipt_lists_the_numbers() {
        let summary = RunSummary {
            manifest_period: "20240301-20240401".to_string(),
            report_keys: vec!["a.csv.gz".to_string()],
            rows_shipped: 3,
            batches_delivered: 1,
            bytes_delivered: 512,
        };
        let rendered = summary_table(&summary).to_string();
        assert!(rendered.contains("20240301-20240401"));
        assert!(rendered.contains("rows shipped"));
    }
}
