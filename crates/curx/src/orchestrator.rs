//! # 🎼 THE ORCHESTRATOR
//!
//! *Previously, on curx...* every piece got built in isolation: a resolver, a
//! decompressor, a CSV splitter, a transformer, a shipper. Now they meet.
//!
//! One invocation, start to finish:
//! 1. Validate config and parse the event time. Nothing touches the network before this.
//! 2. Resolve the manifest (current month, or last month if AWS is running late).
//! 3. For every report key: stream it, split each line, transform it, hand it to the shipper.
//! 4. One final flush. Summarize. Go home.
//!
//! Everything is awaited in order. No workers, no channels. The backoff sleep
//! pauses the whole run, and that is fine: there is nothing else to do.
//!
//! 🦆 The duck conducts. Badly. Nobody has the heart to tell it.

use anyhow::{Context, Result};
use tracing::info;

use crate::app_config::AppConfig;
use crate::backends::http::HttpSink;
use crate::backends::s3::S3Storage;
use crate::backends::{ObjectStore, Sink, SinkBackend, StorageBackend};
use crate::decompress::ReportLineReader;
use crate::event::{EventTime, InvocationEvent};
use crate::manifest::ManifestResolver;
use crate::progress::ReportProgress;
use crate::shipper::Shipper;
use crate::transforms::csv_fields::split_fields;
use crate::transforms::transform_row;

/// 🧾 What one invocation accomplished.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunSummary {
    /// 📅 The billing period whose manifest was used, e.g. `20240301-20240401`.
    pub manifest_period: String,
    pub report_keys: Vec<String>,
    pub rows_shipped: u64,
    pub batches_delivered: u64,
    pub bytes_delivered: u64,
}

/// 🚀 Run one invocation against real S3 and the real endpoint.
pub async fn run(app_config: AppConfig, event: InvocationEvent) -> Result<RunSummary> {
    app_config
        .validate()
        .context("💀 The configuration failed inspection before we touched a single byte. Fix it and try again.")?;
    let event_time = event
        .event_time()
        .context("💀 The invocation event has no usable time. Without a time there is no billing period, and without a billing period there is no bill.")?;

    let storage = StorageBackend::S3(
        S3Storage::new(
            app_config.aws_region.as_deref(),
            app_config.s3_endpoint.as_deref(),
            event.explicit_credentials(),
        )
        .await,
    );
    let sink = SinkBackend::Http(HttpSink::new(
        app_config.endpoint_url()?,
        app_config.shipper.connect_timeout(),
        app_config.shipper.request_timeout(),
    )?);

    run_pipeline(&app_config, &event_time, &storage, sink).await
}

/// 🎼 The pipeline proper, with the backends already chosen.
pub(crate) async fn run_pipeline(
    app_config: &AppConfig,
    event_time: &EventTime,
    storage: &StorageBackend,
    sink: SinkBackend,
) -> Result<RunSummary> {
    let resolver = ManifestResolver::new(
        storage,
        &app_config.s3_bucket_name,
        &app_config.report_path,
        &app_config.report_name,
    );
    let manifest = resolver.resolve(event_time).await.context(
        "💀 Could not find this month's bill, or last month's. The manifest has left the building.",
    )?;

    let mut shipper = Shipper::new(sink, &app_config.shipper);
    let mut rows_shipped = 0u64;
    for report_key in &manifest.report_keys {
        rows_shipped += ship_report(app_config, event_time, storage, report_key, &mut shipper)
            .await
            .with_context(|| format!("💀 Report {} did not make it to the endpoint", report_key))?;
    }
    shipper
        .flush()
        .await
        .context("💀 The final flush stumbled at the finish line. So close.")?;

    let stats = shipper.stats();
    info!(
        "✅ shipped {} rows from {} report(s) in {} batches ({} bytes), billing period {}",
        rows_shipped,
        manifest.report_keys.len(),
        stats.batches_delivered,
        stats.bytes_delivered,
        manifest.period
    );
    Ok(RunSummary {
        manifest_period: manifest.period.folder_name(),
        report_keys: manifest.report_keys,
        rows_shipped,
        batches_delivered: stats.batches_delivered,
        bytes_delivered: stats.bytes_delivered,
    })
}

/// 📄 Stream one report object through split → transform → shipper. Returns rows handed over.
async fn ship_report<St, Si>(
    app_config: &AppConfig,
    event_time: &EventTime,
    storage: &St,
    report_key: &str,
    shipper: &mut Shipper<Si>,
) -> Result<u64>
where
    St: ObjectStore + Sync,
    Si: Sink + Send,
{
    info!("📄 parsing report {}", report_key);
    let body = storage
        .get_object(&app_config.s3_bucket_name, report_key)
        .await
        .context("💀 The manifest promised this report exists. S3 disagrees.")?;
    let mut reader = ReportLineReader::with_chunk_size(body, app_config.chunk_size_bytes)
        .await
        .context("💀 Could not read the report header")?;
    let headers = split_fields(reader.header_line());

    let mut progress = ReportProgress::new(report_key);
    while let Some(line) = reader
        .next_line()
        .await
        .context("💀 The report stopped making sense partway through")?
    {
        // 🕳️ blank lines carry no row
        if line.trim().is_empty() {
            continue;
        }
        let row_fields = split_fields(&line);
        let record = transform_row(&headers, &row_fields, event_time);
        shipper.add(&record).await?;
        progress.row_shipped(reader.compressed_bytes_read());
    }
    progress.finish();

    info!(
        "📄 report {} done: {} rows, {} compressed bytes",
        report_key,
        progress.rows(),
        reader.compressed_bytes_read()
    );
    Ok(progress.rows())
}
