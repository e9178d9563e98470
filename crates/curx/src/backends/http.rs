//! # 📡 THE HTTP BACKEND
//!
//! 🎬 COLD OPEN: a log-ingestion endpoint, somewhere on the internet, waiting for
//! the month's cloud bill like a tax auditor waits for April.
//!
//! This module POSTs NDJSON payloads to that endpoint, once per call, and reports
//! what came back. It does not retry. It does not judge a 500. It just carries the
//! envelope to the door and tells the `Shipper` whether the door opened.
//!
//! 🧠 Knowledge graph:
//! - Endpoint: `{url}?token={token}&type={log_type}`, built once by `AppConfig::endpoint_url`
//! - Headers: `Content-Type: application/json` and `Shipper-Agent: curx/v{version}/{attempt}/0.`
//! - Timeouts: 10s connect, 30s request (configurable under `[shipper]`)
//!
//! 🦆 (mandatory duck, no context provided, none shall be requested)

mod http_sink;

pub(crate) use http_sink::HttpSink;
