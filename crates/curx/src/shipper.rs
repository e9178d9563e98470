//! # 📬 THE SHIPPER
//!
//! 🎬 *Previously, on curx...* a few hundred thousand billing rows got decompressed,
//! typed and stamped. Now somebody has to carry them across the internet, a
//! megabyte at a time, to an endpoint that may or may not be in a good mood.
//!
//! The `Shipper` owns one `Batch`. `add` appends a serialized record and flushes
//! once the running byte total crosses `max_batch_bytes`. `flush` POSTs the batch
//! through a [`Sink`], retrying transient failures with exponential backoff and
//! giving up immediately on the failures no amount of waiting will fix.
//!
//! 🧠 Knowledge graph:
//! - Idle → Accumulating (`add`) → Flushing (`flush`) → Idle
//! - Size cap is a post-append trigger: one append may push the batch past the line
//! - Retry state is a `RetryAttempt` value created per flush. Nothing leaks between batches.
//! - 400 / 401 / 404 abort. Other statuses and transport failures retry. Then we give up.
//!
//! 🦆 The duck handles customer complaints. The duck has a lot of unread mail.
//!
//! [`Sink`]: crate::backends::Sink

use std::time::Duration;

use serde::Deserialize;
use tracing::{error, info, warn};

use crate::backends::{SendOutcome, Sink};
use crate::transforms::BillingRecord;

/// 🔧 `[shipper]` section of the config. Every knob has a default, nobody has to touch it.
#[derive(Debug, Deserialize, Clone, PartialEq, Eq)]
pub struct ShipperConfig {
    /// 📦 Flush once the batch's encoded JSON exceeds this many bytes. 1 MiB.
    #[serde(default = "default_max_batch_bytes")]
    pub max_batch_bytes: usize,
    /// 🔁 Total attempts per batch, the first one included.
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    /// ⏱️ Sleep before the second attempt. Doubles after that.
    #[serde(default = "default_initial_backoff_ms")]
    pub initial_backoff_ms: u64,
    #[serde(default = "default_connect_timeout_secs")]
    pub connect_timeout_secs: u64,
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
}

fn default_max_batch_bytes() -> usize {
    1024 * 1024
}

fn default_max_attempts() -> u32 {
    4
}

fn default_initial_backoff_ms() -> u64 {
    2_000
}

fn default_connect_timeout_secs() -> u64 {
    10
}

fn default_request_timeout_secs() -> u64 {
    30
}

impl Default for ShipperConfig {
    fn default() -> Self {
        Self {
            max_batch_bytes: default_max_batch_bytes(),
            max_attempts: default_max_attempts(),
            initial_backoff_ms: default_initial_backoff_ms(),
            connect_timeout_secs: default_connect_timeout_secs(),
            request_timeout_secs: default_request_timeout_secs(),
        }
    }
}

impl ShipperConfig {
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_attempts: self.max_attempts,
            initial_backoff: Duration::from_millis(self.initial_backoff_ms),
        }
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

/// 🔁 How many times to knock, and how long to wait between knocks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub initial_backoff: Duration,
}

impl RetryPolicy {
    pub fn first_attempt(self) -> RetryAttempt {
        RetryAttempt {
            index: 0,
            policy: self,
        }
    }
}

/// 🎟️ One attempt's ticket. Created fresh for every flush, advanced by value, then dropped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryAttempt {
    index: u32,
    policy: RetryPolicy,
}

impl RetryAttempt {
    /// Zero-based. The first POST of a batch is attempt 0.
    pub fn index(&self) -> u32 {
        self.index
    }

    /// 😴 How long to sleep before this attempt: nothing for the first,
    /// then `initial × 2^(n-1)`. With the defaults that is 2s, 4s, 8s.
    pub fn backoff(&self) -> Duration {
        match self.index {
            0 => Duration::ZERO,
            n => self
                .policy
                .initial_backoff
                .saturating_mul(2u32.saturating_pow(n - 1)),
        }
    }

    /// ➡️ The next ticket, or `None` once the policy's attempts are used up.
    pub fn next(self) -> Option<RetryAttempt> {
        let index = self.index + 1;
        (index < self.policy.max_attempts).then_some(RetryAttempt { index, ..self })
    }
}

/// 💀 The ways a batch can fail to ship. Every one of them ends the invocation.
#[derive(Debug, thiserror::Error)]
pub enum ShipError {
    #[error("endpoint rejected the batch as malformed (HTTP 400): {body}")]
    BadPayload { body: String },
    #[error("endpoint rejected the token (HTTP 401)")]
    Unauthorized,
    #[error("endpoint does not exist (HTTP 404), check the configured url")]
    UnknownEndpoint,
    #[error("batch not delivered after {attempts} attempts, last failure: {last_failure}")]
    MaxRetriesExceeded { attempts: u32, last_failure: String },
    #[error("failed to serialize billing record")]
    Serialize {
        #[source]
        source: serde_json::Error,
    },
}

/// 📦 What has actually made it to the other side.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct ShipperStats {
    pub batches_delivered: u64,
    pub records_delivered: u64,
    pub bytes_delivered: u64,
}

#[derive(Debug, Default)]
struct Batch {
    lines: Vec<String>,
    // 📏 encoded JSON bytes only, newline separators not counted
    size_bytes: usize,
}

impl Batch {
    fn push(&mut self, line: String) {
        self.size_bytes += line.len();
        self.lines.push(line);
    }

    fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    fn render(&self) -> String {
        self.lines.join("\n")
    }

    fn clear(&mut self) {
        self.lines.clear();
        self.size_bytes = 0;
    }
}

enum Verdict {
    Delivered,
    Retry(String),
    Abort(ShipError),
}

fn classify_outcome(outcome: SendOutcome) -> Verdict {
    match outcome {
        SendOutcome::Accepted { .. } => Verdict::Delivered,
        SendOutcome::Rejected { status: 400, body } => Verdict::Abort(ShipError::BadPayload { body }),
        SendOutcome::Rejected { status: 401, .. } => Verdict::Abort(ShipError::Unauthorized),
        SendOutcome::Rejected { status: 404, .. } => Verdict::Abort(ShipError::UnknownEndpoint),
        SendOutcome::Rejected { status, .. } => Verdict::Retry(format!("HTTP {}", status)),
        SendOutcome::Unreachable { reason } => Verdict::Retry(reason),
    }
}

/// 📬 Accumulates records, flushes them through a `Sink`, and decides when to try again.
#[derive(Debug)]
pub(crate) struct Shipper<S> {
    sink: S,
    max_batch_bytes: usize,
    retry_policy: RetryPolicy,
    batch: Batch,
    stats: ShipperStats,
}

impl<S: Sink + Send> Shipper<S> {
    pub(crate) fn new(sink: S, config: &ShipperConfig) -> Self {
        Self {
            sink,
            max_batch_bytes: config.max_batch_bytes,
            retry_policy: config.retry_policy(),
            batch: Batch::default(),
            stats: ShipperStats::default(),
        }
    }

    pub(crate) fn stats(&self) -> ShipperStats {
        self.stats
    }

    /// ➕ Serialize and append. Flushes when the batch grows past the cap.
    pub(crate) async fn add(&mut self, record: &BillingRecord) -> Result<(), ShipError> {
        let line = record
            .to_json()
            .map_err(|source| ShipError::Serialize { source })?;
        self.batch.push(line);
        if self.batch.size_bytes > self.max_batch_bytes {
            self.flush().await?;
        }
        Ok(())
    }

    /// 🚽 Send whatever is buffered. An empty batch is a no-op, not an empty POST.
    pub(crate) async fn flush(&mut self) -> Result<(), ShipError> {
        if self.batch.is_empty() {
            return Ok(());
        }
        let payload = self.batch.render();
        self.send_with_retry(&payload).await?;

        self.stats.batches_delivered += 1;
        self.stats.records_delivered += self.batch.lines.len() as u64;
        self.stats.bytes_delivered += payload.len() as u64;
        info!(
            "📬 delivered batch #{}: {} records, {} bytes",
            self.stats.batches_delivered,
            self.batch.lines.len(),
            payload.len()
        );
        self.batch.clear();
        Ok(())
    }

    async fn send_with_retry(&mut self, payload: &str) -> Result<(), ShipError> {
        let mut attempt = self.retry_policy.first_attempt();
        loop {
            let backoff = attempt.backoff();
            if !backoff.is_zero() {
                tokio::time::sleep(backoff).await;
            }

            let last_failure = match classify_outcome(self.sink.send(payload, attempt.index()).await) {
                Verdict::Delivered => return Ok(()),
                Verdict::Abort(ship_error) => {
                    match &ship_error {
                        ShipError::BadPayload { body } => {
                            error!("💀 endpoint says the payload is malformed (400), not retrying: {}", body)
                        }
                        ShipError::Unauthorized => {
                            error!("🔒 endpoint rejected the token (401), not retrying")
                        }
                        ShipError::UnknownEndpoint => {
                            error!("🕳️ endpoint answered 404, the url is wrong, not retrying")
                        }
                        other => error!("💀 {}", other),
                    }
                    return Err(ship_error);
                }
                Verdict::Retry(reason) => reason,
            };

            match attempt.next() {
                Some(next_attempt) => {
                    warn!(
                        "🔄 attempt {}/{} failed ({}), backing off {:?}",
                        attempt.index() + 1,
                        self.retry_policy.max_attempts,
                        last_failure,
                        next_attempt.backoff()
                    );
                    attempt = next_attempt;
                }
                None => {
                    let attempts = attempt.index() + 1;
                    error!("💀 giving up on the batch after {} attempts: {}", attempts, last_failure);
                    return Err(ShipError::MaxRetriesExceeded { attempts, last_failure });
                }
            }
        }
    }
}
