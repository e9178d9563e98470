use async_trait::async_trait;

use crate::backends::{http, in_mem};

/// 📬 What happened to one POST attempt, uninterpreted.
///
/// The sink doesn't decide whether a 500 deserves another try. It just reports.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum SendOutcome {
    /// ✅ 2xx. The endpoint took our records.
    Accepted { status: u16 },
    /// 🚫 The endpoint answered, and the answer was not 2xx.
    Rejected { status: u16, body: String },
    /// 📡 We never got an answer: connect refused, DNS, timeout, TLS sadness.
    Unreachable { reason: String },
}

/// 🕳️ A sink that performs exactly one delivery attempt per call. Pure I/O, zero retry logic.
///
/// # Contract 📜
/// - `send` POSTs `payload` once and reports the raw outcome. Never retries.
/// - `attempt` is the zero-based retry index, for sinks that want to advertise it.
/// - Batching, backoff and classification happen in the `Shipper`, NOT here.
#[async_trait]
pub(crate) trait Sink: std::fmt::Debug {
    async fn send(&mut self, payload: &str, attempt: u32) -> SendOutcome;
}

/// 🎭 The many faces of a Sink. Mirrors `StorageBackend` on the other end of the pipe.
#[derive(Debug)]
pub(crate) enum SinkBackend {
    Http(http::HttpSink),
    #[cfg_attr(not(test), allow(dead_code))]
    InMemory(in_mem::InMemorySink),
}

#[async_trait]
impl Sink for SinkBackend {
    async fn send(&mut self, payload: &str, attempt: u32) -> SendOutcome {
        match self {
            SinkBackend::Http(sink) => sink.send(payload, attempt).await,
            SinkBackend::InMemory(sink) => sink.send(payload, attempt).await,
        }
    }
}
