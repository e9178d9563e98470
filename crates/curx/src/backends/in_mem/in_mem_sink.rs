use std::collections::VecDeque;
use std::sync::Arc;

use async_trait::async_trait;

use crate::backends::{SendOutcome, Sink};

/// 🧾 One delivery attempt, as the in-memory sink saw it.
#[derive(Debug, Clone)]
pub(crate) struct ReceivedPayload {
    pub(crate) payload: String,
    pub(crate) attempt: u32,
    // ⏱️ tokio's clock, so paused-time tests can measure the backoff exactly
    pub(crate) at: tokio::time::Instant,
}

/// 📦 A sink that never forgets, and lies on command.
///
/// Plays back `script` one outcome per `send`. When the script runs out, every
/// further attempt is a cheerful `200`. The `Arc<Mutex<Vec<..>>>` is shared so tests
/// can peek inside after handing the sink off to the shipper.
#[derive(Debug, Default, Clone)]
pub(crate) struct InMemorySink {
    script: VecDeque<SendOutcome>,
    pub(crate) received: Arc<tokio::sync::Mutex<Vec<ReceivedPayload>>>,
}

impl InMemorySink {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// 🎭 A sink that answers with `outcomes`, in order, then 200 forever.
    pub(crate) fn scripted(outcomes: impl IntoIterator<Item = SendOutcome>) -> Self {
        Self {
            script: outcomes.into_iter().collect(),
            received: Arc::default(),
        }
    }

    /// 🔁 A sink that answers every attempt with the same HTTP status.
    pub(crate) fn always(status: u16, attempts: usize) -> Self {
        Self::scripted(std::iter::repeat_n(
            SendOutcome::Rejected {
                status,
                body: String::new(),
            },
            attempts,
        ))
    }
}

#[async_trait]
impl Sink for InMemorySink {
    async fn send(&mut self, payload: &str, attempt: u32) -> SendOutcome {
        // 🔒 The Mutex is load-bearing. Do not remove. I know it looks optional. It isn't.
        self.received.lock().await.push(ReceivedPayload {
            payload: payload.to_string(),
            attempt,
            at: tokio::time::Instant::now(),
        });
        self.script
            .pop_front()
            .unwrap_or(SendOutcome::Accepted { status: 200 })
    }
}
