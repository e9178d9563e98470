//! 🔌 Backends: where the real I/O happens.
//!
//! 🪣 Storage backends pour the report bytes in, 📡 sink backends push the NDJSON out.
//! Everything in between (decompressing, transforming, batching) is somebody else's job.
//!
//! 🧠 Knowledge graph:
//! - Pattern: trait → concrete impls → `*Backend` enum dispatching via match
//! - `ObjectStore`: `S3Storage` (production), `InMemoryStorage` (tests)
//! - `Sink`: `HttpSink` (production), `InMemorySink` (tests)
//! - Sinks report raw outcomes. Classifying 400 vs 500 is the shipper's call, not ours.
//!
//! 🦆 The duck is here because every file must have one. This is law.

pub(crate) mod http;
pub(crate) mod in_mem;
pub(crate) mod s3;
mod sink;
mod storage;

pub(crate) use sink::{SendOutcome, Sink, SinkBackend};
pub(crate) use storage::{ObjectBody, ObjectStore, StorageBackend};
pub use storage::StorageError;
