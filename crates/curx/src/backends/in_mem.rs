//! # Previously, on curx...
//!
//! 🎬 The bill was trapped in a bucket we couldn't reach from a unit test. Someone
//! had to fake it. Someone had to write a backend so simple it lives entirely in
//! RAM, gone the moment you blink.
//!
//! `in_mem` provides an in-memory [`ObjectStore`] and [`Sink`] for tests. The
//! storage serves byte blobs by `(bucket, key)` and remembers what was asked for.
//! The sink plays back a script of outcomes and remembers every payload it saw.
//!
//! ⚠️ This is NOT for production. This is for tests. 🦆
//!
//! [`ObjectStore`]: crate::backends::ObjectStore
//! [`Sink`]: crate::backends::Sink

// 🧪 only the test suites construct these
#![cfg_attr(not(test), allow(dead_code))]

mod in_mem_sink;
mod in_mem_storage;

pub(crate) use in_mem_sink::InMemorySink;
pub(crate) use in_mem_storage::InMemoryStorage;
