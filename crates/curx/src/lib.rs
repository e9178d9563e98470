//! 🧾 curx: the AWS Cost and Usage Report shipper.
//!
//! Once per scheduled invocation: find this month's CUR manifest, stream every
//! gzip CSV part it lists, turn each row into a JSON record, and POST the records
//! in ~1 MiB NDJSON batches to a log ingestion endpoint. No state survives the run.
//!
//! Start at [`run`]. Everything else is plumbing. 🦆

pub mod app_config;
mod backends;
pub mod decompress;
pub mod event;
mod failure;
mod fields;
mod manifest;
mod orchestrator;
mod progress;
pub mod shipper;
mod transforms;

pub use backends::StorageError;
pub use failure::{FailureKind, classify_failure};
pub use manifest::ManifestError;
pub use orchestrator::{RunSummary, run};
