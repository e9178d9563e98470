//! 🪣🚀 S3 Backend: the cloud-to-ground billing paratrooper.
//!
//! AWS writes the Cost and Usage Report into a bucket a few times a day and walks
//! away. This module wraps the AWS S3 SDK and exposes an [`ObjectStore`] whose
//! bodies stream straight off the wire. No downloading to disk, no buffering whole.
//!
//! 🧠 Knowledge graph:
//! - Transport: `GetObject` → `ByteStream::into_async_read()` → `ObjectBody`
//! - Credentials: the ambient AWS chain, unless the invocation event brings its own pair
//! - `NoSuchKey` is mapped to `StorageError::NoSuchKey` so the manifest resolver can forgive it
//!
//! [`ObjectStore`]: crate::backends::ObjectStore

mod s3_storage;

pub(crate) use s3_storage::S3Storage;
