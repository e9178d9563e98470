use async_trait::async_trait;
use tokio::io::AsyncRead;

use crate::backends::{in_mem, s3};

// 🧠 Boxed because the S3 SDK hands back an opaque `impl AsyncRead`, and struct
// fields can't hold `impl Trait`. One vtable hop per read. The network laughs at it.
pub(crate) type ObjectBody = Box<dyn AsyncRead + Send + Unpin>;

/// 💀 Object storage said no.
///
/// `NoSuchKey` is its own variant because the manifest resolver forgives it once
/// (month-boundary publication lag). Everything else is just a failure.
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("no such key: s3://{bucket}/{key}")]
    NoSuchKey { bucket: String, key: String },
    #[error("failed to get s3://{bucket}/{key}")]
    Request {
        bucket: String,
        key: String,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },
}

impl StorageError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, StorageError::NoSuchKey { .. })
    }
}

/// 🪣 Anything that can hand us an object's bytes as a stream.
///
/// # Contract 📜
/// - The body is streamed, never buffered whole by the store.
/// - A missing key MUST surface as `StorageError::NoSuchKey`, not a generic failure.
#[async_trait]
pub(crate) trait ObjectStore: std::fmt::Debug {
    async fn get_object(&self, bucket: &str, key: &str) -> Result<ObjectBody, StorageError>;
}

/// 🎭 The many faces of object storage. The orchestrator never knows which one it got.
#[derive(Debug)]
pub(crate) enum StorageBackend {
    S3(s3::S3Storage),
    #[cfg_attr(not(test), allow(dead_code))]
    InMemory(in_mem::InMemoryStorage),
}

#[async_trait]
impl ObjectStore for StorageBackend {
    async fn get_object(&self, bucket: &str, key: &str) -> Result<ObjectBody, StorageError> {
        match self {
            StorageBackend::S3(store) => store.get_object(bucket, key).await,
            StorageBackend::InMemory(store) => store.get_object(bucket, key).await,
        }
    }
}
