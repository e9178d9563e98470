use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;

use crate::backends::{ObjectBody, ObjectStore, StorageError};

/// 📦 A bucket that fits in a HashMap.
///
/// `requested` is shared behind an `Arc` so tests can keep a handle after the
/// storage has been moved into the pipeline, and then ask "which keys did you look up, and in what order?"
#[derive(Debug, Default, Clone)]
pub(crate) struct InMemoryStorage {
    objects: HashMap<(String, String), Vec<u8>>,
    pub(crate) requested: Arc<tokio::sync::Mutex<Vec<String>>>,
}

impl InMemoryStorage {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// 📥 Stash an object. Builder style, because test setup should read like a shopping list.
    pub(crate) fn with_object(
        mut self,
        bucket: impl Into<String>,
        key: impl Into<String>,
        body: impl Into<Vec<u8>>,
    ) -> Self {
        self.objects.insert((bucket.into(), key.into()), body.into());
        self
    }
}

#[async_trait]
impl ObjectStore for InMemoryStorage {
    async fn get_object(&self, bucket: &str, key: &str) -> Result<ObjectBody, StorageError> {
        self.requested.lock().await.push(key.to_string());
        match self.objects.get(&(bucket.to_string(), key.to_string())) {
            Some(body) => Ok(Box::new(std::io::Cursor::new(body.clone()))),
            None => Err(StorageError::NoSuchKey {
                bucket: bucket.to_string(),
                key: key.to_string(),
            }),
        }
    }
}
