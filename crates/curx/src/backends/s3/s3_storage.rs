use async_trait::async_trait;
use aws_config::BehaviorVersion;
use aws_sdk_s3::config::{Credentials, Region};
use tracing::debug;

use crate::backends::{ObjectBody, ObjectStore, StorageError};

// 🏷️ shows up in SDK debug logs as the credential provider name
const EVENT_CREDENTIALS_PROVIDER: &str = "curx-invocation-event";

/// 🪣 S3Storage: GetObject, streamed.
///
/// The SDK client is cheap to clone and safe to share, so one per invocation is plenty.
pub(crate) struct S3Storage {
    client: aws_sdk_s3::Client,
}

// 🐛 The SDK client's Debug output is a novella. Nobody debugging a run wants to read it.
impl std::fmt::Debug for S3Storage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("S3Storage").finish_non_exhaustive()
    }
}

impl S3Storage {
    /// 🚀 Build an S3 client from the AWS environment chain (env vars, profile, IAM role).
    ///
    /// - `region`: overrides the chain's region when set
    /// - `endpoint`: LocalStack / MinIO style override, switches to path-style addressing
    /// - `credentials`: explicit `(access_key_id, secret_access_key)` from the invocation event
    pub(crate) async fn new(
        region: Option<&str>,
        endpoint: Option<&str>,
        credentials: Option<(&str, &str)>,
    ) -> Self {
        let mut loader = aws_config::defaults(BehaviorVersion::latest());
        if let Some(region) = region {
            loader = loader.region(Region::new(region.to_string()));
        }
        if let Some((access_key_id, secret_access_key)) = credentials {
            debug!("🔑 using explicit credentials from the invocation event");
            loader = loader.credentials_provider(Credentials::new(
                access_key_id,
                secret_access_key,
                None,
                None,
                EVENT_CREDENTIALS_PROVIDER,
            ));
        }
        let sdk_config = loader.load().await;

        let mut s3_config = aws_sdk_s3::config::Builder::from(&sdk_config);
        if let Some(endpoint) = endpoint {
            s3_config = s3_config.endpoint_url(endpoint).force_path_style(true);
        }

        Self {
            client: aws_sdk_s3::Client::from_conf(s3_config.build()),
        }
    }
}

#[async_trait]
impl ObjectStore for S3Storage {
    async fn get_object(&self, bucket: &str, key: &str) -> Result<ObjectBody, StorageError> {
        debug!("🪣 GetObject s3://{}/{}", bucket, key);
        match self.client.get_object().bucket(bucket).key(key).send().await {
            Ok(output) => Ok(Box::new(output.body.into_async_read())),
            Err(sdk_error) => {
                let service_error = sdk_error.into_service_error();
                if service_error.is_no_such_key() {
                    Err(StorageError::NoSuchKey {
                        bucket: bucket.to_string(),
                        key: key.to_string(),
                    })
                } else {
                    Err(StorageError::Request {
                        bucket: bucket.to_string(),
                        key: key.to_string(),
                        source: Box::new(service_error),
                    })
                }
            }
        }
    }
}
