//! 🔧 App Configuration: the sacred env-and-TOML-to-struct pipeline.
//!
//! 📡 "Config not found: We looked everywhere. Under the couch. Behind the fridge.
//! In the junk drawer. Nothing." -- every developer at 3am 🦆
//!
//! 🏗️ Powered by Figment. Three layers, lowest priority first:
//! 1. The bare env vars the scheduled function has always been deployed with:
//!    `URL`, `TOKEN`, `S3_BUCKET_NAME`, `REPORT_PATH`, `REPORT_NAME`.
//! 2. `CURX_*` env vars, any field, `__` for nesting (`CURX_SHIPPER__MAX_ATTEMPTS=6`).
//! 3. An optional TOML file. It wins.

use std::collections::BTreeMap;
use std::path::Path;

use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use serde::Deserialize;
use tracing::info;

use crate::decompress::DEFAULT_CHUNK_SIZE;
use crate::shipper::ShipperConfig;

// 🏚️ the bare names older deployment templates set
const LEGACY_ENV_VARS: [&str; 5] = ["URL", "TOKEN", "S3_BUCKET_NAME", "REPORT_PATH", "REPORT_NAME"];

/// 📦 Everything one invocation needs to know before it touches the network.
#[derive(Debug, Deserialize, Clone)]
pub struct AppConfig {
    /// 📡 Base URL of the log ingestion endpoint. Token and type get appended as query params.
    pub url: String,
    /// 🔒 Ingestion token. Goes in the query string, because that is what the endpoint wants.
    #[serde(deserialize_with = "text_or_number")]
    pub token: String,
    /// 🪣 Account-ID buckets like `123456789012` are real, so digits are welcome here.
    #[serde(alias = "bucket", deserialize_with = "text_or_number")]
    pub s3_bucket_name: String,
    /// 📁 Prefix the CUR report is delivered under. A trailing `/` is fine.
    #[serde(deserialize_with = "text_or_number")]
    pub report_path: String,
    #[serde(deserialize_with = "text_or_number")]
    pub report_name: String,
    /// 🏷️ `type=` query param. Everybody leaves it at `billing`.
    #[serde(default = "default_log_type", deserialize_with = "text_or_number")]
    pub log_type: String,
    /// 🌍 Overrides the AWS region chain.
    #[serde(default)]
    pub aws_region: Option<String>,
    /// 🧪 LocalStack / MinIO endpoint. Switches the S3 client to path-style addressing.
    #[serde(default)]
    pub s3_endpoint: Option<String>,
    /// 🫁 Compressed bytes pulled from S3 per read.
    #[serde(default = "default_chunk_size_bytes")]
    pub chunk_size_bytes: usize,
    #[serde(default)]
    pub shipper: ShipperConfig,
}

fn default_log_type() -> String {
    "billing".to_string()
}

fn default_chunk_size_bytes() -> usize {
    DEFAULT_CHUNK_SIZE
}

/// 🔢 figment's `Env` guesses types, so `CURX_REPORT_NAME=2024` shows up as a number.
/// These settings are names, not quantities: take the digits back as text.
fn text_or_number<'de, D: serde::Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Scalar {
        Text(String),
        Unsigned(u64),
        Signed(i64),
        Float(f64),
    }
    Ok(match Scalar::deserialize(deserializer)? {
        Scalar::Text(text) => text,
        Scalar::Unsigned(n) => n.to_string(),
        Scalar::Signed(n) => n.to_string(),
        Scalar::Float(n) => n.to_string(),
    })
}

/// 🏚️ The bare deployment vars, read verbatim. No type guessing, so `TOKEN=007` stays `007`.
fn legacy_env() -> Serialized<BTreeMap<String, String>> {
    let settings = LEGACY_ENV_VARS
        .iter()
        .filter_map(|name| {
            std::env::var(name)
                .ok()
                .map(|value| (name.to_ascii_lowercase(), value))
        })
        .collect();
    Serialized::defaults(settings)
}

/// 💀 The config is wrong, and we noticed before doing anything expensive.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to load configuration")]
    Load {
        #[source]
        source: Box<figment::Error>,
    },
    #[error("required setting `{field}` is empty")]
    EmptyField { field: &'static str },
    #[error("`url` is not an absolute URL ({url}): {reason}")]
    InvalidUrl { url: String, reason: String },
    #[error("setting `{field}` is invalid: {reason}")]
    Invalid { field: &'static str, reason: String },
}

impl AppConfig {
    /// ✅ Fail fast: empty required fields, a URL that doesn't parse, zero-sized knobs.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let required = [
            ("url", &self.url),
            ("token", &self.token),
            ("s3_bucket_name", &self.s3_bucket_name),
            ("report_path", &self.report_path),
            ("report_name", &self.report_name),
            ("log_type", &self.log_type),
        ];
        for (field, value) in required {
            if value.trim().is_empty() {
                return Err(ConfigError::EmptyField { field });
            }
        }
        self.endpoint_url()?;
        if self.chunk_size_bytes == 0 {
            return Err(ConfigError::Invalid {
                field: "chunk_size_bytes",
                reason: "must be greater than zero".to_string(),
            });
        }
        if self.shipper.max_batch_bytes == 0 {
            return Err(ConfigError::Invalid {
                field: "shipper.max_batch_bytes",
                reason: "must be greater than zero".to_string(),
            });
        }
        if self.shipper.max_attempts == 0 {
            return Err(ConfigError::Invalid {
                field: "shipper.max_attempts",
                reason: "at least one attempt is required".to_string(),
            });
        }
        Ok(())
    }

    /// 📡 `{url}?token={token}&type={log_type}`, query-encoded properly.
    ///
    /// The configured path is kept as written. A bare host gets `/` from URL
    /// normalization, a path like `/ingest` does not grow a trailing slash.
    pub fn endpoint_url(&self) -> Result<reqwest::Url, ConfigError> {
        let mut endpoint = reqwest::Url::parse(&self.url).map_err(|err| ConfigError::InvalidUrl {
            url: self.url.clone(),
            reason: err.to_string(),
        })?;
        if endpoint.cannot_be_a_base() {
            return Err(ConfigError::InvalidUrl {
                url: self.url.clone(),
                reason: "not a hierarchical URL".to_string(),
            });
        }
        endpoint
            .query_pairs_mut()
            .append_pair("token", &self.token)
            .append_pair("type", &self.log_type);
        Ok(endpoint)
    }
}

/// 🚀 Load the config from the environment and, optionally, a TOML file. Then validate it.
///
/// - `None` → env vars only.
/// - `Some(path)` → env vars + TOML file, merged. TOML wins on conflicts.
pub fn load_config(config_file_name: Option<&Path>) -> Result<AppConfig, ConfigError> {
    info!(
        "🔧 Loading configuration: {:#?}",
        config_file_name.unwrap_or(Path::new(""))
    );

    let config = Figment::new()
        .merge(legacy_env())
        .merge(Env::prefixed("CURX_").split("__"));

    let config = match config_file_name {
        Some(file_name) => config.merge(Toml::file(file_name)),
        None => config,
    };

    let app_config: AppConfig = config.extract().map_err(|source| ConfigError::Load {
        source: Box::new(source),
    })?;
    app_config.validate()?;
    Ok(app_config)
}
