//! 🩺 Failure triage: turn an `anyhow::Error` back into "whose fault was it?"
//!
//! The pipeline wraps typed errors in layers of `.context(...)`. The CLI (and
//! anyone else calling `curx::run`) walks the chain, finds the typed cause, and
//! gets a `FailureKind` plus a hint a tired operator can act on.

use crate::app_config::ConfigError;
use crate::backends::StorageError;
use crate::decompress::DecodeError;
use crate::event::EventError;
use crate::manifest::ManifestError;
use crate::shipper::ShipError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    Config,
    Event,
    ManifestNotFound,
    Storage,
    Decode,
    BadPayload,
    Unauthorized,
    UnknownEndpoint,
    RetriesExhausted,
    Unknown,
}

impl FailureKind {
    /// 💡 One line of advice. Not therapy, but close.
    pub fn hint(&self) -> &'static str {
        match self {
            FailureKind::Config => "check URL, TOKEN, S3_BUCKET_NAME, REPORT_PATH and REPORT_NAME (or their CURX_ / TOML equivalents)",
            FailureKind::Event => "the invocation event needs a parseable `time` field",
            FailureKind::ManifestNotFound => "no CUR manifest for this month or the last one, check report_path and report_name",
            FailureKind::Storage => "S3 refused or failed the request, check credentials, region and bucket policy",
            FailureKind::Decode => "the report object is not the gzip CSV it claims to be",
            FailureKind::BadPayload => "the endpoint rejected the records as malformed",
            FailureKind::Unauthorized => "the endpoint rejected the token",
            FailureKind::UnknownEndpoint => "the endpoint URL answers 404, check `url`",
            FailureKind::RetriesExhausted => "the endpoint kept failing, it may be down or throttling",
            FailureKind::Unknown => "no classification available, read the cause chain",
        }
    }
}

/// 🔍 Walk the cause chain, outermost first, and classify the first typed error found.
pub fn classify_failure(err: &anyhow::Error) -> FailureKind {
    for cause in err.chain() {
        if cause.downcast_ref::<ConfigError>().is_some() {
            return FailureKind::Config;
        }
        if cause.downcast_ref::<EventError>().is_some() {
            return FailureKind::Event;
        }
        if let Some(manifest_error) = cause.downcast_ref::<ManifestError>() {
            return match manifest_error {
                ManifestError::NotFound { .. } => FailureKind::ManifestNotFound,
                ManifestError::PeriodOutOfRange { .. } => FailureKind::Event,
                _ => FailureKind::Storage,
            };
        }
        if cause.downcast_ref::<StorageError>().is_some() {
            return FailureKind::Storage;
        }
        if cause.downcast_ref::<DecodeError>().is_some() {
            return FailureKind::Decode;
        }
        if let Some(ship_error) = cause.downcast_ref::<ShipError>() {
            return match ship_error {
                ShipError::BadPayload { .. } | ShipError::Serialize { .. } => FailureKind::BadPayload,
                ShipError::Unauthorized => FailureKind::Unauthorized,
                ShipError::UnknownEndpoint => FailureKind::UnknownEndpoint,
                ShipError::MaxRetriesExceeded { .. } => FailureKind::RetriesExhausted,
            };
        }
    }
    FailureKind::Unknown
}
