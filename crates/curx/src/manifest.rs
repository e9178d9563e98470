//! 🗺️ Manifest resolution: "which files are this month's bill?"
//!
//! AWS publishes each billing period into its own folder, `YYYYMM01-YYYYMM01`,
//! with a `{report_name}-Manifest.json` naming the gzip parts. Right after the
//! month flips, the new folder may not exist yet, so a missing manifest gets one
//! second chance against the previous period. Only one. We are not archaeologists.

use chrono::{Datelike, Months, NaiveDate};
use serde::Deserialize;
use tokio::io::AsyncReadExt;
use tracing::{info, warn};

use crate::backends::{ObjectStore, StorageError};
use crate::event::EventTime;

/// 💀 Everything that can go wrong between "event time" and "list of report keys".
#[derive(Debug, thiserror::Error)]
pub enum ManifestError {
    #[error("no manifest for the current period ({current_key}) or the previous one ({previous_key})")]
    NotFound {
        current_key: String,
        previous_key: String,
    },
    #[error("failed to fetch manifest")]
    Storage(#[source] StorageError),
    #[error("failed to read manifest body of {key}")]
    Read {
        key: String,
        #[source]
        source: std::io::Error,
    },
    #[error("manifest {key} is not valid manifest JSON")]
    Malformed {
        key: String,
        #[source]
        source: serde_json::Error,
    },
    #[error("no billing period can be computed for {date}")]
    PeriodOutOfRange { date: NaiveDate },
}

/// 📅 `[first of month, first of next month)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct BillingPeriod {
    start: NaiveDate,
    end: NaiveDate,
}

impl BillingPeriod {
    pub(crate) fn containing(date: NaiveDate) -> Result<Self, ManifestError> {
        let start = date
            .with_day(1)
            .ok_or(ManifestError::PeriodOutOfRange { date })?;
        Self::starting_at(start).ok_or(ManifestError::PeriodOutOfRange { date })
    }

    fn starting_at(start: NaiveDate) -> Option<Self> {
        let end = start.checked_add_months(Months::new(1))?;
        Some(Self { start, end })
    }

    pub(crate) fn previous(&self) -> Option<Self> {
        Self::starting_at(self.start.checked_sub_months(Months::new(1))?)
    }

    /// 📁 `20240301-20240401`
    pub(crate) fn folder_name(&self) -> String {
        format!(
            "{}-{}",
            self.start.format("%Y%m%d"),
            self.end.format("%Y%m%d")
        )
    }
}

impl std::fmt::Display for BillingPeriod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.folder_name())
    }
}

// 🧾 the only part of the manifest we care about. AWS puts plenty more in there.
#[derive(Debug, Deserialize)]
struct ReportManifest {
    #[serde(rename = "reportKeys")]
    report_keys: Vec<String>,
}

/// ✅ The period whose manifest was found, and the report parts it lists, verbatim.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct ResolvedManifest {
    pub(crate) period: BillingPeriod,
    pub(crate) report_keys: Vec<String>,
}

#[derive(Debug)]
pub(crate) struct ManifestResolver<'a, S> {
    store: &'a S,
    bucket: &'a str,
    report_path: &'a str,
    report_name: &'a str,
}

impl<'a, S: ObjectStore + Sync> ManifestResolver<'a, S> {
    pub(crate) fn new(store: &'a S, bucket: &'a str, report_path: &'a str, report_name: &'a str) -> Self {
        Self {
            store,
            bucket,
            // ✂️ `reports/` and `reports` are the same folder
            report_path: report_path.trim_end_matches('/'),
            report_name,
        }
    }

    pub(crate) fn manifest_key(&self, period: &BillingPeriod) -> String {
        format!(
            "{}/{}/{}-Manifest.json",
            self.report_path,
            period.folder_name(),
            self.report_name
        )
    }

    /// 🔍 Current period first, previous period if the current manifest does not exist yet.
    pub(crate) async fn resolve(&self, event_time: &EventTime) -> Result<ResolvedManifest, ManifestError> {
        let date = event_time.date();
        let current = BillingPeriod::containing(date)?;
        let current_key = self.manifest_key(&current);

        match self.fetch(&current_key).await {
            Ok(report_keys) => {
                info!("🗺️ using manifest for billing period {}", current);
                return Ok(ResolvedManifest {
                    period: current,
                    report_keys,
                });
            }
            Err(ManifestError::Storage(storage_error)) if storage_error.is_not_found() => {
                warn!(
                    "🗺️ no manifest at {} yet, trying the previous billing period",
                    current_key
                );
            }
            Err(other) => return Err(other),
        }

        let previous = current
            .previous()
            .ok_or(ManifestError::PeriodOutOfRange { date })?;
        let previous_key = self.manifest_key(&previous);
        match self.fetch(&previous_key).await {
            Ok(report_keys) => {
                info!("🗺️ using manifest for previous billing period {}", previous);
                Ok(ResolvedManifest {
                    period: previous,
                    report_keys,
                })
            }
            Err(ManifestError::Storage(storage_error)) if storage_error.is_not_found() => {
                Err(ManifestError::NotFound {
                    current_key,
                    previous_key,
                })
            }
            Err(other) => Err(other),
        }
    }

    async fn fetch(&self, key: &str) -> Result<Vec<String>, ManifestError> {
        let mut body = self
            .store
            .get_object(self.bucket, key)
            .await
            .map_err(ManifestError::Storage)?;
        let mut raw = Vec::new();
        body.read_to_end(&mut raw)
            .await
            .map_err(|source| ManifestError::Read {
                key: key.to_string(),
                source,
            })?;
        let manifest: ReportManifest =
            serde_json::from_slice(&raw).map_err(|source| ManifestError::Malformed {
                key: key.to_string(),
                source,
            })?;
        Ok(manifest.report_keys)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backends::in_mem::InMemoryStorage;

    const BUCKET: &str = "billing-bucket";

    fn date(raw: &str) -> NaiveDate {
        NaiveDate::parse_from_str(raw, "%Y-%m-%d").unwrap()
    }

    fn manifest_json(keys: &[&str]) -> Vec<u8> {
        serde_json::json!({
            "assemblyId": "whatever",
            "reportKeys": keys,
        })
        .to_string()
        .into_bytes()
    }

    #[test]
    fn the_one_where_march_is_march_and_february_is_its_fallback() {
        let march = BillingPeriod::containing(date("2024-03-15")).unwrap();
        assert_eq!(march.folder_name(), "20240301-20240401");
        assert_eq!(march.previous().unwrap().folder_name(), "20240201-20240301");
    }

    #[test]
    fn the_one_where_december_rolls_into_next_year() {
        let december = BillingPeriod::containing(date("2024-12-05")).unwrap();
        assert_eq!(december.folder_name(), "20241201-20250101");
        let january = BillingPeriod::containing(date("2024-01-31")).unwrap();
        assert_eq!(january.previous().unwrap().folder_name(), "20231201-20240101");
    }

    #[tokio::test]
    async fn the_one_where_the_current_manifest_is_right_there() -> Result<(), ManifestError> {
        let store = InMemoryStorage::new().with_object(
            BUCKET,
            "reports/20240301-20240401/cur-Manifest.json",
            manifest_json(&["reports/a.csv.gz", "reports/b.csv.gz"]),
        );
        let requested = store.requested.clone();
        let resolver = ManifestResolver::new(&store, BUCKET, "reports/", "cur");

        let resolved = resolver.resolve(&EventTime::parse("2024-03-15").unwrap()).await?;
        assert_eq!(resolved.period.folder_name(), "20240301-20240401");
        assert_eq!(resolved.report_keys, vec!["reports/a.csv.gz", "reports/b.csv.gz"]);
        assert_eq!(requested.lock().await.len(), 1);
        Ok(())
    }

    #[tokio::test]
    async fn the_one_where_the_new_month_is_not_published_yet() -> Result<(), ManifestError> {
        let store = InMemoryStorage::new().with_object(
            BUCKET,
            "reports/20240201-20240301/cur-Manifest.json",
            manifest_json(&["reports/feb.csv.gz"]),
        );
        let requested = store.requested.clone();
        let resolver = ManifestResolver::new(&store, BUCKET, "reports", "cur");

        let resolved = resolver.resolve(&EventTime::parse("2024-03-15").unwrap()).await?;
        assert_eq!(resolved.period.folder_name(), "20240201-20240301");
        assert_eq!(resolved.report_keys, vec!["reports/feb.csv.gz"]);
        assert_eq!(
            *requested.lock().await,
            vec![
                "reports/20240301-20240401/cur-Manifest.json".to_string(),
                "reports/20240201-20240301/cur-Manifest.json".to_string(),
            ]
        );
        Ok(())
    }

    #[tokio::test]
    async fn the_one_where_january_falls_back_into_last_december() -> Result<(), ManifestError> {
        let store = InMemoryStorage::new().with_object(
            BUCKET,
            "reports/20231201-20240101/cur-Manifest.json",
            manifest_json(&["reports/dec.csv.gz"]),
        );
        let resolver = ManifestResolver::new(&store, BUCKET, "reports", "cur");
        let resolved = resolver.resolve(&EventTime::parse("2024-01-02").unwrap()).await?;
        assert_eq!(resolved.period.folder_name(), "20231201-20240101");
        Ok(())
    }

    #[tokio::test]
    async fn the_one_where_both_months_are_missing_and_we_say_so() {
        let store = InMemoryStorage::new();
        let resolver = ManifestResolver::new(&store, BUCKET, "reports", "cur");
        let err = resolver
            .resolve(&EventTime::parse("2024-03-15").unwrap())
            .await
            .unwrap_err();
        match err {
            ManifestError::NotFound {
                current_key,
                previous_key,
            } => {
                assert_eq!(current_key, "reports/20240301-20240401/cur-Manifest.json");
                assert_eq!(previous_key, "reports/20240201-20240301/cur-Manifest.json");
            }
            other => panic!("💀 expected NotFound, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn the_one_where_a_garbled_manifest_does_not_get_a_second_chance() {
        let store = InMemoryStorage::new()
            .with_object(
                BUCKET,
                "reports/20240301-20240401/cur-Manifest.json",
                b"{ not json".to_vec(),
            )
            .with_object(
                BUCKET,
                "reports/20240201-20240301/cur-Manifest.json",
                manifest_json(&["reports/feb.csv.gz"]),
            );
        let requested = store.requested.clone();
        let resolver = ManifestResolver::new(&store, BUCKET, "reports", "cur");
        let err = resolver
            .resolve(&EventTime::parse("2024-03-15").unwrap())
            .await
            .unwrap_err();
        assert!(matches!(err, ManifestError::Malformed { .. }), "got {:?}", err);
        assert_eq!(requested.lock().await.len(), 1);
    }
}
