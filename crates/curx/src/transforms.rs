//! 🔄 Transforms: one CSV row in, one Billing Record out.
//!
//! 🎬 COLD OPEN. INT. ACCOUNTING DEPARTMENT. 4:59 PM ON THE LAST DAY OF THE MONTH.
//!
//! A CSV row arrives. It has 127 columns. 80 of them are empty. The column names
//! contain slashes, which the log platform treats like a personal insult.
//! This module cleans it up: renames `lineItem/UnblendedCost` to
//! `lineItem_UnblendedCost`, turns the money columns into numbers, throws away
//! the empties, and stamps the whole thing with the invocation time.
//!
//! ## Knowledge Graph 🧠
//! - Depends on: `fields` (the registry), `event::EventTime`
//! - Used by: `orchestrator` (per row), after `csv_fields::split_fields`
//! - Output: `BillingRecord`, serialized by the `shipper` into one NDJSON line
//!
//! ⚠️ The transformer never fails. A malformed number is just a string with ambitions. 🦆

pub(crate) mod csv_fields;

use serde::Serialize;
use serde_json::{Map, Value};
use tracing::trace;

use crate::event::EventTime;
use crate::fields;

pub(crate) const TIMESTAMP_FIELD: &str = "@timestamp";
pub(crate) const UUID_FIELD: &str = "uuid";

/// 📒 One billing row, ready for the wire.
///
/// Insertion-ordered: `@timestamp`, `uuid`, then the columns in CSV order.
/// Never contains an empty-string value.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(transparent)]
pub(crate) struct BillingRecord(Map<String, Value>);

impl BillingRecord {
    #[cfg(test)]
    pub(crate) fn get(&self, field_name: &str) -> Option<&Value> {
        self.0.get(field_name)
    }

    #[cfg(test)]
    pub(crate) fn len(&self) -> usize {
        self.0.len()
    }

    /// 📡 One compact JSON object, no trailing newline. The shipper owns the newlines.
    pub(crate) fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(&self.0)
    }
}

/// 🧹 The log platform treats `/` as a path separator. CUR uses it as a namespace separator.
/// Neither side will budge, so we swap in `_`.
pub(crate) fn normalize_field_name(name: &str) -> String {
    name.replace('/', "_")
}

/// 🔤 The deterministic identifier: shared by every row of an invocation.
pub(crate) fn invocation_uuid(event_time: &EventTime) -> String {
    format!("billing_report_{}", event_time.as_str())
}

/// 🔄 Zip headers with row values into a `BillingRecord`.
///
/// Ragged rows are not an error: extra values without a header (or headers without
/// a value) are simply left unpaired.
pub(crate) fn transform_row(
    headers: &[String],
    row_fields: &[String],
    event_time: &EventTime,
) -> BillingRecord {
    let mut record = Map::with_capacity(headers.len().min(row_fields.len()) + 2);
    record.insert(
        TIMESTAMP_FIELD.to_string(),
        Value::String(event_time.as_str().to_string()),
    );
    record.insert(UUID_FIELD.to_string(), Value::String(invocation_uuid(event_time)));

    for (header, raw_value) in headers.iter().zip(row_fields) {
        if raw_value.is_empty() {
            continue;
        }
        let field_name = normalize_field_name(header);
        let value = match fields::lookup(&field_name) {
            Some(kind) => {
                let parsed = kind.parse(raw_value);
                if parsed.is_string() {
                    trace!(
                        "🔢 {} should be {} but got {:?}, keeping the string",
                        field_name,
                        kind.expected_type(),
                        raw_value
                    );
                }
                parsed
            }
            None => Value::String(raw_value.clone()),
        };
        record.insert(field_name, value);
    }

    BillingRecord(record)
}
