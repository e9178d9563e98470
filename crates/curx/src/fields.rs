//! 🏷️ Field Type Registry: the short list of CUR columns that deserve to be numbers.
//!
//! Everything else in a Cost and Usage Report stays a string, and honestly that's fine.
//! Strings are the sweatpants of data types. Comfortable. Forgiving. Never throw.
//!
//! 🧠 Knowledge graph:
//! - Keys are header names AFTER `/` → `_` normalization (`lineItem/UsageAmount` → `lineItem_UsageAmount`)
//! - Used by: `transforms::transform_row`
//! - Parsers never fail loudly. A bad number falls back to the original string. 🦆

use serde_json::{Number, Value};

/// 🔢 What a registered column is expected to hold.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum FieldKind {
    Float,
    Integer,
}

impl FieldKind {
    /// 🔄 Coerce `raw` into this kind, or hand back the original string untouched.
    ///
    /// `NaN` and `inf` parse as f64 but JSON has no spelling for them, so they stay strings.
    pub(crate) fn parse(self, raw: &str) -> Value {
        match self {
            FieldKind::Float => parse_float(raw),
            FieldKind::Integer => parse_int(raw),
        }
    }

    pub(crate) fn expected_type(self) -> &'static str {
        match self {
            FieldKind::Float => "float",
            FieldKind::Integer => "integer",
        }
    }
}

fn parse_float(raw: &str) -> Value {
    raw.trim()
        .parse::<f64>()
        .ok()
        .and_then(Number::from_f64)
        .map(Value::Number)
        .unwrap_or_else(|| Value::String(raw.to_string()))
}

fn parse_int(raw: &str) -> Value {
    match raw.trim().parse::<i64>() {
        Ok(n) => Value::Number(n.into()),
        Err(_) => Value::String(raw.to_string()),
    }
}

// 💸 The money columns and the vcpu count. If AWS adds a column, it goes here.
const FIELD_REGISTRY: &[(&str, FieldKind)] = &[
    ("lineItem_UsageAmount", FieldKind::Float),
    ("lineItem_BlendedRate", FieldKind::Float),
    ("lineItem_BlendedCost", FieldKind::Float),
    ("lineItem_UnblendedRate", FieldKind::Float),
    ("lineItem_UnblendedCost", FieldKind::Float),
    ("pricing_publicOnDemandCost", FieldKind::Float),
    ("pricing_publicOnDemandRate", FieldKind::Float),
    ("product_vcpu", FieldKind::Integer),
    ("product_ecu", FieldKind::Float),
    ("reservation_AmortizedUpfrontCostForUsage", FieldKind::Float),
    ("reservation_RecurringFeeForUsage", FieldKind::Float),
    ("reservation_EffectiveCost", FieldKind::Float),
];

/// 🔍 Look up a normalized header name. `None` means "you're a string now, kid."
pub(crate) fn lookup(field_name: &str) -> Option<FieldKind> {
    FIELD_REGISTRY
        .iter()
        .find(|(name, _)| *name == field_name)
        .map(|(_, kind)| *kind)
}
