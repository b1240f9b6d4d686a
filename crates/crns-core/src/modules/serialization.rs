//! Boundary conversion between internal optional values and the external
//! `-999` sentinel used by persisted series files.

use crate::common::constants::NO_VALUE;

/// Serde adapter for `Option<f64>` columns: `None` is persisted as the
/// sentinel, and incoming sentinel or non-finite values become `None`.
pub mod sentinel {
    use super::{is_no_value, NO_VALUE};
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S>(value: &Option<f64>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_f64(value.unwrap_or(NO_VALUE))
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Option<f64>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let value = Option::<f64>::deserialize(deserializer)?;
        Ok(value.filter(|inner| !is_no_value(*inner)))
    }
}

pub fn is_no_value(value: f64) -> bool {
    !value.is_finite() || (value - NO_VALUE).abs() < 1e-9
}

/// Persisted series values are limited to three decimal places.
pub fn round3(value: f64) -> f64 {
    (value * 1000.0).round() / 1000.0
}
