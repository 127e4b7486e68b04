//! Item entity
//!
//! JSON uses camelCase field names. Only `name` is required on input; absent
//! optional fields are omitted on output.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::ValidationError;

/// A shippable item.
///
/// `id` and `last_updated` are assigned by storage; whatever a caller puts
/// there on create is ignored.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Item {
    #[serde(default)]
    pub id: String,

    pub name: String,

    #[serde(default)]
    pub warehouse_location: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_updated: Option<DateTime<Utc>>,

    #[serde(default)]
    pub weight: f64,

    #[serde(default)]
    pub dimensions: Vec<f64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub attributes: Option<Map<String, Value>>,

    /// Expected delivery time in milliseconds
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub delivery_time_ms: Option<i64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl Item {
    /// Convenience constructor for an item with just a name.
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    /// Check the fields a caller controls.
    ///
    /// # Rules
    /// - `name` must not be blank
    /// - `weight` and every dimension must be finite and non-negative
    /// - `delivery_time_ms` must not be negative
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.name.trim().is_empty() {
            return Err(ValidationError::Empty { field: "name" });
        }
        if !self.weight.is_finite() || self.weight < 0.0 {
            return Err(ValidationError::OutOfRange {
                field: "weight",
                reason: format!("{} is not a non-negative number", self.weight),
            });
        }
        if let Some(bad) = self.dimensions.iter().find(|d| !d.is_finite() || **d < 0.0) {
            return Err(ValidationError::OutOfRange {
                field: "dimensions",
                reason: format!("{} is not a non-negative number", bad),
            });
        }
        if let Some(ms) = self.delivery_time_ms.filter(|ms| *ms < 0) {
            return Err(ValidationError::OutOfRange {
                field: "deliveryTimeMs",
                reason: format!("{} is negative", ms),
            });
        }
        Ok(())
    }
}
