//! Time buckets under which one cached quote stays valid

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Returned when a granularity name is not recognised
#[derive(Debug, Error)]
#[error("unknown bucket granularity: '{0}'. Valid values: day, minute")]
pub struct UnknownGranularity(pub String);

/// How coarse the cache key is
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BucketGranularity {
    /// One upstream fetch per calendar day
    #[default]
    Day,
    /// One upstream fetch per wall-clock minute
    Minute,
}

impl BucketGranularity {
    /// Computes the bucket key for a point in time
    ///
    /// Keys are `YYYY-MM-DD` for days and `YYYY-MM-DD HH:MM` for minutes.
    pub fn bucket_key(self, now: DateTime<Utc>) -> String {
        match self {
            BucketGranularity::Day => now.format("%Y-%m-%d").to_string(),
            BucketGranularity::Minute => now.format("%Y-%m-%d %H:%M").to_string(),
        }
    }

    /// Parses a granularity name
    pub fn from_str(s: &str) -> Result<Self, UnknownGranularity> {
        match s.to_lowercase().as_str() {
            "day" | "daily" | "date" => Ok(BucketGranularity::Day),
            "minute" => Ok(BucketGranularity::Minute),
            _ => Err(UnknownGranularity(s.to_string())),
        }
    }
}
