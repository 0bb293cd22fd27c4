use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A single value, captured at a point in time.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TimeData {
    value: f64,
    timestamp: DateTime<Utc>,
}

impl TimeData {
    /// A sample taken right now.
    pub fn new(value: f64) -> Self {
        Self::with_timestamp(value, Utc::now())
    }

    pub fn with_timestamp(value: f64, timestamp: DateTime<Utc>) -> Self {
        TimeData { value, timestamp }
    }

    pub fn value(&self) -> f64 {
        self.value
    }

    pub fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }
}
