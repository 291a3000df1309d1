use std::time::Duration;

use serde::Deserialize;

/// Tunables for the collector loops.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct CollectorConfig {
    /// Cadence of the parameter and connection poll cycle.
    #[serde(with = "seconds")]
    pub poll_interval: Duration,
    /// Sample interval requested for the interface counter stream.
    #[serde(with = "seconds")]
    pub sample_interval: Duration,
}

impl Default for CollectorConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_secs(10),
            sample_interval: Duration::from_secs(10),
        }
    }
}

mod seconds {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer};

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        u64::deserialize(deserializer).map(Duration::from_secs)
    }
}
