//! The dedup baseline: the most recent persisted observation time per
//! station key, produced by the store's sort+group-last aggregation. This is
//! the only state that survives between ingestion runs.

use chrono::{DateTime, Utc};
use std::collections::HashMap;

/// One row of the store aggregation: a station key and the last `time` value
/// persisted under it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LastKnownEntry {
    pub key: String,
    pub last_time: DateTime<Utc>,
}

/// Lookup table over the aggregation result.
#[derive(Debug, Clone, Default)]
pub struct LastKnownTimes {
    entries: HashMap<String, DateTime<Utc>>,
}

impl LastKnownTimes {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_entries(entries: impl IntoIterator<Item = LastKnownEntry>) -> Self {
        Self {
            entries: entries
                .into_iter()
                .map(|entry| (entry.key, entry.last_time))
                .collect(),
        }
    }

    pub fn get(&self, key: &str) -> Option<DateTime<Utc>> {
        self.entries.get(key).copied()
    }

    pub fn insert(&mut self, key: impl Into<String>, last_time: DateTime<Utc>) {
        self.entries.insert(key.into(), last_time);
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn builds_from_aggregation_entries() {
        let t = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let table = LastKnownTimes::from_entries([LastKnownEntry {
            key: "#KDEN".to_string(),
            last_time: t,
        }]);
        assert_eq!(table.get("#KDEN"), Some(t));
        assert_eq!(table.get("#KSFO"), None);
        assert_eq!(table.len(), 1);
    }
}
