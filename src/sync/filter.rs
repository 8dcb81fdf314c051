//! The differential sync filter: drops candidate records whose timestamp is
//! already the last one persisted for their station, so a run only writes
//! what is genuinely new.

use crate::sync::last_known::LastKnownTimes;
use crate::types::feature::Feature;
use log::info;

/// Keeps the candidates that are new relative to `last_known`, preserving
/// input order.
///
/// A candidate is new when no last-known entry exists for its station key,
/// or when its timestamp differs from the last-known one. The comparison is
/// deliberately `!=` rather than `>`: the feeds occasionally republish or
/// backfill older timestamps, and those must be written again. Candidates
/// without a readable key or timestamp are treated as new and left for the
/// upsert key to deduplicate.
pub fn filter_new(
    candidates: Vec<Feature>,
    time_property: &str,
    last_known: &LastKnownTimes,
) -> Vec<Feature> {
    let new_data: Vec<Feature> = candidates
        .into_iter()
        .filter(|feature| {
            let Some(key) = feature.icao() else {
                return true;
            };
            let Some(last_time) = last_known.get(key) else {
                return true;
            };
            match feature.instant_property(time_property) {
                Some(candidate_time) => candidate_time != last_time,
                None => true,
            }
        })
        .collect();
    info!("Found {} new data", new_data.len());
    new_data
}
