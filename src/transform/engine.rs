//! Applies a [`TransformRules`] set to one JSON document. Pure, synchronous,
//! and idempotent: reapplying a rule set to its own output is a no-op apart
//! from re-running the same deterministic conversions.

use crate::transform::rules::{TransformRules, UnitConversion};
use crate::types::feature::{parse_utc_instant, Document};
use chrono::SecondsFormat;
use log::debug;
use serde_json::Value;

/// Applies mapping, omit and unit clauses, in that order.
///
/// Per-field failures are non-fatal: a mapping whose source is absent does
/// nothing, an omit of an absent path does nothing, and a timestamp that
/// fails to parse is passed through unchanged.
pub fn apply(rules: &TransformRules, document: &mut Document) {
    for rule in &rules.mapping {
        if let Some(value) = rule.source.get(document).cloned() {
            rule.target.set(document, value);
            if rule.delete_source {
                rule.source.remove(document);
            }
        }
    }
    for path in &rules.omit {
        path.remove(document);
    }
    for (path, conversion) in &rules.unit {
        match conversion {
            UnitConversion::AsDateUtc => {
                let Some(value) = path.get(document) else {
                    continue;
                };
                let instant = match value {
                    Value::String(raw) => parse_utc_instant(raw),
                    Value::Number(number) => number
                        .as_i64()
                        .and_then(|seconds| chrono::DateTime::from_timestamp(seconds, 0)),
                    _ => None,
                };
                match instant {
                    Some(instant) => path.set(
                        document,
                        Value::from(instant.to_rfc3339_opts(SecondsFormat::Secs, true)),
                    ),
                    None => debug!(
                        "value at '{}' is not a recognizable timestamp, leaving as is",
                        path
                    ),
                }
            }
        }
    }
}
