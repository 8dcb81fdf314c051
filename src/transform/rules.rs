//! Declarative transform rule sets: rename/copy fields, drop fields, convert
//! units. Rules are data; the engine applies them.

use crate::transform::error::TransformError;
use crate::types::field_path::FieldPath;

/// Copies the value at `source` to `target`. With `delete_source` unset the
/// source stays readable in place, so the same value can live under two
/// names (the observation time is exposed both per-kind and as `time`).
#[derive(Debug, Clone)]
pub struct MappingRule {
    pub source: FieldPath,
    pub target: FieldPath,
    pub delete_source: bool,
}

/// Per-field physical conversions. Only dates occur in these feeds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnitConversion {
    /// Parse whatever timestamp representation the field holds and rewrite
    /// it as a normalized RFC 3339 UTC string.
    AsDateUtc,
}

/// A rule set, applied strictly in declaration order: mapping, then omit,
/// then unit conversion. Reordering changes results (an omit before a
/// mapping would drop a field meant to be renamed).
#[derive(Debug, Clone, Default)]
pub struct TransformRules {
    pub mapping: Vec<MappingRule>,
    pub omit: Vec<FieldPath>,
    pub unit: Vec<(FieldPath, UnitConversion)>,
}

impl TransformRules {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn map(mut self, source: &str, target: &str) -> Result<Self, TransformError> {
        self.mapping.push(MappingRule {
            source: FieldPath::parse(source)?,
            target: FieldPath::parse(target)?,
            delete_source: true,
        });
        Ok(self)
    }

    /// Like [`map`](Self::map), but keeps the source field in place.
    pub fn copy(mut self, source: &str, target: &str) -> Result<Self, TransformError> {
        self.mapping.push(MappingRule {
            source: FieldPath::parse(source)?,
            target: FieldPath::parse(target)?,
            delete_source: false,
        });
        Ok(self)
    }

    pub fn omit(mut self, path: &str) -> Result<Self, TransformError> {
        self.omit.push(FieldPath::parse(path)?);
        Ok(self)
    }

    pub fn omit_all<'a>(
        mut self,
        paths: impl IntoIterator<Item = &'a str>,
    ) -> Result<Self, TransformError> {
        for path in paths {
            self = self.omit(path)?;
        }
        Ok(self)
    }

    pub fn as_date_utc(mut self, path: &str) -> Result<Self, TransformError> {
        self.unit
            .push((FieldPath::parse(path)?, UnitConversion::AsDateUtc));
        Ok(self)
    }

    pub fn is_empty(&self) -> bool {
        self.mapping.is_empty() && self.omit.is_empty() && self.unit.is_empty()
    }
}
