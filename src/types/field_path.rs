//! A validated dotted field path (`properties.icao`) over loosely-typed JSON
//! documents. Replaces ad-hoc string-keyed access with a parsed, reusable
//! path: malformed paths fail at parse time, not silently at lookup time.

use serde_json::{Map, Value};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum FieldPathError {
    #[error("field path is empty")]
    Empty,

    #[error("field path '{0}' contains an empty segment")]
    EmptySegment(String),

    #[error("field path '{0}' contains whitespace")]
    Whitespace(String),
}

/// A parsed dotted path into a JSON document.
///
/// Reads through a missing intermediate node yield `None`; writes create
/// intermediate objects as needed; removals of absent paths are silent.
///
/// # Examples
///
/// ```
/// use awc_ingest::FieldPath;
/// use serde_json::json;
///
/// let path: FieldPath = "properties.icao".parse().unwrap();
/// let mut doc = json!({});
/// path.set(&mut doc, "#KDEN".into());
/// assert_eq!(path.get(&doc), Some(&serde_json::Value::from("#KDEN")));
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FieldPath {
    raw: String,
    segments: Vec<String>,
}

impl FieldPath {
    pub fn parse(raw: &str) -> Result<Self, FieldPathError> {
        if raw.is_empty() {
            return Err(FieldPathError::Empty);
        }
        if raw.chars().any(char::is_whitespace) {
            return Err(FieldPathError::Whitespace(raw.to_string()));
        }
        let segments: Vec<String> = raw.split('.').map(str::to_string).collect();
        if segments.iter().any(String::is_empty) {
            return Err(FieldPathError::EmptySegment(raw.to_string()));
        }
        Ok(Self {
            raw: raw.to_string(),
            segments,
        })
    }

    pub fn as_str(&self) -> &str {
        &self.raw
    }

    /// Resolves the path against `doc`, returning `None` when any node along
    /// the way is absent or not an object.
    pub fn get<'a>(&self, doc: &'a Value) -> Option<&'a Value> {
        let mut node = doc;
        for segment in &self.segments {
            node = node.as_object()?.get(segment)?;
        }
        Some(node)
    }

    /// Writes `value` at the path, creating intermediate objects as needed.
    /// A non-object intermediate is replaced by an object.
    pub fn set(&self, doc: &mut Value, value: Value) {
        let mut node = doc;
        let (last, parents) = match self.segments.split_last() {
            Some(split) => split,
            None => return,
        };
        for segment in parents {
            if !node.is_object() {
                *node = Value::Object(Map::new());
            }
            let object = match node.as_object_mut() {
                Some(object) => object,
                None => return,
            };
            node = object
                .entry(segment.clone())
                .or_insert_with(|| Value::Object(Map::new()));
        }
        if !node.is_object() {
            *node = Value::Object(Map::new());
        }
        if let Some(object) = node.as_object_mut() {
            object.insert(last.clone(), value);
        }
    }

    /// Removes the value at the path, returning it when present. Absent paths
    /// (including missing intermediates) are a silent no-op.
    pub fn remove(&self, doc: &mut Value) -> Option<Value> {
        let mut node = doc;
        let (last, parents) = self.segments.split_last()?;
        for segment in parents {
            node = node.as_object_mut()?.get_mut(segment)?;
        }
        node.as_object_mut()?.remove(last)
    }
}

impl FromStr for FieldPath {
    type Err = FieldPathError;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        Self::parse(raw)
    }
}

impl fmt::Display for FieldPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.raw)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn parse_rejects_malformed_paths() {
        assert_eq!(FieldPath::parse(""), Err(FieldPathError::Empty));
        assert!(matches!(
            FieldPath::parse("properties..icao"),
            Err(FieldPathError::EmptySegment(_))
        ));
        assert!(matches!(
            FieldPath::parse(".icao"),
            Err(FieldPathError::EmptySegment(_))
        ));
        assert!(matches!(
            FieldPath::parse("properties. icao"),
            Err(FieldPathError::Whitespace(_))
        ));
    }

    #[test]
    fn get_resolves_nested_values() -> Result<(), FieldPathError> {
        let doc = json!({"properties": {"icao": "#KDEN", "temperature": 5}});
        let path = FieldPath::parse("properties.icao")?;
        assert_eq!(path.get(&doc), Some(&Value::from("#KDEN")));
        Ok(())
    }

    #[test]
    fn get_on_missing_intermediate_is_none() -> Result<(), FieldPathError> {
        let doc = json!({"properties": {}});
        assert_eq!(FieldPath::parse("geometry.coordinates")?.get(&doc), None);
        assert_eq!(FieldPath::parse("properties.missing.deep")?.get(&doc), None);
        Ok(())
    }

    #[test]
    fn set_creates_intermediate_objects() -> Result<(), FieldPathError> {
        let mut doc = json!({});
        let path = FieldPath::parse("properties.wind.speed")?;
        path.set(&mut doc, Value::from(10));
        assert_eq!(doc, json!({"properties": {"wind": {"speed": 10}}}));
        Ok(())
    }

    #[test]
    fn set_replaces_non_object_intermediates() -> Result<(), FieldPathError> {
        let mut doc = json!({"properties": 3});
        FieldPath::parse("properties.icao")?.set(&mut doc, Value::from("#KDEN"));
        assert_eq!(doc, json!({"properties": {"icao": "#KDEN"}}));
        Ok(())
    }

    #[test]
    fn remove_is_silent_on_absent_paths() -> Result<(), FieldPathError> {
        let mut doc = json!({"properties": {"icao": "#KDEN"}});
        assert_eq!(FieldPath::parse("properties.visibility")?.remove(&mut doc), None);
        assert_eq!(FieldPath::parse("missing.node")?.remove(&mut doc), None);
        assert_eq!(
            FieldPath::parse("properties.icao")?.remove(&mut doc),
            Some(Value::from("#KDEN"))
        );
        assert_eq!(doc, json!({"properties": {}}));
        Ok(())
    }
}
