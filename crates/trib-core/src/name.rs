//! Dotted warehouse names: splitting, sanitising and tolerant comparison.
//!
//! Unquoted identifier segments fold to upper case, quoted segments keep
//! their case and lose the quotes. A name is split on dots that sit outside
//! double quotes and is read right-to-left, so `db.schema.table` and `table`
//! both yield `table` as the object name with the missing qualifiers absent.

use crate::error::{CoreError, CoreResult};
use serde::{Deserialize, Serialize};

/// Sanitise one identifier segment.
pub fn sanitize_segment(segment: &str) -> String {
    let trimmed = segment.trim();
    let quoted = trimmed.len() >= 2
        && ((trimmed.starts_with('"') && trimmed.ends_with('"'))
            || (trimmed.starts_with('`') && trimmed.ends_with('`')));
    if quoted {
        trimmed[1..trimmed.len() - 1].replace("\"\"", "\"")
    } else {
        trimmed.to_uppercase()
    }
}

/// Split a dotted name into sanitised segments, honouring quoted segments.
pub fn split_dotted(value: &str) -> Vec<String> {
    let mut segments = Vec::new();
    let mut current = String::new();
    let mut in_quotes = false;

    for ch in value.chars() {
        match ch {
            '"' => {
                in_quotes = !in_quotes;
                current.push(ch);
            }
            '.' if !in_quotes => {
                segments.push(sanitize_segment(&current));
                current.clear();
            }
            _ => current.push(ch),
        }
    }
    segments.push(sanitize_segment(&current));
    segments
}

/// Join sanitised segments back into a dotted name.
///
/// Segments that would not survive upper-case folding are quoted again, so
/// `split_dotted(&join_segments(&split_dotted(x))) == split_dotted(x)`.
pub fn join_segments<S: AsRef<str>>(segments: &[S]) -> String {
    segments
        .iter()
        .map(|s| {
            let s = s.as_ref();
            let needs_quotes = s != s.to_uppercase()
                || s.contains('.')
                || s.contains('"')
                || s.chars().any(char::is_whitespace);
            if needs_quotes {
                format!("\"{}\"", s.replace('"', "\"\""))
            } else {
                s.to_string()
            }
        })
        .collect::<Vec<_>>()
        .join(".")
}

/// Case-insensitive string equality.
pub fn insensitive_eq(a: &str, b: &str) -> bool {
    a.eq_ignore_ascii_case(b) || a.to_lowercase() == b.to_lowercase()
}

/// Tri-state equality for optional qualifiers: an absent value never conflicts.
pub fn equal_or_either_unknown(a: Option<&str>, b: Option<&str>) -> bool {
    match (a, b) {
        (Some(a), Some(b)) => insensitive_eq(a, b),
        _ => true,
    }
}

/// A possibly partially qualified object name.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct QualifiedName {
    /// Object (table / view / CTE) name
    pub name: String,
    /// Schema, if stated
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub schema: Option<String>,
    /// Database, if stated
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub database: Option<String>,
    /// Warehouse, if stated
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub warehouse: Option<String>,
}

impl QualifiedName {
    /// Read `warehouse.database.schema.name` right-to-left.
    pub fn parse(value: &str) -> Self {
        Self::from_segments(&split_dotted(value))
    }

    /// Build from sanitised segments, last segment being the object name.
    ///
    /// Segments beyond the warehouse position are dropped.
    pub fn from_segments(segments: &[String]) -> Self {
        let mut rev = segments.iter().rev().cloned();
        let name = rev.next().unwrap_or_default();
        let schema = rev.next();
        let database = rev.next();
        let warehouse = rev.next();
        if rev.next().is_some() {
            log::debug!(
                "Ignoring leading segments of over-qualified name '{}'",
                join_segments(segments)
            );
        }
        Self {
            name,
            schema,
            database,
            warehouse,
        }
    }

    /// Parse a relation name that must have the `database.schema.name` shape.
    pub fn relation(value: &str) -> CoreResult<Self> {
        let segments = split_dotted(value);
        if segments.len() != 3 || segments.iter().any(|s| s.is_empty()) {
            return Err(CoreError::InvalidRelationName {
                name: value.to_string(),
            });
        }
        Ok(Self::from_segments(&segments))
    }

    /// Whether both names may denote the same object.
    pub fn is_compatible(&self, other: &QualifiedName) -> bool {
        insensitive_eq(&self.name, &other.name)
            && equal_or_either_unknown(self.schema.as_deref(), other.schema.as_deref())
            && equal_or_either_unknown(self.database.as_deref(), other.database.as_deref())
            && equal_or_either_unknown(self.warehouse.as_deref(), other.warehouse.as_deref())
    }
}

impl std::fmt::Display for QualifiedName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let segments: Vec<&str> = [
            self.warehouse.as_deref(),
            self.database.as_deref(),
            self.schema.as_deref(),
            Some(self.name.as_str()),
        ]
        .into_iter()
        .flatten()
        .collect();
        f.write_str(&join_segments(&segments))
    }
}

#[cfg(test)]
#[path = "name_test.rs"]
mod tests;
