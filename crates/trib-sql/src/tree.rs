//! Parse tree navigation helpers

use crate::error::{SqlError, SqlResult};
use crate::grammar::GrammarTag;
use serde_json::{Map, Value};

/// Statement nodes of a parser result.
///
/// Accepts either the whole result (`{"file": ...}`) or the `file` node.
/// The file node holds a single `statement` key, or an array mixing
/// statements with terminators.
pub fn statements(tree: &Value) -> SqlResult<Vec<&Value>> {
    let file = match tree.get("file") {
        Some(file) => file,
        None => tree,
    };

    let found: Vec<&Value> = match file {
        Value::Object(map) => map
            .iter()
            .filter(|(key, _)| GrammarTag::from_key(key) == GrammarTag::Statement)
            .map(|(_, value)| value)
            .collect(),
        Value::Array(items) => items
            .iter()
            .filter_map(|item| item.get("statement"))
            .collect(),
        _ => Vec::new(),
    };

    if found.is_empty() {
        return Err(SqlError::NoStatement);
    }
    Ok(found)
}

/// Join the array form of a dotted reference back into text.
///
/// The parser splits `a.b.c` into single-key elements such as
/// `[{"naked_identifier": "a"}, {"dot": "."}, ...]`. Whitespace and comments
/// are skipped; any other element is a malformed tree.
pub fn join_array_value(items: &[Value], path: &str) -> SqlResult<String> {
    let mut joined = String::new();
    for item in items {
        let entries = item.as_object().ok_or_else(|| SqlError::MalformedTree {
            path: path.to_string(),
            message: "array element is not an object".to_string(),
        })?;
        for (key, value) in entries {
            match GrammarTag::from_key(key) {
                GrammarTag::Identifier | GrammarTag::Star => {
                    joined.push_str(scalar(value, key, path)?);
                }
                GrammarTag::Dot => joined.push('.'),
                GrammarTag::NonCode => {}
                other => {
                    return Err(SqlError::MalformedTree {
                        path: path.to_string(),
                        message: format!("unexpected '{}' in dotted reference", other),
                    })
                }
            }
        }
    }
    Ok(joined)
}

fn scalar<'a>(value: &'a Value, key: &str, path: &str) -> SqlResult<&'a str> {
    value.as_str().ok_or_else(|| SqlError::MalformedTree {
        path: path.to_string(),
        message: format!("'{}' is not a string", key),
    })
}

/// Whether an array element is the `THEN` keyword
pub fn is_then_keyword(entries: &Map<String, Value>) -> bool {
    entries.iter().any(|(key, value)| {
        GrammarTag::from_key(key) == GrammarTag::Keyword
            && value
                .as_str()
                .is_some_and(|text| text.eq_ignore_ascii_case("then"))
    })
}

/// Keys of a node that carry code
pub fn code_keys(entries: &Map<String, Value>) -> Vec<&str> {
    entries
        .keys()
        .filter(|key| GrammarTag::from_key(key) != GrammarTag::NonCode)
        .map(String::as_str)
        .collect()
}
