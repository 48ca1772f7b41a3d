//! Grammar paths and node locations
//!
//! A grammar path is the dot-joined sequence of tags from the statement root
//! to a node. A location is the dot-joined sequence of ordinals: the key's
//! position within its object, or the element index when the key lives in an
//! array element. An array is treated as one logical node whose keys are its
//! elements, so grammar segments and location segments stay aligned (the
//! `then` marker is the only grammar segment without a location segment).

use crate::grammar::GrammarTag;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

/// Where a reference sits in the tree
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RefContext {
    pub grammar_path: String,
    pub location: String,
}

impl RefContext {
    /// Grammar segments from root to leaf
    pub fn grammar_segments(&self) -> impl Iterator<Item = &str> {
        self.grammar_path.split('.').filter(|s| !s.is_empty())
    }

    /// Whether `tags` occurs as a contiguous run of grammar segments
    pub fn has_sequence(&self, tags: &[GrammarTag]) -> bool {
        let segments: Vec<&str> = self.grammar_segments().collect();
        if tags.is_empty() || tags.len() > segments.len() {
            return false;
        }
        segments
            .windows(tags.len())
            .any(|window| window.iter().zip(tags).all(|(s, t)| *s == t.as_str()))
    }

    /// Whether the grammar path contains `tag` anywhere
    pub fn has_tag(&self, tag: &GrammarTag) -> bool {
        self.grammar_segments().any(|s| s == tag.as_str())
    }

    /// Location of the innermost node tagged `tag`
    pub fn location_of(&self, tag: &GrammarTag) -> Option<String> {
        let locations: Vec<&str> = location_segments(&self.location).collect();
        let mut depth = 0;
        let mut found = None;
        for segment in self.grammar_segments() {
            if segment == GrammarTag::Then.as_str() {
                continue;
            }
            depth += 1;
            if segment == tag.as_str() {
                found = Some(depth);
            }
        }
        found.map(|depth| locations[..depth.min(locations.len())].join("."))
    }

    /// Location of the node that holds this leaf
    pub fn parent_location(&self) -> &str {
        parent_location(&self.location)
    }
}

/// Position of the node currently being visited
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NodePath {
    grammar: String,
    location: String,
}

impl NodePath {
    /// Statement root
    pub fn root() -> Self {
        Self::default()
    }

    pub fn grammar(&self) -> &str {
        &self.grammar
    }

    pub fn location(&self) -> &str {
        &self.location
    }

    /// Path of the value stored under a key
    pub fn child(&self, tag: &GrammarTag, ordinal: usize) -> NodePath {
        NodePath {
            grammar: join(&self.grammar, tag.as_str()),
            location: join(&self.location, &ordinal.to_string()),
        }
    }

    /// Context of a scalar leaf stored under a key
    pub fn leaf(&self, tag: &GrammarTag, ordinal: usize) -> RefContext {
        let child = self.child(tag, ordinal);
        RefContext {
            grammar_path: child.grammar,
            location: child.location,
        }
    }

    /// Same node, with the `then` marker appended to its grammar path
    pub fn after_then(&self) -> NodePath {
        NodePath {
            grammar: join(&self.grammar, GrammarTag::Then.as_str()),
            location: self.location.clone(),
        }
    }

    /// Tag of the node itself
    pub fn tag(&self) -> Option<GrammarTag> {
        self.grammar
            .split('.')
            .rev()
            .find(|s| !s.is_empty() && *s != GrammarTag::Then.as_str())
            .map(GrammarTag::from_key)
    }
}

fn join(base: &str, segment: &str) -> String {
    if base.is_empty() {
        segment.to_string()
    } else {
        format!("{}.{}", base, segment)
    }
}

fn location_segments(location: &str) -> impl Iterator<Item = &str> {
    location.split('.').filter(|s| !s.is_empty())
}

/// Location with its last segment removed
pub fn parent_location(location: &str) -> &str {
    match location.rfind('.') {
        Some(idx) => &location[..idx],
        None => "",
    }
}

/// Whether `location` is `scope` or lies beneath it
pub fn is_within(location: &str, scope: &str) -> bool {
    if scope.is_empty() {
        return true;
    }
    location == scope
        || (location.starts_with(scope) && location[scope.len()..].starts_with('.'))
}

/// Whether `location` lies strictly beneath `scope`
pub fn is_strictly_within(location: &str, scope: &str) -> bool {
    location != scope && is_within(location, scope)
}

/// First segment of `location` below `scope`
pub fn sub_scope<'a>(location: &'a str, scope: &str) -> Option<&'a str> {
    if !is_strictly_within(location, scope) {
        return None;
    }
    let rest = if scope.is_empty() {
        location
    } else {
        &location[scope.len() + 1..]
    };
    rest.split('.').next()
}

/// Number of leading segments two locations share
pub fn common_prefix_len(a: &str, b: &str) -> usize {
    location_segments(a)
        .zip(location_segments(b))
        .take_while(|(x, y)| x == y)
        .count()
}

/// Numeric segment-wise ordering of locations
pub fn compare_locations(a: &str, b: &str) -> Ordering {
    let parse = |s: &str| s.parse::<usize>().unwrap_or(usize::MAX);
    let mut left = location_segments(a);
    let mut right = location_segments(b);
    loop {
        match (left.next(), right.next()) {
            (Some(x), Some(y)) => match parse(x).cmp(&parse(y)) {
                Ordering::Equal => continue,
                other => return other,
            },
            (Some(_), None) => return Ordering::Greater,
            (None, Some(_)) => return Ordering::Less,
            (None, None) => return Ordering::Equal,
        }
    }
}

#[cfg(test)]
#[path = "path_test.rs"]
mod tests;
