//! Reference extraction from parse trees
//!
//! The walk is functional: every node returns its own [`Extraction`] and
//! parents merge child results. Aliases are the only state that crosses node
//! boundaries. An `alias_expression` opens a pending alias bounded to the
//! node that holds it; the alias is threaded upward until it is claimed by a
//! reference or its bounding node finishes, at which point it is allocated
//! to the single unaliased reference group it can describe.

use crate::error::{SqlError, SqlResult};
use crate::grammar::GrammarTag;
use crate::path::{is_strictly_within, is_within, parent_location, sub_scope, NodePath, RefContext};
use crate::refs::{ColumnPrototype, DependencyType, MaterializationPrototype, RefsPrototype};
use crate::tree::{code_keys, is_then_keyword, join_array_value};
use serde_json::{Map, Value};
use std::collections::BTreeSet;
use trib_core::name::{sanitize_segment, split_dotted};
use trib_core::QualifiedName;

/// Default recursion limit
pub const DEFAULT_MAX_DEPTH: usize = 256;

/// An alias waiting for its target
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingAlias {
    pub value: String,
    /// Where the alias identifier itself sits
    pub definition: RefContext,
    /// Location of the node that bounds the alias
    pub bounded_scope: String,
    pub consumed: bool,
}

/// Result of visiting one node
#[derive(Debug, Clone, Default)]
pub struct Extraction {
    pub alias: Option<PendingAlias>,
    pub refs: RefsPrototype,
}

impl Extraction {
    fn open_alias_mut(&mut self) -> Option<&mut PendingAlias> {
        self.alias.as_mut().filter(|alias| !alias.consumed)
    }
}

/// Walks one statement tree
#[derive(Debug, Clone, Copy)]
pub struct RefExtractor {
    max_depth: usize,
}

impl Default for RefExtractor {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_DEPTH)
    }
}

impl RefExtractor {
    pub fn new(max_depth: usize) -> Self {
        Self { max_depth }
    }

    /// Extract reference prototypes from a statement node
    pub fn extract(&self, statement: &Value) -> SqlResult<RefsPrototype> {
        let node = statement.as_object().ok_or_else(|| SqlError::MalformedTree {
            path: "statement".to_string(),
            message: "statement is not an object".to_string(),
        })?;

        let extraction = self.visit_node(node, &NodePath::root(), 0)?;
        if let Some(alias) = extraction.alias.filter(|alias| !alias.consumed) {
            return Err(SqlError::UnmatchedAlias {
                alias: alias.value,
                scope: alias.bounded_scope,
                reason: "statement ended with the alias unresolved".to_string(),
            });
        }
        Ok(extraction.refs)
    }

    fn check_depth(&self, depth: usize) -> SqlResult<()> {
        if depth > self.max_depth {
            return Err(SqlError::MaxDepthExceeded {
                max_depth: self.max_depth,
            });
        }
        Ok(())
    }

    fn visit_node(
        &self,
        node: &Map<String, Value>,
        path: &NodePath,
        depth: usize,
    ) -> SqlResult<Extraction> {
        self.check_depth(depth)?;

        let mut acc = Extraction::default();
        let mut current = path.clone();
        for (ordinal, (key, value)) in node.iter().enumerate() {
            self.visit_entry(key, value, &current, ordinal, depth, &mut acc)?;
            if GrammarTag::from_key(key) == GrammarTag::Keyword
                && value
                    .as_str()
                    .is_some_and(|text| text.eq_ignore_ascii_case("then"))
            {
                current = current.after_then();
            }
        }
        close_scope(acc, path.location())
    }

    /// Arrays are one logical node whose keys are the elements' keys, each
    /// positioned at its element index
    fn visit_array(
        &self,
        tag: &GrammarTag,
        items: &[Value],
        path: &NodePath,
        depth: usize,
    ) -> SqlResult<Extraction> {
        self.check_depth(depth)?;

        let mut acc = Extraction::default();
        if *tag == GrammarTag::WithCompoundStatement {
            for (index, item) in items.iter().enumerate() {
                let Some(entries) = item.as_object() else {
                    continue;
                };
                let mut element = Extraction::default();
                for (key, value) in entries {
                    self.visit_entry(key, value, path, index, depth, &mut element)?;
                }
                acc.refs.merge(element.refs);
                if let Some(alias) = element.alias.filter(|alias| !alias.consumed) {
                    acc.alias = Some(alias);
                }
            }
            return close_scope(acc, path.location());
        }

        let mut current = path.clone();
        for (index, item) in items.iter().enumerate() {
            let Some(entries) = item.as_object() else {
                log::debug!("Skipping non-object element in '{}'", path.grammar());
                continue;
            };
            for (key, value) in entries {
                self.visit_entry(key, value, &current, index, depth, &mut acc)?;
            }
            if is_then_keyword(entries) {
                current = current.after_then();
            }
        }
        close_scope(acc, path.location())
    }

    fn visit_entry(
        &self,
        key: &str,
        value: &Value,
        path: &NodePath,
        ordinal: usize,
        depth: usize,
        acc: &mut Extraction,
    ) -> SqlResult<()> {
        let tag = GrammarTag::from_key(key);
        match value {
            Value::String(text) => visit_scalar(&tag, text, path, ordinal, acc),
            Value::Object(child) if tag == GrammarTag::WildcardIdentifier => {
                let wildcard = wildcard_from_object(child, path.leaf(&tag, ordinal))?;
                acc.refs.wildcards.push(wildcard);
                Ok(())
            }
            Value::Object(child) => {
                let sub = self.visit_node(child, &path.child(&tag, ordinal), depth + 1)?;
                merge_refs(acc, sub)
            }
            Value::Array(items) => {
                let child = path.child(&tag, ordinal);
                match tag {
                    GrammarTag::ColumnReference => {
                        let text = join_array_value(items, child.grammar())?;
                        emit_column(acc, &text, child.leaf(&GrammarTag::Identifier, 0));
                        Ok(())
                    }
                    GrammarTag::TableReference => {
                        let text = join_array_value(items, child.grammar())?;
                        emit_materialization(acc, &text, child.leaf(&GrammarTag::Identifier, 0));
                        Ok(())
                    }
                    GrammarTag::WildcardIdentifier => {
                        let text = join_array_value(items, child.grammar())?;
                        let context = path.leaf(&tag, ordinal);
                        acc.refs.wildcards.push(wildcard_prototype(&text, context));
                        Ok(())
                    }
                    _ => {
                        let sub = self.visit_array(&tag, items, &child, depth + 1)?;
                        merge_refs(acc, sub)
                    }
                }
            }
            _ => Ok(()),
        }
    }
}

fn visit_scalar(
    tag: &GrammarTag,
    text: &str,
    path: &NodePath,
    ordinal: usize,
    acc: &mut Extraction,
) -> SqlResult<()> {
    match tag {
        GrammarTag::Identifier => {
            let context = path.leaf(tag, ordinal);
            let parent = path.tag();
            if parent == Some(GrammarTag::AliasExpression) {
                open_alias(acc, text, context, path)?;
            } else if context.has_tag(&GrammarTag::ColumnReference)
                || parent == Some(GrammarTag::ColumnDefinition)
            {
                emit_column(acc, text, context);
            } else if context.has_tag(&GrammarTag::TableReference)
                || parent == Some(GrammarTag::CommonTableExpression)
            {
                emit_materialization(acc, text, context);
            }
        }
        GrammarTag::WildcardIdentifier => {
            let context = path.leaf(tag, ordinal);
            acc.refs.wildcards.push(wildcard_prototype(text, context));
        }
        tag if tag.is_alias_target() => {
            if let Some(alias) = acc.open_alias_mut() {
                alias.consumed = true;
                let column = column_from_alias(alias);
                acc.refs.columns.push(column);
            }
        }
        _ => {}
    }
    Ok(())
}

fn open_alias(
    acc: &mut Extraction,
    text: &str,
    definition: RefContext,
    path: &NodePath,
) -> SqlResult<()> {
    let value = sanitize_segment(text);
    if let Some(existing) = acc.open_alias_mut() {
        return Err(SqlError::UnmatchedAlias {
            alias: existing.value.clone(),
            scope: existing.bounded_scope.clone(),
            reason: format!("alias '{}' opened before it was claimed", value),
        });
    }
    acc.alias = Some(PendingAlias {
        value,
        definition,
        bounded_scope: parent_location(path.location()).to_string(),
        consumed: false,
    });
    Ok(())
}

fn emit_column(acc: &mut Extraction, text: &str, context: RefContext) {
    let mut column = column_prototype(text, context);
    if let Some(alias) = acc.open_alias_mut() {
        alias.consumed = true;
        column.alias = Some(alias.value.clone());
    }
    acc.refs.columns.push(column);
}

fn emit_materialization(acc: &mut Extraction, text: &str, context: RefContext) {
    let mut materialization =
        MaterializationPrototype::from_name(QualifiedName::parse(text), context);
    if let Some(alias) = acc.open_alias_mut() {
        alias.consumed = true;
        materialization.alias = Some(alias.value.clone());
    }
    acc.refs.push_materialization(materialization);
}

/// Build a column prototype from dotted text, read right-to-left as
/// `warehouse.database.schema.materialization.column`
pub fn column_prototype(text: &str, context: RefContext) -> ColumnPrototype {
    let mut segments = split_dotted(text).into_iter().rev();
    let name = segments.next().unwrap_or_default();
    let materialization_name = segments.next();
    let schema_name = segments.next();
    let database_name = segments.next();
    let warehouse_name = segments.next();

    ColumnPrototype {
        name,
        alias: None,
        materialization_name,
        schema_name,
        database_name,
        warehouse_name,
        dependency_type: classify_dependency(&context),
        is_wildcard_ref: false,
        is_compound_value_ref: is_compound_value(&context),
        context,
    }
}

fn wildcard_prototype(text: &str, context: RefContext) -> ColumnPrototype {
    let mut wildcard = column_prototype(text, context);
    wildcard.is_wildcard_ref = true;
    wildcard
}

fn column_from_alias(alias: &PendingAlias) -> ColumnPrototype {
    ColumnPrototype {
        name: alias.value.clone(),
        alias: None,
        materialization_name: None,
        schema_name: None,
        database_name: None,
        warehouse_name: None,
        dependency_type: classify_dependency(&alias.definition),
        is_wildcard_ref: false,
        is_compound_value_ref: false,
        context: alias.definition.clone(),
    }
}

/// `a.*` or `*`
fn wildcard_from_object(
    entries: &Map<String, Value>,
    context: RefContext,
) -> SqlResult<ColumnPrototype> {
    let keys = code_keys(entries);
    let has = |wanted: GrammarTag| keys.iter().any(|k| GrammarTag::from_key(k) == wanted);
    let identifiers: Vec<&str> = entries
        .iter()
        .filter(|(key, _)| GrammarTag::from_key(key).is_identifier())
        .filter_map(|(_, value)| value.as_str())
        .collect();

    let text = if has(GrammarTag::Star) && keys.len() == 1 {
        "*".to_string()
    } else if has(GrammarTag::Star)
        && has(GrammarTag::Dot)
        && identifiers.len() == 1
        && keys.len() == 3
    {
        format!("{}.*", identifiers[0])
    } else {
        return Err(SqlError::UnhandledWildcard {
            path: context.grammar_path,
            keys: keys.iter().map(|k| k.to_string()).collect(),
        });
    };
    Ok(wildcard_prototype(&text, context))
}

/// Classify a reference by where it sits in the grammar
pub fn classify_dependency(context: &RefContext) -> DependencyType {
    if context.has_sequence(&[GrammarTag::ColumnDefinition, GrammarTag::Identifier])
        || context.has_sequence(&[GrammarTag::AliasExpression, GrammarTag::Identifier])
    {
        return DependencyType::Definition;
    }

    let segments: Vec<GrammarTag> = context
        .grammar_segments()
        .map(GrammarTag::from_key)
        .collect();
    let Some(last_element) = segments
        .iter()
        .rposition(|tag| *tag == GrammarTag::SelectClauseElement)
    else {
        return DependencyType::Query;
    };

    let tail = &segments[last_element + 1..];
    let ends_with = |pair: [GrammarTag; 2]| tail.ends_with(&pair);
    let flows = ends_with([GrammarTag::ColumnReference, GrammarTag::Identifier])
        || ends_with([GrammarTag::WildcardExpression, GrammarTag::WildcardIdentifier]);
    if flows && !tail.iter().any(GrammarTag::is_filtering_clause) {
        DependencyType::Data
    } else {
        DependencyType::Query
    }
}

/// Arguments of a table function in FROM, e.g. `LATERAL FLATTEN(input => t.col)`
fn is_compound_value(context: &RefContext) -> bool {
    let segments: Vec<&str> = context.grammar_segments().collect();
    segments
        .iter()
        .position(|s| *s == GrammarTag::FromExpressionElement.as_str())
        .is_some_and(|from| {
            segments[from..]
                .iter()
                .any(|s| *s == GrammarTag::Function.as_str())
        })
}

/// Merge a child's extraction into its parent's
fn merge_refs(acc: &mut Extraction, sub: Extraction) -> SqlResult<()> {
    let Extraction {
        alias: incoming,
        refs: mut sub_refs,
    } = sub;

    if let Some(alias) = acc.open_alias_mut() {
        claim(alias, &mut sub_refs)?;
    }
    acc.refs.merge(sub_refs);

    if let Some(incoming) = incoming.filter(|alias| !alias.consumed) {
        if let Some(existing) = acc.open_alias_mut() {
            return Err(SqlError::UnmatchedAlias {
                alias: existing.value.clone(),
                scope: existing.bounded_scope.clone(),
                reason: format!("alias '{}' arrived before it was claimed", incoming.value),
            });
        }
        acc.alias = Some(incoming);
    }
    Ok(())
}

/// Let a pending alias claim unaliased references from a child result
fn claim(alias: &mut PendingAlias, refs: &mut RefsPrototype) -> SqlResult<()> {
    let columns = refs.columns.iter().filter(|c| c.alias.is_none()).count();
    let wildcards = refs.wildcards.iter().filter(|w| w.alias.is_none()).count();
    let materializations = refs
        .materializations
        .iter()
        .filter(|m| m.alias.is_none())
        .count();

    let kinds = [columns, wildcards, materializations]
        .iter()
        .filter(|count| **count > 0)
        .count();
    if kinds == 0 {
        return Ok(());
    }
    if kinds > 1 || wildcards > 1 || materializations > 1 {
        return Err(SqlError::AmbiguousAlias {
            alias: alias.value.clone(),
            reason: format!(
                "{} columns, {} wildcards and {} materializations could take it",
                columns, wildcards, materializations
            ),
        });
    }

    let value = Some(alias.value.clone());
    refs.columns
        .iter_mut()
        .chain(refs.wildcards.iter_mut())
        .filter(|c| c.alias.is_none())
        .for_each(|c| c.alias = value.clone());
    if let Some(materialization) = refs.materializations.iter_mut().find(|m| m.alias.is_none()) {
        materialization.alias = value;
    }
    alias.consumed = true;
    Ok(())
}

/// Resolve or thread the pending alias as the node at `location` finishes
fn close_scope(mut acc: Extraction, location: &str) -> SqlResult<Extraction> {
    let Some(alias) = acc.alias.take() else {
        return Ok(acc);
    };
    if alias.consumed {
        return Ok(acc);
    }
    if alias.bounded_scope == location {
        allocate_unused_alias(&mut acc.refs, alias)?;
    } else if is_within(location, &alias.bounded_scope) {
        acc.alias = Some(alias);
    } else {
        return Err(SqlError::UnmatchedAlias {
            alias: alias.value,
            scope: alias.bounded_scope,
            reason: format!("left its scope at '{}'", location),
        });
    }
    Ok(acc)
}

/// Give a scope-ending alias to the unaliased references of one sub-scope
fn allocate_unused_alias(refs: &mut RefsPrototype, alias: PendingAlias) -> SqlResult<()> {
    let scope = alias.bounded_scope.as_str();
    let mut sub_scopes = BTreeSet::new();

    let columns: Vec<usize> = refs
        .columns
        .iter()
        .enumerate()
        .filter(|(_, c)| c.alias.is_none())
        .filter_map(|(idx, c)| {
            sub_scope(&c.context.location, scope).map(|s| {
                sub_scopes.insert(s.to_string());
                idx
            })
        })
        .collect();

    let materializations: Vec<usize> = refs
        .materializations
        .iter()
        .enumerate()
        .filter(|(_, m)| m.alias.is_none())
        .filter_map(|(idx, m)| {
            m.contexts
                .iter()
                .find(|c| is_strictly_within(&c.location, scope))
                .and_then(|c| sub_scope(&c.location, scope))
                .map(|s| {
                    sub_scopes.insert(s.to_string());
                    idx
                })
        })
        .collect();

    if columns.is_empty() && materializations.is_empty() {
        refs.columns.push(column_from_alias(&alias));
        return Ok(());
    }

    let unmatched = |reason: String| SqlError::UnmatchedAlias {
        alias: alias.value.clone(),
        scope: scope.to_string(),
        reason,
    };
    if sub_scopes.len() > 1 {
        return Err(unmatched(format!(
            "candidates span {} sub-scopes",
            sub_scopes.len()
        )));
    }
    if !columns.is_empty() && !materializations.is_empty() {
        return Err(unmatched(
            "both columns and materializations could take it".to_string(),
        ));
    }
    if materializations.len() > 1 {
        return Err(unmatched(format!(
            "{} materializations could take it",
            materializations.len()
        )));
    }

    for idx in columns {
        refs.columns[idx].alias = Some(alias.value.clone());
    }
    for idx in materializations {
        refs.materializations[idx].alias = Some(alias.value.clone());
    }
    Ok(())
}

#[cfg(test)]
#[path = "extractor_test.rs"]
mod tests;
