//! Statement refs builder
//!
//! Turns the prototypes of one statement into classified refs. Steps run in
//! a fixed order:
//!
//! 1. `value` columns of table functions inherit the function argument
//! 2. positional `$n` columns and adjacent definitions supply aliases
//! 3. the statement's own materialization is identified (or synthesised)
//! 4. remaining materializations are split into CTEs and dependencies
//! 5. every CTE is mapped to the single object it stands in for
//! 6. CASE selectors become query refs and repeated branch refs collapse
//! 7. columns and wildcards are bound to materializations

use crate::error::{SqlError, SqlResult};
use crate::grammar::GrammarTag;
use crate::path::{common_prefix_len, compare_locations, is_strictly_within, RefContext};
use crate::refs::{
    ColumnPrototype, ColumnRef, DependencyType, MaterializationKind, MaterializationPrototype,
    MaterializationRef, Refs, RefsPrototype,
};
use std::collections::{HashMap, HashSet};
use trib_core::{insensitive_eq, Catalog, QualifiedName};

/// Builds [`Refs`] for statements of one model
pub struct StatementRefsBuilder<'a> {
    catalog: &'a Catalog,
    relation: QualifiedName,
}

impl<'a> StatementRefsBuilder<'a> {
    /// `relation_name` is the object the model materializes into; it names
    /// the statement's own materialization when the SQL does not
    pub fn new(catalog: &'a Catalog, relation_name: &str) -> Self {
        Self {
            catalog,
            relation: QualifiedName::parse(relation_name),
        }
    }

    pub fn build(&self, prototype: RefsPrototype) -> SqlResult<Refs> {
        let RefsPrototype {
            materializations,
            mut columns,
            wildcards,
        } = prototype;

        resolve_compound_values(&mut columns);
        self.assign_positional_aliases(&mut columns, &materializations);

        let materializations = self.classify_materializations(materializations)?;
        let representations = transient_representations(&materializations)?;

        classify_case_selectors(&mut columns);
        dedup_case_branches(&mut columns);

        let binder = Binder::new(self.catalog, &materializations, &representations, &columns);
        let columns = columns
            .into_iter()
            .map(|column| binder.bind(column))
            .collect::<SqlResult<Vec<_>>>()?;
        let wildcards = wildcards
            .into_iter()
            .map(|wildcard| binder.bind(wildcard))
            .collect::<SqlResult<Vec<_>>>()?;

        Ok(Refs {
            materializations,
            columns,
            wildcards,
        })
    }

    fn assign_positional_aliases(
        &self,
        columns: &mut [ColumnPrototype],
        materializations: &[MaterializationPrototype],
    ) {
        for idx in 0..columns.len() {
            if let Some(position) = positional_index(&columns[idx].name) {
                let owner = match materializations {
                    [only] => Some(only.name.clone()),
                    _ => columns[idx].materialization_name.clone(),
                };
                columns[idx].dependency_type = DependencyType::Data;
                if let Some(name) = owner.and_then(|m| self.catalog.column_at(&m, position)) {
                    columns[idx].alias = Some(name.to_string());
                }
            }

            if idx + 1 < columns.len() {
                let defines = columns[idx].dependency_type == DependencyType::Definition;
                let next = &columns[idx + 1];
                if defines && next.dependency_type == DependencyType::Data && next.alias.is_none() {
                    columns[idx + 1].alias = Some(columns[idx].name.clone());
                }
            }
        }
    }

    /// Self first, then the other materializations in sighting order
    fn classify_materializations(
        &self,
        prototypes: Vec<MaterializationPrototype>,
    ) -> SqlResult<Vec<MaterializationRef>> {
        let candidates: Vec<(usize, &RefContext)> = prototypes
            .iter()
            .enumerate()
            .filter_map(|(idx, m)| m.latest_context().map(|c| (idx, c)))
            .filter(|(_, c)| defines_self(c))
            .collect();

        let chosen = candidates
            .iter()
            .max_by(|a, b| compare_locations(&a.1.location, &b.1.location))
            .copied();
        if let Some((chosen_idx, chosen_ctx)) = chosen {
            let tied: Vec<String> = candidates
                .iter()
                .filter(|(idx, c)| *idx != chosen_idx && c.location == chosen_ctx.location)
                .map(|(idx, _)| prototypes[*idx].name.clone())
                .collect();
            if !tied.is_empty() {
                let mut names = tied;
                names.push(prototypes[chosen_idx].name.clone());
                return Err(SqlError::MultipleSelfMaterializations { names });
            }
        }
        let self_idx = chosen.map(|(idx, _)| idx);

        let mut classified = Vec::with_capacity(prototypes.len() + 1);
        let mut others = Vec::new();
        if self_idx.is_none() {
            classified.push(MaterializationRef {
                name: self.relation.name.clone(),
                alias: None,
                schema_name: self.relation.schema.clone(),
                database_name: self.relation.database.clone(),
                warehouse_name: self.relation.warehouse.clone(),
                kind: MaterializationKind::SelfRef,
                contexts: Vec::new(),
            });
        }

        for (idx, prototype) in prototypes.into_iter().enumerate() {
            if Some(idx) == self_idx {
                classified.push(MaterializationRef::from_prototype(
                    prototype,
                    MaterializationKind::SelfRef,
                ));
                continue;
            }
            let kind = if prototype.contexts.iter().any(defines_cte) {
                MaterializationKind::Transient
            } else {
                MaterializationKind::Dependency
            };
            others.push(MaterializationRef::from_prototype(prototype, kind));
        }
        classified.extend(others);
        Ok(classified)
    }
}

fn defines_self(context: &RefContext) -> bool {
    context.has_sequence(&[
        GrammarTag::CreateTableStatement,
        GrammarTag::TableReference,
        GrammarTag::Identifier,
    ]) || context.has_sequence(&[
        GrammarTag::WithCompoundStatement,
        GrammarTag::CommonTableExpression,
        GrammarTag::Identifier,
    ])
}

fn defines_cte(context: &RefContext) -> bool {
    context.has_sequence(&[GrammarTag::CommonTableExpression, GrammarTag::Identifier])
}

fn positional_index(name: &str) -> Option<usize> {
    name.strip_prefix('$')?.parse().ok()
}

/// `f.value` where `f` aliases a table function over `t.col` refers to `t.col`
fn resolve_compound_values(columns: &mut [ColumnPrototype]) {
    let compound: Vec<ColumnPrototype> = columns
        .iter()
        .filter(|c| c.is_compound_value_ref)
        .cloned()
        .collect();
    if compound.is_empty() {
        return;
    }

    for column in columns
        .iter_mut()
        .filter(|c| !c.is_compound_value_ref && insensitive_eq(&c.name, "value"))
    {
        let Some(qualifier) = column.materialization_name.clone() else {
            continue;
        };
        if let Some(source) = compound
            .iter()
            .find(|c| insensitive_eq(c.alias_or_name(), &qualifier))
        {
            column.name = source.name.clone();
            column.materialization_name = source.materialization_name.clone();
            column.schema_name = source.schema_name.clone();
            column.database_name = source.database_name.clone();
            column.warehouse_name = source.warehouse_name.clone();
        }
    }
}

/// Map each CTE to the single object it stands in for, following chains
/// through earlier CTEs
fn transient_representations(
    materializations: &[MaterializationRef],
) -> SqlResult<HashMap<usize, usize>> {
    let mut resolved: HashMap<usize, Option<usize>> = HashMap::new();
    for (idx, m) in materializations.iter().enumerate() {
        if m.kind == MaterializationKind::Transient {
            let mut visiting = HashSet::new();
            resolve_transient(idx, materializations, &mut resolved, &mut visiting)?;
        }
    }
    Ok(resolved
        .into_iter()
        .filter_map(|(idx, target)| target.map(|t| (idx, t)))
        .collect())
}

fn resolve_transient(
    idx: usize,
    materializations: &[MaterializationRef],
    resolved: &mut HashMap<usize, Option<usize>>,
    visiting: &mut HashSet<usize>,
) -> SqlResult<Option<usize>> {
    if let Some(target) = resolved.get(&idx) {
        return Ok(*target);
    }
    let transient = &materializations[idx];
    let Some(definition) = transient.contexts.iter().find(|c| defines_cte(c)) else {
        resolved.insert(idx, None);
        return Ok(None);
    };
    let scope = definition.parent_location().to_string();
    visiting.insert(idx);

    let mut targets = Vec::new();
    for (candidate_idx, candidate) in materializations.iter().enumerate() {
        if candidate_idx == idx || candidate.kind == MaterializationKind::SelfRef {
            continue;
        }
        let inside = candidate
            .contexts
            .iter()
            .any(|c| is_strictly_within(&c.location, &scope));
        if !inside {
            continue;
        }
        let target = if candidate.kind == MaterializationKind::Transient
            && !visiting.contains(&candidate_idx)
        {
            resolve_transient(candidate_idx, materializations, resolved, visiting)?
                .unwrap_or(candidate_idx)
        } else {
            candidate_idx
        };
        if !targets.contains(&target) {
            targets.push(target);
        }
    }
    visiting.remove(&idx);

    let target = match targets.as_slice() {
        [] => None,
        [only] => Some(*only),
        _ => {
            return Err(SqlError::MultipleTransientRepresentations {
                transient: transient.name.clone(),
                candidates: targets
                    .iter()
                    .map(|t| materializations[*t].qualified_name().to_string())
                    .collect(),
            })
        }
    };
    resolved.insert(idx, target);
    Ok(target)
}

/// Refs that decide which CASE branch is taken only query their source
fn classify_case_selectors(columns: &mut [ColumnPrototype]) {
    for column in columns.iter_mut() {
        let segments: Vec<GrammarTag> = column
            .context
            .grammar_segments()
            .map(GrammarTag::from_key)
            .collect();
        let Some(case_idx) = segments
            .iter()
            .rposition(|tag| *tag == GrammarTag::CaseExpression)
        else {
            continue;
        };

        let after_case = &segments[case_idx + 1..];
        let selector = match after_case
            .iter()
            .rposition(|tag| *tag == GrammarTag::WhenClause)
        {
            Some(when_idx) => !after_case[when_idx + 1..].contains(&GrammarTag::Then),
            None => !matches!(after_case.first(), Some(GrammarTag::ElseClause)),
        };
        if selector {
            column.dependency_type = DependencyType::Query;
        }
    }
}

fn dedup_case_branches(columns: &mut Vec<ColumnPrototype>) {
    let mut seen = HashSet::new();
    columns.retain(|column| {
        let Some(case_scope) = column.context.location_of(&GrammarTag::CaseExpression) else {
            return true;
        };
        let key = (
            case_scope,
            column.dependency_type,
            column.alias.as_ref().map(|a| a.to_uppercase()),
            column.name.to_uppercase(),
            column.materialization_name.as_ref().map(|m| m.to_uppercase()),
            column.schema_name.as_ref().map(|s| s.to_uppercase()),
            column.database_name.as_ref().map(|d| d.to_uppercase()),
        );
        seen.insert(key)
    });
}

/// Binds column prototypes to classified materializations
struct Binder<'b> {
    catalog: &'b Catalog,
    materializations: &'b [MaterializationRef],
    representations: &'b HashMap<usize, usize>,
    /// Aliases that rename a column, with the SELECT they are usable in
    renames: Vec<(String, Option<String>)>,
}

impl<'b> Binder<'b> {
    fn new(
        catalog: &'b Catalog,
        materializations: &'b [MaterializationRef],
        representations: &'b HashMap<usize, usize>,
        columns: &[ColumnPrototype],
    ) -> Self {
        let renames = columns
            .iter()
            .filter_map(|c| {
                let alias = c.alias.clone().filter(|a| !insensitive_eq(a, &c.name))?;
                Some((alias, select_scope(&c.context)))
            })
            .collect();
        Self {
            catalog,
            materializations,
            representations,
            renames,
        }
    }

    fn self_idx(&self) -> Option<usize> {
        self.materializations
            .iter()
            .position(|m| m.kind == MaterializationKind::SelfRef)
    }

    fn forward(&self, idx: usize) -> usize {
        match self.materializations[idx].kind {
            MaterializationKind::Transient => {
                self.representations.get(&idx).copied().unwrap_or(idx)
            }
            _ => idx,
        }
    }

    fn bind(&self, column: ColumnPrototype) -> SqlResult<ColumnRef> {
        if let Some(qualifier) = column.qualifier() {
            return Ok(match self.find_qualified(&qualifier) {
                Some(idx) if Some(idx) == self.self_idx() => {
                    self.bound(column, idx, Some(DependencyType::Definition))
                }
                Some(idx) => self.bound(column, self.forward(idx), None),
                None => unresolved(column, qualifier),
            });
        }

        let names_output =
            column.dependency_type == DependencyType::Definition || self.is_lateral(&column);
        if let Some(self_idx) = self.self_idx().filter(|_| names_output && !column.is_wildcard_ref) {
            return Ok(self.bound(column, self_idx, None));
        }

        let idx = self.best_match(&column)?;
        Ok(self.bound(column, self.forward(idx), None))
    }

    /// Whether an unqualified column reads an alias defined in its own SELECT
    fn is_lateral(&self, column: &ColumnPrototype) -> bool {
        let scope = select_scope(&column.context);
        self.renames
            .iter()
            .any(|(alias, alias_scope)| insensitive_eq(alias, &column.name) && *alias_scope == scope)
    }

    fn find_qualified(&self, qualifier: &QualifiedName) -> Option<usize> {
        let by_alias = qualifier.schema.is_none().then(|| {
            self.materializations
                .iter()
                .position(|m| m.answers_to_alias(&qualifier.name))
        });
        by_alias.flatten().or_else(|| {
            self.materializations
                .iter()
                .position(|m| m.qualified_name().is_compatible(qualifier))
        })
    }

    /// Materialization sighted closest to the column
    fn best_match(&self, column: &ColumnPrototype) -> SqlResult<usize> {
        let location = column.context.location.as_str();
        let mut best: Option<(usize, usize)> = None;

        for (idx, materialization) in self.materializations.iter().enumerate() {
            let scores: Vec<usize> = if materialization.contexts.is_empty() {
                match materialization.kind {
                    MaterializationKind::SelfRef => vec![0],
                    _ => Vec::new(),
                }
            } else {
                materialization
                    .contexts
                    .iter()
                    .map(|c| common_prefix_len(location, &c.location))
                    .collect()
            };

            for points in scores {
                best = match best {
                    None => Some((idx, points)),
                    Some((_, top)) if points > top => Some((idx, points)),
                    Some((current, top))
                        if points == top
                            && current != idx
                            && self.catalog.lists_column(&materialization.name, &column.name) =>
                    {
                        Some((idx, points))
                    }
                    unchanged => unchanged,
                };
            }
        }

        best.map(|(idx, _)| idx)
            .ok_or_else(|| SqlError::NoMaterializationMatch {
                column: column.name.clone(),
                location: location.to_string(),
            })
    }

    fn bound(
        &self,
        column: ColumnPrototype,
        idx: usize,
        dependency_type: Option<DependencyType>,
    ) -> ColumnRef {
        let target = &self.materializations[idx];
        ColumnRef {
            name: column.name,
            alias: column.alias,
            materialization_name: target.name.clone(),
            schema_name: target.schema_name.clone().or(column.schema_name),
            database_name: target.database_name.clone().or(column.database_name),
            warehouse_name: target.warehouse_name.clone().or(column.warehouse_name),
            dependency_type: dependency_type.unwrap_or(column.dependency_type),
            is_wildcard_ref: column.is_wildcard_ref,
            is_compound_value_ref: column.is_compound_value_ref,
            context: column.context,
        }
    }
}

fn select_scope(context: &RefContext) -> Option<String> {
    context.location_of(&GrammarTag::SelectStatement)
}

/// A qualifier that names nothing in the statement is kept as written
fn unresolved(column: ColumnPrototype, qualifier: QualifiedName) -> ColumnRef {
    log::debug!(
        "Qualifier '{}' of column '{}' matches no materialization",
        qualifier,
        column.name
    );
    ColumnRef {
        name: column.name,
        alias: column.alias,
        materialization_name: qualifier.name,
        schema_name: qualifier.schema,
        database_name: qualifier.database,
        warehouse_name: qualifier.warehouse,
        dependency_type: column.dependency_type,
        is_wildcard_ref: column.is_wildcard_ref,
        is_compound_value_ref: column.is_compound_value_ref,
        context: column.context,
    }
}

#[cfg(test)]
#[path = "builder_test.rs"]
mod tests;
