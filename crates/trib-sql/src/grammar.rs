//! Grammar vocabulary of the SQL parsing service
//!
//! The parser labels every tree node with a snake_case tag. Tags that the
//! lineage rules dispatch on are enumerated; every other tag is carried as
//! [`GrammarTag::Other`] so it still shows up in grammar paths and is still
//! traversed.

/// A grammar tag
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum GrammarTag {
    File,
    Statement,
    CreateTableStatement,
    InsertStatement,
    SelectStatement,
    SelectClause,
    SelectClauseElement,
    FromClause,
    FromExpression,
    FromExpressionElement,
    TableExpression,
    TableReference,
    ColumnReference,
    ColumnDefinition,
    /// `identifier`, `naked_identifier` and `quoted_identifier`
    Identifier,
    Dot,
    Star,
    Keyword,
    AliasExpression,
    WildcardExpression,
    WildcardIdentifier,
    Function,
    Bracketed,
    Expression,
    WithCompoundStatement,
    CommonTableExpression,
    CaseExpression,
    WhenClause,
    ElseClause,
    SetExpression,
    WhereClause,
    HavingClause,
    GroupbyClause,
    OrderbyClause,
    JoinOnCondition,
    QualifyClause,
    /// Literal values an alias can name (`SELECT 1 AS x`)
    Literal,
    BareFunction,
    /// Whitespace, newlines and comments
    NonCode,
    /// Marker appended after a `THEN` keyword; not produced by the parser
    Then,
    Other(String),
}

impl GrammarTag {
    /// Classify a tree key
    pub fn from_key(key: &str) -> Self {
        match key {
            "file" => GrammarTag::File,
            "statement" => GrammarTag::Statement,
            "create_table_statement" => GrammarTag::CreateTableStatement,
            "insert_statement" => GrammarTag::InsertStatement,
            "select_statement" => GrammarTag::SelectStatement,
            "select_clause" => GrammarTag::SelectClause,
            "select_clause_element" => GrammarTag::SelectClauseElement,
            "from_clause" => GrammarTag::FromClause,
            "from_expression" => GrammarTag::FromExpression,
            "from_expression_element" => GrammarTag::FromExpressionElement,
            "table_expression" => GrammarTag::TableExpression,
            "table_reference" => GrammarTag::TableReference,
            "column_reference" => GrammarTag::ColumnReference,
            "column_definition" => GrammarTag::ColumnDefinition,
            "identifier" | "naked_identifier" | "quoted_identifier" => GrammarTag::Identifier,
            "dot" => GrammarTag::Dot,
            "star" => GrammarTag::Star,
            "keyword" => GrammarTag::Keyword,
            "alias_expression" => GrammarTag::AliasExpression,
            "wildcard_expression" => GrammarTag::WildcardExpression,
            "wildcard_identifier" => GrammarTag::WildcardIdentifier,
            "function" => GrammarTag::Function,
            "bracketed" => GrammarTag::Bracketed,
            "expression" => GrammarTag::Expression,
            "with_compound_statement" => GrammarTag::WithCompoundStatement,
            "common_table_expression" => GrammarTag::CommonTableExpression,
            "case_expression" => GrammarTag::CaseExpression,
            "when_clause" => GrammarTag::WhenClause,
            "else_clause" => GrammarTag::ElseClause,
            "set_expression" => GrammarTag::SetExpression,
            "where_clause" => GrammarTag::WhereClause,
            "having_clause" => GrammarTag::HavingClause,
            "groupby_clause" => GrammarTag::GroupbyClause,
            "orderby_clause" => GrammarTag::OrderbyClause,
            "join_on_condition" => GrammarTag::JoinOnCondition,
            "qualify_clause" => GrammarTag::QualifyClause,
            "literal" | "numeric_literal" | "quoted_literal" | "boolean_literal"
            | "null_literal" => GrammarTag::Literal,
            "bare_function" => GrammarTag::BareFunction,
            "whitespace" | "newline" | "comment" | "inline_comment" | "block_comment"
            | "indent" | "dedent" => GrammarTag::NonCode,
            "then" => GrammarTag::Then,
            other => GrammarTag::Other(other.to_string()),
        }
    }

    /// Segment written into grammar paths
    pub fn as_str(&self) -> &str {
        match self {
            GrammarTag::File => "file",
            GrammarTag::Statement => "statement",
            GrammarTag::CreateTableStatement => "create_table_statement",
            GrammarTag::InsertStatement => "insert_statement",
            GrammarTag::SelectStatement => "select_statement",
            GrammarTag::SelectClause => "select_clause",
            GrammarTag::SelectClauseElement => "select_clause_element",
            GrammarTag::FromClause => "from_clause",
            GrammarTag::FromExpression => "from_expression",
            GrammarTag::FromExpressionElement => "from_expression_element",
            GrammarTag::TableExpression => "table_expression",
            GrammarTag::TableReference => "table_reference",
            GrammarTag::ColumnReference => "column_reference",
            GrammarTag::ColumnDefinition => "column_definition",
            GrammarTag::Identifier => "identifier",
            GrammarTag::Dot => "dot",
            GrammarTag::Star => "star",
            GrammarTag::Keyword => "keyword",
            GrammarTag::AliasExpression => "alias_expression",
            GrammarTag::WildcardExpression => "wildcard_expression",
            GrammarTag::WildcardIdentifier => "wildcard_identifier",
            GrammarTag::Function => "function",
            GrammarTag::Bracketed => "bracketed",
            GrammarTag::Expression => "expression",
            GrammarTag::WithCompoundStatement => "with_compound_statement",
            GrammarTag::CommonTableExpression => "common_table_expression",
            GrammarTag::CaseExpression => "case_expression",
            GrammarTag::WhenClause => "when_clause",
            GrammarTag::ElseClause => "else_clause",
            GrammarTag::SetExpression => "set_expression",
            GrammarTag::WhereClause => "where_clause",
            GrammarTag::HavingClause => "having_clause",
            GrammarTag::GroupbyClause => "groupby_clause",
            GrammarTag::OrderbyClause => "orderby_clause",
            GrammarTag::JoinOnCondition => "join_on_condition",
            GrammarTag::QualifyClause => "qualify_clause",
            GrammarTag::Literal => "literal",
            GrammarTag::BareFunction => "bare_function",
            GrammarTag::NonCode => "non_code",
            GrammarTag::Then => "then",
            GrammarTag::Other(tag) => tag,
        }
    }

    /// Whether the tag names an identifier leaf
    pub fn is_identifier(&self) -> bool {
        matches!(self, GrammarTag::Identifier)
    }

    /// Shapes a pending alias may name directly
    pub fn is_alias_target(&self) -> bool {
        matches!(self, GrammarTag::Literal | GrammarTag::BareFunction)
    }

    /// Clauses whose column references only filter, join or order rows
    pub fn is_filtering_clause(&self) -> bool {
        matches!(
            self,
            GrammarTag::WhereClause
                | GrammarTag::HavingClause
                | GrammarTag::GroupbyClause
                | GrammarTag::OrderbyClause
                | GrammarTag::JoinOnCondition
                | GrammarTag::QualifyClause
        )
    }
}

impl std::fmt::Display for GrammarTag {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_identifier_shapes_share_a_tag() {
        for key in ["identifier", "naked_identifier", "quoted_identifier"] {
            assert_eq!(GrammarTag::from_key(key), GrammarTag::Identifier);
        }
        assert_eq!(GrammarTag::Identifier.as_str(), "identifier");
    }

    #[test]
    fn test_unknown_tag_passes_through() {
        let tag = GrammarTag::from_key("comparison_operator");
        assert_eq!(tag, GrammarTag::Other("comparison_operator".to_string()));
        assert_eq!(tag.as_str(), "comparison_operator");
    }

    #[test]
    fn test_known_tags_round_trip() {
        for key in [
            "select_clause_element",
            "column_reference",
            "table_reference",
            "with_compound_statement",
            "common_table_expression",
            "when_clause",
            "set_expression",
        ] {
            assert_eq!(GrammarTag::from_key(key).as_str(), key);
        }
    }
}
