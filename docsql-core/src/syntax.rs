//! Closed vocabulary of the query DSL.

use serde::{Deserialize, Serialize};

/// Every operation type a scheme can contain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum QuerySyntax {
    // Primary commands
    Select,
    Insert,
    Update,
    Delete,

    // Targets and payloads
    From,
    To,
    Set,
    Distinct,

    // Condition keys
    Where,
    Having,

    // Connectives
    And,
    Or,
    Not,
    OpenParentheses,
    CloseParentheses,

    // Comparisons
    Eq,
    Gt,
    Lt,
    Between,
    Like,
    In,
    Null,
    Exists,

    // Joins
    Join,
    LeftJoin,
    RightJoin,
    FullJoin,
    On,
    Using,

    // Shaping
    Limit,
    OrderBy,
    GroupBy,
    Union,
    UnionAll,
}

impl QuerySyntax {
    /// SELECT / INSERT / UPDATE / DELETE
    pub fn is_primary_command(&self) -> bool {
        matches!(
            self,
            QuerySyntax::Select | QuerySyntax::Insert | QuerySyntax::Update | QuerySyntax::Delete
        )
    }

    /// Operations that open a keychain.
    pub fn is_key_clause(&self) -> bool {
        matches!(self, QuerySyntax::Where | QuerySyntax::Having)
    }

    pub fn is_logical_operator(&self) -> bool {
        matches!(self, QuerySyntax::And | QuerySyntax::Or)
    }

    pub fn join_type(&self) -> Option<JoinType> {
        match self {
            QuerySyntax::Join => Some(JoinType::Inner),
            QuerySyntax::LeftJoin => Some(JoinType::Left),
            QuerySyntax::RightJoin => Some(JoinType::Right),
            QuerySyntax::FullJoin => Some(JoinType::Full),
            _ => None,
        }
    }
}

/// Connective of a logical scope.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum LogicalOperator {
    And,
    Or,
}

impl LogicalOperator {
    pub fn symbol(&self) -> &'static str {
        match self {
            LogicalOperator::And => "&&",
            LogicalOperator::Or => "||",
        }
    }
}

/// Join flavours supported by the join engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum JoinType {
    Inner,
    Left,
    Right,
    Full,
}

/// Sort direction for ORDER BY / GROUP BY entries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SortingOrder {
    #[default]
    Asc,
    Desc,
}

impl SortingOrder {
    /// Parse `ASC` / `DESC` (any case). Anything else falls back to ascending.
    pub fn parse(value: Option<&str>) -> Self {
        match value.map(|v| v.to_uppercase()) {
            Some(v) if v == "DESC" => SortingOrder::Desc,
            _ => SortingOrder::Asc,
        }
    }

    pub fn apply(&self, ordering: std::cmp::Ordering) -> std::cmp::Ordering {
        match self {
            SortingOrder::Asc => ordering,
            SortingOrder::Desc => ordering.reverse(),
        }
    }
}
