//! Condition compiler.
//!
//! Comparison trees are flattened into a token stream (`(`, leaf, `&&`, ...).
//! The stream is parsed once into a boolean tree whose leaves may report
//! `Skipped`; skipped leaves drop out of their group instead of voting, and a
//! row no leaf applies to passes.

mod formula;
mod tree;

pub use formula::{cleanup, render};

use std::fmt;

use once_cell::sync::OnceCell;

use crate::error::{DocsqlError, DocsqlResult};
use crate::syntax::{LogicalOperator, QuerySyntax};
use crate::templates::{self, Evaluator};
use crate::types::{LogicalOperatorScope, Operand, Property, Row};

use tree::Node;

/// Deepest scope nesting accepted in a condition tree.
pub const MAX_NESTING: usize = 64;

/// Recursive condition description.
#[derive(Debug, Clone)]
pub enum Expression {
    Comparison {
        syntax: QuerySyntax,
        property: Property,
        operands: Vec<Operand>,
    },
    Scope(LogicalOperatorScope<Expression>),
    Not(Box<Expression>),
}

impl Expression {
    pub fn comparison(syntax: QuerySyntax, property: Property, operands: Vec<Operand>) -> Self {
        Expression::Comparison {
            syntax,
            property,
            operands,
        }
    }

    pub fn scope(operator: LogicalOperator, expressions: Vec<Expression>) -> Self {
        Expression::Scope(LogicalOperatorScope::with(operator, expressions))
    }

    pub fn negate(self) -> Self {
        Expression::Not(Box::new(self))
    }
}

/// A compiled leaf with a printable label.
#[derive(Clone)]
pub struct Leaf {
    pub label: String,
    pub evaluator: Evaluator,
}

impl fmt::Debug for Leaf {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Leaf({})", self.label)
    }
}

#[derive(Debug, Clone)]
pub enum ConditionToken {
    Leaf(Leaf),
    And,
    Or,
    Not,
    Open,
    Close,
}

impl ConditionToken {
    pub fn connective(operator: LogicalOperator) -> Self {
        match operator {
            LogicalOperator::And => ConditionToken::And,
            LogicalOperator::Or => ConditionToken::Or,
        }
    }

    fn ends_operand(&self) -> bool {
        matches!(self, ConditionToken::Leaf(_) | ConditionToken::Close)
    }

    fn starts_operand(&self) -> bool {
        matches!(
            self,
            ConditionToken::Leaf(_) | ConditionToken::Open | ConditionToken::Not
        )
    }
}

/// Flatten an expression into tokens, compiling every leaf through the
/// template registry.
pub fn flatten(expression: &Expression) -> DocsqlResult<Vec<ConditionToken>> {
    let mut tokens = Vec::new();
    flatten_into(expression, 0, &mut tokens)?;
    Ok(tokens)
}

fn flatten_into(
    expression: &Expression,
    depth: usize,
    tokens: &mut Vec<ConditionToken>,
) -> DocsqlResult<()> {
    if depth > MAX_NESTING {
        return Err(DocsqlError::NestingTooDeep(MAX_NESTING));
    }
    match expression {
        Expression::Comparison {
            syntax,
            property,
            operands,
        } => {
            let evaluator = templates::compile(*syntax, property, operands)?;
            let label = match property.table_name() {
                Some(table) => format!("{:?}({}.{})", syntax, table, property.name),
                None => format!("{:?}({})", syntax, property.name),
            };
            tokens.push(ConditionToken::Leaf(Leaf { label, evaluator }));
        }
        Expression::Scope(scope) => {
            let mut children = Vec::with_capacity(scope.properties.len());
            for child in &scope.properties {
                let mut child_tokens = Vec::new();
                flatten_into(child, depth + 1, &mut child_tokens)?;
                if !child_tokens.is_empty() {
                    children.push(child_tokens);
                }
            }
            if children.is_empty() {
                return Ok(());
            }
            tokens.push(ConditionToken::Open);
            for (i, child) in children.into_iter().enumerate() {
                if i > 0 {
                    tokens.push(ConditionToken::connective(scope.operator));
                }
                tokens.extend(child);
            }
            tokens.push(ConditionToken::Close);
        }
        Expression::Not(inner) => {
            let mut inner_tokens = Vec::new();
            flatten_into(inner, depth + 1, &mut inner_tokens)?;
            if !inner_tokens.is_empty() {
                tokens.push(ConditionToken::Not);
                tokens.extend(inner_tokens);
            }
        }
    }
    Ok(())
}

/// Compiled WHERE / HAVING conditions of one query.
#[derive(Debug, Clone, Default)]
pub struct Conditions {
    tokens: Vec<ConditionToken>,
    tree: OnceCell<Option<Node>>,
}

impl Conditions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }

    pub fn tokens(&self) -> &[ConditionToken] {
        &self.tokens
    }

    /// Append raw tokens. Two operands that would touch are joined with AND.
    pub fn append(&mut self, tokens: Vec<ConditionToken>) {
        let Some(first) = tokens.first() else {
            return;
        };
        if first.starts_operand() && self.tokens.last().is_some_and(ConditionToken::ends_operand) {
            self.tokens.push(ConditionToken::And);
        }
        self.tokens.extend(tokens);
        self.tree = OnceCell::new();
    }

    pub fn push_token(&mut self, token: ConditionToken) {
        self.append(vec![token]);
    }

    pub fn push_expression(&mut self, expression: &Expression) -> DocsqlResult<()> {
        let tokens = flatten(expression)?;
        self.append(tokens);
        Ok(())
    }

    /// Whether the row satisfies the conditions. Rows no condition applies to
    /// pass.
    pub fn test(&self, row: &Row) -> bool {
        let tree = self.tree.get_or_init(|| tree::parse(&self.tokens));
        if tracing::enabled!(tracing::Level::TRACE) {
            tracing::trace!(key = %row.key, formula = %cleanup(&render(&self.tokens, row)), "condition formula");
        }
        match tree {
            Some(node) => node.evaluate(row).unwrap_or(true),
            None => true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::QueryResult;
    use crate::types::Table;
    use serde_json::{json, Value};

    fn col(table: &str, name: &str) -> Property {
        Property::in_table(Table::new(table), name)
    }

    fn cmp(syntax: QuerySyntax, property: Property, value: Value) -> Expression {
        Expression::comparison(syntax, property, vec![Operand::Value(value)])
    }

    fn user(content: Value) -> Row {
        Row::new(Table::new("users"), "u1", content)
    }

    #[test]
    fn test_and_condition() {
        let expr = Expression::scope(
            LogicalOperator::And,
            vec![
                cmp(QuerySyntax::Gt, col("users", "age"), json!(18)),
                cmp(QuerySyntax::Eq, col("users", "name"), json!("Bob")),
            ],
        );
        let mut conditions = Conditions::new();
        conditions.push_expression(&expr).unwrap();

        assert!(conditions.test(&user(json!({"age": 20, "name": "Bob"}))));
        assert!(!conditions.test(&user(json!({"age": 15, "name": "Bob"}))));
    }

    #[test]
    fn test_or_and_precedence() {
        // a || b && c
        let mut conditions = Conditions::new();
        conditions
            .push_expression(&cmp(QuerySyntax::Eq, col("users", "a"), json!(1)))
            .unwrap();
        conditions.push_token(ConditionToken::Or);
        conditions
            .push_expression(&cmp(QuerySyntax::Eq, col("users", "b"), json!(1)))
            .unwrap();
        conditions.push_token(ConditionToken::And);
        conditions
            .push_expression(&cmp(QuerySyntax::Eq, col("users", "c"), json!(1)))
            .unwrap();

        assert!(conditions.test(&user(json!({"a": 1, "b": 0, "c": 0}))));
        assert!(!conditions.test(&user(json!({"a": 0, "b": 1, "c": 0}))));
        assert!(conditions.test(&user(json!({"a": 0, "b": 1, "c": 1}))));
    }

    #[test]
    fn test_unrelated_table_passes_vacuously() {
        let expr = Expression::scope(
            LogicalOperator::Or,
            vec![
                cmp(QuerySyntax::Eq, col("orders", "total"), json!(5)),
                cmp(QuerySyntax::Gt, col("orders", "qty"), json!(1)),
            ],
        );
        let mut conditions = Conditions::new();
        conditions.push_expression(&expr).unwrap();
        assert!(conditions.test(&user(json!({"total": 0}))));
    }

    #[test]
    fn test_skipped_leaf_does_not_poison_and() {
        let expr = Expression::scope(
            LogicalOperator::And,
            vec![
                cmp(QuerySyntax::Eq, col("orders", "total"), json!(5)),
                cmp(QuerySyntax::Eq, col("users", "name"), json!("Bob")),
            ],
        );
        let mut conditions = Conditions::new();
        conditions.push_expression(&expr).unwrap();
        assert!(conditions.test(&user(json!({"name": "Bob"}))));
        assert!(!conditions.test(&user(json!({"name": "Ann"}))));
    }

    #[test]
    fn test_not() {
        let expr = cmp(QuerySyntax::Eq, col("users", "name"), json!("Bob")).negate();
        let mut conditions = Conditions::new();
        conditions.push_expression(&expr).unwrap();
        assert!(!conditions.test(&user(json!({"name": "Bob"}))));
        assert!(conditions.test(&user(json!({"name": "Ann"}))));
    }

    #[test]
    fn test_implicit_and_between_appended_conditions() {
        let mut conditions = Conditions::new();
        conditions
            .push_expression(&cmp(QuerySyntax::Eq, col("users", "a"), json!(1)))
            .unwrap();
        conditions
            .push_expression(&cmp(QuerySyntax::Eq, col("users", "b"), json!(1)))
            .unwrap();
        assert!(matches!(conditions.tokens()[1], ConditionToken::And));
        assert!(!conditions.test(&user(json!({"a": 1, "b": 2}))));
    }

    #[test]
    fn test_exists_pending_is_skipped() {
        let pending = QueryResult::new();
        let expr = Expression::comparison(
            QuerySyntax::Exists,
            Property::row_id(),
            vec![Operand::Query(pending.clone())],
        );
        let mut conditions = Conditions::new();
        conditions.push_expression(&expr).unwrap();
        assert!(conditions.test(&user(json!({}))));

        pending.set(json!({"orders": []}));
        assert!(!conditions.test(&user(json!({}))));
    }

    #[test]
    fn test_nesting_limit() {
        let mut expr = cmp(QuerySyntax::Eq, col("users", "a"), json!(1));
        for _ in 0..=MAX_NESTING {
            expr = Expression::scope(LogicalOperator::And, vec![expr]);
        }
        let mut conditions = Conditions::new();
        assert!(matches!(
            conditions.push_expression(&expr),
            Err(DocsqlError::NestingTooDeep(MAX_NESTING))
        ));
    }

    #[test]
    fn test_missing_template_is_fatal() {
        let expr = cmp(QuerySyntax::Select, col("users", "a"), json!(1));
        assert!(matches!(
            flatten(&expr),
            Err(DocsqlError::MissingTemplate(QuerySyntax::Select))
        ));
    }
}
