//! Scheme reducer producing a [`QueryContext`].
//!
//! Operations are consumed in order. Several handlers look at the one or two
//! operations seen before them, so the builder keeps a history next to the
//! open keychain and the pending join.

use serde_json::Value;

use crate::conditions::{ConditionToken, Conditions, Expression, MAX_NESTING};
use crate::error::{DocsqlError, DocsqlResult};
use crate::syntax::{JoinType, LogicalOperator, QuerySyntax, SortingOrder};
use crate::types::{
    Arg, Join, Key, Limit, LogicalOperatorScope, Operand, Operation, Param, Property, SortingData,
    Table, Union,
};

use super::{validators, QueryContext};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
enum Clause {
    #[default]
    Where,
    Having,
}

impl Clause {
    fn syntax(&self) -> QuerySyntax {
        match self {
            Clause::Where => QuerySyntax::Where,
            Clause::Having => QuerySyntax::Having,
        }
    }
}

#[derive(Debug)]
struct PendingJoin {
    join_type: JoinType,
    target: Table,
    property_b: Option<Property>,
}

/// Build a context from a whole scheme.
pub fn build_context(scheme: &[Operation]) -> DocsqlResult<QueryContext> {
    let mut builder = QueryContextBuilder::new();
    for operation in scheme {
        builder.apply(operation.clone())?;
    }
    builder.build()
}

#[derive(Debug, Default)]
pub struct QueryContextBuilder {
    context: QueryContext,
    history: Vec<QuerySyntax>,
    keychain: Vec<Key>,
    clause: Clause,
    join: Option<PendingJoin>,
}

impl QueryContextBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn apply(&mut self, operation: Operation) -> DocsqlResult<()> {
        self.with(operation.syntax, operation.args)
    }

    /// Feed one operation.
    pub fn with(&mut self, syntax: QuerySyntax, args: Vec<Arg>) -> DocsqlResult<()> {
        validators::validate(syntax, &args)?;

        match syntax {
            QuerySyntax::Select => self.handle_select(args)?,
            QuerySyntax::Insert => self.handle_insert(args)?,
            QuerySyntax::Delete => {
                self.context.properties = args
                    .into_iter()
                    .map(|arg| column_arg(arg, syntax))
                    .collect::<DocsqlResult<_>>()?;
            }
            QuerySyntax::Update | QuerySyntax::From | QuerySyntax::To => {
                self.context.tables = args
                    .into_iter()
                    .map(|arg| table_arg(arg, syntax))
                    .collect::<DocsqlResult<_>>()?;
            }
            QuerySyntax::Set => self.handle_set(args)?,
            QuerySyntax::Distinct => self.context.distinct = true,
            QuerySyntax::Where => self.handle_keys(Clause::Where, args)?,
            QuerySyntax::Having => self.handle_keys(Clause::Having, args)?,
            QuerySyntax::And => self.handle_connective(LogicalOperator::And),
            QuerySyntax::Or => self.handle_connective(LogicalOperator::Or),
            QuerySyntax::Not => self.target().push_token(ConditionToken::Not),
            QuerySyntax::OpenParentheses => self.target().push_token(ConditionToken::Open),
            QuerySyntax::CloseParentheses => self.target().push_token(ConditionToken::Close),
            QuerySyntax::Eq
            | QuerySyntax::Gt
            | QuerySyntax::Lt
            | QuerySyntax::Like
            | QuerySyntax::Null => self.handle_comparison(syntax, args)?,
            QuerySyntax::In => self.handle_in(args)?,
            QuerySyntax::Between => self.handle_between(args)?,
            QuerySyntax::Exists => self.handle_exists(args)?,
            QuerySyntax::Join
            | QuerySyntax::LeftJoin
            | QuerySyntax::RightJoin
            | QuerySyntax::FullJoin => self.handle_join(syntax, args)?,
            QuerySyntax::On | QuerySyntax::Using => self.handle_on(syntax, args)?,
            QuerySyntax::Limit => self.handle_limit(&args),
            QuerySyntax::OrderBy => self.context.order_by = self.sorting_args(args)?,
            QuerySyntax::GroupBy => self.context.group_by = self.sorting_args(args)?,
            QuerySyntax::Union | QuerySyntax::UnionAll => self.handle_union(syntax, args)?,
        }

        if syntax.is_primary_command() && self.context.command.is_none() {
            self.context.command = Some(syntax);
        }
        self.history.push(syntax);
        Ok(())
    }

    /// Finish the plan, resolving unqualified columns to the primary table.
    pub fn build(mut self) -> DocsqlResult<QueryContext> {
        if let Some(pending) = self.join {
            return Err(DocsqlError::MalformedPlan(format!(
                "JOIN on \"{}\" has no ON/USING",
                pending.target.name
            )));
        }
        let primary = self.context.tables.first().cloned();
        for property in &mut self.context.properties {
            property.default_table(primary.as_ref());
        }
        for function in &mut self.context.functions {
            for param in &mut function.params {
                if let Param::Property(property) = param {
                    property.default_table(primary.as_ref());
                }
            }
        }
        Ok(self.context)
    }

    fn primary(&self) -> Option<Table> {
        self.context.tables.first().cloned()
    }

    fn target(&mut self) -> &mut Conditions {
        match self.clause {
            Clause::Where => &mut self.context.conditions,
            Clause::Having => &mut self.context.having,
        }
    }

    fn handle_select(&mut self, args: Vec<Arg>) -> DocsqlResult<()> {
        let mut properties = Vec::new();
        let mut function_columns = Vec::new();
        for arg in args {
            match arg {
                Arg::Function(function) => {
                    function_columns.extend(function.properties().cloned());
                    self.context.functions.push(function);
                }
                other => properties.push(column_arg(other, QuerySyntax::Select)?),
            }
        }

        // Columns only read by functions are fetched but not returned.
        if !properties.iter().any(Property::is_all) {
            for column in function_columns {
                if column.is_all() || properties.iter().any(|p| same_column(p, &column)) {
                    continue;
                }
                properties.push(column.into_temporary());
            }
        }
        self.context.properties = properties;
        Ok(())
    }

    fn handle_insert(&mut self, args: Vec<Arg>) -> DocsqlResult<()> {
        for arg in args {
            match arg {
                Arg::Value {
                    value: Value::Array(items),
                } => self.context.data.extend(items),
                Arg::Value { value } => self.context.data.push(value),
                other => {
                    return Err(DocsqlError::MalformedPlan(format!(
                        "INSERT expects row objects, got {:?}",
                        other
                    )))
                }
            }
        }
        Ok(())
    }

    fn handle_set(&mut self, mut args: Vec<Arg>) -> DocsqlResult<()> {
        if args.len() > 1 {
            return Err(DocsqlError::MalformedPlan(
                "Too many arguments for SET".to_string(),
            ));
        }
        match args.pop() {
            Some(Arg::Value {
                value: Value::Object(map),
            }) => {
                self.context.set = Some(map);
                Ok(())
            }
            other => Err(DocsqlError::MalformedPlan(format!(
                "SET expects one object, got {:?}",
                other
            ))),
        }
    }

    fn handle_keys(&mut self, clause: Clause, args: Vec<Arg>) -> DocsqlResult<()> {
        let primary = self.primary();
        let keys = args
            .into_iter()
            .map(|arg| key_arg(arg, primary.as_ref(), 0))
            .collect::<DocsqlResult<Vec<_>>>()?;

        let continues = matches!(
            self.history.as_slice(),
            [.., previous, last] if last.is_logical_operator() && *previous == clause.syntax()
        );
        if continues {
            match self.keychain.last_mut() {
                Some(Key::Scope(scope)) => scope.properties.extend(keys),
                other => {
                    return Err(DocsqlError::MalformedPlan(format!(
                        "Key {:?} should be a logical operator scope",
                        other
                    )))
                }
            }
        } else {
            self.keychain = keys;
        }
        self.clause = clause;
        Ok(())
    }

    fn handle_connective(&mut self, operator: LogicalOperator) {
        if self.history.last().is_some_and(QuerySyntax::is_key_clause) {
            self.keychain
                .push(Key::Scope(LogicalOperatorScope::new(operator)));
        } else {
            self.target().push_token(ConditionToken::connective(operator));
        }
    }

    fn push_condition(&mut self, expression: Option<Expression>) -> DocsqlResult<()> {
        match expression {
            Some(expression) => self.target().push_expression(&expression),
            None => Ok(()),
        }
    }

    fn require_keychain(&self, syntax: QuerySyntax) -> DocsqlResult<Vec<Key>> {
        if self.keychain.is_empty() {
            return Err(DocsqlError::MalformedPlan(format!(
                "{:?} without a WHERE or HAVING key",
                syntax
            )));
        }
        Ok(self.keychain.clone())
    }

    /// EQ / GT / LT / LIKE / NULL: every key against every value.
    fn handle_comparison(&mut self, syntax: QuerySyntax, args: Vec<Arg>) -> DocsqlResult<()> {
        let keys = self.require_keychain(syntax)?;
        let operands = operand_args(args)?;
        let expression = chain(&keys, &mut |_: usize, property: &Property| {
            if syntax == QuerySyntax::Null {
                return Ok(Expression::comparison(syntax, property.clone(), Vec::new()));
            }
            value_expression(syntax, property, &operands, 0)
        })?;
        self.push_condition(expression)
    }

    /// IN pairs value sets with keys positionally when there is one array per
    /// key; otherwise every key shares all values.
    fn handle_in(&mut self, args: Vec<Arg>) -> DocsqlResult<()> {
        let keys = self.require_keychain(QuerySyntax::In)?;
        let operands = operand_args(args)?;
        let positional = count_properties(&keys) > 1
            && operands.len() == count_properties(&keys)
            && operands
                .iter()
                .all(|o| matches!(o, Operand::Value(Value::Array(_)) | Operand::Query(_)));

        let expression = chain(&keys, &mut |index: usize, property: &Property| {
            let values = if positional {
                vec![operands[index].clone()]
            } else {
                operands.clone()
            };
            Ok(Expression::comparison(QuerySyntax::In, property.clone(), values))
        })?;
        self.push_condition(expression)
    }

    fn handle_between(&mut self, args: Vec<Arg>) -> DocsqlResult<()> {
        let keys = self.require_keychain(QuerySyntax::Between)?;
        let operands = operand_args(args)?;
        let count = count_properties(&keys);
        let positional = match operands.len() {
            2 => false,
            n if n == count * 2 => true,
            n => {
                return Err(DocsqlError::MalformedPlan(format!(
                    "BETWEEN expects 2 or {} bounds, got {}",
                    count * 2,
                    n
                )))
            }
        };

        let expression = chain(&keys, &mut |index: usize, property: &Property| {
            let bounds = if positional {
                operands[index * 2..index * 2 + 2].to_vec()
            } else {
                operands.clone()
            };
            Ok(Expression::comparison(
                QuerySyntax::Between,
                property.clone(),
                bounds,
            ))
        })?;
        self.push_condition(expression)
    }

    fn handle_exists(&mut self, args: Vec<Arg>) -> DocsqlResult<()> {
        let operands = operand_args(args)?;
        let expression = Expression::comparison(QuerySyntax::Exists, Property::row_id(), operands);
        self.target().push_expression(&expression)
    }

    fn handle_join(&mut self, syntax: QuerySyntax, mut args: Vec<Arg>) -> DocsqlResult<()> {
        let join_type = syntax
            .join_type()
            .ok_or_else(|| DocsqlError::MalformedPlan(format!("{:?} is not a join", syntax)))?;
        if let Some(pending) = &self.join {
            return Err(DocsqlError::MalformedPlan(format!(
                "JOIN on \"{}\" has no ON/USING",
                pending.target.name
            )));
        }

        let (target, property_b) = match args.pop() {
            Some(Arg::Table(table)) => (table, None),
            Some(Arg::Value {
                value: Value::String(s),
            }) if s.contains('.') && !s.contains(" AS ") => {
                let property = Property::parse(&s);
                match property.table.clone() {
                    Some(table) => (table, Some(property)),
                    None => (Table::parse(&s), None),
                }
            }
            Some(Arg::Value {
                value: Value::String(s),
            }) => (Table::parse(&s), None),
            Some(Arg::Property(property)) => match property.table.clone() {
                Some(table) => (table, Some(property)),
                None => {
                    return Err(DocsqlError::Validation(format!(
                        "JOIN column \"{}\" must name its table",
                        property.name
                    )))
                }
            },
            other => {
                return Err(DocsqlError::Validation(format!(
                    "JOIN expects a table or column, got {:?}",
                    other
                )))
            }
        };

        if self.primary().is_some_and(|primary| primary.name == target.name) {
            return Err(DocsqlError::Validation(format!(
                "cannot join \"{}\" to itself",
                target.name
            )));
        }

        self.join = Some(PendingJoin {
            join_type,
            target,
            property_b,
        });
        Ok(())
    }

    fn handle_on(&mut self, syntax: QuerySyntax, mut args: Vec<Arg>) -> DocsqlResult<()> {
        let Some(pending) = self.join.take() else {
            return Err(DocsqlError::MalformedPlan(format!(
                "{:?} without an open JOIN",
                syntax
            )));
        };
        let primary = self.primary();
        let column = match args.pop() {
            Some(arg) => column_arg(arg, syntax)?,
            None => return Err(DocsqlError::Validation(format!("{:?} expects a column", syntax))),
        };

        let (property_a, property_b) = if syntax == QuerySyntax::Using {
            let property_a = match &primary {
                Some(table) => Property::in_table(table.clone(), column.name.clone()),
                None => Property::new(column.name.clone()),
            };
            let property_b = Property::in_table(pending.target.clone(), column.name);
            (property_a, property_b)
        } else {
            let mut property_a = column;
            property_a.default_table(primary.as_ref());
            let mut property_b = pending.property_b.ok_or_else(|| {
                DocsqlError::MalformedPlan(format!(
                    "JOIN on \"{}\" needs a column to match ON",
                    pending.target.name
                ))
            })?;
            property_b.default_table(Some(&pending.target));
            (property_a, property_b)
        };

        self.context.joins.push(Join {
            join_type: pending.join_type,
            property_a,
            property_b,
        });
        Ok(())
    }

    fn handle_limit(&mut self, args: &[Arg]) {
        let number = |arg: Option<&Arg>| match arg {
            Some(Arg::Value {
                value: Value::Number(n),
            }) => n.as_i64().or_else(|| n.as_f64().map(|f| f as i64)),
            _ => None,
        };
        if let Some(offset_or_count) = number(args.first()) {
            self.context.limit = Some(Limit::new(offset_or_count, number(args.get(1))));
        }
    }

    fn sorting_args(&self, args: Vec<Arg>) -> DocsqlResult<Vec<SortingData>> {
        let primary = self.primary();
        args.into_iter()
            .map(|arg| {
                let (mut property, order) = match arg {
                    Arg::Value {
                        value: Value::String(entry),
                    } => {
                        let parts: Vec<&str> = entry.split_whitespace().collect();
                        if parts.is_empty() || parts.len() > 2 {
                            return Err(DocsqlError::MalformedPlan(format!(
                                "There is something wrong with this order by \"{}\"",
                                entry
                            )));
                        }
                        (
                            Property::parse(parts[0]),
                            SortingOrder::parse(parts.get(1).copied()),
                        )
                    }
                    Arg::Property(property) => (property, SortingOrder::Asc),
                    other => {
                        return Err(DocsqlError::Validation(format!(
                            "cannot sort by {:?}",
                            other
                        )))
                    }
                };
                property.default_table(primary.as_ref());
                Ok(SortingData { property, order })
            })
            .collect()
    }

    fn handle_union(&mut self, syntax: QuerySyntax, args: Vec<Arg>) -> DocsqlResult<()> {
        for arg in args {
            match arg {
                Arg::Subquery(result) => self.context.unions.push(Union {
                    result,
                    distinct: syntax == QuerySyntax::Union,
                }),
                Arg::Reference { query } => {
                    return Err(DocsqlError::MalformedPlan(format!(
                        "unresolved reference to query {}",
                        query
                    )))
                }
                other => {
                    return Err(DocsqlError::MalformedPlan(format!(
                        "{:?} expects sub-query results, got {:?}",
                        syntax, other
                    )))
                }
            }
        }
        Ok(())
    }
}

fn same_column(a: &Property, b: &Property) -> bool {
    a.name == b.name
        && match (a.table_name(), b.table_name()) {
            (Some(x), Some(y)) => x == y,
            _ => true,
        }
}

fn table_arg(arg: Arg, syntax: QuerySyntax) -> DocsqlResult<Table> {
    match arg {
        Arg::Table(table) => Ok(table),
        Arg::Value {
            value: Value::String(s),
        } => Ok(Table::parse(&s)),
        other => Err(DocsqlError::Validation(format!(
            "{:?} expects table names, got {:?}",
            syntax, other
        ))),
    }
}

fn column_arg(arg: Arg, syntax: QuerySyntax) -> DocsqlResult<Property> {
    match arg {
        Arg::Property(property) => Ok(property),
        Arg::Value {
            value: Value::String(s),
        } => Ok(Property::parse(&s)),
        other => Err(DocsqlError::Validation(format!(
            "{:?} expects column names, got {:?}",
            syntax, other
        ))),
    }
}

fn key_arg(arg: Arg, table: Option<&Table>, depth: usize) -> DocsqlResult<Key> {
    if depth > MAX_NESTING {
        return Err(DocsqlError::NestingTooDeep(MAX_NESTING));
    }
    match arg {
        Arg::Scope(scope) => {
            let properties = scope
                .properties
                .into_iter()
                .map(|inner| key_arg(inner, table, depth + 1))
                .collect::<DocsqlResult<Vec<_>>>()?;
            Ok(Key::Scope(LogicalOperatorScope::with(scope.operator, properties)))
        }
        other => {
            let mut property = column_arg(other, QuerySyntax::Where)?;
            property.default_table(table);
            Ok(Key::Property(property))
        }
    }
}

fn operand_args(args: Vec<Arg>) -> DocsqlResult<Vec<Operand>> {
    args.into_iter().map(|arg| operand_arg(arg, 0)).collect()
}

fn operand_arg(arg: Arg, depth: usize) -> DocsqlResult<Operand> {
    if depth > MAX_NESTING {
        return Err(DocsqlError::NestingTooDeep(MAX_NESTING));
    }
    match arg {
        Arg::Value { value } => Ok(Operand::Value(value)),
        Arg::Subquery(result) => Ok(Operand::Query(result)),
        Arg::Scope(scope) => {
            let properties = scope
                .properties
                .into_iter()
                .map(|inner| operand_arg(inner, depth + 1))
                .collect::<DocsqlResult<Vec<_>>>()?;
            Ok(Operand::Scope(LogicalOperatorScope::with(scope.operator, properties)))
        }
        Arg::Reference { query } => Err(DocsqlError::MalformedPlan(format!(
            "unresolved reference to query {}",
            query
        ))),
        other => Err(DocsqlError::Validation(format!(
            "expected a value or sub-query, got {:?}",
            other
        ))),
    }
}

/// Leaves for one key: an OR over plain values, a group over a value scope.
fn value_expression(
    syntax: QuerySyntax,
    property: &Property,
    operands: &[Operand],
    depth: usize,
) -> DocsqlResult<Expression> {
    if depth > MAX_NESTING {
        return Err(DocsqlError::NestingTooDeep(MAX_NESTING));
    }
    let mut items = Vec::with_capacity(operands.len());
    for operand in operands {
        let item = match operand {
            Operand::Scope(scope) => {
                let inner = scope
                    .properties
                    .iter()
                    .map(|o| value_expression(syntax, property, std::slice::from_ref(o), depth + 1))
                    .collect::<DocsqlResult<Vec<_>>>()?;
                Expression::scope(scope.operator, inner)
            }
            other => Expression::comparison(syntax, property.clone(), vec![other.clone()]),
        };
        items.push(item);
    }
    Ok(join_terms(LogicalOperator::Or, items)
        .unwrap_or_else(|| Expression::comparison(syntax, property.clone(), Vec::new())))
}

fn count_properties(keys: &[Key]) -> usize {
    keys.iter()
        .map(|key| match key {
            Key::Property(_) => 1,
            Key::Scope(scope) => count_properties(&scope.properties),
        })
        .sum()
}

type LeafFn<'a> = dyn FnMut(usize, &Property) -> DocsqlResult<Expression> + 'a;

/// Turn a keychain into an expression, AND binding tighter than OR.
fn chain(keys: &[Key], leaf: &mut LeafFn<'_>) -> DocsqlResult<Option<Expression>> {
    let mut index = 0;
    chain_scope(keys, LogicalOperator::And, 0, &mut index, leaf)
}

fn chain_scope(
    keys: &[Key],
    operator: LogicalOperator,
    depth: usize,
    index: &mut usize,
    leaf: &mut LeafFn<'_>,
) -> DocsqlResult<Option<Expression>> {
    if depth > MAX_NESTING {
        return Err(DocsqlError::NestingTooDeep(MAX_NESTING));
    }
    let mut terms = Vec::new();
    let mut current = Vec::new();
    for key in keys {
        let (connective, expression) = match key {
            Key::Property(property) => {
                let expression = leaf(*index, property)?;
                *index += 1;
                (operator, Some(expression))
            }
            Key::Scope(scope) => (
                scope.operator,
                chain_scope(&scope.properties, scope.operator, depth + 1, index, leaf)?,
            ),
        };
        let Some(expression) = expression else {
            continue;
        };
        if connective == LogicalOperator::Or && !current.is_empty() {
            terms.extend(join_terms(LogicalOperator::And, std::mem::take(&mut current)));
        }
        current.push(expression);
    }
    terms.extend(join_terms(LogicalOperator::And, current));
    Ok(join_terms(LogicalOperator::Or, terms))
}

fn join_terms(operator: LogicalOperator, mut terms: Vec<Expression>) -> Option<Expression> {
    match terms.len() {
        0 => None,
        1 => terms.pop(),
        _ => Some(Expression::scope(operator, terms)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::QueryResult;
    use crate::types::{FunctionData, Row};
    use serde_json::json;

    fn op(syntax: QuerySyntax, args: Vec<Arg>) -> Operation {
        Operation::new(syntax, args)
    }

    fn user(content: Value) -> Row {
        Row::new(Table::new("users"), "u1", content)
    }

    fn select_users(conditions: Vec<Operation>) -> QueryContext {
        let mut scheme = vec![
            op(QuerySyntax::Select, vec![Arg::value("*")]),
            op(QuerySyntax::From, vec![Arg::value("users")]),
        ];
        scheme.extend(conditions);
        build_context(&scheme).unwrap()
    }

    #[test]
    fn test_where_and_chain() {
        let ctx = select_users(vec![
            op(QuerySyntax::Where, vec![Arg::value("age")]),
            op(QuerySyntax::Gt, vec![Arg::value(18)]),
            op(QuerySyntax::And, vec![]),
            op(QuerySyntax::Where, vec![Arg::value("name")]),
            op(QuerySyntax::Eq, vec![Arg::value("Bob")]),
        ]);
        assert_eq!(ctx.command, Some(QuerySyntax::Select));
        assert!(ctx.conditions.test(&user(json!({"age": 20, "name": "Bob"}))));
        assert!(!ctx.conditions.test(&user(json!({"age": 15, "name": "Bob"}))));
        assert!(!ctx.conditions.test(&user(json!({"age": 20, "name": "Ann"}))));
    }

    #[test]
    fn test_keychain_continuation() {
        // WHERE a OR b = 1
        let ctx = select_users(vec![
            op(QuerySyntax::Where, vec![Arg::value("a")]),
            op(QuerySyntax::Or, vec![]),
            op(QuerySyntax::Where, vec![Arg::value("b")]),
            op(QuerySyntax::Eq, vec![Arg::value(1)]),
        ]);
        assert!(ctx.conditions.test(&user(json!({"a": 0, "b": 1}))));
        assert!(ctx.conditions.test(&user(json!({"a": 1, "b": 0}))));
        assert!(!ctx.conditions.test(&user(json!({"a": 0, "b": 0}))));
    }

    #[test]
    fn test_keychain_precedence() {
        // WHERE a AND b OR c = 1  ->  (a && b) || c
        let ctx = select_users(vec![
            op(QuerySyntax::Where, vec![Arg::value("a")]),
            op(QuerySyntax::And, vec![]),
            op(QuerySyntax::Where, vec![Arg::value("b")]),
            op(QuerySyntax::Or, vec![]),
            op(QuerySyntax::Where, vec![Arg::value("c")]),
            op(QuerySyntax::Eq, vec![Arg::value(1)]),
        ]);
        assert!(ctx.conditions.test(&user(json!({"a": 0, "b": 0, "c": 1}))));
        assert!(ctx.conditions.test(&user(json!({"a": 1, "b": 1, "c": 0}))));
        assert!(!ctx.conditions.test(&user(json!({"a": 1, "b": 0, "c": 0}))));
    }

    #[test]
    fn test_multiple_values_or() {
        let ctx = select_users(vec![
            op(QuerySyntax::Where, vec![Arg::value("name")]),
            op(QuerySyntax::Eq, vec![Arg::value("Ann"), Arg::value("Bob")]),
        ]);
        assert!(ctx.conditions.test(&user(json!({"name": "Bob"}))));
        assert!(!ctx.conditions.test(&user(json!({"name": "Eve"}))));
    }

    #[test]
    fn test_value_scope() {
        let ctx = select_users(vec![
            op(QuerySyntax::Where, vec![Arg::value("tags")]),
            op(QuerySyntax::Like, vec![Arg::and(vec![Arg::value("%a%"), Arg::value("%b%")])]),
        ]);
        assert!(ctx.conditions.test(&user(json!({"tags": "ab"}))));
        assert!(!ctx.conditions.test(&user(json!({"tags": "a"}))));
    }

    #[test]
    fn test_not_and_parentheses() {
        let ctx = select_users(vec![
            op(QuerySyntax::Not, vec![]),
            op(QuerySyntax::OpenParentheses, vec![]),
            op(QuerySyntax::Where, vec![Arg::value("a")]),
            op(QuerySyntax::Eq, vec![Arg::value(1)]),
            op(QuerySyntax::Or, vec![]),
            op(QuerySyntax::Where, vec![Arg::value("b")]),
            op(QuerySyntax::Eq, vec![Arg::value(1)]),
            op(QuerySyntax::CloseParentheses, vec![]),
        ]);
        assert!(ctx.conditions.test(&user(json!({"a": 0, "b": 0}))));
        assert!(!ctx.conditions.test(&user(json!({"a": 0, "b": 1}))));
    }

    #[test]
    fn test_in_positional_and_shared() {
        let ctx = select_users(vec![
            op(QuerySyntax::Where, vec![Arg::value("a"), Arg::value("b")]),
            op(QuerySyntax::In, vec![Arg::value(json!([1, 2])), Arg::value(json!([3]))]),
        ]);
        assert!(ctx.conditions.test(&user(json!({"a": 2, "b": 3}))));
        assert!(!ctx.conditions.test(&user(json!({"a": 3, "b": 3}))));

        let ctx = select_users(vec![
            op(QuerySyntax::Where, vec![Arg::value("a")]),
            op(QuerySyntax::In, vec![Arg::value(1), Arg::value(2), Arg::value(3)]),
        ]);
        assert!(ctx.conditions.test(&user(json!({"a": 3}))));
    }

    #[test]
    fn test_between() {
        let ctx = select_users(vec![
            op(QuerySyntax::Where, vec![Arg::value("age")]),
            op(QuerySyntax::Between, vec![Arg::value(18), Arg::value(30)]),
        ]);
        assert!(ctx.conditions.test(&user(json!({"age": 18}))));
        assert!(!ctx.conditions.test(&user(json!({"age": 31}))));

        let err = build_context(&[
            op(QuerySyntax::From, vec![Arg::value("users")]),
            op(QuerySyntax::Where, vec![Arg::value("age")]),
            op(QuerySyntax::Between, vec![Arg::value(1), Arg::value(2), Arg::value(3)]),
        ])
        .unwrap_err();
        assert!(matches!(err, DocsqlError::MalformedPlan(_)));
    }

    #[test]
    fn test_exists_subquery() {
        let result = QueryResult::from_value(json!({"orders": []}));
        let ctx = select_users(vec![op(QuerySyntax::Exists, vec![Arg::Subquery(result)])]);
        assert!(!ctx.conditions.test(&user(json!({}))));
    }

    #[test]
    fn test_select_functions_mark_temporary_columns() {
        let ctx = build_context(&[
            op(
                QuerySyntax::Select,
                vec![
                    Arg::value("name"),
                    Arg::Function(FunctionData::new(
                        "SUM",
                        "total",
                        vec![Param::column("price")],
                    )),
                ],
            ),
            op(QuerySyntax::From, vec![Arg::value("orders")]),
        ])
        .unwrap();

        assert_eq!(ctx.functions.len(), 1);
        assert_eq!(ctx.properties.len(), 2);
        assert!(!ctx.properties[0].temporary);
        assert!(ctx.properties[1].temporary);
        assert_eq!(ctx.properties[1].table_name(), Some("orders"));
    }

    #[test]
    fn test_round_trip_plan() {
        let ctx = build_context(&[
            op(QuerySyntax::Select, vec![Arg::value("*")]),
            op(QuerySyntax::From, vec![Arg::value("users AS u")]),
            op(QuerySyntax::LeftJoin, vec![Arg::value("orders.userId")]),
            op(QuerySyntax::On, vec![Arg::value("id")]),
            op(QuerySyntax::Limit, vec![Arg::value(2), Arg::value(5)]),
            op(QuerySyntax::OrderBy, vec![Arg::value("age   DESC"), Arg::value("name")]),
        ])
        .unwrap();

        assert_eq!(ctx.tables, vec![Table::with_alias("users", "u")]);
        assert_eq!(ctx.joins.len(), 1);
        let join = &ctx.joins[0];
        assert_eq!(join.join_type, JoinType::Left);
        assert_eq!(join.property_a.table_name(), Some("users"));
        assert_eq!(join.property_a.name, "id");
        assert_eq!(join.property_b.table_name(), Some("orders"));
        assert_eq!(join.property_b.name, "userId");
        assert_eq!(ctx.limit, Some(Limit::new(2, Some(5))));
        assert_eq!(ctx.order_by[0].order, SortingOrder::Desc);
        assert_eq!(ctx.order_by[1].order, SortingOrder::Asc);
    }

    #[test]
    fn test_using() {
        let ctx = build_context(&[
            op(QuerySyntax::From, vec![Arg::value("users")]),
            op(QuerySyntax::Join, vec![Arg::value("profiles")]),
            op(QuerySyntax::Using, vec![Arg::value("userId")]),
        ])
        .unwrap();
        assert_eq!(ctx.joins[0].property_a, Property::in_table(Table::new("users"), "userId"));
        assert_eq!(ctx.joins[0].property_b, Property::in_table(Table::new("profiles"), "userId"));
    }

    #[test]
    fn test_malformed_plans() {
        let on_without_join = build_context(&[
            op(QuerySyntax::From, vec![Arg::value("users")]),
            op(QuerySyntax::On, vec![Arg::value("id")]),
        ]);
        assert!(matches!(on_without_join, Err(DocsqlError::MalformedPlan(_))));

        let bad_order = build_context(&[
            op(QuerySyntax::From, vec![Arg::value("users")]),
            op(QuerySyntax::OrderBy, vec![Arg::value("age DESC extra")]),
        ]);
        assert!(matches!(bad_order, Err(DocsqlError::MalformedPlan(_))));

        let two_sets = build_context(&[
            op(QuerySyntax::Update, vec![Arg::value("users")]),
            op(QuerySyntax::Set, vec![Arg::value(json!({"a": 1})), Arg::value(json!({"b": 2}))]),
        ]);
        assert!(matches!(two_sets, Err(DocsqlError::MalformedPlan(_))));

        let self_join = build_context(&[
            op(QuerySyntax::From, vec![Arg::value("users")]),
            op(QuerySyntax::Join, vec![Arg::value("users.id")]),
        ]);
        assert!(matches!(self_join, Err(DocsqlError::Validation(_))));

        let dangling_join = build_context(&[
            op(QuerySyntax::From, vec![Arg::value("users")]),
            op(QuerySyntax::Join, vec![Arg::value("orders.userId")]),
        ]);
        assert!(matches!(dangling_join, Err(DocsqlError::MalformedPlan(_))));
    }

    #[test]
    fn test_first_primary_command_wins() {
        let ctx = build_context(&[
            op(QuerySyntax::Update, vec![Arg::value("users")]),
            op(QuerySyntax::Set, vec![Arg::value(json!({"a": 1}))]),
            op(QuerySyntax::Select, vec![]),
        ])
        .unwrap();
        assert_eq!(ctx.command, Some(QuerySyntax::Update));
    }

    #[test]
    fn test_having_targets_separate_conditions() {
        let ctx = select_users(vec![
            op(QuerySyntax::GroupBy, vec![Arg::value("city")]),
            op(QuerySyntax::Having, vec![Arg::value("total")]),
            op(QuerySyntax::Gt, vec![Arg::value(1)]),
        ]);
        assert!(ctx.conditions.is_empty());
        assert!(!ctx.having.is_empty());
        assert_eq!(ctx.group_by.len(), 1);
    }
}
