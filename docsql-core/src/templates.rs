//! Query-syntax template registry.
//!
//! Each comparison syntax maps to a template that, given the compared property
//! and its operands, yields a row evaluator. Evaluators report `Skipped` for
//! rows the property's table does not apply to.

use std::borrow::Cow;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use once_cell::sync::{Lazy, OnceCell};
use serde_json::{Map, Value};

use crate::error::{DocsqlError, DocsqlResult};
use crate::helpers::{like_regex, partial_compare, value_to_string, values_equal};
use crate::syntax::QuerySyntax;
use crate::types::{Operand, Property, Row};
use std::cmp::Ordering;

/// Outcome of one leaf condition against one row.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterResult {
    Passed,
    Failed,
    /// The condition does not apply to this row.
    Skipped,
}

impl From<bool> for FilterResult {
    fn from(value: bool) -> Self {
        if value {
            FilterResult::Passed
        } else {
            FilterResult::Failed
        }
    }
}

impl FilterResult {
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            FilterResult::Passed => Some(true),
            FilterResult::Failed => Some(false),
            FilterResult::Skipped => None,
        }
    }
}

/// Compiled leaf condition.
#[derive(Clone)]
pub struct Evaluator(Arc<dyn Fn(&Row) -> FilterResult + Send + Sync>);

impl Evaluator {
    pub fn new(f: impl Fn(&Row) -> FilterResult + Send + Sync + 'static) -> Self {
        Self(Arc::new(f))
    }

    #[inline]
    pub fn evaluate(&self, row: &Row) -> FilterResult {
        (self.0)(row)
    }
}

impl fmt::Debug for Evaluator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Evaluator")
    }
}

pub type Template = fn(&Property, &[Operand]) -> Evaluator;

static TEMPLATES: Lazy<HashMap<QuerySyntax, Template>> = Lazy::new(|| {
    let mut map: HashMap<QuerySyntax, Template> = HashMap::new();
    map.insert(QuerySyntax::Eq, eq_template);
    map.insert(QuerySyntax::Gt, gt_template);
    map.insert(QuerySyntax::Lt, lt_template);
    map.insert(QuerySyntax::Between, between_template);
    map.insert(QuerySyntax::Like, like_template);
    map.insert(QuerySyntax::In, in_template);
    map.insert(QuerySyntax::Null, null_template);
    map.insert(QuerySyntax::Exists, exists_template);
    map
});

/// Look up the template registered for a comparison syntax.
pub fn template(syntax: QuerySyntax) -> DocsqlResult<Template> {
    TEMPLATES
        .get(&syntax)
        .copied()
        .ok_or(DocsqlError::MissingTemplate(syntax))
}

/// Build the evaluator for `syntax` applied to `property`.
pub fn compile(syntax: QuerySyntax, property: &Property, operands: &[Operand]) -> DocsqlResult<Evaluator> {
    Ok(template(syntax)?(property, operands))
}

/// Values the operands stand for. Sub-queries expand to every scalar of
/// their result. Array literals expand one level only when `expand_arrays`
/// is set, otherwise an array is a single value.
pub fn operand_values(operands: &[Operand], expand_arrays: bool) -> Vec<Value> {
    let mut values = Vec::new();
    for operand in operands {
        match operand {
            Operand::Value(Value::Array(items)) if expand_arrays => values.extend(items.iter().cloned()),
            Operand::Value(value) => values.push(value.clone()),
            Operand::Query(result) => values.extend(result.values()),
            Operand::Scope(scope) => values.extend(operand_values(&scope.properties, expand_arrays)),
        }
    }
    values
}

fn operands_ready(operands: &[Operand]) -> bool {
    operands.iter().all(|operand| match operand {
        Operand::Value(_) => true,
        Operand::Query(result) => result.is_ready(),
        Operand::Scope(scope) => operands_ready(&scope.properties),
    })
}

/// Operand values, expanded once every sub-query they read has been set.
struct ResolvedOperands {
    operands: Vec<Operand>,
    expand_arrays: bool,
    cache: OnceCell<Vec<Value>>,
}

impl ResolvedOperands {
    fn new(operands: &[Operand], expand_arrays: bool) -> Self {
        Self {
            operands: operands.to_vec(),
            expand_arrays,
            cache: OnceCell::new(),
        }
    }

    fn values(&self) -> Cow<'_, [Value]> {
        if let Some(values) = self.cache.get() {
            return Cow::Borrowed(values.as_slice());
        }
        if operands_ready(&self.operands) {
            Cow::Borrowed(
                self.cache
                    .get_or_init(|| operand_values(&self.operands, self.expand_arrays))
                    .as_slice(),
            )
        } else {
            Cow::Owned(operand_values(&self.operands, self.expand_arrays))
        }
    }
}

/// Wrap a value test into a table-aware row evaluator.
fn condition<F>(property: &Property, test: F) -> Evaluator
where
    F: Fn(&Value) -> bool + Send + Sync + 'static,
{
    let property = property.clone();
    Evaluator::new(move |row| {
        if let Some(table) = property.table_name() {
            if !row.covers_table(table) {
                return FilterResult::Skipped;
            }
        }
        test(&row.value_of(&property)).into()
    })
}

/// Operands are resolved at evaluation so sub-query results are read after
/// they are set.
fn with_values<F>(property: &Property, operands: &[Operand], test: F) -> Evaluator
where
    F: Fn(&Value, &[Value]) -> bool + Send + Sync + 'static,
{
    resolved_with(property, ResolvedOperands::new(operands, false), test)
}

fn resolved_with<F>(property: &Property, operands: ResolvedOperands, test: F) -> Evaluator
where
    F: Fn(&Value, &[Value]) -> bool + Send + Sync + 'static,
{
    condition(property, move |value| test(value, operands.values().as_ref()))
}

fn any_equal(value: &Value, expected: &[Value]) -> bool {
    expected.iter().any(|e| values_equal(value, e))
}

fn eq_template(property: &Property, operands: &[Operand]) -> Evaluator {
    with_values(property, operands, any_equal)
}

fn gt_template(property: &Property, operands: &[Operand]) -> Evaluator {
    with_values(property, operands, |value, bounds| {
        bounds
            .iter()
            .any(|b| partial_compare(value, b) == Some(Ordering::Greater))
    })
}

fn lt_template(property: &Property, operands: &[Operand]) -> Evaluator {
    with_values(property, operands, |value, bounds| {
        bounds
            .iter()
            .any(|b| partial_compare(value, b) == Some(Ordering::Less))
    })
}

fn between_template(property: &Property, operands: &[Operand]) -> Evaluator {
    with_values(property, operands, |value, bounds| match bounds {
        [min, max] => {
            matches!(partial_compare(min, value), Some(Ordering::Less | Ordering::Equal))
                && matches!(partial_compare(value, max), Some(Ordering::Less | Ordering::Equal))
        }
        _ => false,
    })
}

fn like_template(property: &Property, operands: &[Operand]) -> Evaluator {
    let patterns = operand_values(operands, false);
    let regexes: Vec<_> = patterns
        .iter()
        .filter_map(|p| p.as_str())
        .filter_map(|p| like_regex(p).ok())
        .collect();
    let fallback: Vec<Value> = patterns.into_iter().filter(|p| !p.is_string()).collect();

    condition(property, move |value| {
        let text = match value {
            Value::Null => None,
            other => Some(value_to_string(other)),
        };
        let by_pattern = text
            .as_deref()
            .is_some_and(|t| regexes.iter().any(|re| re.is_match(t)));
        by_pattern || fallback.iter().any(|e| values_equal(value, e))
    })
}

fn in_template(property: &Property, operands: &[Operand]) -> Evaluator {
    resolved_with(property, ResolvedOperands::new(operands, true), any_equal)
}

fn null_template(property: &Property, _operands: &[Operand]) -> Evaluator {
    condition(property, Value::is_null)
}

fn exists_template(_property: &Property, operands: &[Operand]) -> Evaluator {
    let queries: Vec<_> = operands
        .iter()
        .filter_map(|o| match o {
            Operand::Query(result) => Some(result.clone()),
            _ => None,
        })
        .collect();
    Evaluator::new(move |_row| {
        let counts: Vec<usize> = queries.iter().filter_map(|q| q.row_count()).collect();
        if counts.is_empty() {
            return FilterResult::Skipped;
        }
        counts.iter().any(|count| *count > 0).into()
    })
}

/// SELECT projection: reshape a row to the requested properties.
///
/// An empty projection or `*` keeps every field. Properties of tables the row
/// does not cover are ignored.
pub fn project(row: &Row, properties: &[Property]) -> Row {
    if properties.is_empty() {
        return row.clone();
    }
    let mut content = Map::new();
    for property in properties {
        if let Some(table) = property.table_name() {
            if !row.covers_table(table) {
                continue;
            }
        }
        if property.is_all() {
            content.extend(row.content.iter().map(|(k, v)| (k.clone(), v.clone())));
        } else {
            content.insert(property.label().to_string(), row.value_of(property));
        }
    }
    Row {
        table: row.table.clone(),
        key: row.key.clone(),
        scheme: content.keys().cloned().collect(),
        content,
        joined: row.joined.clone(),
    }
}
