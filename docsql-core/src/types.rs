//! Data model shared by the builder, the condition compiler and the pipelines.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::context::QueryResult;
use crate::syntax::{JoinType, LogicalOperator, QuerySyntax, SortingOrder};

/// Pseudo-column addressing the store-assigned row key.
pub const ROW_ID: &str = "_key";

/// Projection shorthand for every column of a table.
pub const ALL_COLUMNS: &str = "*";

/// A top-level collection of the store.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Table {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub alias: Option<String>,
}

impl Table {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            alias: None,
        }
    }

    pub fn with_alias(name: impl Into<String>, alias: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            alias: Some(alias.into()),
        }
    }

    /// Parse `"users"` or `"users AS u"`.
    pub fn parse(input: &str) -> Self {
        let normalized = input.split_whitespace().collect::<Vec<_>>().join(" ");
        match normalized.split_once(" AS ") {
            Some((name, alias)) => Table::with_alias(name, alias),
            None => Table::new(normalized),
        }
    }
}

/// A column reference.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Property {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub table: Option<Table>,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub alias: Option<String>,
    /// Only needed to compute a function; stripped from the output.
    #[serde(default)]
    pub temporary: bool,
}

impl Property {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            table: None,
            name: name.into(),
            alias: None,
            temporary: false,
        }
    }

    pub fn in_table(table: Table, name: impl Into<String>) -> Self {
        Self {
            table: Some(table),
            ..Self::new(name)
        }
    }

    pub fn row_id() -> Self {
        Self::new(ROW_ID)
    }

    /// Parse `"column"` or `"table.column"`.
    pub fn parse(input: &str) -> Self {
        match input.trim().split_once('.') {
            Some((table, name)) if !table.is_empty() && !name.is_empty() => {
                Property::in_table(Table::new(table), name)
            }
            _ => Property::new(input.trim()),
        }
    }

    pub fn with_alias(mut self, alias: impl Into<String>) -> Self {
        self.alias = Some(alias.into());
        self
    }

    pub fn into_temporary(mut self) -> Self {
        self.temporary = true;
        self
    }

    pub fn is_row_id(&self) -> bool {
        self.name == ROW_ID
    }

    pub fn is_all(&self) -> bool {
        self.name == ALL_COLUMNS
    }

    /// Output field name: the alias when one is set.
    pub fn label(&self) -> &str {
        self.alias.as_deref().unwrap_or(&self.name)
    }

    pub fn table_name(&self) -> Option<&str> {
        self.table.as_ref().map(|t| t.name.as_str())
    }

    /// Resolve an unqualified property against the query's primary table.
    pub fn default_table(&mut self, table: Option<&Table>) {
        if self.table.is_none() {
            self.table = table.cloned();
        }
    }
}

/// One fetched (or synthesised) record.
#[derive(Debug, Clone, PartialEq)]
pub struct Row {
    pub table: Table,
    pub key: String,
    pub content: Map<String, Value>,
    /// Field names observed on this row. Rows of one table may disagree.
    pub scheme: Vec<String>,
    /// Tables whose rows were merged into this one by a join.
    pub joined: Vec<String>,
}

impl Row {
    pub fn new(table: Table, key: impl Into<String>, content: Value) -> Self {
        let content = match content {
            Value::Object(map) => map,
            Value::Null => Map::new(),
            other => {
                let mut map = Map::new();
                map.insert("value".to_string(), other);
                map
            }
        };
        let scheme = content.keys().cloned().collect();
        Self {
            table,
            key: key.into(),
            content,
            scheme,
            joined: Vec::new(),
        }
    }

    /// Same table, key and field names, every value nulled.
    pub fn nulled(&self) -> Self {
        let content = self
            .scheme
            .iter()
            .map(|field| (field.clone(), Value::Null))
            .collect();
        Self {
            table: self.table.clone(),
            key: self.key.clone(),
            content,
            scheme: self.scheme.clone(),
            joined: Vec::new(),
        }
    }

    /// Whether conditions on `table` can be evaluated against this row.
    pub fn covers_table(&self, table: &str) -> bool {
        self.table.name == table || self.joined.iter().any(|t| t == table)
    }

    /// Read the value a property designates. Missing fields read as null.
    pub fn value_of(&self, property: &Property) -> Value {
        if property.is_row_id() {
            return Value::String(self.key.clone());
        }
        let table = property.table_name().unwrap_or(&self.table.name);
        if table != self.table.name {
            let qualified = format!("{}.{}", table, property.name);
            if let Some(value) = self.content.get(&qualified) {
                return value.clone();
            }
        }
        self.content
            .get(&property.name)
            .cloned()
            .unwrap_or(Value::Null)
    }

    pub fn into_value(self) -> Value {
        Value::Object(self.content)
    }
}

/// Working set of a pipeline: table name to rows in fetch order.
pub type DataMap = BTreeMap<String, Vec<Row>>;

/// A configured join between the primary table and another one.
#[derive(Debug, Clone, PartialEq)]
pub struct Join {
    pub join_type: JoinType,
    /// Column of the already-loaded (primary) table.
    pub property_a: Property,
    /// Column of the table being joined in.
    pub property_b: Property,
}

/// Direction and size of a store-side bounded fetch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchLimit {
    First(usize),
    Last(usize),
}

/// Raw LIMIT arguments.
///
/// `{n}` keeps the first n rows when n >= 0 and the last |n| rows otherwise.
/// `{offset, count}` keeps `count` rows after skipping `offset`; a negative
/// count counts from the end instead.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Limit {
    pub offset_or_count: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub count: Option<i64>,
}

impl Limit {
    pub fn new(offset_or_count: i64, count: Option<i64>) -> Self {
        Self {
            offset_or_count,
            count,
        }
    }

    /// The bounded fetch that covers every row this limit can keep.
    pub fn fetch_limit(&self) -> FetchLimit {
        let offset = self.offset_or_count.unsigned_abs() as usize;
        match self.count {
            None if self.offset_or_count >= 0 => FetchLimit::First(offset),
            None => FetchLimit::Last(offset),
            Some(count) if count >= 0 => FetchLimit::First(offset + count as usize),
            Some(count) => FetchLimit::Last(offset + count.unsigned_abs() as usize),
        }
    }

    /// Keep the rows this limit selects, preserving their order.
    pub fn slice<T>(&self, rows: Vec<T>) -> Vec<T> {
        let len = rows.len();
        let (start, end) = match self.count {
            None if self.offset_or_count >= 0 => (0, self.offset_or_count as usize),
            None => (len.saturating_sub(self.offset_or_count.unsigned_abs() as usize), len),
            Some(count) if count >= 0 => {
                let offset = self.offset_or_count.max(0) as usize;
                (offset, offset.saturating_add(count as usize))
            }
            Some(count) => {
                let end = len.saturating_sub(self.offset_or_count.max(0) as usize);
                (end.saturating_sub(count.unsigned_abs() as usize), end)
            }
        };
        let end = end.min(len);
        if start >= end {
            return Vec::new();
        }
        rows.into_iter().skip(start).take(end - start).collect()
    }
}

/// One ORDER BY / GROUP BY entry.
#[derive(Debug, Clone, PartialEq)]
pub struct SortingData {
    pub property: Property,
    pub order: SortingOrder,
}

/// A parenthesised group of items joined by one connective.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogicalOperatorScope<T> {
    pub operator: LogicalOperator,
    #[serde(default = "Vec::new")]
    pub properties: Vec<T>,
}

impl<T> LogicalOperatorScope<T> {
    pub fn new(operator: LogicalOperator) -> Self {
        Self {
            operator,
            properties: Vec::new(),
        }
    }

    pub fn with(operator: LogicalOperator, properties: Vec<T>) -> Self {
        Self {
            operator,
            properties,
        }
    }
}

/// Entry of a WHERE / HAVING keychain.
#[derive(Debug, Clone, PartialEq)]
pub enum Key {
    Property(Property),
    Scope(LogicalOperatorScope<Key>),
}

/// Right-hand side of a comparison.
#[derive(Debug, Clone)]
pub enum Operand {
    Value(Value),
    Query(QueryResult),
    Scope(LogicalOperatorScope<Operand>),
}

/// Function argument: a column of the current row or a literal.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Param {
    Property(Property),
    Value { value: Value },
}

impl Param {
    pub fn value(value: impl Into<Value>) -> Self {
        Param::Value {
            value: value.into(),
        }
    }

    pub fn column(name: &str) -> Self {
        Param::Property(Property::parse(name))
    }
}

/// A scalar or aggregate call in a projection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FunctionData {
    /// Function name, e.g. `SUM` or `SUBSTRING_INDEX` (case-insensitive).
    pub function: String,
    pub alias: String,
    #[serde(default)]
    pub params: Vec<Param>,
}

impl FunctionData {
    pub fn new(function: impl Into<String>, alias: impl Into<String>, params: Vec<Param>) -> Self {
        Self {
            function: function.into(),
            alias: alias.into(),
            params,
        }
    }

    pub fn properties(&self) -> impl Iterator<Item = &Property> {
        self.params.iter().filter_map(|p| match p {
            Param::Property(property) => Some(property),
            Param::Value { .. } => None,
        })
    }
}

/// Another query's result folded into this one.
#[derive(Debug, Clone)]
pub struct Union {
    pub result: QueryResult,
    pub distinct: bool,
}

/// Raw argument of a DSL operation.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Arg {
    Value { value: Value },
    Table(Table),
    Property(Property),
    Scope(LogicalOperatorScope<Arg>),
    Function(FunctionData),
    /// Result of an earlier query in the same batch, by position.
    Reference { query: usize },
    #[serde(skip)]
    Subquery(QueryResult),
}

impl Arg {
    pub fn value(value: impl Into<Value>) -> Self {
        Arg::Value {
            value: value.into(),
        }
    }

    pub fn column(name: &str) -> Self {
        Arg::Property(Property::parse(name))
    }

    pub fn and(args: Vec<Arg>) -> Self {
        Arg::Scope(LogicalOperatorScope::with(LogicalOperator::And, args))
    }

    pub fn or(args: Vec<Arg>) -> Self {
        Arg::Scope(LogicalOperatorScope::with(LogicalOperator::Or, args))
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Arg::Value {
                value: Value::String(s),
            } => Some(s),
            _ => None,
        }
    }
}

/// One typed DSL call.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Operation {
    pub syntax: QuerySyntax,
    #[serde(default)]
    pub args: Vec<Arg>,
}

impl Operation {
    pub fn new(syntax: QuerySyntax, args: Vec<Arg>) -> Self {
        Self { syntax, args }
    }
}

/// Ordered DSL calls describing one query.
pub type Scheme = Vec<Operation>;
