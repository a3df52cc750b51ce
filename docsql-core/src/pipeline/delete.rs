//! DELETE: remove matched rows, or only the listed columns of them.

use std::collections::BTreeMap;

use serde_json::{Map, Value};

use crate::context::QueryContext;
use crate::error::DocsqlResult;
use crate::store::DocumentStore;
use crate::types::Property;

use super::{matched_rows, primary_table, write_back};

pub(super) async fn run(context: &QueryContext, store: &dyn DocumentStore) -> DocsqlResult<Value> {
    primary_table(context, "DELETE")?;
    let whole_rows = context.properties.is_empty() || context.properties.iter().any(Property::is_all);

    let mut updates: BTreeMap<String, Map<String, Value>> = BTreeMap::new();
    for (table, rows) in matched_rows(context, store).await? {
        let columns: Vec<&Property> = context
            .properties
            .iter()
            .filter(|p| p.table_name().map_or(true, |t| t == table))
            .collect();
        let document = updates.entry(table).or_default();
        for mut row in rows {
            if whole_rows {
                document.insert(row.key, Value::Null);
            } else if !columns.is_empty() {
                for column in &columns {
                    row.content.remove(&column.name);
                }
                document.insert(row.key, Value::Object(row.content));
            }
        }
    }

    write_back(store, updates).await?;
    Ok(Value::Bool(true))
}
