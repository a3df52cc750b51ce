//! UPDATE: merge the SET object into every matched row.

use std::collections::BTreeMap;

use serde_json::{Map, Value};

use crate::context::QueryContext;
use crate::error::{DocsqlError, DocsqlResult};
use crate::store::DocumentStore;

use super::{matched_rows, primary_table, write_back};

pub(super) async fn run(context: &QueryContext, store: &dyn DocumentStore) -> DocsqlResult<Value> {
    primary_table(context, "UPDATE")?;
    let set = context
        .set
        .as_ref()
        .ok_or_else(|| DocsqlError::MalformedPlan("UPDATE has no SET".to_string()))?;

    let mut updates: BTreeMap<String, Map<String, Value>> = BTreeMap::new();
    for (table, rows) in matched_rows(context, store).await? {
        let document = updates.entry(table).or_default();
        for mut row in rows {
            for (field, value) in set {
                if value.is_null() {
                    row.content.remove(field);
                } else {
                    row.content.insert(field.clone(), value.clone());
                }
            }
            document.insert(row.key, Value::Object(row.content));
        }
    }

    write_back(store, updates).await?;
    Ok(Value::Bool(true))
}
