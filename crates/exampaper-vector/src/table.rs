//! LanceDB connection helpers and the index metadata table.
//!
//! The metadata table is a small key/value store describing how an index was
//! built (embedder id, dimension, record count, build time). It is written
//! once per build and read back when the index is reopened.
use anyhow::{anyhow, Result};
use arrow_array::{RecordBatch, RecordBatchIterator, StringArray, TimestampMillisecondArray};
use chrono::Utc;
use futures::TryStreamExt;
use lancedb::query::ExecutableQuery;
use lancedb::{connect, Connection};
use std::collections::BTreeMap;
use std::sync::Arc;

use crate::schema::build_meta_schema;

pub async fn open_db(uri: &str) -> Result<Connection> {
    Ok(connect(uri).execute().await?)
}

pub async fn table_exists(conn: &Connection, name: &str) -> Result<bool> {
    Ok(conn.table_names().execute().await?.iter().any(|n| n == name))
}

/// Upsert `entries` into the metadata table, creating it on first use.
pub async fn write_meta(conn: &Connection, table: &str, entries: &[(&str, String)]) -> Result<()> {
    if entries.is_empty() {
        return Ok(());
    }
    let now = Utc::now().timestamp_millis();
    let batch = RecordBatch::try_new(
        build_meta_schema(),
        vec![
            Arc::new(StringArray::from_iter_values(entries.iter().map(|(k, _)| *k))),
            Arc::new(StringArray::from_iter_values(entries.iter().map(|(_, v)| v.as_str()))),
            Arc::new(TimestampMillisecondArray::from(vec![now; entries.len()])),
        ],
    )?;
    let reader = Box::new(RecordBatchIterator::new(vec![Ok(batch)].into_iter(), build_meta_schema()));

    if table_exists(conn, table).await? {
        let t = conn.open_table(table).execute().await?;
        let mut merge = t.merge_insert(&["key"]);
        merge.when_matched_update_all(None).when_not_matched_insert_all();
        merge.execute(reader).await?;
    } else {
        conn.create_table(table, reader).execute().await?;
    }
    Ok(())
}

/// Every key/value pair in the metadata table; empty when the table is absent.
pub async fn read_meta(conn: &Connection, table: &str) -> Result<BTreeMap<String, String>> {
    let mut meta = BTreeMap::new();
    if !table_exists(conn, table).await? {
        return Ok(meta);
    }
    let t = conn.open_table(table).execute().await?;
    let mut stream = t.query().execute().await?;
    while let Some(batch) = stream.try_next().await? {
        let column = |name: &str| {
            batch
                .column_by_name(name)
                .and_then(|c| c.as_any().downcast_ref::<StringArray>())
                .ok_or_else(|| anyhow!("meta.{name} column missing"))
        };
        let (keys, values) = (column("key")?, column("value")?);
        for i in 0..batch.num_rows() {
            meta.insert(keys.value(i).to_string(), values.value(i).to_string());
        }
    }
    Ok(meta)
}

/// Escape a value for use inside a single-quoted SQL string literal.
pub fn escape_literal(value: &str) -> String {
    value.replace('\'', "''")
}
