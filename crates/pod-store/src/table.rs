//! Row and constraint rules shared by every store
//!
//! A table is loaded as [`TableData`], mutated here, and written back by the
//! store that owns it. Primary keys are the PK column values joined with "/".

use crate::error::StoreError;
use crate::filter::{matches_all, Filter};
use crate::schema::TableSpec;
use crate::store::{Row, WriteOp};
use serde_json::Value;
use std::collections::{BTreeMap, HashMap};

pub(crate) type Schema = HashMap<&'static str, TableSpec>;

/// Tables touched by one write, by name
pub(crate) type Tables = BTreeMap<String, TableData>;

#[derive(Debug, Clone, Default, PartialEq)]
pub(crate) struct TableData {
    pub(crate) rows: BTreeMap<String, Row>,
    pub(crate) next_id: i64,
}

pub(crate) fn schema_of(tables: Vec<TableSpec>) -> Schema {
    tables.into_iter().map(|t| (t.name, t)).collect()
}

pub(crate) fn spec<'a>(schema: &'a Schema, table: &str) -> Result<&'a TableSpec, StoreError> {
    schema
        .get(table)
        .ok_or_else(|| StoreError::UnknownTable(table.to_string()))
}

pub(crate) fn duplicate(spec: &TableSpec, constraint: &str) -> StoreError {
    StoreError::DuplicateEntry {
        table: spec.name.to_string(),
        constraint: constraint.to_string(),
    }
}

fn scalar(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

pub(crate) fn key_of(spec: &TableSpec, row: &Row) -> Result<String, StoreError> {
    let mut parts = Vec::with_capacity(spec.primary_key.len());
    for col in spec.primary_key {
        match row.get(*col) {
            None | Some(Value::Null) => {
                return Err(StoreError::InvalidRow(format!(
                    "{} row missing primary key column {}",
                    spec.name, col
                )));
            }
            Some(value) => parts.push(scalar(value)),
        }
    }
    Ok(parts.join("/"))
}

/// Values of a constraint's columns; `None` if any is NULL (never conflicts).
fn constraint_values(row: &Row, cols: &[&str]) -> Option<Vec<Value>> {
    cols.iter()
        .map(|c| match row.get(*c) {
            None | Some(Value::Null) => None,
            Some(v) => Some(v.clone()),
        })
        .collect()
}

fn check_unique(
    spec: &TableSpec,
    data: &TableData,
    row: &Row,
    skip_key: Option<&str>,
) -> Result<(), StoreError> {
    for cols in spec.unique {
        let Some(values) = constraint_values(row, cols) else {
            continue;
        };
        let clash = data.rows.iter().any(|(key, other)| {
            Some(key.as_str()) != skip_key && constraint_values(other, cols).as_ref() == Some(&values)
        });
        if clash {
            return Err(duplicate(spec, &cols.join(", ")));
        }
    }
    Ok(())
}

pub(crate) fn insert(spec: &TableSpec, data: &mut TableData, mut row: Row) -> Result<Row, StoreError> {
    if spec.auto_increment {
        if let Some(col) = spec.primary_key.first() {
            match row.get(*col) {
                None | Some(Value::Null) => {
                    data.next_id += 1;
                    row.insert((*col).to_string(), Value::from(data.next_id));
                }
                Some(Value::Number(n)) => {
                    if let Some(explicit) = n.as_i64() {
                        data.next_id = data.next_id.max(explicit);
                    }
                }
                Some(_) => {}
            }
        }
    }

    let key = key_of(spec, &row)?;
    if data.rows.contains_key(&key) {
        return Err(duplicate(spec, &spec.primary_key_label()));
    }
    check_unique(spec, data, &row, None)?;
    data.rows.insert(key, row.clone());
    Ok(row)
}

pub(crate) fn update_row(
    spec: &TableSpec,
    data: &mut TableData,
    id: &str,
    values: Row,
) -> Result<Row, StoreError> {
    if spec.primary_key.len() != 1 {
        return Err(StoreError::InvalidRow(format!(
            "{} has a composite primary key; update by id is not supported",
            spec.name
        )));
    }
    let mut merged = data
        .rows
        .get(id)
        .cloned()
        .ok_or_else(|| StoreError::NotFound(format!("{} {}", spec.name, id)))?;
    merged.extend(values);

    if key_of(spec, &merged)? != id {
        return Err(StoreError::InvalidRow(format!(
            "primary key of {} {} cannot change",
            spec.name, id
        )));
    }
    check_unique(spec, data, &merged, Some(id))?;
    data.rows.insert(id.to_string(), merged.clone());
    Ok(merged)
}

pub(crate) fn delete_rows(data: &mut TableData, filters: &[Filter]) -> u64 {
    let before = data.rows.len();
    data.rows.retain(|_, row| !matches_all(filters, row));
    (before - data.rows.len()) as u64
}

/// Apply one batched write to already loaded tables
pub(crate) fn apply(schema: &Schema, tables: &mut Tables, op: WriteOp) -> Result<(), StoreError> {
    match op {
        WriteOp::Create { table, row } => {
            let spec = spec(schema, &table)?;
            insert(spec, tables.entry(table).or_default(), row)?;
        }
        WriteOp::Update { table, id, values } => {
            let spec = spec(schema, &table)?;
            update_row(spec, tables.entry(table).or_default(), &id, values)?;
        }
        WriteOp::Delete { table, filters } => {
            spec(schema, &table)?;
            delete_rows(tables.entry(table).or_default(), &filters);
        }
    }
    Ok(())
}

/// Name of the table a batched write targets
pub(crate) fn target(op: &WriteOp) -> &str {
    match op {
        WriteOp::Create { table, .. } | WriteOp::Update { table, .. } | WriteOp::Delete { table, .. } => {
            table
        }
    }
}
