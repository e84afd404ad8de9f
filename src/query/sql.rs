// Copyright 2024 Kore Ledger
// SPDX-License-Identifier: AGPL-3.0-or-later

//! # SQL statements.
//!
//! Builds parameterised SQL (SQLite dialect) for a model. Identifiers come from the model
//! definition and are quoted; every value is bound as a parameter.

use serde_json::Value;

use crate::{
    error::EazyError,
    model::{Column, FieldKind, ModelDef, SqlParam, PRIMARY_KEY},
    utils::quote,
};

use super::{Comparison, Condition, Filter, SortKey, Window};

/// SQL text with its positional parameters.
#[derive(Debug, Clone, PartialEq)]
pub struct Statement {
    pub sql: String,
    pub params: Vec<SqlParam>,
}

/// Filter selecting the record with primary key `id`.
pub fn by_id(id: i64) -> Filter {
    Filter::Condition(Condition {
        column: PRIMARY_KEY.to_owned(),
        comparison: Comparison::Eq,
        value: Value::from(id),
    })
}

/// `SELECT` of every column.
pub fn select(
    model: &ModelDef,
    filter: Option<&Filter>,
    sort: &[SortKey],
    window: Option<Window>,
) -> Result<Statement, EazyError> {
    let columns: Vec<String> = model.columns().map(|c| quote(c.name())).collect();
    let mut sql = format!(
        "SELECT {} FROM {}",
        columns.join(", "),
        quote(&model.table_name())
    );
    let mut params = vec![];
    push_where(model, filter, &mut sql, &mut params)?;
    if !sort.is_empty() {
        let keys = sort
            .iter()
            .map(|key| order_term(model, key))
            .collect::<Result<Vec<_>, _>>()?;
        sql.push_str(" ORDER BY ");
        sql.push_str(&keys.join(", "));
    }
    if let Some(window) = window {
        sql.push_str(" LIMIT ? OFFSET ?");
        params.push(SqlParam::Integer(clamp(window.limit)));
        params.push(SqlParam::Integer(clamp(window.offset)));
    }
    Ok(Statement { sql, params })
}

/// `SELECT COUNT(*)`.
pub fn count(model: &ModelDef, filter: Option<&Filter>) -> Result<Statement, EazyError> {
    let mut sql = format!("SELECT COUNT(*) FROM {}", quote(&model.table_name()));
    let mut params = vec![];
    push_where(model, filter, &mut sql, &mut params)?;
    Ok(Statement { sql, params })
}

/// `SELECT EXISTS(...)`.
pub fn exists(model: &ModelDef, filter: Option<&Filter>) -> Result<Statement, EazyError> {
    let mut inner = format!("SELECT 1 FROM {}", quote(&model.table_name()));
    let mut params = vec![];
    push_where(model, filter, &mut inner, &mut params)?;
    Ok(Statement {
        sql: format!("SELECT EXISTS({inner})"),
        params,
    })
}

/// `INSERT` of already encoded values.
pub fn insert(model: &ModelDef, values: Vec<(String, SqlParam)>) -> Statement {
    let table = quote(&model.table_name());
    if values.is_empty() {
        return Statement {
            sql: format!("INSERT INTO {table} DEFAULT VALUES"),
            params: vec![],
        };
    }
    let (columns, params): (Vec<String>, Vec<SqlParam>) = values
        .into_iter()
        .map(|(column, value)| (quote(&column), value))
        .unzip();
    let placeholders = vec!["?"; columns.len()].join(", ");
    Statement {
        sql: format!(
            "INSERT INTO {table} ({}) VALUES ({placeholders})",
            columns.join(", ")
        ),
        params,
    }
}

/// `UPDATE` of already encoded values on the records matching `filter`.
pub fn update(
    model: &ModelDef,
    changes: Vec<(String, SqlParam)>,
    filter: Option<&Filter>,
) -> Result<Statement, EazyError> {
    if changes.is_empty() {
        return Err(EazyError::validation("No fields to update"));
    }
    let mut assignments = Vec::with_capacity(changes.len());
    let mut params = Vec::with_capacity(changes.len());
    for (column, value) in changes {
        assignments.push(format!("{} = ?", quote(&column)));
        params.push(value);
    }
    let mut sql = format!(
        "UPDATE {} SET {}",
        quote(&model.table_name()),
        assignments.join(", ")
    );
    push_where(model, filter, &mut sql, &mut params)?;
    Ok(Statement { sql, params })
}

/// `DELETE` of the records matching `filter`.
pub fn delete(model: &ModelDef, filter: Option<&Filter>) -> Result<Statement, EazyError> {
    let mut sql = format!("DELETE FROM {}", quote(&model.table_name()));
    let mut params = vec![];
    push_where(model, filter, &mut sql, &mut params)?;
    Ok(Statement { sql, params })
}

fn push_where(
    model: &ModelDef,
    filter: Option<&Filter>,
    sql: &mut String,
    params: &mut Vec<SqlParam>,
) -> Result<(), EazyError> {
    if let Some(filter) = filter.filter(|filter| !filter.is_empty()) {
        if let Some(clause) = compile(model, filter, params)? {
            sql.push_str(" WHERE ");
            sql.push_str(&clause);
        }
    }
    Ok(())
}

fn compile(
    model: &ModelDef,
    filter: &Filter,
    params: &mut Vec<SqlParam>,
) -> Result<Option<String>, EazyError> {
    match filter {
        Filter::And(children) => join(model, children, false, params),
        Filter::Or(children) => join(model, children, true, params),
        Filter::Condition(condition) => condition_sql(model, condition, params).map(Some),
    }
}

fn join(
    model: &ModelDef,
    children: &[Filter],
    disjunction: bool,
    params: &mut Vec<SqlParam>,
) -> Result<Option<String>, EazyError> {
    let mut clauses = vec![];
    let mut bound = vec![];
    let mut unrestricted = false;
    for child in children {
        match compile(model, child, &mut bound)? {
            Some(clause) => clauses.push(clause),
            None => unrestricted = true,
        }
    }
    // One unrestricted branch makes the whole disjunction match everything.
    if unrestricted && disjunction {
        return Ok(None);
    }
    params.append(&mut bound);
    let separator = if disjunction { " OR " } else { " AND " };
    Ok(match clauses.len() {
        0 => None,
        1 => clauses.pop(),
        _ => Some(format!("({})", clauses.join(separator))),
    })
}

fn condition_sql(
    model: &ModelDef,
    condition: &Condition,
    params: &mut Vec<SqlParam>,
) -> Result<String, EazyError> {
    let column = resolve(model, &condition.column)?;
    let name = quote(column.name());
    let value = &condition.value;
    let operator = match condition.comparison {
        Comparison::Eq if value.is_null() => return Ok(format!("{name} IS NULL")),
        Comparison::Ne if value.is_null() => return Ok(format!("{name} IS NOT NULL")),
        Comparison::Ne => {
            params.push(operand(column, value));
            return Ok(format!("({name} <> ? OR {name} IS NULL)"));
        }
        Comparison::In | Comparison::Nin => {
            let negated = condition.comparison == Comparison::Nin;
            let key = if negated { "$nin" } else { "$in" };
            let items = value.as_array().ok_or_else(|| {
                EazyError::invalid_query(format!("Value for {key} should be of type list"))
            })?;
            if items.is_empty() {
                return Ok(if negated { "1 = 1" } else { "0 = 1" }.to_owned());
            }
            let has_null = items.iter().any(Value::is_null);
            let values: Vec<&Value> = items.iter().filter(|item| !item.is_null()).collect();
            if values.is_empty() {
                return Ok(if negated {
                    format!("{name} IS NOT NULL")
                } else {
                    format!("{name} IS NULL")
                });
            }
            params.extend(values.iter().map(|item| operand(column, item)));
            let placeholders = vec!["?"; values.len()].join(", ");
            return Ok(match (negated, has_null) {
                (true, true) => {
                    format!("({name} NOT IN ({placeholders}) AND {name} IS NOT NULL)")
                }
                (true, false) => format!("({name} NOT IN ({placeholders}) OR {name} IS NULL)"),
                (false, true) => format!("({name} IN ({placeholders}) OR {name} IS NULL)"),
                (false, false) => format!("{name} IN ({placeholders})"),
            });
        }
        _ if value.is_null() => {
            return Err(EazyError::invalid_query(format!(
                "Cannot compare {} with null",
                condition.column
            )))
        }
        Comparison::Eq => "=",
        Comparison::Gt => ">",
        Comparison::Gte => ">=",
        Comparison::Lt => "<",
        Comparison::Lte => "<=",
    };
    params.push(operand(column, value));
    Ok(format!("{name} {operator} ?"))
}

fn order_term(model: &ModelDef, key: &SortKey) -> Result<String, EazyError> {
    let column = resolve(model, key.column())?;
    let direction = if key.descending { "DESC" } else { "ASC" };
    let subkeys = &key.path[1..];
    if subkeys.is_empty() {
        return Ok(format!("{} {direction}", quote(column.name())));
    }
    if column.kind() != FieldKind::Json {
        return Err(EazyError::invalid_query(format!(
            "Field {} of model {} has no subkeys",
            column.name(),
            model.name
        )));
    }
    Ok(format!(
        "json_extract({}, '$.{}') {direction}",
        quote(column.name()),
        subkeys.join(".")
    ))
}

fn resolve<'a>(model: &'a ModelDef, name: &str) -> Result<Column<'a>, EazyError> {
    model.column(name).ok_or_else(|| {
        EazyError::invalid_query(format!("Unknown field {name} for model {}", model.name))
    })
}

/// JSON columns compare against the stored JSON text.
fn operand(column: Column<'_>, value: &Value) -> SqlParam {
    match (column.kind(), value) {
        (_, Value::Null) => SqlParam::Null,
        (FieldKind::Json, value) => SqlParam::Text(value.to_string()),
        (_, value) => SqlParam::from_json(value),
    }
}

fn clamp(value: u64) -> i64 {
    i64::try_from(value).unwrap_or(i64::MAX)
}
