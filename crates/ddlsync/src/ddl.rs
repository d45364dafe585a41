//! DDL synthesis.
//!
//! Turns [`Table`] and [`Column`] snapshots into GoogleSQL statements. Every
//! function here is pure; nothing touches the database.

use crate::{Column, ColumnType, Table, ValidationError};
use ddlsync_sql::quote_ident;

/// Render the type token of a column, including its size.
///
/// PROTO columns render as their fully-qualified proto name. Sized types
/// without a size render as `(MAX)`.
pub fn column_type_sql(col: &Column) -> String {
    let length = match col.size {
        Some(n) => n.to_string(),
        None => "MAX".to_string(),
    };
    match &col.column_type {
        ColumnType::Proto => col
            .proto_package()
            .map(str::to_string)
            .unwrap_or_else(|| col.column_type.to_string()),
        ColumnType::String | ColumnType::Bytes => {
            format!("{}({})", col.column_type, length)
        }
        ColumnType::ArrayString => format!("ARRAY<STRING({})>", length),
        other => other.to_string(),
    }
}

/// Generate the column definition used by `CREATE TABLE` and `ADD COLUMN`.
///
/// Fails if the column is computed but has no expression.
pub fn column_sql(col: &Column) -> Result<String, ValidationError> {
    let mut def = format!("{} {}", quote_ident(&col.name), column_type_sql(col));

    if col.required {
        def.push_str(" NOT NULL");
    }

    if col.computed {
        let expr = col
            .computation_expr()
            .ok_or_else(|| ValidationError::MissingComputation {
                column: col.name.clone(),
            })?;
        def.push_str(&format!(" AS ({})", expr));
    }

    if let Some(default) = &col.default_value {
        def.push_str(&format!(" DEFAULT ({})", default));
    }

    // auto_create_time is tracked in metadata only and never rendered.
    if col.column_type == ColumnType::Timestamp
        && let Some(allow) = col.auto_update_time
    {
        def.push_str(&format!(" OPTIONS (allow_commit_timestamp={})", allow));
    }

    Ok(def)
}

/// Generate a `CREATE TABLE` statement.
pub fn create_table_sql(table: &Table) -> Result<String, ValidationError> {
    let columns = table
        .schema
        .columns
        .iter()
        .map(column_sql)
        .collect::<Result<Vec<_>, _>>()?;

    let mut sql = format!("CREATE TABLE {} ({})", table.name, columns.join(", "));

    let pk_columns: Vec<String> = table
        .schema
        .primary_key()
        .into_iter()
        .map(quote_ident)
        .collect();
    if !pk_columns.is_empty() {
        sql.push_str(&format!(" PRIMARY KEY ({})", pk_columns.join(", ")));
    }

    if let Some(interleave) = &table.interleave {
        match interleave.on_delete.to_sql() {
            None => sql.push_str(&format!(", INTERLEAVE IN {}", interleave.parent)),
            Some(action) => sql.push_str(&format!(
                ", INTERLEAVE IN PARENT {} ON DELETE {}",
                interleave.parent, action
            )),
        }
    }

    Ok(sql)
}

/// Generate a `DROP TABLE` statement.
pub fn drop_table_sql(table: &Table) -> String {
    format!("DROP TABLE {}", table.name)
}

/// Generate `ALTER TABLE .. ADD COLUMN`.
pub fn add_column_sql(table: &str, col: &Column) -> Result<String, ValidationError> {
    Ok(format!("ALTER TABLE {} ADD COLUMN {}", table, column_sql(col)?))
}

/// Generate `ALTER TABLE .. DROP COLUMN`.
pub fn drop_column_sql(table: &str, column: &str) -> String {
    format!("ALTER TABLE {} DROP COLUMN {}", table, quote_ident(column))
}

/// Generate an `ALTER COLUMN` that restates the column's type, size and
/// nullability.
pub fn alter_column_type_sql(table: &str, col: &Column) -> String {
    let not_null = if col.required { " NOT NULL" } else { "" };
    format!(
        "ALTER TABLE {} ALTER COLUMN {} {}{}",
        table,
        quote_ident(&col.name),
        column_type_sql(col),
        not_null
    )
}

/// Generate `ALTER COLUMN .. SET DEFAULT (..)`.
pub fn set_default_sql(table: &str, column: &str, expr: &str) -> String {
    format!(
        "ALTER TABLE {} ALTER COLUMN {} SET DEFAULT ({})",
        table,
        quote_ident(column),
        expr
    )
}

/// Generate `ALTER COLUMN .. DROP DEFAULT`.
pub fn drop_default_sql(table: &str, column: &str) -> String {
    format!(
        "ALTER TABLE {} ALTER COLUMN {} DROP DEFAULT",
        table,
        quote_ident(column)
    )
}
