//! Schema diffing - compare a desired table against what the database has.
//!
//! [`plan`] compares two [`Table`] snapshots with the same id and produces the
//! column-level [`Change`]s needed to turn the observed table into the desired
//! one:
//!
//! - columns only in the observed table are dropped
//! - columns only in the desired table are added
//! - columns in both that don't [`columns_match`] get at most two `ALTER COLUMN`
//!   statements (type/size/nullability, and default value)
//!
//! Drops are ordered so computed columns go first, since a computed column may
//! reference the columns being dropped alongside it.
//!
//! Only nullable → required emits a statement. Going from required back to
//! nullable is currently not planned at all.

use crate::ddl;
use crate::{Column, DescriptorSource, Table, ValidationError};
use std::fmt;

/// A single column-level schema change.
#[derive(Debug, Clone, PartialEq)]
pub enum Change {
    /// Add a new column.
    AddColumn(Column),
    /// Drop an existing column (the observed definition).
    DropColumn(Column),
    /// Restate a column's type to change its size or make it `NOT NULL`.
    AlterColumnType {
        /// The desired definition.
        column: Column,
        from_size: Option<u64>,
        from_required: bool,
    },
    /// Change a column's default value.
    AlterColumnDefault {
        name: String,
        from: Option<String>,
        to: Option<String>,
    },
}

impl Change {
    /// Generate the SQL statement for this change.
    pub fn to_sql(&self, table: &str) -> Result<String, ValidationError> {
        match self {
            Change::AddColumn(col) => ddl::add_column_sql(table, col),
            Change::DropColumn(col) => Ok(ddl::drop_column_sql(table, &col.name)),
            Change::AlterColumnType { column, .. } => {
                Ok(ddl::alter_column_type_sql(table, column))
            }
            Change::AlterColumnDefault { name, to, .. } => Ok(match to {
                Some(expr) => ddl::set_default_sql(table, name, expr),
                None => ddl::drop_default_sql(table, name),
            }),
        }
    }

    /// Name of the column this change touches.
    pub fn column_name(&self) -> &str {
        match self {
            Change::AddColumn(col) | Change::DropColumn(col) => &col.name,
            Change::AlterColumnType { column, .. } => &column.name,
            Change::AlterColumnDefault { name, .. } => name,
        }
    }

    pub fn is_drop(&self) -> bool {
        matches!(self, Change::DropColumn(_))
    }
}

impl fmt::Display for Change {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Change::AddColumn(col) => {
                let not_null = if col.required { " (not null)" } else { "" };
                write!(f, "+ {}: {}{}", col.name, col.native_type(), not_null)
            }
            Change::DropColumn(col) => {
                let computed = if col.computed { " (computed)" } else { "" };
                write!(f, "- {}{}", col.name, computed)
            }
            Change::AlterColumnType {
                column,
                from_size,
                from_required,
            } => {
                let size = |s: &Option<u64>| s.map_or("MAX".to_string(), |n| n.to_string());
                let null = |required: bool| if required { "not null" } else { "nullable" };
                write!(
                    f,
                    "~ {}: size {} -> {}, {} -> {}",
                    column.name,
                    size(from_size),
                    size(&column.size),
                    null(*from_required),
                    null(column.required)
                )
            }
            Change::AlterColumnDefault { name, from, to } => {
                let from_str = from.as_deref().unwrap_or("(none)");
                let to_str = to.as_deref().unwrap_or("(none)");
                write!(f, "~ {} default: {} -> {}", name, from_str, to_str)
            }
        }
    }
}

/// The changes needed to converge one table.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TablePlan {
    /// Table id.
    pub table: String,
    /// Drops (computed first), then adds, then alterations.
    pub changes: Vec<Change>,
}

impl TablePlan {
    /// Returns true if there are no differences.
    pub fn is_empty(&self) -> bool {
        self.changes.is_empty()
    }

    /// Observed definitions of the columns being dropped, computed first.
    pub fn dropped_columns(&self) -> Vec<&Column> {
        self.changes
            .iter()
            .filter_map(|c| match c {
                Change::DropColumn(col) => Some(col),
                _ => None,
            })
            .collect()
    }

    /// `DROP COLUMN` statements, computed columns first.
    pub fn drop_statements(&self) -> Vec<String> {
        self.dropped_columns()
            .into_iter()
            .map(|col| ddl::drop_column_sql(&self.table, &col.name))
            .collect()
    }

    /// `ADD COLUMN` and `ALTER COLUMN` statements.
    pub fn apply_statements(&self) -> Result<Vec<String>, ValidationError> {
        self.changes
            .iter()
            .filter(|c| !c.is_drop())
            .map(|c| c.to_sql(&self.table))
            .collect()
    }

    /// Every statement in plan order.
    pub fn statements(&self) -> Result<Vec<String>, ValidationError> {
        self.changes.iter().map(|c| c.to_sql(&self.table)).collect()
    }
}

impl fmt::Display for TablePlan {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_empty() {
            writeln!(f, "{}: no changes", self.table)
        } else {
            writeln!(f, "{}:", self.table)?;
            for change in &self.changes {
                writeln!(f, "  {}", change)?;
            }
            Ok(())
        }
    }
}

/// Plan the changes that turn `observed` into `desired`.
///
/// Both tables are expected to have the same id; the plan uses the desired
/// id in its statements.
pub fn plan(desired: &Table, observed: &Table) -> TablePlan {
    let desired_cols = desired.schema.by_name();
    let observed_cols = observed.schema.by_name();

    let mut drops: Vec<Change> = observed
        .schema
        .columns
        .iter()
        .filter(|c| !desired_cols.contains_key(c.name.as_str()))
        .map(|c| Change::DropColumn(c.clone()))
        .collect();
    // Stable sort: computed columns first, otherwise observed order.
    drops.sort_by_key(|c| match c {
        Change::DropColumn(col) => !col.computed,
        _ => true,
    });

    let mut changes = drops;

    for col in &desired.schema.columns {
        if !observed_cols.contains_key(col.name.as_str()) {
            changes.push(Change::AddColumn(col.clone()));
        }
    }

    for desired_col in &desired.schema.columns {
        if let Some(observed_col) = observed_cols.get(desired_col.name.as_str())
            && !columns_match(desired_col, observed_col)
        {
            changes.extend(diff_column(desired_col, observed_col));
        }
    }

    TablePlan {
        table: desired.name.clone(),
        changes,
    }
}

/// Structural equality over the attributes the reconciler manages.
///
/// Precision, scale, auto-increment and uniqueness are not compared.
pub fn columns_match(a: &Column, b: &Column) -> bool {
    fn descriptor(c: &Column) -> Option<(&str, Option<(&str, DescriptorSource)>)> {
        c.proto.as_ref().map(|p| {
            (
                p.package.as_str(),
                p.descriptor_set.as_ref().map(|s| (s.path.as_str(), s.source)),
            )
        })
    }

    a.name == b.name
        && a.column_type == b.column_type
        && a.primary_key == b.primary_key
        && a.computed == b.computed
        && a.computation == b.computation
        && a.auto_create_time == b.auto_create_time
        && a.auto_update_time == b.auto_update_time
        && a.size == b.size
        && a.required == b.required
        && a.default_value == b.default_value
        && descriptor(a) == descriptor(b)
}

/// Alterations for a column present on both sides.
///
/// Emits at most one type/size statement and one default statement.
pub fn diff_column(desired: &Column, observed: &Column) -> Vec<Change> {
    let mut changes = Vec::new();

    let size_changed = desired.column_type.is_sized() && desired.size != observed.size;
    let became_required = desired.required && !observed.required;
    if size_changed || became_required {
        changes.push(Change::AlterColumnType {
            column: desired.clone(),
            from_size: observed.size,
            from_required: observed.required,
        });
    }

    if desired.default_value != observed.default_value {
        changes.push(Change::AlterColumnDefault {
            name: desired.name.clone(),
            from: observed.default_value.clone(),
            to: desired.default_value.clone(),
        });
    }

    changes
}
