//! Desired-state validation.
//!
//! Runs before anything is sent to the database, so a rejected table never
//! leaves partial side effects behind.

use crate::{Column, ColumnType, Table};
use std::collections::HashSet;
use thiserror::Error;

/// A table or column definition that cannot be turned into DDL.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("table '{table}' has no columns")]
    NoColumns { table: String },

    #[error("invalid table name '{table}'")]
    InvalidTableName { table: String },

    #[error("invalid column name '{column}'")]
    InvalidColumnName { column: String },

    #[error("column '{column}' is declared more than once")]
    DuplicateColumn { column: String },

    #[error("column '{column}' has no type")]
    MissingType { column: String },

    #[error("column '{column}' is a PROTO column but has no proto package")]
    MissingProtoPackage { column: String },

    #[error("column '{column}' is computed but has no computation expression")]
    MissingComputation { column: String },

    #[error("column '{column}' has size 0; use a positive size or MAX")]
    InvalidSize { column: String },
}

impl Table {
    /// Check every invariant the synthesizer relies on.
    pub fn validate(&self) -> Result<(), ValidationError> {
        // At most `schema.table`.
        if self.name.split('.').count() > 2
            || !self.name.split('.').all(ddlsync_sql::is_valid_ident)
        {
            return Err(ValidationError::InvalidTableName {
                table: self.name.clone(),
            });
        }
        if self.schema.is_empty() {
            return Err(ValidationError::NoColumns {
                table: self.name.clone(),
            });
        }

        let mut seen = HashSet::new();
        for column in &self.schema.columns {
            column.validate()?;
            if !seen.insert(column.name.as_str()) {
                return Err(ValidationError::DuplicateColumn {
                    column: column.name.clone(),
                });
            }
        }
        Ok(())
    }
}

impl Column {
    /// Check the invariants of a single column.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if !ddlsync_sql::is_valid_ident(&self.name) {
            return Err(ValidationError::InvalidColumnName {
                column: self.name.clone(),
            });
        }

        if let ColumnType::Other(raw) = &self.column_type
            && raw.trim().is_empty()
        {
            return Err(ValidationError::MissingType {
                column: self.name.clone(),
            });
        }

        if self.column_type == ColumnType::Proto
            && self.proto_package().is_none_or(|p| p.trim().is_empty())
        {
            return Err(ValidationError::MissingProtoPackage {
                column: self.name.clone(),
            });
        }

        if self.computed && self.computation_expr().is_none() {
            return Err(ValidationError::MissingComputation {
                column: self.name.clone(),
            });
        }

        if self.column_type.is_sized() && self.size == Some(0) {
            return Err(ValidationError::InvalidSize {
                column: self.name.clone(),
            });
        }

        Ok(())
    }

    /// The computation expression, if present and non-blank.
    pub fn computation_expr(&self) -> Option<&str> {
        self.computation
            .as_deref()
            .filter(|expr| !expr.trim().is_empty())
    }
}
