//! The remote database, as seen by the reconciler.
//!
//! Session management, long-running-operation polling and transport are
//! owned by whoever implements [`DatabaseClient`]; this crate only needs the
//! four calls below.

use indexmap::IndexMap;
use std::future::Future;
use std::pin::Pin;
use thiserror::Error;

/// A boxed future returned by [`DatabaseClient`] methods.
pub type ClientFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T, ClientError>> + Send + 'a>>;

/// Failure reported by the remote database.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ClientError {
    /// The call reached the service and was rejected.
    #[error("{code}: {message}")]
    Status { code: String, message: String },

    /// The call never completed (connection reset, deadline exceeded, ...).
    #[error("transport error: {0}")]
    Transport(String),

    /// A result row did not have the expected shape.
    #[error("column '{column}': {reason}")]
    Decode { column: String, reason: String },
}

impl ClientError {
    /// Shorthand for a [`ClientError::Status`].
    pub fn status(code: impl Into<String>, message: impl Into<String>) -> Self {
        ClientError::Status {
            code: code.into(),
            message: message.into(),
        }
    }
}

/// A query parameter or result cell.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    /// NULL
    Null,

    /// BOOL
    Bool(bool),

    /// INT64
    Int64(i64),

    /// STRING
    String(String),

    /// ARRAY<STRING>
    StringArray(Vec<String>),
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Bool(v)
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Int64(v)
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::String(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::String(v.to_owned())
    }
}

impl From<Vec<String>> for Value {
    fn from(v: Vec<String>) -> Self {
        Value::StringArray(v)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        match v {
            Some(v) => v.into(),
            None => Value::Null,
        }
    }
}

/// Named query parameters (`@name` in GoogleSQL).
pub type Params = Vec<(String, Value)>;

/// A result row as column name → value pairs.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Row {
    cells: IndexMap<String, Value>,
}

impl Row {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert, mostly for fakes and fixtures.
    pub fn with(mut self, column: impl Into<String>, value: impl Into<Value>) -> Self {
        self.cells.insert(column.into(), value.into());
        self
    }

    pub fn get(&self, column: &str) -> Option<&Value> {
        self.cells.get(column)
    }

    /// Read a nullable STRING cell. A missing column is a decode error.
    pub fn opt_str(&self, column: &str) -> Result<Option<&str>, ClientError> {
        match self.cell(column)? {
            Value::Null => Ok(None),
            Value::String(s) => Ok(Some(s)),
            other => Err(wrong_type(column, "STRING", other)),
        }
    }

    /// Read a non-null STRING cell.
    pub fn str(&self, column: &str) -> Result<&str, ClientError> {
        self.opt_str(column)?.ok_or_else(|| ClientError::Decode {
            column: column.to_string(),
            reason: "unexpected NULL".to_string(),
        })
    }

    fn cell(&self, column: &str) -> Result<&Value, ClientError> {
        self.cells.get(column).ok_or_else(|| ClientError::Decode {
            column: column.to_string(),
            reason: "missing from result row".to_string(),
        })
    }
}

fn wrong_type(column: &str, expected: &str, actual: &Value) -> ClientError {
    ClientError::Decode {
        column: column.to_string(),
        reason: format!("expected {}, got {:?}", expected, actual),
    }
}

/// One `UpdateDatabaseDdl` request.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DdlBatch {
    /// Statements, applied in order.
    pub statements: Vec<String>,
    /// Serialized `FileDescriptorSet` for proto bundle statements.
    pub proto_descriptors: Option<Vec<u8>>,
}

impl DdlBatch {
    pub fn new(statements: Vec<String>) -> Self {
        Self {
            statements,
            proto_descriptors: None,
        }
    }
}

/// Remote calls the reconciler makes.
///
/// Every call is single-attempt from the reconciler's point of view; retry
/// policy belongs to the implementation.
pub trait DatabaseClient: Send + Sync {
    /// Run a read-only query.
    fn query<'a>(&'a self, sql: &'a str, params: &'a Params) -> ClientFuture<'a, Vec<Row>>;

    /// Run a DML statement, returning the number of rows affected.
    fn execute<'a>(&'a self, sql: &'a str, params: &'a Params) -> ClientFuture<'a, u64>;

    /// Submit a DDL batch and wait for the schema change to finish.
    fn update_ddl<'a>(&'a self, batch: &'a DdlBatch) -> ClientFuture<'a, ()>;

    /// Fetch the database's current DDL statements.
    fn database_ddl(&self) -> ClientFuture<'_, Vec<String>>;
}

impl<C: DatabaseClient + ?Sized> DatabaseClient for &C {
    fn query<'a>(&'a self, sql: &'a str, params: &'a Params) -> ClientFuture<'a, Vec<Row>> {
        (**self).query(sql, params)
    }

    fn execute<'a>(&'a self, sql: &'a str, params: &'a Params) -> ClientFuture<'a, u64> {
        (**self).execute(sql, params)
    }

    fn update_ddl<'a>(&'a self, batch: &'a DdlBatch) -> ClientFuture<'a, ()> {
        (**self).update_ddl(batch)
    }

    fn database_ddl(&self) -> ClientFuture<'_, Vec<String>> {
        (**self).database_ddl()
    }
}
