use crate::client::ClientError;
use crate::config::ConfigError;
use ddlsync_schema::ValidationError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("invalid table definition: {0}")]
    Validation(#[from] ValidationError),

    #[error("table '{table}' not found")]
    TableNotFound { table: String },

    #[error("database error: {0}")]
    Client(#[from] ClientError),

    #[error("failed to fetch descriptor set {path}: {message}")]
    Descriptor { path: String, message: String },

    #[error("invalid descriptor set {path}: {message}")]
    InvalidDescriptor { path: String, message: String },

    #[error(transparent)]
    Config(#[from] ConfigError),
}

impl Error {
    /// Whether this is the distinct "table does not exist" outcome.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Error::TableNotFound { .. })
    }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
