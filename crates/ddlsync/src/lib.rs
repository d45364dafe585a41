//! Declarative table reconciliation for Cloud Spanner (GoogleSQL dialect).
//!
//! Describe a table as a [`Table`] value, hand it to a [`TableManager`], and
//! the manager works out the schema-change statements that turn the live
//! table into the described one:
//!
//! ```ignore
//! let manager = TableManager::new(client);
//! let singers = Table::new(
//!     "Singers",
//!     vec![
//!         Column::new("SingerId", ColumnType::Int64).primary_key().required(),
//!         Column::new("Name", ColumnType::String).sized(255),
//!     ],
//! );
//! manager.update(&singers, true).await?;
//! ```
//!
//! The pure parts ([`ddl`], [`diff`], and the codec in [`decode`] /
//! [`encode_native`]) never touch the network and can be used on their own,
//! for example to print a [`TablePlan`] before applying it.
//!
//! Facts the catalog can't report (computed expressions, descriptor set
//! locations, commit-timestamp flags) are kept in a metadata table managed by
//! [`meta::MetadataStore`]; it is created on first use.

mod client;
pub mod config;
pub mod ddl;
pub mod diff;
mod error;
mod introspect;
mod manager;
pub mod meta;
pub mod proto;
pub mod retry;
mod traced;

pub use client::{ClientError, ClientFuture, DatabaseClient, DdlBatch, Params, Row, Value};
pub use config::{Config, ConfigError};
pub use diff::{Change, TablePlan};
pub use error::{Error, Result};
pub use introspect::column_from_row;
pub use manager::TableManager;
pub use meta::{ColumnMetadata, MetadataStore};
pub use proto::{DescriptorFetcher, FetchFuture, NoDescriptors};
pub use traced::TracedClient;

// Re-export the model so callers only need this crate.
pub use ddlsync_schema::{
    Column, ColumnType, DecodedType, DescriptorSet, DescriptorSource, Interleave, OnDelete,
    ProtoDescriptor, Schema, Table, ValidationError, decode, encode_native,
};
