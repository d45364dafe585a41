//! Proto bundle registration.
//!
//! PROTO and ENUM columns can only be created once their types are in the
//! database's proto bundle. Columns that name an external descriptor set get
//! their types registered before any table DDL runs.

use crate::client::{DatabaseClient, DdlBatch};
use crate::{DescriptorSet, Error, Result, Table};
use indexmap::{IndexMap, IndexSet};
use prost::Message;
use prost_types::{DescriptorProto, FileDescriptorSet};
use std::collections::HashSet;
use std::future::Future;
use std::pin::Pin;
use tracing::{debug, info};

/// A boxed future returned by [`DescriptorFetcher::fetch`].
pub type FetchFuture<'a> =
    Pin<Box<dyn Future<Output = std::result::Result<Vec<u8>, String>> + Send + 'a>>;

/// Downloads serialized `FileDescriptorSet`s.
///
/// Implementations pick the transport from [`DescriptorSet::source`].
pub trait DescriptorFetcher: Send + Sync {
    fn fetch<'a>(&'a self, set: &'a DescriptorSet) -> FetchFuture<'a>;
}

impl<F: DescriptorFetcher + ?Sized> DescriptorFetcher for &F {
    fn fetch<'a>(&'a self, set: &'a DescriptorSet) -> FetchFuture<'a> {
        (**self).fetch(set)
    }
}

/// A fetcher for deployments without external descriptor sets. Every fetch
/// fails.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoDescriptors;

impl DescriptorFetcher for NoDescriptors {
    fn fetch<'a>(&'a self, set: &'a DescriptorSet) -> FetchFuture<'a> {
        let message = format!("no descriptor fetcher configured for {} source", set.source);
        Box::pin(async move { Err(message) })
    }
}

/// Fully-qualified types already in the database's proto bundle, or `None`
/// when there is no bundle yet.
pub fn bundle_types(ddl: &[String]) -> Option<IndexSet<String>> {
    let stmt = ddl.iter().find(|s| {
        s.trim_start()
            .to_ascii_uppercase()
            .starts_with("CREATE PROTO BUNDLE")
    })?;
    let open = stmt.find('(')?;
    let close = stmt.rfind(')')?;
    let inner = stmt.get(open + 1..close)?;
    Some(
        inner
            .split(',')
            .map(|t| t.trim().trim_matches('`').to_string())
            .filter(|t| !t.is_empty())
            .collect(),
    )
}

/// The statement that adds `types` to the bundle.
pub fn bundle_sql(existing: Option<&IndexSet<String>>, types: &[String]) -> String {
    let list = types.join(", ");
    match existing {
        None => format!("CREATE PROTO BUNDLE ({})", list),
        Some(_) => format!("ALTER PROTO BUNDLE INSERT ({})", list),
    }
}

/// Register the proto types `table` needs.
///
/// Fetches every distinct descriptor set named by the table's columns,
/// concatenates them (a serialized `FileDescriptorSet` merges by
/// concatenation) and submits one bundle statement with the bytes attached.
/// Types already in the bundle are skipped; returns how many were added.
///
/// Every type being added must be defined in the fetched sets, otherwise
/// nothing is submitted and [`Error::InvalidDescriptor`] names the first
/// absent type.
pub async fn register_bundle<C, F>(client: &C, fetcher: &F, table: &Table) -> Result<usize>
where
    C: DatabaseClient,
    F: DescriptorFetcher,
{
    let mut sets: IndexMap<&str, &DescriptorSet> = IndexMap::new();
    let mut wanted: IndexSet<String> = IndexSet::new();
    for col in table.proto_columns() {
        if let Some(proto) = &col.proto
            && let Some(set) = &proto.descriptor_set
        {
            sets.entry(set.path.as_str()).or_insert(set);
            wanted.insert(proto.package.clone());
        }
    }
    if wanted.is_empty() {
        return Ok(0);
    }

    let ddl = client.database_ddl().await?;
    let existing = bundle_types(&ddl);
    let missing: Vec<String> = wanted
        .into_iter()
        .filter(|t| existing.as_ref().is_none_or(|e| !e.contains(t)))
        .collect();
    if missing.is_empty() {
        debug!(table = %table.name, "proto bundle already has every type");
        return Ok(0);
    }

    let mut descriptors = Vec::new();
    let mut defined = HashSet::new();
    for set in sets.values() {
        let bytes = fetcher.fetch(set).await.map_err(|message| Error::Descriptor {
            path: set.path.clone(),
            message,
        })?;
        let decoded = decode_descriptor_set(set, &bytes)?;
        defined.extend(defined_types(&decoded));
        descriptors.extend_from_slice(&bytes);
    }

    if let Some(absent) = missing.iter().find(|t| !defined.contains(t.as_str())) {
        let paths: Vec<&str> = sets.keys().copied().collect();
        return Err(Error::InvalidDescriptor {
            path: paths.join(", "),
            message: format!("type {} is not defined", absent),
        });
    }

    let batch = DdlBatch {
        statements: vec![bundle_sql(existing.as_ref(), &missing)],
        proto_descriptors: Some(descriptors),
    };
    client.update_ddl(&batch).await?;
    info!(
        table = %table.name,
        types = missing.len(),
        sets = sets.len(),
        "registered proto types"
    );
    Ok(missing.len())
}

fn decode_descriptor_set(set: &DescriptorSet, bytes: &[u8]) -> Result<FileDescriptorSet> {
    let decoded = FileDescriptorSet::decode(bytes).map_err(|e| Error::InvalidDescriptor {
        path: set.path.clone(),
        message: e.to_string(),
    })?;
    if decoded.file.is_empty() {
        return Err(Error::InvalidDescriptor {
            path: set.path.clone(),
            message: "descriptor set has no files".to_string(),
        });
    }
    Ok(decoded)
}

/// Fully-qualified names of every message and enum in `set`, nested ones
/// included.
pub fn defined_types(set: &FileDescriptorSet) -> HashSet<String> {
    fn qualify(scope: &str, name: &str) -> String {
        if scope.is_empty() {
            name.to_string()
        } else {
            format!("{}.{}", scope, name)
        }
    }

    fn message(scope: &str, msg: &DescriptorProto, out: &mut HashSet<String>) {
        let full = qualify(scope, msg.name());
        for nested in &msg.nested_type {
            message(&full, nested, out);
        }
        for e in &msg.enum_type {
            out.insert(qualify(&full, e.name()));
        }
        out.insert(full);
    }

    let mut out = HashSet::new();
    for file in &set.file {
        for msg in &file.message_type {
            message(file.package(), msg, &mut out);
        }
        for e in &file.enum_type {
            out.insert(qualify(file.package(), e.name()));
        }
    }
    out
}
