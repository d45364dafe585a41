//! Column metadata shadow table.
//!
//! The catalog can't tell us everything about a column (whether it's
//! computed from an expression we declared, which descriptor set a proto
//! came from, commit-timestamp flags, ...). Those facts live in a side table
//! keyed by `(table_name, column_name)`, one string per attribute, where the
//! literal `"nil"` means "not tracked".
//!
//! The side table is created on first use. Several reconcilers may race to
//! create it, so provisioning retries with backoff.

use crate::client::{ClientError, DatabaseClient, DdlBatch, Params, Row, Value};
use crate::retry::Backoff;
use crate::{Column, ColumnType, DescriptorSet, DescriptorSource, ProtoDescriptor};
use ddlsync_sql::quote_ident;
use indexmap::IndexMap;
use std::sync::atomic::{AtomicBool, Ordering};

/// Stored in place of an attribute that isn't tracked.
pub const NIL: &str = "nil";

/// Value columns of the metadata table, in storage order.
pub const FIELDS: [&str; 16] = [
    "type",
    "size",
    "precision",
    "scale",
    "required",
    "auto_increment",
    "unique",
    "auto_create_time",
    "auto_update_time",
    "default_value",
    "is_primary_key",
    "is_computed",
    "computation_ddl",
    "proto_package",
    "file_descriptor_set_path",
    "file_descriptor_set_path_source",
];

/// Semantic facts about one column. `None` is stored as `"nil"`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ColumnMetadata {
    pub column_type: Option<ColumnType>,
    pub size: Option<u64>,
    pub precision: Option<u32>,
    pub scale: Option<u32>,
    pub required: Option<bool>,
    pub auto_increment: Option<bool>,
    pub unique: Option<bool>,
    pub auto_create_time: Option<bool>,
    pub auto_update_time: Option<bool>,
    pub default_value: Option<String>,
    pub is_primary_key: Option<bool>,
    pub is_computed: Option<bool>,
    pub computation_ddl: Option<String>,
    pub proto_package: Option<String>,
    pub file_descriptor_set_path: Option<String>,
    pub file_descriptor_set_path_source: Option<DescriptorSource>,
}

impl ColumnMetadata {
    /// Capture what a declared column says about itself.
    pub fn from_column(col: &Column) -> Self {
        let set = col.proto.as_ref().and_then(|p| p.descriptor_set.as_ref());
        Self {
            column_type: Some(col.column_type.clone()),
            size: col.size,
            precision: col.precision,
            scale: col.scale,
            required: Some(col.required),
            auto_increment: Some(col.auto_increment),
            unique: Some(col.unique),
            auto_create_time: col.auto_create_time,
            auto_update_time: col.auto_update_time,
            default_value: col.default_value.clone(),
            is_primary_key: Some(col.primary_key),
            is_computed: Some(col.computed),
            computation_ddl: col.computation.clone(),
            proto_package: col.proto_package().map(str::to_string),
            file_descriptor_set_path: set.map(|s| s.path.clone()),
            file_descriptor_set_path_source: set.map(|s| s.source),
        }
    }

    /// Build the column this record describes.
    ///
    /// Every tracked field wins. Untracked fields resolve to `None`/`false`,
    /// except the type and proto package, which fall back to `catalog` (the
    /// column decoded from the native type) when given.
    pub fn to_column(&self, name: &str, catalog: Option<&Column>) -> Column {
        let column_type = self
            .column_type
            .clone()
            .or_else(|| catalog.map(|c| c.column_type.clone()))
            .unwrap_or_else(|| ColumnType::Other(String::new()));

        let mut col = Column::new(name, column_type);
        col.size = self.size;
        col.precision = self.precision;
        col.scale = self.scale;
        col.required = self.required.unwrap_or(false);
        col.auto_increment = self.auto_increment.unwrap_or(false);
        col.unique = self.unique.unwrap_or(false);
        col.auto_create_time = self.auto_create_time;
        col.auto_update_time = self.auto_update_time;
        col.default_value = self.default_value.clone();
        col.primary_key = self.is_primary_key.unwrap_or(false);
        col.computed = self.is_computed.unwrap_or(false);
        col.computation = self.computation_ddl.clone();

        let package = self
            .proto_package
            .clone()
            .or_else(|| catalog.and_then(|c| c.proto_package().map(str::to_string)));
        col.proto = package.map(|package| {
            let mut proto = ProtoDescriptor::new(package);
            if let Some(path) = &self.file_descriptor_set_path {
                let mut set = DescriptorSet::new(path.clone());
                if let Some(source) = self.file_descriptor_set_path_source {
                    set.source = source;
                }
                proto.descriptor_set = Some(set);
            }
            proto
        });

        col
    }

    /// Stored strings, in [`FIELDS`] order.
    pub fn encode(&self) -> [String; 16] {
        fn s<T: ToString>(v: &Option<T>) -> String {
            v.as_ref().map_or_else(|| NIL.to_string(), T::to_string)
        }
        [
            s(&self.column_type),
            s(&self.size),
            s(&self.precision),
            s(&self.scale),
            s(&self.required),
            s(&self.auto_increment),
            s(&self.unique),
            s(&self.auto_create_time),
            s(&self.auto_update_time),
            s(&self.default_value),
            s(&self.is_primary_key),
            s(&self.is_computed),
            s(&self.computation_ddl),
            s(&self.proto_package),
            s(&self.file_descriptor_set_path),
            s(&self.file_descriptor_set_path_source),
        ]
    }

    /// Decode a metadata row. Missing, NULL and `"nil"` cells are untracked;
    /// cells that don't parse are treated the same way.
    pub fn from_row(row: &Row) -> Result<Self, ClientError> {
        let field = |name: &str| -> Result<Option<String>, ClientError> {
            let value = match row.get(name) {
                None => None,
                Some(_) => row.opt_str(name)?,
            };
            Ok(value.filter(|v| *v != NIL).map(str::to_string))
        };
        let num = |name: &str| -> Result<Option<u64>, ClientError> {
            Ok(field(name)?.and_then(|v| v.parse().ok()))
        };
        let small = |name: &str| -> Result<Option<u32>, ClientError> {
            Ok(field(name)?.and_then(|v| v.parse().ok()))
        };
        let flag = |name: &str| -> Result<Option<bool>, ClientError> {
            Ok(field(name)?.and_then(|v| v.parse().ok()))
        };

        Ok(Self {
            column_type: field("type")?.map(|t| ColumnType::parse(&t)),
            size: num("size")?,
            precision: small("precision")?,
            scale: small("scale")?,
            required: flag("required")?,
            auto_increment: flag("auto_increment")?,
            unique: flag("unique")?,
            auto_create_time: flag("auto_create_time")?,
            auto_update_time: flag("auto_update_time")?,
            default_value: field("default_value")?,
            is_primary_key: flag("is_primary_key")?,
            is_computed: flag("is_computed")?,
            computation_ddl: field("computation_ddl")?,
            proto_package: field("proto_package")?,
            file_descriptor_set_path: field("file_descriptor_set_path")?,
            file_descriptor_set_path_source: field("file_descriptor_set_path_source")?
                .and_then(|s| DescriptorSource::parse(&s)),
        })
    }
}

/// `CREATE TABLE IF NOT EXISTS` for the metadata table.
pub fn create_metadata_table_sql(meta_table: &str) -> String {
    let mut columns = vec![
        format!("{} STRING(MAX) NOT NULL", quote_ident("table_name")),
        format!("{} STRING(MAX) NOT NULL", quote_ident("column_name")),
    ];
    columns.extend(
        FIELDS
            .iter()
            .map(|f| format!("{} STRING(MAX)", quote_ident(f))),
    );
    format!(
        "CREATE TABLE IF NOT EXISTS {} ({}) PRIMARY KEY ({}, {})",
        meta_table,
        columns.join(", "),
        quote_ident("table_name"),
        quote_ident("column_name")
    )
}

fn select_sql(meta_table: &str) -> String {
    let fields: Vec<String> = FIELDS.iter().map(|f| quote_ident(f)).collect();
    format!(
        "SELECT {}, {} FROM {} WHERE {} = @table_name",
        quote_ident("column_name"),
        fields.join(", "),
        meta_table,
        quote_ident("table_name")
    )
}

fn upsert_sql(meta_table: &str) -> String {
    let mut columns = vec![quote_ident("table_name"), quote_ident("column_name")];
    columns.extend(FIELDS.iter().map(|f| quote_ident(f)));
    let mut params = vec!["@table_name".to_string(), "@column_name".to_string()];
    params.extend(FIELDS.iter().map(|f| format!("@{}", f)));
    format!(
        "INSERT OR UPDATE INTO {} ({}) VALUES ({})",
        meta_table,
        columns.join(", "),
        params.join(", ")
    )
}

fn delete_columns_sql(meta_table: &str) -> String {
    format!(
        "DELETE FROM {} WHERE {} = @table_name AND {} IN UNNEST(@columns)",
        meta_table,
        quote_ident("table_name"),
        quote_ident("column_name")
    )
}

fn delete_all_sql(meta_table: &str) -> String {
    format!(
        "DELETE FROM {} WHERE {} = @table_name",
        meta_table,
        quote_ident("table_name")
    )
}

/// Reads and writes [`ColumnMetadata`] rows.
#[derive(Debug)]
pub struct MetadataStore {
    table: String,
    backoff: Backoff,
    provisioned: AtomicBool,
}

impl MetadataStore {
    pub fn new(table: impl Into<String>, backoff: Backoff) -> Self {
        Self {
            table: table.into(),
            backoff,
            provisioned: AtomicBool::new(false),
        }
    }

    pub fn from_config(config: &ddlsync_config::Config) -> Self {
        Self::new(config.metadata_table(), Backoff::from_config(config))
    }

    /// Name of the backing table.
    pub fn table(&self) -> &str {
        &self.table
    }

    /// Create the backing table if this store hasn't done so yet.
    pub async fn ensure_table<C: DatabaseClient>(&self, client: &C) -> Result<(), ClientError> {
        if self.provisioned.load(Ordering::Acquire) {
            return Ok(());
        }
        let batch = DdlBatch::new(vec![create_metadata_table_sql(&self.table)]);
        self.backoff
            .retry("provision metadata table", || client.update_ddl(&batch))
            .await?;
        self.provisioned.store(true, Ordering::Release);
        Ok(())
    }

    /// All records for `table`, keyed by column name.
    pub async fn get<C: DatabaseClient>(
        &self,
        client: &C,
        table: &str,
    ) -> Result<IndexMap<String, ColumnMetadata>, ClientError> {
        self.ensure_table(client).await?;
        let sql = select_sql(&self.table);
        let params: Params = vec![("table_name".to_string(), Value::from(table))];
        let rows = client.query(&sql, &params).await?;

        let mut records = IndexMap::new();
        for row in &rows {
            let column = row.str("column_name")?.to_string();
            records.insert(column, ColumnMetadata::from_row(row)?);
        }
        Ok(records)
    }

    /// Insert or overwrite the records for `columns`.
    pub async fn upsert<C: DatabaseClient>(
        &self,
        client: &C,
        table: &str,
        columns: &[Column],
    ) -> Result<(), ClientError> {
        self.ensure_table(client).await?;
        let sql = upsert_sql(&self.table);
        for col in columns {
            let mut params: Params = vec![
                ("table_name".to_string(), Value::from(table)),
                ("column_name".to_string(), Value::from(col.name.as_str())),
            ];
            let values = ColumnMetadata::from_column(col).encode();
            params.extend(
                FIELDS
                    .iter()
                    .zip(values)
                    .map(|(f, v)| (f.to_string(), Value::String(v))),
            );
            client.execute(&sql, &params).await?;
        }
        Ok(())
    }

    /// Remove the records for the named columns.
    pub async fn delete<C: DatabaseClient>(
        &self,
        client: &C,
        table: &str,
        columns: &[String],
    ) -> Result<u64, ClientError> {
        if columns.is_empty() {
            return Ok(0);
        }
        self.ensure_table(client).await?;
        let sql = delete_columns_sql(&self.table);
        let params: Params = vec![
            ("table_name".to_string(), Value::from(table)),
            ("columns".to_string(), Value::from(columns.to_vec())),
        ];
        client.execute(&sql, &params).await
    }

    /// Remove every record for `table`.
    pub async fn delete_all<C: DatabaseClient>(
        &self,
        client: &C,
        table: &str,
    ) -> Result<u64, ClientError> {
        self.ensure_table(client).await?;
        let sql = delete_all_sql(&self.table);
        let params: Params = vec![("table_name".to_string(), Value::from(table))];
        client.execute(&sql, &params).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn proto_column() -> Column {
        Column::new("info", ColumnType::Proto).proto(
            ProtoDescriptor::new("music.SingerInfo")
                .with_descriptor_set(DescriptorSet::new("https://example.com/music.pb")),
        )
    }

    #[test]
    fn test_encode_uses_nil_for_untracked() {
        let col = Column::new("name", ColumnType::String).sized(255);
        let encoded = ColumnMetadata::from_column(&col).encode();
        let by_field: IndexMap<&str, &str> =
            FIELDS.iter().copied().zip(encoded.iter().map(String::as_str)).collect();

        assert_eq!(by_field["type"], "STRING");
        assert_eq!(by_field["size"], "255");
        assert_eq!(by_field["precision"], NIL);
        assert_eq!(by_field["required"], "false");
        assert_eq!(by_field["auto_update_time"], NIL);
        assert_eq!(by_field["computation_ddl"], NIL);
        assert_eq!(by_field["file_descriptor_set_path_source"], NIL);
    }

    #[test]
    fn test_row_round_trip_preserves_column() {
        let col = proto_column().required().auto_create_time(true);
        let mut row = Row::new().with("column_name", "info");
        for (field, value) in FIELDS.iter().zip(ColumnMetadata::from_column(&col).encode()) {
            row = row.with(*field, value);
        }

        let record = ColumnMetadata::from_row(&row).unwrap();
        assert_eq!(record.file_descriptor_set_path_source, Some(DescriptorSource::Http));
        assert_eq!(record.to_column("info", None), col);
    }

    #[test]
    fn test_nil_type_falls_back_to_catalog() {
        let record = ColumnMetadata {
            required: Some(true),
            ..Default::default()
        };
        let catalog = Column::new("info", ColumnType::Proto).proto(ProtoDescriptor::new("music.Info"));

        let col = record.to_column("info", Some(&catalog));
        assert_eq!(col.column_type, ColumnType::Proto);
        assert_eq!(col.proto_package(), Some("music.Info"));
        assert!(col.required);
    }

    #[test]
    fn test_tracked_fields_override_catalog() {
        let record = ColumnMetadata {
            column_type: Some(ColumnType::String),
            size: None,
            default_value: None,
            ..Default::default()
        };
        let catalog = Column::new("name", ColumnType::String)
            .sized(10)
            .default_value("'x'");

        let col = record.to_column("name", Some(&catalog));
        assert_eq!(col.size, None);
        assert_eq!(col.default_value, None);
    }

    #[test]
    fn test_from_row_treats_null_and_garbage_as_untracked() {
        let row = Row::new()
            .with("column_name", "n")
            .with("type", "INT64")
            .with("size", "lots")
            .with("required", Value::Null)
            .with("unique", NIL);
        let record = ColumnMetadata::from_row(&row).unwrap();
        assert_eq!(record.column_type, Some(ColumnType::Int64));
        assert_eq!(record.size, None);
        assert_eq!(record.required, None);
        assert_eq!(record.unique, None);
    }

    #[test]
    fn test_metadata_sql() {
        insta::assert_snapshot!(
            delete_columns_sql("ddlsync_column_metadata"),
            @"DELETE FROM ddlsync_column_metadata WHERE `table_name` = @table_name AND `column_name` IN UNNEST(@columns)"
        );
        insta::assert_snapshot!(
            create_metadata_table_sql("meta"),
            @"CREATE TABLE IF NOT EXISTS meta (`table_name` STRING(MAX) NOT NULL, `column_name` STRING(MAX) NOT NULL, `type` STRING(MAX), `size` STRING(MAX), `precision` STRING(MAX), `scale` STRING(MAX), `required` STRING(MAX), `auto_increment` STRING(MAX), `unique` STRING(MAX), `auto_create_time` STRING(MAX), `auto_update_time` STRING(MAX), `default_value` STRING(MAX), `is_primary_key` STRING(MAX), `is_computed` STRING(MAX), `computation_ddl` STRING(MAX), `proto_package` STRING(MAX), `file_descriptor_set_path` STRING(MAX), `file_descriptor_set_path_source` STRING(MAX)) PRIMARY KEY (`table_name`, `column_name`)"
        );
    }
}
