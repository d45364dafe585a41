//! Schema types for ddlsync.
//!
//! This crate holds the in-memory model of a Spanner table: its columns, their
//! logical types, and the parent/child interleave relationship. It is shared by
//! the DDL synthesizer, the differ and the introspector, which all treat these
//! values as immutable snapshots.

use indexmap::IndexMap;
use std::fmt;

pub mod codec;
mod validate;

pub use codec::{DecodedType, decode, encode_native};
pub use validate::ValidationError;

/// Logical column types understood by the reconciler.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ColumnType {
    Bool,
    Int64,
    Float32,
    Float64,
    Numeric,
    String,
    Bytes,
    Date,
    Timestamp,
    Json,
    /// ARRAY<STRING(n)>
    ArrayString,
    /// ARRAY<INT64>
    ArrayInt64,
    /// ARRAY<FLOAT32>
    ArrayFloat32,
    /// ARRAY<FLOAT64>
    ArrayFloat64,
    /// A protocol buffer message or enum; the fully-qualified name lives in
    /// the column's [`ProtoDescriptor`].
    Proto,
    /// Anything the codec does not recognize, kept verbatim.
    Other(String),
}

impl ColumnType {
    /// Parse a logical type token as written by [`fmt::Display`].
    ///
    /// Unknown tokens become [`ColumnType::Other`].
    pub fn parse(token: &str) -> Self {
        match token.trim() {
            "BOOL" => ColumnType::Bool,
            "INT64" => ColumnType::Int64,
            "FLOAT32" => ColumnType::Float32,
            "FLOAT64" => ColumnType::Float64,
            "NUMERIC" => ColumnType::Numeric,
            "STRING" => ColumnType::String,
            "BYTES" => ColumnType::Bytes,
            "DATE" => ColumnType::Date,
            "TIMESTAMP" => ColumnType::Timestamp,
            "JSON" => ColumnType::Json,
            "ARRAY<STRING>" => ColumnType::ArrayString,
            "ARRAY<INT64>" => ColumnType::ArrayInt64,
            "ARRAY<FLOAT32>" => ColumnType::ArrayFloat32,
            "ARRAY<FLOAT64>" => ColumnType::ArrayFloat64,
            "PROTO" | "ENUM" => ColumnType::Proto,
            other => ColumnType::Other(other.to_string()),
        }
    }

    /// Whether this type takes a length (`STRING(n)`, `BYTES(n)`,
    /// `ARRAY<STRING(n)>`).
    pub fn is_sized(&self) -> bool {
        matches!(
            self,
            ColumnType::String | ColumnType::Bytes | ColumnType::ArrayString
        )
    }
}

impl fmt::Display for ColumnType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ColumnType::Bool => write!(f, "BOOL"),
            ColumnType::Int64 => write!(f, "INT64"),
            ColumnType::Float32 => write!(f, "FLOAT32"),
            ColumnType::Float64 => write!(f, "FLOAT64"),
            ColumnType::Numeric => write!(f, "NUMERIC"),
            ColumnType::String => write!(f, "STRING"),
            ColumnType::Bytes => write!(f, "BYTES"),
            ColumnType::Date => write!(f, "DATE"),
            ColumnType::Timestamp => write!(f, "TIMESTAMP"),
            ColumnType::Json => write!(f, "JSON"),
            ColumnType::ArrayString => write!(f, "ARRAY<STRING>"),
            ColumnType::ArrayInt64 => write!(f, "ARRAY<INT64>"),
            ColumnType::ArrayFloat32 => write!(f, "ARRAY<FLOAT32>"),
            ColumnType::ArrayFloat64 => write!(f, "ARRAY<FLOAT64>"),
            ColumnType::Proto => write!(f, "PROTO"),
            ColumnType::Other(raw) => write!(f, "{}", raw),
        }
    }
}

/// Where a serialized `FileDescriptorSet` can be downloaded from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DescriptorSource {
    /// An object-storage URI (`gs://bucket/path`).
    ObjectStorage,
    /// A plain HTTP(S) URL.
    Http,
}

impl DescriptorSource {
    /// The token stored in the metadata table.
    pub fn as_str(&self) -> &'static str {
        match self {
            DescriptorSource::ObjectStorage => "gcs",
            DescriptorSource::Http => "url",
        }
    }

    /// Parse a stored token. Returns `None` for anything unknown.
    pub fn parse(token: &str) -> Option<Self> {
        match token {
            "gcs" => Some(DescriptorSource::ObjectStorage),
            "url" => Some(DescriptorSource::Http),
            _ => None,
        }
    }

    /// Guess the source kind from the location itself.
    pub fn infer(path: &str) -> Self {
        if path.starts_with("gs://") {
            DescriptorSource::ObjectStorage
        } else {
            DescriptorSource::Http
        }
    }
}

impl fmt::Display for DescriptorSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Location of an external descriptor set.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DescriptorSet {
    /// URI or URL of the serialized `FileDescriptorSet`.
    pub path: String,
    /// How to fetch `path`.
    pub source: DescriptorSource,
}

impl DescriptorSet {
    /// Create a descriptor set location, inferring the source kind.
    pub fn new(path: impl Into<String>) -> Self {
        let path = path.into();
        let source = DescriptorSource::infer(&path);
        Self { path, source }
    }
}

/// Protocol buffer details for a PROTO/ENUM column.
///
/// The descriptor bytes themselves are never part of the model: they are
/// fetched again by every operation that registers a proto bundle.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ProtoDescriptor {
    /// Fully-qualified message or enum name, e.g. `music.SingerInfo`.
    pub package: String,
    /// Optional external descriptor set to register before use.
    pub descriptor_set: Option<DescriptorSet>,
}

impl ProtoDescriptor {
    /// A descriptor with no external descriptor set.
    pub fn new(package: impl Into<String>) -> Self {
        Self {
            package: package.into(),
            descriptor_set: None,
        }
    }

    /// Attach an external descriptor set location.
    pub fn with_descriptor_set(mut self, set: DescriptorSet) -> Self {
        self.descriptor_set = Some(set);
        self
    }
}

/// A table column.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Column {
    /// Column name
    pub name: String,
    /// Logical type
    pub column_type: ColumnType,
    /// Length for sized types; `None` means `MAX`
    pub size: Option<u64>,
    /// Numeric precision (metadata only)
    pub precision: Option<u32>,
    /// Numeric scale (metadata only)
    pub scale: Option<u32>,
    /// Whether the column is `NOT NULL`
    pub required: bool,
    /// Default value expression, rendered verbatim inside `DEFAULT (...)`
    pub default_value: Option<String>,
    /// Whether this is part of the primary key
    pub primary_key: bool,
    /// Whether the column is generated from `computation`
    pub computed: bool,
    /// Generation expression for computed columns
    pub computation: Option<String>,
    /// Populated with the commit timestamp on insert (metadata only)
    pub auto_create_time: Option<bool>,
    /// Populated with the commit timestamp on every write
    pub auto_update_time: Option<bool>,
    /// Whether values are generated by a sequence (metadata only)
    pub auto_increment: bool,
    /// Whether values must be unique (metadata only)
    pub unique: bool,
    /// Proto details for PROTO columns
    pub proto: Option<ProtoDescriptor>,
}

impl Column {
    /// Create a nullable column with no constraints.
    pub fn new(name: impl Into<String>, column_type: ColumnType) -> Self {
        Self {
            name: name.into(),
            column_type,
            size: None,
            precision: None,
            scale: None,
            required: false,
            default_value: None,
            primary_key: false,
            computed: false,
            computation: None,
            auto_create_time: None,
            auto_update_time: None,
            auto_increment: false,
            unique: false,
            proto: None,
        }
    }

    /// Set the length of a sized column.
    pub fn sized(mut self, size: u64) -> Self {
        self.size = Some(size);
        self
    }

    /// Mark the column `NOT NULL`.
    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    /// Mark the column as part of the primary key.
    pub fn primary_key(mut self) -> Self {
        self.primary_key = true;
        self
    }

    /// Set a default value expression.
    pub fn default_value(mut self, expr: impl Into<String>) -> Self {
        self.default_value = Some(expr.into());
        self
    }

    /// Make this a computed column.
    pub fn computed(mut self, expr: impl Into<String>) -> Self {
        self.computed = true;
        self.computation = Some(expr.into());
        self
    }

    /// Attach proto details.
    pub fn proto(mut self, proto: ProtoDescriptor) -> Self {
        self.proto = Some(proto);
        self
    }

    /// Set the commit-timestamp-on-write flag.
    pub fn auto_update_time(mut self, enabled: bool) -> Self {
        self.auto_update_time = Some(enabled);
        self
    }

    /// Set the commit-timestamp-on-insert flag.
    pub fn auto_create_time(mut self, enabled: bool) -> Self {
        self.auto_create_time = Some(enabled);
        self
    }

    /// The proto package, if this column has one.
    pub fn proto_package(&self) -> Option<&str> {
        self.proto.as_ref().map(|p| p.package.as_str())
    }

    /// The type as the catalog would report it, e.g. `STRING(255)`.
    pub fn native_type(&self) -> String {
        encode_native(&self.column_type, self.size, self.proto_package())
    }
}

/// Ordered columns of a table.
///
/// Order matters when generating `CREATE TABLE`; equality ignores it.
#[derive(Debug, Clone, Default, Eq)]
pub struct Schema {
    pub columns: Vec<Column>,
}

impl Schema {
    /// Create a schema from columns in declaration order.
    pub fn new(columns: Vec<Column>) -> Self {
        Self { columns }
    }

    /// Get a column by name.
    pub fn get(&self, name: &str) -> Option<&Column> {
        self.columns.iter().find(|c| c.name == name)
    }

    /// Columns keyed by name, preserving declaration order.
    pub fn by_name(&self) -> IndexMap<&str, &Column> {
        self.columns.iter().map(|c| (c.name.as_str(), c)).collect()
    }

    /// Primary key column names in schema order.
    pub fn primary_key(&self) -> Vec<&str> {
        self.columns
            .iter()
            .filter(|c| c.primary_key)
            .map(|c| c.name.as_str())
            .collect()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    pub fn len(&self) -> usize {
        self.columns.len()
    }
}

impl PartialEq for Schema {
    fn eq(&self, other: &Self) -> bool {
        if self.columns.len() != other.columns.len() {
            return false;
        }
        let theirs = other.by_name();
        self.columns
            .iter()
            .all(|c| theirs.get(c.name.as_str()).is_some_and(|o| *o == c))
    }
}

/// What happens to child rows when a parent row is deleted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OnDelete {
    /// No action was declared (`INTERLEAVE IN`).
    #[default]
    Unspecified,
    /// `ON DELETE CASCADE`
    Cascade,
    /// `ON DELETE NO ACTION`
    NoAction,
}

impl OnDelete {
    /// Returns the SQL keyword for this action, or `None` when unspecified.
    pub fn to_sql(&self) -> Option<&'static str> {
        match self {
            OnDelete::Unspecified => None,
            OnDelete::Cascade => Some("CASCADE"),
            OnDelete::NoAction => Some("NO ACTION"),
        }
    }

    /// Parse `INFORMATION_SCHEMA.TABLES.ON_DELETE_ACTION`.
    pub fn parse(action: Option<&str>) -> Self {
        match action.map(str::trim) {
            Some("CASCADE") => OnDelete::Cascade,
            Some("NO ACTION") => OnDelete::NoAction,
            _ => OnDelete::Unspecified,
        }
    }
}

/// A parent/child interleave relationship.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Interleave {
    /// Parent table id
    pub parent: String,
    /// Delete propagation policy
    pub on_delete: OnDelete,
}

/// A table definition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Table {
    /// Fully-qualified table id (`name` or `schema.name`)
    pub name: String,
    /// Columns
    pub schema: Schema,
    /// Interleave parent, if any
    pub interleave: Option<Interleave>,
}

impl Table {
    /// Create a table without an interleave parent.
    pub fn new(name: impl Into<String>, columns: Vec<Column>) -> Self {
        Self {
            name: name.into(),
            schema: Schema::new(columns),
            interleave: None,
        }
    }

    /// Interleave this table in `parent`.
    pub fn interleave_in(mut self, parent: impl Into<String>, on_delete: OnDelete) -> Self {
        self.interleave = Some(Interleave {
            parent: parent.into(),
            on_delete,
        });
        self
    }

    /// Get a column by name.
    pub fn column(&self, name: &str) -> Option<&Column> {
        self.schema.get(name)
    }

    /// Columns that need a descriptor set registered before use.
    pub fn proto_columns(&self) -> impl Iterator<Item = &Column> {
        self.schema.columns.iter().filter(|c| {
            c.proto
                .as_ref()
                .is_some_and(|p| p.descriptor_set.is_some())
        })
    }
}
