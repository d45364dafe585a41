//! Native type codec.
//!
//! Spanner's catalog reports column types as strings like `STRING(255)`,
//! `ARRAY<STRING(MAX)>` or `PROTO<music.SingerInfo>`. [`decode`] turns those into
//! a logical [`ColumnType`] plus the size and proto package they carry.
//!
//! ```
//! use ddlsync_schema::{ColumnType, decode};
//!
//! let t = decode("ARRAY<STRING(100)>");
//! assert_eq!(t.kind, ColumnType::ArrayString);
//! assert_eq!(t.size, Some(100));
//! ```

use crate::ColumnType;

/// The logical view of a native type string.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodedType {
    pub kind: ColumnType,
    /// Length of a sized type; `None` for `MAX` or unsized types.
    pub size: Option<u64>,
    /// Fully-qualified proto name for `PROTO<..>` and `ENUM<..>`.
    pub proto_package: Option<String>,
}

impl DecodedType {
    fn plain(kind: ColumnType) -> Self {
        Self {
            kind,
            size: None,
            proto_package: None,
        }
    }
}

/// Decode a native type string.
///
/// Strings that don't match the supported grammar come back as
/// [`ColumnType::Other`] holding the input unchanged.
pub fn decode(native: &str) -> DecodedType {
    let trimmed = native.trim();

    if let Some(inner) = wrapped(trimmed, "ARRAY<STRING(", ")>") {
        if let Some(size) = parse_length(inner) {
            return DecodedType {
                kind: ColumnType::ArrayString,
                size,
                proto_package: None,
            };
        }
    } else if let Some(inner) = wrapped(trimmed, "STRING(", ")") {
        if let Some(size) = parse_length(inner) {
            return DecodedType {
                kind: ColumnType::String,
                size,
                proto_package: None,
            };
        }
    } else if let Some(inner) = wrapped(trimmed, "BYTES(", ")") {
        if let Some(size) = parse_length(inner) {
            return DecodedType {
                kind: ColumnType::Bytes,
                size,
                proto_package: None,
            };
        }
    } else if let Some(package) =
        wrapped(trimmed, "PROTO<", ">").or_else(|| wrapped(trimmed, "ENUM<", ">"))
    {
        if !package.is_empty() {
            return DecodedType {
                kind: ColumnType::Proto,
                size: None,
                proto_package: Some(package.to_string()),
            };
        }
    } else {
        match trimmed {
            "ARRAY<INT64>" => return DecodedType::plain(ColumnType::ArrayInt64),
            "ARRAY<FLOAT32>" => return DecodedType::plain(ColumnType::ArrayFloat32),
            "ARRAY<FLOAT64>" => return DecodedType::plain(ColumnType::ArrayFloat64),
            "BOOL" => return DecodedType::plain(ColumnType::Bool),
            "INT64" => return DecodedType::plain(ColumnType::Int64),
            "FLOAT32" => return DecodedType::plain(ColumnType::Float32),
            "FLOAT64" => return DecodedType::plain(ColumnType::Float64),
            "NUMERIC" => return DecodedType::plain(ColumnType::Numeric),
            "DATE" => return DecodedType::plain(ColumnType::Date),
            "TIMESTAMP" => return DecodedType::plain(ColumnType::Timestamp),
            "JSON" => return DecodedType::plain(ColumnType::Json),
            _ => {}
        }
    }

    DecodedType::plain(ColumnType::Other(native.to_string()))
}

/// Render a logical type back into the catalog's native form.
///
/// Sized types without a size render as `(MAX)`. `PROTO` always renders as
/// `PROTO<..>`, since the catalog reports enums and messages the same way once
/// decoded.
pub fn encode_native(kind: &ColumnType, size: Option<u64>, proto_package: Option<&str>) -> String {
    let length = || match size {
        Some(n) => n.to_string(),
        None => "MAX".to_string(),
    };
    match kind {
        ColumnType::String => format!("STRING({})", length()),
        ColumnType::Bytes => format!("BYTES({})", length()),
        ColumnType::ArrayString => format!("ARRAY<STRING({})>", length()),
        ColumnType::Proto => match proto_package {
            Some(package) => format!("PROTO<{}>", package),
            None => "PROTO".to_string(),
        },
        other => other.to_string(),
    }
}

fn wrapped<'a>(s: &'a str, prefix: &str, suffix: &str) -> Option<&'a str> {
    s.strip_prefix(prefix)?.strip_suffix(suffix)
}

/// `MAX` → `Some(None)`, a positive integer → `Some(Some(n))`, anything else
/// → `None`.
fn parse_length(inner: &str) -> Option<Option<u64>> {
    let inner = inner.trim();
    if inner.eq_ignore_ascii_case("MAX") {
        return Some(None);
    }
    match inner.parse::<u64>() {
        Ok(0) | Err(_) => None,
        Ok(n) => Some(Some(n)),
    }
}
