//! Rebuild a [`Table`] from the live catalog and the metadata store.

use crate::client::{DatabaseClient, Params, Row, Value};
use crate::meta::MetadataStore;
use crate::{Column, Error, Interleave, OnDelete, Result, Table, decode};
use ddlsync_sql::TablePath;
use tracing::{debug, warn};

const COLUMNS_SQL: &str = "SELECT COLUMN_NAME, SPANNER_TYPE, IS_NULLABLE, COLUMN_DEFAULT, \
     IS_GENERATED, GENERATION_EXPRESSION, ORDINAL_POSITION \
     FROM INFORMATION_SCHEMA.COLUMNS \
     WHERE TABLE_SCHEMA = @schema AND TABLE_NAME = @table \
     ORDER BY ORDINAL_POSITION";

const PRIMARY_KEY_SQL: &str = "SELECT COLUMN_NAME \
     FROM INFORMATION_SCHEMA.INDEX_COLUMNS \
     WHERE TABLE_SCHEMA = @schema AND TABLE_NAME = @table AND INDEX_TYPE = 'PRIMARY_KEY' \
     ORDER BY ORDINAL_POSITION";

const TABLE_SQL: &str = "SELECT PARENT_TABLE_NAME, INTERLEAVE_TYPE, ON_DELETE_ACTION \
     FROM INFORMATION_SCHEMA.TABLES \
     WHERE TABLE_SCHEMA = @schema AND TABLE_NAME = @table";

fn table_params(path: &TablePath<'_>) -> Params {
    vec![
        ("schema".to_string(), Value::from(path.schema)),
        ("table".to_string(), Value::from(path.name)),
    ]
}

/// Look up `table` in the catalog, preferring metadata records per column.
///
/// A metadata store that can't be read is logged and skipped.
///
/// Returns [`Error::TableNotFound`] when the catalog has no such table.
pub async fn introspect<C: DatabaseClient>(
    client: &C,
    store: &MetadataStore,
    table: &str,
) -> Result<Table> {
    let path = TablePath::parse(table);
    let params = table_params(&path);

    let tables = client.query(TABLE_SQL, &params).await?;
    let Some(table_row) = tables.first() else {
        return Err(Error::TableNotFound {
            table: table.to_string(),
        });
    };
    let interleave = interleave_from_row(&path, table_row)?;

    let primary_key: Vec<String> = client
        .query(PRIMARY_KEY_SQL, &params)
        .await?
        .iter()
        .map(|row| row.str("COLUMN_NAME").map(str::to_string))
        .collect::<std::result::Result<_, _>>()?;

    let rows = client.query(COLUMNS_SQL, &params).await?;
    let records = match store.get(client, table).await {
        Ok(records) => records,
        Err(e) => {
            warn!(table, error = %e, "metadata unavailable, using catalog only");
            Default::default()
        }
    };

    let mut columns = Vec::with_capacity(rows.len());
    for row in &rows {
        let mut catalog = column_from_row(row)?;
        catalog.primary_key = primary_key.iter().any(|pk| *pk == catalog.name);

        let column = match records.get(&catalog.name) {
            Some(record) => record.to_column(&catalog.name, Some(&catalog)),
            None => catalog,
        };
        columns.push(column);
    }
    debug!(
        table,
        columns = columns.len(),
        tracked = records.len(),
        "introspected table"
    );

    Ok(Table {
        name: table.to_string(),
        schema: crate::Schema::new(columns),
        interleave,
    })
}

/// A column as the catalog alone describes it.
pub fn column_from_row(row: &Row) -> Result<Column> {
    let name = row.str("COLUMN_NAME")?;
    let native = row.str("SPANNER_TYPE")?;
    let decoded = decode(native);

    let mut col = Column::new(name, decoded.kind);
    col.size = decoded.size;
    if let Some(package) = decoded.proto_package {
        col.proto = Some(crate::ProtoDescriptor::new(package));
    }
    col.required = row.opt_str("IS_NULLABLE")? == Some("NO");
    col.default_value = row.opt_str("COLUMN_DEFAULT")?.map(str::to_string);
    if row.opt_str("IS_GENERATED")? == Some("ALWAYS") {
        col.computed = true;
        col.computation = row.opt_str("GENERATION_EXPRESSION")?.map(str::to_string);
    }
    Ok(col)
}

fn interleave_from_row(path: &TablePath<'_>, row: &Row) -> Result<Option<Interleave>> {
    let Some(parent) = row.opt_str("PARENT_TABLE_NAME")?.filter(|p| !p.is_empty()) else {
        return Ok(None);
    };
    let parent = TablePath {
        schema: path.schema,
        name: parent,
    }
    .to_string();

    let on_delete = match row.opt_str("INTERLEAVE_TYPE")? {
        Some("IN") => OnDelete::Unspecified,
        _ => OnDelete::parse(row.opt_str("ON_DELETE_ACTION")?),
    };
    Ok(Some(Interleave { parent, on_delete }))
}
