//! An in-memory stand-in for a Spanner database.
//!
//! Catalog rows are derived from [`Table`] values the test installs or
//! stages; a staged table becomes live when DDL for it is applied. The
//! metadata table is emulated from DML parameters.

#![allow(dead_code)]

use ddlsync::{
    ClientError, ClientFuture, DatabaseClient, DdlBatch, DescriptorFetcher, DescriptorSet,
    FetchFuture, Params, Row, Table, Value,
};
use prost::Message;
use prost_types::{DescriptorProto, EnumDescriptorProto, FileDescriptorProto, FileDescriptorSet};
use std::collections::HashMap;
use std::sync::Mutex;

pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

#[derive(Default)]
struct State {
    live: HashMap<String, Table>,
    staged: HashMap<String, Table>,
    metadata: HashMap<(String, String), Row>,
    meta_table_exists: bool,
    batches: Vec<DdlBatch>,
    ddl: Vec<String>,
    provision_calls: u32,
}

#[derive(Default)]
pub struct FakeSpanner {
    state: Mutex<State>,
    provision_failures: u32,
    fail_metadata_writes: bool,
}

impl FakeSpanner {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fail this many metadata-table provisioning attempts before succeeding.
    pub fn with_provision_failures(mut self, failures: u32) -> Self {
        self.provision_failures = failures;
        self
    }

    /// Reject every metadata DML statement.
    pub fn failing_metadata_writes(mut self) -> Self {
        self.fail_metadata_writes = true;
        self
    }

    /// Make `table` exist right away.
    pub fn install(&self, table: Table) {
        let mut state = self.state.lock().unwrap();
        state.live.insert(table.name.clone(), table);
    }

    /// The catalog `table.name` will report once DDL touches it.
    pub fn stage(&self, table: Table) {
        let mut state = self.state.lock().unwrap();
        state.staged.insert(table.name.clone(), table);
    }

    /// Batches applied so far, excluding metadata table provisioning.
    pub fn batches(&self) -> Vec<DdlBatch> {
        let state = self.state.lock().unwrap();
        state
            .batches
            .iter()
            .filter(|b| !b.statements.iter().any(|s| s.contains("IF NOT EXISTS")))
            .cloned()
            .collect()
    }

    pub fn clear_batches(&self) {
        self.state.lock().unwrap().batches.clear();
    }

    pub fn provision_calls(&self) -> u32 {
        self.state.lock().unwrap().provision_calls
    }

    /// Tracked column names for `table`, sorted.
    pub fn metadata_columns(&self, table: &str) -> Vec<String> {
        let state = self.state.lock().unwrap();
        let mut columns: Vec<String> = state
            .metadata
            .keys()
            .filter(|(t, _)| t == table)
            .map(|(_, c)| c.clone())
            .collect();
        columns.sort();
        columns
    }

    /// A stored metadata cell.
    pub fn metadata_field(&self, table: &str, column: &str, field: &str) -> Option<String> {
        let state = self.state.lock().unwrap();
        let row = state
            .metadata
            .get(&(table.to_string(), column.to_string()))?;
        row.opt_str(field).ok().flatten().map(str::to_string)
    }

    pub fn is_live(&self, table: &str) -> bool {
        self.state.lock().unwrap().live.contains_key(table)
    }
}

fn param<'a>(params: &'a Params, name: &str) -> Option<&'a Value> {
    params.iter().find(|(n, _)| n == name).map(|(_, v)| v)
}

fn param_str(params: &Params, name: &str) -> String {
    match param(params, name) {
        Some(Value::String(s)) => s.clone(),
        other => panic!("parameter {name}: {other:?}"),
    }
}

fn table_id(params: &Params) -> String {
    let schema = param_str(params, "schema");
    let table = param_str(params, "table");
    if schema.is_empty() {
        table
    } else {
        format!("{schema}.{table}")
    }
}

/// The `ALTER TABLE` / `CREATE TABLE` / `DROP TABLE` target of a statement.
fn ddl_target(statement: &str) -> Option<(&'static str, String)> {
    let mut words = statement.split_whitespace();
    let verb = match (words.next()?, words.next()?) {
        ("CREATE", "TABLE") => "create",
        ("ALTER", "TABLE") => "alter",
        ("DROP", "TABLE") => "drop",
        _ => return None,
    };
    let name = words.next()?.trim_end_matches('(').to_string();
    Some((verb, name))
}

fn table_row(table: &Table) -> Row {
    match &table.interleave {
        Some(interleave) => {
            let parent = interleave
                .parent
                .rsplit_once('.')
                .map_or(interleave.parent.as_str(), |(_, name)| name);
            let (kind, action) = match interleave.on_delete.to_sql() {
                Some(action) => ("IN PARENT", Value::from(action)),
                None => ("IN", Value::Null),
            };
            Row::new()
                .with("PARENT_TABLE_NAME", parent)
                .with("INTERLEAVE_TYPE", kind)
                .with("ON_DELETE_ACTION", action)
        }
        None => Row::new()
            .with("PARENT_TABLE_NAME", "")
            .with("INTERLEAVE_TYPE", Value::Null)
            .with("ON_DELETE_ACTION", Value::Null),
    }
}

/// What `INFORMATION_SCHEMA.COLUMNS` reports for a table.
fn column_rows(table: &Table) -> Vec<Row> {
    table
        .schema
        .columns
        .iter()
        .enumerate()
        .map(|(i, col)| {
            Row::new()
                .with("COLUMN_NAME", col.name.as_str())
                .with("SPANNER_TYPE", col.native_type())
                .with("IS_NULLABLE", if col.required { "NO" } else { "YES" })
                .with("COLUMN_DEFAULT", col.default_value.clone())
                .with("IS_GENERATED", if col.computed { "ALWAYS" } else { "NEVER" })
                .with("GENERATION_EXPRESSION", col.computation.clone())
                .with("ORDINAL_POSITION", i as i64 + 1)
        })
        .collect()
}

fn bundle_list(statement: &str) -> Vec<String> {
    let open = statement.find('(').map_or(statement.len(), |i| i + 1);
    let close = statement.rfind(')').unwrap_or(statement.len()).max(open);
    statement[open..close]
        .split(',')
        .map(|t| t.trim().to_string())
        .filter(|t| !t.is_empty())
        .collect()
}

/// Keep the DDL the way the service reports it: one consolidated
/// `CREATE PROTO BUNDLE`.
fn record_ddl(ddl: &mut Vec<String>, statement: &str) {
    if statement.starts_with("ALTER PROTO BUNDLE INSERT")
        && let Some(bundle) = ddl.iter_mut().find(|s| s.starts_with("CREATE PROTO BUNDLE"))
    {
        let mut types = bundle_list(bundle);
        types.extend(bundle_list(statement));
        *bundle = format!("CREATE PROTO BUNDLE ({})", types.join(", "));
    } else {
        ddl.push(statement.to_string());
    }
}

fn status(message: &str) -> ClientError {
    ClientError::status("FAILED_PRECONDITION", message)
}

impl FakeSpanner {
    fn apply(&self, batch: &DdlBatch) -> Result<(), ClientError> {
        let mut state = self.state.lock().unwrap();

        if batch.statements.iter().any(|s| s.contains("IF NOT EXISTS")) {
            state.provision_calls += 1;
            if state.provision_calls <= self.provision_failures {
                return Err(ClientError::status(
                    "ABORTED",
                    "concurrent schema change in progress",
                ));
            }
            state.meta_table_exists = true;
            state.batches.push(batch.clone());
            return Ok(());
        }

        for statement in &batch.statements {
            if statement.contains("PROTO BUNDLE") && batch.proto_descriptors.is_none() {
                return Err(status("proto bundle statement without descriptors"));
            }
            if let Some((verb, name)) = ddl_target(statement) {
                match verb {
                    "create" if state.live.contains_key(&name) => {
                        return Err(ClientError::status("ALREADY_EXISTS", name));
                    }
                    "alter" | "drop" if !state.live.contains_key(&name) => {
                        return Err(ClientError::status("NOT_FOUND", name));
                    }
                    "drop" => {
                        state.live.remove(&name);
                    }
                    _ => {
                        if let Some(staged) = state.staged.remove(&name) {
                            state.live.insert(name, staged);
                        }
                    }
                }
            }
        }

        for statement in &batch.statements {
            record_ddl(&mut state.ddl, statement);
        }
        state.batches.push(batch.clone());
        Ok(())
    }

    fn select(&self, sql: &str, params: &Params) -> Result<Vec<Row>, ClientError> {
        let state = self.state.lock().unwrap();

        if sql.contains("INFORMATION_SCHEMA.TABLES") {
            let id = table_id(params);
            return Ok(state.live.get(&id).map(table_row).into_iter().collect());
        }
        if sql.contains("INFORMATION_SCHEMA.INDEX_COLUMNS") {
            let id = table_id(params);
            return Ok(state
                .live
                .get(&id)
                .map(|t| {
                    t.schema
                        .primary_key()
                        .into_iter()
                        .map(|c| Row::new().with("COLUMN_NAME", c))
                        .collect()
                })
                .unwrap_or_default());
        }
        if sql.contains("INFORMATION_SCHEMA.COLUMNS") {
            let id = table_id(params);
            return Ok(state.live.get(&id).map(column_rows).unwrap_or_default());
        }

        if !state.meta_table_exists {
            return Err(status("metadata table does not exist"));
        }
        let table = param_str(params, "table_name");
        Ok(state
            .metadata
            .iter()
            .filter(|((t, _), _)| *t == table)
            .map(|(_, row)| row.clone())
            .collect())
    }

    fn dml(&self, sql: &str, params: &Params) -> Result<u64, ClientError> {
        if self.fail_metadata_writes {
            return Err(ClientError::Transport("connection reset".to_string()));
        }
        let mut state = self.state.lock().unwrap();
        if !state.meta_table_exists {
            return Err(status("metadata table does not exist"));
        }
        let table = param_str(params, "table_name");

        if sql.starts_with("INSERT OR UPDATE") {
            let column = param_str(params, "column_name");
            let row = params
                .iter()
                .fold(Row::new(), |row, (name, value)| row.with(name.as_str(), value.clone()));
            state.metadata.insert((table, column), row);
            return Ok(1);
        }

        let before = state.metadata.len();
        match param(params, "columns") {
            Some(Value::StringArray(columns)) => {
                state
                    .metadata
                    .retain(|(t, c), _| !(*t == table && columns.contains(c)));
            }
            _ => state.metadata.retain(|(t, _), _| *t != table),
        }
        Ok((before - state.metadata.len()) as u64)
    }
}

impl DatabaseClient for FakeSpanner {
    fn query<'a>(&'a self, sql: &'a str, params: &'a Params) -> ClientFuture<'a, Vec<Row>> {
        Box::pin(async move { self.select(sql, params) })
    }

    fn execute<'a>(&'a self, sql: &'a str, params: &'a Params) -> ClientFuture<'a, u64> {
        Box::pin(async move { self.dml(sql, params) })
    }

    fn update_ddl<'a>(&'a self, batch: &'a DdlBatch) -> ClientFuture<'a, ()> {
        Box::pin(async move { self.apply(batch) })
    }

    fn database_ddl(&self) -> ClientFuture<'_, Vec<String>> {
        Box::pin(async move { Ok(self.state.lock().unwrap().ddl.clone()) })
    }
}

/// Serves fixed descriptor bytes by path and counts fetches.
#[derive(Default)]
pub struct FakeFetcher {
    sets: HashMap<String, Vec<u8>>,
    fetches: Mutex<Vec<String>>,
}

impl FakeFetcher {
    pub fn with(mut self, path: &str, bytes: &[u8]) -> Self {
        self.sets.insert(path.to_string(), bytes.to_vec());
        self
    }

    pub fn fetched(&self) -> Vec<String> {
        self.fetches.lock().unwrap().clone()
    }
}

impl DescriptorFetcher for FakeFetcher {
    fn fetch<'a>(&'a self, set: &'a DescriptorSet) -> FetchFuture<'a> {
        Box::pin(async move {
            self.fetches.lock().unwrap().push(set.path.clone());
            self.sets
                .get(&set.path)
                .cloned()
                .ok_or_else(|| format!("404 for {}", set.path))
        })
    }
}

/// A serialized single-file `FileDescriptorSet` defining top-level messages
/// and enums in `package`.
pub fn descriptor_set(package: &str, messages: &[&str], enums: &[&str]) -> Vec<u8> {
    FileDescriptorSet {
        file: vec![FileDescriptorProto {
            name: Some(format!("{}.proto", package.replace('.', "/"))),
            package: Some(package.to_string()),
            message_type: messages
                .iter()
                .map(|m| DescriptorProto {
                    name: Some(m.to_string()),
                    ..Default::default()
                })
                .collect(),
            enum_type: enums
                .iter()
                .map(|e| EnumDescriptorProto {
                    name: Some(e.to_string()),
                    ..Default::default()
                })
                .collect(),
            ..Default::default()
        }],
    }
    .encode_to_vec()
}
