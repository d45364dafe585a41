//! Table lifecycle: create, get, update and delete against a live database.
//!
//! A table is either absent or present. Every transition validates the
//! desired definition before the first remote call, submits its DDL as one
//! batch per phase, and then refreshes the metadata store. Metadata writes
//! that fail after the schema change succeeded are logged and dropped; the
//! schema change is not rolled back.
//!
//! Nothing here guards against two updates racing on the same table.

use crate::client::{ClientError, DatabaseClient, DdlBatch};
use crate::diff::{self, TablePlan};
use crate::meta::MetadataStore;
use crate::proto::{DescriptorFetcher, NoDescriptors, register_bundle};
use crate::traced::TracedClient;
use crate::{Config, Error, Result, Table, ddl, introspect};
use tracing::{info, warn};

/// Reconciles tables in one database.
pub struct TableManager<C, F = NoDescriptors> {
    client: TracedClient<C>,
    fetcher: F,
    store: MetadataStore,
}

impl<C: DatabaseClient> TableManager<C> {
    /// A manager with the default configuration and no descriptor fetcher.
    pub fn new(client: C) -> Self {
        Self::with_config(client, NoDescriptors, &Config::default())
    }
}

impl<C: DatabaseClient, F: DescriptorFetcher> TableManager<C, F> {
    pub fn with_config(client: C, fetcher: F, config: &Config) -> Self {
        Self {
            client: TracedClient::new(client),
            fetcher,
            store: MetadataStore::from_config(config),
        }
    }

    /// Replace the descriptor fetcher.
    pub fn with_fetcher<G: DescriptorFetcher>(self, fetcher: G) -> TableManager<C, G> {
        TableManager {
            client: self.client,
            fetcher,
            store: self.store,
        }
    }

    pub fn client(&self) -> &TracedClient<C> {
        &self.client
    }

    pub fn store(&self) -> &MetadataStore {
        &self.store
    }

    /// Create `table` and return it as the database now reports it.
    pub async fn create(&self, table: &Table) -> Result<Table> {
        table.validate()?;
        let create = ddl::create_table_sql(table)?;

        register_bundle(&self.client, &self.fetcher, table).await?;
        self.client.update_ddl(&DdlBatch::new(vec![create])).await?;
        info!(table = %table.name, columns = table.schema.len(), "created table");

        let upserted = self
            .store
            .upsert(&self.client, &table.name, &table.schema.columns)
            .await;
        metadata_write(&table.name, "upsert", upserted);

        self.get(&table.name).await
    }

    /// Introspect `table`. Fails with [`Error::TableNotFound`] if it doesn't
    /// exist.
    pub async fn get(&self, table: &str) -> Result<Table> {
        introspect::introspect(&self.client, &self.store, table).await
    }

    /// Compute what [`TableManager::update`] would do, without applying it.
    pub async fn plan(&self, desired: &Table) -> Result<TablePlan> {
        desired.validate()?;
        let observed = self.get(&desired.name).await?;
        Ok(diff::plan(desired, &observed))
    }

    /// Converge `desired` onto the live table.
    ///
    /// A missing table is created when `allow_missing` is set and is an
    /// [`Error::TableNotFound`] otherwise.
    pub async fn update(&self, desired: &Table, allow_missing: bool) -> Result<Table> {
        desired.validate()?;

        let observed = match self.get(&desired.name).await {
            Ok(observed) => observed,
            Err(Error::TableNotFound { .. }) if allow_missing => {
                info!(table = %desired.name, "table missing, creating it");
                return self.create(desired).await;
            }
            Err(e) => return Err(e),
        };

        let plan = diff::plan(desired, &observed);
        let apply = plan.apply_statements()?;

        register_bundle(&self.client, &self.fetcher, desired).await?;

        let dropped = plan.dropped_columns();
        if !dropped.is_empty() {
            for col in dropped.iter().filter(|c| c.primary_key) {
                warn!(
                    table = %desired.name,
                    column = %col.name,
                    "dropping a primary key column"
                );
            }
            self.client
                .update_ddl(&DdlBatch::new(plan.drop_statements()))
                .await?;

            let names: Vec<String> = dropped.iter().map(|c| c.name.clone()).collect();
            let deleted = self.store.delete(&self.client, &desired.name, &names).await;
            metadata_write(&desired.name, "delete", deleted);
        }

        if !apply.is_empty() {
            self.client.update_ddl(&DdlBatch::new(apply)).await?;
        }

        if plan.is_empty() {
            info!(table = %desired.name, "table already up to date");
        } else {
            info!(
                table = %desired.name,
                changes = plan.changes.len(),
                dropped = dropped.len(),
                "updated table"
            );
        }

        let upserted = self
            .store
            .upsert(&self.client, &desired.name, &desired.schema.columns)
            .await;
        metadata_write(&desired.name, "upsert", upserted);

        self.get(&desired.name).await
    }

    /// Drop `table` and forget its metadata.
    pub async fn delete(&self, table: &str) -> Result<()> {
        let observed = self.get(table).await?;
        self.client
            .update_ddl(&DdlBatch::new(vec![ddl::drop_table_sql(&observed)]))
            .await?;
        info!(table, "dropped table");

        let deleted = self.store.delete_all(&self.client, table).await;
        metadata_write(table, "delete", deleted);
        Ok(())
    }
}

fn metadata_write<T>(table: &str, op: &str, result: std::result::Result<T, ClientError>) {
    if let Err(e) = result {
        warn!(table, op, error = %e, "metadata write failed; shadow table may be stale");
    }
}
