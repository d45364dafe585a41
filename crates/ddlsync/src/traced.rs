//! Traced database client wrapper.
//!
//! Wraps any [`DatabaseClient`] and logs every remote call via tracing.

use crate::client::{ClientFuture, DatabaseClient, DdlBatch, Params, Row};
use tracing::Instrument;

/// A wrapper around a [`DatabaseClient`] that logs all calls via tracing.
///
/// This is a thin wrapper that delegates to the underlying client but adds a
/// `tracing::debug_span!` around each call and records how much came back.
///
/// # Example
///
/// ```ignore
/// use ddlsync::TracedClient;
///
/// let traced = TracedClient::new(client);
/// traced.update_ddl(&DdlBatch::new(vec!["DROP TABLE Singers".into()])).await?;
/// ```
pub struct TracedClient<C> {
    inner: C,
}

impl<C: DatabaseClient> TracedClient<C> {
    /// Create a new traced client wrapper.
    pub fn new(inner: C) -> Self {
        Self { inner }
    }

    /// Get the inner client.
    pub fn inner(&self) -> &C {
        &self.inner
    }
}

impl<C: DatabaseClient> DatabaseClient for TracedClient<C> {
    fn query<'a>(&'a self, sql: &'a str, params: &'a Params) -> ClientFuture<'a, Vec<Row>> {
        let span = tracing::debug_span!(
            "db.query",
            sql = %sql,
            params = params.len(),
            rows = tracing::field::Empty,
        );
        Box::pin(async move {
            let rows = self
                .inner
                .query(sql, params)
                .instrument(span.clone())
                .await?;
            span.record("rows", rows.len());
            Ok(rows)
        })
    }

    fn execute<'a>(&'a self, sql: &'a str, params: &'a Params) -> ClientFuture<'a, u64> {
        let span = tracing::debug_span!(
            "db.execute",
            sql = %sql,
            params = params.len(),
            affected = tracing::field::Empty,
        );
        Box::pin(async move {
            let affected = self
                .inner
                .execute(sql, params)
                .instrument(span.clone())
                .await?;
            span.record("affected", affected);
            Ok(affected)
        })
    }

    fn update_ddl<'a>(&'a self, batch: &'a DdlBatch) -> ClientFuture<'a, ()> {
        let span = tracing::debug_span!(
            "db.update_ddl",
            statements = batch.statements.len(),
            proto_descriptors = batch.proto_descriptors.as_ref().map_or(0, Vec::len),
        );
        Box::pin(
            async move {
                for statement in &batch.statements {
                    tracing::debug!(%statement, "ddl");
                }
                self.inner.update_ddl(batch).await
            }
            .instrument(span),
        )
    }

    fn database_ddl(&self) -> ClientFuture<'_, Vec<String>> {
        let span = tracing::debug_span!("db.database_ddl", statements = tracing::field::Empty);
        Box::pin(async move {
            let statements = self.inner.database_ddl().instrument(span.clone()).await?;
            span.record("statements", statements.len());
            Ok(statements)
        })
    }
}
