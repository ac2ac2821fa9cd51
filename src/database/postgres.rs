//! PostgreSQL data source backed by a SQLx connection pool.
//!
//! Every session is a pooled connection checked out for the duration of one
//! read or one batch, so concurrent batch writers never share a live
//! connection. Size the pool at least as large as the writer worker count.

use super::source::{DataSource, DataSourceError, Session, SqlValue, UpdateCount};
use crate::config::DatabaseConfig;
use crate::error::{RecordSetError, RecordSetResult};
use async_trait::async_trait;
use futures::stream::{BoxStream, StreamExt, TryStreamExt};
use sqlx::pool::PoolConnection;
use sqlx::encode::IsNull;
use sqlx::error::BoxDynError;
use sqlx::postgres::types::Oid;
use sqlx::postgres::{PgArgumentBuffer, PgArguments, PgPoolOptions, PgRow, PgTypeInfo};
use sqlx::query::Query;
use sqlx::{PgPool, Postgres};
use std::time::Duration;
use tracing::{debug, info};

/// Pooled PostgreSQL [`DataSource`]
#[derive(Clone)]
pub struct PgDataSource {
    pool: PgPool,
}

impl std::fmt::Debug for PgDataSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PgDataSource")
            .field("pool_size", &self.pool.size())
            .field("idle_connections", &self.pool.num_idle())
            .field(
                "max_connections",
                &self.pool.options().get_max_connections(),
            )
            .finish()
    }
}

impl PgDataSource {
    /// Create the connection pool described by `config`
    pub async fn connect(config: &DatabaseConfig) -> RecordSetResult<Self> {
        info!(
            "Creating record set database pool: {}...",
            config.url.chars().take(30).collect::<String>()
        );

        let pool_config = &config.pool;
        let pool = PgPoolOptions::new()
            .max_connections(pool_config.max_connections)
            .min_connections(pool_config.min_connections)
            .acquire_timeout(Duration::from_secs(pool_config.acquire_timeout_seconds))
            .idle_timeout(Some(Duration::from_secs(pool_config.idle_timeout_seconds)))
            .max_lifetime(Some(Duration::from_secs(pool_config.max_lifetime_seconds)))
            .connect(&config.url)
            .await
            .map_err(|e| {
                RecordSetError::ConnectionError(DataSourceError::Acquire(Box::new(e)))
            })?;

        info!(
            max_connections = pool_config.max_connections,
            "Record set database pool created successfully"
        );
        Ok(Self { pool })
    }

    /// Wrap an existing pool
    pub fn from_pool(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    pub async fn health_check(&self) -> Result<bool, DataSourceError> {
        let health: i32 = sqlx::query_scalar("SELECT 1")
            .fetch_one(&self.pool)
            .await
            .map_err(|e| DataSourceError::Query(Box::new(e)))?;
        Ok(health == 1)
    }

    pub async fn close(&self) {
        self.pool.close().await;
    }
}

#[async_trait]
impl DataSource for PgDataSource {
    type Row = PgRow;
    type Session = PgSession;

    async fn acquire(&self) -> Result<PgSession, DataSourceError> {
        let connection = self
            .pool
            .acquire()
            .await
            .map_err(|e| DataSourceError::Acquire(Box::new(e)))?;
        debug!(
            pool_size = self.pool.size(),
            idle = self.pool.num_idle(),
            "Checked out pooled connection"
        );
        Ok(PgSession { connection })
    }

    fn max_sessions(&self) -> Option<usize> {
        Some(self.pool.options().get_max_connections() as usize)
    }
}

/// A pooled connection; returned to the pool on drop
pub struct PgSession {
    connection: PoolConnection<Postgres>,
}

#[async_trait]
impl Session for PgSession {
    type Row = PgRow;

    fn fetch<'s>(&'s mut self, query: &'s str) -> BoxStream<'s, Result<PgRow, DataSourceError>> {
        sqlx::query(query)
            .fetch(&mut *self.connection)
            .map_err(|e| DataSourceError::Query(Box::new(e)))
            .boxed()
    }

    async fn execute_batch(
        &mut self,
        statement: &str,
        rows: &[Vec<SqlValue>],
    ) -> Result<Vec<UpdateCount>, DataSourceError> {
        // One transaction per batch: a rejected entry rolls back its whole batch only
        let mut transaction = sqlx::Connection::begin(&mut *self.connection)
            .await
            .map_err(|e| DataSourceError::batch("failed to open batch transaction", e))?;

        let mut counts = Vec::with_capacity(rows.len());
        for (position, params) in rows.iter().enumerate() {
            let query = params
                .iter()
                .fold(sqlx::query(statement), |query, value| bind_value(query, value));
            let result = query.execute(&mut *transaction).await.map_err(|e| {
                DataSourceError::batch(format!("batch entry {position} was aborted"), e)
            })?;
            counts.push(UpdateCount::Rows(result.rows_affected()));
        }

        transaction
            .commit()
            .await
            .map_err(|e| DataSourceError::batch("failed to commit batch", e))?;

        Ok(counts)
    }
}

/// NULL sent with an unspecified parameter type
///
/// The server infers the type from the statement, so the same value binds to
/// any nullable column.
#[derive(Debug, Clone, Copy)]
struct UntypedNull;

impl sqlx::Type<Postgres> for UntypedNull {
    fn type_info() -> PgTypeInfo {
        PgTypeInfo::with_oid(Oid(0))
    }
}

impl sqlx::Encode<'_, Postgres> for UntypedNull {
    fn encode_by_ref(&self, _buf: &mut PgArgumentBuffer) -> Result<IsNull, BoxDynError> {
        Ok(IsNull::Yes)
    }
}

/// Bind the next positional (`$n`) parameter
fn bind_value<'q>(
    query: Query<'q, Postgres, PgArguments>,
    value: &'q SqlValue,
) -> Query<'q, Postgres, PgArguments> {
    match value {
        SqlValue::Null => query.bind(UntypedNull),
        SqlValue::Bool(v) => query.bind(*v),
        SqlValue::Int(v) => query.bind(*v),
        SqlValue::BigInt(v) => query.bind(*v),
        SqlValue::Double(v) => query.bind(*v),
        SqlValue::Text(v) => query.bind(v.as_str()),
        SqlValue::Bytes(v) => query.bind(v.as_slice()),
        SqlValue::Uuid(v) => query.bind(*v),
        SqlValue::Timestamp(v) => query.bind(*v),
        SqlValue::Json(v) => query.bind(sqlx::types::Json(v)),
    }
}
