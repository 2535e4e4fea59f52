//! SQLite gateway for model-generated queries.
//!
//! Uses sqlx with runtime-checked queries, since the SQL text is only known
//! once the model has produced it.

use crate::models::QueryRows;
use crate::services::metrics;
use crate::services::sql_guard::ExecutionMode;
use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use serde_json::Value;
use service_core::error::AppError;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions, SqliteRow};
use sqlx::{Column, Row, TypeInfo, ValueRef};
use std::str::FromStr;
use std::time::Instant;

/// Pooled access to the employees database.
#[derive(Clone)]
pub struct AssistantDb {
    pool: SqlitePool,
}

impl AssistantDb {
    /// Open a pool on `url`. In read-only mode the database is opened with
    /// SQLite's read-only flag and must already exist.
    pub async fn connect(
        url: &str,
        max_connections: u32,
        mode: ExecutionMode,
    ) -> Result<Self, AppError> {
        tracing::info!(url = %url, mode = %mode, "Connecting to SQLite");

        let options = SqliteConnectOptions::from_str(url)
            .map_err(|e| {
                tracing::error!("Invalid database URL {}: {}", url, e);
                AppError::DatabaseError(anyhow::anyhow!(e))
            })?
            .read_only(mode == ExecutionMode::ReadOnly)
            .create_if_missing(mode == ExecutionMode::ReadWrite);

        let pool = SqlitePoolOptions::new()
            .max_connections(max_connections)
            .connect_with(options)
            .await
            .map_err(|e| {
                tracing::error!("Failed to open database at {}: {}", url, e);
                AppError::DatabaseError(anyhow::anyhow!(e))
            })?;

        tracing::info!("Successfully connected to SQLite database");
        Ok(Self { pool })
    }

    /// Wrap an existing pool.
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Get the underlying connection pool.
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Health check - ping the database.
    pub async fn health_check(&self) -> Result<(), AppError> {
        sqlx::query("SELECT 1")
            .execute(&self.pool)
            .await
            .map_err(|e| {
                tracing::error!("Database health check failed: {}", e);
                AppError::DatabaseError(anyhow::anyhow!("Database health check failed: {}", e))
            })?;
        Ok(())
    }

    /// Number of rows in `employees`, logged at startup.
    pub async fn count_employees(&self) -> Result<i64, AppError> {
        sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM employees")
            .fetch_one(&self.pool)
            .await
            .map_err(|e| AppError::DatabaseError(anyhow::anyhow!(e)))
    }

    /// Run `sql` in its own transaction and collect every row.
    ///
    /// The transaction is committed only after all rows were read; any error
    /// rolls it back.
    pub async fn execute(&self, sql: &str) -> Result<QueryRows, sqlx::Error> {
        let started = Instant::now();
        let result = self.execute_in_transaction(sql).await;

        match &result {
            Ok(_) => metrics::record_db_operation("execute", started.elapsed().as_secs_f64()),
            Err(_) => metrics::record_db_error("execute"),
        }
        result
    }

    async fn execute_in_transaction(&self, sql: &str) -> Result<QueryRows, sqlx::Error> {
        let mut tx = self.pool.begin().await?;

        let rows = sqlx::query(sql).fetch_all(&mut *tx).await?;

        let columns = rows
            .first()
            .map(|row| row.columns().iter().map(|c| c.name().to_string()).collect())
            .unwrap_or_default();

        let rows = rows
            .iter()
            .map(row_to_json)
            .collect::<Result<Vec<_>, _>>()?;

        tx.commit().await?;

        Ok(QueryRows { columns, rows })
    }
}

fn row_to_json(row: &SqliteRow) -> Result<Vec<Value>, sqlx::Error> {
    (0..row.len()).map(|index| cell_to_json(row, index)).collect()
}

fn cell_to_json(row: &SqliteRow, index: usize) -> Result<Value, sqlx::Error> {
    let type_name = {
        let raw = row.try_get_raw(index)?;
        if raw.is_null() {
            return Ok(Value::Null);
        }
        raw.type_info().name().to_ascii_uppercase()
    };

    let value = match type_name.as_str() {
        "INTEGER" | "BOOLEAN" => Value::from(row.try_get::<i64, _>(index)?),
        // Non-finite reals have no JSON form and become null.
        "REAL" => Value::from(row.try_get::<f64, _>(index)?),
        "BLOB" => Value::String(BASE64.encode(row.try_get::<Vec<u8>, _>(index)?)),
        _ => Value::String(row.try_get::<String, _>(index)?),
    };

    Ok(value)
}
