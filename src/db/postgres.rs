use async_trait::async_trait;
use sqlx::postgres::{PgPool, PgPoolOptions};
use sqlx::types::Json;
use tracing::debug;

use super::{ColumnInfo, Database, DbError, Row};

pub struct PostgresDatabase {
    pool: PgPool,
}

impl PostgresDatabase {
    pub async fn connect(url: &str, pool_size: usize) -> Result<Self, DbError> {
        let max_connections = u32::try_from(pool_size)
            .map_err(|_| DbError::Unavailable(format!("pool size {} is out of range", pool_size)))?;
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .connect(url)
            .await
            .map_err(|e| DbError::Unavailable(e.to_string()))?;
        Ok(Self { pool })
    }
}

/// Wraps a SELECT so Postgres renders each row as a JSON object, whatever the column types.
fn row_json_query(sql: &str) -> String {
    let body = sql.trim().trim_end_matches(';').trim_end();
    format!("SELECT row_to_json(q) FROM ({}\n) AS q", body)
}

#[async_trait]
impl Database for PostgresDatabase {
    fn backend(&self) -> &'static str {
        "postgres"
    }

    fn default_schema(&self) -> &'static str {
        "public"
    }

    async fn list_tables(&self, schema: &str) -> Result<Vec<String>, DbError> {
        let tables = sqlx::query_scalar::<_, String>(
            "SELECT table_name::text FROM information_schema.tables \
             WHERE table_schema = $1 ORDER BY table_name",
        )
        .bind(schema)
        .fetch_all(&self.pool)
        .await?;
        debug!("Found {} tables in schema {}", tables.len(), schema);
        Ok(tables)
    }

    async fn list_columns(&self, schema: &str, table: &str) -> Result<Vec<ColumnInfo>, DbError> {
        let columns = sqlx::query_as::<_, (String, String)>(
            "SELECT column_name::text, data_type::text FROM information_schema.columns \
             WHERE table_schema = $1 AND table_name = $2 ORDER BY ordinal_position",
        )
        .bind(schema)
        .bind(table)
        .fetch_all(&self.pool)
        .await?;

        Ok(columns
            .into_iter()
            .map(|(name, data_type)| ColumnInfo { name, data_type })
            .collect())
    }

    async fn fetch_rows(&self, sql: &str) -> Result<Vec<Row>, DbError> {
        let rows = sqlx::query_scalar::<_, Json<Row>>(&row_json_query(sql))
            .fetch_all(&self.pool)
            .await?;
        Ok(rows.into_iter().map(|Json(row)| row).collect())
    }

    async fn execute(&self, sql: &str) -> Result<(), DbError> {
        sqlx::query(sql).execute(&self.pool).await?;
        Ok(())
    }

    async fn close(&self) {
        self.pool.close().await;
    }
}
