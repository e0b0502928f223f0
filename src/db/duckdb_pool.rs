use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, TimeDelta};
use duckdb::types::{TimeUnit, Value};
use duckdb::Connection;
use r2d2::{ManageConnection, Pool};
use serde_json::{Number, Value as JsonValue};
use std::sync::Mutex;
use tracing::debug;

use super::{ColumnInfo, Database, DbError, Row};

/// Hands out clones of a single root connection so every pooled connection
/// sees the same database, including `:memory:` ones.
pub struct DuckDBConnectionManager {
    root: Mutex<Connection>,
}

impl DuckDBConnectionManager {
    pub fn new(connection_string: &str) -> Result<Self, duckdb::Error> {
        let root = match connection_string {
            "" | ":memory:" => Connection::open_in_memory()?,
            path => Connection::open(path)?,
        };
        Ok(Self {
            root: Mutex::new(root),
        })
    }
}

impl ManageConnection for DuckDBConnectionManager {
    type Connection = Connection;
    type Error = duckdb::Error;

    fn connect(&self) -> Result<Self::Connection, Self::Error> {
        let root = self.root.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        root.try_clone()
    }

    fn is_valid(&self, conn: &mut Self::Connection) -> Result<(), Self::Error> {
        conn.execute("SELECT 1", [])?;
        Ok(())
    }

    fn has_broken(&self, _conn: &mut Self::Connection) -> bool {
        false
    }
}

/// Embedded DuckDB backend. Every call runs on the blocking thread pool.
pub struct DuckDbDatabase {
    pool: Pool<DuckDBConnectionManager>,
}

impl DuckDbDatabase {
    pub fn open(connection_string: &str, pool_size: usize) -> Result<Self, DbError> {
        let max_size = u32::try_from(pool_size)
            .map_err(|_| DbError::Unavailable(format!("pool size {} is out of range", pool_size)))?;
        let manager = DuckDBConnectionManager::new(connection_string)?;
        let pool = Pool::builder().max_size(max_size).build(manager)?;
        Ok(Self { pool })
    }

    /// The C API takes statements as NUL-terminated strings.
    fn check_statement(sql: &str) -> Result<String, DbError> {
        if sql.contains('\0') {
            return Err(DbError::Query("statement contains a NUL byte".to_string()));
        }
        Ok(sql.to_string())
    }

    async fn with_connection<T, F>(&self, f: F) -> Result<T, DbError>
    where
        T: Send + 'static,
        F: FnOnce(&Connection) -> Result<T, DbError> + Send + 'static,
    {
        let pool = self.pool.clone();
        tokio::task::spawn_blocking(move || {
            let conn = pool.get()?;
            f(&conn)
        })
        .await?
    }
}

#[async_trait]
impl Database for DuckDbDatabase {
    fn backend(&self) -> &'static str {
        "duckdb"
    }

    fn default_schema(&self) -> &'static str {
        "main"
    }

    async fn list_tables(&self, schema: &str) -> Result<Vec<String>, DbError> {
        let schema = schema.to_string();
        self.with_connection(move |conn| {
            let mut stmt = conn.prepare(
                "SELECT table_name FROM information_schema.tables \
                 WHERE table_schema = ? ORDER BY table_name",
            )?;
            let tables = stmt
                .query_map([&schema], |row| row.get::<_, String>(0))?
                .collect::<Result<Vec<_>, _>>()?;
            debug!("Found {} tables in schema {}", tables.len(), schema);
            Ok(tables)
        })
        .await
    }

    async fn list_columns(&self, schema: &str, table: &str) -> Result<Vec<ColumnInfo>, DbError> {
        let (schema, table) = (schema.to_string(), table.to_string());
        self.with_connection(move |conn| {
            let mut stmt = conn.prepare(
                "SELECT column_name, data_type FROM information_schema.columns \
                 WHERE table_schema = ? AND table_name = ? ORDER BY ordinal_position",
            )?;
            let columns = stmt
                .query_map([&schema, &table], |row| {
                    Ok(ColumnInfo {
                        name: row.get(0)?,
                        data_type: row.get(1)?,
                    })
                })?
                .collect::<Result<Vec<_>, _>>()?;
            Ok(columns)
        })
        .await
    }

    async fn fetch_rows(&self, sql: &str) -> Result<Vec<Row>, DbError> {
        let sql = Self::check_statement(sql)?;
        self.with_connection(move |conn| {
            let mut stmt = conn.prepare(&sql)?;
            let mut rows = stmt.query([])?;
            let column_names = rows
                .as_ref()
                .map(|stmt| stmt.column_names())
                .unwrap_or_default();

            let mut results = Vec::new();
            while let Some(row) = rows.next()? {
                let mut record = Row::new();
                for (i, name) in column_names.iter().enumerate() {
                    let value: Value = row.get(i)?;
                    record.insert(name.clone(), to_json(value));
                }
                results.push(record);
            }
            Ok(results)
        })
        .await
    }

    async fn execute(&self, sql: &str) -> Result<(), DbError> {
        let sql = Self::check_statement(sql)?;
        self.with_connection(move |conn| {
            conn.execute_batch(&sql)?;
            Ok(())
        })
        .await
    }

    async fn close(&self) {
        // r2d2 closes its connections when the last pool handle drops.
    }
}

fn to_json(value: Value) -> JsonValue {
    match value {
        Value::Null => JsonValue::Null,
        Value::Boolean(b) => JsonValue::Bool(b),
        Value::TinyInt(v) => v.into(),
        Value::SmallInt(v) => v.into(),
        Value::Int(v) => v.into(),
        Value::BigInt(v) => v.into(),
        Value::HugeInt(v) => i64::try_from(v)
            .map(JsonValue::from)
            .unwrap_or_else(|_| JsonValue::String(v.to_string())),
        Value::UTinyInt(v) => v.into(),
        Value::USmallInt(v) => v.into(),
        Value::UInt(v) => v.into(),
        Value::UBigInt(v) => v.into(),
        Value::Float(v) => float(f64::from(v)),
        Value::Double(v) => float(v),
        Value::Decimal(d) => {
            // Numbers only when f64 holds the value exactly; wide decimals stay text.
            let text = d.normalize().to_string();
            text.parse::<f64>()
                .ok()
                .filter(|f| f.to_string() == text)
                .and_then(Number::from_f64)
                .map(JsonValue::Number)
                .unwrap_or(JsonValue::String(text))
        }
        Value::Text(s) | Value::Enum(s) => JsonValue::String(s),
        Value::Blob(bytes) => JsonValue::String(String::from_utf8_lossy(&bytes).into_owned()),
        Value::Date32(days) => NaiveDate::from_ymd_opt(1970, 1, 1)
            .and_then(|epoch| epoch.checked_add_signed(TimeDelta::days(i64::from(days))))
            .map(|date| JsonValue::String(date.format("%Y-%m-%d").to_string()))
            .unwrap_or(JsonValue::Null),
        Value::Timestamp(unit, v) => DateTime::from_timestamp_micros(micros(unit, v))
            .map(|ts| JsonValue::String(ts.naive_utc().format("%Y-%m-%dT%H:%M:%S%.f").to_string()))
            .unwrap_or(JsonValue::Null),
        Value::List(items) | Value::Array(items) => {
            JsonValue::Array(items.into_iter().map(to_json).collect())
        }
        other => JsonValue::String(format!("{:?}", other)),
    }
}

fn float(v: f64) -> JsonValue {
    Number::from_f64(v).map(JsonValue::Number).unwrap_or(JsonValue::Null)
}

fn micros(unit: TimeUnit, value: i64) -> i64 {
    match unit {
        TimeUnit::Second => value.saturating_mul(1_000_000),
        TimeUnit::Millisecond => value.saturating_mul(1_000),
        TimeUnit::Microsecond => value,
        TimeUnit::Nanosecond => value / 1_000,
    }
}
