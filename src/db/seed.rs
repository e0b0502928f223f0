use tracing::info;

use super::{Database, DbError};

const CREATE_CUSTOMERS: &str = "CREATE TABLE IF NOT EXISTS customers (
    id INTEGER PRIMARY KEY,
    name VARCHAR(100) NOT NULL,
    email VARCHAR(255) NOT NULL,
    city VARCHAR(100),
    signup_date DATE
)";

const INSERT_CUSTOMERS: &str = "INSERT INTO customers (id, name, email, city, signup_date) VALUES
    (1, 'Alice Johnson', 'alice@example.com', 'New York', DATE '2023-01-15'),
    (2, 'Bob Smith', 'bob@example.com', 'Chicago', DATE '2023-02-20'),
    (3, 'Carol White', 'carol@example.com', 'San Francisco', DATE '2023-03-05'),
    (4, 'David Brown', 'david@example.com', 'Chicago', DATE '2023-04-11'),
    (5, 'Eve Davis', 'eve@example.com', 'Austin', DATE '2023-05-30')
ON CONFLICT (id) DO NOTHING";

/// Creates the example `customers` table and fills it. Safe to run repeatedly.
pub async fn seed_customers(db: &dyn Database) -> Result<usize, DbError> {
    db.execute(CREATE_CUSTOMERS).await?;
    db.execute(INSERT_CUSTOMERS).await?;

    let rows = db.fetch_rows("SELECT COUNT(*) AS total FROM customers").await?;
    let total = rows
        .first()
        .and_then(|row| row.get("total"))
        .and_then(|v| v.as_u64())
        .unwrap_or_default() as usize;

    info!("customers table seeded ({} rows)", total);
    Ok(total)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::duckdb_pool::DuckDbDatabase;

    #[tokio::test]
    async fn seeding_twice_keeps_five_customers() {
        let db = DuckDbDatabase::open(":memory:", 1).unwrap();
        assert_eq!(seed_customers(&db).await.unwrap(), 5);
        assert_eq!(seed_customers(&db).await.unwrap(), 5);

        let rows = db
            .fetch_rows("SELECT name FROM customers WHERE city = 'Chicago' ORDER BY id")
            .await
            .unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0]["name"], "Bob Smith");
        assert_eq!(rows[1]["name"], "David Brown");
    }
}
