use thiserror::Error;
use tracing::warn;

#[derive(Debug, Error, PartialEq, Eq)]
#[error("Only SELECT statements are allowed (got: {statement})")]
pub struct Rejected {
    pub statement: String,
}

/// Passes the statement through only when it starts with `SELECT`, ignoring case
/// and surrounding whitespace.
///
/// This is a prefix test, not a parser: a statement that starts with SELECT
/// and smuggles a write through an engine-specific construct gets through.
pub fn validate(sql: &str) -> Result<&str, Rejected> {
    let trimmed = sql.trim();
    let is_select = trimmed
        .get(..6)
        .is_some_and(|prefix| prefix.eq_ignore_ascii_case("select"));

    if is_select {
        Ok(trimmed)
    } else {
        warn!("Rejected non-SELECT statement: {}", trimmed);
        Err(Rejected {
            statement: trimmed.chars().take(80).collect(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn select_passes_in_any_case() {
        assert_eq!(validate("SELECT COUNT(*) FROM customers"), Ok("SELECT COUNT(*) FROM customers"));
        assert_eq!(validate("  select * from customers\n"), Ok("select * from customers"));
        assert_eq!(validate("SeLeCt 1"), Ok("SeLeCt 1"));
        assert_eq!(validate("SELECT\n  name\nFROM customers"), Ok("SELECT\n  name\nFROM customers"));
        assert_eq!(validate("SELECT*FROM customers"), Ok("SELECT*FROM customers"));
    }

    #[test]
    fn writes_are_rejected() {
        for sql in [
            "DROP TABLE customers;",
            "INSERT INTO customers VALUES (1)",
            "update customers set name = 'x'",
            "DELETE FROM customers",
            "WITH x AS (SELECT 1) SELECT * FROM x",
            "",
            "   ",
            "SELEC",
            "-- SELECT\nDROP TABLE customers",
        ] {
            assert!(validate(sql).is_err(), "accepted {:?}", sql);
        }
    }

    #[test]
    fn rejection_quotes_the_statement() {
        let err = validate("DROP TABLE customers;").unwrap_err();
        assert_eq!(err.statement, "DROP TABLE customers;");
        assert!(err.to_string().contains("Only SELECT statements are allowed"));
    }

    #[test]
    fn multibyte_prefix_does_not_panic() {
        assert!(validate("ñññ").is_err());
        assert!(validate("sélect 1").is_err());
    }
}
