use serde::Serialize;
use thiserror::Error;
use tracing::{debug, info};

use super::{ColumnInfo, Database, DbError};

/// The slice of the catalog handed to the model: one table and its columns.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SchemaDescription {
    pub table_name: String,
    pub columns: Vec<ColumnInfo>,
}

/// The table a question was matched to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableMatch {
    pub table_name: String,
    /// Advisory text when the match was ambiguous.
    pub warning: Option<String>,
}

#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("Could not detect a table in the question. Known tables: {known:?}")]
    NoMatchingTable { known: Vec<String> },
    #[error("Table '{0}' has no columns")]
    NoColumns(String),
    #[error(transparent)]
    Database(#[from] DbError),
}

/// Looks up tables and columns in one catalog schema.
pub struct SchemaInspector<'a> {
    db: &'a dyn Database,
    schema: &'a str,
}

impl<'a> SchemaInspector<'a> {
    pub fn new(db: &'a dyn Database, schema: &'a str) -> Self {
        Self { db, schema }
    }

    /// Finds the table named in `question`.
    pub async fn detect_table(&self, question: &str) -> Result<TableMatch, CatalogError> {
        let tables = self.db.list_tables(self.schema).await?;
        debug!("Matching question against {} tables in {}", tables.len(), self.schema);

        match match_table(&tables, question) {
            Some(found) => {
                info!("Detected table '{}'", found.table_name);
                Ok(found)
            }
            None => Err(CatalogError::NoMatchingTable { known: tables }),
        }
    }

    pub async fn fetch_schema(&self, table_name: &str) -> Result<SchemaDescription, CatalogError> {
        let columns = self.db.list_columns(self.schema, table_name).await?;
        if columns.is_empty() {
            return Err(CatalogError::NoColumns(table_name.to_string()));
        }

        Ok(SchemaDescription {
            table_name: table_name.to_string(),
            columns,
        })
    }

    /// `detect_table` followed by `fetch_schema`.
    pub async fn schema_for_question(
        &self,
        question: &str,
    ) -> Result<(SchemaDescription, Option<String>), CatalogError> {
        let found = self.detect_table(question).await?;
        let schema = self.fetch_schema(&found.table_name).await?;
        Ok((schema, found.warning))
    }
}

/// Picks the first table (in catalog order) whose name occurs in the question,
/// ignoring case. Several hits still resolve to the first, with a warning.
pub fn match_table(tables: &[String], question: &str) -> Option<TableMatch> {
    let question = question.to_lowercase();
    let candidates: Vec<&String> = tables
        .iter()
        .filter(|name| !name.is_empty() && question.contains(&name.to_lowercase()))
        .collect();

    let first = candidates.first()?;
    let warning = (candidates.len() > 1).then(|| {
        format!(
            "Question matches several tables ({}); using '{}'",
            candidates
                .iter()
                .map(|name| name.as_str())
                .collect::<Vec<_>>()
                .join(", "),
            first
        )
    });

    Some(TableMatch {
        table_name: first.to_string(),
        warning,
    })
}
