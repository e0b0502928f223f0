use crate::config::AppConfig;
use crate::db::catalog::SchemaInspector;
use crate::db::Database;
use crate::llm::prompt::PromptBuilder;
use crate::llm::LlmManager;
use std::sync::Arc;
use tracing::info;

/// Everything a handler needs, built once in `main` and shared read-only.
pub struct AppState {
    pub config: AppConfig,
    pub database: Arc<dyn Database>,
    pub llm_manager: LlmManager,
    pub prompts: PromptBuilder,
    /// Catalog schema scanned for tables
    pub catalog_schema: String,
    pub startup_time: chrono::DateTime<chrono::Utc>,
}

impl AppState {
    pub fn new(
        config: AppConfig,
        database: Arc<dyn Database>,
        llm_manager: LlmManager,
    ) -> Result<Self, minijinja::Error> {
        let catalog_schema = config
            .database
            .schema
            .clone()
            .unwrap_or_else(|| database.default_schema().to_string());
        info!(
            "Serving questions against {} schema '{}'",
            database.backend(),
            catalog_schema
        );

        Ok(Self {
            config,
            database,
            llm_manager,
            prompts: PromptBuilder::new()?,
            catalog_schema,
            startup_time: chrono::Utc::now(),
        })
    }

    pub fn inspector(&self) -> SchemaInspector<'_> {
        SchemaInspector::new(self.database.as_ref(), &self.catalog_schema)
    }
}
