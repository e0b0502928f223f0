use axum::{
    extract::{rejection::JsonRejection, State},
    Json,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info};

use crate::db::Row;
use crate::safety;
use crate::web::error::AppError;
use crate::web::state::AppState;

#[derive(Debug, Deserialize, Clone)]
pub struct QueryRequest {
    pub question: String,
}

#[derive(Debug, Serialize)]
pub struct GenerateSqlResponse {
    pub sql: String,
    pub warning: String,
}

#[derive(Debug, Serialize)]
pub struct ExecuteSqlResponse {
    pub sql: String,
    pub rows: Vec<Row>,
}

#[derive(Debug, Serialize)]
pub struct SystemStatus {
    pub version: String,
    pub backend: String,
    pub model: String,
    pub uptime_seconds: i64,
}

/// Question → table → schema → prompt → model → safety gate.
async fn vetted_sql(
    state: &AppState,
    question: &str,
) -> Result<(String, Option<String>), AppError> {
    if question.trim().is_empty() {
        return Err(AppError::Validation("question must not be empty".to_string()));
    }
    debug!("Question: {}", question);

    let (schema, warning) = state.inspector().schema_for_question(question).await?;
    let prompt = state.prompts.render(question, &schema)?;
    let candidate = state.llm_manager.generate_sql(&prompt).await?;
    let sql = safety::validate(&candidate)?.to_string();

    Ok((sql, warning))
}

pub async fn generate_sql(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<QueryRequest>, JsonRejection>,
) -> Result<Json<GenerateSqlResponse>, AppError> {
    let Json(request) = payload?;
    let (sql, warning) = vetted_sql(&state, &request.question).await?;

    Ok(Json(GenerateSqlResponse {
        sql,
        warning: warning.unwrap_or_default(),
    }))
}

pub async fn execute_sql(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<QueryRequest>, JsonRejection>,
) -> Result<Json<ExecuteSqlResponse>, AppError> {
    let Json(request) = payload?;
    let (sql, _warning) = vetted_sql(&state, &request.question).await?;

    let start_time = Instant::now();
    let rows = state.database.fetch_rows(&sql).await?;
    info!(
        "Query executed successfully. Row count: {}, Execution time: {}ms",
        rows.len(),
        start_time.elapsed().as_millis()
    );

    Ok(Json(ExecuteSqlResponse { sql, rows }))
}

pub async fn system_status(State(state): State<Arc<AppState>>) -> Json<SystemStatus> {
    let uptime = chrono::Utc::now() - state.startup_time;
    Json(SystemStatus {
        version: env!("CARGO_PKG_VERSION").to_string(),
        backend: state.database.backend().to_string(),
        model: state.config.llm.model.clone(),
        uptime_seconds: uptime.num_seconds(),
    })
}
