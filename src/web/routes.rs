use axum::{
    routing::{get, post},
    Router,
};
use std::sync::Arc;

use super::handlers;
use super::state::AppState;

// API Routes - natural language to SQL
pub fn api_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/generate-sql", post(handlers::api::generate_sql))
        .route("/execute-sql", post(handlers::api::execute_sql))
        .route("/status", get(handlers::api::system_status))
}
