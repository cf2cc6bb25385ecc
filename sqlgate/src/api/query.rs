//! Raw SQL query execution endpoint

use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Json, Response},
};
use std::sync::Arc;
use tracing::debug;

use super::error_response;
use crate::database::traits::DatabaseGateway;
use crate::schema::QueryRequest;

/// Handler for POST /query
///
/// # Security Warning
///
/// This endpoint allows executing ANY SQL statement including DDL and DELETE.
///
/// Request body:
/// ```json
/// {
///   "sql": "SELECT * FROM users LIMIT 10",
///   "returnsRows": true
/// }
/// ```
///
/// `returnsRows` is optional; when absent, statements starting with SELECT
/// are read, everything else is executed as a write.
///
/// Response (read):
/// ```json
/// {
///   "columns": ["id", "name", "email"],
///   "rows": [...],
///   "affectedRows": 0,
///   "executionTimeMilliseconds": 12
/// }
/// ```
///
/// Response (write):
/// ```json
/// {
///   "columns": [],
///   "rows": [],
///   "affectedRows": 5,
///   "executionTimeMilliseconds": 8
/// }
/// ```
pub async fn execute_query_handler<G: DatabaseGateway>(
    State(gateway): State<Arc<G>>,
    Json(request): Json<QueryRequest>,
) -> Response {
    debug!(sql = %request.sql, returns_rows = ?request.returns_rows, "executing query");

    match gateway.execute_query(&request).await {
        Ok(result) => (StatusCode::OK, Json(result)).into_response(),
        Err(error) => error_response("execute query", error),
    }
}
