//! Catalog listing endpoints

use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::{IntoResponse, Json, Response},
};
use serde::Deserialize;
use std::sync::Arc;

use super::error_response;
use crate::database::traits::DatabaseGateway;
use crate::schema::{ColumnsResponse, SchemasResponse, TablesResponse};

/// Query parameters naming a schema and, optionally, a table
#[derive(Debug, Default, Deserialize)]
pub struct TableParams {
    #[serde(default)]
    pub schema: String,
    #[serde(default)]
    pub table: String,
}

/// Handler for GET /schemas
pub async fn list_schemas_handler<G: DatabaseGateway>(State(gateway): State<Arc<G>>) -> Response {
    match gateway.list_schemas().await {
        Ok(schemas) => (StatusCode::OK, Json(SchemasResponse { schemas })).into_response(),
        Err(error) => error_response("list schemas", error),
    }
}

/// Handler for GET /tables?schema=
///
/// Returns the table names of a schema ("public" when omitted).
pub async fn list_tables_handler<G: DatabaseGateway>(
    State(gateway): State<Arc<G>>,
    Query(params): Query<TableParams>,
) -> Response {
    match gateway.list_tables(&params.schema).await {
        Ok(tables) => (StatusCode::OK, Json(TablesResponse { tables })).into_response(),
        Err(error) => error_response("list tables", error),
    }
}

/// Handler for GET /columns?schema=&table=
///
/// Returns one entry per column with its type, nullability, default,
/// unique flag and foreign-key definition.
pub async fn list_columns_handler<G: DatabaseGateway>(
    State(gateway): State<Arc<G>>,
    Query(params): Query<TableParams>,
) -> Response {
    match gateway.list_columns(&params.schema, &params.table).await {
        Ok(columns) => (StatusCode::OK, Json(ColumnsResponse { columns })).into_response(),
        Err(error) => error_response("list columns", error),
    }
}
