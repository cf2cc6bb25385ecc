//! Table and constraint management endpoints

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Json, Response},
};
use serde::Deserialize;
use std::sync::Arc;

use super::{error_response, parse_flag};
use crate::database::traits::DatabaseGateway;
use crate::schema::{
    AlterTableRequest, ConstraintSpec, ConstraintsResponse, CreateTableRequest, MessageResponse,
};

/// Query parameters shared by the DDL routes
#[derive(Debug, Default, Deserialize)]
pub struct DdlParams {
    #[serde(default)]
    pub schema: String,

    /// "true", "t" or "1" (any case) appends CASCADE; anything else is ignored
    #[serde(default)]
    pub cascade: Option<String>,
}

/// Handler for POST /schema/tables
///
/// Request body:
/// ```json
/// {
///   "tableName": "users",
///   "columns": [
///     {"name": "id", "type": "SERIAL", "primaryKey": true},
///     {"name": "email", "type": "TEXT", "notNull": true}
///   ]
/// }
/// ```
pub async fn create_table_handler<G: DatabaseGateway>(
    State(gateway): State<Arc<G>>,
    Json(request): Json<CreateTableRequest>,
) -> Response {
    match gateway
        .create_table(&request.schema, &request.table_name, &request.columns)
        .await
    {
        Ok(()) => (
            StatusCode::CREATED,
            Json(MessageResponse::new("table created successfully").with_table(request.table_name)),
        )
            .into_response(),
        Err(error) => error_response("create table", error),
    }
}

/// Handler for PATCH /schema/tables/{table}
///
/// Applies every operation of the body in one ALTER TABLE statement. The
/// schema comes from the body, or from `?schema=` when the body has none.
pub async fn alter_table_handler<G: DatabaseGateway>(
    State(gateway): State<Arc<G>>,
    Path(table_name): Path<String>,
    Query(params): Query<DdlParams>,
    Json(request): Json<AlterTableRequest>,
) -> Response {
    let schema = if request.schema.is_empty() {
        params.schema
    } else {
        request.schema
    };

    match gateway.alter_table(&schema, &table_name, &request.operations).await {
        Ok(()) => (
            StatusCode::OK,
            Json(MessageResponse::new("table altered successfully").with_table(table_name)),
        )
            .into_response(),
        Err(error) => error_response("alter table", error),
    }
}

/// Handler for DELETE /schema/tables/{table}?schema=&cascade=
pub async fn drop_table_handler<G: DatabaseGateway>(
    State(gateway): State<Arc<G>>,
    Path(table_name): Path<String>,
    Query(params): Query<DdlParams>,
) -> Response {
    let cascade = parse_flag(params.cascade.as_deref());

    match gateway.drop_table(&params.schema, &table_name, cascade).await {
        Ok(()) => (
            StatusCode::OK,
            Json(MessageResponse::new("table dropped successfully").with_table(table_name)),
        )
            .into_response(),
        Err(error) => error_response("drop table", error),
    }
}

/// Handler for GET /schema/tables/{table}/constraints?schema=
pub async fn list_constraints_handler<G: DatabaseGateway>(
    State(gateway): State<Arc<G>>,
    Path(table_name): Path<String>,
    Query(params): Query<DdlParams>,
) -> Response {
    match gateway.list_constraints(&params.schema, &table_name).await {
        Ok(constraints) => (StatusCode::OK, Json(ConstraintsResponse { constraints })).into_response(),
        Err(error) => error_response("list constraints", error),
    }
}

/// Handler for POST /schema/constraints
///
/// Request body:
/// ```json
/// {
///   "tableName": "orders",
///   "constraintName": "fk_orders_user",
///   "constraintType": "FOREIGN KEY",
///   "columns": ["user_id"],
///   "refTable": "users",
///   "refColumns": ["id"],
///   "onDelete": "CASCADE"
/// }
/// ```
pub async fn add_constraint_handler<G: DatabaseGateway>(
    State(gateway): State<Arc<G>>,
    Json(spec): Json<ConstraintSpec>,
) -> Response {
    match gateway.add_constraint(&spec).await {
        Ok(()) => (
            StatusCode::CREATED,
            Json(MessageResponse::new("constraint added successfully").with_table(spec.table_name)),
        )
            .into_response(),
        Err(error) => error_response("add constraint", error),
    }
}

/// Handler for DELETE /schema/constraints/{table}/{constraint}?schema=&cascade=
pub async fn drop_constraint_handler<G: DatabaseGateway>(
    State(gateway): State<Arc<G>>,
    Path((table_name, constraint_name)): Path<(String, String)>,
    Query(params): Query<DdlParams>,
) -> Response {
    let cascade = parse_flag(params.cascade.as_deref());

    match gateway
        .drop_constraint(&params.schema, &table_name, &constraint_name, cascade)
        .await
    {
        Ok(()) => (
            StatusCode::OK,
            Json(MessageResponse::new("constraint dropped successfully").with_table(table_name)),
        )
            .into_response(),
        Err(error) => error_response("drop constraint", error),
    }
}
