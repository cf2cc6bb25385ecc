//! REST API endpoints
//!
//! Handlers are generic over [`DatabaseGateway`] and receive the gateway as
//! `State<Arc<G>>`. Failures are rendered as `{"error": "<message>"}` with a
//! status code derived from the error category.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Json, Response},
};
use tracing::{error, warn};

use crate::database::traits::{ErrorKind, GatewayError};

pub mod connection;
pub mod ddl;
pub mod query;
pub mod records;
pub mod tables;

pub use connection::{connect_handler, disconnect_handler, ping_handler};
pub use ddl::{
    add_constraint_handler, alter_table_handler, create_table_handler, drop_constraint_handler,
    drop_table_handler, list_constraints_handler,
};
pub use query::execute_query_handler;
pub use records::{
    delete_record_handler, get_records_handler, insert_record_handler, search_records_handler,
    update_record_handler,
};
pub use tables::{list_columns_handler, list_schemas_handler, list_tables_handler};

/// HTTP status for a gateway error
pub fn status_for(error: &GatewayError) -> StatusCode {
    match error.kind() {
        ErrorKind::Validation | ErrorKind::Unsupported | ErrorKind::ConnectionState => {
            StatusCode::BAD_REQUEST
        }
        ErrorKind::Engine => match error {
            GatewayError::Timeout => StatusCode::REQUEST_TIMEOUT,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        },
    }
}

/// Render a gateway error as a JSON response
///
/// # Arguments
///
/// * `context` - Short description of the failed operation, used in logs
/// * `error` - The error to render
pub fn error_response(context: &str, error: GatewayError) -> Response {
    let status = status_for(&error);
    if status.is_server_error() {
        error!(%error, "{} failed", context);
    } else {
        warn!(%error, "{} rejected", context);
    }

    (
        status,
        Json(serde_json::json!({
            "error": error.to_string()
        })),
    )
        .into_response()
}

/// Parse a boolean query flag: "true", "t" or "1" (case-insensitive); anything else is false
pub(crate) fn parse_flag(value: Option<&str>) -> bool {
    matches!(
        value.map(str::to_ascii_lowercase).as_deref(),
        Some("true") | Some("t") | Some("1")
    )
}
