//! SqlGateLayer - Main Axum integration layer
//!
//! This module provides the main entry point for mounting the gateway's REST
//! API into an Axum application.

use crate::database::traits::DatabaseGateway;
use axum::{
    routing::{delete, get, post},
    Router,
};
use std::sync::Arc;
use tower_http::cors::CorsLayer;

#[cfg(feature = "postgres")]
use crate::database::postgres::{GatewayOptions, PostgresGateway};

use crate::api::{
    add_constraint_handler, alter_table_handler, connect_handler, create_table_handler,
    delete_record_handler, disconnect_handler, drop_constraint_handler, drop_table_handler,
    execute_query_handler, get_records_handler, insert_record_handler, list_columns_handler,
    list_constraints_handler, list_schemas_handler, list_tables_handler, ping_handler,
    search_records_handler, update_record_handler,
};

/// Main layer for mounting the gateway API into an Axum application
///
/// # Example
///
/// ```rust,no_run
/// use axum::Router;
/// use sqlgate::{GatewayOptions, SqlGateLayer};
///
/// let layer = SqlGateLayer::postgres("/db", GatewayOptions::default());
/// let app: Router = Router::new().merge(layer.into_router());
/// ```
pub struct SqlGateLayer<G: DatabaseGateway> {
    base_path: String,
    gateway: Arc<G>,
}

impl<G: DatabaseGateway> SqlGateLayer<G> {
    /// Create a new layer at the given base path
    ///
    /// # Arguments
    ///
    /// * `base_path` - The URL path where the API will be mounted (e.g., "/db"); empty mounts at the root
    /// * `gateway` - The database gateway implementation
    pub fn new(base_path: impl Into<String>, gateway: G) -> Self {
        Self::with_shared(base_path, Arc::new(gateway))
    }

    /// Create a new layer around a gateway that is also used elsewhere
    pub fn with_shared(base_path: impl Into<String>, gateway: Arc<G>) -> Self {
        Self {
            base_path: normalize_base_path(&base_path.into()),
            gateway,
        }
    }

    /// The gateway served by this layer
    pub fn gateway(&self) -> &Arc<G> {
        &self.gateway
    }

    pub fn base_path(&self) -> &str {
        &self.base_path
    }

    /// Convert into an Axum Router that can be merged
    ///
    /// The returned router includes:
    /// - API endpoints at `{base_path}/*`
    /// - Permissive CORS middleware
    pub fn into_router(self) -> Router {
        let api_router = Router::new()
            .route("/ping", get(ping_handler))
            .route("/connect", post(connect_handler::<G>))
            .route("/disconnect", post(disconnect_handler::<G>))
            .route("/schemas", get(list_schemas_handler::<G>))
            .route("/tables", get(list_tables_handler::<G>))
            .route("/columns", get(list_columns_handler::<G>))
            .route("/query", post(execute_query_handler::<G>))
            .route(
                "/records",
                get(get_records_handler::<G>)
                    .post(insert_record_handler::<G>)
                    .put(update_record_handler::<G>)
                    .delete(delete_record_handler::<G>),
            )
            .route("/records/search", post(search_records_handler::<G>))
            .route("/schema/tables", post(create_table_handler::<G>))
            .route(
                "/schema/tables/{table}",
                delete(drop_table_handler::<G>).patch(alter_table_handler::<G>),
            )
            .route(
                "/schema/tables/{table}/constraints",
                get(list_constraints_handler::<G>),
            )
            .route("/schema/constraints", post(add_constraint_handler::<G>))
            .route(
                "/schema/constraints/{table}/{constraint}",
                delete(drop_constraint_handler::<G>),
            )
            .with_state(self.gateway);

        // Axum 0.8 refuses to nest at the root
        let router = if self.base_path.is_empty() {
            api_router
        } else {
            Router::new().nest(&self.base_path, api_router)
        };

        router.layer(CorsLayer::permissive())
    }
}

/// "/db/" and "db" both become "/db"; "" and "/" become ""
fn normalize_base_path(base_path: &str) -> String {
    let trimmed = base_path.trim().trim_matches('/');
    if trimmed.is_empty() {
        String::new()
    } else {
        format!("/{}", trimmed)
    }
}

#[cfg(feature = "postgres")]
impl SqlGateLayer<PostgresGateway> {
    /// Create a new layer with a disconnected PostgreSQL gateway
    ///
    /// # Arguments
    ///
    /// * `base_path` - The URL path where the API will be mounted
    /// * `options` - Pool and timeout settings used by every connect
    pub fn postgres(base_path: impl Into<String>, options: GatewayOptions) -> Self {
        Self::new(base_path, PostgresGateway::new(options))
    }
}
