//! # sqlgate
//!
//! A database administration gateway for PostgreSQL, easily integrable as an Axum layer.
//!
//! ## Features
//!
//! - Schema, table, column and constraint discovery
//! - Paginated, filtered table reads
//! - Record insert / update / delete with bound parameters
//! - CREATE / ALTER / DROP TABLE and constraint management
//! - Raw SQL query execution
//!
//! Every caller-supplied identifier is validated against
//! `[A-Za-z_][A-Za-z0-9_]*` and quoted before it is embedded in SQL text;
//! values are always sent as bound parameters.
//!
//! ## Security Warning
//!
//! **This is an administration tool!**
//!
//! - No authentication/authorization built-in
//! - Exposes full database schema and data
//! - Raw query execution allows full database access (DDL, INSERT/UPDATE/DELETE)
//! - Should never be exposed on public networks
//!
//! ## Example Usage
//!
//! ```rust,no_run
//! use axum::{Router, routing::get};
//! use sqlgate::{DatabaseGateway, GatewayOptions, SqlGateLayer};
//!
//! #[tokio::main]
//! async fn main() {
//!     let layer = SqlGateLayer::postgres("/db", GatewayOptions::default());
//!     layer
//!         .gateway()
//!         .connect("postgres://localhost/app")
//!         .await
//!         .unwrap();
//!
//!     let app: Router = Router::new()
//!         .route("/", get(|| async { "Hello, World!" }))
//!         .merge(layer.into_router());
//!
//!     // Serve the application...
//! }
//! ```

pub mod api;
pub mod builder;
pub mod database;
pub mod identifier;
pub mod layer;
pub mod schema;
pub mod value;

pub use layer::SqlGateLayer;
pub use schema::{ColumnInfo, ConstraintInfo, QueryResult, ResultSet, TableData, TableDataQuery};
pub use value::Value;

pub use database::traits::{DatabaseGateway, ErrorKind, GatewayError};

#[cfg(feature = "postgres")]
pub use database::postgres::{GatewayOptions, PostgresGateway};

pub type Result<T> = std::result::Result<T, GatewayError>;
