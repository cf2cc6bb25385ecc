//! Database gateway trait
//!
//! This trait defines the interface that every engine-specific gateway must
//! provide. The HTTP layer only ever talks to a `DatabaseGateway`.

use crate::schema::{
    AlterTableOperation, ColumnDefinition, ColumnInfo, ConstraintInfo, ConstraintSpec,
    QueryRequest, QueryResult, Record, TableData, TableDataQuery,
};
use async_trait::async_trait;
use thiserror::Error;

/// Gateway over one live database connection
///
/// A gateway starts disconnected. Every operation other than `connect`,
/// `disconnect` and `is_connected` fails with [`GatewayError::NotConnected`]
/// until a connection has been established.
#[async_trait]
pub trait DatabaseGateway: Send + Sync + 'static {
    /// Driver name accepted by [`connect`](Self::connect) (e.g., "postgres")
    fn driver(&self) -> &'static str;

    /// Open a connection and verify it with a liveness probe
    ///
    /// On success the new connection replaces any previous one, which is
    /// closed. On failure the previous state is left untouched.
    async fn connect(&self, dsn: &str) -> Result<(), GatewayError>;

    /// Close the active connection; a no-op when already disconnected
    async fn disconnect(&self) -> Result<(), GatewayError>;

    async fn is_connected(&self) -> bool;

    /// List all schema names
    async fn list_schemas(&self) -> Result<Vec<String>, GatewayError>;

    /// List table names in a schema ("public" when empty)
    async fn list_tables(&self, schema: &str) -> Result<Vec<String>, GatewayError>;

    /// Describe every column of a table, one row per column
    async fn list_columns(&self, schema: &str, table: &str) -> Result<Vec<ColumnInfo>, GatewayError>;

    /// Execute an ad-hoc statement
    ///
    /// # Security Warning
    ///
    /// This allows executing any SQL statement including DDL and DELETE.
    async fn execute_query(&self, request: &QueryRequest) -> Result<QueryResult, GatewayError>;

    /// Fetch rows with filtering, ordering and pagination
    async fn get_table_data(&self, query: &TableDataQuery) -> Result<TableData, GatewayError>;

    /// Insert one record, returning the affected row count
    async fn insert_record(&self, schema: &str, table: &str, data: &Record) -> Result<u64, GatewayError>;

    /// Update records matching every condition, returning the affected row count
    async fn update_record(
        &self,
        schema: &str,
        table: &str,
        data: &Record,
        conditions: &Record,
    ) -> Result<u64, GatewayError>;

    /// Delete records matching every condition, returning the affected row count
    async fn delete_record(&self, schema: &str, table: &str, conditions: &Record) -> Result<u64, GatewayError>;

    async fn create_table(
        &self,
        schema: &str,
        table: &str,
        columns: &[ColumnDefinition],
    ) -> Result<(), GatewayError>;

    /// Apply every operation in one ALTER TABLE statement
    async fn alter_table(
        &self,
        schema: &str,
        table: &str,
        operations: &[AlterTableOperation],
    ) -> Result<(), GatewayError>;

    async fn drop_table(&self, schema: &str, table: &str, cascade: bool) -> Result<(), GatewayError>;

    async fn add_constraint(&self, spec: &ConstraintSpec) -> Result<(), GatewayError>;

    async fn drop_constraint(
        &self,
        schema: &str,
        table: &str,
        constraint: &str,
        cascade: bool,
    ) -> Result<(), GatewayError>;

    /// List every constraint on a table with its human-readable definition
    async fn list_constraints(&self, schema: &str, table: &str) -> Result<Vec<ConstraintInfo>, GatewayError>;
}

/// Broad category of a [`GatewayError`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Malformed request, rejected before any SQL was sent
    Validation,
    /// Operation attempted without an active connection
    ConnectionState,
    /// The database rejected or failed the statement
    Engine,
    /// Unknown DDL action, constraint type or driver
    Unsupported,
}

/// Gateway error type
#[derive(Debug, Error)]
pub enum GatewayError {
    /// Identifier failed validation
    #[error("invalid identifier: {0}")]
    InvalidIdentifier(String),

    /// Missing or empty required field
    #[error("{0}")]
    Validation(String),

    /// No connection has been established
    #[error("no active connection")]
    NotConnected,

    #[error("unsupported action: {0}")]
    UnsupportedAction(String),

    #[error("unsupported constraint type: {0}")]
    UnsupportedConstraint(String),

    #[error("unsupported driver: {0}")]
    UnsupportedDriver(String),

    /// Query timeout
    #[error("query timeout exceeded")]
    Timeout,

    /// Error reported by the database, message passed through verbatim
    #[error("{0}")]
    Engine(String),
}

impl GatewayError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            GatewayError::InvalidIdentifier(_) | GatewayError::Validation(_) => ErrorKind::Validation,
            GatewayError::NotConnected => ErrorKind::ConnectionState,
            GatewayError::UnsupportedAction(_)
            | GatewayError::UnsupportedConstraint(_)
            | GatewayError::UnsupportedDriver(_) => ErrorKind::Unsupported,
            GatewayError::Timeout | GatewayError::Engine(_) => ErrorKind::Engine,
        }
    }
}

impl From<sqlx::Error> for GatewayError {
    fn from(error: sqlx::Error) -> Self {
        match error {
            sqlx::Error::Database(database_error) => {
                GatewayError::Engine(database_error.message().to_string())
            }
            other => GatewayError::Engine(other.to_string()),
        }
    }
}
