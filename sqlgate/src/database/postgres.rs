//! PostgreSQL gateway implementation

use crate::builder::{self, ColumnTypes, Statement};
use crate::database::scan;
use crate::database::traits::{DatabaseGateway, GatewayError};
use crate::identifier::schema_or_default;
use crate::schema::{
    AlterOperation, AlterTableOperation, ColumnDefinition, ColumnInfo, ConstraintInfo,
    ConstraintSpec, QueryRequest, QueryResult, Record, ResultSet, TableData, TableDataQuery,
};
use crate::value::Value;
use async_trait::async_trait;
use sqlx::postgres::{PgArguments, PgPool, PgPoolOptions};
use sqlx::{Column, Connection, Executor, Postgres, Row, Statement as _};
use std::future::Future;
use std::time::{Duration, Instant};
use tokio::sync::RwLock;
use tracing::{debug, info};

type PgQuery<'q> = sqlx::query::Query<'q, Postgres, PgArguments>;

/// Settings applied to every connection the gateway opens
#[derive(Debug, Clone)]
pub struct GatewayOptions {
    /// Maximum pool size handed to the driver
    pub max_connections: u32,

    /// How long to wait for a pooled connection
    pub acquire_timeout: Duration,

    /// Upper bound for a single engine call; `None` waits indefinitely
    pub query_timeout: Option<Duration>,
}

impl Default for GatewayOptions {
    fn default() -> Self {
        Self {
            max_connections: 5,
            acquire_timeout: Duration::from_secs(10),
            query_timeout: Some(Duration::from_secs(30)),
        }
    }
}

const LIST_SCHEMAS_QUERY: &str = r#"
    SELECT schema_name::text
    FROM information_schema.schemata
    ORDER BY schema_name
"#;

const LIST_TABLES_QUERY: &str = r#"
    SELECT table_name::text
    FROM information_schema.tables
    WHERE table_schema = $1
    ORDER BY table_name
"#;

const LIST_COLUMNS_QUERY: &str = r#"
    SELECT
        c.column_name::text AS column_name,
        c.data_type::text AS data_type,
        c.is_nullable::text AS is_nullable,
        c.column_default::text AS column_default,
        EXISTS (
            SELECT 1
            FROM information_schema.table_constraints tc
            JOIN information_schema.constraint_column_usage ccu
              ON tc.constraint_name = ccu.constraint_name
              AND tc.table_schema = ccu.table_schema
            WHERE tc.constraint_type = 'UNIQUE'
              AND tc.table_schema = c.table_schema
              AND tc.table_name = c.table_name
              AND ccu.column_name = c.column_name
        ) AS is_unique,
        (
            SELECT pg_get_constraintdef(con.oid)
            FROM pg_constraint con
            JOIN pg_class rel ON rel.oid = con.conrelid
            JOIN pg_namespace nsp ON nsp.oid = rel.relnamespace
            JOIN pg_attribute att ON att.attrelid = rel.oid AND att.attnum = ANY(con.conkey)
            WHERE con.contype = 'f'
              AND nsp.nspname = $1
              AND rel.relname = $2
              AND att.attname = c.column_name
            LIMIT 1
        ) AS foreign_key
    FROM information_schema.columns c
    WHERE c.table_schema = $1
      AND c.table_name = $2
    ORDER BY c.ordinal_position
"#;

const LIST_CONSTRAINTS_QUERY: &str = r#"
    SELECT
        con.conname::text AS constraint_name,
        CASE con.contype
            WHEN 'p' THEN 'PRIMARY KEY'
            WHEN 'f' THEN 'FOREIGN KEY'
            WHEN 'u' THEN 'UNIQUE'
            WHEN 'c' THEN 'CHECK'
            WHEN 'x' THEN 'EXCLUDE'
            ELSE con.contype::text
        END AS constraint_type,
        rel.relname::text AS table_name,
        pg_get_constraintdef(con.oid) AS definition
    FROM pg_constraint con
    JOIN pg_class rel ON rel.oid = con.conrelid
    JOIN pg_namespace nsp ON nsp.oid = rel.relnamespace
    WHERE nsp.nspname = $1
      AND rel.relname = $2
    ORDER BY con.conname
"#;

// Type text without modifiers: an explicit cast to varchar(n) would truncate silently
const COLUMN_TYPES_QUERY: &str = r#"
    SELECT
        a.attname::text AS column_name,
        format_type(a.atttypid, NULL) AS column_type
    FROM pg_attribute a
    JOIN pg_class c ON c.oid = a.attrelid
    JOIN pg_namespace n ON n.oid = c.relnamespace
    WHERE n.nspname = $1
      AND c.relname = $2
      AND a.attnum > 0
      AND NOT a.attisdropped
"#;

/// PostgreSQL gateway
///
/// Holds at most one live pool. [`connect`](DatabaseGateway::connect)
/// swaps in the new pool, then closes the superseded one: it stops handing
/// out connections at once, and `connect` returns only after every
/// connection checked out from it has been released.
///
/// Caller-supplied SQL is never kept in the driver's statement cache.
pub struct PostgresGateway {
    pool: RwLock<Option<PgPool>>,
    options: GatewayOptions,
}

impl PostgresGateway {
    /// Create a disconnected gateway
    pub fn new(options: GatewayOptions) -> Self {
        Self {
            pool: RwLock::new(None),
            options,
        }
    }

    /// Clone the active pool handle, or fail without any I/O
    async fn pool(&self) -> Result<PgPool, GatewayError> {
        self.pool.read().await.clone().ok_or(GatewayError::NotConnected)
    }

    /// Run an engine call under the configured query timeout
    async fn bounded<T, F>(&self, future: F) -> Result<T, GatewayError>
    where
        F: Future<Output = Result<T, sqlx::Error>>,
    {
        match self.options.query_timeout {
            Some(limit) => tokio::time::timeout(limit, future)
                .await
                .map_err(|_| GatewayError::Timeout)?
                .map_err(GatewayError::from),
            None => future.await.map_err(GatewayError::from),
        }
    }

    fn bind_value<'q>(query: PgQuery<'q>, value: &Value) -> PgQuery<'q> {
        match value {
            Value::Null => query.bind(None::<String>),
            Value::Integer(integer) => query.bind(*integer),
            Value::Float(float) => query.bind(*float),
            Value::Text(text) | Value::Other(text) => query.bind(text.clone()),
            Value::Boolean(boolean) => query.bind(*boolean),
            Value::Binary(bytes) => query.bind(bytes.clone()),
        }
    }

    /// Unnamed, uncached statement with every argument bound in order
    fn bind_arguments(statement: &Statement) -> PgQuery<'_> {
        statement
            .arguments
            .iter()
            .fold(sqlx::query(&statement.sql), Self::bind_value)
            .persistent(false)
    }

    /// Execute a statement that returns no rows
    async fn execute_statement(&self, pool: &PgPool, statement: &Statement) -> Result<u64, GatewayError> {
        debug!(
            sql = %statement.sql,
            arguments = ?statement.arguments.iter().map(crate::value::Value::kind).collect::<Vec<_>>(),
            "executing statement"
        );
        let result = self.bounded(Self::bind_arguments(statement).execute(pool)).await?;
        Ok(result.rows_affected())
    }

    /// Execute a statement and scan every row into a result set
    async fn fetch_result_set(&self, pool: &PgPool, statement: &Statement) -> Result<ResultSet, GatewayError> {
        debug!(
            sql = %statement.sql,
            arguments = ?statement.arguments.iter().map(crate::value::Value::kind).collect::<Vec<_>>(),
            "fetching rows"
        );
        let rows = self.bounded(Self::bind_arguments(statement).fetch_all(pool)).await?;

        let columns = match rows.first() {
            Some(row) => scan::column_names(row),
            None => self.describe_columns(pool, &statement.sql).await?,
        };

        let rows = rows
            .iter()
            .map(scan::scan_row)
            .collect::<Result<Vec<_>, _>>()?;

        ResultSet::new(columns, rows)
    }

    /// Column names of a statement, taken from the engine's description
    ///
    /// Describing always caches the prepared statement on the connection, so
    /// the cache is cleared before the connection goes back to the pool.
    async fn describe_columns(&self, pool: &PgPool, sql: &str) -> Result<Vec<String>, GatewayError> {
        let mut connection = self.bounded(pool.acquire()).await?;
        let described = self.bounded((&mut *connection).prepare(sql)).await;
        self.bounded(connection.clear_cached_statements()).await?;

        Ok(described?
            .columns()
            .iter()
            .map(|column| column.name().to_string())
            .collect())
    }

    /// Look up the catalog type of every column of a table
    async fn column_types(&self, pool: &PgPool, schema: &str, table: &str) -> Result<ColumnTypes, GatewayError> {
        let rows = self
            .bounded(
                sqlx::query(COLUMN_TYPES_QUERY)
                    .bind(schema_or_default(schema))
                    .bind(table)
                    .fetch_all(pool),
            )
            .await?;

        rows.iter()
            .map(|row| {
                let name: String = row.try_get("column_name")?;
                let column_type: String = row.try_get("column_type")?;
                Ok((name, column_type))
            })
            .collect::<Result<ColumnTypes, sqlx::Error>>()
            .map_err(GatewayError::from)
    }

    /// Build a statement whose placeholders are cast to the target column types
    ///
    /// The request is first built without types so that validation failures
    /// surface before the catalog is consulted.
    async fn build_typed<T, B>(&self, pool: &PgPool, schema: &str, table: &str, build: B) -> Result<T, GatewayError>
    where
        B: Fn(&ColumnTypes) -> Result<T, GatewayError> + Send,
    {
        build(&ColumnTypes::new())?;
        let column_types = self.column_types(pool, schema, table).await?;
        build(&column_types)
    }
}

impl Default for PostgresGateway {
    fn default() -> Self {
        Self::new(GatewayOptions::default())
    }
}

#[async_trait]
impl DatabaseGateway for PostgresGateway {
    fn driver(&self) -> &'static str {
        "postgres"
    }

    async fn connect(&self, dsn: &str) -> Result<(), GatewayError> {
        let pool = PgPoolOptions::new()
            .max_connections(self.options.max_connections)
            .acquire_timeout(self.options.acquire_timeout)
            .connect(dsn)
            .await?;

        // Liveness probe
        if let Err(error) = self.bounded(sqlx::query("SELECT 1").execute(&pool)).await {
            pool.close().await;
            return Err(error);
        }

        let previous = self.pool.write().await.replace(pool);
        if let Some(previous) = previous {
            previous.close().await;
            info!("closed superseded database connection");
        }

        info!("database connection established");
        Ok(())
    }

    async fn disconnect(&self) -> Result<(), GatewayError> {
        let previous = self.pool.write().await.take();
        if let Some(pool) = previous {
            pool.close().await;
            info!("database connection closed");
        }
        Ok(())
    }

    async fn is_connected(&self) -> bool {
        self.pool.read().await.is_some()
    }

    async fn list_schemas(&self) -> Result<Vec<String>, GatewayError> {
        let pool = self.pool().await?;
        self.bounded(sqlx::query_scalar::<_, String>(LIST_SCHEMAS_QUERY).fetch_all(&pool))
            .await
    }

    async fn list_tables(&self, schema: &str) -> Result<Vec<String>, GatewayError> {
        let pool = self.pool().await?;
        self.bounded(
            sqlx::query_scalar::<_, String>(LIST_TABLES_QUERY)
                .bind(schema_or_default(schema))
                .fetch_all(&pool),
        )
        .await
    }

    async fn list_columns(&self, schema: &str, table: &str) -> Result<Vec<ColumnInfo>, GatewayError> {
        if table.is_empty() {
            return Err(GatewayError::Validation("missing table name".to_string()));
        }

        let pool = self.pool().await?;
        debug!(schema = schema_or_default(schema), table, "listing columns");

        let rows = self
            .bounded(
                sqlx::query(LIST_COLUMNS_QUERY)
                    .bind(schema_or_default(schema))
                    .bind(table)
                    .fetch_all(&pool),
            )
            .await?;

        rows.iter()
            .map(|row| {
                let is_nullable: String = row.try_get("is_nullable")?;
                Ok(ColumnInfo {
                    name: row.try_get("column_name")?,
                    data_type: row.try_get("data_type")?,
                    nullable: is_nullable == "YES",
                    default: row.try_get("column_default")?,
                    is_unique: row.try_get::<Option<bool>, _>("is_unique")?.unwrap_or(false),
                    foreign_key: row.try_get("foreign_key")?,
                })
            })
            .collect::<Result<Vec<_>, sqlx::Error>>()
            .map_err(GatewayError::from)
    }

    async fn execute_query(&self, request: &QueryRequest) -> Result<QueryResult, GatewayError> {
        let pool = self.pool().await?;
        let returns_rows = request
            .returns_rows
            .unwrap_or_else(|| builder::looks_like_select(&request.sql));
        let start_time = Instant::now();

        if returns_rows {
            let statement = Statement {
                sql: request.sql.clone(),
                arguments: Vec::new(),
            };
            let result = self.fetch_result_set(&pool, &statement).await?;

            Ok(QueryResult {
                result,
                affected_rows: 0,
                execution_time_milliseconds: start_time.elapsed().as_millis() as u64,
            })
        } else {
            debug!(sql = %request.sql, "executing write statement");
            // Simple protocol: accepts several statements separated by semicolons
            let outcome = self.bounded(sqlx::raw_sql(&request.sql).execute(&pool)).await?;

            Ok(QueryResult {
                result: ResultSet::empty(),
                affected_rows: outcome.rows_affected(),
                execution_time_milliseconds: start_time.elapsed().as_millis() as u64,
            })
        }
    }

    async fn get_table_data(&self, query: &TableDataQuery) -> Result<TableData, GatewayError> {
        let pool = self.pool().await?;
        let select = self
            .build_typed(&pool, &query.schema, &query.table, |column_types| {
                builder::select_table_data(query, column_types)
            })
            .await?;

        let result = self.fetch_result_set(&pool, &select.statement).await?;

        Ok(TableData {
            result,
            ignored_filters: select.ignored_filters,
        })
    }

    async fn insert_record(&self, schema: &str, table: &str, data: &Record) -> Result<u64, GatewayError> {
        let pool = self.pool().await?;
        let statement = self
            .build_typed(&pool, schema, table, |column_types| {
                builder::insert_record(schema, table, data, column_types)
            })
            .await?;
        self.execute_statement(&pool, &statement).await
    }

    async fn update_record(
        &self,
        schema: &str,
        table: &str,
        data: &Record,
        conditions: &Record,
    ) -> Result<u64, GatewayError> {
        let pool = self.pool().await?;
        let statement = self
            .build_typed(&pool, schema, table, |column_types| {
                builder::update_record(schema, table, data, conditions, column_types)
            })
            .await?;
        self.execute_statement(&pool, &statement).await
    }

    async fn delete_record(&self, schema: &str, table: &str, conditions: &Record) -> Result<u64, GatewayError> {
        let pool = self.pool().await?;
        let statement = self
            .build_typed(&pool, schema, table, |column_types| {
                builder::delete_record(schema, table, conditions, column_types)
            })
            .await?;
        self.execute_statement(&pool, &statement).await
    }

    async fn create_table(
        &self,
        schema: &str,
        table: &str,
        columns: &[ColumnDefinition],
    ) -> Result<(), GatewayError> {
        let pool = self.pool().await?;
        let statement = builder::create_table(schema, table, columns)?;
        self.execute_statement(&pool, &statement).await?;
        info!(schema = schema_or_default(schema), table, "table created");
        Ok(())
    }

    async fn alter_table(
        &self,
        schema: &str,
        table: &str,
        operations: &[AlterTableOperation],
    ) -> Result<(), GatewayError> {
        let pool = self.pool().await?;
        let operations = operations
            .iter()
            .map(AlterOperation::try_from)
            .collect::<Result<Vec<_>, _>>()?;
        let statement = builder::alter_table(schema, table, &operations)?;
        debug!(sql = %statement.sql, "altering table");
        // Simple protocol: the statements run as one implicit transaction
        self.bounded(sqlx::raw_sql(&statement.sql).execute(&pool)).await?;
        info!(schema = schema_or_default(schema), table, operations = operations.len(), "table altered");
        Ok(())
    }

    async fn drop_table(&self, schema: &str, table: &str, cascade: bool) -> Result<(), GatewayError> {
        let pool = self.pool().await?;
        let statement = builder::drop_table(schema, table, cascade)?;
        self.execute_statement(&pool, &statement).await?;
        info!(schema = schema_or_default(schema), table, cascade, "table dropped");
        Ok(())
    }

    async fn add_constraint(&self, spec: &ConstraintSpec) -> Result<(), GatewayError> {
        let pool = self.pool().await?;
        let statement = builder::add_constraint(spec)?;
        self.execute_statement(&pool, &statement).await?;
        Ok(())
    }

    async fn drop_constraint(
        &self,
        schema: &str,
        table: &str,
        constraint: &str,
        cascade: bool,
    ) -> Result<(), GatewayError> {
        let pool = self.pool().await?;
        let statement = builder::drop_constraint(schema, table, constraint, cascade)?;
        self.execute_statement(&pool, &statement).await?;
        Ok(())
    }

    async fn list_constraints(&self, schema: &str, table: &str) -> Result<Vec<ConstraintInfo>, GatewayError> {
        if table.is_empty() {
            return Err(GatewayError::Validation("missing table name".to_string()));
        }

        let pool = self.pool().await?;
        let rows = self
            .bounded(
                sqlx::query(LIST_CONSTRAINTS_QUERY)
                    .bind(schema_or_default(schema))
                    .bind(table)
                    .fetch_all(&pool),
            )
            .await?;

        rows.iter()
            .map(|row| {
                Ok(ConstraintInfo {
                    constraint_name: row.try_get("constraint_name")?,
                    constraint_type: row.try_get("constraint_type")?,
                    table_name: row.try_get("table_name")?,
                    definition: row.try_get("definition")?,
                })
            })
            .collect::<Result<Vec<_>, sqlx::Error>>()
            .map_err(GatewayError::from)
    }
}
