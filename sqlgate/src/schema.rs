//! Request and result types
//!
//! Structured entities accepted from callers (column definitions, alter
//! operations, constraint specifications, table-data queries) and the shapes
//! returned to them (result sets, column and constraint descriptions).

use crate::database::traits::GatewayError;
use crate::value::Value;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Column name to value map used by insert, update and delete
///
/// Ordered by column name, which fixes the placeholder order of the built
/// statement.
pub type Record = BTreeMap<String, Value>;

// ---------------------------------------------------------------------------
// DDL entities
// ---------------------------------------------------------------------------

/// Column definition used when creating a table
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ColumnDefinition {
    /// Column name
    pub name: String,

    /// Raw SQL type (e.g., "INTEGER", "VARCHAR(255)")
    #[serde(rename = "type")]
    pub data_type: String,

    /// Whether the column takes part in the primary key
    #[serde(default)]
    pub primary_key: bool,

    /// Whether the column is declared NOT NULL
    #[serde(default)]
    pub not_null: bool,

    /// Raw default expression (if any)
    #[serde(default)]
    pub default: Option<String>,
}

/// Wire form of a single ALTER TABLE operation
///
/// `action` is one of `add_column`, `drop_column`, `rename_column` or
/// `alter_column`. Converted into [`AlterOperation`] before any SQL is built.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AlterTableOperation {
    pub action: String,

    #[serde(default)]
    pub column_name: String,

    #[serde(default)]
    pub new_name: Option<String>,

    #[serde(rename = "type", default)]
    pub data_type: Option<String>,

    #[serde(default)]
    pub not_null: Option<bool>,

    #[serde(default)]
    pub default: Option<String>,
}

/// A validated ALTER TABLE operation
#[derive(Debug, Clone, PartialEq)]
pub enum AlterOperation {
    AddColumn {
        column: String,
        data_type: String,
    },
    DropColumn {
        column: String,
    },
    RenameColumn {
        column: String,
        new_name: String,
    },
    /// Each present field becomes its own sub-clause
    AlterColumn {
        column: String,
        data_type: Option<String>,
        not_null: Option<bool>,
        default: Option<String>,
    },
}

fn non_empty(value: &Option<String>) -> Option<String> {
    value.as_ref().filter(|text| !text.trim().is_empty()).cloned()
}

impl TryFrom<&AlterTableOperation> for AlterOperation {
    type Error = GatewayError;

    fn try_from(operation: &AlterTableOperation) -> Result<Self, Self::Error> {
        let column = operation.column_name.clone();
        let action = operation.action.as_str();

        if column.is_empty() && matches!(action, "add_column" | "drop_column" | "rename_column" | "alter_column") {
            return Err(GatewayError::Validation(format!("{} requires columnName", action)));
        }

        match action {
            "add_column" => {
                let data_type = non_empty(&operation.data_type).ok_or_else(|| {
                    GatewayError::Validation("add_column requires columnName and type".to_string())
                })?;
                Ok(AlterOperation::AddColumn { column, data_type })
            }
            "drop_column" => Ok(AlterOperation::DropColumn { column }),
            "rename_column" => {
                let new_name = non_empty(&operation.new_name).ok_or_else(|| {
                    GatewayError::Validation("rename_column requires columnName and newName".to_string())
                })?;
                Ok(AlterOperation::RenameColumn { column, new_name })
            }
            "alter_column" => Ok(AlterOperation::AlterColumn {
                column,
                data_type: non_empty(&operation.data_type),
                not_null: operation.not_null,
                default: non_empty(&operation.default),
            }),
            other => Err(GatewayError::UnsupportedAction(other.to_string())),
        }
    }
}

/// Kind of a table constraint
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConstraintKind {
    PrimaryKey,
    ForeignKey,
    Unique,
    Check,
}

impl ConstraintKind {
    /// Parse a constraint type name, case-insensitively
    ///
    /// Spaces and underscores are interchangeable, so `"primary key"`,
    /// `"PRIMARY_KEY"` and `"PRIMARY KEY"` are all accepted.
    pub fn parse(name: &str) -> Result<Self, GatewayError> {
        let normalized = name.trim().to_uppercase().replace('_', " ");
        match normalized.as_str() {
            "PRIMARY KEY" => Ok(ConstraintKind::PrimaryKey),
            "FOREIGN KEY" => Ok(ConstraintKind::ForeignKey),
            "UNIQUE" => Ok(ConstraintKind::Unique),
            "CHECK" => Ok(ConstraintKind::Check),
            _ => Err(GatewayError::UnsupportedConstraint(name.to_string())),
        }
    }

    pub fn as_sql(&self) -> &'static str {
        match self {
            ConstraintKind::PrimaryKey => "PRIMARY KEY",
            ConstraintKind::ForeignKey => "FOREIGN KEY",
            ConstraintKind::Unique => "UNIQUE",
            ConstraintKind::Check => "CHECK",
        }
    }
}

/// ON DELETE / ON UPDATE action of a foreign key
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReferentialAction {
    Cascade,
    Restrict,
    NoAction,
    SetNull,
    SetDefault,
}

impl ReferentialAction {
    pub fn parse(name: &str) -> Result<Self, GatewayError> {
        let normalized = name.trim().to_uppercase().replace('_', " ");
        match normalized.as_str() {
            "CASCADE" => Ok(ReferentialAction::Cascade),
            "RESTRICT" => Ok(ReferentialAction::Restrict),
            "NO ACTION" => Ok(ReferentialAction::NoAction),
            "SET NULL" => Ok(ReferentialAction::SetNull),
            "SET DEFAULT" => Ok(ReferentialAction::SetDefault),
            _ => Err(GatewayError::Validation(format!(
                "invalid referential action: {}",
                name
            ))),
        }
    }

    pub fn as_sql(&self) -> &'static str {
        match self {
            ReferentialAction::Cascade => "CASCADE",
            ReferentialAction::Restrict => "RESTRICT",
            ReferentialAction::NoAction => "NO ACTION",
            ReferentialAction::SetNull => "SET NULL",
            ReferentialAction::SetDefault => "SET DEFAULT",
        }
    }
}

/// Request to add a constraint to a table
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConstraintSpec {
    /// Schema of the table (defaults to "public")
    #[serde(default)]
    pub schema: String,

    pub table_name: String,

    pub constraint_name: String,

    /// "PRIMARY KEY", "FOREIGN KEY", "UNIQUE" or "CHECK"
    pub constraint_type: String,

    /// Constrained columns (PRIMARY KEY, UNIQUE, FOREIGN KEY)
    #[serde(default)]
    pub columns: Vec<String>,

    /// Referenced table (FOREIGN KEY)
    #[serde(default)]
    pub ref_table: Option<String>,

    /// Referenced columns (FOREIGN KEY)
    #[serde(default)]
    pub ref_columns: Vec<String>,

    #[serde(default)]
    pub on_delete: Option<String>,

    #[serde(default)]
    pub on_update: Option<String>,

    /// Boolean expression (CHECK)
    #[serde(default)]
    pub check_expression: Option<String>,
}

// ---------------------------------------------------------------------------
// Table data queries
// ---------------------------------------------------------------------------

/// Comparison operators accepted in table-data filters
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterOperator {
    Equal,
    GreaterThan,
    LessThan,
    GreaterOrEqual,
    LessOrEqual,
    Like,
}

impl FilterOperator {
    /// Parse an operator; `None` for anything outside the supported set
    pub fn parse(operator: &str) -> Option<Self> {
        match operator.trim().to_uppercase().as_str() {
            "=" => Some(FilterOperator::Equal),
            ">" => Some(FilterOperator::GreaterThan),
            "<" => Some(FilterOperator::LessThan),
            ">=" => Some(FilterOperator::GreaterOrEqual),
            "<=" => Some(FilterOperator::LessOrEqual),
            "LIKE" => Some(FilterOperator::Like),
            _ => None,
        }
    }

    pub fn as_sql(&self) -> &'static str {
        match self {
            FilterOperator::Equal => "=",
            FilterOperator::GreaterThan => ">",
            FilterOperator::LessThan => "<",
            FilterOperator::GreaterOrEqual => ">=",
            FilterOperator::LessOrEqual => "<=",
            FilterOperator::Like => "LIKE",
        }
    }
}

/// A single `column operator value` filter
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Filter {
    pub column: String,

    /// Kept raw so unsupported operators can be reported back
    pub operator: String,

    pub value: Value,
}

impl Filter {
    pub fn new(column: impl Into<String>, operator: impl Into<String>, value: impl Into<Value>) -> Self {
        Self {
            column: column.into(),
            operator: operator.into(),
            value: value.into(),
        }
    }

    /// Parse the `column:operator:value` wire form
    ///
    /// The value is everything after the second colon, so it may itself
    /// contain colons. Returns `None` when fewer than three parts are present.
    pub fn parse(raw: &str) -> Option<Self> {
        let mut parts = raw.splitn(3, ':');
        let column = parts.next()?;
        let operator = parts.next()?;
        let value = parts.next()?;
        Some(Self::new(column, operator, value))
    }
}

impl fmt::Display for Filter {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(formatter, "{}:{}:{}", self.column, self.operator, self.value)
    }
}

/// Sort order for table-data queries
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum SortOrder {
    #[default]
    #[serde(alias = "asc", alias = "ASC")]
    Ascending,
    #[serde(alias = "desc", alias = "DESC")]
    Descending,
}

impl SortOrder {
    pub fn as_sql(&self) -> &'static str {
        match self {
            SortOrder::Ascending => "ASC",
            SortOrder::Descending => "DESC",
        }
    }
}

/// Paginated, filtered read of a single table
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TableDataQuery {
    /// Schema name (defaults to "public")
    #[serde(default)]
    pub schema: String,

    pub table: String,

    /// Maximum number of rows to return
    #[serde(default = "default_limit")]
    pub limit: u64,

    /// Starting offset for pagination
    #[serde(default)]
    pub offset: u64,

    /// Column to sort by
    #[serde(default)]
    pub order_by: Option<String>,

    #[serde(default)]
    pub order_direction: Option<SortOrder>,

    /// Filters, applied in order and joined with AND
    #[serde(default)]
    pub filters: Vec<Filter>,
}

pub fn default_limit() -> u64 {
    100
}

impl TableDataQuery {
    pub fn new(schema: impl Into<String>, table: impl Into<String>) -> Self {
        Self {
            schema: schema.into(),
            table: table.into(),
            limit: default_limit(),
            offset: 0,
            order_by: None,
            order_direction: None,
            filters: Vec::new(),
        }
    }
}

// ---------------------------------------------------------------------------
// Results
// ---------------------------------------------------------------------------

/// Canonical tabular result: ordered column names and rows of values
///
/// Every row holds exactly one value per column, in column order.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResultSet {
    columns: Vec<String>,
    rows: Vec<Vec<Value>>,
}

impl ResultSet {
    /// Build a result set, rejecting rows whose width differs from the column count
    pub fn new(columns: Vec<String>, rows: Vec<Vec<Value>>) -> Result<Self, GatewayError> {
        if let Some((index, row)) = rows
            .iter()
            .enumerate()
            .find(|(_, row)| row.len() != columns.len())
        {
            return Err(GatewayError::Engine(format!(
                "row {} has {} values for {} columns",
                index,
                row.len(),
                columns.len()
            )));
        }

        Ok(Self { columns, rows })
    }

    /// Result of a statement that returns no rows
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn rows(&self) -> &[Vec<Value>] {
        &self.rows
    }
}

/// Result from executing an ad-hoc statement
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QueryResult {
    /// Columns and rows (both empty for statements run on the write path)
    #[serde(flatten)]
    pub result: ResultSet,

    /// Number of rows affected (write path only)
    pub affected_rows: u64,

    /// Execution time in milliseconds
    pub execution_time_milliseconds: u64,
}

/// Rows read from a table, plus the filters that were not applied
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TableData {
    #[serde(flatten)]
    pub result: ResultSet,

    /// Filters dropped because of an unsupported operator or malformed form,
    /// and an order-by column that failed validation
    pub ignored_filters: Vec<String>,
}

/// Description of a single column as reported by the catalog
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ColumnInfo {
    pub name: String,

    /// Declared SQL data type
    #[serde(rename = "type")]
    pub data_type: String,

    pub nullable: bool,

    /// Default expression; `None` when the column has no default
    pub default: Option<String>,

    /// Whether the column takes part in a UNIQUE constraint
    pub is_unique: bool,

    /// Foreign-key definition (e.g., "FOREIGN KEY (user_id) REFERENCES users(id)")
    pub foreign_key: Option<String>,
}

/// Description of a table constraint as reported by the catalog
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConstraintInfo {
    pub constraint_name: String,
    pub constraint_type: String,
    pub table_name: String,

    /// Human-readable definition (e.g., "CHECK ((price > 0))")
    pub definition: String,
}

// ---------------------------------------------------------------------------
// HTTP request and response bodies
// ---------------------------------------------------------------------------

/// Request to open a connection
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConnectRequest {
    /// Driver name (e.g., "postgres")
    pub driver: String,

    /// Driver-specific connection string
    pub dsn: String,
}

/// Request to execute an ad-hoc SQL statement
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueryRequest {
    /// SQL statement to execute
    pub sql: String,

    /// Whether the statement returns rows; inferred from the text when absent
    #[serde(default)]
    pub returns_rows: Option<bool>,
}

impl QueryRequest {
    pub fn new(sql: impl Into<String>) -> Self {
        Self {
            sql: sql.into(),
            returns_rows: None,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InsertRecordRequest {
    #[serde(default)]
    pub schema: String,
    pub table: String,
    #[serde(default)]
    pub data: Record,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateRecordRequest {
    #[serde(default)]
    pub schema: String,
    pub table: String,
    #[serde(default)]
    pub data: Record,
    #[serde(rename = "where", default)]
    pub conditions: Record,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeleteRecordRequest {
    #[serde(default)]
    pub schema: String,
    #[serde(default)]
    pub table: String,
    #[serde(default)]
    pub conditions: Record,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateTableRequest {
    #[serde(default)]
    pub schema: String,
    pub table_name: String,
    #[serde(default)]
    pub columns: Vec<ColumnDefinition>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AlterTableRequest {
    #[serde(default)]
    pub schema: String,
    #[serde(default)]
    pub operations: Vec<AlterTableOperation>,
}

/// Response from listing schemas
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SchemasResponse {
    pub schemas: Vec<String>,
}

/// Response from listing tables
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TablesResponse {
    pub tables: Vec<String>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ColumnsResponse {
    pub columns: Vec<ColumnInfo>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConstraintsResponse {
    pub constraints: Vec<ConstraintInfo>,
}

/// Acknowledgement of a write or DDL operation
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MessageResponse {
    pub message: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub table: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub affected_rows: Option<u64>,
}

impl MessageResponse {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            table: None,
            affected_rows: None,
        }
    }

    pub fn with_table(mut self, table: impl Into<String>) -> Self {
        self.table = Some(table.into());
        self
    }

    pub fn with_affected_rows(mut self, affected_rows: u64) -> Self {
        self.affected_rows = Some(affected_rows);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_filter_parse() {
        let filter = Filter::parse("name:like:john").unwrap();
        assert_eq!(filter.column, "name");
        assert_eq!(filter.operator, "like");
        assert_eq!(filter.value, Value::Text("john".into()));

        let filter = Filter::parse("created_at:>=:2024-01-01 10:00").unwrap();
        assert_eq!(filter.value, Value::Text("2024-01-01 10:00".into()));

        assert!(Filter::parse("name:like").is_none());
        assert!(Filter::parse("name").is_none());
    }

    #[test]
    fn test_filter_operator_parse() {
        assert_eq!(FilterOperator::parse("like"), Some(FilterOperator::Like));
        assert_eq!(FilterOperator::parse(">="), Some(FilterOperator::GreaterOrEqual));
        assert_eq!(FilterOperator::parse("!="), None);
        assert_eq!(FilterOperator::parse("ILIKE"), None);
    }

    #[test]
    fn test_alter_operation_conversion() {
        let operation = AlterTableOperation {
            action: "add_column".into(),
            column_name: "email".into(),
            data_type: Some("varchar(255)".into()),
            ..Default::default()
        };
        assert_eq!(
            AlterOperation::try_from(&operation).unwrap(),
            AlterOperation::AddColumn {
                column: "email".into(),
                data_type: "varchar(255)".into()
            }
        );

        let operation = AlterTableOperation {
            action: "alter_column".into(),
            column_name: "age".into(),
            default: Some(String::new()),
            not_null: Some(false),
            ..Default::default()
        };
        assert_eq!(
            AlterOperation::try_from(&operation).unwrap(),
            AlterOperation::AlterColumn {
                column: "age".into(),
                data_type: None,
                not_null: Some(false),
                default: None,
            }
        );
    }

    #[test]
    fn test_alter_operation_errors() {
        let unknown = AlterTableOperation {
            action: "truncate".into(),
            column_name: "x".into(),
            ..Default::default()
        };
        let error = AlterOperation::try_from(&unknown).unwrap_err();
        assert!(matches!(error, GatewayError::UnsupportedAction(ref action) if action == "truncate"));

        let missing_type = AlterTableOperation {
            action: "add_column".into(),
            column_name: "email".into(),
            ..Default::default()
        };
        assert!(matches!(
            AlterOperation::try_from(&missing_type),
            Err(GatewayError::Validation(_))
        ));

        let missing_column = AlterTableOperation {
            action: "drop_column".into(),
            ..Default::default()
        };
        assert!(matches!(
            AlterOperation::try_from(&missing_column),
            Err(GatewayError::Validation(_))
        ));
    }

    #[test]
    fn test_constraint_kind_parse() {
        assert_eq!(ConstraintKind::parse("PRIMARY KEY").unwrap(), ConstraintKind::PrimaryKey);
        assert_eq!(ConstraintKind::parse("foreign_key").unwrap(), ConstraintKind::ForeignKey);
        assert_eq!(ConstraintKind::parse(" unique ").unwrap(), ConstraintKind::Unique);
        assert!(matches!(
            ConstraintKind::parse("EXCLUDE"),
            Err(GatewayError::UnsupportedConstraint(_))
        ));
    }

    #[test]
    fn test_result_set_rejects_ragged_rows() {
        let columns = vec!["id".to_string(), "name".to_string()];
        assert!(ResultSet::new(columns.clone(), vec![vec![Value::Integer(1), Value::Null]]).is_ok());
        assert!(ResultSet::new(columns, vec![vec![Value::Integer(1)]]).is_err());
    }

    #[test]
    fn test_query_result_serialization() {
        let result = QueryResult {
            result: ResultSet::new(
                vec!["id".into(), "note".into()],
                vec![vec![Value::Integer(1), Value::Null]],
            )
            .unwrap(),
            affected_rows: 0,
            execution_time_milliseconds: 3,
        };
        assert_eq!(
            serde_json::to_value(&result).unwrap(),
            json!({
                "columns": ["id", "note"],
                "rows": [[1, null]],
                "affectedRows": 0,
                "executionTimeMilliseconds": 3
            })
        );
    }

    #[test]
    fn test_table_data_query_defaults() {
        let query: TableDataQuery = serde_json::from_value(json!({
            "table": "users",
            "filters": [{"column": "age", "operator": ">=", "value": 30}],
            "orderDirection": "desc"
        }))
        .unwrap();
        assert_eq!(query.schema, "");
        assert_eq!(query.limit, 100);
        assert_eq!(query.offset, 0);
        assert_eq!(query.order_direction, Some(SortOrder::Descending));
        assert_eq!(query.filters[0].value, Value::Integer(30));
    }

    #[test]
    fn test_column_info_null_default_distinct_from_empty() {
        let column = ColumnInfo {
            name: "note".into(),
            data_type: "text".into(),
            nullable: true,
            default: None,
            is_unique: false,
            foreign_key: None,
        };
        let with_empty_default = ColumnInfo {
            default: Some(String::new()),
            ..column.clone()
        };
        assert_eq!(serde_json::to_value(&column).unwrap()["default"], json!(null));
        assert_eq!(serde_json::to_value(&with_empty_default).unwrap()["default"], json!(""));
    }
}
