//! Parameterized SQL construction
//!
//! Every function here is pure: it validates identifiers, assembles SQL text
//! with positional `$n` placeholders and collects the matching arguments. No
//! caller-supplied value is ever written into the SQL text; identifiers are
//! validated and quoted first.
//!
//! Builders that bind column values accept a [`ColumnTypes`] map. When a
//! bound value targets a column whose type is known, the placeholder becomes
//! `CAST($n AS <type>)` so that textual input is converted by the engine. The
//! type texts come from the catalog, never from the caller.

use crate::database::traits::GatewayError;
use crate::identifier::{qualified_table, quoted};
use crate::schema::{
    AlterOperation, ColumnDefinition, ConstraintKind, ConstraintSpec, FilterOperator, Record,
    ReferentialAction, SortOrder, TableDataQuery,
};
use crate::value::Value;
use std::collections::HashMap;

/// Column name to catalog type text (e.g., "integer", "timestamp without time zone")
pub type ColumnTypes = HashMap<String, String>;

/// SQL text plus its positional arguments
#[derive(Debug, Clone, PartialEq)]
pub struct Statement {
    pub sql: String,
    pub arguments: Vec<Value>,
}

impl Statement {
    fn without_arguments(sql: String) -> Self {
        Self {
            sql,
            arguments: Vec::new(),
        }
    }
}

/// A table-data SELECT and the filters left out of it
#[derive(Debug, Clone, PartialEq)]
pub struct SelectStatement {
    pub statement: Statement,
    pub ignored_filters: Vec<String>,
}

/// Collects arguments and hands out matching placeholders
struct Placeholders<'a> {
    arguments: Vec<Value>,
    column_types: &'a ColumnTypes,
}

impl<'a> Placeholders<'a> {
    fn new(column_types: &'a ColumnTypes) -> Self {
        Self {
            arguments: Vec::new(),
            column_types,
        }
    }

    /// Bind a value destined for `column`, casting to the column type when known
    fn bind(&mut self, column: &str, value: Value) -> String {
        let placeholder = self.bind_plain(value);
        match self.column_types.get(column) {
            Some(column_type) => format!("CAST({} AS {})", placeholder, column_type),
            None => placeholder,
        }
    }

    fn bind_plain(&mut self, value: Value) -> String {
        self.arguments.push(value);
        format!("${}", self.arguments.len())
    }

    fn finish(self, sql: String) -> Statement {
        Statement {
            sql,
            arguments: self.arguments,
        }
    }
}

fn column_list(columns: &[String]) -> Result<String, GatewayError> {
    let quoted_columns = columns
        .iter()
        .map(|column| quoted(column))
        .collect::<Result<Vec<_>, _>>()?;
    Ok(quoted_columns.join(", "))
}

/// Build `"a" = $1 AND "b" IS NULL ...` for an equality condition map
fn equality_conditions(
    conditions: &Record,
    placeholders: &mut Placeholders<'_>,
) -> Result<String, GatewayError> {
    let mut clauses = Vec::with_capacity(conditions.len());

    for (column, value) in conditions {
        let quoted_column = quoted(column)?;
        if value.is_null() {
            clauses.push(format!("{} IS NULL", quoted_column));
        } else {
            let placeholder = placeholders.bind(column, value.clone());
            clauses.push(format!("{} = {}", quoted_column, placeholder));
        }
    }

    Ok(clauses.join(" AND "))
}

fn pagination_argument(value: u64, name: &str) -> Result<i64, GatewayError> {
    i64::try_from(value).map_err(|_| GatewayError::Validation(format!("invalid {}", name)))
}

/// Build the paginated, filtered SELECT for a table
///
/// Filters with an operator outside `=`, `>`, `<`, `>=`, `<=`, `LIKE` are
/// skipped and reported. An order-by column that fails validation is skipped
/// and reported as `orderBy:<column>`. LIMIT and OFFSET are always the last
/// two arguments.
pub fn select_table_data(
    query: &TableDataQuery,
    column_types: &ColumnTypes,
) -> Result<SelectStatement, GatewayError> {
    let table = qualified_table(&query.schema, &query.table)?;
    let mut placeholders = Placeholders::new(column_types);
    let mut ignored_filters = Vec::new();
    let mut conditions = Vec::new();

    for filter in &query.filters {
        let Some(operator) = FilterOperator::parse(&filter.operator) else {
            ignored_filters.push(filter.to_string());
            continue;
        };

        let quoted_column = quoted(&filter.column)?;
        let placeholder = match operator {
            FilterOperator::Like => placeholders.bind_plain(filter.value.clone()),
            _ => placeholders.bind(&filter.column, filter.value.clone()),
        };
        conditions.push(format!("{} {} {}", quoted_column, operator.as_sql(), placeholder));
    }

    let mut sql = format!("SELECT * FROM {}", table);

    if !conditions.is_empty() {
        sql.push_str(" WHERE ");
        sql.push_str(&conditions.join(" AND "));
    }

    if let Some(order_by) = query.order_by.as_deref().filter(|column| !column.is_empty()) {
        match quoted(order_by) {
            Ok(quoted_column) => {
                let direction = query.order_direction.unwrap_or(SortOrder::Ascending);
                sql.push_str(&format!(" ORDER BY {} {}", quoted_column, direction.as_sql()));
            }
            Err(_) => ignored_filters.push(format!("orderBy:{}", order_by)),
        }
    }

    let limit = placeholders.bind_plain(Value::Integer(pagination_argument(query.limit, "limit")?));
    let offset = placeholders.bind_plain(Value::Integer(pagination_argument(query.offset, "offset")?));
    sql.push_str(&format!(" LIMIT {} OFFSET {}", limit, offset));

    Ok(SelectStatement {
        statement: placeholders.finish(sql),
        ignored_filters,
    })
}

/// Build an INSERT of a single record
pub fn insert_record(
    schema: &str,
    table: &str,
    data: &Record,
    column_types: &ColumnTypes,
) -> Result<Statement, GatewayError> {
    if data.is_empty() {
        return Err(GatewayError::Validation("no data to insert".to_string()));
    }

    let table = qualified_table(schema, table)?;
    let mut placeholders = Placeholders::new(column_types);
    let mut columns = Vec::with_capacity(data.len());
    let mut values = Vec::with_capacity(data.len());

    for (column, value) in data {
        columns.push(quoted(column)?);
        values.push(placeholders.bind(column, value.clone()));
    }

    let sql = format!(
        "INSERT INTO {} ({}) VALUES ({})",
        table,
        columns.join(", "),
        values.join(", ")
    );

    Ok(placeholders.finish(sql))
}

/// Build an UPDATE; both the SET map and the WHERE map must be non-empty
pub fn update_record(
    schema: &str,
    table: &str,
    data: &Record,
    conditions: &Record,
    column_types: &ColumnTypes,
) -> Result<Statement, GatewayError> {
    if data.is_empty() {
        return Err(GatewayError::Validation("no fields to update".to_string()));
    }
    if conditions.is_empty() {
        return Err(GatewayError::Validation(
            "missing WHERE clause, refusing unbounded update".to_string(),
        ));
    }

    let table = qualified_table(schema, table)?;
    let mut placeholders = Placeholders::new(column_types);
    let mut assignments = Vec::with_capacity(data.len());

    for (column, value) in data {
        let quoted_column = quoted(column)?;
        let placeholder = placeholders.bind(column, value.clone());
        assignments.push(format!("{} = {}", quoted_column, placeholder));
    }

    let where_clause = equality_conditions(conditions, &mut placeholders)?;
    let sql = format!(
        "UPDATE {} SET {} WHERE {}",
        table,
        assignments.join(", "),
        where_clause
    );

    Ok(placeholders.finish(sql))
}

/// Build a DELETE; the condition map must be non-empty
pub fn delete_record(
    schema: &str,
    table: &str,
    conditions: &Record,
    column_types: &ColumnTypes,
) -> Result<Statement, GatewayError> {
    if table.is_empty() || conditions.is_empty() {
        return Err(GatewayError::Validation(
            "table name and conditions are required".to_string(),
        ));
    }

    let table = qualified_table(schema, table)?;
    let mut placeholders = Placeholders::new(column_types);
    let where_clause = equality_conditions(conditions, &mut placeholders)?;
    let sql = format!("DELETE FROM {} WHERE {}", table, where_clause);

    Ok(placeholders.finish(sql))
}

/// Build a CREATE TABLE
///
/// All columns flagged as primary key are aggregated into one
/// `PRIMARY KEY (...)` clause.
pub fn create_table(
    schema: &str,
    table: &str,
    columns: &[ColumnDefinition],
) -> Result<Statement, GatewayError> {
    if table.is_empty() || columns.is_empty() {
        return Err(GatewayError::Validation("invalid table definition".to_string()));
    }

    let table = qualified_table(schema, table)?;
    let mut definitions = Vec::with_capacity(columns.len() + 1);
    let mut primary_key_columns = Vec::new();

    for column in columns {
        let quoted_column = quoted(&column.name)?;
        let data_type = column.data_type.trim();
        if data_type.is_empty() {
            return Err(GatewayError::Validation(format!(
                "column {} requires a type",
                column.name
            )));
        }

        let mut parts = vec![quoted_column.clone(), data_type.to_string()];
        if column.not_null {
            parts.push("NOT NULL".to_string());
        }
        if let Some(default) = column.default.as_deref().filter(|text| !text.trim().is_empty()) {
            parts.push(format!("DEFAULT {}", default));
        }
        definitions.push(parts.join(" "));

        if column.primary_key {
            primary_key_columns.push(quoted_column);
        }
    }

    if !primary_key_columns.is_empty() {
        definitions.push(format!("PRIMARY KEY ({})", primary_key_columns.join(", ")));
    }

    Ok(Statement::without_arguments(format!(
        "CREATE TABLE {} ({})",
        table,
        definitions.join(", ")
    )))
}

/// Build an ALTER TABLE script, clauses in operation order
///
/// PostgreSQL rejects RENAME COLUMN inside a multi-action ALTER TABLE, so
/// each rename becomes its own statement and the actions between renames
/// are grouped. Statements are joined with `;` for a single simple-protocol
/// round trip, which runs them as one implicit transaction.
pub fn alter_table(
    schema: &str,
    table: &str,
    operations: &[AlterOperation],
) -> Result<Statement, GatewayError> {
    if table.is_empty() || operations.is_empty() {
        return Err(GatewayError::Validation("invalid alter table request".to_string()));
    }

    let table = qualified_table(schema, table)?;
    let mut statements = Vec::new();
    let mut clauses: Vec<String> = Vec::new();

    for operation in operations {
        match operation {
            AlterOperation::AddColumn { column, data_type } => {
                clauses.push(format!("ADD COLUMN {} {}", quoted(column)?, data_type));
            }
            AlterOperation::DropColumn { column } => {
                clauses.push(format!("DROP COLUMN {}", quoted(column)?));
            }
            AlterOperation::RenameColumn { column, new_name } => {
                if !clauses.is_empty() {
                    statements.push(format!("ALTER TABLE {} {}", table, clauses.join(", ")));
                    clauses.clear();
                }
                statements.push(format!(
                    "ALTER TABLE {} RENAME COLUMN {} TO {}",
                    table,
                    quoted(column)?,
                    quoted(new_name)?
                ));
            }
            AlterOperation::AlterColumn {
                column,
                data_type,
                not_null,
                default,
            } => {
                if data_type.is_none() && not_null.is_none() && default.is_none() {
                    return Err(GatewayError::Validation(format!(
                        "alter_column on {} requires type, notNull or default",
                        column
                    )));
                }

                let quoted_column = quoted(column)?;
                if let Some(data_type) = data_type {
                    clauses.push(format!("ALTER COLUMN {} TYPE {}", quoted_column, data_type));
                }
                match not_null {
                    Some(true) => clauses.push(format!("ALTER COLUMN {} SET NOT NULL", quoted_column)),
                    Some(false) => clauses.push(format!("ALTER COLUMN {} DROP NOT NULL", quoted_column)),
                    None => {}
                }
                if let Some(default) = default {
                    clauses.push(format!("ALTER COLUMN {} SET DEFAULT {}", quoted_column, default));
                }
            }
        }
    }

    if !clauses.is_empty() {
        statements.push(format!("ALTER TABLE {} {}", table, clauses.join(", ")));
    }

    Ok(Statement::without_arguments(statements.join("; ")))
}

/// Build a DROP TABLE; CASCADE only when requested
pub fn drop_table(schema: &str, table: &str, cascade: bool) -> Result<Statement, GatewayError> {
    if table.is_empty() {
        return Err(GatewayError::Validation("table name is required".to_string()));
    }

    let mut sql = format!("DROP TABLE {}", qualified_table(schema, table)?);
    if cascade {
        sql.push_str(" CASCADE");
    }

    Ok(Statement::without_arguments(sql))
}

/// Build an ALTER TABLE ... ADD CONSTRAINT
pub fn add_constraint(spec: &ConstraintSpec) -> Result<Statement, GatewayError> {
    let kind = ConstraintKind::parse(&spec.constraint_type)?;
    let table = qualified_table(&spec.schema, &spec.table_name)?;
    let constraint = quoted(&spec.constraint_name)?;

    let requires_columns = || {
        if spec.columns.is_empty() {
            Err(GatewayError::Validation(format!(
                "{} constraint requires columns",
                kind.as_sql()
            )))
        } else {
            column_list(&spec.columns)
        }
    };

    let body = match kind {
        ConstraintKind::PrimaryKey | ConstraintKind::Unique => {
            format!("{} ({})", kind.as_sql(), requires_columns()?)
        }
        ConstraintKind::ForeignKey => {
            let columns = requires_columns()?;
            let reference_table = spec
                .ref_table
                .as_deref()
                .filter(|name| !name.is_empty())
                .ok_or_else(|| {
                    GatewayError::Validation("FOREIGN KEY constraint requires refTable".to_string())
                })?;
            if spec.ref_columns.is_empty() {
                return Err(GatewayError::Validation(
                    "FOREIGN KEY constraint requires refColumns".to_string(),
                ));
            }
            if spec.ref_columns.len() != spec.columns.len() {
                return Err(GatewayError::Validation(format!(
                    "FOREIGN KEY has {} columns but {} referenced columns",
                    spec.columns.len(),
                    spec.ref_columns.len()
                )));
            }

            let mut body = format!(
                "FOREIGN KEY ({}) REFERENCES {} ({})",
                columns,
                qualified_table(&spec.schema, reference_table)?,
                column_list(&spec.ref_columns)?
            );
            if let Some(action) = spec.on_delete.as_deref().filter(|text| !text.is_empty()) {
                body.push_str(&format!(" ON DELETE {}", ReferentialAction::parse(action)?.as_sql()));
            }
            if let Some(action) = spec.on_update.as_deref().filter(|text| !text.is_empty()) {
                body.push_str(&format!(" ON UPDATE {}", ReferentialAction::parse(action)?.as_sql()));
            }
            body
        }
        ConstraintKind::Check => {
            let expression = spec
                .check_expression
                .as_deref()
                .filter(|text| !text.trim().is_empty())
                .ok_or_else(|| {
                    GatewayError::Validation("CHECK constraint requires checkExpression".to_string())
                })?;
            format!("CHECK ({})", expression)
        }
    };

    Ok(Statement::without_arguments(format!(
        "ALTER TABLE {} ADD CONSTRAINT {} {}",
        table, constraint, body
    )))
}

/// Build an ALTER TABLE ... DROP CONSTRAINT
pub fn drop_constraint(
    schema: &str,
    table: &str,
    constraint: &str,
    cascade: bool,
) -> Result<Statement, GatewayError> {
    let mut sql = format!(
        "ALTER TABLE {} DROP CONSTRAINT {}",
        qualified_table(schema, table)?,
        quoted(constraint)?
    );
    if cascade {
        sql.push_str(" CASCADE");
    }

    Ok(Statement::without_arguments(sql))
}

/// Lexical guess at whether a statement returns rows
///
/// True when the text starts with `SELECT` after leading whitespace, in any
/// case. This is not a parser: `WITH ... SELECT` and `INSERT ... RETURNING`
/// are treated as writes.
pub fn looks_like_select(sql: &str) -> bool {
    sql.trim_start()
        .get(..6)
        .map(|keyword| keyword.eq_ignore_ascii_case("SELECT"))
        .unwrap_or(false)
}
