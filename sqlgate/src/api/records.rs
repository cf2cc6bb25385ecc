//! Table data and record endpoints

use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::{IntoResponse, Json, Response},
};
use std::sync::Arc;

use super::error_response;
use crate::database::traits::{DatabaseGateway, GatewayError};
use crate::schema::{
    DeleteRecordRequest, Filter, InsertRecordRequest, MessageResponse, SortOrder, TableDataQuery,
    UpdateRecordRequest,
};

/// Decode the query string of GET /records
///
/// Returns the query plus the `filter` values that were not of the
/// `column:operator:value` form.
fn table_data_query(params: &[(String, String)]) -> Result<(TableDataQuery, Vec<String>), GatewayError> {
    let mut query = TableDataQuery::new("", "");
    let mut malformed = Vec::new();

    for (key, value) in params {
        match key.as_str() {
            "schema" => query.schema = value.clone(),
            "table" => query.table = value.clone(),
            "limit" => {
                query.limit = value
                    .trim()
                    .parse()
                    .map_err(|_| GatewayError::Validation("invalid limit".to_string()))?;
            }
            "offset" => {
                query.offset = value
                    .trim()
                    .parse()
                    .map_err(|_| GatewayError::Validation("invalid offset".to_string()))?;
            }
            "orderBy" => query.order_by = Some(value.clone()).filter(|column| !column.is_empty()),
            "orderDirection" => {
                query.order_direction = match value.to_ascii_lowercase().as_str() {
                    "" => None,
                    "asc" | "ascending" => Some(SortOrder::Ascending),
                    "desc" | "descending" => Some(SortOrder::Descending),
                    _ => return Err(GatewayError::Validation("invalid orderDirection".to_string())),
                };
            }
            "filter" => match Filter::parse(value) {
                Some(filter) => query.filters.push(filter),
                None => malformed.push(value.clone()),
            },
            _ => {}
        }
    }

    Ok((query, malformed))
}

/// Handler for GET /records
///
/// Query parameters:
/// - schema: Schema name (default: "public")
/// - table: Table name
/// - limit: Maximum rows to return (default: 100)
/// - offset: Starting row offset (default: 0)
/// - orderBy: Column to sort by (optional)
/// - orderDirection: "asc" or "desc" (optional, default: "asc")
/// - filter: `column:operator:value`, repeatable; operators are =, >, <, >=, <=, like
///
/// Filters that could not be applied are listed in `ignoredFilters`.
pub async fn get_records_handler<G: DatabaseGateway>(
    State(gateway): State<Arc<G>>,
    Query(params): Query<Vec<(String, String)>>,
) -> Response {
    let (query, malformed) = match table_data_query(&params) {
        Ok(decoded) => decoded,
        Err(error) => return error_response("get records", error),
    };

    match gateway.get_table_data(&query).await {
        Ok(mut data) => {
            data.ignored_filters.extend(malformed);
            (StatusCode::OK, Json(data)).into_response()
        }
        Err(error) => error_response("get records", error),
    }
}

/// Handler for POST /records/search
///
/// Same as GET /records, with the query as a JSON body so filter values keep
/// their JSON types.
pub async fn search_records_handler<G: DatabaseGateway>(
    State(gateway): State<Arc<G>>,
    Json(query): Json<TableDataQuery>,
) -> Response {
    match gateway.get_table_data(&query).await {
        Ok(data) => (StatusCode::OK, Json(data)).into_response(),
        Err(error) => error_response("search records", error),
    }
}

/// Handler for POST /records
pub async fn insert_record_handler<G: DatabaseGateway>(
    State(gateway): State<Arc<G>>,
    Json(request): Json<InsertRecordRequest>,
) -> Response {
    match gateway.insert_record(&request.schema, &request.table, &request.data).await {
        Ok(affected_rows) => (
            StatusCode::CREATED,
            Json(
                MessageResponse::new("record inserted successfully")
                    .with_table(request.table)
                    .with_affected_rows(affected_rows),
            ),
        )
            .into_response(),
        Err(error) => error_response("insert record", error),
    }
}

/// Handler for PUT /records
///
/// Request body:
/// ```json
/// {
///   "table": "users",
///   "data": {"name": "john"},
///   "where": {"id": 1}
/// }
/// ```
pub async fn update_record_handler<G: DatabaseGateway>(
    State(gateway): State<Arc<G>>,
    Json(request): Json<UpdateRecordRequest>,
) -> Response {
    match gateway
        .update_record(&request.schema, &request.table, &request.data, &request.conditions)
        .await
    {
        Ok(affected_rows) => (
            StatusCode::OK,
            Json(
                MessageResponse::new("record updated successfully")
                    .with_table(request.table)
                    .with_affected_rows(affected_rows),
            ),
        )
            .into_response(),
        Err(error) => error_response("update record", error),
    }
}

/// Handler for DELETE /records
pub async fn delete_record_handler<G: DatabaseGateway>(
    State(gateway): State<Arc<G>>,
    Json(request): Json<DeleteRecordRequest>,
) -> Response {
    match gateway
        .delete_record(&request.schema, &request.table, &request.conditions)
        .await
    {
        Ok(affected_rows) => (
            StatusCode::OK,
            Json(
                MessageResponse::new("record deleted successfully")
                    .with_table(request.table)
                    .with_affected_rows(affected_rows),
            ),
        )
            .into_response(),
        Err(error) => error_response("delete record", error),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::Value;

    fn params(pairs: &[(&str, &str)]) -> Vec<(String, String)> {
        pairs
            .iter()
            .map(|(key, value)| (key.to_string(), value.to_string()))
            .collect()
    }

    #[test]
    fn test_table_data_query_decoding() {
        let (query, malformed) = table_data_query(&params(&[
            ("schema", "sales"),
            ("table", "orders"),
            ("limit", "25"),
            ("offset", "50"),
            ("orderBy", "created_at"),
            ("orderDirection", "DESC"),
            ("filter", "status:=:open"),
            ("filter", "note:like:%a:b%"),
            ("filter", "broken"),
        ]))
        .unwrap();

        assert_eq!(query.schema, "sales");
        assert_eq!(query.table, "orders");
        assert_eq!(query.limit, 25);
        assert_eq!(query.offset, 50);
        assert_eq!(query.order_by.as_deref(), Some("created_at"));
        assert_eq!(query.order_direction, Some(SortOrder::Descending));
        assert_eq!(query.filters.len(), 2);
        assert_eq!(query.filters[1].value, Value::from("%a:b%"));
        assert_eq!(malformed, vec!["broken".to_string()]);
    }

    #[test]
    fn test_table_data_query_defaults() {
        let (query, malformed) = table_data_query(&params(&[("table", "users")])).unwrap();
        assert_eq!(query.schema, "");
        assert_eq!(query.limit, 100);
        assert_eq!(query.offset, 0);
        assert!(query.order_by.is_none());
        assert!(query.filters.is_empty());
        assert!(malformed.is_empty());
    }

    #[test]
    fn test_table_data_query_rejects_bad_pagination() {
        let error = table_data_query(&params(&[("limit", "ten")])).unwrap_err();
        assert_eq!(error.to_string(), "invalid limit");

        let error = table_data_query(&params(&[("offset", "-5")])).unwrap_err();
        assert_eq!(error.to_string(), "invalid offset");

        let error = table_data_query(&params(&[("orderDirection", "sideways")])).unwrap_err();
        assert!(matches!(error, GatewayError::Validation(_)));
    }
}
