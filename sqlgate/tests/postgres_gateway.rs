//! Integration tests against a live PostgreSQL server
//!
//! Set `SQLGATE_TEST_DATABASE_URL` to run them; they are skipped otherwise.
//! Each test works on its own tables so the suite can run in parallel.

#![cfg(feature = "postgres")]

use sqlgate::schema::{
    AlterTableOperation, ColumnDefinition, ConstraintSpec, Filter, QueryRequest, Record, SortOrder,
};
use sqlgate::{DatabaseGateway, GatewayError, GatewayOptions, PostgresGateway, TableDataQuery, Value};

async fn connected_gateway() -> Option<PostgresGateway> {
    connected_gateway_with(GatewayOptions::default()).await
}

async fn connected_gateway_with(options: GatewayOptions) -> Option<PostgresGateway> {
    let url = std::env::var("SQLGATE_TEST_DATABASE_URL").ok()?;
    let gateway = PostgresGateway::new(options);
    gateway.connect(&url).await.expect("test database must be reachable");
    Some(gateway)
}

fn add_column(name: &str, data_type: &str) -> AlterTableOperation {
    AlterTableOperation {
        action: "add_column".into(),
        column_name: name.into(),
        data_type: Some(data_type.into()),
        ..AlterTableOperation::default()
    }
}

async fn run(gateway: &PostgresGateway, sql: &str) {
    gateway
        .execute_query(&QueryRequest {
            sql: sql.to_string(),
            returns_rows: Some(false),
        })
        .await
        .unwrap_or_else(|error| panic!("{}: {}", sql, error));
}

fn column(name: &str, data_type: &str) -> ColumnDefinition {
    ColumnDefinition {
        name: name.to_string(),
        data_type: data_type.to_string(),
        primary_key: false,
        not_null: false,
        default: None,
    }
}

fn record(entries: &[(&str, Value)]) -> Record {
    entries
        .iter()
        .map(|(name, value)| (name.to_string(), value.clone()))
        .collect()
}

#[tokio::test]
async fn test_list_columns_shape() {
    let Some(gateway) = connected_gateway().await else { return };
    run(&gateway, "DROP TABLE IF EXISTS it_columns_child, it_columns_parent").await;

    let mut id = column("id", "INTEGER");
    id.primary_key = true;
    let mut email = column("email", "TEXT");
    email.not_null = true;
    let mut status = column("status", "TEXT");
    status.default = Some("'new'".to_string());

    gateway
        .create_table("public", "it_columns_parent", &[id.clone(), email, status])
        .await
        .unwrap();
    gateway
        .add_constraint(&ConstraintSpec {
            table_name: "it_columns_parent".into(),
            constraint_name: "it_columns_parent_email_key".into(),
            constraint_type: "unique".into(),
            columns: vec!["email".into()],
            ..ConstraintSpec::default()
        })
        .await
        .unwrap();

    gateway
        .create_table("", "it_columns_child", &[id, column("parent_id", "INTEGER")])
        .await
        .unwrap();
    gateway
        .add_constraint(&ConstraintSpec {
            table_name: "it_columns_child".into(),
            constraint_name: "it_columns_child_parent_fk".into(),
            constraint_type: "FOREIGN KEY".into(),
            columns: vec!["parent_id".into()],
            ref_table: Some("it_columns_parent".into()),
            ref_columns: vec!["id".into()],
            on_delete: Some("cascade".into()),
            ..ConstraintSpec::default()
        })
        .await
        .unwrap();

    let columns = gateway.list_columns("public", "it_columns_parent").await.unwrap();
    let names: Vec<_> = columns.iter().map(|column| column.name.as_str()).collect();
    assert_eq!(names, ["id", "email", "status"]);
    assert!(!columns[0].nullable);
    assert!(!columns[1].nullable);
    assert!(columns[1].is_unique);
    assert!(columns[2].nullable);
    assert!(columns[2].default.as_deref().unwrap_or_default().contains("new"));
    assert_eq!(columns[0].default, None);

    let child = gateway.list_columns("public", "it_columns_child").await.unwrap();
    assert_eq!(child[0].foreign_key, None);
    let foreign_key = child[1].foreign_key.as_deref().unwrap();
    assert!(foreign_key.starts_with("FOREIGN KEY (parent_id) REFERENCES"));

    let constraints = gateway.list_constraints("public", "it_columns_child").await.unwrap();
    assert!(constraints
        .iter()
        .any(|constraint| constraint.constraint_type == "FOREIGN KEY"
            && constraint.definition.contains("ON DELETE CASCADE")));

    gateway.drop_table("public", "it_columns_parent", true).await.unwrap();
    gateway.drop_table("public", "it_columns_child", false).await.unwrap();
}

#[tokio::test]
async fn test_alter_table_round_trip() {
    let Some(gateway) = connected_gateway().await else { return };
    run(&gateway, "DROP TABLE IF EXISTS it_alter").await;

    gateway
        .create_table("public", "it_alter", &[column("id", "INTEGER"), column("legacy", "TEXT")])
        .await
        .unwrap();

    let operations = vec![
        add_column("score", "INTEGER"),
        AlterTableOperation {
            action: "rename_column".into(),
            column_name: "legacy".into(),
            new_name: Some("notes".into()),
            ..AlterTableOperation::default()
        },
        AlterTableOperation {
            action: "alter_column".into(),
            column_name: "id".into(),
            not_null: Some(true),
            ..AlterTableOperation::default()
        },
    ];
    gateway.alter_table("public", "it_alter", &operations).await.unwrap();

    let columns = gateway.list_columns("public", "it_alter").await.unwrap();
    let names: Vec<_> = columns.iter().map(|column| column.name.as_str()).collect();
    assert_eq!(names, ["id", "notes", "score"]);
    assert!(!columns[0].nullable);

    let error = gateway
        .alter_table(
            "public",
            "it_alter",
            &[AlterTableOperation {
                action: "explode".into(),
                column_name: "id".into(),
                ..AlterTableOperation::default()
            }],
        )
        .await
        .unwrap_err();
    assert!(matches!(error, GatewayError::UnsupportedAction(_)));

    // A failing rename rolls back the actions sent with it
    let error = gateway
        .alter_table(
            "public",
            "it_alter",
            &[
                add_column("extra", "TEXT"),
                AlterTableOperation {
                    action: "rename_column".into(),
                    column_name: "missing".into(),
                    new_name: Some("found".into()),
                    ..AlterTableOperation::default()
                },
            ],
        )
        .await
        .unwrap_err();
    assert!(matches!(error, GatewayError::Engine(_)));
    let columns = gateway.list_columns("public", "it_alter").await.unwrap();
    assert!(columns.iter().all(|column| column.name != "extra"));

    gateway.drop_table("public", "it_alter", false).await.unwrap();
}

#[tokio::test]
async fn test_reads_follow_schema_changes() {
    // One connection, so every read reuses the session that saw the old shape
    let options = GatewayOptions {
        max_connections: 1,
        ..GatewayOptions::default()
    };
    let Some(gateway) = connected_gateway_with(options).await else { return };
    run(&gateway, "DROP TABLE IF EXISTS it_reshape").await;
    gateway
        .create_table("public", "it_reshape", &[column("id", "INTEGER")])
        .await
        .unwrap();

    let query = TableDataQuery::new("public", "it_reshape");
    let empty = gateway.get_table_data(&query).await.unwrap();
    assert_eq!(empty.result.columns(), ["id"]);

    gateway
        .alter_table("public", "it_reshape", &[add_column("name", "TEXT")])
        .await
        .unwrap();
    let empty = gateway.get_table_data(&query).await.unwrap();
    assert_eq!(empty.result.columns(), ["id", "name"]);

    run(&gateway, "INSERT INTO it_reshape VALUES (1, 'a')").await;
    let select_all = QueryRequest::new("SELECT * FROM it_reshape");
    let before = gateway.execute_query(&select_all).await.unwrap();
    assert_eq!(before.result.columns(), ["id", "name"]);

    gateway
        .alter_table("public", "it_reshape", &[add_column("age", "INTEGER")])
        .await
        .unwrap();
    let after = gateway.execute_query(&select_all).await.unwrap();
    assert_eq!(after.result.columns(), ["id", "name", "age"]);
    assert_eq!(
        after.result.rows(),
        [vec![Value::Integer(1), Value::from("a"), Value::Null]]
    );

    let data = gateway.get_table_data(&query).await.unwrap();
    assert_eq!(data.result.columns(), ["id", "name", "age"]);
    assert_eq!(data.result.rows().len(), 1);

    gateway.drop_table("public", "it_reshape", false).await.unwrap();
}

#[tokio::test]
async fn test_scans_extended_types() {
    let Some(gateway) = connected_gateway().await else { return };

    let result = gateway
        .execute_query(&QueryRequest::new(
            "SELECT ARRAY[1,2,3] AS a, INTERVAL '1 day 02:00:00' AS b, '10.0.0.1'::inet AS c, \
             '10.0.0.0/8'::cidr AS d, ARRAY['x', NULL, 'a b'] AS e, int4range(1, 5) AS f, \
             ARRAY[[1,2],[3,4]] AS g, '12:00:00+02'::timetz AS h, \
             'NaN'::float8 AS i, 'Infinity'::float8 AS j, NULL::float8 AS k",
        ))
        .await
        .unwrap();

    let row = &result.result.rows()[0];
    assert_eq!(row[0], Value::Other("{1,2,3}".into()));
    assert_eq!(row[1], Value::Other("1 day 02:00:00".into()));
    assert_eq!(row[2], Value::Other("10.0.0.1".into()));
    assert_eq!(row[3], Value::Other("10.0.0.0/8".into()));
    assert_eq!(row[4], Value::Other("{x,NULL,\"a b\"}".into()));
    assert_eq!(row[5], Value::Other("[1,5)".into()));
    // Multi-dimensional arrays have no decoder and pass through as bytes
    assert!(matches!(row[6], Value::Binary(_)));
    assert_eq!(row[7], Value::Other("12:00:00+02:00".into()));

    let json = serde_json::to_value(&row[8..]).unwrap();
    assert_eq!(json, serde_json::json!(["NaN", "Infinity", null]));
}

#[tokio::test]
async fn test_records_and_table_data() {
    let Some(gateway) = connected_gateway().await else { return };
    run(&gateway, "DROP TABLE IF EXISTS it_records").await;
    run(
        &gateway,
        "CREATE TABLE it_records (id INTEGER PRIMARY KEY, name VARCHAR(20), age INTEGER, \
         joined TIMESTAMP, payload BYTEA, active BOOLEAN)",
    )
    .await;

    let rows = [
        (1, "alice", Value::Integer(30)),
        (2, "bob", Value::Null),
        (3, "carol", Value::from("41")),
    ];
    for (id, name, age) in rows {
        let data = record(&[
            ("id", Value::Integer(id)),
            ("name", Value::from(name)),
            ("age", age),
            ("joined", Value::from("2024-01-02 03:04:05")),
            ("active", Value::Boolean(id != 2)),
        ]);
        assert_eq!(gateway.insert_record("public", "it_records", &data).await.unwrap(), 1);
    }

    // Text filter values are cast to the column type
    let mut query = TableDataQuery::new("public", "it_records");
    query.filters.push(Filter::new("age", ">=", "30"));
    query.filters.push(Filter::new("name", "contains", "x"));
    query.order_by = Some("id".into());
    query.order_direction = Some(SortOrder::Descending);
    let data = gateway.get_table_data(&query).await.unwrap();
    assert_eq!(data.ignored_filters, vec!["name:contains:x".to_string()]);
    assert_eq!(data.result.columns(), ["id", "name", "age", "joined", "payload", "active"]);
    assert_eq!(data.result.rows().len(), 2);
    assert_eq!(data.result.rows()[0][0], Value::Integer(3));
    assert_eq!(data.result.rows()[0][2], Value::Integer(41));
    assert_eq!(data.result.rows()[0][3], Value::Other("2024-01-02 03:04:05".into()));
    assert_eq!(data.result.rows()[0][4], Value::Null);

    let mut like = TableDataQuery::new("public", "it_records");
    like.filters.push(Filter::new("name", "LIKE", "b%"));
    let data = gateway.get_table_data(&like).await.unwrap();
    assert_eq!(data.result.rows().len(), 1);
    assert_eq!(data.result.rows()[0][2], Value::Null);
    assert_eq!(data.result.rows()[0][5], Value::Boolean(false));

    let affected = gateway
        .update_record(
            "public",
            "it_records",
            &record(&[("payload", Value::Binary(vec![0xca, 0xfe]))]),
            &record(&[("age", Value::Null)]),
        )
        .await
        .unwrap();
    assert_eq!(affected, 1);

    let result = gateway
        .execute_query(&QueryRequest::new("SELECT payload FROM it_records WHERE id = 2"))
        .await
        .unwrap();
    assert_eq!(result.result.rows()[0][0], Value::Binary(vec![0xca, 0xfe]));

    let affected = gateway
        .delete_record("public", "it_records", &record(&[("id", Value::from("1"))]))
        .await
        .unwrap();
    assert_eq!(affected, 1);

    let error = gateway
        .update_record("public", "it_records", &record(&[("name", Value::from("x"))]), &Record::new())
        .await
        .unwrap_err();
    assert!(matches!(error, GatewayError::Validation(_)));

    gateway.drop_table("public", "it_records", false).await.unwrap();
}

#[tokio::test]
async fn test_execute_query_paths() {
    let Some(gateway) = connected_gateway().await else { return };

    let empty = gateway
        .execute_query(&QueryRequest::new("  select 1 AS one, 'x' AS two WHERE false"))
        .await
        .unwrap();
    assert_eq!(empty.result.columns(), ["one", "two"]);
    assert!(empty.result.rows().is_empty());

    let cte = gateway
        .execute_query(&QueryRequest {
            sql: "WITH numbers AS (SELECT 1 AS n) SELECT n FROM numbers".into(),
            returns_rows: Some(true),
        })
        .await
        .unwrap();
    assert_eq!(cte.result.rows(), [vec![Value::Integer(1)]]);

    let write = gateway
        .execute_query(&QueryRequest::new(
            "CREATE TEMP TABLE it_scratch (n INT); INSERT INTO it_scratch VALUES (1), (2)",
        ))
        .await
        .unwrap();
    assert!(write.result.columns().is_empty());

    let error = gateway
        .execute_query(&QueryRequest::new("SELECT * FROM it_missing_table"))
        .await
        .unwrap_err();
    assert_eq!(error.to_string(), "relation \"it_missing_table\" does not exist");
}

#[tokio::test]
async fn test_connect_replaces_previous_connection() {
    let Ok(url) = std::env::var("SQLGATE_TEST_DATABASE_URL") else { return };
    let gateway = PostgresGateway::new(GatewayOptions::default());

    gateway.connect(&url).await.unwrap();
    gateway.connect(&url).await.unwrap();
    assert!(gateway.is_connected().await);
    assert!(!gateway.list_schemas().await.unwrap().is_empty());

    // A call already running on the old pool completes across a reconnect
    let sleeper = QueryRequest::new("SELECT pg_sleep(0.3)::text AS slept");
    let (slow, reconnect) = tokio::join!(gateway.execute_query(&sleeper), gateway.connect(&url));
    assert_eq!(slow.unwrap().result.columns(), ["slept"]);
    reconnect.unwrap();
    assert!(gateway.list_tables("public").await.is_ok());

    // A failing connect keeps the working connection
    assert!(gateway.connect("postgres://127.0.0.1:1/nowhere").await.is_err());
    assert!(gateway.list_tables("public").await.is_ok());

    gateway.disconnect().await.unwrap();
    gateway.disconnect().await.unwrap();
    assert!(matches!(gateway.list_schemas().await, Err(GatewayError::NotConnected)));
}
