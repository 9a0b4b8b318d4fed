use fullsync::destination::{Destination, DestinationConnection};
use fullsync::error::ErrorKind;
use fullsync::handoff::memory::MemoryHandoffStore;
use fullsync::pipeline::Pipeline;
use fullsync::state::run::RunOutcome;
use fullsync::state::table::TablePhase;
use fullsync::types::{RowSet, TableName, TableRow, Value};
use fullsync_config::shared::{PipelineConfig, RetryConfig};
use fullsync_postgres::destination::PgDestination;
use fullsync_postgres::source::PgSource;
use fullsync_postgres::test_utils::database::spawn_target_database;
use fullsync_telemetry::tracing::init_test_tracing;
use tokio::task::JoinSet;

fn row_set(columns: &[&str], rows: Vec<Vec<Value>>) -> RowSet {
    RowSet::try_new(
        columns.iter().map(|column| column.to_string()).collect(),
        rows.into_iter().map(TableRow::new).collect(),
    )
    .unwrap()
}

fn orders(rows: i64) -> RowSet {
    row_set(
        &["id", "customer", "amount", "paid", "note"],
        (1..=rows)
            .map(|id| {
                vec![
                    Value::I64(id),
                    Value::from(format!("customer {id}")),
                    Value::F64(id as f64 * 1.5),
                    Value::Bool(id % 2 == 0),
                    Value::Null,
                ]
            })
            .collect(),
    )
}

#[tokio::test(flavor = "multi_thread")]
async fn replaced_table_holds_the_rows_with_inferred_types() {
    init_test_tracing();
    let Some(database) = spawn_target_database().await else {
        return;
    };

    let destination = PgDestination::new(database.target_config(2));
    let mut connection = destination.connect().await.unwrap();
    connection.prepare_schema("RAW").await.unwrap();
    connection.prepare_schema("RAW").await.unwrap();
    connection
        .replace_table("RAW", "orders", &orders(5))
        .await
        .unwrap();
    connection.close().await.unwrap();

    assert_eq!(
        database.columns("RAW", "orders").await,
        vec![
            ("id".to_string(), "bigint".to_string()),
            ("customer".to_string(), "text".to_string()),
            ("amount".to_string(), "double precision".to_string()),
            ("paid".to_string(), "boolean".to_string()),
            ("note".to_string(), "text".to_string()),
        ]
    );

    let rows = database
        .client
        .query(
            r#"select id, customer, amount, paid, note from "RAW".orders order by id"#,
            &[],
        )
        .await
        .unwrap();
    assert_eq!(rows.len(), 5);
    assert_eq!(rows[1].get::<_, i64>(0), 2);
    assert_eq!(rows[1].get::<_, String>(1), "customer 2");
    assert_eq!(rows[1].get::<_, f64>(2), 3.0);
    assert!(rows[1].get::<_, bool>(3));
    assert_eq!(rows[1].get::<_, Option<String>>(4), None);
}

#[tokio::test(flavor = "multi_thread")]
async fn empty_row_sets_leave_an_existing_table() {
    init_test_tracing();
    let Some(database) = spawn_target_database().await else {
        return;
    };

    let destination = PgDestination::new(database.target_config(1000));
    let mut connection = destination.connect().await.unwrap();
    connection.prepare_schema("RAW").await.unwrap();

    connection
        .replace_table("RAW", "no_rows", &row_set(&["id", "name"], vec![]))
        .await
        .unwrap();
    connection
        .replace_table("RAW", "no_columns", &RowSet::empty())
        .await
        .unwrap();
    connection
        .replace_table(
            "RAW",
            "only_rows",
            &row_set(&[], vec![vec![], vec![], vec![]]),
        )
        .await
        .unwrap();

    assert_eq!(
        database.table_names("RAW").await,
        vec!["no_columns", "no_rows", "only_rows"]
    );
    assert_eq!(database.row_count("RAW", "no_rows").await, 0);
    assert_eq!(database.columns("RAW", "no_rows").await.len(), 2);
    assert_eq!(database.row_count("RAW", "no_columns").await, 0);
    assert!(database.columns("RAW", "no_columns").await.is_empty());
    assert_eq!(database.row_count("RAW", "only_rows").await, 3);
}

#[tokio::test(flavor = "multi_thread")]
async fn replacing_twice_keeps_only_the_last_rows() {
    init_test_tracing();
    let Some(database) = spawn_target_database().await else {
        return;
    };

    let destination = PgDestination::new(database.target_config(2));
    for _ in 0..2 {
        let mut connection = destination.connect().await.unwrap();
        connection.prepare_schema("RAW").await.unwrap();
        connection
            .replace_table("RAW", "orders", &orders(3))
            .await
            .unwrap();
        connection.close().await.unwrap();
    }

    assert_eq!(database.row_count("RAW", "orders").await, 3);
    // No staging table is left behind.
    assert_eq!(database.table_names("RAW").await, vec!["orders"]);
}

#[tokio::test(flavor = "multi_thread")]
async fn failed_replace_keeps_the_previous_table() {
    init_test_tracing();
    let Some(database) = spawn_target_database().await else {
        return;
    };

    let destination = PgDestination::new(database.target_config(1));
    let mut connection = destination.connect().await.unwrap();
    connection.prepare_schema("RAW").await.unwrap();
    connection
        .replace_table("RAW", "orders", &orders(3))
        .await
        .unwrap();

    // Text values cannot hold NUL, the last batch is rejected after the first ones were written.
    let rejected = row_set(
        &["id", "label"],
        vec![
            vec![Value::I64(1), Value::from("ok")],
            vec![Value::I64(2), Value::from("bad\0value")],
        ],
    );
    let err = connection
        .replace_table("RAW", "orders", &rejected)
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::ConversionError);

    assert_eq!(database.row_count("RAW", "orders").await, 3);
    assert_eq!(database.columns("RAW", "orders").await.len(), 5);
    assert_eq!(database.table_names("RAW").await, vec!["orders"]);

    // The connection is still usable once the transaction rolled back.
    connection
        .replace_table("RAW", "orders", &orders(4))
        .await
        .unwrap();
    assert_eq!(database.row_count("RAW", "orders").await, 4);
}

#[tokio::test(flavor = "multi_thread")]
async fn concurrent_schema_preparations_all_succeed() {
    init_test_tracing();
    let Some(database) = spawn_target_database().await else {
        return;
    };

    let destination = PgDestination::new(database.target_config(1000));
    let mut preparations = JoinSet::new();
    for _ in 0..8 {
        let destination = destination.clone();
        preparations.spawn(async move {
            let mut connection = destination.connect().await?;
            connection.prepare_schema("RAW").await
        });
    }

    while let Some(result) = preparations.join_next().await {
        result.unwrap().unwrap();
    }

    let schemas: i64 = database
        .client
        .query_one(
            "select count(*) from pg_namespace where nspname = 'RAW'",
            &[],
        )
        .await
        .unwrap()
        .get(0);
    assert_eq!(schemas, 1);
}

#[tokio::test(flavor = "multi_thread")]
async fn pipeline_copies_source_tables_into_the_target_schema() {
    init_test_tracing();
    let Some(database) = spawn_target_database().await else {
        return;
    };

    database
        .client
        .batch_execute(
            "create schema sales;
             create table sales.orders (id bigint, customer text, created_at timestamp);
             insert into sales.orders
                 select id, 'customer ' || id, timestamp '2024-03-01 09:30:00' + id * interval '1 day'
                 from generate_series(1, 25) as id;
             create table sales.customers (id int, active boolean);
             insert into sales.customers values (1, true), (2, false);
             create table sales.archived ();",
        )
        .await
        .unwrap();

    let config = PipelineConfig {
        id: 1,
        tables: vec![
            "sales.orders".to_string(),
            "sales.customers".to_string(),
            "sales.archived".to_string(),
        ],
        target_schema: "RAW".to_string(),
        retry: RetryConfig {
            max_attempts: 1,
            delay_ms: 0,
        },
        max_table_workers: 3,
    };
    let pipeline = Pipeline::new(
        config,
        PgSource::new(database.config.clone()),
        PgDestination::new(database.target_config(10)),
        MemoryHandoffStore::new(),
    )
    .unwrap();

    let report = pipeline.run().await.unwrap();
    assert_eq!(report.outcome, RunOutcome::Succeeded);

    let orders = TableName::parse("sales.orders").unwrap();
    assert_eq!(
        report.table(&orders).unwrap().phase,
        TablePhase::Done { rows: 25 }
    );
    assert_eq!(
        database.table_names("RAW").await,
        vec!["archived", "customers", "orders"]
    );
    assert_eq!(database.row_count("RAW", "orders").await, 25);
    assert_eq!(database.row_count("RAW", "customers").await, 2);
    assert_eq!(database.row_count("RAW", "archived").await, 0);

    // A second run replaces the tables instead of appending to them.
    assert!(pipeline.run().await.unwrap().is_success());
    assert_eq!(database.row_count("RAW", "orders").await, 25);
}
