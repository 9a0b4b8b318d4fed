use fullsync::destination::memory::MemoryDestination;
use fullsync::error::ErrorKind;
use fullsync::handoff::HandoffStore;
use fullsync::handoff::memory::MemoryHandoffStore;
use fullsync::source::memory::MemorySource;
use fullsync::state::run::RunOutcome;
use fullsync::state::table::{Step, TablePhase, TablePhaseType};
use fullsync::test_utils::faults::{TestDestination, TestSource};
use fullsync::test_utils::pipeline::TestPipelineBuilder;
use fullsync::test_utils::table::{insert_ids, insert_orders, table_name};
use fullsync::types::{RowSet, TableRow, Value};
use fullsync_telemetry::tracing::init_test_tracing;
use std::sync::Arc;
use std::time::Duration;

#[tokio::test]
async fn table_is_replicated_under_the_target_schema_and_reruns_are_idempotent() {
    init_test_tracing();

    let orders = table_name("orders");
    let source = MemorySource::new();
    insert_orders(&source, &orders).await;

    let destination = MemoryDestination::new();
    let handoff = MemoryHandoffStore::new();
    let pipeline = TestPipelineBuilder::new(&["orders"])
        .build(source.clone(), destination.clone(), handoff.clone())
        .unwrap();

    let report = pipeline.run().await.unwrap();
    assert_eq!(report.outcome, RunOutcome::Succeeded);
    assert_eq!(report.tables.len(), 1);
    assert_eq!(report.tables[0].phase, TablePhase::Done { rows: 3 });

    let table = destination.table("RAW", "orders").await.unwrap();
    assert_eq!(table.len(), 3);
    assert_eq!(
        table.columns(),
        &["id", "customer", "amount", "created_at"].map(String::from)
    );
    let created_at: Vec<_> = table.column_values("created_at").unwrap().collect();
    assert_eq!(
        created_at,
        vec![
            &Value::from("2024-03-01T09:30:00"),
            &Value::from("2024-03-02T14:30:00"),
            &Value::from("2024-03-03T23:30:00"),
        ]
    );

    // The slot is consumed by the load.
    assert!(handoff.tables().await.is_empty());
    assert_eq!(source.open_connections(), 0);

    let report = pipeline.run().await.unwrap();
    assert!(report.is_success());

    let table = destination.table("RAW", "orders").await.unwrap();
    assert_eq!(table.len(), 3);
    assert_eq!(destination.replace_count().await, 2);
    assert_eq!(
        destination.table_names().await,
        vec![("RAW".to_string(), "orders".to_string())]
    );
}

#[tokio::test]
async fn second_run_reflects_the_source_at_its_own_extract() {
    init_test_tracing();

    let orders = table_name("orders");
    let source = MemorySource::new();
    insert_ids(&source, &orders, 5).await;

    let destination = MemoryDestination::new();
    let pipeline = TestPipelineBuilder::new(&["orders"])
        .build(source.clone(), destination.clone(), MemoryHandoffStore::new())
        .unwrap();

    pipeline.run().await.unwrap();
    assert_eq!(destination.table("RAW", "orders").await.unwrap().len(), 5);

    insert_ids(&source, &orders, 2).await;
    pipeline.run().await.unwrap();
    assert_eq!(destination.table("RAW", "orders").await.unwrap().len(), 2);
}

#[tokio::test]
async fn schema_qualified_tables_are_written_under_their_unqualified_name() {
    init_test_tracing();

    let orders = table_name("sales.orders");
    let source = MemorySource::new();
    insert_orders(&source, &orders).await;

    let destination = MemoryDestination::new();
    let pipeline = TestPipelineBuilder::new(&["sales.orders"])
        .with_target_schema("STAGING")
        .build(source, destination.clone(), MemoryHandoffStore::new())
        .unwrap();

    let report = pipeline.run().await.unwrap();
    assert!(report.is_success());
    assert_eq!(
        destination.table_names().await,
        vec![("STAGING".to_string(), "orders".to_string())]
    );
}

#[tokio::test(start_paused = true)]
async fn failing_table_does_not_prevent_other_tables_from_completing() {
    init_test_tracing();

    let (broken, healthy) = (table_name("broken"), table_name("healthy"));
    let memory_source = MemorySource::new();
    insert_ids(&memory_source, &broken, 3).await;
    insert_ids(&memory_source, &healthy, 4).await;

    let source = TestSource::wrap(memory_source);
    source
        .always_fail_table(&broken, ErrorKind::SourceQueryFailed)
        .await;

    let destination = MemoryDestination::new();
    let pipeline = TestPipelineBuilder::new(&["broken", "healthy"])
        .build(source.clone(), destination.clone(), MemoryHandoffStore::new())
        .unwrap();

    let report = pipeline.run().await.unwrap();
    assert_eq!(report.outcome, RunOutcome::PartiallySucceeded);

    let broken_outcome = report.table(&broken).unwrap();
    assert!(matches!(
        broken_outcome.phase,
        TablePhase::Failed {
            step: Step::Extract,
            ..
        }
    ));
    assert_eq!(broken_outcome.extract_attempts, 2);
    assert_eq!(broken_outcome.load_attempts, 0);
    assert_eq!(
        broken_outcome.error.as_ref().unwrap().kind(),
        ErrorKind::RetryExhausted
    );

    let healthy_outcome = report.table(&healthy).unwrap();
    assert_eq!(healthy_outcome.phase, TablePhase::Done { rows: 4 });

    assert!(destination.table("RAW", "broken").await.is_none());
    assert_eq!(destination.table("RAW", "healthy").await.unwrap().len(), 4);

    let err = report.error().unwrap();
    assert_eq!(err.kinds(), vec![ErrorKind::RetryExhausted]);
}

#[tokio::test(start_paused = true)]
async fn step_failing_fewer_times_than_the_budget_reaches_done() {
    init_test_tracing();

    let orders = table_name("orders");
    let memory_source = MemorySource::new();
    insert_orders(&memory_source, &orders).await;

    let source = TestSource::wrap(memory_source);
    source
        .fail_table(&orders, 2, ErrorKind::SourceConnectionFailed)
        .await;

    let destination = MemoryDestination::new();
    let pipeline = TestPipelineBuilder::new(&["orders"])
        .with_retry(3, Duration::from_secs(1))
        .build(source.clone(), destination.clone(), MemoryHandoffStore::new())
        .unwrap();

    let report = pipeline.run().await.unwrap();
    assert!(report.is_success());

    let outcome = report.table(&orders).unwrap();
    assert_eq!(outcome.extract_attempts, 3);
    assert_eq!(outcome.load_attempts, 1);
    assert!(outcome.error.is_none());
    assert_eq!(destination.table("RAW", "orders").await.unwrap().len(), 3);
}

#[tokio::test(start_paused = true)]
async fn always_failing_step_stops_after_max_attempts_spaced_by_the_delay() {
    init_test_tracing();

    let orders = table_name("orders");
    let memory_source = MemorySource::new();
    insert_orders(&memory_source, &orders).await;

    let source = TestSource::wrap(memory_source);
    source
        .always_fail_table(&orders, ErrorKind::SourceQueryFailed)
        .await;

    let delay = Duration::from_secs(5 * 60);
    let pipeline = TestPipelineBuilder::new(&["orders"])
        .with_retry(3, delay)
        .build(source.clone(), MemoryDestination::new(), MemoryHandoffStore::new())
        .unwrap();

    let report = pipeline.run().await.unwrap();
    assert_eq!(report.outcome, RunOutcome::Failed);

    let attempts = source.attempts(&orders).await;
    assert_eq!(attempts.len(), 3);
    for pair in attempts.windows(2) {
        assert!(pair[1] - pair[0] >= delay);
    }

    let outcome = report.table(&orders).unwrap();
    assert_eq!(outcome.extract_attempts, 3);
    let err = outcome.error.as_ref().unwrap();
    assert_eq!(err.kind(), ErrorKind::RetryExhausted);
    assert!(err.detail().unwrap().contains("3 attempt"));
}

#[tokio::test(start_paused = true)]
async fn load_retry_reuses_the_extracted_rows_without_extracting_again() {
    init_test_tracing();

    let orders = table_name("orders");
    let memory_source = MemorySource::new();
    insert_orders(&memory_source, &orders).await;
    let source = TestSource::wrap(memory_source);

    let destination = TestDestination::wrap(MemoryDestination::new());
    destination
        .fail_table(&orders, 1, ErrorKind::DestinationWriteFailed)
        .await;

    let handoff = MemoryHandoffStore::new();
    let pipeline = TestPipelineBuilder::new(&["orders"])
        .build(source.clone(), destination.clone(), handoff.clone())
        .unwrap();

    let report = pipeline.run().await.unwrap();
    assert!(report.is_success());

    let outcome = report.table(&orders).unwrap();
    assert_eq!(outcome.extract_attempts, 1);
    assert_eq!(outcome.load_attempts, 2);
    assert_eq!(source.attempts(&orders).await.len(), 1);
    assert_eq!(destination.attempts(&orders).await.len(), 2);

    let table = destination.wrapped().table("RAW", "orders").await.unwrap();
    assert_eq!(table.len(), 3);
    assert!(handoff.tables().await.is_empty());
}

#[tokio::test(start_paused = true)]
async fn errors_that_are_not_retried_fail_the_table_on_the_first_attempt() {
    init_test_tracing();

    for kind in [ErrorKind::InvalidData, ErrorKind::ConversionError] {
        let orders = table_name("orders");
        let memory_source = MemorySource::new();
        insert_orders(&memory_source, &orders).await;

        let source = TestSource::wrap(memory_source);
        source.fail_table(&orders, 1, kind).await;

        let pipeline = TestPipelineBuilder::new(&["orders"])
            .with_retry(5, Duration::from_secs(1))
            .build(source.clone(), MemoryDestination::new(), MemoryHandoffStore::new())
            .unwrap();

        let report = pipeline.run().await.unwrap();

        let outcome = report.table(&orders).unwrap();
        assert!(outcome.is_failed(), "{kind:?}");
        assert_eq!(outcome.extract_attempts, 1, "{kind:?}");
        assert_eq!(outcome.error.as_ref().unwrap().kind(), kind);
    }
}

#[tokio::test(start_paused = true)]
async fn concurrency_limit_bounds_the_number_of_active_tables() {
    init_test_tracing();

    let names = ["t1", "t2", "t3", "t4", "t5"];
    let memory_source = MemorySource::new();
    for name in names {
        insert_ids(&memory_source, &table_name(name), 10).await;
    }

    let source = TestSource::wrap(memory_source);
    source.set_delay(Duration::from_millis(200)).await;

    let destination = MemoryDestination::new();
    let pipeline = TestPipelineBuilder::new(&names)
        .with_max_table_workers(2)
        .build(source.clone(), destination.clone(), MemoryHandoffStore::new())
        .unwrap();

    let report = pipeline.run().await.unwrap();
    assert!(report.is_success());
    assert_eq!(source.concurrency().max_active(), 2);

    // The report follows the registry order, not the completion order.
    let reported: Vec<_> = report.tables.iter().map(|t| t.table.to_string()).collect();
    assert_eq!(reported, names);
    assert_eq!(destination.table_names().await.len(), 5);
    assert_eq!(destination.schemas().await, vec!["RAW".to_string()]);
    assert_eq!(destination.prepare_count().await, 1);
}

#[tokio::test]
async fn empty_tables_still_produce_an_existing_target_table() {
    init_test_tracing();

    let (no_rows, no_columns) = (table_name("no_rows"), table_name("no_columns"));
    let source = MemorySource::new();
    source.insert_table(&no_rows, &["id", "name"], vec![]).await;
    source.insert_table(&no_columns, &[], vec![]).await;

    let destination = MemoryDestination::new();
    let pipeline = TestPipelineBuilder::new(&["no_rows", "no_columns"])
        .build(source, destination.clone(), MemoryHandoffStore::new())
        .unwrap();

    let report = pipeline.run().await.unwrap();
    assert!(report.is_success());

    let table = destination.table("RAW", "no_rows").await.unwrap();
    assert!(table.is_empty());
    assert_eq!(table.columns(), &["id".to_string(), "name".to_string()]);

    let table = destination.table("RAW", "no_columns").await.unwrap();
    assert!(table.is_empty());
    assert!(table.columns().is_empty());
}

#[tokio::test]
async fn run_cancelled_before_starting_leaves_every_table_pending() {
    init_test_tracing();

    let source = MemorySource::new();
    insert_ids(&source, &table_name("a"), 1).await;
    insert_ids(&source, &table_name("b"), 1).await;

    let destination = MemoryDestination::new();
    let pipeline = TestPipelineBuilder::new(&["a", "b"])
        .build(source, destination.clone(), MemoryHandoffStore::new())
        .unwrap();

    pipeline.shutdown();

    let report = pipeline.run().await.unwrap();
    assert_eq!(report.outcome, RunOutcome::Cancelled);
    assert!(
        report
            .tables
            .iter()
            .all(|table| table.phase == TablePhase::Pending && table.runs.is_empty())
    );
    assert_eq!(destination.replace_count().await, 0);
}

#[tokio::test(start_paused = true)]
async fn shutdown_during_retry_delay_fails_the_table_without_another_attempt() {
    init_test_tracing();

    let orders = table_name("orders");
    let memory_source = MemorySource::new();
    insert_orders(&memory_source, &orders).await;

    let source = TestSource::wrap(memory_source);
    source
        .always_fail_table(&orders, ErrorKind::SourceQueryFailed)
        .await;

    let pipeline = Arc::new(
        TestPipelineBuilder::new(&["orders"])
            .with_retry(3, Duration::from_secs(60))
            .build(source.clone(), MemoryDestination::new(), MemoryHandoffStore::new())
            .unwrap(),
    );

    let running = tokio::spawn({
        let pipeline = pipeline.clone();
        async move { pipeline.run().await }
    });

    // Let the first attempt fail before signaling shutdown.
    tokio::time::sleep(Duration::from_secs(1)).await;
    pipeline.shutdown();

    let report = running.await.unwrap().unwrap();
    assert_eq!(report.outcome, RunOutcome::Cancelled);
    assert_eq!(source.attempts(&orders).await.len(), 1);
    assert_eq!(report.table(&orders).unwrap().phase.as_type(), TablePhaseType::Failed);
}

#[tokio::test]
async fn missing_source_table_fails_the_extract_step() {
    init_test_tracing();

    let source = MemorySource::new();
    let destination = MemoryDestination::new();
    let pipeline = TestPipelineBuilder::new(&["ghost"])
        .with_retry(1, Duration::ZERO)
        .build(source, destination.clone(), MemoryHandoffStore::new())
        .unwrap();

    let report = pipeline.run().await.unwrap();
    assert_eq!(report.outcome, RunOutcome::Failed);

    let outcome = report.table(&table_name("ghost")).unwrap();
    let err = outcome.error.as_ref().unwrap();
    assert_eq!(err.kind(), ErrorKind::RetryExhausted);
    assert!(destination.table_names().await.is_empty());
}

#[tokio::test]
async fn stale_handoff_slots_are_cleared_before_a_run() {
    init_test_tracing();

    let orders = table_name("orders");
    let handoff = MemoryHandoffStore::new();
    let stale = RowSet::try_new(
        vec!["stale".to_string()],
        vec![TableRow::new(vec![Value::from(true)])],
    )
    .unwrap();
    handoff.put(&orders, Arc::new(stale)).await.unwrap();

    let destination = MemoryDestination::new();
    let pipeline = TestPipelineBuilder::new(&["orders"])
        .with_retry(1, Duration::ZERO)
        .build(MemorySource::new(), destination.clone(), handoff.clone())
        .unwrap();

    let report = pipeline.run().await.unwrap();
    assert_eq!(report.outcome, RunOutcome::Failed);
    assert!(handoff.get(&orders).await.unwrap().is_none());
    assert!(destination.table("RAW", "orders").await.is_none());
}

#[tokio::test]
async fn table_phase_can_be_awaited_while_the_run_is_in_flight() {
    init_test_tracing();

    let orders = table_name("orders");
    let source = MemorySource::new();
    insert_orders(&source, &orders).await;

    let pipeline = Arc::new(
        TestPipelineBuilder::new(&["orders"])
            .build(source, MemoryDestination::new(), MemoryHandoffStore::new())
            .unwrap(),
    );
    let state = pipeline.table_state(&orders).unwrap();
    let shutdown_rx = pipeline.shutdown_tx().subscribe();

    let running = tokio::spawn({
        let pipeline = pipeline.clone();
        async move { pipeline.run().await }
    });

    let result = state
        .wait_for_phase_type(&[TablePhaseType::Done], shutdown_rx)
        .await;
    assert!(!result.should_shutdown());
    drop(result);

    assert!(running.await.unwrap().unwrap().is_success());
}

#[tokio::test]
async fn invalid_configurations_are_rejected() {
    let duplicated = TestPipelineBuilder::new(&["orders", "orders"]).build(
        MemorySource::new(),
        MemoryDestination::new(),
        MemoryHandoffStore::new(),
    );
    assert_eq!(duplicated.unwrap_err().kind(), ErrorKind::ConfigError);

    let same_target = TestPipelineBuilder::new(&["sales.orders", "archive.orders"]).build(
        MemorySource::new(),
        MemoryDestination::new(),
        MemoryHandoffStore::new(),
    );
    assert_eq!(same_target.unwrap_err().kind(), ErrorKind::ConfigError);

    let no_workers = TestPipelineBuilder::new(&["orders"])
        .with_max_table_workers(0)
        .build(
            MemorySource::new(),
            MemoryDestination::new(),
            MemoryHandoffStore::new(),
        );
    assert_eq!(no_workers.unwrap_err().kind(), ErrorKind::ConfigError);

    let no_attempts = TestPipelineBuilder::new(&["orders"])
        .with_retry(0, Duration::ZERO)
        .build(
            MemorySource::new(),
            MemoryDestination::new(),
            MemoryHandoffStore::new(),
        );
    assert_eq!(no_attempts.unwrap_err().kind(), ErrorKind::ConfigError);
}
