use fullsync::destination::memory::MemoryDestination;
use fullsync::error::ErrorKind;
use fullsync::failpoints::{EXTRACT__BEFORE_HANDOFF_PUT, LOAD__BEFORE_REPLACE};
use fullsync::handoff::HandoffStore;
use fullsync::handoff::memory::MemoryHandoffStore;
use fullsync::source::memory::MemorySource;
use fullsync::state::run::RunOutcome;
use fullsync::state::table::{Step, TablePhase};
use fullsync::test_utils::failpoints::CustomFailScenario;
use fullsync::test_utils::pipeline::TestPipelineBuilder;
use fullsync::test_utils::table::{insert_orders, table_name};
use fullsync_telemetry::tracing::init_test_tracing;
use std::time::Duration;

#[tokio::test]
async fn timed_retry_error_before_handoff_put_is_retried() {
    init_test_tracing();
    let _scenario = CustomFailScenario::setup(&[(EXTRACT__BEFORE_HANDOFF_PUT, "1*return(timed_retry)")]);

    let orders = table_name("orders");
    let source = MemorySource::new();
    insert_orders(&source, &orders).await;

    let destination = MemoryDestination::new();
    let pipeline = TestPipelineBuilder::new(&["orders"])
        .with_retry(2, Duration::from_millis(10))
        .build(source, destination.clone(), MemoryHandoffStore::new())
        .unwrap();

    let report = pipeline.run().await.unwrap();
    assert!(report.is_success());

    let outcome = report.table(&orders).unwrap();
    assert_eq!(outcome.extract_attempts, 2);
    assert_eq!(outcome.load_attempts, 1);
    assert_eq!(destination.table("RAW", "orders").await.unwrap().len(), 3);
}

#[tokio::test]
async fn error_without_retry_before_replace_keeps_the_handoff_slot() {
    init_test_tracing();
    let _scenario = CustomFailScenario::setup(&[(LOAD__BEFORE_REPLACE, "return")]);

    let orders = table_name("orders");
    let source = MemorySource::new();
    insert_orders(&source, &orders).await;

    let destination = MemoryDestination::new();
    let handoff = MemoryHandoffStore::new();
    let pipeline = TestPipelineBuilder::new(&["orders"])
        .with_retry(3, Duration::from_millis(10))
        .build(source, destination.clone(), handoff.clone())
        .unwrap();

    let report = pipeline.run().await.unwrap();
    assert_eq!(report.outcome, RunOutcome::Failed);

    let outcome = report.table(&orders).unwrap();
    assert!(matches!(
        outcome.phase,
        TablePhase::Failed {
            step: Step::Load,
            ..
        }
    ));
    assert_eq!(outcome.load_attempts, 1);
    assert_eq!(outcome.error.as_ref().unwrap().kind(), ErrorKind::WithNoRetry);

    assert_eq!(handoff.get(&orders).await.unwrap().unwrap().len(), 3);
    assert_eq!(destination.replace_count().await, 0);
}

#[tokio::test]
async fn panicking_worker_is_reported_as_a_failed_table() {
    init_test_tracing();
    let _scenario = CustomFailScenario::setup(&[(EXTRACT__BEFORE_HANDOFF_PUT, "panic")]);

    let orders = table_name("orders");
    let source = MemorySource::new();
    insert_orders(&source, &orders).await;

    let pipeline = TestPipelineBuilder::new(&["orders"])
        .build(source, MemoryDestination::new(), MemoryHandoffStore::new())
        .unwrap();

    let report = pipeline.run().await.unwrap();
    assert_eq!(report.outcome, RunOutcome::Failed);

    let outcome = report.table(&orders).unwrap();
    assert!(matches!(
        outcome.phase,
        TablePhase::Failed {
            step: Step::Extract,
            ..
        }
    ));
    assert_eq!(
        outcome.error.as_ref().unwrap().kind(),
        ErrorKind::TableWorkerPanic
    );
}
