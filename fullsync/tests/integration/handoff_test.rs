use fullsync::destination::memory::MemoryDestination;
use fullsync::error::ErrorKind;
use fullsync::handoff::file::FileHandoffStore;
use fullsync::handoff::{ConfiguredHandoffStore, HandoffStore};
use fullsync::source::memory::MemorySource;
use fullsync::state::run::RunOutcome;
use fullsync::state::table::{Step, TablePhase};
use fullsync::steps::{Extractor, Loader};
use fullsync::test_utils::pipeline::TestPipelineBuilder;
use fullsync::test_utils::table::{insert_ids, insert_orders, table_name};
use fullsync::types::Value;
use fullsync_config::shared::HandoffConfig;
use fullsync_telemetry::tracing::init_test_tracing;
use std::path::PathBuf;

fn temp_directory(name: &str) -> PathBuf {
    std::env::temp_dir().join(format!("fullsync-{name}-{}", std::process::id()))
}

#[tokio::test]
async fn extracted_rows_survive_reopening_the_file_store() {
    init_test_tracing();

    let directory = temp_directory("reopen");
    let orders = table_name("sales.orders");
    let source = MemorySource::new();
    insert_orders(&source, &orders).await;

    let handoff = FileHandoffStore::open(&directory).await.unwrap();
    Extractor::new(source, handoff).extract(&orders).await.unwrap();

    // A different process would only share the directory.
    let reopened = FileHandoffStore::open(&directory).await.unwrap();
    let destination = MemoryDestination::new();
    let rows = Loader::new(destination.clone(), reopened.clone(), "RAW")
        .load(&orders)
        .await
        .unwrap();
    assert_eq!(rows, 3);

    let table = destination.table("RAW", "orders").await.unwrap();
    let first = table.records().next().unwrap();
    assert_eq!(first.get("customer"), Some(&Value::from("alice")));
    assert!(reopened.get(&orders).await.unwrap().is_none());

    tokio::fs::remove_dir_all(&directory).await.unwrap();
}

#[tokio::test]
async fn pipeline_runs_with_a_configured_file_store() {
    init_test_tracing();

    let directory = temp_directory("configured");
    let orders = table_name("orders");
    let source = MemorySource::new();
    insert_orders(&source, &orders).await;

    let handoff = ConfiguredHandoffStore::from_config(&HandoffConfig::File {
        path: directory.clone(),
    })
    .await
    .unwrap();

    let destination = MemoryDestination::new();
    let pipeline = TestPipelineBuilder::new(&["orders"])
        .build(source, destination.clone(), handoff)
        .unwrap();

    let report = pipeline.run().await.unwrap();
    assert!(report.is_success());
    assert_eq!(destination.table("RAW", "orders").await.unwrap().len(), 3);

    let mut entries = tokio::fs::read_dir(&directory).await.unwrap();
    assert!(entries.next_entry().await.unwrap().is_none());

    tokio::fs::remove_dir_all(&directory).await.unwrap();
}

#[tokio::test]
async fn table_whose_stale_slot_cannot_be_cleared_fails_alone() {
    init_test_tracing();

    let directory = temp_directory("unclearable");
    let (broken, orders) = (table_name("broken"), table_name("orders"));
    let source = MemorySource::new();
    insert_ids(&source, &broken, 2).await;
    insert_orders(&source, &orders).await;

    // A directory where the slot file should be cannot be removed as a file.
    let handoff = FileHandoffStore::open(&directory).await.unwrap();
    tokio::fs::create_dir_all(directory.join("broken.json"))
        .await
        .unwrap();

    let destination = MemoryDestination::new();
    let pipeline = TestPipelineBuilder::new(&["broken", "orders"])
        .build(source, destination.clone(), handoff)
        .unwrap();

    let report = pipeline.run().await.unwrap();
    assert_eq!(report.outcome, RunOutcome::PartiallySucceeded);

    let outcome = report.table(&broken).unwrap();
    assert!(matches!(
        outcome.phase,
        TablePhase::Failed {
            step: Step::Extract,
            ..
        }
    ));
    assert_eq!(outcome.extract_attempts, 0);
    assert_eq!(
        outcome.error.as_ref().unwrap().kind(),
        ErrorKind::HandoffIoError
    );
    assert!(destination.table("RAW", "broken").await.is_none());

    assert_eq!(
        report.table(&orders).unwrap().phase,
        TablePhase::Done { rows: 3 }
    );
    assert_eq!(destination.table("RAW", "orders").await.unwrap().len(), 3);

    tokio::fs::remove_dir_all(&directory).await.unwrap();
}
