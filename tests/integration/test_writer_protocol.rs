//! Observable write protocol of SearchItemWriter against a recording client.

use crate::common::{Call, RecordingClient};
use search_batch::{
    BatchError, Chunk, IndexRequest, Propagation, SearchItemWriter, StorageError,
    SynchronizationMode, TransactionDefinition, TransactionManager, WriteRequest,
};
use serde_json::json;
use std::sync::Arc;

fn writer_for(client: &Arc<RecordingClient>) -> SearchItemWriter {
    SearchItemWriter::builder().client(client.clone()).build().unwrap()
}

fn mixed_chunk() -> Chunk<WriteRequest> {
    Chunk::from(vec![
        WriteRequest::index(IndexRequest::new("book", json!({"title": "Kindred"})).with_id("1")),
        WriteRequest::delete("2", "book"),
        WriteRequest::index(IndexRequest::new("book", json!({"title": "Dawn"})).with_id("3")),
    ])
}

#[test]
fn empty_chunk_makes_no_calls_in_any_transaction_state() {
    let client = Arc::new(RecordingClient::new());
    let writer = writer_for(&client);
    let manager = TransactionManager::new();
    let empty = Chunk::new();

    writer.write(&empty, None).unwrap();

    let mut tx = manager.begin(&TransactionDefinition::default());
    writer.write(&empty, Some(&mut tx)).unwrap();
    assert_eq!(tx.synchronization_count(), 0);
    manager.commit(&mut tx).unwrap();

    let mut read_only = manager.begin(&TransactionDefinition::default().read_only(true));
    writer.write(&empty, Some(&mut read_only)).unwrap();
    manager.commit(&mut read_only).unwrap();

    assert!(client.calls().is_empty());
}

#[test]
fn without_transaction_every_request_is_applied_in_order() {
    let client = Arc::new(RecordingClient::new());
    let writer = writer_for(&client);

    writer.write(&mixed_chunk(), None).unwrap();

    assert_eq!(
        client.write_calls(),
        vec![
            Call::Index {
                id: Some("1".to_string()),
                document_type: "book".to_string(),
                index: None,
                source: json!({"title": "Kindred"}),
            },
            Call::Delete {
                id: "2".to_string(),
                document_type: "book".to_string(),
            },
            Call::Index {
                id: Some("3".to_string()),
                document_type: "book".to_string(),
                index: None,
                source: json!({"title": "Dawn"}),
            },
        ]
    );
}

#[test]
fn committed_transaction_applies_only_at_commit() {
    let client = Arc::new(RecordingClient::new());
    let writer = writer_for(&client);
    let manager = TransactionManager::new();

    let mut tx = manager.begin(&TransactionDefinition::named("chunk-1"));
    writer.write(&mixed_chunk(), Some(&mut tx)).unwrap();
    assert!(client.calls().is_empty());

    manager.commit(&mut tx).unwrap();
    assert_eq!(client.write_calls().len(), 3);
    assert_eq!(client.store().len(), 2);
}

#[test]
fn rolled_back_transaction_makes_no_calls() {
    let client = Arc::new(RecordingClient::new());
    let writer = writer_for(&client);
    let manager = TransactionManager::new();

    let mut tx = manager.begin(&TransactionDefinition::default());
    writer.write(&mixed_chunk(), Some(&mut tx)).unwrap();
    manager.rollback(&mut tx).unwrap();

    assert!(client.calls().is_empty());
}

#[test]
fn rollback_only_commit_makes_no_calls() {
    let client = Arc::new(RecordingClient::new());
    let writer = writer_for(&client);
    let manager = TransactionManager::new();

    let mut tx = manager.begin(&TransactionDefinition::default());
    writer.write(&mixed_chunk(), Some(&mut tx)).unwrap();
    tx.set_rollback_only();
    manager.commit(&mut tx).unwrap();

    assert!(client.calls().is_empty());
}

#[test]
fn read_only_transaction_skips_without_error() {
    let client = Arc::new(RecordingClient::new());
    let writer = writer_for(&client);
    let manager = TransactionManager::new();

    let mut tx = manager.begin(&TransactionDefinition::default().read_only(true));
    writer.write(&mixed_chunk(), Some(&mut tx)).unwrap();
    assert_eq!(tx.synchronization_count(), 0);
    manager.commit(&mut tx).unwrap();

    assert!(client.calls().is_empty());
}

#[test]
fn empty_scope_and_disabled_synchronization_write_immediately() {
    let client = Arc::new(RecordingClient::new());
    let writer = writer_for(&client);

    let manager = TransactionManager::new();
    let mut scope = manager.begin(&TransactionDefinition::default().propagation(Propagation::Supports));
    writer.write(&mixed_chunk(), Some(&mut scope)).unwrap();
    assert_eq!(client.write_calls().len(), 3);
    manager.rollback(&mut scope).unwrap();

    let never = TransactionManager::with_synchronization(SynchronizationMode::Never);
    let mut tx = never.begin(&TransactionDefinition::default());
    writer.write(&mixed_chunk(), Some(&mut tx)).unwrap();
    assert_eq!(client.write_calls().len(), 6);
    never.rollback(&mut tx).unwrap();

    // nothing was deferred, so the rollbacks had nothing to discard
    assert_eq!(client.write_calls().len(), 6);
}

#[test]
fn separate_writes_in_one_transaction_fire_in_call_order() {
    let client = Arc::new(RecordingClient::new());
    let writer = writer_for(&client);
    let manager = TransactionManager::new();

    manager
        .execute(&TransactionDefinition::default(), |tx| {
            writer.write(&Chunk::from(vec![WriteRequest::delete("a", "book")]), Some(&mut *tx))?;
            writer.write(&Chunk::from(vec![WriteRequest::delete("b", "book")]), Some(&mut *tx))?;
            assert_eq!(tx.synchronization_count(), 2);
            Ok(())
        })
        .unwrap();

    let ids: Vec<String> = client
        .write_calls()
        .into_iter()
        .filter_map(|call| match call {
            Call::Delete { id, .. } => Some(id),
            _ => None,
        })
        .collect();
    assert_eq!(ids, vec!["a", "b"]);
}

#[test]
fn immediate_failure_keeps_earlier_requests_and_stops() {
    let client = Arc::new(RecordingClient::new().fail_at(1));
    let writer = writer_for(&client);

    let result = writer.write(&mixed_chunk(), None);

    assert!(matches!(result, Err(BatchError::Storage(StorageError::General(_)))));
    // first request applied, second attempted and rejected, third never sent
    assert_eq!(client.write_calls().len(), 2);
    assert_eq!(client.store().len(), 1);
}

#[test]
fn deferred_failure_aborts_the_commit() {
    let client = Arc::new(RecordingClient::new().fail_at(0));
    let writer = writer_for(&client);
    let manager = TransactionManager::new();

    let mut tx = manager.begin(&TransactionDefinition::default());
    writer.write(&mixed_chunk(), Some(&mut tx)).unwrap();
    let result = manager.commit(&mut tx);

    assert!(matches!(result, Err(BatchError::Storage(_))));
    assert!(tx.is_completed());
    assert_eq!(client.write_calls().len(), 1);
    assert!(manager.rollback(&mut tx).is_err());
}

#[test]
fn configured_index_is_passed_to_the_client() {
    let client = Arc::new(RecordingClient::new());
    let writer = SearchItemWriter::builder()
        .client(client.clone())
        .index("archive")
        .build()
        .unwrap();

    let chunk = Chunk::from(vec![WriteRequest::index(IndexRequest::new("book", json!({})))]);
    writer.write(&chunk, None).unwrap();

    match &client.write_calls()[0] {
        Call::Index { id, index, .. } => {
            assert_eq!(*id, None);
            assert_eq!(index.as_deref(), Some("archive"));
        }
        other => panic!("unexpected call {other:?}"),
    }
}
