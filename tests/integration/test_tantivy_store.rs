//! End-to-end runs against an on-disk tantivy index.

use crate::common::test_store_config;
use search_batch::{
    ChunkStep, DocumentId, DocumentOperations, DocumentType, ExecutionContext, IndexName,
    IndexRequest, ItemReader, Query, RefreshPolicy, SearchItemReader, SearchItemWriter,
    SearchOperations, TantivyClient, TransactionDefinition, TransactionManager, WriteRequest,
    request::Chunk,
};
use serde::Deserialize;
use serde_json::{Value, json};
use std::collections::BTreeSet;
use std::sync::Arc;
use tempfile::TempDir;

#[derive(Debug, Deserialize)]
struct Book {
    title: String,
}

fn book(id: &str, title: &str, genre: &str) -> WriteRequest {
    WriteRequest::index(IndexRequest::new("book", json!({"title": title, "genre": genre})).with_id(id))
}

fn read_titles(client: Arc<TantivyClient>, query: Query, page_size: usize) -> BTreeSet<String> {
    let mut reader = SearchItemReader::<Book>::builder()
        .client(client)
        .query(query)
        .target_type("book")
        .page_size(page_size)
        .build()
        .unwrap();

    let mut titles = BTreeSet::new();
    while let Some(book) = reader.read().unwrap() {
        assert!(titles.insert(book.title), "a document was read twice");
    }
    titles
}

#[test]
fn transactional_writes_become_searchable_on_commit() {
    let dir = TempDir::new().unwrap();
    let client = Arc::new(TantivyClient::open(dir.path().join("index"), &test_store_config()).unwrap());
    let writer = SearchItemWriter::builder().client(client.clone()).build().unwrap();
    let manager = TransactionManager::new();

    let mut tx = manager.begin(&TransactionDefinition::default());
    writer
        .write(
            &Chunk::from(vec![book("1", "Kindred", "fiction"), book("2", "Dawn", "sf")]),
            Some(&mut tx),
        )
        .unwrap();
    assert_eq!(client.document_count(), 0);

    manager.commit(&mut tx).unwrap();
    assert_eq!(client.document_count(), 2);

    let mut tx = manager.begin(&TransactionDefinition::default());
    writer
        .write(&Chunk::from(vec![WriteRequest::delete("1", "book")]), Some(&mut tx))
        .unwrap();
    manager.rollback(&mut tx).unwrap();
    assert_eq!(client.document_count(), 2);
}

#[test]
fn pages_through_every_match_exactly_once() {
    let dir = TempDir::new().unwrap();
    let client = Arc::new(TantivyClient::open(dir.path(), &test_store_config()).unwrap());
    let writer = SearchItemWriter::builder().client(client.clone()).build().unwrap();

    let chunk: Chunk<WriteRequest> = (0..17)
        .map(|i| book(&i.to_string(), &format!("Volume {i}"), if i % 2 == 0 { "even" } else { "odd" }))
        .collect();
    writer.write(&chunk, None).unwrap();

    let all = read_titles(client.clone(), Query::match_all(), 4);
    assert_eq!(all.len(), 17);

    let even = read_titles(client.clone(), Query::term("genre", "even"), 3);
    assert_eq!(even.len(), 9);

    let one = read_titles(client, Query::query_string("volume AND 12"), 3);
    assert_eq!(one, BTreeSet::from(["Volume 12".to_string()]));
}

#[test]
fn indexes_separate_documents_with_the_same_id() {
    let dir = TempDir::new().unwrap();
    let client = Arc::new(TantivyClient::open(dir.path(), &test_store_config()).unwrap());

    let request = IndexRequest::new("book", json!({"title": "Kindred"})).with_id("1");
    client.index(&request, None).unwrap();
    client.index(&request, Some(&IndexName::new("archive"))).unwrap();
    assert_eq!(client.document_count(), 2);

    let archived = client
        .search(&Query::match_all().with_index("archive"), &DocumentType::new("book"))
        .unwrap();
    assert_eq!(archived.total_hits, 1);
    assert_eq!(archived.hits[0].index.as_str(), "archive");

    // deletes are addressed by id and type, across indexes
    client
        .delete(&DocumentId::new("1"), &DocumentType::new("book"))
        .unwrap();
    assert_eq!(client.document_count(), 0);
}

#[test]
fn documents_survive_reopening_the_index() {
    let dir = TempDir::new().unwrap();
    {
        let client = TantivyClient::open(dir.path(), &test_store_config()).unwrap();
        client
            .index(&IndexRequest::new("book", json!({"title": "Dawn"})).with_id("2"), None)
            .unwrap();
    }

    let client = TantivyClient::open(dir.path(), &test_store_config()).unwrap();
    let hits = client
        .search(&Query::term("title", "Dawn"), &DocumentType::new("book"))
        .unwrap();
    assert_eq!(hits.total_hits, 1);
    assert_eq!(hits.hits[0].content, json!({"title": "Dawn"}));
}

#[test]
fn manual_refresh_hides_writes_from_a_running_copy() {
    let dir = TempDir::new().unwrap();
    let config = search_batch::config::StoreConfig {
        refresh: RefreshPolicy::Manual,
        ..test_store_config()
    };
    let client = Arc::new(TantivyClient::open(dir.path(), &config).unwrap());
    for i in 0..5 {
        client
            .index(&IndexRequest::new("book", json!({"title": format!("T{i}")})).with_id(i.to_string()), None)
            .unwrap();
    }
    client.refresh().unwrap();

    let mut reader = SearchItemReader::<Value>::builder()
        .client(client.clone())
        .query(Query::match_all().with_index("default"))
        .target_type("book")
        .page_size(2)
        .build()
        .unwrap();
    let mut writer = SearchItemWriter::builder()
        .client(client.clone())
        .index("copy")
        .build()
        .unwrap();

    let step = ChunkStep::new("copy", 2, Arc::new(TransactionManager::new())).unwrap();
    let execution = step
        .run(
            &mut reader,
            |value: Value| {
                let id = value["title"].as_str().unwrap_or_default().to_string();
                Ok(Some(WriteRequest::index(IndexRequest::new("book", value).with_id(id))))
            },
            &mut writer,
            &mut ExecutionContext::new(),
        )
        .unwrap();
    assert_eq!(execution.write_count, 5);

    client.refresh().unwrap();
    let copied = client
        .search(&Query::match_all().with_index("copy"), &DocumentType::new("book"))
        .unwrap();
    assert_eq!(copied.total_hits, 5);
}
