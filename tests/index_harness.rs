#![allow(unused)]
//! Search index engine integration harness.
//!
//! # What this covers
//!
//! - **Round trips**: values with nested objects, arrays of objects and
//!   missing optionals come back from the index equal to what went in.
//! - **Visibility**: writes and deletes become searchable only after a
//!   refresh; the refresh scheduler eventually makes them visible on its own.
//! - **Snapshot isolation**: a result stream keeps reading the snapshot it
//!   started on, and releases it when dropped.
//! - **Bulk reindexing**: keys with a value are upserted, keys without one
//!   are deleted, and `wait_for_bulk` resolves once the queue is drained.
//! - **Persistence**: committed documents survive close and reopen, and an
//!   index dropped without `close` still makes its final commit.
//! - **Reads**: sorting, limits and pre-limit totals, `get_many` ordering,
//!   engine checks on queries.
//! - **Shutdown**: `close` is idempotent and later calls fail with `Closed`.
//!
//! # What this does NOT cover
//!
//! - Criterion-by-criterion agreement (see `node_criteria_harness`)
//! - Crash recovery of a half-written commit file
//!
//! # Running
//!
//! ```sh
//! cargo test --test index_harness
//! ```

mod common;
use common::*;
use pretty_assertions::assert_eq;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use termed::document::{ALL_FIELD, KEY_FIELD};
use termed::nodes::{index_nodes, open_node_index};
use termed::{
    Engine, IndexError, IndexQuery, JsonDocumentMapper, Node, NodeCriterion, NodeId, NodeSpecification, Query,
    SearchIndex, SortField, Specification, ValueProvider, COMMIT_FILE,
};

// ---------------------------------------------------------------------------
// Round trips
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct Record {
    name: String,
    #[serde(default)]
    tags: Vec<String>,
    #[serde(default)]
    parts: Vec<Part>,
    owner: Option<Owner>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct Part {
    label: String,
    #[serde(default)]
    notes: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct Owner {
    name: String,
    email: Option<String>,
}

#[tokio::test]
async fn structured_values_round_trip() {
    let index: SearchIndex<String, Record> =
        SearchIndex::open(&quiet_config(None), JsonDocumentMapper::new()).unwrap();

    let full = Record {
        name: "full".into(),
        tags: vec!["red".into(), "big".into()],
        parts: vec![
            Part { label: "lid".into(), notes: vec!["loose".into(), "red paint".into()] },
            Part { label: "base".into(), notes: vec![] },
        ],
        owner: Some(Owner { name: "Ann Example".into(), email: None }),
    };
    let bare = Record { name: "bare".into(), tags: vec![], parts: vec![], owner: None };

    index.index(&"k1".to_string(), &full).unwrap();
    index.index(&"k2".to_string(), &bare).unwrap();
    index.refresh_blocking().unwrap();

    assert_eq!(index.get(&"k1".to_string()).unwrap(), Some(full.clone()));
    assert_eq!(index.get(&"k2".to_string()).unwrap(), Some(bare));
    assert_eq!(index.get(&"missing".to_string()).unwrap(), None);

    // Array elements index under their position-free field name.
    let hits: Vec<String> = index
        .keys(&IndexQuery::term("parts.notes", "loose"), &[], None)
        .unwrap()
        .collect::<Result<_, _>>()
        .unwrap();
    assert_eq!(hits, ["k1"]);
    assert_eq!(index.count(&IndexQuery::text(ALL_FIELD, "RED paint")).unwrap(), 1);

    index.close().await.unwrap();
}

#[tokio::test]
async fn nodes_round_trip_with_every_field() {
    let node = NodeBuilder::concept(42)
        .code("c42")
        .uri("http://example.org/c42")
        .label("en", "Answer")
        .label("fi", "Vastaus")
        .property("note", "", "language-less")
        .broader(1)
        .reference("related", concept_id(2))
        .modified(at(2024, 2, 29))
        .build();
    let index = index_with(std::slice::from_ref(&node));

    assert_eq!(index.get(&node.node_id()).unwrap(), Some(node));
    index.close().await.unwrap();
}

// ---------------------------------------------------------------------------
// Visibility
// ---------------------------------------------------------------------------

#[tokio::test]
async fn writes_and_deletes_are_visible_after_refresh() {
    let index = memory_index();
    let cat = NodeBuilder::concept(4).code("cat").build();
    let id = cat.node_id();

    index.index(&id, &cat).unwrap();
    assert!(index.is_empty().unwrap());
    index.refresh_blocking().unwrap();
    assert_eq!(index.len().unwrap(), 1);

    index.delete(&id).unwrap();
    assert_eq!(index.get(&id).unwrap(), Some(cat));
    index.refresh_blocking().unwrap();
    assert_eq!(index.get(&id).unwrap(), None);

    // Deleting an absent key is not an error.
    index.delete(&id).unwrap();
    index.close().await.unwrap();
}

#[tokio::test]
async fn reindexing_a_key_replaces_its_document() {
    let index = memory_index();
    let id = concept_id(1);
    index.index(&id, &NodeBuilder::concept(1).code("old").build()).unwrap();
    index.index(&id, &NodeBuilder::concept(1).code("new").build()).unwrap();
    index.refresh_blocking().unwrap();

    assert_eq!(index.len().unwrap(), 1);
    assert_eq!(index.count(&IndexQuery::term("code", "old")).unwrap(), 0);
    assert_eq!(index.count(&IndexQuery::term("code", "new")).unwrap(), 1);
    index.close().await.unwrap();
}

#[tokio::test]
async fn scheduled_refresh_publishes_writes() {
    let mut config = quiet_config(None);
    config.refresh_interval_ms = 20;
    let index = open_node_index(&config).unwrap();
    let cat = NodeBuilder::concept(4).build();
    index.index(&cat.node_id(), &cat).unwrap();

    let mut visible = false;
    for _ in 0..200 {
        if index.len().unwrap() == 1 {
            visible = true;
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    assert!(visible, "refresh scheduler never published the write");
    index.close().await.unwrap();
}

// ---------------------------------------------------------------------------
// Snapshot isolation
// ---------------------------------------------------------------------------

#[tokio::test]
async fn result_stream_keeps_its_snapshot_until_dropped() {
    let index = index_with(&animal_corpus());
    assert_eq!(index.active_readers(), 0);

    let hits = index.search(&IndexQuery::All, &[], None).unwrap();
    let generation = hits.generation();
    assert_eq!(index.active_readers(), 1);

    let newcomer = NodeBuilder::concept(99).code("newcomer").build();
    index.index(&newcomer.node_id(), &newcomer).unwrap();
    index.refresh_blocking().unwrap();
    assert!(index.visible_generation() > generation);

    assert_eq!(hits.total(), 7);
    assert_eq!(hits.count(), 7);
    assert_eq!(index.active_readers(), 0);
    assert_eq!(index.len().unwrap(), 8);

    index.close().await.unwrap();
}

#[tokio::test]
async fn partially_consumed_stream_releases_on_drop() {
    let index = index_with(&animal_corpus());
    let mut hits = index.search(&IndexQuery::All, &[], None).unwrap();
    assert!(hits.next().is_some());
    assert_eq!(index.active_readers(), 1);
    drop(hits);
    assert_eq!(index.active_readers(), 0);
    index.close().await.unwrap();
}

// ---------------------------------------------------------------------------
// Bulk reindexing
// ---------------------------------------------------------------------------

#[tokio::test]
async fn bulk_job_upserts_present_and_deletes_absent_keys() {
    let index = index_with(&animal_corpus());

    // Keys 1..=6: odd ids get a fresh value, even ids have disappeared.
    let keys: Vec<NodeId> = (1..=6).map(concept_id).collect();
    let provider: ValueProvider<NodeId, Node> = Arc::new(|id: &NodeId| {
        (id.id.as_u128() % 2 == 1).then(|| NodeBuilder::concept(id.id.as_u128()).code("reindexed").build())
    });

    let job = index.index_all(keys, provider).await.unwrap();
    index.wait_for_bulk().await;
    index.refresh_blocking().unwrap();

    let stats = index.bulk_stats();
    assert_eq!((stats.jobs_submitted, stats.jobs_completed, stats.items_indexed), (1, 1, 6));
    assert_eq!(stats.pending(), 0);
    assert_eq!(job, 1);

    let mut remaining: Vec<u128> = index
        .keys(&IndexQuery::All, &[], None)
        .unwrap()
        .map(|k| k.unwrap().id.as_u128())
        .collect();
    remaining.sort();
    assert_eq!(remaining, [1, 3, 5, 7]);
    assert_eq!(index.count(&IndexQuery::term("code", "reindexed")).unwrap(), 3);

    index.close().await.unwrap();
}

#[tokio::test]
async fn bulk_jobs_run_in_submission_order() {
    let index = memory_index();
    let id = concept_id(1);

    for code in ["first", "second", "third"] {
        let provider: ValueProvider<NodeId, Node> =
            Arc::new(move |id: &NodeId| Some(NodeBuilder::concept(id.id.as_u128()).code(code).build()));
        index.index_all(vec![id.clone()], provider).await.unwrap();
    }
    index.wait_for_bulk().await;
    index.refresh_blocking().unwrap();

    assert_eq!(index.get(&id).unwrap().and_then(|n| n.code).as_deref(), Some("third"));
    assert_eq!(index.bulk_stats().jobs_completed, 3);
    index.close().await.unwrap();
}

#[tokio::test]
async fn index_nodes_helper_indexes_a_corpus() {
    let index = memory_index();
    index_nodes(&index, animal_corpus()).await.unwrap();
    index.wait_for_bulk().await;
    index.refresh_blocking().unwrap();
    assert_eq!(index.len().unwrap(), 7);
    index.close().await.unwrap();
}

// ---------------------------------------------------------------------------
// Persistence
// ---------------------------------------------------------------------------

#[tokio::test]
async fn committed_documents_survive_reopen() {
    let dir = tempfile::tempdir().unwrap();
    let config = quiet_config(Some(dir.path()));

    let index = open_node_index(&config).unwrap();
    for node in animal_corpus() {
        index.index(&node.node_id(), &node).unwrap();
    }
    index.close().await.unwrap();
    assert!(dir.path().join(COMMIT_FILE).exists());

    let reopened = open_node_index(&config).unwrap();
    assert_eq!(reopened.len().unwrap(), 7);
    assert_eq!(reopened.get(&concept_id(4)).unwrap().and_then(|n| n.code).as_deref(), Some("cat"));
    reopened.close().await.unwrap();
}

#[tokio::test]
async fn explicit_commit_persists_without_close() {
    let dir = tempfile::tempdir().unwrap();
    let config = quiet_config(Some(dir.path()));
    let index = open_node_index(&config).unwrap();

    assert!(!dir.path().join(COMMIT_FILE).exists());
    let cat = NodeBuilder::concept(4).build();
    index.index(&cat.node_id(), &cat).unwrap();
    index.commit().unwrap();
    assert!(dir.path().join(COMMIT_FILE).exists());

    index.close().await.unwrap();
}

#[tokio::test]
async fn dropping_without_close_keeps_writes() {
    let dir = tempfile::tempdir().unwrap();
    let config = quiet_config(Some(dir.path()));

    let index = open_node_index(&config).unwrap();
    let cat = NodeBuilder::concept(4).code("cat").build();
    index.index(&cat.node_id(), &cat).unwrap();
    drop(index);

    let reopened = open_node_index(&config).unwrap();
    assert_eq!(reopened.len().unwrap(), 1);
    assert_eq!(reopened.get(&concept_id(4)).unwrap().and_then(|n| n.code).as_deref(), Some("cat"));
    reopened.close().await.unwrap();
}

// ---------------------------------------------------------------------------
// Reads
// ---------------------------------------------------------------------------

#[tokio::test]
async fn sorting_and_limits() {
    let index = index_with(&animal_corpus());
    let concepts = Specification::leaf(NodeCriterion::Type(concept_type())).to_index_query().unwrap();

    let hits = index.search(&concepts, &[SortField::asc("code")], Some(3)).unwrap();
    assert_eq!(hits.total(), 6);
    assert_codes!(hits, ["animal", "bird", "cat"]);

    let hits = index.search(&concepts, &[SortField::desc("code")], Some(2)).unwrap();
    assert_codes!(hits, ["orphan", "mammal"]);

    // Nodes without a modification date sort last either way.
    let hits = index.search(&concepts, &[SortField::desc("lastModifiedDate")], None).unwrap();
    assert_codes!(hits, ["cat", "bird", "mammal", "animal", "dog", "orphan"]);

    index.close().await.unwrap();
}

#[tokio::test]
async fn text_search_ranks_rarer_matches_first() {
    let index = index_with(&animal_corpus());
    let query = IndexQuery::should(vec![IndexQuery::text(ALL_FIELD, "house"), IndexQuery::text(ALL_FIELD, "cat")]);
    let hits = index.search(&query, &[], None).unwrap();
    assert_eq!(hits.total(), 2);
    assert_codes!(hits, ["cat", "<none>"]);
    index.close().await.unwrap();
}

#[tokio::test]
async fn get_many_keeps_input_order_and_skips_missing() {
    let index = index_with(&animal_corpus());
    let keys = [concept_id(5), concept_id(404), concept_id(1), concept_id(3)];
    let codes: Vec<String> = index.get_many(&keys).unwrap().into_iter().filter_map(|n| n.code).collect();
    assert_eq!(codes, ["dog", "animal", "bird"]);
    assert!(index.get_many(&[]).unwrap().is_empty());
    index.close().await.unwrap();
}

#[tokio::test]
async fn queries_check_their_engine() {
    let index = index_with(&animal_corpus());
    let spec: NodeSpecification = NodeCriterion::Code("cat".into()).into();

    let hits = index.query(&Query::new(spec.clone(), Engine::Index).limit(1)).unwrap();
    assert_codes!(hits, ["cat"]);

    let err = index.query(&Query::new(spec, Engine::RowStore)).unwrap_err();
    assert!(matches!(err, IndexError::WrongEngine(Engine::RowStore)), "{err}");
    index.close().await.unwrap();
}

#[tokio::test]
async fn key_field_is_the_encoded_key() {
    let index = index_with(&animal_corpus());
    let id = concept_id(2);
    assert_eq!(index.count(&IndexQuery::term(KEY_FIELD, id.to_string())).unwrap(), 1);
    index.close().await.unwrap();
}

// ---------------------------------------------------------------------------
// Shutdown
// ---------------------------------------------------------------------------

#[tokio::test]
async fn closed_index_rejects_further_work() {
    let index = index_with(&animal_corpus());
    index.close().await.unwrap();
    index.close().await.unwrap();

    assert!(matches!(index.search(&IndexQuery::All, &[], None), Err(IndexError::Closed)));
    assert!(matches!(index.get(&concept_id(1)), Err(IndexError::Closed)));
    assert!(matches!(index.refresh_blocking(), Err(IndexError::Closed)));
    let cat = NodeBuilder::concept(4).build();
    assert!(matches!(index.index(&cat.node_id(), &cat), Err(IndexError::Closed)));

    let provider: ValueProvider<NodeId, Node> = Arc::new(|_: &NodeId| None);
    assert!(matches!(index.index_all(vec![concept_id(1)], provider).await, Err(IndexError::Closed)));
}

#[test]
fn opening_outside_a_runtime_fails() {
    assert!(matches!(open_node_index(&quiet_config(None)), Err(IndexError::NoRuntime)));
}
