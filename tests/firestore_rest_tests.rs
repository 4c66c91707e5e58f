/// Firestore REST client tests
///
/// Runs the real client against a local fake of the Firestore v1 endpoints
/// (listCollectionIds, document listing, commit).
/// Run with: cargo test --test firestore_rest_tests
mod common;

use axum::Router;
use axum::body::Bytes;
use axum::extract::{Path, Query, State};
use axum::http::{HeaderMap, Method, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::any;
use common::Recorder;
use firestore_clear::facade::{Outcome, clear_database, conclude};
use firestore_clear::{
    CollectionRef, DocumentRef, DocumentStore, FirestoreClient, ProgressListener, PurgeError,
    PurgeRunner, StoreConfig, WriteBatch,
};
use futures::TryStreamExt;
use serde_json::{Value, json};
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::ops::Bound;
use std::sync::{Arc, Mutex};

// ============================================================================
// Fake Firestore
// ============================================================================

#[derive(Default)]
struct FakeFirestore {
    collections: Mutex<BTreeMap<String, BTreeSet<String>>>,
    commits: Mutex<Vec<Vec<String>>>,
    authorization: Mutex<Vec<String>>,
    list_collection_calls: Mutex<usize>,
    document_queries: Mutex<Vec<HashMap<String, String>>>,
    fail_list: Mutex<Option<(StatusCode, Value)>>,
    fail_commit: Mutex<Option<(StatusCode, Value)>>,
}

impl FakeFirestore {
    fn with_collection(self, name: &str, count: usize) -> Self {
        {
            let mut collections = self.collections.lock().unwrap();
            let docs = collections.entry(name.to_string()).or_default();
            for i in 0..count {
                docs.insert(format!("d{:04}", i));
            }
        }
        self
    }

    fn remaining(&self, name: &str) -> usize {
        self.collections
            .lock()
            .unwrap()
            .get(name)
            .map_or(0, BTreeSet::len)
    }

    fn commit_sizes(&self) -> Vec<usize> {
        self.commits.lock().unwrap().iter().map(Vec::len).collect()
    }
}

fn error_body(code: u16, status: &str, message: &str) -> Value {
    json!({ "error": { "code": code, "message": message, "status": status } })
}

/// Items strictly after `token`, at most `page_size` of them, plus the next token
fn page(items: &BTreeSet<String>, token: Option<&str>, page_size: usize) -> (Vec<String>, Option<String>) {
    let lower = match token {
        Some(t) => Bound::Excluded(t),
        None => Bound::Unbounded,
    };
    let mut rest = items.range::<str, _>((lower, Bound::Unbounded));
    let taken: Vec<String> = rest.by_ref().take(page_size).cloned().collect();
    let next = if rest.next().is_some() {
        taken.last().cloned()
    } else {
        None
    };
    (taken, next)
}

async fn handle(
    State(fake): State<Arc<FakeFirestore>>,
    method: Method,
    Path(path): Path<String>,
    Query(query): Query<HashMap<String, String>>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    if let Some(value) = headers.get("authorization").and_then(|v| v.to_str().ok()) {
        fake.authorization.lock().unwrap().push(value.to_string());
    }

    let Some(split) = path.find("/documents") else {
        return (StatusCode::NOT_FOUND, "unknown path").into_response();
    };
    let root = &path[..split + "/documents".len()];
    let rest = &path[split + "/documents".len()..];

    match (method, rest) {
        (Method::POST, ":listCollectionIds") => {
            *fake.list_collection_calls.lock().unwrap() += 1;
            if let Some((status, body)) = fake.fail_list.lock().unwrap().clone() {
                return (status, axum::Json(body)).into_response();
            }

            let request: Value = serde_json::from_slice(&body).unwrap_or(Value::Null);
            let page_size = request["pageSize"].as_u64().unwrap_or(100) as usize;
            let token = request["pageToken"].as_str();

            let names: BTreeSet<String> = fake.collections.lock().unwrap().keys().cloned().collect();
            let (ids, next) = page(&names, token, page_size);

            let mut response = json!({ "collectionIds": ids });
            if let Some(next) = next {
                response["nextPageToken"] = json!(next);
            }
            axum::Json(response).into_response()
        }
        (Method::POST, ":commit") => {
            if let Some((status, body)) = fake.fail_commit.lock().unwrap().clone() {
                return (status, axum::Json(body)).into_response();
            }

            let request: Value = serde_json::from_slice(&body).unwrap_or(Value::Null);
            let names: Vec<String> = request["writes"]
                .as_array()
                .map(|writes| {
                    writes
                        .iter()
                        .filter_map(|w| w["delete"].as_str().map(str::to_string))
                        .collect()
                })
                .unwrap_or_default();

            {
                let mut collections = fake.collections.lock().unwrap();
                for name in &names {
                    let mut segments = name.rsplit('/');
                    let (Some(id), Some(collection)) = (segments.next(), segments.next()) else {
                        continue;
                    };
                    if let Some(docs) = collections.get_mut(collection) {
                        docs.remove(id);
                    }
                }
            }

            let results: Vec<Value> = names.iter().map(|_| json!({})).collect();
            fake.commits.lock().unwrap().push(names);
            axum::Json(json!({ "writeResults": results, "commitTime": "2026-10-19T00:00:00Z" }))
                .into_response()
        }
        (Method::GET, collection_path) => {
            let collection = collection_path.trim_start_matches('/');
            fake.document_queries.lock().unwrap().push(query.clone());

            let page_size = query
                .get("pageSize")
                .and_then(|s| s.parse().ok())
                .unwrap_or(100);
            let docs = fake
                .collections
                .lock()
                .unwrap()
                .get(collection)
                .cloned()
                .unwrap_or_default();
            let (ids, next) = page(&docs, query.get("pageToken").map(String::as_str), page_size);

            let documents: Vec<Value> = ids
                .iter()
                .map(|id| json!({ "name": format!("{}/{}/{}", root, collection, id) }))
                .collect();
            let mut response = json!({ "documents": documents });
            if let Some(next) = next {
                response["nextPageToken"] = json!(next);
            }
            axum::Json(response).into_response()
        }
        _ => (StatusCode::NOT_FOUND, "unknown route").into_response(),
    }
}

async fn serve(fake: Arc<FakeFirestore>) -> String {
    // the wildcard capture arrives percent-decoded
    let app = Router::new().route("/v1/*path", any(handle)).with_state(fake);
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    addr.to_string()
}

async fn connect(fake: &Arc<FakeFirestore>, page_size: u32) -> FirestoreClient {
    let host = serve(Arc::clone(fake)).await;
    let config = StoreConfig::new("demo").emulator_host(&host).page_size(page_size);
    FirestoreClient::connect(config).await.unwrap()
}

// ============================================================================
// Tests
// ============================================================================

#[tokio::test]
async fn test_list_collections_follows_page_tokens() {
    let fake = Arc::new(
        FakeFirestore::default()
            .with_collection("a", 1)
            .with_collection("b", 1)
            .with_collection("c", 1)
            .with_collection("d", 1)
            .with_collection("e", 1),
    );
    let client = connect(&fake, 2).await;

    let names: Vec<String> = client
        .list_collections()
        .map_ok(|c| c.id().to_string())
        .try_collect()
        .await
        .unwrap();

    assert_eq!(names, vec!["a", "b", "c", "d", "e"]);
    assert_eq!(*fake.list_collection_calls.lock().unwrap(), 3);
}

#[tokio::test]
async fn test_stream_documents_pages_with_name_mask() {
    let fake = Arc::new(FakeFirestore::default().with_collection("users", 7));
    let client = connect(&fake, 3).await;
    let users = CollectionRef::new("users");

    let docs: Vec<DocumentRef> = client.stream_documents(&users).try_collect().await.unwrap();

    assert_eq!(docs.len(), 7);
    assert_eq!(
        docs[0].name(),
        "projects/demo/databases/(default)/documents/users/d0000"
    );
    assert_eq!(docs[6].id(), "d0006");

    let queries = fake.document_queries.lock().unwrap().clone();
    assert_eq!(queries.len(), 3);
    assert!(queries.iter().all(|q| q.get("mask.fieldPaths").map(String::as_str) == Some("__name__")));
    assert!(queries.iter().all(|q| q.get("pageSize").map(String::as_str) == Some("3")));
    assert!(!queries[0].contains_key("pageToken"));
    assert_eq!(queries[1].get("pageToken").map(String::as_str), Some("d0002"));
}

#[tokio::test]
async fn test_commit_sends_delete_writes() {
    let fake = Arc::new(FakeFirestore::default().with_collection("users", 3));
    let client = connect(&fake, 50).await;
    let users = CollectionRef::new("users");

    let mut batch = WriteBatch::new(&users);
    for doc in client
        .stream_documents(&users)
        .try_collect::<Vec<_>>()
        .await
        .unwrap()
    {
        batch.delete(doc);
    }
    client.commit(&batch).await.unwrap();

    assert_eq!(fake.remaining("users"), 0);
    let commits = fake.commits.lock().unwrap().clone();
    assert_eq!(commits.len(), 1);
    assert_eq!(
        commits[0][2],
        "projects/demo/databases/(default)/documents/users/d0002"
    );
}

#[tokio::test]
async fn test_collection_ids_with_reserved_characters() {
    let fake = Arc::new(
        FakeFirestore::default()
            .with_collection("orders", 4)
            .with_collection("orders?2024#q1", 3)
            .with_collection("50% off", 2),
    );
    let client = connect(&fake, 300).await;

    let odd = CollectionRef::new("orders?2024#q1");
    let docs: Vec<DocumentRef> = client.stream_documents(&odd).try_collect().await.unwrap();
    assert_eq!(docs.len(), 3);
    assert!(docs.iter().all(|d| d.name().contains("/orders?2024#q1/")));

    let summary = PurgeRunner::new(client, Arc::new(firestore_clear::SilentListener))
        .run()
        .await
        .unwrap();

    assert_eq!(summary.total_deleted(), 9);
    assert_eq!(summary.collection("orders?2024#q1").unwrap().deleted, 3);
    assert_eq!(summary.collection("orders").unwrap().deleted, 4);
    assert_eq!(summary.collection("50% off").unwrap().deleted, 2);
    assert_eq!(fake.remaining("orders?2024#q1"), 0);
    assert_eq!(fake.remaining("orders"), 0);
    assert_eq!(fake.remaining("50% off"), 0);
}

#[tokio::test]
async fn test_emulator_uses_owner_token() {
    let fake = Arc::new(FakeFirestore::default().with_collection("users", 1));
    let client = connect(&fake, 10).await;

    let _: Vec<CollectionRef> = client.list_collections().try_collect().await.unwrap();

    let headers = fake.authorization.lock().unwrap().clone();
    assert!(!headers.is_empty());
    assert!(headers.iter().all(|h| h == "Bearer owner"));
}

#[tokio::test]
async fn test_runner_over_rest_client() {
    let fake = Arc::new(
        FakeFirestore::default()
            .with_collection("users", 150)
            .with_collection("logs", 0),
    );
    // pages smaller than a batch: deletes land between page fetches
    let client = connect(&fake, 40).await;
    let recorder = Arc::new(Recorder::new());

    let summary = PurgeRunner::new(client, recorder.clone()).run().await.unwrap();

    assert_eq!(summary.total_deleted(), 150);
    assert_eq!(fake.commit_sizes(), vec![100, 50]);
    assert_eq!(fake.remaining("users"), 0);
    assert_eq!(
        recorder.collection_reports(),
        vec![("logs".to_string(), 0), ("users".to_string(), 150)]
    );
}

#[tokio::test]
async fn test_permission_denied_is_enumeration_error() {
    let fake = Arc::new(FakeFirestore::default().with_collection("users", 1));
    *fake.fail_list.lock().unwrap() = Some((
        StatusCode::FORBIDDEN,
        error_body(403, "PERMISSION_DENIED", "Missing or insufficient permissions."),
    ));
    let client = connect(&fake, 10).await;

    let err = client
        .list_collections()
        .try_collect::<Vec<_>>()
        .await
        .unwrap_err();

    match err {
        PurgeError::EnumerationError(message) => {
            assert!(message.contains("PERMISSION_DENIED"));
            assert!(message.contains("insufficient permissions"));
        }
        other => panic!("unexpected error {:?}", other),
    }
}

#[tokio::test]
async fn test_unauthenticated_is_authentication_error() {
    let fake = Arc::new(FakeFirestore::default());
    *fake.fail_list.lock().unwrap() = Some((
        StatusCode::UNAUTHORIZED,
        error_body(401, "UNAUTHENTICATED", "Request had invalid authentication credentials."),
    ));
    let client = connect(&fake, 10).await;

    let err = client
        .list_collections()
        .try_collect::<Vec<_>>()
        .await
        .unwrap_err();

    assert!(err.is_authentication());
}

#[tokio::test]
async fn test_aborted_commit_is_batch_commit_error() {
    let fake = Arc::new(FakeFirestore::default().with_collection("orders", 120));
    *fake.fail_commit.lock().unwrap() = Some((
        StatusCode::CONFLICT,
        error_body(409, "ABORTED", "Too much contention on these documents."),
    ));
    let client = connect(&fake, 500).await;

    let err = PurgeRunner::new(client, Arc::new(firestore_clear::SilentListener))
        .run()
        .await
        .unwrap_err();

    assert!(matches!(err, PurgeError::BatchCommitError(ref c, ref m) if c == "orders" && m.contains("ABORTED")));
    assert_eq!(fake.remaining("orders"), 120);
}

#[tokio::test]
async fn test_clear_database_end_to_end() {
    let fake = Arc::new(
        FakeFirestore::default()
            .with_collection("accounts", 230)
            .with_collection("transactions", 99),
    );
    let host = serve(Arc::clone(&fake)).await;
    let recorder = Arc::new(Recorder::new());
    let listener: Arc<dyn ProgressListener> = recorder.clone();

    let config = StoreConfig::new("juno-financial-assistant").emulator_host(&host);
    let result = clear_database(config, Arc::clone(&listener)).await;
    let outcome = conclude(result, listener.as_ref());

    assert_eq!(outcome, Outcome::Success { total: 329 });
    assert_eq!(fake.commit_sizes(), vec![100, 100, 30, 99]);
    assert_eq!(recorder.batch_sizes("accounts"), vec![100, 100, 30]);
    assert_eq!(recorder.batch_sizes("transactions"), vec![99]);
}
