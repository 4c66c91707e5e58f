use super::{CollectionStream, DocumentStore, DocumentStream, WriteBatch};
use crate::core::{CollectionRef, DocumentRef, PurgeError, Result};
use async_trait::async_trait;
use futures::stream::{self, StreamExt};
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

const MEMORY_ROOT: &str = "projects/memory/databases/(default)/documents";

/// Number of times each store operation was invoked
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct CallCounts {
    pub list_collections: usize,
    pub stream_documents: usize,
    pub commits: usize,
}

/// One successful commit, in the order it was applied
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommitRecord {
    pub collection: String,
    pub documents: Vec<DocumentRef>,
}

impl CommitRecord {
    pub fn len(&self) -> usize {
        self.documents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.documents.is_empty()
    }
}

#[derive(Debug, Default)]
struct FailurePlan {
    enumeration: Option<String>,
    /// collection -> (documents yielded before failing, message)
    streaming: HashMap<String, (usize, String)>,
    commit: HashMap<String, String>,
}

/// In-process document store.
///
/// Collections behave like Firestore's: a commit that removes the last
/// document of a collection makes the collection disappear from listings.
/// Collections seeded empty stay listed until something else removes them.
/// Every operation is counted and can be made to fail.
#[derive(Debug, Default)]
pub struct MemoryStore {
    collections: Mutex<BTreeMap<String, BTreeSet<String>>>,
    commits: Mutex<Vec<CommitRecord>>,
    failures: Mutex<FailurePlan>,
    list_calls: AtomicUsize,
    stream_calls: AtomicUsize,
    commit_calls: AtomicUsize,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a collection with `count` generated documents
    pub fn with_collection(self, collection: &str, count: usize) -> Self {
        self.insert_many(collection, count);
        self
    }

    /// Add one document, creating the collection if needed
    pub fn insert(&self, collection: &str, document_id: &str) {
        let mut collections = self.collections.lock().unwrap_or_else(|e| e.into_inner());
        collections
            .entry(collection.to_string())
            .or_default()
            .insert(document_id.to_string());
    }

    /// Add `count` documents named `doc-00000`, `doc-00001`, ...,
    /// skipping names already present.
    ///
    /// A count of zero still registers the collection.
    pub fn insert_many(&self, collection: &str, count: usize) {
        let mut collections = self.collections.lock().unwrap_or_else(|e| e.into_inner());
        let documents = collections.entry(collection.to_string()).or_default();
        let target = documents.len() + count;
        let mut next = 0;
        while documents.len() < target {
            documents.insert(format!("doc-{:05}", next));
            next += 1;
        }
    }

    pub fn document_count(&self, collection: &str) -> usize {
        let collections = self.collections.lock().unwrap_or_else(|e| e.into_inner());
        collections.get(collection).map_or(0, BTreeSet::len)
    }

    pub fn total_documents(&self) -> usize {
        let collections = self.collections.lock().unwrap_or_else(|e| e.into_inner());
        collections.values().map(BTreeSet::len).sum()
    }

    pub fn collection_names(&self) -> Vec<String> {
        let collections = self.collections.lock().unwrap_or_else(|e| e.into_inner());
        collections.keys().cloned().collect()
    }

    /// Commits applied so far
    pub fn commits(&self) -> Vec<CommitRecord> {
        self.commits.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    pub fn calls(&self) -> CallCounts {
        CallCounts {
            list_collections: self.list_calls.load(Ordering::SeqCst),
            stream_documents: self.stream_calls.load(Ordering::SeqCst),
            commits: self.commit_calls.load(Ordering::SeqCst),
        }
    }

    /// Make collection listing fail
    pub fn fail_enumeration(&self, message: &str) {
        self.plan().enumeration = Some(message.to_string());
    }

    /// Make streaming `collection` fail after `after` documents were yielded
    pub fn fail_streaming(&self, collection: &str, after: usize, message: &str) {
        self.plan()
            .streaming
            .insert(collection.to_string(), (after, message.to_string()));
    }

    /// Make every commit for `collection` fail
    pub fn fail_commit(&self, collection: &str, message: &str) {
        self.plan()
            .commit
            .insert(collection.to_string(), message.to_string());
    }

    fn plan(&self) -> std::sync::MutexGuard<'_, FailurePlan> {
        self.failures.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn resource_name(collection: &str, document_id: &str) -> String {
        format!("{}/{}/{}", MEMORY_ROOT, collection, document_id)
    }
}

#[async_trait]
impl DocumentStore for MemoryStore {
    fn list_collections(&self) -> CollectionStream<'_> {
        self.list_calls.fetch_add(1, Ordering::SeqCst);

        if let Some(message) = self.plan().enumeration.clone() {
            return stream::iter(vec![Err(PurgeError::EnumerationError(message))]).boxed();
        }

        let names = self.collection_names();
        stream::iter(names.into_iter().map(|name| Ok(CollectionRef::new(name)))).boxed()
    }

    fn stream_documents<'a>(&'a self, collection: &'a CollectionRef) -> DocumentStream<'a> {
        self.stream_calls.fetch_add(1, Ordering::SeqCst);

        let ids: Vec<String> = {
            let collections = self.collections.lock().unwrap_or_else(|e| e.into_inner());
            collections
                .get(collection.id())
                .map(|docs| docs.iter().cloned().collect())
                .unwrap_or_default()
        };

        let mut items: Vec<Result<DocumentRef>> = ids
            .iter()
            .map(|id| Ok(DocumentRef::new(Self::resource_name(collection.id(), id))))
            .collect();

        if let Some((after, message)) = self.plan().streaming.get(collection.id()).cloned() {
            items.truncate(after);
            items.push(Err(PurgeError::StreamingError(
                collection.id().to_string(),
                message,
            )));
        }

        stream::iter(items).boxed()
    }

    async fn commit(&self, batch: &WriteBatch) -> Result<()> {
        self.commit_calls.fetch_add(1, Ordering::SeqCst);

        if let Some(message) = self.plan().commit.get(batch.collection()).cloned() {
            return Err(PurgeError::BatchCommitError(
                batch.collection().to_string(),
                message,
            ));
        }

        {
            let mut collections = self.collections.lock().unwrap_or_else(|e| e.into_inner());
            if let Some(documents) = collections.get_mut(batch.collection()) {
                for doc in batch.documents() {
                    documents.remove(doc.id());
                }
                if documents.is_empty() {
                    collections.remove(batch.collection());
                }
            }
        }

        self.commits
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(CommitRecord {
                collection: batch.collection().to_string(),
                documents: batch.documents().to_vec(),
            });

        Ok(())
    }
}
