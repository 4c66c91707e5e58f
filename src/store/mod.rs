//! Remote document store abstraction.
//!
//! The purge runner only needs three operations from a store: list the
//! top-level collections, stream one collection's documents, and commit a
//! batch of deletes atomically. [`FirestoreClient`] implements them against
//! the Firestore REST API, [`MemoryStore`] in process.

pub mod batch;
pub mod firestore;
pub mod memory;

pub use batch::{MAX_BATCH_SIZE, WriteBatch};
pub use firestore::FirestoreClient;
pub use memory::{CallCounts, CommitRecord, MemoryStore};

use crate::core::{CollectionRef, DocumentRef, Result};
use async_trait::async_trait;
use futures::stream::BoxStream;
use std::sync::Arc;

/// Lazy, finite, single-pass sequence of collections
pub type CollectionStream<'a> = BoxStream<'a, Result<CollectionRef>>;

/// Lazy, finite, single-pass sequence of documents
pub type DocumentStream<'a> = BoxStream<'a, Result<DocumentRef>>;

#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Top-level collections as they exist while the stream is consumed
    fn list_collections(&self) -> CollectionStream<'_>;

    /// Documents of one collection
    fn stream_documents<'a>(&'a self, collection: &'a CollectionRef) -> DocumentStream<'a>;

    /// Apply every delete in the batch as one atomic write
    async fn commit(&self, batch: &WriteBatch) -> Result<()>;
}

#[async_trait]
impl<S: DocumentStore + ?Sized> DocumentStore for Arc<S> {
    fn list_collections(&self) -> CollectionStream<'_> {
        (**self).list_collections()
    }

    fn stream_documents<'a>(&'a self, collection: &'a CollectionRef) -> DocumentStream<'a> {
        (**self).stream_documents(collection)
    }

    async fn commit(&self, batch: &WriteBatch) -> Result<()> {
        (**self).commit(batch).await
    }
}
