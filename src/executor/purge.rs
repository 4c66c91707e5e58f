use super::progress::{ProgressListener, PurgeEvent};
use crate::core::{CollectionRef, Result};
use crate::result::{CollectionSummary, PurgeSummary};
use crate::store::{DocumentStore, MAX_BATCH_SIZE, WriteBatch};
use futures::TryStreamExt;
use std::sync::Arc;
use tracing::{Instrument, Level, event, info_span};

/// Where a run currently is.
///
/// `Start → Authenticating → Enumerating → DeletingCollection* → Done`,
/// with `Failed` reachable from any state. `Done` and `Failed` are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PurgeState {
    Start,
    Authenticating,
    Enumerating,
    DeletingCollection,
    Done,
    Failed,
}

impl PurgeState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, PurgeState::Done | PurgeState::Failed)
    }
}

fn transition(state: &mut PurgeState, next: PurgeState) {
    event!(Level::DEBUG, from = ?state, to = ?next, "purge state changed");
    *state = next;
}

/// Bulk deletion runner.
///
/// Walks every top-level collection of the injected store and deletes its
/// documents in batches of at most [`MAX_BATCH_SIZE`]. Work is strictly
/// sequential: one page fetch or commit in flight at a time.
pub struct PurgeRunner<S: DocumentStore> {
    store: S,
    listener: Arc<dyn ProgressListener>,
    batch_capacity: usize,
    state: PurgeState,
}

impl<S: DocumentStore> PurgeRunner<S> {
    pub fn new(store: S, listener: Arc<dyn ProgressListener>) -> Self {
        Self {
            store,
            listener,
            batch_capacity: MAX_BATCH_SIZE,
            // the store handed in is already authenticated
            state: PurgeState::Authenticating,
        }
    }

    /// Commit after fewer deletes than the provider limit
    pub fn batch_capacity(mut self, capacity: usize) -> Self {
        self.batch_capacity = capacity.clamp(1, MAX_BATCH_SIZE);
        self
    }

    pub fn state(&self) -> PurgeState {
        self.state
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn into_store(self) -> S {
        self.store
    }

    /// Delete every document of every collection.
    ///
    /// Stops at the first error; batches committed before it stay deleted.
    pub async fn run(&mut self) -> Result<PurgeSummary> {
        let result = self.run_collections().await;
        match &result {
            Ok(summary) => {
                transition(&mut self.state, PurgeState::Done);
                event!(
                    Level::INFO,
                    total = summary.total_deleted(),
                    batches = summary.batch_count(),
                    "purge finished"
                );
            }
            Err(err) => {
                transition(&mut self.state, PurgeState::Failed);
                event!(Level::ERROR, kind = err.kind(), error = %err, "purge aborted");
            }
        }
        result
    }

    async fn run_collections(&mut self) -> Result<PurgeSummary> {
        transition(&mut self.state, PurgeState::Enumerating);

        let store = &self.store;
        let listener = self.listener.as_ref();
        let mut summary = PurgeSummary::new();
        let mut collections = store.list_collections();

        while let Some(collection) = collections.try_next().await? {
            transition(&mut self.state, PurgeState::DeletingCollection);

            let span = info_span!("purge.collection", collection = %collection);
            let report = purge_collection(store, listener, &collection, self.batch_capacity)
                .instrument(span)
                .await?;

            listener.on_event(&PurgeEvent::CollectionFinished {
                collection: collection.id(),
                deleted: report.deleted,
            });
            summary.push(report);
        }

        listener.on_event(&PurgeEvent::Completed {
            total: summary.total_deleted(),
        });
        Ok(summary)
    }
}

async fn purge_collection<S: DocumentStore>(
    store: &S,
    listener: &dyn ProgressListener,
    collection: &CollectionRef,
    capacity: usize,
) -> Result<CollectionSummary> {
    listener.on_event(&PurgeEvent::CollectionStarted {
        collection: collection.id(),
    });

    let mut summary = CollectionSummary::new(collection.id());
    let mut batch = WriteBatch::with_capacity(collection, capacity);
    let mut documents = store.stream_documents(collection);

    while let Some(document) = documents.try_next().await? {
        batch.delete(document);
        summary.deleted += 1;

        if batch.is_full() {
            commit(store, listener, &mut batch, &mut summary, false).await?;
        }
    }

    if !batch.is_empty() {
        commit(store, listener, &mut batch, &mut summary, true).await?;
    }

    Ok(summary)
}

async fn commit<S: DocumentStore>(
    store: &S,
    listener: &dyn ProgressListener,
    batch: &mut WriteBatch,
    summary: &mut CollectionSummary,
    final_batch: bool,
) -> Result<()> {
    store.commit(batch).await?;

    let size = batch.len();
    event!(Level::DEBUG, size, final_batch, "delete batch committed");
    summary.record_batch(size);
    listener.on_event(&PurgeEvent::BatchCommitted {
        collection: batch.collection(),
        size,
        final_batch,
    });
    batch.clear();
    Ok(())
}
