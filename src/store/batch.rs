use crate::core::{CollectionRef, DocumentRef};

/// Most deletes a single commit may carry
pub const MAX_BATCH_SIZE: usize = 100;

/// Client-side buffer of pending deletes for one collection.
///
/// The buffer is submitted as one atomic commit. Callers flush it as soon
/// as [`is_full`](WriteBatch::is_full) reports true, so a committed batch
/// never holds more than [`MAX_BATCH_SIZE`] entries.
#[derive(Debug, Clone)]
pub struct WriteBatch {
    collection: String,
    deletes: Vec<DocumentRef>,
    capacity: usize,
}

impl WriteBatch {
    pub fn new(collection: &CollectionRef) -> Self {
        Self::with_capacity(collection, MAX_BATCH_SIZE)
    }

    /// Batch with a smaller capacity, clamped to `1..=MAX_BATCH_SIZE`
    pub fn with_capacity(collection: &CollectionRef, capacity: usize) -> Self {
        let capacity = capacity.clamp(1, MAX_BATCH_SIZE);
        Self {
            collection: collection.id().to_string(),
            deletes: Vec::with_capacity(capacity),
            capacity,
        }
    }

    /// Queue a delete and return the number of pending deletes
    pub fn delete(&mut self, document: DocumentRef) -> usize {
        debug_assert!(!self.is_full(), "write batch overflow");
        self.deletes.push(document);
        self.deletes.len()
    }

    pub fn collection(&self) -> &str {
        &self.collection
    }

    pub fn documents(&self) -> &[DocumentRef] {
        &self.deletes
    }

    pub fn len(&self) -> usize {
        self.deletes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.deletes.is_empty()
    }

    pub fn is_full(&self) -> bool {
        self.deletes.len() >= self.capacity
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Drop all pending deletes, keeping the allocation
    pub fn clear(&mut self) {
        self.deletes.clear();
    }
}
