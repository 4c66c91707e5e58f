/// Outcome of clearing one collection
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CollectionSummary {
    pub name: String,
    pub deleted: usize,
    /// Size of every committed batch, in commit order
    pub batches: Vec<usize>,
}

impl CollectionSummary {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            deleted: 0,
            batches: Vec::new(),
        }
    }

    pub fn record_batch(&mut self, size: usize) {
        self.batches.push(size);
    }

    pub fn batch_count(&self) -> usize {
        self.batches.len()
    }

    pub fn committed(&self) -> usize {
        self.batches.iter().sum()
    }
}

/// Counters for a whole run
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PurgeSummary {
    pub collections: Vec<CollectionSummary>,
}

impl PurgeSummary {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, collection: CollectionSummary) {
        self.collections.push(collection);
    }

    /// Grand total of deleted documents
    pub fn total_deleted(&self) -> usize {
        self.collections.iter().map(|c| c.deleted).sum()
    }

    pub fn batch_count(&self) -> usize {
        self.collections.iter().map(CollectionSummary::batch_count).sum()
    }

    pub fn collection(&self, name: &str) -> Option<&CollectionSummary> {
        self.collections.iter().find(|c| c.name == name)
    }

    pub fn is_empty(&self) -> bool {
        self.total_deleted() == 0
    }
}
