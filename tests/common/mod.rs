#![allow(dead_code)]

use firestore_clear::{ProgressListener, PurgeEvent};
use std::sync::Mutex;

/// Owned copy of a progress event
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Recorded {
    Starting(String),
    Connected(String),
    CollectionStarted(String),
    Batch {
        collection: String,
        size: usize,
        final_batch: bool,
    },
    CollectionFinished {
        collection: String,
        deleted: usize,
    },
    Completed(usize),
    Failed(String),
    Concluded(bool),
}

/// Listener that keeps every event for later assertions
#[derive(Default)]
pub struct Recorder {
    events: Mutex<Vec<Recorded>>,
}

impl Recorder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<Recorded> {
        self.events.lock().unwrap().clone()
    }

    /// `(collection, deleted)` for each finished collection
    pub fn collection_reports(&self) -> Vec<(String, usize)> {
        self.events()
            .into_iter()
            .filter_map(|e| match e {
                Recorded::CollectionFinished {
                    collection,
                    deleted,
                } => Some((collection, deleted)),
                _ => None,
            })
            .collect()
    }

    pub fn batch_sizes(&self, collection: &str) -> Vec<usize> {
        self.events()
            .into_iter()
            .filter_map(|e| match e {
                Recorded::Batch {
                    collection: c,
                    size,
                    ..
                } if c == collection => Some(size),
                _ => None,
            })
            .collect()
    }

    pub fn completed_total(&self) -> Option<usize> {
        self.events().into_iter().find_map(|e| match e {
            Recorded::Completed(total) => Some(total),
            _ => None,
        })
    }

    pub fn failures(&self) -> Vec<String> {
        self.events()
            .into_iter()
            .filter_map(|e| match e {
                Recorded::Failed(message) => Some(message),
                _ => None,
            })
            .collect()
    }
}

impl ProgressListener for Recorder {
    fn on_event(&self, event: &PurgeEvent<'_>) {
        let recorded = match event {
            PurgeEvent::Starting { project } => Recorded::Starting(project.to_string()),
            PurgeEvent::Connected { project } => Recorded::Connected(project.to_string()),
            PurgeEvent::CollectionStarted { collection } => {
                Recorded::CollectionStarted(collection.to_string())
            }
            PurgeEvent::BatchCommitted {
                collection,
                size,
                final_batch,
            } => Recorded::Batch {
                collection: collection.to_string(),
                size: *size,
                final_batch: *final_batch,
            },
            PurgeEvent::CollectionFinished {
                collection,
                deleted,
            } => Recorded::CollectionFinished {
                collection: collection.to_string(),
                deleted: *deleted,
            },
            PurgeEvent::Completed { total } => Recorded::Completed(*total),
            PurgeEvent::Failed { error } => Recorded::Failed(error.to_string()),
            PurgeEvent::Concluded { success } => Recorded::Concluded(*success),
        };
        self.events.lock().unwrap().push(recorded);
    }
}
