// ============================================================================
// firestore-clear Library
// ============================================================================

pub mod core;
pub mod connection;
pub mod store;
pub mod executor;
pub mod result;
pub mod facade;

// Re-export main types for convenience
pub use core::{CollectionRef, DocumentRef, PurgeError, Result};
pub use result::{CollectionSummary, PurgeSummary};

pub use connection::{
    StoreConfig,
    auth::{Credentials, KeyFile, TokenSource},
    config::{DEFAULT_DATABASE_ID, DEFAULT_PROJECT_ID},
};

pub use store::{DocumentStore, FirestoreClient, MAX_BATCH_SIZE, MemoryStore, WriteBatch};

pub use executor::{
    ConsoleReporter, ProgressListener, PurgeEvent, PurgeRunner, PurgeState, SilentListener,
};

// ============================================================================
// Top-level entry points
// ============================================================================

pub use facade::{Outcome, clear_database, clear_with, conclude};
