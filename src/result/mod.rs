mod summary;

pub use summary::{CollectionSummary, PurgeSummary};
