use std::fmt;

/// Handle to a top-level collection in the remote store
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CollectionRef {
    id: String,
}

impl CollectionRef {
    pub fn new(id: impl Into<String>) -> Self {
        Self { id: id.into() }
    }

    /// The collection id, e.g. `users`
    pub fn id(&self) -> &str {
        &self.id
    }
}

impl fmt::Display for CollectionRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.id)
    }
}

/// Opaque reference to a single document.
///
/// Holds the full resource name as the server reports it:
/// `projects/{project}/databases/{database}/documents/{collection}/{id}`.
/// The reference is only ever used as the target of a delete.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DocumentRef {
    name: String,
}

impl DocumentRef {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }

    /// Full resource name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Last path segment of the resource name
    pub fn id(&self) -> &str {
        self.name.rsplit('/').next().unwrap_or(&self.name)
    }
}

impl fmt::Display for DocumentRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)
    }
}
