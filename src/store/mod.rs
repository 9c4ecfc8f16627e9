//! Document store boundary.
//!
//! The identity stores only ever talk to a [`DocumentSession`]; sessions batch
//! staged writes and hand them to a [`DocumentBackend`] in one commit.

mod error;
mod memory;
mod query;
mod session;

use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::data::id::Identifier;

pub use error::{StoreError, StoreResult};
pub use memory::MemoryDocumentStore;
pub use query::Query;
pub use session::{DocumentSession, Session};

/// A value of a unique index declared by a document.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct UniqueKey {
    pub index: &'static str,
    pub value: String,
}

impl UniqueKey {
    pub fn new(index: &'static str, value: impl Into<String>) -> Self {
        Self { index, value: value.into() }
    }
}

/// An entity persisted as a schemaless document.
pub trait Document: Serialize + DeserializeOwned + Send + Sync + 'static {
    const COLLECTION: &'static str;

    fn id(&self) -> Option<Identifier>;

    fn set_id(&mut self, id: Identifier);

    /// Unique index values of this document. Absent values are not indexed.
    fn unique_keys(&self) -> Vec<UniqueKey> {
        Vec::new()
    }
}

/// Snapshot of a document taken when it was staged.
#[derive(Debug, Clone)]
pub struct StagedDocument {
    pub collection: &'static str,
    pub id: Identifier,
    pub body: serde_json::Value,
    pub unique_keys: Vec<UniqueKey>,
}

impl StagedDocument {
    pub(crate) fn snapshot<D: Document>(id: Identifier, document: &D) -> StoreResult<Self> {
        Ok(Self {
            collection: D::COLLECTION,
            id,
            body: serde_json::to_value(document)?,
            unique_keys: document.unique_keys(),
        })
    }
}

#[derive(Debug, Clone)]
pub enum PendingOperation {
    /// Insert, or replace when a document with the id already exists.
    Store(StagedDocument),
    /// Replace an existing document.
    Update(StagedDocument),
    /// Remove a document; removing an absent document is not an error.
    Delete {
        collection: &'static str,
        id: Identifier,
    },
}

impl PendingOperation {
    pub fn collection(&self) -> &'static str {
        match self {
            PendingOperation::Store(doc) | PendingOperation::Update(doc) => doc.collection,
            PendingOperation::Delete { collection, .. } => collection,
        }
    }
}

/// Storage engine behind the sessions. Implementations must be thread-safe and
/// apply each committed batch atomically.
#[async_trait::async_trait]
pub trait DocumentBackend: Send + Sync + 'static {
    /// Allocates a fresh identifier for an inserted document.
    fn next_id(&self) -> Identifier;

    /// Loads every document of a collection, ordered by identifier.
    async fn load(&self, collection: &'static str) -> StoreResult<Vec<serde_json::Value>>;

    /// Applies a batch of staged operations, all or nothing.
    async fn commit(&self, batch: Vec<PendingOperation>) -> StoreResult<()>;
}

/// Handle to a document store, the factory of sessions.
#[derive(Clone)]
pub struct DocumentStore {
    backend: Arc<dyn DocumentBackend>,
}

impl DocumentStore {
    pub fn new(backend: Arc<dyn DocumentBackend>) -> Self {
        Self { backend }
    }

    /// Opens a session without identity map or dirty tracking. Writes become
    /// visible to other sessions once `save_changes` succeeds.
    pub fn lightweight_session(&self) -> Session {
        Session::new(Arc::clone(&self.backend))
    }

    pub fn backend(&self) -> &Arc<dyn DocumentBackend> {
        &self.backend
    }
}

impl std::fmt::Debug for DocumentStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DocumentStore").finish_non_exhaustive()
    }
}
