use std::sync::Arc;

use tracing::{debug, instrument, warn};

use crate::cancel::CancellationToken;
use crate::store::error::{StoreError, StoreResult};
use crate::store::query::Query;
use crate::store::{Document, DocumentBackend, PendingOperation, StagedDocument};

/// Unit of work over a document store.
///
/// `store`, `update` and `delete` only stage work; nothing reaches the backend
/// until `save_changes`. The pending buffer is cleared by every flush attempt,
/// whether it commits, fails or is cancelled.
#[async_trait::async_trait]
pub trait DocumentSession: Send {
    /// Stages an insert-or-replace, assigning an identifier when the document
    /// has none yet.
    fn store<D: Document>(&mut self, document: &mut D) -> StoreResult<()>;

    /// Stages a full replacement of an existing document.
    fn update<D: Document>(&mut self, document: &D) -> StoreResult<()>;

    /// Stages the removal of a document.
    fn delete<D: Document>(&mut self, document: &D) -> StoreResult<()>;

    /// Commits every staged operation as one batch. Staged work is taken
    /// before the token is checked, so a cancelled flush discards it.
    async fn save_changes(&mut self, cancel: &CancellationToken) -> StoreResult<()>;

    fn query<D: Document>(&self) -> Query<D>;

    fn pending_changes(&self) -> usize;

    /// Releases the session. Pending work is discarded and later calls fail
    /// with [`StoreError::SessionDisposed`]. Calling it twice is harmless.
    fn dispose(&mut self);
}

/// Lightweight session: snapshots are taken at staging time and there is no
/// identity map, the caller's value is the in-session copy.
pub struct Session {
    backend: Arc<dyn DocumentBackend>,
    pending: Vec<PendingOperation>,
    disposed: bool,
}

impl Session {
    pub fn new(backend: Arc<dyn DocumentBackend>) -> Self {
        Self {
            backend,
            pending: Vec::new(),
            disposed: false,
        }
    }

    fn ensure_open(&self) -> StoreResult<()> {
        if self.disposed {
            return Err(StoreError::SessionDisposed);
        }
        Ok(())
    }
}

#[async_trait::async_trait]
impl DocumentSession for Session {
    fn store<D: Document>(&mut self, document: &mut D) -> StoreResult<()> {
        self.ensure_open()?;
        let id = match document.id() {
            Some(id) => id,
            None => {
                let id = self.backend.next_id();
                document.set_id(id);
                id
            }
        };
        self.pending.push(PendingOperation::Store(StagedDocument::snapshot(id, document)?));
        Ok(())
    }

    fn update<D: Document>(&mut self, document: &D) -> StoreResult<()> {
        self.ensure_open()?;
        let id = document.id().ok_or(StoreError::MissingIdentifier { collection: D::COLLECTION })?;
        self.pending.push(PendingOperation::Update(StagedDocument::snapshot(id, document)?));
        Ok(())
    }

    fn delete<D: Document>(&mut self, document: &D) -> StoreResult<()> {
        self.ensure_open()?;
        let id = document.id().ok_or(StoreError::MissingIdentifier { collection: D::COLLECTION })?;
        self.pending.push(PendingOperation::Delete { collection: D::COLLECTION, id });
        Ok(())
    }

    #[instrument(skip_all)]
    async fn save_changes(&mut self, cancel: &CancellationToken) -> StoreResult<()> {
        self.ensure_open()?;
        let batch = std::mem::take(&mut self.pending);
        if cancel.is_cancelled() {
            if !batch.is_empty() {
                warn!(discarded = batch.len(), "flush cancelled, staged changes dropped");
            }
            return Err(StoreError::Cancelled);
        }
        if batch.is_empty() {
            return Ok(());
        }

        let operations = batch.len();
        self.backend.commit(batch).await?;
        debug!(operations, "unit of work committed");
        Ok(())
    }

    fn query<D: Document>(&self) -> Query<D> {
        Query::new(Arc::clone(&self.backend))
    }

    fn pending_changes(&self) -> usize {
        self.pending.len()
    }

    fn dispose(&mut self) {
        if self.disposed {
            return;
        }
        if !self.pending.is_empty() {
            warn!(discarded = self.pending.len(), "session disposed with unsaved changes");
        }
        self.pending.clear();
        self.disposed = true;
    }
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("pending", &self.pending.len())
            .field("disposed", &self.disposed)
            .finish()
    }
}
