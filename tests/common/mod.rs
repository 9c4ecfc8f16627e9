//! Shared fixtures for the identity store integration tests.

#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Once};

use iam0_identity::store::{Document, DocumentSession, Query, Session, StoreResult};
use iam0_identity::{CancellationToken, DocumentStore, MemoryDocumentStore, RoleStore, UserStore};

static TRACING: Once = Once::new();

pub fn init_tracing() {
    TRACING.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .with_test_writer()
            .try_init();
    });
}

pub struct Fixture {
    pub backend: Arc<MemoryDocumentStore>,
    pub documents: DocumentStore,
}

impl Fixture {
    pub fn new() -> Self {
        init_tracing();
        let backend = MemoryDocumentStore::new_shared();
        let documents = Arc::clone(&backend).into_document_store();
        Self { backend, documents }
    }

    pub fn role_store(&self) -> RoleStore<Session> {
        RoleStore::new(self.documents.lightweight_session())
    }

    pub fn user_store(&self) -> UserStore<Session> {
        UserStore::new(self.documents.lightweight_session())
    }

    pub fn recording_role_store(&self) -> (RoleStore<RecordingSession>, SessionCounters) {
        let session = RecordingSession::new(self.documents.lightweight_session());
        let counters = session.counters();
        (RoleStore::new(session), counters)
    }

    pub fn recording_user_store(&self) -> (UserStore<RecordingSession>, SessionCounters) {
        let session = RecordingSession::new(self.documents.lightweight_session());
        let counters = session.counters();
        (UserStore::new(session), counters)
    }

    /// Role store whose session cancels `token` as soon as anything is staged.
    pub fn cancelling_role_store(&self, token: &CancellationToken) -> RoleStore<CancellingSession> {
        RoleStore::new(CancellingSession::new(self.documents.lightweight_session(), token))
    }

    pub fn cancelling_user_store(&self, token: &CancellationToken) -> UserStore<CancellingSession> {
        UserStore::new(CancellingSession::new(self.documents.lightweight_session(), token))
    }
}

pub fn token() -> CancellationToken {
    CancellationToken::new()
}

/// Number of store interactions a session has seen. Disposal is not counted.
#[derive(Debug, Clone, Default)]
pub struct CallCounter(Arc<AtomicUsize>);

impl CallCounter {
    pub fn get(&self) -> usize {
        self.0.load(Ordering::SeqCst)
    }

    fn bump(&self) {
        self.0.fetch_add(1, Ordering::SeqCst);
    }
}

/// Store interactions and disposals seen by a [`RecordingSession`].
#[derive(Debug, Clone, Default)]
pub struct SessionCounters {
    pub calls: CallCounter,
    pub disposals: CallCounter,
}

/// Session double that counts every call before delegating.
#[derive(Debug)]
pub struct RecordingSession {
    inner: Session,
    counters: SessionCounters,
}

impl RecordingSession {
    pub fn new(inner: Session) -> Self {
        Self { inner, counters: SessionCounters::default() }
    }

    pub fn counters(&self) -> SessionCounters {
        self.counters.clone()
    }
}

#[async_trait::async_trait]
impl DocumentSession for RecordingSession {
    fn store<D: Document>(&mut self, document: &mut D) -> StoreResult<()> {
        self.counters.calls.bump();
        self.inner.store(document)
    }

    fn update<D: Document>(&mut self, document: &D) -> StoreResult<()> {
        self.counters.calls.bump();
        self.inner.update(document)
    }

    fn delete<D: Document>(&mut self, document: &D) -> StoreResult<()> {
        self.counters.calls.bump();
        self.inner.delete(document)
    }

    async fn save_changes(&mut self, cancel: &CancellationToken) -> StoreResult<()> {
        self.counters.calls.bump();
        self.inner.save_changes(cancel).await
    }

    fn query<D: Document>(&self) -> Query<D> {
        self.counters.calls.bump();
        self.inner.query()
    }

    fn pending_changes(&self) -> usize {
        self.inner.pending_changes()
    }

    fn dispose(&mut self) {
        self.counters.disposals.bump();
        self.inner.dispose();
    }
}

/// Session double that cancels a token right after staging, so the flush
/// that follows sees a cancelled token.
#[derive(Debug)]
pub struct CancellingSession {
    inner: Session,
    token: CancellationToken,
}

impl CancellingSession {
    pub fn new(inner: Session, token: &CancellationToken) -> Self {
        Self { inner, token: token.clone() }
    }
}

#[async_trait::async_trait]
impl DocumentSession for CancellingSession {
    fn store<D: Document>(&mut self, document: &mut D) -> StoreResult<()> {
        self.inner.store(document)?;
        self.token.cancel();
        Ok(())
    }

    fn update<D: Document>(&mut self, document: &D) -> StoreResult<()> {
        self.inner.update(document)?;
        self.token.cancel();
        Ok(())
    }

    fn delete<D: Document>(&mut self, document: &D) -> StoreResult<()> {
        self.inner.delete(document)?;
        self.token.cancel();
        Ok(())
    }

    async fn save_changes(&mut self, cancel: &CancellationToken) -> StoreResult<()> {
        self.inner.save_changes(cancel).await
    }

    fn query<D: Document>(&self) -> Query<D> {
        self.inner.query()
    }

    fn pending_changes(&self) -> usize {
        self.inner.pending_changes()
    }

    fn dispose(&mut self) {
        self.inner.dispose();
    }
}
