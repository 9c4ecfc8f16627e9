//! In-memory document backend.
//!
//! Commits are applied to a working copy of the touched collections and
//! swapped in only when every operation of the batch succeeded, so a failed
//! batch leaves no partial writes behind.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use parking_lot::{Mutex, RwLock};
use tracing::{debug, instrument};

use crate::config::StoreOptions;
use crate::data::id::{Identifier, IdentifierGenerator};
use crate::store::error::{StoreError, StoreResult};
use crate::store::{DocumentBackend, DocumentStore, PendingOperation, StagedDocument, UniqueKey};

#[derive(Debug, Clone)]
struct StoredDocument {
    body: serde_json::Value,
    unique_keys: Vec<UniqueKey>,
    version: u64,
}

type Collection = BTreeMap<Identifier, StoredDocument>;

#[derive(Debug)]
pub struct MemoryDocumentStore {
    collections: RwLock<HashMap<&'static str, Collection>>,
    generator: Mutex<IdentifierGenerator>,
    options: StoreOptions,
}

impl Default for MemoryDocumentStore {
    fn default() -> Self {
        Self::with_options(StoreOptions::default())
    }
}

impl MemoryDocumentStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_options(options: StoreOptions) -> Self {
        Self {
            collections: RwLock::new(HashMap::new()),
            generator: Mutex::new(IdentifierGenerator::new(options.service_id, options.worker_id)),
            options,
        }
    }

    /// Creates a new in-memory store wrapped in Arc.
    pub fn new_shared() -> Arc<Self> {
        Arc::new(Self::new())
    }

    /// Wraps the backend in a [`DocumentStore`] handle.
    pub fn into_document_store(self: Arc<Self>) -> DocumentStore {
        DocumentStore::new(self)
    }

    pub fn options(&self) -> &StoreOptions {
        &self.options
    }

    pub fn document_count(&self, collection: &str) -> usize {
        self.collections.read().get(collection).map_or(0, BTreeMap::len)
    }

    /// Number of committed writes to a document, `None` when it is not stored.
    pub fn version(&self, collection: &str, id: Identifier) -> Option<u64> {
        self.collections
            .read()
            .get(collection)
            .and_then(|documents| documents.get(&id))
            .map(|document| document.version)
    }

    fn check_unique(&self, documents: &Collection, staged: &StagedDocument) -> StoreResult<()> {
        if !self.options.enforce_unique_indexes {
            return Ok(());
        }
        for key in &staged.unique_keys {
            let taken = documents
                .iter()
                .any(|(id, document)| *id != staged.id && document.unique_keys.contains(key));
            if taken {
                return Err(StoreError::UniqueViolation {
                    index: key.index,
                    value: key.value.clone(),
                });
            }
        }
        Ok(())
    }

    fn write(&self, documents: &mut Collection, staged: StagedDocument) {
        let version = documents.get(&staged.id).map_or(0, |document| document.version) + 1;
        documents.insert(staged.id, StoredDocument {
            body: staged.body,
            unique_keys: staged.unique_keys,
            version,
        });
    }

    fn apply(
        &self,
        working: &mut HashMap<&'static str, Collection>,
        operation: PendingOperation,
    ) -> StoreResult<()> {
        let documents = working.entry(operation.collection()).or_default();
        match operation {
            PendingOperation::Store(staged) => {
                self.check_unique(documents, &staged)?;
                self.write(documents, staged);
            }
            PendingOperation::Update(staged) => {
                if !documents.contains_key(&staged.id) {
                    return Err(StoreError::DocumentNotFound {
                        collection: staged.collection,
                        id: staged.id,
                    });
                }
                self.check_unique(documents, &staged)?;
                self.write(documents, staged);
            }
            PendingOperation::Delete { id, .. } => {
                documents.remove(&id);
            }
        }
        Ok(())
    }
}

#[async_trait::async_trait]
impl DocumentBackend for MemoryDocumentStore {
    fn next_id(&self) -> Identifier {
        self.generator.lock().generate()
    }

    async fn load(&self, collection: &'static str) -> StoreResult<Vec<serde_json::Value>> {
        Ok(self
            .collections
            .read()
            .get(collection)
            .map(|documents| documents.values().map(|document| document.body.clone()).collect())
            .unwrap_or_default())
    }

    #[instrument(skip_all, fields(operations = batch.len()))]
    async fn commit(&self, batch: Vec<PendingOperation>) -> StoreResult<()> {
        let mut collections = self.collections.write();

        let mut working: HashMap<&'static str, Collection> = HashMap::new();
        for operation in &batch {
            let name = operation.collection();
            if !working.contains_key(name) {
                working.insert(name, collections.get(name).cloned().unwrap_or_default());
            }
        }

        for operation in batch {
            self.apply(&mut working, operation)?;
        }

        for (name, documents) in working {
            debug!(collection = name, documents = documents.len(), "collection committed");
            collections.insert(name, documents);
        }
        Ok(())
    }
}
