use serde::Deserialize;

/// Options of a document store instance.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct StoreOptions {
    /// Service component of generated identifiers.
    pub service_id: u16,
    /// Worker component of generated identifiers. Two processes sharing a
    /// database must not share a (service_id, worker_id) pair.
    pub worker_id: u16,
    /// When disabled, documents' unique keys are not checked on commit.
    pub enforce_unique_indexes: bool,
}

impl Default for StoreOptions {
    fn default() -> Self {
        Self {
            service_id: 0,
            worker_id: 0,
            enforce_unique_indexes: true,
        }
    }
}

impl StoreOptions {
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    pub fn with_service_id(mut self, service_id: u16) -> Self {
        self.service_id = service_id;
        self
    }

    pub fn with_worker_id(mut self, worker_id: u16) -> Self {
        self.worker_id = worker_id;
        self
    }

    pub fn with_unique_indexes(mut self, enforce: bool) -> Self {
        self.enforce_unique_indexes = enforce;
        self
    }
}
