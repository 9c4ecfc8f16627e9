//! Identity stores (roles, users, claims) persisted in a schemaless document
//! store.
//!
//! ```text
//! RoleStore / UserStore  ── model::store ── identity-framework contract
//!          │ owns
//!        Session         ── store        ── unit of work, lazy queries
//!          │ commits to
//!   DocumentBackend      ── store::memory ── in-memory reference backend
//! ```

pub mod cancel;
pub mod config;
pub mod data;
pub mod model;
pub mod store;

pub use cancel::CancellationToken;
pub use config::StoreOptions;
pub use data::id::Identifier;
pub use model::store::{
    IdentityError, IdentityFailure, IdentityResult, RoleRepository, RoleStore, Store,
    UserRepository, UserStore,
};
pub use model::{Claim, IdentityClaim, Role, User, UserLogin};
pub use store::{DocumentSession, DocumentStore, MemoryDocumentStore, StoreError};
