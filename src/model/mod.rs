pub mod claim;
pub mod normalizer;
pub mod role;
pub mod store;
pub mod user;

pub use claim::{Claim, IdentityClaim};
pub use normalizer::{normalize, LookupNormalizer, UpperInvariantNormalizer};
pub use role::Role;
pub use user::{User, UserLogin};
