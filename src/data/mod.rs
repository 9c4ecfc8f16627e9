pub mod id;

pub use id::{Identifier, IdentifierGenerator, ParseIdentifierError};
