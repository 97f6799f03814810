//! Entity model, normalisation and interpretation.

pub mod entities;
pub mod interpret;

pub use entities::{normalize, AttributeKind, Combinator, DateRange, EntityMap, QueryType, RawEntityMap};
pub use interpret::interpret;
