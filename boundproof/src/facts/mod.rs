//! Fact store: relations proven to hold at a program point

mod relation;
mod store;

pub use relation::{CmpOp, Orderings, PairKey, Relation};
pub use store::{FactError, FactSnapshot, FactStore, Inserted, intersect};
