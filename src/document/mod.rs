//! Document storage: content and attributes by document ID.

pub mod store;

pub use store::{DocumentStore, StoredDocument};
