//! Persistent, identity-labeled storage for key records.

mod schema;
mod store;

pub use store::KeyStore;
