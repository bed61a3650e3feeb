//! SQLite backend for the Axiom reasoning store.
//!
//! A store is bound to one repository root and keeps its data under
//! `<root>/.intent/`. Writes are serialized across processes by an advisory
//! lock on that directory and committed in one SQLite transaction each.

mod cursor;
mod encode;
mod lock;
mod schema;
mod store;

pub mod binding;
pub mod config;
pub mod error;

pub use binding::{Metadata, RepositoryBinding, find_root};
pub use config::StoreConfig;
pub use cursor::Cursor;
pub use error::{Error, Result};
pub use schema::SCHEMA_VERSION;
pub use store::SqliteStore;
