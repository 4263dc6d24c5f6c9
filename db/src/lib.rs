//! Persistence and domain operations for the league scheduler.
//!
//! Everything is stored as partitioned rows behind the [`store::TableStore`]
//! abstraction; the modules here layer entity codecs, the slot overlap
//! guard, the request/slot state machine, and role resolution on top of it.

pub mod availability;
pub mod entities;
pub mod errors;
pub mod report;
pub mod requests;
pub mod retry;
pub mod roles;
pub mod schedule;
pub mod slots;
pub mod store;

use std::path::Path;
use std::sync::Arc;

use store::{memory::MemoryStore, sled_store::SledStore, StoreError, TableStore};

/// Input validation hook shared by the `*Input` payload types.
pub trait Validator {
    type Error;
    fn validate(&self) -> Result<(), Self::Error>;
}

/// Handle to every domain operation. Cheap to clone; one per process is
/// shared across request handlers.
#[derive(Clone)]
pub struct Client {
    store: Arc<dyn TableStore>,
}

impl Client {
    pub fn new(store: Arc<dyn TableStore>) -> Self {
        Self { store }
    }

    /// Volatile store, used by tests and local development.
    pub fn in_memory() -> Self {
        Self::new(Arc::new(MemoryStore::default()))
    }

    /// Embedded persistent store at `path`.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        Ok(Self::new(Arc::new(SledStore::open(path)?)))
    }

    pub fn store(&self) -> &dyn TableStore {
        self.store.as_ref()
    }
}
