//! Partitioned key-value table store with optimistic concurrency.
//!
//! One logical table per entity kind; rows are addressed by
//! `(partition, row)` and carry an application-maintained version counter.
//! There are no transactions across partitions, and nothing here needs
//! them: multi-row invariants are maintained by CAS loops in the callers.

pub mod memory;
pub mod sled_store;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    /// The row's version did not match the caller's expectation.
    #[error("version precondition failed for {table}/{partition}/{row}")]
    PreconditionFailed {
        table: String,
        partition: String,
        row: String,
    },
    #[error("table store backend failure: {0}")]
    Backend(String),
    #[error("could not decode stored row: {0}")]
    Codec(String),
}

impl StoreError {
    pub fn is_precondition_failed(&self) -> bool {
        matches!(self, Self::PreconditionFailed { .. })
    }
}

/// A stored row: addressing, version, and an opaque JSON body.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawRow {
    pub partition_key: String,
    pub row_key: String,
    pub version: u64,
    pub body: serde_json::Value,
}

/// The storage backend. `update_if_match` with `expected_version == 0`
/// means "create if and only if the row does not exist yet"; fresh rows
/// are written at version 1.
#[async_trait]
pub trait TableStore: Send + Sync + 'static {
    async fn get(
        &self,
        table: &str,
        partition: &str,
        row: &str,
    ) -> Result<Option<RawRow>, StoreError>;

    /// Unconditional write. Returns the stored version.
    async fn upsert(&self, table: &str, row: RawRow) -> Result<u64, StoreError>;

    /// Conditional write; fails with [`StoreError::PreconditionFailed`]
    /// unless the stored version equals `expected_version`.
    async fn update_if_match(
        &self,
        table: &str,
        row: RawRow,
        expected_version: u64,
    ) -> Result<u64, StoreError>;

    async fn delete(&self, table: &str, partition: &str, row: &str) -> Result<bool, StoreError>;

    async fn query_partition(
        &self,
        table: &str,
        partition: &str,
    ) -> Result<Vec<RawRow>, StoreError>;

    async fn query_all(&self, table: &str) -> Result<Vec<RawRow>, StoreError>;
}

/// An entity that maps onto one table row.
pub trait TableEntity: Serialize + DeserializeOwned + Clone + Send + Sync + 'static {
    const TABLE: &'static str;

    fn partition_key(&self) -> String;
    fn row_key(&self) -> String;
    fn version(&self) -> u64;
    fn set_version(&mut self, version: u64);
}

fn encode<E: TableEntity>(entity: &E) -> Result<RawRow, StoreError> {
    Ok(RawRow {
        partition_key: entity.partition_key(),
        row_key: entity.row_key(),
        version: entity.version(),
        body: serde_json::to_value(entity).map_err(|error| StoreError::Codec(error.to_string()))?,
    })
}

fn decode<E: TableEntity>(row: RawRow) -> Result<E, StoreError> {
    let mut entity: E =
        serde_json::from_value(row.body).map_err(|error| StoreError::Codec(error.to_string()))?;
    entity.set_version(row.version);
    Ok(entity)
}

pub async fn fetch<E: TableEntity>(
    store: &dyn TableStore,
    partition: &str,
    row: &str,
) -> Result<Option<E>, StoreError> {
    store
        .get(E::TABLE, partition, row)
        .await?
        .map(decode)
        .transpose()
}

/// Unconditional save; the entity's version is refreshed in place.
pub async fn save<E: TableEntity>(store: &dyn TableStore, entity: &mut E) -> Result<(), StoreError> {
    let version = store.upsert(E::TABLE, encode(entity)?).await?;
    entity.set_version(version);
    Ok(())
}

/// Save expecting the entity's current version; the one optimistic-write
/// primitive every CAS loop goes through.
pub async fn save_if_current<E: TableEntity>(
    store: &dyn TableStore,
    entity: &mut E,
) -> Result<(), StoreError> {
    let expected = entity.version();
    let version = store
        .update_if_match(E::TABLE, encode(entity)?, expected)
        .await?;
    entity.set_version(version);
    Ok(())
}

pub async fn remove<E: TableEntity>(
    store: &dyn TableStore,
    partition: &str,
    row: &str,
) -> Result<bool, StoreError> {
    store.delete(E::TABLE, partition, row).await
}

pub async fn list<E: TableEntity>(
    store: &dyn TableStore,
    partition: &str,
) -> Result<Vec<E>, StoreError> {
    store
        .query_partition(E::TABLE, partition)
        .await?
        .into_iter()
        .map(decode)
        .collect()
}

pub async fn list_all<E: TableEntity>(store: &dyn TableStore) -> Result<Vec<E>, StoreError> {
    store
        .query_all(E::TABLE)
        .await?
        .into_iter()
        .map(decode)
        .collect()
}
