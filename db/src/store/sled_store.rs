//! Embedded persistent table store backed by `sled`.
//!
//! One sled tree per logical table; row keys are `partition \x1f row`, so a
//! partition scan is a prefix scan. `update_if_match` rides on sled's
//! `compare_and_swap` over the serialized row bytes.

use std::path::Path;

use async_trait::async_trait;

use super::{RawRow, StoreError, TableStore};

const KEY_SEPARATOR: char = '\u{1f}';

#[derive(Debug)]
pub struct SledStore {
    db: sled::Db,
}

impl SledStore {
    pub fn open(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let db = sled::open(path).map_err(backend)?;
        Ok(Self { db })
    }

    fn tree(&self, table: &str) -> Result<sled::Tree, StoreError> {
        self.db.open_tree(table).map_err(backend)
    }
}

fn backend(error: sled::Error) -> StoreError {
    StoreError::Backend(error.to_string())
}

fn key(partition: &str, row: &str) -> Vec<u8> {
    format!("{partition}{KEY_SEPARATOR}{row}").into_bytes()
}

fn encode(row: &RawRow) -> Result<Vec<u8>, StoreError> {
    serde_json::to_vec(row).map_err(|error| StoreError::Codec(error.to_string()))
}

fn decode(bytes: &[u8]) -> Result<RawRow, StoreError> {
    serde_json::from_slice(bytes).map_err(|error| StoreError::Codec(error.to_string()))
}

#[async_trait]
impl TableStore for SledStore {
    async fn get(
        &self,
        table: &str,
        partition: &str,
        row: &str,
    ) -> Result<Option<RawRow>, StoreError> {
        let tree = self.tree(table)?;
        tree.get(key(partition, row))
            .map_err(backend)?
            .map(|bytes| decode(&bytes))
            .transpose()
    }

    async fn upsert(&self, table: &str, mut row: RawRow) -> Result<u64, StoreError> {
        let tree = self.tree(table)?;
        let row_key = key(&row.partition_key, &row.row_key);

        // Last-writer-wins, but the version still has to move forward, so
        // loop on the swap until our bump lands on the latest copy.
        loop {
            let current = tree.get(&row_key).map_err(backend)?;
            let version = match &current {
                Some(bytes) => decode(bytes)?.version + 1,
                None => 1,
            };
            row.version = version;

            let swap = tree
                .compare_and_swap(&row_key, current, Some(encode(&row)?))
                .map_err(backend)?;
            if swap.is_ok() {
                return Ok(version);
            }
        }
    }

    async fn update_if_match(
        &self,
        table: &str,
        mut row: RawRow,
        expected_version: u64,
    ) -> Result<u64, StoreError> {
        let tree = self.tree(table)?;
        let row_key = key(&row.partition_key, &row.row_key);

        let precondition_failed = || StoreError::PreconditionFailed {
            table: table.to_string(),
            partition: row.partition_key.clone(),
            row: row.row_key.clone(),
        };

        let current = tree.get(&row_key).map_err(backend)?;
        let current_version = match &current {
            Some(bytes) => decode(bytes)?.version,
            None => 0,
        };
        if current_version != expected_version {
            return Err(precondition_failed());
        }

        row.version = expected_version + 1;
        let swap = tree
            .compare_and_swap(&row_key, current, Some(encode(&row)?))
            .map_err(backend)?;

        match swap {
            Ok(()) => Ok(row.version),
            Err(_) => Err(precondition_failed()),
        }
    }

    async fn delete(&self, table: &str, partition: &str, row: &str) -> Result<bool, StoreError> {
        let tree = self.tree(table)?;
        Ok(tree.remove(key(partition, row)).map_err(backend)?.is_some())
    }

    async fn query_partition(
        &self,
        table: &str,
        partition: &str,
    ) -> Result<Vec<RawRow>, StoreError> {
        let tree = self.tree(table)?;
        tree.scan_prefix(format!("{partition}{KEY_SEPARATOR}").into_bytes())
            .map(|entry| entry.map_err(backend).and_then(|(_, bytes)| decode(&bytes)))
            .collect()
    }

    async fn query_all(&self, table: &str) -> Result<Vec<RawRow>, StoreError> {
        let tree = self.tree(table)?;
        tree.iter()
            .map(|entry| entry.map_err(backend).and_then(|(_, bytes)| decode(&bytes)))
            .collect()
    }
}
