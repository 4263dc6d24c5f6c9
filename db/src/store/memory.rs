//! In-memory table store used by tests and local development.

use std::collections::BTreeMap;
use std::sync::RwLock;

use async_trait::async_trait;

use super::{RawRow, StoreError, TableStore};

type Partitioned = BTreeMap<(String, String), RawRow>;

/// Rows live in `BTreeMap`s so queries come back in a deterministic
/// `(partition, row)` order, matching what a real partitioned store scans.
#[derive(Debug, Default)]
pub struct MemoryStore {
    tables: RwLock<BTreeMap<String, Partitioned>>,
}

impl MemoryStore {
    fn read(&self) -> Result<std::sync::RwLockReadGuard<'_, BTreeMap<String, Partitioned>>, StoreError> {
        self.tables
            .read()
            .map_err(|_| StoreError::Backend("store lock poisoned".into()))
    }

    fn write(
        &self,
    ) -> Result<std::sync::RwLockWriteGuard<'_, BTreeMap<String, Partitioned>>, StoreError> {
        self.tables
            .write()
            .map_err(|_| StoreError::Backend("store lock poisoned".into()))
    }
}

#[async_trait]
impl TableStore for MemoryStore {
    async fn get(
        &self,
        table: &str,
        partition: &str,
        row: &str,
    ) -> Result<Option<RawRow>, StoreError> {
        let tables = self.read()?;
        Ok(tables
            .get(table)
            .and_then(|rows| rows.get(&(partition.to_string(), row.to_string())))
            .cloned())
    }

    async fn upsert(&self, table: &str, mut row: RawRow) -> Result<u64, StoreError> {
        let mut tables = self.write()?;
        let rows = tables.entry(table.to_string()).or_default();
        let key = (row.partition_key.clone(), row.row_key.clone());

        let version = rows.get(&key).map_or(0, |existing| existing.version) + 1;
        row.version = version;
        rows.insert(key, row);

        Ok(version)
    }

    async fn update_if_match(
        &self,
        table: &str,
        mut row: RawRow,
        expected_version: u64,
    ) -> Result<u64, StoreError> {
        let mut tables = self.write()?;
        let rows = tables.entry(table.to_string()).or_default();
        let key = (row.partition_key.clone(), row.row_key.clone());

        let current = rows.get(&key).map_or(0, |existing| existing.version);
        if current != expected_version {
            return Err(StoreError::PreconditionFailed {
                table: table.to_string(),
                partition: row.partition_key,
                row: row.row_key,
            });
        }

        let version = expected_version + 1;
        row.version = version;
        rows.insert(key, row);

        Ok(version)
    }

    async fn delete(&self, table: &str, partition: &str, row: &str) -> Result<bool, StoreError> {
        let mut tables = self.write()?;
        Ok(tables
            .get_mut(table)
            .is_some_and(|rows| rows.remove(&(partition.to_string(), row.to_string())).is_some()))
    }

    async fn query_partition(
        &self,
        table: &str,
        partition: &str,
    ) -> Result<Vec<RawRow>, StoreError> {
        let tables = self.read()?;
        Ok(tables.get(table).map_or_else(Vec::new, |rows| {
            rows.range((partition.to_string(), String::new())..)
                .take_while(|((candidate, _), _)| candidate == partition)
                .map(|(_, row)| row.clone())
                .collect()
        }))
    }

    async fn query_all(&self, table: &str) -> Result<Vec<RawRow>, StoreError> {
        let tables = self.read()?;
        Ok(tables
            .get(table)
            .map_or_else(Vec::new, |rows| rows.values().cloned().collect()))
    }
}
