//! RocksDB-backed [`KvStore`] (feature `persistent`), grounded directly
//! on `state/store.rs`'s `StateStore`: one column family per entity
//! kind, opened with `create_missing_column_families`, guarded by an
//! `RwLock` around the `DB` handle for interior mutability.

use std::path::{Path, PathBuf};
use std::sync::RwLock;

use rocksdb::{ColumnFamilyDescriptor, Options, DB};

use crate::error::StoreError;

use super::schema::ALL_CFS;
use super::KvStore;

pub struct RocksDbKvStore {
    db: RwLock<DB>,
    #[allow(dead_code)]
    path: PathBuf,
}

impl RocksDbKvStore {
    pub fn open(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let path = path.as_ref().to_path_buf();
        let mut opts = Options::default();
        opts.create_if_missing(true);
        opts.create_missing_column_families(true);

        let cf_descriptors: Vec<ColumnFamilyDescriptor> = ALL_CFS
            .iter()
            .map(|name| ColumnFamilyDescriptor::new(*name, Options::default()))
            .collect();

        let db = DB::open_cf_descriptors(&opts, &path, cf_descriptors)
            .map_err(|e| StoreError::RocksDb(e.to_string()))?;

        Ok(Self { db: RwLock::new(db), path })
    }
}

impl KvStore for RocksDbKvStore {
    fn put_raw(&self, cf: &str, key: &str, value: Vec<u8>) -> Result<(), StoreError> {
        let db = self.db.read().map_err(|_| StoreError::LockPoisoned)?;
        let handle = db
            .cf_handle(cf)
            .ok_or_else(|| StoreError::NotFound(format!("column family `{cf}`")))?;
        db.put_cf(&handle, key.as_bytes(), value)
            .map_err(|e| StoreError::RocksDb(e.to_string()))
    }

    fn get_raw(&self, cf: &str, key: &str) -> Result<Option<Vec<u8>>, StoreError> {
        let db = self.db.read().map_err(|_| StoreError::LockPoisoned)?;
        let handle = db
            .cf_handle(cf)
            .ok_or_else(|| StoreError::NotFound(format!("column family `{cf}`")))?;
        db.get_cf(&handle, key.as_bytes())
            .map_err(|e| StoreError::RocksDb(e.to_string()))
    }

    fn delete_raw(&self, cf: &str, key: &str) -> Result<(), StoreError> {
        let db = self.db.read().map_err(|_| StoreError::LockPoisoned)?;
        let handle = db
            .cf_handle(cf)
            .ok_or_else(|| StoreError::NotFound(format!("column family `{cf}`")))?;
        db.delete_cf(&handle, key.as_bytes())
            .map_err(|e| StoreError::RocksDb(e.to_string()))
    }

    fn list_raw(&self, cf: &str) -> Result<Vec<Vec<u8>>, StoreError> {
        let db = self.db.read().map_err(|_| StoreError::LockPoisoned)?;
        let handle = db
            .cf_handle(cf)
            .ok_or_else(|| StoreError::NotFound(format!("column family `{cf}`")))?;
        Ok(db
            .iterator_cf(&handle, rocksdb::IteratorMode::Start)
            .filter_map(Result::ok)
            .map(|(_, v)| v.to_vec())
            .collect())
    }
}
