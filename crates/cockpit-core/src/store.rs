//! Transactional key-value store backed by redb.
//!
//! Every piece of mutable state (conversation memory, last-active pointers,
//! usage counters, stats) lives in a single `KV` table of JSON values keyed
//! by plain strings such as `15551234567:publicist` or
//! `usage:15551234567:2026-10`.
//!
//! redb admits one write transaction at a time, so a read-modify-write done
//! inside [`KvStore::transact`] or [`KvStore::update`] is serialized against
//! every other writer and can never lose an update.

use std::path::Path;
use std::sync::Arc;

use redb::{Database, ReadableTable, TableDefinition};
use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::error::{CockpitError, Result};

// ---------------------------------------------------------------------------
// Table definition
// ---------------------------------------------------------------------------

/// Key: UTF-8 string. Value: JSON-encoded document.
const KV: TableDefinition<&str, &[u8]> = TableDefinition::new("kv");

fn store_err(e: impl std::fmt::Display) -> CockpitError {
    CockpitError::Store(e.to_string())
}

// ---------------------------------------------------------------------------
// KvStore
// ---------------------------------------------------------------------------

/// Shared handle to the redb database. Clones share the same database.
#[derive(Clone)]
pub struct KvStore {
    db: Arc<Database>,
}

impl std::fmt::Debug for KvStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KvStore").finish_non_exhaustive()
    }
}

impl KvStore {
    /// Open or create the database at `path`, creating the `KV` table.
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let db = Database::create(path).map_err(store_err)?;
        let wt = db.begin_write().map_err(store_err)?;
        wt.open_table(KV).map_err(store_err)?;
        wt.commit().map_err(store_err)?;
        Ok(Self { db: Arc::new(db) })
    }

    pub fn get<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>> {
        let rt = self.db.begin_read().map_err(store_err)?;
        let table = rt.open_table(KV).map_err(store_err)?;
        match table.get(key).map_err(store_err)? {
            Some(v) => Ok(Some(serde_json::from_slice(v.value())?)),
            None => Ok(None),
        }
    }

    pub fn set<T: Serialize>(&self, key: &str, value: &T) -> Result<()> {
        self.transact(|txn| txn.set(key, value))
    }

    pub fn remove(&self, key: &str) -> Result<()> {
        self.transact(|txn| txn.remove(key).map(|_| ()))
    }

    /// Atomically read the value at `key` (or its default), apply `f`, and
    /// write it back. Returns the stored value.
    pub fn update<T, F>(&self, key: &str, f: F) -> Result<T>
    where
        T: Serialize + DeserializeOwned + Default,
        F: FnOnce(&mut T),
    {
        self.transact(|txn| {
            let mut value: T = txn.get(key)?.unwrap_or_default();
            f(&mut value);
            txn.set(key, &value)?;
            Ok(value)
        })
    }

    /// Run `f` inside one write transaction. The transaction commits only
    /// when `f` returns `Ok`; an error aborts every write it made.
    pub fn transact<R>(&self, f: impl FnOnce(&mut Txn<'_>) -> Result<R>) -> Result<R> {
        let wt = self.db.begin_write().map_err(store_err)?;
        let result = {
            let table = wt.open_table(KV).map_err(store_err)?;
            let mut txn = Txn { table };
            f(&mut txn)?
        };
        wt.commit().map_err(store_err)?;
        Ok(result)
    }

    /// All entries whose key starts with `prefix`, in key order.
    pub fn scan_prefix<T: DeserializeOwned>(&self, prefix: &str) -> Result<Vec<(String, T)>> {
        let rt = self.db.begin_read().map_err(store_err)?;
        let table = rt.open_table(KV).map_err(store_err)?;
        let mut out = Vec::new();
        for entry in table.range(prefix..).map_err(store_err)? {
            let (k, v) = entry.map_err(store_err)?;
            let key = k.value();
            if !key.starts_with(prefix) {
                break;
            }
            out.push((key.to_string(), serde_json::from_slice(v.value())?));
        }
        Ok(out)
    }
}

// ---------------------------------------------------------------------------
// Txn
// ---------------------------------------------------------------------------

/// Typed view of the `KV` table inside an open write transaction.
pub struct Txn<'t> {
    table: redb::Table<'t, &'static str, &'static [u8]>,
}

impl Txn<'_> {
    pub fn get<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>> {
        match self.table.get(key).map_err(store_err)? {
            Some(v) => Ok(Some(serde_json::from_slice(v.value())?)),
            None => Ok(None),
        }
    }

    pub fn set<T: Serialize>(&mut self, key: &str, value: &T) -> Result<()> {
        let bytes = serde_json::to_vec(value)?;
        self.table
            .insert(key, bytes.as_slice())
            .map_err(store_err)?;
        Ok(())
    }

    /// Returns whether the key existed.
    pub fn remove(&mut self, key: &str) -> Result<bool> {
        Ok(self.table.remove(key).map_err(store_err)?.is_some())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
