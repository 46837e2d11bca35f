//! redb engine
//!
//! Values are packed with a codec tag and DEFLATE-compressed when
//! compression is enabled.

use super::compression::{pack, unpack, ValueCodec};
use super::{check_key, BackendOptions, CompressionConfig, StoreBackend, StoreHandle};
use crate::errors::{CacheError, Result};
use redb::{Database, ReadableTable, TableDefinition};
use std::path::Path;

const NAME: &str = "redb";

/// redb release line this adapter is built against
const REDB_VERSION: &str = "2";

const HEADERS: TableDefinition<&[u8], &[u8]> = TableDefinition::new("headers");

/// The redb storage engine
#[derive(Debug, Clone, Copy, Default)]
pub struct RedbBackend;

impl StoreBackend for RedbBackend {
    fn name(&self) -> &'static str {
        NAME
    }

    fn identify(&self) -> String {
        format!("redb {REDB_VERSION}")
    }

    fn open(&self, path: &Path, options: &BackendOptions) -> Result<Box<dyn StoreHandle>> {
        let db = Database::create(path).map_err(|e| CacheError::backend(NAME, "open database", e))?;

        // Create the table up front so readers never see it missing
        let txn = db
            .begin_write()
            .map_err(|e| CacheError::backend(NAME, "begin write transaction", e))?;
        txn.open_table(HEADERS)
            .map_err(|e| CacheError::backend(NAME, "open table", e))?;
        txn.commit()
            .map_err(|e| CacheError::backend(NAME, "commit", e))?;

        Ok(Box::new(RedbHandle {
            db,
            compression: options.compression,
        }))
    }
}

struct RedbHandle {
    db: Database,
    compression: CompressionConfig,
}

impl StoreHandle for RedbHandle {
    fn fetch(&self, key: &[u8]) -> Result<Option<Vec<u8>>> {
        check_key(key)?;
        let txn = self
            .db
            .begin_read()
            .map_err(|e| CacheError::backend(NAME, "begin read transaction", e))?;
        let table = txn
            .open_table(HEADERS)
            .map_err(|e| CacheError::backend(NAME, "open table", e))?;

        let stored = table
            .get(key)
            .map_err(|e| CacheError::backend(NAME, "fetch", e))?;

        match stored {
            Some(guard) => unpack(key, guard.value()).map(Some),
            None => Ok(None),
        }
    }

    fn store(&mut self, key: &[u8], value: &[u8]) -> Result<()> {
        check_key(key)?;
        let packed = pack(ValueCodec::Deflate, &self.compression, value)?;

        let txn = self
            .db
            .begin_write()
            .map_err(|e| CacheError::backend(NAME, "begin write transaction", e))?;
        {
            let mut table = txn
                .open_table(HEADERS)
                .map_err(|e| CacheError::backend(NAME, "open table", e))?;
            table
                .insert(key, packed.as_slice())
                .map_err(|e| CacheError::backend(NAME, "store", e))?;
        }
        txn.commit()
            .map_err(|e| CacheError::backend(NAME, "commit", e))
    }

    fn delete(&mut self, key: &[u8]) -> Result<()> {
        check_key(key)?;
        let txn = self
            .db
            .begin_write()
            .map_err(|e| CacheError::backend(NAME, "begin write transaction", e))?;
        {
            let mut table = txn
                .open_table(HEADERS)
                .map_err(|e| CacheError::backend(NAME, "open table", e))?;
            table
                .remove(key)
                .map_err(|e| CacheError::backend(NAME, "delete", e))?;
        }
        txn.commit()
            .map_err(|e| CacheError::backend(NAME, "commit", e))
    }

    fn close(self: Box<Self>) -> Result<()> {
        drop(self);
        Ok(())
    }
}
