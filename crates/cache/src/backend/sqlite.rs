//! SQLite engine through `rusqlite`
//!
//! One `headers` table keyed by BLOB. The page size hint is applied when
//! the database file is created; SQLite ignores it afterwards.

use super::compression::{pack, unpack, ValueCodec};
use super::{check_key, BackendOptions, CompressionConfig, StoreBackend, StoreHandle};
use crate::errors::{CacheError, Result};
use rusqlite::{params, Connection, OptionalExtension};
use std::path::Path;

const NAME: &str = "sqlite";

/// Schema DDL run on open.
const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS headers (
    key BLOB PRIMARY KEY NOT NULL,
    value BLOB NOT NULL
) WITHOUT ROWID;
";

/// The SQLite storage engine
#[derive(Debug, Clone, Copy, Default)]
pub struct SqliteBackend;

impl StoreBackend for SqliteBackend {
    fn name(&self) -> &'static str {
        NAME
    }

    fn identify(&self) -> String {
        format!("sqlite {}", rusqlite::version())
    }

    fn open(&self, path: &Path, options: &BackendOptions) -> Result<Box<dyn StoreHandle>> {
        let created = !path.exists();

        let conn = Connection::open(path).map_err(|e| CacheError::backend(NAME, "open database", e))?;
        conn.busy_timeout(options.lock_timeout)
            .map_err(|e| CacheError::backend(NAME, "set busy timeout", e))?;

        if created {
            conn.pragma_update(None, "page_size", options.page_size)
                .map_err(|e| CacheError::backend(NAME, "set page size", e))?;
        }

        conn.execute_batch(SCHEMA)
            .map_err(|e| CacheError::backend(NAME, "create schema", e))?;

        tracing::debug!(
            "Opened sqlite header cache {} (created: {})",
            path.display(),
            created
        );

        Ok(Box::new(SqliteHandle {
            conn,
            compression: options.compression,
        }))
    }
}

struct SqliteHandle {
    conn: Connection,
    compression: CompressionConfig,
}

impl StoreHandle for SqliteHandle {
    fn fetch(&self, key: &[u8]) -> Result<Option<Vec<u8>>> {
        check_key(key)?;
        let stored: Option<Vec<u8>> = self
            .conn
            .query_row("SELECT value FROM headers WHERE key = ?1", [key], |row| {
                row.get(0)
            })
            .optional()
            .map_err(|e| CacheError::backend(NAME, "fetch", e))?;

        stored.map(|value| unpack(key, &value)).transpose()
    }

    fn store(&mut self, key: &[u8], value: &[u8]) -> Result<()> {
        check_key(key)?;
        let packed = pack(ValueCodec::Zstd, &self.compression, value)?;

        self.conn
            .execute(
                "INSERT OR REPLACE INTO headers (key, value) VALUES (?1, ?2)",
                params![key, packed],
            )
            .map_err(|e| CacheError::backend(NAME, "store", e))?;
        Ok(())
    }

    fn delete(&mut self, key: &[u8]) -> Result<()> {
        check_key(key)?;
        self.conn
            .execute("DELETE FROM headers WHERE key = ?1", [key])
            .map_err(|e| CacheError::backend(NAME, "delete", e))?;
        Ok(())
    }

    fn close(self: Box<Self>) -> Result<()> {
        self.conn
            .close()
            .map_err(|(_, e)| CacheError::backend(NAME, "close", e))
    }
}
