//! RocksDB-backed sequence for Rekey.

use std::path::Path;
use std::sync::{Mutex, PoisonError};

use log::debug;
use rekey_core::Sequence;
use rocksdb::{DB, Options};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum RocksError {
    #[error("RocksDB error: {0}")]
    Db(#[from] rocksdb::Error),
    #[error("counter {0:?} does not hold an 8-byte value")]
    CorruptCounter(String),
    #[error("counter {0:?} is exhausted")]
    Exhausted(String),
}

/// A persistent sequence backed by RocksDB.
///
/// Each counter is stored under its name as a big-endian `u64`.
pub struct RocksSequence {
    db: DB,
    // Serializes read-modify-write of counters.
    lock: Mutex<()>,
}

impl RocksSequence {
    /// Opens a RocksDB sequence at the given path.
    ///
    /// Creates the database if it doesn't exist.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, RocksError> {
        let mut opts = Options::default();
        opts.create_if_missing(true);
        let db = DB::open(&opts, path)?;
        Ok(Self {
            db,
            lock: Mutex::new(()),
        })
    }

    /// Returns the last value issued under `name`, if any.
    pub fn current(&self, name: &str) -> Result<Option<u64>, RocksError> {
        match self.db.get_pinned(name.as_bytes())? {
            Some(bytes) => decode(name, &bytes).map(Some),
            None => Ok(None),
        }
    }
}

fn decode(name: &str, bytes: &[u8]) -> Result<u64, RocksError> {
    let bytes: [u8; 8] = bytes
        .try_into()
        .map_err(|_| RocksError::CorruptCounter(name.to_string()))?;
    Ok(u64::from_be_bytes(bytes))
}

impl Sequence for RocksSequence {
    type Error = RocksError;

    fn next(&self, name: &str, floor: u64) -> Result<u64, Self::Error> {
        let _guard = self.lock.lock().unwrap_or_else(PoisonError::into_inner);
        let last = self.current(name)?.unwrap_or(0);
        let value = last
            .max(floor)
            .checked_add(1)
            .ok_or_else(|| RocksError::Exhausted(name.to_string()))?;
        self.db.put(name.as_bytes(), value.to_be_bytes())?;
        debug!("sequence {name} advanced to {value}");
        Ok(value)
    }
}
