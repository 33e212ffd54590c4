// Copyright 2026 The Matrix TUI Engine Contributors
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Typed wrapper around an ordered, ACID, memory-mapped key-value store.
//!
//! Backed by [`heed`], a safe binding over LMDB. Named sub-databases map
//! 1:1 onto LMDB named databases; `NO_OVERWRITE`/`NO_DUP_DATA` puts and
//! `DUP_SORT` cursors are exposed directly rather than re-invented. Any
//! `heed::Error` other than a not-found/key-exists condition is treated as
//! fatal by callers (see [`crate::error::KvError`]).

mod store;
mod txn;

pub use store::{Store, StoreFlags};
pub use txn::{ReadTxn, WriteTxn};

use std::path::Path;

use heed::{EnvFlags, EnvOpenOptions};

use crate::error::KvError;

/// Maximum number of named sub-databases the environment can hold.
///
/// One room contributes up to eight sub-databases (`events`,
/// `order_to_event`, `event_to_order`, `members`, `state`, `space_child`,
/// `space_parent`, plus headroom), so this bounds how many rooms a single
/// environment can track; raised well above any plausible account's room
/// count, mirroring `cache_init`'s `max_dbs = 4096` in the source this is
/// modeled on.
const MAX_DBS: u32 = 4096;

/// Default LMDB map size: 1 GiB, matching the source's `map_size`.
const DEFAULT_MAP_SIZE: usize = 1024 * 1024 * 1024;

/// A typed handle onto an LMDB environment.
///
/// Wraps [`heed::Env`] and exposes `begin_ro`/`begin_rw`/`open_store` per
/// §4.A of the design. Readers may open multiple read-only transactions
/// per thread (LMDB's `MDB_NOTLS`, which `heed` enables by default).
#[derive(Clone)]
pub struct Env {
    inner: heed::Env,
}

impl Env {
    /// Open (creating if necessary) the LMDB environment rooted at `path`.
    pub fn open(path: &Path) -> Result<Self, KvError> {
        std::fs::create_dir_all(path).map_err(|err| {
            tracing::error!(?path, %err, "failed to create store directory");
            KvError::fatal_backend(heed::Error::Io(err))
        })?;

        // SAFETY: `path` is a directory we just ensured exists and that is
        // not concurrently opened with an incompatible map size elsewhere
        // in this process; this mirrors `mdb_env_open`'s contract.
        let inner = unsafe {
            EnvOpenOptions::new()
                .map_size(DEFAULT_MAP_SIZE)
                .max_dbs(MAX_DBS)
                .flags(EnvFlags::NO_TLS)
                .open(path)
        }
        .map_err(KvError::fatal_backend)?;

        tracing::debug!(?path, "opened kv environment");
        Ok(Env { inner })
    }

    /// Begin a read-only transaction.
    pub fn begin_ro(&self) -> Result<ReadTxn<'_>, KvError> {
        let txn = self.inner.read_txn().map_err(KvError::fatal_backend)?;
        Ok(ReadTxn::new(txn))
    }

    /// Begin a read-write transaction.
    pub fn begin_rw(&self) -> Result<WriteTxn<'_>, KvError> {
        let txn = self.inner.write_txn().map_err(KvError::fatal_backend)?;
        Ok(WriteTxn::new(txn))
    }

    /// Open (creating if absent) a named sub-database with the given
    /// duplicate-key / integer-key flags. Must be called within a write
    /// transaction the first time a given `name` is seen.
    pub fn open_store(&self, wtxn: &mut WriteTxn<'_>, name: &str, flags: StoreFlags) -> Result<Store, KvError> {
        Store::open(&self.inner, wtxn, name, flags)
    }

    /// Open an already-created named sub-database for reading. Returns
    /// `Ok(None)` if the database doesn't exist yet (e.g. a room that has
    /// never had any events saved). Accepts either a [`ReadTxn`] or a
    /// [`WriteTxn`] (a write transaction can read back its own writes).
    pub fn open_store_ro(&self, rtxn: &heed::RoTxn<'_>, name: &str, flags: StoreFlags) -> Result<Option<Store>, KvError> {
        Store::open_ro(&self.inner, rtxn, name, flags)
    }
}

/// Build the LMDB sub-database name for a per-room store, matching
/// `get_dbi`'s `"<room_id>/<name>"` convention in the source.
pub fn room_db_name(room_id: &str, suffix: &str) -> String {
    format!("{room_id}/{suffix}")
}
