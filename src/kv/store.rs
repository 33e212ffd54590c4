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

//! A single named sub-database, keyed either by string or by native u64.

use heed::types::{Bytes, Str, U64};
use heed::byteorder::NativeEndian;
use heed::PutFlags;

use super::txn::WriteTxn;
use crate::error::KvError;

type StrDb = heed::Database<Str, Bytes>;
type U64Db = heed::Database<U64<NativeEndian>, Bytes>;

/// Flags controlling how a sub-database is opened, mirroring the source's
/// `room_db_flags`/`db_flags` tables (`MDB_DUPSORT`, `MDB_INTEGERKEY`).
#[derive(Clone, Copy, Debug, Default)]
pub struct StoreFlags {
    /// Allow multiple values per key, sorted (`MDB_DUPSORT`).
    pub dup_sort: bool,
    /// Keys are native-endian `u64` rather than strings (`MDB_INTEGERKEY`).
    pub integer_key: bool,
}

enum Inner {
    Str(StrDb),
    U64(U64Db),
}

/// A named sub-database, opened with [`Env::open_store`](super::Env::open_store).
pub struct Store {
    inner: Inner,
}

impl Store {
    pub(super) fn open(
        env: &heed::Env,
        wtxn: &mut WriteTxn<'_>,
        name: &str,
        flags: StoreFlags,
    ) -> Result<Self, KvError> {
        let inner = if flags.integer_key {
            let mut builder = env.database_options().types::<U64<NativeEndian>, Bytes>();
            if flags.dup_sort {
                builder = builder.flags(heed::DatabaseFlags::DUP_SORT);
            }
            let db: U64Db = builder
                .name(name)
                .create(&mut wtxn.inner)
                .map_err(KvError::fatal_backend)?;
            Inner::U64(db)
        } else {
            let mut builder = env.database_options().types::<Str, Bytes>();
            if flags.dup_sort {
                builder = builder.flags(heed::DatabaseFlags::DUP_SORT);
            }
            let db: StrDb = builder
                .name(name)
                .create(&mut wtxn.inner)
                .map_err(KvError::fatal_backend)?;
            Inner::Str(db)
        };

        Ok(Store { inner })
    }

    pub(super) fn open_ro(
        env: &heed::Env,
        rtxn: &heed::RoTxn<'_>,
        name: &str,
        flags: StoreFlags,
    ) -> Result<Option<Self>, KvError> {
        let inner = if flags.integer_key {
            env.open_database::<U64<NativeEndian>, Bytes>(rtxn, Some(name))
                .map_err(KvError::fatal_backend)?
                .map(Inner::U64)
        } else {
            env.open_database::<Str, Bytes>(rtxn, Some(name))
                .map_err(KvError::fatal_backend)?
                .map(Inner::Str)
        };

        Ok(inner.map(|inner| Store { inner }))
    }

    /// Look up a string-keyed value.
    pub fn get(&self, rtxn: &heed::RoTxn<'_>, key: &str) -> Result<Option<Vec<u8>>, KvError> {
        let Inner::Str(db) = &self.inner else {
            panic!("get(&str) called on an integer-keyed store");
        };
        db.get(rtxn, key)
            .map(|v| v.map(<[u8]>::to_vec))
            .map_err(KvError::fatal_backend)
    }

    /// Look up a `u64`-keyed value.
    pub fn get_u64(&self, rtxn: &heed::RoTxn<'_>, key: u64) -> Result<Option<Vec<u8>>, KvError> {
        let Inner::U64(db) = &self.inner else {
            panic!("get_u64 called on a string-keyed store");
        };
        db.get(rtxn, &key)
            .map(|v| v.map(<[u8]>::to_vec))
            .map_err(KvError::fatal_backend)
    }

    /// Put a string-keyed value, optionally refusing to overwrite an
    /// existing key or an existing (key, value) pair.
    pub fn put(&self, wtxn: &mut WriteTxn<'_>, key: &str, value: &[u8], no_overwrite: bool) -> Result<(), KvError> {
        let Inner::Str(db) = &self.inner else {
            panic!("put(&str) called on an integer-keyed store");
        };
        let flags = if no_overwrite { PutFlags::NO_OVERWRITE } else { PutFlags::empty() };
        db.put_with_flags(&mut wtxn.inner, flags, key, value)
            .map_err(|err| match err {
                heed::Error::Mdb(heed::MdbError::KeyExist) => KvError::KeyExists,
                other => KvError::fatal_backend(other),
            })
    }

    /// Put a `u64`-keyed value.
    pub fn put_u64(&self, wtxn: &mut WriteTxn<'_>, key: u64, value: &[u8]) -> Result<(), KvError> {
        let Inner::U64(db) = &self.inner else {
            panic!("put_u64 called on a string-keyed store");
        };
        db.put(&mut wtxn.inner, &key, value).map_err(KvError::fatal_backend)
    }

    /// Insert into a `DUP_SORT` store, without overwriting an existing
    /// identical (key, value) pair.
    pub fn put_dup(&self, wtxn: &mut WriteTxn<'_>, key: &str, value: &str) -> Result<bool, KvError> {
        let Inner::Str(db) = &self.inner else {
            panic!("put_dup called on an integer-keyed store");
        };
        match db.put_with_flags(&mut wtxn.inner, PutFlags::NO_DUP_DATA, key, value.as_bytes()) {
            Ok(()) => Ok(true),
            Err(heed::Error::Mdb(heed::MdbError::KeyExist)) => Ok(false),
            Err(other) => Err(KvError::fatal_backend(other)),
        }
    }

    /// Delete a string-keyed entry outright (not a `DUP_SORT` store).
    pub fn delete(&self, wtxn: &mut WriteTxn<'_>, key: &str) -> Result<bool, KvError> {
        let Inner::Str(db) = &self.inner else {
            panic!("delete(&str) called on an integer-keyed store");
        };
        db.delete(&mut wtxn.inner, key).map_err(KvError::fatal_backend)
    }

    /// Delete a specific (key, value) pair from a `DUP_SORT` store.
    pub fn del_dup(&self, wtxn: &mut WriteTxn<'_>, key: &str, value: &str) -> Result<bool, KvError> {
        let Inner::Str(db) = &self.inner else {
            panic!("del_dup called on an integer-keyed store");
        };
        db.delete_one_duplicate(&mut wtxn.inner, key, value.as_bytes())
            .map_err(KvError::fatal_backend)
    }

    /// Iterate all duplicate values for `key` in a `DUP_SORT` store
    /// (`MDB_FIRST_DUP`/`MDB_NEXT_DUP`).
    pub fn iter_dup(&self, rtxn: &heed::RoTxn<'_>, key: &str) -> Result<Vec<Vec<u8>>, KvError> {
        let Inner::Str(db) = &self.inner else {
            panic!("iter_dup called on an integer-keyed store");
        };
        let Some(iter) = db.get_duplicates(rtxn, key).map_err(KvError::fatal_backend)? else {
            return Ok(Vec::new());
        };
        iter.map(|entry| entry.map(|(_, v)| v.to_vec()).map_err(KvError::fatal_backend))
            .collect()
    }

    /// The last (key, value) pair in iteration order, i.e. the highest
    /// string key / greatest `u64` key (`MDB_LAST`).
    pub fn last_u64(&self, rtxn: &heed::RoTxn<'_>) -> Result<Option<(u64, Vec<u8>)>, KvError> {
        let Inner::U64(db) = &self.inner else {
            panic!("last_u64 called on a string-keyed store");
        };
        db.last(rtxn)
            .map(|entry| entry.map(|(k, v)| (k, v.to_vec())))
            .map_err(KvError::fatal_backend)
    }

    /// Forward iterator over all (string key, value) pairs, in key order.
    pub fn iter(&self, rtxn: &heed::RoTxn<'_>) -> Result<Vec<(String, Vec<u8>)>, KvError> {
        let Inner::Str(db) = &self.inner else {
            panic!("iter called on an integer-keyed store");
        };
        db.iter(rtxn)
            .map_err(KvError::fatal_backend)?
            .map(|entry| entry.map(|(k, v)| (k.to_owned(), v.to_vec())).map_err(KvError::fatal_backend))
            .collect()
    }

    /// Reverse iterator over `u64`-keyed (key, value) pairs, newest first,
    /// starting at or before `end_index` (or from the very end if
    /// `end_index` is `None`), matching `cache_iterator_events`'
    /// `MDB_SET`/`MDB_LAST` positioning followed by `MDB_PREV` walks.
    pub fn rev_iter_u64_from(&self, rtxn: &heed::RoTxn<'_>, end_index: Option<u64>) -> Result<Vec<(u64, Vec<u8>)>, KvError> {
        let Inner::U64(db) = &self.inner else {
            panic!("rev_iter_u64_from called on a string-keyed store");
        };
        let mut out = Vec::new();
        let rev = match end_index {
            Some(end) => db.rev_range(rtxn, &(..=end)).map_err(KvError::fatal_backend)?,
            None => db.rev_iter(rtxn).map_err(KvError::fatal_backend)?,
        };
        for entry in rev {
            let (k, v) = entry.map_err(KvError::fatal_backend)?;
            out.push((k, v.to_vec()));
        }
        Ok(out)
    }
}
