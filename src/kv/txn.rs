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

//! Transaction lifetimes: `begin`, `commit`, `abort`.

use crate::error::KvError;

/// A read-only transaction. Multiple may be open per thread at once.
pub struct ReadTxn<'env> {
    pub(super) inner: heed::RoTxn<'env>,
}

impl<'env> ReadTxn<'env> {
    pub(super) fn new(inner: heed::RoTxn<'env>) -> Self {
        ReadTxn { inner }
    }

    /// Release the transaction. Read-only transactions have nothing to
    /// commit, but dropping them promptly still matters: LMDB reclaims
    /// free pages only once the oldest reader transaction has ended.
    pub fn finish(self) {
        drop(self);
    }
}

impl<'env> std::ops::Deref for ReadTxn<'env> {
    type Target = heed::RoTxn<'env>;

    fn deref(&self) -> &Self::Target {
        &self.inner
    }
}

/// A read-write transaction. Exactly one may be open at a time per
/// environment (LMDB serializes writers).
pub struct WriteTxn<'env> {
    pub(super) inner: heed::RwTxn<'env>,
}

impl<'env> WriteTxn<'env> {
    pub(super) fn new(inner: heed::RwTxn<'env>) -> Self {
        WriteTxn { inner }
    }

    /// Commit all writes made through this transaction.
    pub fn commit(self) -> Result<(), KvError> {
        self.inner.commit().map_err(KvError::fatal_backend)
    }

    /// Discard all writes made through this transaction.
    pub fn abort(self) {
        self.inner.abort();
    }
}

/// Write transactions can read back their own uncommitted writes, so any
/// function that only needs to read is written against `&heed::RoTxn` and
/// accepts either transaction kind through this `Deref` impl.
impl<'env> std::ops::Deref for WriteTxn<'env> {
    type Target = heed::RoTxn<'env>;

    fn deref(&self) -> &Self::Target {
        &self.inner
    }
}
