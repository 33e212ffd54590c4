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

//! Deferred two-phase resolution of `m.space.child`/`m.space.parent`
//! relations (§4.C).
//!
//! `m.space.child` and `m.space.parent` arrive independently and possibly
//! out of order, so `save_event` never mutates the global `space_children`
//! relation directly. It appends a [`DeferredSpaceEvent`] to the write
//! transaction's deferred list instead; the sync driver resolves each one
//! in a fresh, short transaction via [`Cache::process_deferred`] after the
//! main transaction has committed. A crash between the two leaves only
//! orphaned per-room `space_child`/`space_parent` records, which are
//! reconcilable on the next boot (§9).

use ruma::OwnedRoomId;

use super::Cache;
use crate::cache::stores::{global, room};
use crate::error::CacheError;
use crate::kv::StoreFlags;

/// Which side of the relation a deferred event represents.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SpaceRelationKind {
    Child,
    Parent,
}

/// A space relation awaiting resolution after the main transaction commits.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DeferredSpaceEvent {
    pub kind: SpaceRelationKind,
    pub parent_id: OwnedRoomId,
    pub child_id: OwnedRoomId,
    /// True when this event's own `via` was null/absent — i.e. it may be
    /// tearing the relation down rather than establishing it.
    pub via_was_null: bool,
}

/// Outcome of resolving one [`DeferredSpaceEvent`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DeferredOutcome {
    Added,
    Removed,
    Failed,
}

impl Cache {
    /// Resolve one deferred space relation event. Must be called in a
    /// fresh transaction after the transaction that produced it has
    /// committed (§4.E step 5).
    pub fn process_deferred(&self, deferred: &DeferredSpaceEvent) -> Result<DeferredOutcome, CacheError> {
        let mut wtxn = self.env.begin_rw()?;

        let outcome = match deferred.kind {
            SpaceRelationKind::Child => self.process_deferred_child(&mut wtxn, deferred)?,
            SpaceRelationKind::Parent => self.process_deferred_parent(&mut wtxn, deferred)?,
        };

        wtxn.commit()?;
        Ok(outcome)
    }

    fn process_deferred_child(
        &self,
        wtxn: &mut crate::kv::WriteTxn<'_>,
        deferred: &DeferredSpaceEvent,
    ) -> Result<DeferredOutcome, CacheError> {
        if !self.room_is_space_in_txn(wtxn, &deferred.parent_id)? {
            tracing::warn!(parent = %deferred.parent_id, child = %deferred.child_id, "child added to non-space room, ignoring");
            return Ok(DeferredOutcome::Failed);
        }

        if deferred.via_was_null {
            // Neither side should have a non-null `via` for the relation
            // to be considered broken.
            let parent_has_via = self.space_parent_via(wtxn, &deferred.child_id, &deferred.parent_id)?;

            if parent_has_via {
                return Ok(DeferredOutcome::Failed);
            }

            let children = self.env.open_store(
                wtxn,
                global::SPACE_CHILDREN,
                flags_for_store(global::SPACE_CHILDREN),
            )?;
            let removed = children.del_dup(wtxn, deferred.parent_id.as_str(), deferred.child_id.as_str())?;

            return Ok(if removed {
                tracing::info!(parent = %deferred.parent_id, child = %deferred.child_id, "removed space child");
                DeferredOutcome::Removed
            } else {
                DeferredOutcome::Failed
            });
        }

        let children = self.env.open_store(wtxn, global::SPACE_CHILDREN, flags_for_store(global::SPACE_CHILDREN))?;
        let added = children.put_dup(wtxn, deferred.parent_id.as_str(), deferred.child_id.as_str())?;

        if added {
            tracing::info!(parent = %deferred.parent_id, child = %deferred.child_id, "added space child");
            Ok(DeferredOutcome::Added)
        } else {
            tracing::warn!(parent = %deferred.parent_id, child = %deferred.child_id, "child already present in space");
            Ok(DeferredOutcome::Failed)
        }
    }

    fn process_deferred_parent(
        &self,
        wtxn: &mut crate::kv::WriteTxn<'_>,
        deferred: &DeferredSpaceEvent,
    ) -> Result<DeferredOutcome, CacheError> {
        if !self.room_is_space_in_txn(wtxn, &deferred.parent_id)? {
            return Ok(DeferredOutcome::Failed);
        }

        // Power-level enforcement for `m.space.parent` is an explicit Open
        // Question in the design (no guessed threshold); see DESIGN.md.
        // `original_source`'s `cache_process_deferred_event` hardcodes its
        // equivalent of that check to false, so its entry gate collapses
        // to requiring the complementary `m.space.child` side to already
        // be present with a non-null `via` — and that same hardcoding
        // makes its own parent-initiated teardown branch dead code (the
        // condition inside it can never be true once the gate has
        // passed). So a `m.space.parent` event with a null `via` is a
        // no-op here too: only the `m.space.child` side can ever remove
        // the relation (see `process_deferred_child`).
        let child_has_via = self.space_child_via(wtxn, &deferred.parent_id, &deferred.child_id)?;
        if !child_has_via {
            return Ok(DeferredOutcome::Failed);
        }

        if deferred.via_was_null {
            return Ok(DeferredOutcome::Failed);
        }

        let children = self.env.open_store(wtxn, global::SPACE_CHILDREN, flags_for_store(global::SPACE_CHILDREN))?;
        let added = children.put_dup(wtxn, deferred.parent_id.as_str(), deferred.child_id.as_str())?;
        Ok(if added { DeferredOutcome::Added } else { DeferredOutcome::Failed })
    }

    /// Whether `parent_id`'s own `m.space.child` state for `child_id` still
    /// carries a non-null `via`. State events are saved keyed
    /// `"{event_type}/{state_key}"` into the per-room `state` store (see
    /// `save_typed_state`), so this reads `parent_id`'s state store rather
    /// than a dedicated space-relation store.
    fn space_child_via(&self, rtxn: &heed::RoTxn<'_>, parent_id: &OwnedRoomId, child_id: &OwnedRoomId) -> Result<bool, CacheError> {
        self.state_has_non_null_via(rtxn, parent_id.as_str(), "m.space.child", child_id.as_str())
    }

    /// Whether `child_id`'s own `m.space.parent` state for `parent_id`
    /// still carries a non-null `via`.
    fn space_parent_via(&self, rtxn: &heed::RoTxn<'_>, child_id: &OwnedRoomId, parent_id: &OwnedRoomId) -> Result<bool, CacheError> {
        self.state_has_non_null_via(rtxn, child_id.as_str(), "m.space.parent", parent_id.as_str())
    }

    fn state_has_non_null_via(&self, rtxn: &heed::RoTxn<'_>, room_id: &str, event_type: &str, state_key: &str) -> Result<bool, CacheError> {
        let name = crate::kv::room_db_name(room_id, room::STATE);
        let Some(store) = self.env.open_store_ro(rtxn, &name, StoreFlags::default())? else {
            return Ok(false);
        };
        let key = format!("{event_type}/{state_key}");
        let Some(bytes) = store.get(rtxn, &key)? else {
            return Ok(false);
        };
        let json: serde_json::Value = serde_json::from_slice(&bytes)
            .map_err(|e| CacheError::CorruptJson(format!("{room_id}/state/{key}"), e))?;
        Ok(json.get("via").map(|v| !v.is_null()).unwrap_or(false))
    }
}

fn flags_for_store(name: &str) -> StoreFlags {
    super::stores::flags_for(name)
}
