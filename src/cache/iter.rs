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

//! Read-side iteration over the cache (§4.C), grounded on the five
//! `cache_*_next` iterators in the source: rooms, events (newest-first,
//! bounded), members, spaces, and a space's children.
//!
//! Each iterator here opens its own short-lived read transaction and
//! collects into a `Vec` rather than holding a cursor open across calls —
//! this repository's callers (the accumulator hand-off, §4.G) always
//! consume a whole batch at once, so there's no benefit to streaming that
//! would offset the extra lifetime complexity of a live cursor type.

use ruma::{EventId, OwnedRoomId, RoomId};

use super::stores::{global, room};
use super::Cache;
use crate::error::CacheError;
use crate::kv::room_db_name;

/// One row of the `rooms` global store.
#[derive(Clone, Debug)]
pub struct RoomSummary {
    pub room_id: OwnedRoomId,
    pub is_space: bool,
}

impl Cache {
    /// All rooms the account is (or was) a member of.
    pub fn rooms_iter(&self) -> Result<Vec<RoomSummary>, CacheError> {
        let rtxn = self.env.begin_ro()?;
        let Some(store) = self.env.open_store_ro(&rtxn, global::ROOMS, Default::default())? else {
            return Ok(Vec::new());
        };

        let mut out = Vec::new();
        for (key, value) in store.iter(&rtxn)? {
            let Ok(room_id) = RoomId::parse(&key) else {
                tracing::warn!(key, "skipping malformed room id in rooms store");
                continue;
            };
            let is_space = serde_json::from_slice::<serde_json::Value>(&value)
                .ok()
                .and_then(|v| v.get("is_space").and_then(|b| b.as_bool()))
                .unwrap_or(false);
            out.push(RoomSummary { room_id: room_id.to_owned(), is_space });
        }
        rtxn.finish();
        Ok(out)
    }

    /// Events in `room_id`'s timeline, newest first, bounded to `limit`
    /// entries at or before `before` (or from the very end, if `None`).
    /// Events whose content was cleared by a redaction are still returned
    /// — callers that care about that distinction inspect the `content`
    /// field, which will be an empty object.
    pub fn event_iter(
        &self,
        room_id: &OwnedRoomId,
        before: Option<u64>,
        limit: usize,
    ) -> Result<Vec<(u64, serde_json::Value)>, CacheError> {
        let rtxn = self.env.begin_ro()?;

        let order_to_event = self.env.open_store_ro(
            &rtxn,
            &room_db_name(room_id.as_str(), room::ORDER_TO_EVENT),
            super::stores::flags_for(room::ORDER_TO_EVENT),
        )?;
        let Some(order_to_event) = order_to_event else {
            return Ok(Vec::new());
        };
        let events = self.env.open_store_ro(&rtxn, &room_db_name(room_id.as_str(), room::EVENTS), Default::default())?;
        let Some(events) = events else {
            return Ok(Vec::new());
        };

        let mut out = Vec::with_capacity(limit);
        for (order, event_id_bytes) in order_to_event.rev_iter_u64_from(&rtxn, before)? {
            if out.len() >= limit {
                break;
            }
            let event_id = String::from_utf8_lossy(&event_id_bytes).into_owned();
            let Some(raw) = events.get(&rtxn, &event_id)? else {
                tracing::warn!(room = %room_id, %event_id, "order index points at a missing event");
                continue;
            };
            let value: serde_json::Value = serde_json::from_slice(&raw)
                .map_err(|e| CacheError::CorruptJson(format!("{room_id}/events/{event_id}"), e))?;
            out.push((order, value));
        }

        rtxn.finish();
        Ok(out)
    }

    /// The order index assigned to `event_id` in `room_id`, if it has been
    /// saved, matching a `cache_event_to_order` lookup. Used to resolve a
    /// message's `index_reply` from its `m.relates_to` target.
    pub fn event_order(&self, room_id: &OwnedRoomId, event_id: &EventId) -> Result<Option<u64>, CacheError> {
        let rtxn = self.env.begin_ro()?;
        let name = room_db_name(room_id.as_str(), room::EVENT_TO_ORDER);
        let Some(store) = self.env.open_store_ro(&rtxn, &name, super::stores::flags_for(room::EVENT_TO_ORDER))? else {
            return Ok(None);
        };
        let Some(bytes) = store.get(&rtxn, event_id.as_str())? else {
            return Ok(None);
        };
        rtxn.finish();

        match <[u8; 8]>::try_from(bytes.as_slice()) {
            Ok(arr) => Ok(Some(u64::from_ne_bytes(arr))),
            Err(_) => {
                tracing::warn!(room = %room_id, %event_id, "event2order value has unexpected length");
                Ok(None)
            }
        }
    }

    /// All members recorded for `room_id`.
    pub fn member_iter(&self, room_id: &OwnedRoomId) -> Result<Vec<(String, serde_json::Value)>, CacheError> {
        let rtxn = self.env.begin_ro()?;
        let store = self.env.open_store_ro(&rtxn, &room_db_name(room_id.as_str(), room::MEMBERS), Default::default())?;
        let Some(store) = store else {
            return Ok(Vec::new());
        };

        let mut out = Vec::new();
        for (mxid, value) in store.iter(&rtxn)? {
            let parsed = serde_json::from_slice(&value)
                .map_err(|e| CacheError::CorruptJson(format!("{room_id}/members/{mxid}"), e))?;
            out.push((mxid, parsed));
        }
        rtxn.finish();
        Ok(out)
    }

    /// All rooms flagged `m.room.create`'s `type: m.space`.
    pub fn spaces_iter(&self) -> Result<Vec<OwnedRoomId>, CacheError> {
        Ok(self.rooms_iter()?.into_iter().filter(|r| r.is_space).map(|r| r.room_id).collect())
    }

    /// The children of `space_id`, in whatever order LMDB's `DUP_SORT`
    /// comparator yields them (byte order over the child room id).
    pub fn space_children_iter(&self, space_id: &OwnedRoomId) -> Result<Vec<OwnedRoomId>, CacheError> {
        let rtxn = self.env.begin_ro()?;
        let Some(store) = self.env.open_store_ro(&rtxn, global::SPACE_CHILDREN, super::stores::flags_for(global::SPACE_CHILDREN))? else {
            return Ok(Vec::new());
        };

        let mut out = Vec::new();
        for value in store.iter_dup(&rtxn, space_id.as_str())? {
            let child = String::from_utf8_lossy(&value).into_owned();
            match RoomId::parse(&child) {
                Ok(room_id) => out.push(room_id.to_owned()),
                Err(_) => tracing::warn!(space = %space_id, child, "skipping malformed child room id"),
            }
        }
        rtxn.finish();
        Ok(out)
    }
}
