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

//! The persistent cache (§4.C): a typed façade over [`crate::kv`] holding
//! auth state, room metadata, per-room timelines, state, and members, plus
//! the deferred space-relation machinery in [`spaces`].

mod iter;
mod redaction;
mod save;
mod spaces;
mod stores;

pub use iter::RoomSummary;
pub use save::{RedactionResult, SaveOutcome, SaveTxn};
pub use spaces::{DeferredOutcome, DeferredSpaceEvent, SpaceRelationKind};
pub use stores::auth_key;

use ruma::OwnedRoomId;

use crate::error::CacheError;
use crate::kv::{room_db_name, Env, StoreFlags, WriteTxn};

/// A handle onto the persistent cache. Cheap to clone (wraps [`Env`],
/// itself a clone of a `heed::Env` handle).
#[derive(Clone)]
pub struct Cache {
    pub(crate) env: Env,
}

impl Cache {
    pub fn open(path: &std::path::Path) -> Result<Self, CacheError> {
        Ok(Cache { env: Env::open(path)? })
    }

    /// Fetch a value from the `auth` store (§6's persistent layout).
    pub fn auth_get(&self, key: &str) -> Result<Option<String>, CacheError> {
        let rtxn = self.env.begin_ro()?;
        let Some(store) = self.env.open_store_ro(&rtxn, stores::global::AUTH, StoreFlags::default())? else {
            return Ok(None);
        };
        let value = store.get(&rtxn, key)?.map(|bytes| String::from_utf8_lossy(&bytes).into_owned());
        rtxn.finish();
        Ok(value)
    }

    /// Persist a value in the `auth` store, overwriting any prior value.
    pub fn auth_set(&self, key: &str, value: &str) -> Result<(), CacheError> {
        let mut wtxn = self.env.begin_rw()?;
        let store = self.env.open_store(&mut wtxn, stores::global::AUTH, StoreFlags::default())?;
        store.put(&mut wtxn, key, value.as_bytes(), false)?;
        wtxn.commit()?;
        Ok(())
    }

    /// Record (or update) a room's presence in the global `rooms` store.
    /// `is_space` comes from that room's `m.room.create` content.
    pub fn save_room(&self, wtxn: &mut WriteTxn<'_>, room_id: &OwnedRoomId, is_space: bool) -> Result<(), CacheError> {
        let store = self.env.open_store(wtxn, stores::global::ROOMS, StoreFlags::default())?;
        let body = serde_json::to_vec(&serde_json::json!({ "is_space": is_space })).expect("Value serializes");
        store.put(wtxn, room_id.as_str(), &body, false)?;
        Ok(())
    }

    /// Begin a write transaction against the underlying environment, for
    /// callers that need to bracket multiple cache calls (e.g. a
    /// [`Self::save_txn`] followed by [`Self::save_room`]) atomically.
    pub fn begin_rw(&self) -> Result<WriteTxn<'_>, CacheError> {
        Ok(self.env.begin_rw()?)
    }

    /// Begin a save transaction for `room_id` against `wtxn`.
    pub fn save_txn<'a, 'env>(
        &'a self,
        wtxn: &'a mut WriteTxn<'env>,
        room_id: OwnedRoomId,
    ) -> Result<SaveTxn<'a, 'env>, CacheError> {
        SaveTxn::open(self, wtxn, room_id)
    }

    /// The room's `m.room.name`, falling back to its canonical alias, per
    /// `cache_room_name`.
    pub fn room_name(&self, room_id: &OwnedRoomId) -> Result<Option<String>, CacheError> {
        let rtxn = self.env.begin_ro()?;
        let Some(store) = self.env.open_store_ro(&rtxn, &room_db_name(room_id.as_str(), stores::room::STATE), StoreFlags::default())? else {
            return Ok(None);
        };

        if let Some(raw) = store.get(&rtxn, "m.room.name/")? {
            let value: serde_json::Value = serde_json::from_slice(&raw)
                .map_err(|e| CacheError::CorruptJson(format!("{room_id}/state/m.room.name"), e))?;
            if let Some(name) = value.get("name").and_then(|v| v.as_str()) {
                if !name.is_empty() {
                    return Ok(Some(name.to_owned()));
                }
            }
        }

        if let Some(raw) = store.get(&rtxn, "m.room.canonical_alias/")? {
            let value: serde_json::Value = serde_json::from_slice(&raw)
                .map_err(|e| CacheError::CorruptJson(format!("{room_id}/state/m.room.canonical_alias"), e))?;
            if let Some(alias) = value.get("alias").and_then(|v| v.as_str()) {
                return Ok(Some(alias.to_owned()));
            }
        }

        Ok(None)
    }

    /// The room's `m.room.topic`, if any, per `cache_room_topic`.
    pub fn room_topic(&self, room_id: &OwnedRoomId) -> Result<Option<String>, CacheError> {
        let rtxn = self.env.begin_ro()?;
        let Some(store) = self.env.open_store_ro(&rtxn, &room_db_name(room_id.as_str(), stores::room::STATE), StoreFlags::default())? else {
            return Ok(None);
        };
        let Some(raw) = store.get(&rtxn, "m.room.topic/")? else {
            return Ok(None);
        };
        let value: serde_json::Value = serde_json::from_slice(&raw)
            .map_err(|e| CacheError::CorruptJson(format!("{room_id}/state/m.room.topic"), e))?;
        Ok(value.get("topic").and_then(|v| v.as_str()).map(str::to_owned))
    }

    /// Whether `room_id`'s `m.room.create` content set `type: m.space`.
    pub fn room_is_space(&self, room_id: &OwnedRoomId) -> Result<bool, CacheError> {
        let rtxn = self.env.begin_ro()?;
        let is_space = self.room_is_space_in_txn(&rtxn, room_id)?;
        rtxn.finish();
        Ok(is_space)
    }

    pub(crate) fn room_is_space_in_txn(&self, rtxn: &heed::RoTxn<'_>, room_id: &OwnedRoomId) -> Result<bool, CacheError> {
        let Some(store) = self.env.open_store_ro(rtxn, stores::global::ROOMS, StoreFlags::default())? else {
            return Ok(false);
        };
        let Some(raw) = store.get(rtxn, room_id.as_str())? else {
            return Ok(false);
        };
        let value: serde_json::Value =
            serde_json::from_slice(&raw).map_err(|e| CacheError::CorruptJson(format!("rooms/{room_id}"), e))?;
        Ok(value.get("is_space").and_then(|v| v.as_bool()).unwrap_or(false))
    }

    /// Resolve every [`DeferredSpaceEvent`] a [`SaveTxn`] accumulated,
    /// each in its own short transaction, per §4.E step 5.
    pub fn resolve_deferred(&self, deferred: Vec<DeferredSpaceEvent>) -> Result<Vec<DeferredOutcome>, CacheError> {
        deferred.iter().map(|event| self.process_deferred(event)).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn open_cache() -> (tempfile::TempDir, Cache) {
        let dir = tempfile::tempdir().unwrap();
        let cache = Cache::open(dir.path()).unwrap();
        (dir, cache)
    }

    #[test]
    fn auth_roundtrip() {
        let (_dir, cache) = open_cache();
        assert_eq!(cache.auth_get(stores::auth_key::ACCESS_TOKEN).unwrap(), None);
        cache.auth_set(stores::auth_key::ACCESS_TOKEN, "tok").unwrap();
        assert_eq!(cache.auth_get(stores::auth_key::ACCESS_TOKEN).unwrap(), Some("tok".to_owned()));
    }

    #[test]
    fn save_event_is_idempotent() {
        use crate::codec::{EventBase, SyncEvent, TimelineContent, TimelineEvent};

        let (_dir, cache) = open_cache();
        let room_id = ruma::room_id!("!room:example.org").to_owned();

        let event = SyncEvent::Timeline(TimelineEvent {
            base: EventBase {
                event_id: ruma::event_id!("$1:example.org").to_owned(),
                sender: ruma::user_id!("@alice:example.org").to_owned(),
                origin_server_ts: ruma::MilliSecondsSinceUnixEpoch(1000u32.into()),
                event_type: "m.room.message".to_owned(),
            },
            content: TimelineContent::Message {
                body: "hi".to_owned(),
                msgtype: "m.text".to_owned(),
                format: None,
                formatted_body: None,
                reply_to: None,
            },
            raw_content: serde_json::json!({ "body": "hi", "msgtype": "m.text" }),
        });

        let mut wtxn = cache.env.begin_rw().unwrap();
        let mut save_txn = cache.save_txn(&mut wtxn, room_id.clone()).unwrap();
        let first = save_txn.save_event(&event, false).unwrap();
        let second = save_txn.save_event(&event, false).unwrap();
        wtxn.commit().unwrap();

        assert!(matches!(first, SaveOutcome::Saved { .. }));
        assert!(matches!(second, SaveOutcome::Ignored));

        let events = cache.event_iter(&room_id, None, 10).unwrap();
        assert_eq!(events.len(), 1);
    }

    #[test]
    fn redaction_clears_content_in_place() {
        use crate::codec::{EventBase, SyncEvent, TimelineContent, TimelineEvent};

        let (_dir, cache) = open_cache();
        let room_id = ruma::room_id!("!room:example.org").to_owned();

        let message = SyncEvent::Timeline(TimelineEvent {
            base: EventBase {
                event_id: ruma::event_id!("$1:example.org").to_owned(),
                sender: ruma::user_id!("@alice:example.org").to_owned(),
                origin_server_ts: ruma::MilliSecondsSinceUnixEpoch(1000u32.into()),
                event_type: "m.room.message".to_owned(),
            },
            content: TimelineContent::Message {
                body: "hi".to_owned(),
                msgtype: "m.text".to_owned(),
                format: None,
                formatted_body: None,
                reply_to: None,
            },
            raw_content: serde_json::json!({ "body": "hi", "msgtype": "m.text" }),
        });

        let redaction = SyncEvent::Timeline(TimelineEvent {
            base: EventBase {
                event_id: ruma::event_id!("$2:example.org").to_owned(),
                sender: ruma::user_id!("@alice:example.org").to_owned(),
                origin_server_ts: ruma::MilliSecondsSinceUnixEpoch(1001u32.into()),
                event_type: "m.room.redaction".to_owned(),
            },
            content: TimelineContent::Redaction { redacts: ruma::event_id!("$1:example.org").to_owned() },
            raw_content: serde_json::json!({}),
        });

        let mut wtxn = cache.env.begin_rw().unwrap();
        let mut save_txn = cache.save_txn(&mut wtxn, room_id.clone()).unwrap();
        save_txn.save_event(&message, false).unwrap();
        save_txn.save_event(&redaction, false).unwrap();
        wtxn.commit().unwrap();

        let events = cache.event_iter(&room_id, None, 10).unwrap();
        let redacted = events.iter().find(|(_, v)| v["event_id"] == "$1:example.org").unwrap();
        assert_eq!(redacted.1["content"], serde_json::json!({}));
    }

    #[test]
    fn redaction_before_target_is_deferred_then_applied() {
        use crate::codec::{EventBase, SyncEvent, TimelineContent, TimelineEvent};

        let (_dir, cache) = open_cache();
        let room_id = ruma::room_id!("!room:example.org").to_owned();

        let redaction = SyncEvent::Timeline(TimelineEvent {
            base: EventBase {
                event_id: ruma::event_id!("$2:example.org").to_owned(),
                sender: ruma::user_id!("@alice:example.org").to_owned(),
                origin_server_ts: ruma::MilliSecondsSinceUnixEpoch(1001u32.into()),
                event_type: "m.room.redaction".to_owned(),
            },
            content: TimelineContent::Redaction { redacts: ruma::event_id!("$1:example.org").to_owned() },
            raw_content: serde_json::json!({}),
        });
        let message = SyncEvent::Timeline(TimelineEvent {
            base: EventBase {
                event_id: ruma::event_id!("$1:example.org").to_owned(),
                sender: ruma::user_id!("@alice:example.org").to_owned(),
                origin_server_ts: ruma::MilliSecondsSinceUnixEpoch(1000u32.into()),
                event_type: "m.room.message".to_owned(),
            },
            content: TimelineContent::Message {
                body: "hi".to_owned(),
                msgtype: "m.text".to_owned(),
                format: None,
                formatted_body: None,
                reply_to: None,
            },
            raw_content: serde_json::json!({ "body": "hi", "msgtype": "m.text" }),
        });

        let mut wtxn = cache.env.begin_rw().unwrap();
        let mut save_txn = cache.save_txn(&mut wtxn, room_id.clone()).unwrap();
        save_txn.save_event(&redaction, false).unwrap();
        save_txn.save_event(&message, true).unwrap();
        wtxn.commit().unwrap();

        let events = cache.event_iter(&room_id, None, 10).unwrap();
        let target = events.iter().find(|(_, v)| v["event_id"] == "$1:example.org").unwrap();
        assert_eq!(target.1["content"], serde_json::json!({}));
    }
}
