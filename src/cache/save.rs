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

//! Idempotent event persistence and per-room ordering (§4.C).
//!
//! A room's order space is a single `u64` line seeded at `u64::MAX / 2` the
//! first time the room is touched, so forward-fill (`index += 1`) and
//! backfill (`index -= 1`) both have room to run for a very long time
//! without colliding, matching `cache_save_txn_init` in the source.

use ruma::OwnedRoomId;

use super::spaces::{DeferredSpaceEvent, SpaceRelationKind};
use super::stores::room;
use super::Cache;
use crate::codec::{StateContent, SyncEvent, TimelineContent};
use crate::error::CacheError;
use crate::kv::{room_db_name, StoreFlags, WriteTxn};

/// Outcome of [`SaveTxn::save_event`].
#[derive(Debug)]
pub enum SaveOutcome {
    /// The event was new and has been written at `order`. `redacted_order`
    /// is set when this event was an `m.room.redaction` whose target had
    /// already been saved, for callers that mirror the cache into an
    /// in-memory timeline and need to mark that slot redacted too.
    Saved { order: u64, redacted_order: Option<u64> },
    /// The event was already present (by `event_id`); nothing changed.
    Ignored,
    /// A space relation event was recorded for later two-phase resolution;
    /// see [`crate::cache::spaces`].
    Deferred,
}

/// The result of saving an `m.room.redaction` event, layered on top of
/// [`SaveOutcome`] since a redaction both occupies its own timeline slot
/// and (usually) mutates an earlier one.
#[derive(Debug)]
pub struct RedactionResult {
    pub outcome: SaveOutcome,
    /// The order slot of the event that was redacted in place, if the
    /// target had already been saved.
    pub redacted_order: Option<u64>,
}

/// A single room's write transaction, bundling the room's monotonic order
/// counter with the underlying [`WriteTxn`]. Forward-fill calls bump the
/// counter before writing; backfill calls decrement it.
pub struct SaveTxn<'a, 'env> {
    cache: &'a Cache,
    wtxn: &'a mut WriteTxn<'env>,
    room_id: OwnedRoomId,
    next_forward: u64,
    next_backward: u64,
    pub(super) deferred: Vec<DeferredSpaceEvent>,
}

/// Order space starts in the middle of `u64` so forward-fill and backfill
/// both have effectively unbounded room to run, matching `ORDER_START` in
/// `cache_save_txn_init`.
const ORDER_START: u64 = u64::MAX / 2;

impl<'a, 'env> SaveTxn<'a, 'env> {
    pub(super) fn open(cache: &'a Cache, wtxn: &'a mut WriteTxn<'env>, room_id: OwnedRoomId) -> Result<Self, CacheError> {
        let order_to_event = cache.env.open_store(
            wtxn,
            &room_db_name(room_id.as_str(), room::ORDER_TO_EVENT),
            super::stores::flags_for(room::ORDER_TO_EVENT),
        )?;

        let (next_forward, next_backward) = match order_to_event.last_u64(wtxn)? {
            Some((highest, _)) => (highest + 1, highest.saturating_sub(1)),
            None => (ORDER_START + 1, ORDER_START - 1),
        };

        Ok(SaveTxn { cache, wtxn, room_id, next_forward, next_backward, deferred: Vec::new() })
    }

    /// Save one event. Idempotent: saving the same `event_id` twice always
    /// returns `Ignored` on the second call.
    pub fn save_event(&mut self, event: &SyncEvent, backfill: bool) -> Result<SaveOutcome, CacheError> {
        if let SyncEvent::Timeline(timeline) = event {
            if let TimelineContent::Redaction { redacts } = &timeline.content {
                let result = self.save_redaction(timeline, redacts.as_str(), backfill)?;
                return Ok(match result.outcome {
                    SaveOutcome::Saved { order, .. } => SaveOutcome::Saved { order, redacted_order: result.redacted_order },
                    other => other,
                });
            }
        }

        let event_id = event.event_id().expect("ephemeral events are never passed to save_event").as_str();
        let order = if backfill {
            let order = self.next_backward;
            self.next_backward = self.next_backward.saturating_sub(1);
            order
        } else {
            let order = self.next_forward;
            self.next_forward += 1;
            order
        };

        match self.put_event_at(event_id, event, order)? {
            true => {}
            false => return Ok(SaveOutcome::Ignored),
        }

        if let SyncEvent::State(state) = event {
            self.save_state_side_effects(state)?;
        }

        Ok(SaveOutcome::Saved { order, redacted_order: None })
    }

    /// The space relation events accumulated by [`Self::save_event`] so
    /// far, for the caller to resolve in a fresh transaction via
    /// [`super::Cache::resolve_deferred`] once this one commits.
    pub fn take_deferred(&mut self) -> Vec<DeferredSpaceEvent> {
        std::mem::take(&mut self.deferred)
    }

    fn save_redaction(
        &mut self,
        timeline: &crate::codec::TimelineEvent,
        redacts: &str,
        backfill: bool,
    ) -> Result<RedactionResult, CacheError> {
        let event_id = timeline.base.event_id.as_str();

        let order = if backfill {
            let order = self.next_backward;
            self.next_backward = self.next_backward.saturating_sub(1);
            order
        } else {
            let order = self.next_forward;
            self.next_forward += 1;
            order
        };

        let wrapped = SyncEvent::Timeline(timeline.clone());
        if !self.put_event_at(event_id, &wrapped, order)? {
            return Ok(RedactionResult { outcome: SaveOutcome::Ignored, redacted_order: None });
        }

        let redacted_order = super::redaction::apply_or_defer(self.cache, self.wtxn, &self.room_id, redacts)?;

        Ok(RedactionResult { outcome: SaveOutcome::Saved { order, redacted_order: None }, redacted_order })
    }

    /// Write the event body and both order indexes. Returns `false` if the
    /// event was already present (the `events` store's `NO_OVERWRITE` put
    /// collided).
    ///
    /// The stored body is the event's own JSON envelope (id, sender,
    /// timestamp, type, optional `state_key`, and `content`), not a
    /// serialization of [`SyncEvent`] — the cache stores exactly what it
    /// would need to hand back over the wire, matching `save_json_with_index`
    /// storing the original `cJSON` node.
    fn put_event_at(&mut self, event_id: &str, event: &SyncEvent, order: u64) -> Result<bool, CacheError> {
        let events = self.cache.env.open_store(
            self.wtxn,
            &room_db_name(self.room_id.as_str(), room::EVENTS),
            StoreFlags::default(),
        )?;
        let order_to_event = self.cache.env.open_store(
            self.wtxn,
            &room_db_name(self.room_id.as_str(), room::ORDER_TO_EVENT),
            super::stores::flags_for(room::ORDER_TO_EVENT),
        )?;
        let event_to_order = self.cache.env.open_store(
            self.wtxn,
            &room_db_name(self.room_id.as_str(), room::EVENT_TO_ORDER),
            super::stores::flags_for(room::EVENT_TO_ORDER),
        )?;

        let envelope = event_envelope(event);
        let body = serde_json::to_vec(&envelope).expect("Value serializes");

        match events.put(self.wtxn, event_id, &body, true) {
            Ok(()) => {}
            Err(err) if err.is_recoverable() => return Ok(false),
            Err(err) => return Err(err.into()),
        }

        order_to_event.put_u64(self.wtxn, order, event_id.as_bytes())?;
        event_to_order.put(self.wtxn, event_id, &order.to_ne_bytes(), false)?;

        super::redaction::apply_pending_if_any(self.cache, self.wtxn, &self.room_id, event_id)?;

        Ok(true)
    }

    fn save_state_side_effects(&mut self, state: &crate::codec::StateEvent) -> Result<(), CacheError> {
        match &state.content {
            StateContent::Member { .. } => {
                let members = self.cache.env.open_store(
                    self.wtxn,
                    &room_db_name(self.room_id.as_str(), room::MEMBERS),
                    StoreFlags::default(),
                )?;
                let body = serde_json::to_vec(&state.raw_content).expect("Value serializes");
                members.put(self.wtxn, &state.state_key, &body, false)?;
            }
            StateContent::SpaceChild { via } => {
                self.save_typed_state(state)?;
                self.deferred.push(DeferredSpaceEvent {
                    kind: SpaceRelationKind::Child,
                    parent_id: self.room_id.clone(),
                    child_id: ruma::RoomId::parse(&state.state_key)
                        .map_err(|_| {
                            crate::error::CodecError::MalformedContent(format!(
                                "m.space.child state_key is not a room id: {}",
                                state.state_key
                            ))
                        })?
                        .to_owned(),
                    via_was_null: via.is_none(),
                });
            }
            StateContent::SpaceParent { via } => {
                self.save_typed_state(state)?;
                self.deferred.push(DeferredSpaceEvent {
                    kind: SpaceRelationKind::Parent,
                    parent_id: ruma::RoomId::parse(&state.state_key)
                        .map_err(|_| {
                            crate::error::CodecError::MalformedContent(format!(
                                "m.space.parent state_key is not a room id: {}",
                                state.state_key
                            ))
                        })?
                        .to_owned(),
                    child_id: self.room_id.clone(),
                    via_was_null: via.is_none(),
                });
            }
            _ => self.save_typed_state(state)?,
        }
        Ok(())
    }

    fn save_typed_state(&mut self, state: &crate::codec::StateEvent) -> Result<(), CacheError> {
        let key = format!("{}/{}", state.base.event_type, state.state_key);
        let store = self.cache.env.open_store(
            self.wtxn,
            &room_db_name(self.room_id.as_str(), room::STATE),
            StoreFlags::default(),
        )?;
        let body = serde_json::to_vec(&state.raw_content).expect("Value serializes");
        store.put(self.wtxn, &key, &body, false)?;
        Ok(())
    }
}

/// Build the JSON envelope persisted for one event.
fn event_envelope(event: &SyncEvent) -> serde_json::Value {
    let (base, state_key, raw_content) = match event {
        SyncEvent::Ephemeral(_) => unreachable!("ephemeral events are never saved"),
        SyncEvent::State(state) => (&state.base, Some(state.state_key.as_str()), &state.raw_content),
        SyncEvent::Timeline(timeline) => (&timeline.base, None, &timeline.raw_content),
    };

    let mut envelope = serde_json::json!({
        "event_id": base.event_id.as_str(),
        "sender": base.sender.as_str(),
        "origin_server_ts": base.origin_server_ts.get(),
        "type": base.event_type,
        "content": raw_content,
    });

    if let Some(state_key) = state_key {
        envelope
            .as_object_mut()
            .expect("constructed as an object above")
            .insert("state_key".to_owned(), serde_json::Value::String(state_key.to_owned()));
    }

    envelope
}
