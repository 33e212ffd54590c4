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

//! Apply (or defer) an `m.room.redaction`'s effect on its target event.
//!
//! Redaction clears a message's content while leaving its order slot and
//! identity intact, so the timeline doesn't shift underneath anything
//! already pointing at that index — matching `message_buffer_redact`'s
//! contract of deleting by a contiguous run of matching pointers rather
//! than renumbering. If the target hasn't been saved yet, the redaction is
//! recorded in `pending_redactions` and applied the moment the target
//! arrives (§9).

use ruma::OwnedRoomId;

use super::stores::room;
use super::Cache;
use crate::error::CacheError;
use crate::kv::{room_db_name, StoreFlags, WriteTxn};

/// Clear a redacted event's content in place, keeping its envelope
/// (`event_id`, `sender`, `type`, `origin_server_ts`, `state_key`) intact.
fn redact_envelope(mut envelope: serde_json::Value) -> serde_json::Value {
    if let Some(obj) = envelope.as_object_mut() {
        obj.insert("content".to_owned(), serde_json::json!({}));
        obj.insert("unsigned".to_owned(), serde_json::json!({ "redacted_because": true }));
    }
    envelope
}

/// Apply `redacts` immediately if it has already been saved in this room,
/// returning its order slot; otherwise record the redaction as pending and
/// return `None`.
pub(super) fn apply_or_defer(
    cache: &Cache,
    wtxn: &mut WriteTxn<'_>,
    room_id: &OwnedRoomId,
    redacts: &str,
) -> Result<Option<u64>, CacheError> {
    let event_to_order = cache.env.open_store(
        wtxn,
        &room_db_name(room_id.as_str(), room::EVENT_TO_ORDER),
        StoreFlags::default(),
    )?;

    let Some(order_bytes) = event_to_order.get(wtxn, redacts)? else {
        record_pending(cache, wtxn, room_id, redacts)?;
        return Ok(None);
    };

    let order = u64::from_ne_bytes(order_bytes.try_into().expect("stored as 8 bytes"));
    redact_in_place(cache, wtxn, room_id, redacts)?;
    Ok(Some(order))
}

/// Called right after a new event is saved, to pick up any redaction that
/// arrived before it.
pub(super) fn apply_pending_if_any(
    cache: &Cache,
    wtxn: &mut WriteTxn<'_>,
    room_id: &OwnedRoomId,
    event_id: &str,
) -> Result<bool, CacheError> {
    let pending = cache.env.open_store(
        wtxn,
        &room_db_name(room_id.as_str(), room::PENDING_REDACTIONS),
        StoreFlags::default(),
    )?;

    if pending.get(wtxn, event_id)?.is_none() {
        return Ok(false);
    }

    redact_in_place(cache, wtxn, room_id, event_id)?;

    let pending = cache.env.open_store(
        wtxn,
        &room_db_name(room_id.as_str(), room::PENDING_REDACTIONS),
        StoreFlags::default(),
    )?;
    pending.delete(wtxn, event_id)?;
    Ok(true)
}

fn record_pending(cache: &Cache, wtxn: &mut WriteTxn<'_>, room_id: &OwnedRoomId, redacts: &str) -> Result<(), CacheError> {
    let pending = cache.env.open_store(
        wtxn,
        &room_db_name(room_id.as_str(), room::PENDING_REDACTIONS),
        StoreFlags::default(),
    )?;
    tracing::debug!(room = %room_id, target = redacts, "redaction target not yet seen, deferring");
    let _ = pending.put(wtxn, redacts, b"1", false);
    Ok(())
}

fn redact_in_place(cache: &Cache, wtxn: &mut WriteTxn<'_>, room_id: &OwnedRoomId, event_id: &str) -> Result<(), CacheError> {
    let events = cache.env.open_store(wtxn, &room_db_name(room_id.as_str(), room::EVENTS), StoreFlags::default())?;

    let Some(raw) = events.get(wtxn, event_id)? else {
        return Ok(());
    };

    let envelope: serde_json::Value = serde_json::from_slice(&raw)
        .map_err(|e| CacheError::CorruptJson(format!("{room_id}/events/{event_id}"), e))?;
    let redacted = redact_envelope(envelope);
    let body = serde_json::to_vec(&redacted).expect("Value serializes");

    // Overwrite: this is the one place a plain put (not NO_OVERWRITE) is
    // correct, since the whole point is to replace the existing entry.
    let events = cache.env.open_store(wtxn, &room_db_name(room_id.as_str(), room::EVENTS), StoreFlags::default())?;
    events.put(wtxn, event_id, &body, false)?;
    tracing::info!(room = %room_id, target = event_id, "redacted event");
    Ok(())
}
