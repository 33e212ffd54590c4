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

//! Stepping iterators over a parsed `/sync` response.
//!
//! Grounded on `matrix_sync_room_next`/`matrix_sync_state_next`/
//! `matrix_sync_timeline_next` in `libmatrix_src/sync.c`, reworked from
//! "next pointer into a linked cJSON tree" into owned Rust iterators.

use ruma::{EventId, MilliSecondsSinceUnixEpoch, UserId};
use serde_json::Value;

use super::event::{EphemeralEvent, EventBase, StateContent, StateEvent, SyncEvent, TimelineContent, TimelineEvent};
use crate::error::CodecError;

/// Which room list (`join`/`leave`/`invite`) a room block came from.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RoomType {
    Join,
    Leave,
    Invite,
}

/// A parsed `/sync` response, not yet broken down into per-room blocks.
pub struct SyncResponse {
    pub next_batch: String,
    root: Value,
}

impl SyncResponse {
    /// Parse the top-level sync response. Fails only if the JSON is not
    /// an object or is missing `next_batch` — both conditions make the
    /// whole response unusable, unlike a single malformed event (which
    /// the per-event parser silently drops).
    pub fn parse(root: Value) -> Result<Self, CodecError> {
        if !root.is_object() {
            return Err(CodecError::NotAnObject);
        }

        let next_batch = root
            .get("next_batch")
            .and_then(Value::as_str)
            .ok_or(CodecError::MissingField("next_batch"))?
            .to_owned();

        Ok(SyncResponse { next_batch, root })
    }

    /// Step through every room block across `rooms.join`, `rooms.leave`,
    /// `rooms.invite`, yielding `(room_id, type, room_block)`.
    pub fn rooms_next(&self) -> RoomIter<'_> {
        let rooms = self.root.get("rooms");
        RoomIter {
            join: rooms.and_then(|r| r.get("join")).and_then(Value::as_object),
            leave: rooms.and_then(|r| r.get("leave")).and_then(Value::as_object),
            invite: rooms.and_then(|r| r.get("invite")).and_then(Value::as_object),
            stage: Stage::Join,
            pos: 0,
        }
    }
}

enum Stage {
    Join,
    Leave,
    Invite,
    Done,
}

/// Iterator over `(room_id, RoomType, room_block)` triples.
pub struct RoomIter<'a> {
    join: Option<&'a serde_json::Map<String, Value>>,
    leave: Option<&'a serde_json::Map<String, Value>>,
    invite: Option<&'a serde_json::Map<String, Value>>,
    stage: Stage,
    pos: usize,
}

impl<'a> Iterator for RoomIter<'a> {
    type Item = (&'a str, RoomType, &'a Value);

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let (map, ty) = match self.stage {
                Stage::Join => (self.join, RoomType::Join),
                Stage::Leave => (self.leave, RoomType::Leave),
                Stage::Invite => (self.invite, RoomType::Invite),
                Stage::Done => return None,
            };

            if let Some(map) = map {
                if let Some((id, block)) = map.iter().nth(self.pos) {
                    self.pos += 1;
                    return Some((id.as_str(), ty, block));
                }
            }

            self.pos = 0;
            self.stage = match self.stage {
                Stage::Join => Stage::Leave,
                Stage::Leave => Stage::Invite,
                Stage::Invite | Stage::Done => Stage::Done,
            };
        }
    }
}

/// Step through every ephemeral/state/timeline event in a single room
/// block, yielding one typed [`SyncEvent`] per call. Invite rooms use
/// `invite_state` in place of `state`, per §6.
pub struct EventIter<'a> {
    events: std::vec::IntoIter<(EventKind, &'a Value)>,
}

#[derive(Clone, Copy)]
enum EventKind {
    Ephemeral,
    State,
    Timeline,
}

pub fn event_next<'a>(room_block: &'a Value, room_type: RoomType) -> EventIter<'a> {
    let state_key = if room_type == RoomType::Invite { "invite_state" } else { "state" };

    let mut events = Vec::new();
    if let Some(arr) = room_block.get(state_key).and_then(|s| s.get("events")).and_then(Value::as_array) {
        events.extend(arr.iter().map(|e| (EventKind::State, e)));
    }
    if let Some(arr) = room_block.get("timeline").and_then(|t| t.get("events")).and_then(Value::as_array) {
        events.extend(arr.iter().map(|e| (EventKind::Timeline, e)));
    }
    if let Some(arr) = room_block.get("ephemeral").and_then(|t| t.get("events")).and_then(Value::as_array) {
        events.extend(arr.iter().map(|e| (EventKind::Ephemeral, e)));
    }

    EventIter { events: events.into_iter() }
}

impl<'a> Iterator for EventIter<'a> {
    type Item = SyncEvent;

    /// Returns the next recognized, well-formed event, skipping (not
    /// erroring on) malformed ones — §4.B: "An event is rejected (skipped)
    /// if it lacks `origin_server_ts`, `event_id`, `sender`, `type`, or a
    /// `content` object".
    fn next(&mut self) -> Option<Self::Item> {
        for (kind, raw) in self.events.by_ref() {
            if let Some(event) = parse_one(kind, raw) {
                return Some(event);
            }
        }
        None
    }
}

fn parse_base(raw: &Value) -> Option<EventBase> {
    let event_id = raw.get("event_id").and_then(Value::as_str)?;
    let event_id = EventId::parse(event_id).ok()?;
    let sender = raw.get("sender").and_then(Value::as_str)?;
    let sender = UserId::parse(sender).ok()?;
    let ts = raw.get("origin_server_ts").and_then(Value::as_i64)?;
    let event_type = raw.get("type").and_then(Value::as_str)?.to_owned();

    Some(EventBase {
        event_id,
        sender,
        origin_server_ts: MilliSecondsSinceUnixEpoch(ruma::UInt::try_from(ts).ok()?),
        event_type,
    })
}

fn parse_one(kind: EventKind, raw: &Value) -> Option<SyncEvent> {
    if matches!(kind, EventKind::Ephemeral) {
        let event_type = raw.get("type").and_then(Value::as_str)?.to_owned();
        let content = raw.get("content").cloned().unwrap_or(Value::Null);
        return Some(SyncEvent::Ephemeral(EphemeralEvent { event_type, content }));
    }

    let base = parse_base(raw)?;
    // A redaction is the one timeline type allowed to arrive with an
    // absent/empty `content` (it may target an event whose content has
    // already been cleared by a previous redaction); every other event
    // must have a content object.
    let content_value = raw.get("content");
    let is_redaction = base.event_type == "m.room.redaction";
    let content_value = match content_value {
        Some(v) if v.is_object() => v.clone(),
        _ if is_redaction => Value::Object(Default::default()),
        _ => return None,
    };

    match kind {
        EventKind::Ephemeral => unreachable!(),
        EventKind::State => {
            let state_key = raw.get("state_key").and_then(Value::as_str)?.to_owned();
            let content = parse_state_content(&base.event_type, &content_value)?;
            Some(SyncEvent::State(StateEvent { base, state_key, content, raw_content: content_value }))
        }
        EventKind::Timeline => {
            let content = parse_timeline_content(&base.event_type, &content_value, raw, is_redaction)?;
            Some(SyncEvent::Timeline(TimelineEvent { base, content, raw_content: content_value }))
        }
    }
}

fn get_int(content: &Value, key: &str, default: i64) -> i64 {
    content.get(key).and_then(Value::as_i64).unwrap_or(default)
}

fn parse_state_content(event_type: &str, content: &Value) -> Option<StateContent> {
    Some(match event_type {
        "m.room.member" => {
            let membership = content.get("membership").and_then(Value::as_str)?.to_owned();
            StateContent::Member {
                membership,
                displayname: content.get("displayname").and_then(Value::as_str).map(str::to_owned),
                avatar_url: content.get("avatar_url").and_then(Value::as_str).map(str::to_owned),
                is_direct: content.get("is_direct").and_then(Value::as_bool).unwrap_or(false),
            }
        }
        "m.room.power_levels" => {
            const DEFAULT_POWER: i64 = 50;
            StateContent::PowerLevels {
                ban: get_int(content, "ban", DEFAULT_POWER),
                kick: get_int(content, "kick", DEFAULT_POWER),
                invite: get_int(content, "invite", DEFAULT_POWER),
                redact: get_int(content, "redact", DEFAULT_POWER),
                state_default: get_int(content, "state_default", DEFAULT_POWER),
                events_default: get_int(content, "events_default", 0),
                users_default: get_int(content, "users_default", 0),
            }
        }
        "m.room.canonical_alias" => StateContent::CanonicalAlias {
            alias: content.get("alias").and_then(Value::as_str).map(str::to_owned),
        },
        "m.room.create" => {
            let room_version = content.get("room_version").and_then(Value::as_str).unwrap_or("1").to_owned();
            let federate = content.get("m.federate").and_then(Value::as_bool).unwrap_or(true);
            let is_space = content.get("type").and_then(Value::as_str) == Some("m.space");
            StateContent::Create {
                creator: content.get("creator").and_then(Value::as_str).map(str::to_owned),
                federate,
                room_version,
                is_space,
            }
        }
        "m.room.join_rules" => StateContent::JoinRules {
            join_rule: content.get("join_rule").and_then(Value::as_str)?.to_owned(),
        },
        "m.room.name" => StateContent::Name {
            name: content.get("name").and_then(Value::as_str)?.to_owned(),
        },
        "m.room.topic" => StateContent::Topic {
            topic: content.get("topic").and_then(Value::as_str)?.to_owned(),
        },
        "m.space.child" => StateContent::SpaceChild { via: parse_via(content) },
        "m.space.parent" => StateContent::SpaceParent { via: parse_via(content) },
        _ => StateContent::Other,
    })
}

fn parse_via(content: &Value) -> Option<Vec<String>> {
    let via = content.get("via")?;
    if via.is_null() {
        return None;
    }
    let arr = via.as_array()?;
    Some(arr.iter().filter_map(Value::as_str).map(str::to_owned).collect())
}

fn parse_timeline_content(event_type: &str, content: &Value, raw: &Value, is_redaction: bool) -> Option<TimelineContent> {
    if is_redaction {
        // `redacts` moved from the top level into `content` across room
        // versions; accept either so a redaction isn't dropped purely
        // because the homeserver speaks the older room version.
        let redacts = content
            .get("redacts")
            .or_else(|| raw.get("redacts"))
            .and_then(Value::as_str)
            .and_then(|s| EventId::parse(s).ok())?;
        return Some(TimelineContent::Redaction { redacts });
    }

    Some(match event_type {
        "m.room.message" => {
            let msgtype = content.get("msgtype").and_then(Value::as_str)?.to_owned();
            let body = content.get("body").and_then(Value::as_str)?.to_owned();
            let reply_to = content
                .get("m.relates_to")
                .and_then(|r| r.get("m.in_reply_to"))
                .and_then(|r| r.get("event_id"))
                .and_then(Value::as_str)
                .and_then(|s| EventId::parse(s).ok());

            if matches!(msgtype.as_str(), "m.image" | "m.file" | "m.video" | "m.audio") {
                TimelineContent::Attachment {
                    body,
                    msgtype,
                    url: content.get("url").and_then(Value::as_str).map(str::to_owned),
                }
            } else {
                TimelineContent::Message {
                    body,
                    msgtype,
                    format: content.get("format").and_then(Value::as_str).map(str::to_owned),
                    formatted_body: content.get("formatted_body").and_then(Value::as_str).map(str::to_owned),
                    reply_to,
                }
            }
        }
        _ => TimelineContent::Other,
    })
}
