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

//! Typed event records produced by the codec.
//!
//! These types own their parsed data (unlike the source, which threads raw
//! `cJSON` node pointers through its iterators and requires the caller to
//! keep the backing document alive). The original `serde_json::Value` for
//! `content` is retained on [`TimelineEvent`]/[`StateEvent`] alongside the
//! typed view so the cache can write it back verbatim (and, for
//! redactions, mutate it in place).

use ruma::{MilliSecondsSinceUnixEpoch, OwnedEventId, OwnedUserId};
use serde_json::Value;

/// Fields common to every event kind, matching `struct matrix_state_base`
/// / the timeline equivalent in `libmatrix_src/matrix.h`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EventBase {
    pub event_id: OwnedEventId,
    pub sender: OwnedUserId,
    pub origin_server_ts: MilliSecondsSinceUnixEpoch,
    pub event_type: String,
}

/// A fully parsed event, tagged by which part of a sync room block it
/// came from.
#[derive(Clone, Debug)]
pub enum SyncEvent {
    Ephemeral(EphemeralEvent),
    State(StateEvent),
    Timeline(TimelineEvent),
}

impl SyncEvent {
    pub fn event_id(&self) -> Option<&OwnedEventId> {
        match self {
            SyncEvent::Ephemeral(_) => None,
            SyncEvent::State(e) => Some(&e.base.event_id),
            SyncEvent::Timeline(e) => Some(&e.base.event_id),
        }
    }
}

/// An ephemeral event (typing, receipts). The engine only needs to know
/// these exist and skip them; no typed content is modeled since the spec
/// carries no invariant over ephemeral events beyond "recognized type".
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EphemeralEvent {
    pub event_type: String,
    pub content: Value,
}

/// A state event: carries `state_key` and typed `content`.
#[derive(Clone, Debug)]
pub struct StateEvent {
    pub base: EventBase,
    pub state_key: String,
    pub content: StateContent,
    /// The raw, unmodified content object, retained for storage.
    pub raw_content: Value,
}

/// A timeline event: carries typed `content` (message, redaction,
/// attachment) and no `state_key`.
#[derive(Clone, Debug)]
pub struct TimelineEvent {
    pub base: EventBase,
    pub content: TimelineContent,
    pub raw_content: Value,
}

/// Recognized state event content, with the defaulting rules from §4.B
/// already applied.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum StateContent {
    Member {
        membership: String,
        displayname: Option<String>,
        avatar_url: Option<String>,
        is_direct: bool,
    },
    PowerLevels {
        ban: i64,
        kick: i64,
        invite: i64,
        redact: i64,
        state_default: i64,
        /// Defaults to 0, unlike the other power levels (which default to 50).
        events_default: i64,
        /// Defaults to 0, unlike the other power levels (which default to 50).
        users_default: i64,
    },
    CanonicalAlias {
        alias: Option<String>,
    },
    Create {
        creator: Option<String>,
        /// Defaults to true when the key is absent.
        federate: bool,
        /// Defaults to "1" when absent.
        room_version: String,
        is_space: bool,
    },
    JoinRules {
        join_rule: String,
    },
    Name {
        name: String,
    },
    Topic {
        topic: String,
    },
    /// `m.space.child`: `state_key` is the child room id, `via` is the
    /// list of candidate servers (absent/null means the relation should
    /// be considered broken — see the two-phase commit in `cache`).
    SpaceChild {
        via: Option<Vec<String>>,
    },
    /// `m.space.parent`: `state_key` is the parent room id.
    SpaceParent {
        via: Option<Vec<String>>,
    },
    /// A state event type the codec doesn't model further; still stored
    /// verbatim in the per-room `state` store keyed by its type.
    Other,
}

/// Recognized timeline event content.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum TimelineContent {
    Message {
        body: String,
        msgtype: String,
        format: Option<String>,
        formatted_body: Option<String>,
        /// Event id this message replies to, from `m.relates_to`/`m.in_reply_to`.
        reply_to: Option<OwnedEventId>,
    },
    Redaction {
        redacts: OwnedEventId,
    },
    Attachment {
        body: String,
        msgtype: String,
        url: Option<String>,
    },
    /// A timeline event type the codec doesn't model further.
    Other,
}
