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

//! The in-memory room model (§4.D), matching `struct room`.

use std::collections::{HashMap, HashSet};

use parking_lot::Mutex;
use ruma::{OwnedRoomId, OwnedUserId};

use super::layout::{BufLine, MessageBuffer, ViewBounds};
use super::message::Message;
use super::timeline::{Direction, Timeline};

/// Name and topic, kept separately from the `state` KV store so the UI
/// thread never has to open a transaction just to draw a room header.
#[derive(Clone, Debug, Default)]
pub struct RoomInfo {
    pub name: Option<String>,
    pub topic: Option<String>,
    pub is_space: bool,
}

/// A single member's current display name, the last entry of the source's
/// per-member username stack (names are append-only there to dodge a
/// use-after-free across threads; a `Mutex`-guarded `String` gets the same
/// "readers never see a half-written name" property without the stack).
#[derive(Clone, Debug, Default)]
pub struct MemberInfo {
    pub display_name: Option<String>,
}

/// A single room's live state: members, space children, both timeline
/// directions, and the rendered-line buffer built from them.
pub struct Room {
    pub room_id: OwnedRoomId,
    pub info: Mutex<RoomInfo>,
    members: Mutex<HashMap<OwnedUserId, MemberInfo>>,
    children: Mutex<HashSet<OwnedRoomId>>,
    forward: Timeline,
    backward: Timeline,
    /// Locked by the reader for the whole duration of a render pass, and
    /// by the writer only to mark a message redacted or to rebuild the
    /// buffer after a resize, matching `realloc_or_modify_mutex`.
    buffer: Mutex<MessageBuffer>,
    /// How many entries of each timeline have already been laid out into
    /// `buffer`, matching `timeline.consumed`; reset to 0 on recalculation.
    consumed_forward: Mutex<usize>,
    consumed_backward: Mutex<usize>,
}

impl Room {
    pub fn new(room_id: OwnedRoomId) -> Self {
        Room {
            room_id,
            info: Mutex::new(RoomInfo::default()),
            members: Mutex::new(HashMap::new()),
            children: Mutex::new(HashSet::new()),
            forward: Timeline::new(Direction::Forward),
            backward: Timeline::new(Direction::Backward),
            buffer: Mutex::new(MessageBuffer::new()),
            consumed_forward: Mutex::new(0),
            consumed_backward: Mutex::new(0),
        }
    }

    pub fn forward(&self) -> &Timeline {
        &self.forward
    }

    pub fn backward(&self) -> &Timeline {
        &self.backward
    }

    /// Locate a message by its order index in whichever timeline it
    /// belongs to, matching `room_bsearch`'s forward/backward dispatch:
    /// the forward timeline's first entry is the smallest forward index,
    /// the backward timeline's first entry is the largest backward one.
    pub fn find_message(&self, index: u64) -> Option<Message> {
        if let Some(first) = self.forward.snapshot().first() {
            if first.index <= index {
                return self.forward.find(index);
            }
        }
        if let Some(first) = self.backward.snapshot().first() {
            if first.index >= index {
                return self.backward.find(index);
            }
        }
        None
    }

    pub fn put_member(&self, user_id: OwnedUserId, display_name: Option<String>) {
        self.members.lock().insert(user_id, MemberInfo { display_name });
    }

    pub fn member_display_name(&self, user_id: &OwnedUserId) -> Option<String> {
        self.members.lock().get(user_id).and_then(|m| m.display_name.clone())
    }

    pub fn add_child(&self, child: OwnedRoomId) {
        self.children.lock().insert(child);
    }

    pub fn remove_child(&self, child: &OwnedRoomId) {
        self.children.lock().remove(child);
    }

    pub fn children(&self) -> Vec<OwnedRoomId> {
        self.children.lock().iter().cloned().collect()
    }

    /// Append a new message, matching `room_put_message_event`.
    pub fn push_message(&self, message: Message, backfill: bool) {
        if backfill {
            self.backward.push(message);
        } else {
            self.forward.push(message);
        }
    }

    /// Redact the message at `index` in both its timeline and the layout
    /// buffer, matching `room_redact_event`.
    pub fn redact_message(&self, index: u64, event_id: &ruma::EventId) -> bool {
        let found = self.forward.redact(index) || self.backward.redact(index);
        if found {
            self.buffer.lock().redact(event_id);
        }
        found
    }

    /// Lay out any unconsumed messages into the rendered-line buffer for
    /// `bounds`, rebuilding from scratch if the width changed, matching
    /// `room_maybe_reset_and_fill_events`.
    pub fn fill_events(&self, bounds: ViewBounds) -> bool {
        let mut buffer = self.buffer.lock();
        let mut consumed_forward = self.consumed_forward.lock();
        let mut consumed_backward = self.consumed_backward.lock();

        if buffer.should_recalculate(bounds) {
            buffer.clear();
            *consumed_forward = 0;
            *consumed_backward = 0;
        }

        let mut filled = false;

        let backward_snapshot = self.backward.snapshot();
        if *consumed_backward < backward_snapshot.len() {
            // Backfilled messages are appended oldest-last; lay them out
            // oldest-first so the buffer reads top-to-bottom correctly.
            for message in backward_snapshot[*consumed_backward..].iter().rev() {
                if !message.redacted {
                    buffer.insert(message, bounds);
                }
            }
            *consumed_backward = backward_snapshot.len();
            filled = true;
        }

        let forward_snapshot = self.forward.snapshot();
        if *consumed_forward < forward_snapshot.len() {
            for message in &forward_snapshot[*consumed_forward..] {
                if !message.redacted {
                    buffer.insert(message, bounds);
                }
            }
            *consumed_forward = forward_snapshot.len();
            filled = true;
        }

        buffer.ensure_sane_scroll();
        filled
    }

    pub fn with_buffer<R>(&self, f: impl FnOnce(&MessageBuffer) -> R) -> R {
        f(&self.buffer.lock())
    }

    /// Lay out any unconsumed messages for `bounds` and return an immutable
    /// snapshot of the room's header and rendered lines — the read-side
    /// seam §5 says the (out-of-scope) UI thread would call across.
    pub fn read_snapshot(&self, bounds: ViewBounds) -> RoomSnapshot {
        self.fill_events(bounds);
        let info = self.info.lock().clone();
        self.with_buffer(|buffer| RoomSnapshot {
            info,
            lines: buffer.lines().to_vec(),
            scroll: buffer.scroll(),
        })
    }
}

/// An immutable, owned view of a room's header and rendered lines.
#[derive(Clone, Debug)]
pub struct RoomSnapshot {
    pub info: RoomInfo,
    pub lines: Vec<BufLine>,
    pub scroll: usize,
}
