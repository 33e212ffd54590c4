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

//! A single timeline entry, matching `struct message` in `room_ds.h`.

use ruma::OwnedEventId;

/// One message in a room's timeline. Heap-allocated and handed to both the
/// sync thread (to append) and the UI thread (to read), never mutated
/// except by redaction.
#[derive(Clone, Debug)]
pub struct Message {
    pub event_id: OwnedEventId,
    pub index: u64,
    /// Order index of the message this one replies to, if any.
    pub index_reply: Option<u64>,
    pub sender: String,
    /// Display name at the time this message was inserted; later
    /// changes to the sender's name don't retroactively relabel it,
    /// matching the "pointer to username at the current index" comment
    /// in the source.
    pub sender_display: String,
    pub body: String,
    pub formatted: bool,
    pub redacted: bool,
    pub edited: bool,
}

impl Message {
    pub fn new(
        event_id: OwnedEventId,
        index: u64,
        sender: String,
        sender_display: String,
        body: String,
        index_reply: Option<u64>,
        formatted: bool,
    ) -> Self {
        Message {
            event_id,
            index,
            index_reply,
            sender,
            sender_display,
            body,
            formatted,
            redacted: false,
            edited: false,
        }
    }

    /// Clear this message's body in place, matching `room_redact_event`.
    pub fn redact(&mut self) {
        self.redacted = true;
        self.body.clear();
    }
}
