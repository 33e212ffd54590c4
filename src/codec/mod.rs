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

//! Parses a sync delta into typed event records, and back.
//!
//! See [`SyncResponse::rooms_next`] and [`event_next`] for the stepping
//! iterators; defaulting rules (power levels, `federate`, `room_version`)
//! live in `sync_response.rs`, grounded on `libmatrix_src/sync.c`.

mod event;
mod render;
mod sync_response;

pub use event::{EphemeralEvent, EventBase, StateContent, StateEvent, SyncEvent, TimelineContent, TimelineEvent};
pub use render::{render_send_body, SendBody};
pub use sync_response::{event_next, RoomType, SyncResponse};
