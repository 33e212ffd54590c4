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

//! Names and flags of the sub-databases described in §3/§6.

use crate::kv::StoreFlags;

/// Global database names, matching `db_names` in `src/db/cache.c`.
pub mod global {
    pub const AUTH: &str = "auth";
    pub const ROOMS: &str = "rooms";
    pub const SPACE_CHILDREN: &str = "space_children";
}

/// Keys within the `auth` store.
pub mod auth_key {
    pub const ACCESS_TOKEN: &str = "access_token";
    pub const MXID: &str = "mxid";
    pub const HOMESERVER: &str = "homeserver";
    pub const NEXT_BATCH: &str = "next_batch";
}

/// Per-room database name suffixes, matching `room_db_names`.
pub mod room {
    pub const EVENTS: &str = "events";
    pub const ORDER_TO_EVENT: &str = "order2event";
    pub const EVENT_TO_ORDER: &str = "event2order";
    pub const MEMBERS: &str = "members";
    pub const STATE: &str = "state";
    /// Redactions whose target hadn't been seen yet when they arrived,
    /// keyed by the target `event_id`. Resolves the Open Question in §9:
    /// a redaction for an as-yet-unseen event is recorded here instead of
    /// silently dropped, and applied the moment the target is saved.
    pub const PENDING_REDACTIONS: &str = "pending_redactions";
}

pub fn flags_for(name: &str) -> StoreFlags {
    match name {
        global::SPACE_CHILDREN => StoreFlags { dup_sort: true, integer_key: false },
        room::ORDER_TO_EVENT => StoreFlags { dup_sort: false, integer_key: true },
        room::EVENT_TO_ORDER => StoreFlags { dup_sort: false, integer_key: false },
        _ => StoreFlags::default(),
    }
}
