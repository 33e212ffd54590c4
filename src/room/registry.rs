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

//! The room id → [`Room`] map (§5's "Room map"), matching `state_rooms.rooms`.
//!
//! The source only ever inserts a new key from the UI thread, after the
//! syncer has handed over an already-built `struct room *` and blocked
//! waiting for the hand-off to be acknowledged — so the two threads never
//! race on insertion even though the syncer is the one that allocates. This
//! crate has no separate UI thread (out of scope, §1), so the sync loop
//! both builds and registers new rooms itself; the map stays behind a
//! mutex regardless, so this is safe independent of which thread does it.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;
use ruma::OwnedRoomId;

use super::Room;

#[derive(Default)]
pub struct RoomRegistry {
    rooms: Mutex<HashMap<OwnedRoomId, Arc<Room>>>,
}

impl RoomRegistry {
    pub fn new() -> Arc<Self> {
        Arc::new(RoomRegistry::default())
    }

    /// Look up an already-registered room.
    pub fn get(&self, room_id: &OwnedRoomId) -> Option<Arc<Room>> {
        self.rooms.lock().get(room_id).cloned()
    }

    /// Fetch the room for `room_id`, registering a freshly allocated one if
    /// this is the first time it's been seen. Returns the room and whether
    /// it was newly created.
    pub fn get_or_insert(&self, room_id: &OwnedRoomId) -> (Arc<Room>, bool) {
        let mut rooms = self.rooms.lock();
        if let Some(room) = rooms.get(room_id) {
            return (room.clone(), false);
        }
        let room = Arc::new(Room::new(room_id.clone()));
        rooms.insert(room_id.clone(), room.clone());
        (room, true)
    }

    /// All currently registered room ids, in no particular order.
    pub fn room_ids(&self) -> Vec<OwnedRoomId> {
        self.rooms.lock().keys().cloned().collect()
    }
}
