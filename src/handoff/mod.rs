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

//! The accumulator hand-off (§4.G), matching `sync_cb`'s end-of-iteration
//! rendezvous: the sync thread accumulates everything one `/sync` response
//! touched, hands it to the consumer, and blocks until the consumer has
//! taken it before starting the next iteration. `cache_auth_set`'s
//! `next_batch` write happens before the hand-off, exactly as in the
//! source, so a crash mid-hand-off never loses events (at worst they're
//! replayed from the checkpoint).

use std::sync::Arc;

use parking_lot::{Condvar, Mutex};
use ruma::OwnedRoomId;

use crate::cache::DeferredOutcome;
use crate::codec::RoomType;

/// One room touched by a sync iteration, matching
/// `struct accumulated_sync_room`.
#[derive(Clone, Debug)]
pub struct AccumulatedRoom {
    pub room_id: OwnedRoomId,
    pub room_type: RoomType,
    pub is_new: bool,
}

/// One resolved space relation, matching `struct accumulated_space_event`.
#[derive(Clone, Debug)]
pub struct AccumulatedSpaceEvent {
    pub parent: OwnedRoomId,
    pub child: OwnedRoomId,
    pub status: DeferredOutcome,
}

/// Everything one `/sync` iteration produced, bundled for a single
/// hand-off to the consumer.
#[derive(Clone, Debug, Default)]
pub struct AccumulatedSync {
    pub rooms: Vec<AccumulatedRoom>,
    pub space_events: Vec<AccumulatedSpaceEvent>,
}

struct Slot {
    data: Option<AccumulatedSync>,
    acked: bool,
}

/// A single-producer, single-consumer rendezvous mailbox. `publish`
/// blocks until the previously published value (if any) has been taken,
/// matching the source's wait on `sync_cond_signaled`.
pub struct Handoff {
    state: Mutex<Slot>,
    filled: Condvar,
    acked: Condvar,
}

impl Handoff {
    pub fn new() -> Arc<Self> {
        Arc::new(Handoff { state: Mutex::new(Slot { data: None, acked: true }), filled: Condvar::new(), acked: Condvar::new() })
    }

    /// Called by the sync thread at the end of an iteration. Blocks until
    /// the consumer has taken this batch.
    pub fn publish(&self, data: AccumulatedSync) {
        let mut guard = self.state.lock();
        guard.data = Some(data);
        guard.acked = false;
        self.filled.notify_one();

        while !guard.acked {
            self.acked.wait(&mut guard);
        }
    }

    /// Called by the consumer (UI thread). Blocks until a batch is ready.
    pub fn take(&self) -> AccumulatedSync {
        let mut guard = self.state.lock();
        while guard.data.is_none() {
            self.filled.wait(&mut guard);
        }
        let data = guard.data.take().expect("checked above");
        guard.acked = true;
        self.acked.notify_one();
        data
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn publish_then_take_round_trips() {
        let handoff = Handoff::new();
        let consumer = handoff.clone();

        let worker = std::thread::spawn(move || consumer.take());

        handoff.publish(AccumulatedSync {
            rooms: vec![AccumulatedRoom {
                room_id: ruma::room_id!("!r:h").to_owned(),
                room_type: RoomType::Join,
                is_new: true,
            }],
            space_events: Vec::new(),
        });

        let received = worker.join().unwrap();
        assert_eq!(received.rooms.len(), 1);
    }
}
