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

//! A bounded work queue off the UI thread (§4.F), matching `struct queue`
//! and `queue_callbacks.c`. `std::sync::mpsc::sync_channel` gives the
//! same fixed-capacity, block-on-full behavior as the source's ring
//! buffer without hand-rolling one.

mod worker;

pub use worker::Worker;

use std::sync::mpsc::{sync_channel, Receiver, SyncSender, TrySendError};

use ruma::OwnedRoomId;

/// Matches `QUEUE_SIZE`: a small bound is enough since the queue only
/// needs to smooth over bursts of UI-triggered actions, not buffer an
/// unbounded backlog.
pub const QUEUE_CAPACITY: usize = 16;

/// One deferred action, matching `enum queue_item_type`.
#[derive(Debug)]
pub enum WorkItem {
    Login { password: String },
    SendMessage { room_id: OwnedRoomId, body: crate::codec::SendBody },
}

/// Producer handle. Cloned freely; a full queue blocks the caller rather
/// than dropping work, matching `queue_push_tail`'s contract of failing
/// only when the ring genuinely has no room.
#[derive(Clone)]
pub struct WorkSender {
    inner: SyncSender<WorkItem>,
}

impl WorkSender {
    /// Enqueue `item`, blocking if the queue is full.
    pub fn send(&self, item: WorkItem) -> Result<(), WorkItem> {
        self.inner.send(item).map_err(|err| err.0)
    }

    /// Enqueue `item` without blocking, matching `queue_push_tail`'s
    /// "already full" failure instead of backpressure.
    pub fn try_send(&self, item: WorkItem) -> Result<(), WorkItem> {
        match self.inner.try_send(item) {
            Ok(()) => Ok(()),
            Err(TrySendError::Full(item)) | Err(TrySendError::Disconnected(item)) => Err(item),
        }
    }
}

/// Consumer handle, held by the single worker thread.
pub struct WorkReceiver {
    inner: Receiver<WorkItem>,
}

impl WorkReceiver {
    /// Block for the next item, matching `queue_pop_head`'s polling loop
    /// but without a busy-wait: the underlying channel parks the thread.
    pub fn recv(&self) -> Option<WorkItem> {
        self.inner.recv().ok()
    }
}

/// Create a bounded queue pair.
pub fn channel() -> (WorkSender, WorkReceiver) {
    let (tx, rx) = sync_channel(QUEUE_CAPACITY);
    (WorkSender { inner: tx }, WorkReceiver { inner: rx })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn send_then_recv_round_trips() {
        let (tx, rx) = channel();
        tx.send(WorkItem::Login { password: "hunter2".to_owned() }).unwrap();
        match rx.recv() {
            Some(WorkItem::Login { password }) => assert_eq!(password, "hunter2"),
            other => panic!("unexpected item: {other:?}"),
        }
    }

    #[test]
    fn try_send_fails_when_full() {
        let (tx, _rx) = channel();
        for _ in 0..QUEUE_CAPACITY {
            tx.try_send(WorkItem::Login { password: "x".to_owned() }).unwrap();
        }
        assert!(tx.try_send(WorkItem::Login { password: "x".to_owned() }).is_err());
    }
}
