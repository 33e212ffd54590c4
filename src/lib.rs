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

//! Room-state and timeline engine for a terminal Matrix client: a sync
//! loop, a persistent LMDB-backed cache, and an in-memory room model,
//! wired together behind [`Engine`] — the seam a terminal UI would call
//! across (§5). This crate implements no terminal renderer, input
//! handling, or CLI bootstrap; those are out of scope (§1).

pub mod cache;
pub mod codec;
pub mod error;
pub mod handoff;
pub mod http;
pub mod kv;
pub mod queue;
pub mod room;
pub mod sync;

use std::path::PathBuf;
use std::sync::Arc;
use std::thread::JoinHandle;

use ruma::OwnedRoomId;

use cache::Cache;
use codec::SendBody;
use error::EngineError;
use handoff::{AccumulatedSync, Handoff};
use http::{CancelHandle, HttpClient, ReqwestHttpClient};
use queue::{channel, WorkItem, WorkSender, Worker};
use room::{Room, RoomRegistry};
use sync::{SyncConfig, SyncLoop};

/// Engine-wide configuration: where the cache lives on disk and which
/// homeserver the sync loop and queue worker talk to, matching §6's
/// persistent/environment layout plus the poll timeout `SyncConfig` reuses.
#[derive(Clone, Debug)]
pub struct EngineConfig {
    pub store_path: PathBuf,
    pub homeserver: String,
    /// Clamped to 1-60 seconds at the point of use (§5).
    pub poll_timeout_secs: u64,
}

impl EngineConfig {
    pub fn new(store_path: impl Into<PathBuf>, homeserver: impl Into<String>) -> Self {
        EngineConfig { store_path: store_path.into(), homeserver: homeserver.into(), poll_timeout_secs: 30 }
    }
}

/// The engine's public surface (§5): owns the sync and queue-worker
/// threads and the state they share (cache, room registry, hand-off
/// mailbox, work queue). The caller plays the role of the UI/main thread
/// the source dedicates to rendering and input, which this crate does not
/// implement.
pub struct Engine {
    cache: Cache,
    rooms: Arc<RoomRegistry>,
    handoff: Arc<Handoff>,
    work: WorkSender,
    sync_cancel: CancelHandle,
    sync_thread: Option<JoinHandle<()>>,
    worker_thread: Option<JoinHandle<()>>,
}

impl Engine {
    /// Open the cache at `config.store_path` and start the sync loop and
    /// queue worker, each on its own dedicated thread (§5).
    pub fn start(config: EngineConfig) -> Result<Self, EngineError> {
        let cache = Cache::open(&config.store_path)?;
        cache.auth_set(cache::auth_key::HOMESERVER, &config.homeserver)?;

        let rooms = RoomRegistry::new();
        let handoff = Handoff::new();
        let http: Arc<dyn HttpClient> = Arc::new(ReqwestHttpClient::new());

        let sync_config = SyncConfig {
            homeserver: config.homeserver.clone(),
            poll_timeout_secs: config.poll_timeout_secs,
            backoff: Default::default(),
        };
        let sync_loop = SyncLoop::new(cache.clone(), http.clone(), rooms.clone(), handoff.clone(), sync_config);
        let sync_cancel = sync_loop.cancel_handle();

        let sync_thread = std::thread::Builder::new()
            .name("matrix-sync".to_owned())
            .spawn(move || {
                if let Err(err) = sync_loop.run() {
                    tracing::warn!(%err, "sync loop exited");
                }
            })
            .expect("failed to spawn sync thread");

        let (work_tx, work_rx) = channel();
        let worker = Worker::new(cache.clone(), http, config.homeserver.clone());
        let worker_thread = std::thread::Builder::new()
            .name("matrix-queue-worker".to_owned())
            .spawn(move || worker.run(work_rx))
            .expect("failed to spawn queue worker thread");

        Ok(Engine {
            cache,
            rooms,
            handoff,
            work: work_tx,
            sync_cancel,
            sync_thread: Some(sync_thread),
            worker_thread: Some(worker_thread),
        })
    }

    /// Persist `mxid` and enqueue a login with `password`, matching
    /// `matrix_login`'s entry point. Login errors surface as this call's
    /// `Err` only when the request can't even be enqueued; the request's
    /// own success/failure is reported by the queue worker (§6's
    /// user-visible-behavior note: "a single error line on the login
    /// form").
    pub fn login(&self, mxid: &str, password: &str) -> Result<(), EngineError> {
        if mxid.is_empty() || password.is_empty() {
            return Err(EngineError::InvalidArgument("mxid and password must be non-empty".to_owned()));
        }
        self.cache.auth_set(cache::auth_key::MXID, mxid)?;
        self.work
            .send(WorkItem::Login { password: password.to_owned() })
            .map_err(|_| EngineError::InvalidArgument("work queue is closed".to_owned()))
    }

    /// Enqueue an outbound message, matching `matrix_send_message`. Send
    /// errors are logged by the worker, not retried (§6).
    pub fn send_message(&self, room_id: OwnedRoomId, body: SendBody) -> Result<(), EngineError> {
        self.work
            .send(WorkItem::SendMessage { room_id, body })
            .map_err(|_| EngineError::InvalidArgument("work queue is closed".to_owned()))
    }

    /// Block until the sync loop has a batch ready, then take it — the
    /// read side of §4.G's accumulator hand-off.
    pub fn accumulated_sync_rx(&self) -> AccumulatedSync {
        self.handoff.take()
    }

    /// Look up a room by id, to render via [`Room::read_snapshot`].
    pub fn room(&self, room_id: &OwnedRoomId) -> Option<Arc<Room>> {
        self.rooms.get(room_id)
    }

    /// All rooms currently known to the engine.
    pub fn room_ids(&self) -> Vec<OwnedRoomId> {
        self.rooms.room_ids()
    }

    /// Stop the sync loop and queue worker and wait for both threads to
    /// exit. Consumes `self` so the work queue's sender side is dropped
    /// before joining the worker, which is how it learns to stop.
    pub fn shutdown(mut self) {
        self.sync_cancel.cancel();
        let sync_thread = self.sync_thread.take();
        let worker_thread = self.worker_thread.take();
        drop(self);

        if let Some(handle) = sync_thread {
            let _ = handle.join();
        }
        if let Some(handle) = worker_thread {
            let _ = handle.join();
        }
    }
}

impl Drop for Engine {
    fn drop(&mut self) {
        self.sync_cancel.cancel();
    }
}
