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

//! The single queue-worker thread (§4.F), matching `queue_worker_thread`:
//! pop one [`WorkItem`] at a time and dispatch it against the HTTP client
//! and cache, logging failures rather than retrying — retry is the sync
//! loop's job, not the worker's, per §5's "send errors do not retry
//! automatically" note.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use serde_json::json;

use super::{WorkItem, WorkReceiver};
use crate::cache::{auth_key, Cache};
use crate::codec::render_send_body;
use crate::error::EngineError;
use crate::http::HttpClient;

/// Request timeout for login/send calls; these are one-shot requests, not
/// the long-poll `/sync`, so a flat 30s is enough headroom without the
/// 1-60s clamp §5 reserves for the poll timeout specifically.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Processes [`WorkItem`]s pulled off a [`WorkReceiver`] until the queue's
/// sender side is dropped.
pub struct Worker {
    cache: Cache,
    http: Arc<dyn HttpClient>,
    homeserver: String,
    next_txn_id: AtomicU64,
}

impl Worker {
    pub fn new(cache: Cache, http: Arc<dyn HttpClient>, homeserver: String) -> Self {
        Worker { cache, http, homeserver, next_txn_id: AtomicU64::new(0) }
    }

    /// Run until `receiver` is disconnected, matching the worker thread's
    /// lifetime in the source (it never exits on its own otherwise).
    pub fn run(&self, receiver: WorkReceiver) {
        while let Some(item) = receiver.recv() {
            if let Err(err) = self.dispatch(item) {
                tracing::warn!(%err, "queue item failed");
            }
        }
    }

    fn dispatch(&self, item: WorkItem) -> Result<(), EngineError> {
        match item {
            WorkItem::Login { password } => self.login(password),
            WorkItem::SendMessage { room_id, body } => self.send_message(room_id, body),
        }
    }

    /// `POST /login` with an `m.login.password` identifier, matching
    /// `matrix_login` in `libmatrix_src/api.c`. The mxid is read back from
    /// the cache rather than threaded through [`WorkItem::Login`], since
    /// `Engine::login` persists it before enqueueing the password.
    fn login(&self, password: String) -> Result<(), EngineError> {
        let mxid = self
            .cache
            .auth_get(auth_key::MXID)?
            .ok_or_else(|| EngineError::InvalidArgument("login requested with no mxid on file".to_owned()))?;

        let url = self.build_url(&["_matrix", "client", "r0", "login"])?;
        let body = json!({
            "type": "m.login.password",
            "identifier": { "type": "m.id.user", "user": mxid },
            "password": password,
        });

        let resp = self.http.post(url.as_str(), None, &body, REQUEST_TIMEOUT)?;
        if !resp.is_success() {
            return Err(EngineError::TransportFailure(format!("login failed with status {}", resp.status)));
        }

        let access_token = resp
            .body
            .get("access_token")
            .and_then(|v| v.as_str())
            .ok_or_else(|| EngineError::MalformedJson(crate::error::CodecError::MissingField("access_token")))?;

        self.cache.auth_set(auth_key::ACCESS_TOKEN, access_token)?;
        tracing::info!(%mxid, "logged in");
        Ok(())
    }

    /// `PUT /rooms/{room_id}/send/m.room.message/{txn_id}`, matching
    /// `matrix_send_message`. `txn_id` is a process-monotonic counter per
    /// §6, never reused across calls in this process's lifetime.
    fn send_message(&self, room_id: ruma::OwnedRoomId, body: crate::codec::SendBody) -> Result<(), EngineError> {
        let access_token = self.cache.auth_get(auth_key::ACCESS_TOKEN)?.ok_or(EngineError::NotLoggedIn)?;

        let txn_id = self.next_txn_id.fetch_add(1, Ordering::SeqCst);
        let url = self.build_url(&[
            "_matrix",
            "client",
            "r0",
            "rooms",
            room_id.as_str(),
            "send",
            "m.room.message",
            &txn_id.to_string(),
        ])?;

        let rendered = render_send_body(&body);
        let resp = self.http.put(url.as_str(), Some(&access_token), &rendered, REQUEST_TIMEOUT)?;
        if !resp.is_success() {
            return Err(EngineError::TransportFailure(format!("send failed with status {}", resp.status)));
        }

        tracing::debug!(room = %room_id, txn_id, "sent message");
        Ok(())
    }

    /// Append `segments` onto the configured homeserver, percent-encoding
    /// each one — needed since room ids and mxids carry `!`/`:`/`@`.
    fn build_url(&self, segments: &[&str]) -> Result<url::Url, EngineError> {
        let mut url = url::Url::parse(&self.homeserver)
            .map_err(|err| EngineError::InvalidArgument(format!("invalid homeserver url: {err}")))?;
        {
            let mut path = url
                .path_segments_mut()
                .map_err(|()| EngineError::InvalidArgument("homeserver url cannot be a base".to_owned()))?;
            path.extend(segments);
        }
        Ok(url)
    }
}
