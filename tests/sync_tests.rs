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

//! Scenario 6 from the design's testable-properties section: cancelling
//! the sync loop never leaves `next_batch` half-written.

use std::sync::Arc;

use matrix_tui_engine::cache::{auth_key, Cache};
use matrix_tui_engine::error::EngineError;
use matrix_tui_engine::handoff::Handoff;
use matrix_tui_engine::http::{HttpClient, ReqwestHttpClient};
use matrix_tui_engine::room::RoomRegistry;
use matrix_tui_engine::sync::{SyncConfig, SyncLoop};

use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn open_cache() -> (tempfile::TempDir, Cache) {
    let dir = tempfile::tempdir().unwrap();
    let cache = Cache::open(dir.path()).unwrap();
    (dir, cache)
}

fn build_loop(cache: &Cache, homeserver: String) -> SyncLoop {
    let http: Arc<dyn HttpClient> = Arc::new(ReqwestHttpClient::new());
    let rooms = RoomRegistry::new();
    let handoff = Handoff::new();
    let config = SyncConfig { homeserver, poll_timeout_secs: 1, backoff: Default::default() };
    SyncLoop::new(cache.clone(), http, rooms, handoff, config)
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn cancel_before_any_request_short_circuits_the_loop() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/_matrix/client/r0/sync"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "next_batch": "s1",
            "rooms": {},
        })))
        .mount(&server)
        .await;

    let (_dir, cache) = open_cache();
    let sync = build_loop(&cache, server.uri());
    sync.cancel_handle().cancel();

    let result = tokio::task::spawn_blocking(move || sync.run()).await.unwrap();

    assert!(matches!(result, Err(EngineError::Cancelled)));
    assert_eq!(cache.auth_get(auth_key::NEXT_BATCH).unwrap(), None);
    assert!(server.received_requests().await.unwrap().is_empty());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn cancel_after_one_batch_stops_with_next_batch_fully_written() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/_matrix/client/r0/sync"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "next_batch": "s1",
            "rooms": {},
        })))
        .mount(&server)
        .await;

    let (_dir, cache) = open_cache();
    let http: Arc<dyn HttpClient> = Arc::new(ReqwestHttpClient::new());
    let rooms = RoomRegistry::new();
    let handoff = Handoff::new();
    let config = SyncConfig { homeserver: server.uri(), poll_timeout_secs: 1, backoff: Default::default() };
    let sync = SyncLoop::new(cache.clone(), http, rooms, handoff.clone(), config);
    let cancel = sync.cancel_handle();

    let handle = tokio::task::spawn_blocking(move || sync.run());

    // Drain the first published batch, unblocking the loop's hand-off so it
    // can reach the top of its next iteration, then cancel it there.
    let accumulated = tokio::task::spawn_blocking(move || handoff.take()).await.unwrap();
    assert!(accumulated.rooms.is_empty());
    cancel.cancel();

    let result = handle.await.unwrap();

    assert!(matches!(result, Err(EngineError::Cancelled)));
    assert_eq!(cache.auth_get(auth_key::NEXT_BATCH).unwrap(), Some("s1".to_owned()));
}
