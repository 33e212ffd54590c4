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

//! Concrete scenarios from the design's testable-properties section,
//! exercised against [`matrix_tui_engine::cache::Cache`] directly.

use matrix_tui_engine::cache::{Cache, DeferredOutcome, SaveOutcome};
use matrix_tui_engine::codec::{EventBase, SyncEvent, TimelineContent, TimelineEvent};
use matrix_tui_engine::room::Room;

fn open_cache() -> (tempfile::TempDir, Cache) {
    let dir = tempfile::tempdir().unwrap();
    let cache = Cache::open(dir.path()).unwrap();
    (dir, cache)
}

fn message_event(event_id: &str, sender: &str, ts: u32, body: &str) -> SyncEvent {
    SyncEvent::Timeline(TimelineEvent {
        base: EventBase {
            event_id: ruma::EventId::parse(event_id).unwrap(),
            sender: ruma::UserId::parse(sender).unwrap(),
            origin_server_ts: ruma::MilliSecondsSinceUnixEpoch(ts.into()),
            event_type: "m.room.message".to_owned(),
        },
        content: TimelineContent::Message {
            body: body.to_owned(),
            msgtype: "m.text".to_owned(),
            format: None,
            formatted_body: None,
            reply_to: None,
        },
        raw_content: serde_json::json!({ "body": body, "msgtype": "m.text" }),
    })
}

fn redaction_event(event_id: &str, sender: &str, ts: u32, redacts: &str) -> SyncEvent {
    SyncEvent::Timeline(TimelineEvent {
        base: EventBase {
            event_id: ruma::EventId::parse(event_id).unwrap(),
            sender: ruma::UserId::parse(sender).unwrap(),
            origin_server_ts: ruma::MilliSecondsSinceUnixEpoch(ts.into()),
            event_type: "m.room.redaction".to_owned(),
        },
        content: TimelineContent::Redaction { redacts: ruma::EventId::parse(redacts).unwrap() },
        raw_content: serde_json::json!({}),
    })
}

/// Scenario 1: cold start, two rooms.
#[test]
fn cold_start_two_rooms() {
    let (_dir, cache) = open_cache();
    let room_a = ruma::room_id!("!a:h").to_owned();
    let room_b = ruma::room_id!("!b:h").to_owned();

    let mut wtxn = cache.begin_rw().unwrap();
    {
        let mut save_a = cache.save_txn(&mut wtxn, room_a.clone()).unwrap();
        let outcome = save_a.save_event(&message_event("$1:h", "@x:h", 1, "hi"), false).unwrap();
        assert!(matches!(outcome, SaveOutcome::Saved { order, .. } if order == u64::MAX / 2));
    }
    cache.save_room(&mut wtxn, &room_a, false).unwrap();
    {
        let _save_b = cache.save_txn(&mut wtxn, room_b.clone()).unwrap();
    }
    cache.save_room(&mut wtxn, &room_b, false).unwrap();
    wtxn.commit().unwrap();

    cache.auth_set(matrix_tui_engine::cache::auth_key::NEXT_BATCH, "s1").unwrap();

    let rooms = cache.rooms_iter().unwrap();
    assert_eq!(rooms.len(), 2);

    let events = cache.event_iter(&room_a, None, 10).unwrap();
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].0, u64::MAX / 2);

    assert_eq!(cache.auth_get(matrix_tui_engine::cache::auth_key::NEXT_BATCH).unwrap(), Some("s1".to_owned()));

    // The same data, reflected in the in-memory room model.
    let room = Room::new(room_a.clone());
    room.push_message(
        matrix_tui_engine::room::Message::new(
            ruma::event_id!("$1:h").to_owned(),
            u64::MAX / 2,
            "@x:h".to_owned(),
            "x".to_owned(),
            "hi".to_owned(),
            None,
            false,
        ),
        false,
    );
    assert_eq!(room.forward().snapshot().len(), 1);
    assert_eq!(room.forward().snapshot()[0].index, u64::MAX / 2);
}

/// Scenario 2: duplicate event.
#[test]
fn duplicate_event_is_ignored() {
    let (_dir, cache) = open_cache();
    let room_id = ruma::room_id!("!a:h").to_owned();
    let event = message_event("$1:h", "@x:h", 1, "hi");

    let mut wtxn = cache.begin_rw().unwrap();
    let mut save_txn = cache.save_txn(&mut wtxn, room_id.clone()).unwrap();
    let first = save_txn.save_event(&event, false).unwrap();
    let second = save_txn.save_event(&event, false).unwrap();
    wtxn.commit().unwrap();

    assert!(matches!(first, SaveOutcome::Saved { .. }));
    assert!(matches!(second, SaveOutcome::Ignored));
    assert_eq!(cache.event_iter(&room_id, None, 10).unwrap().len(), 1);
}

/// Scenario 3: redaction clears content and the room model reflects it.
#[test]
fn redaction_marks_message_redacted_in_room_model() {
    let (_dir, cache) = open_cache();
    let room_id = ruma::room_id!("!a:h").to_owned();

    let mut wtxn = cache.begin_rw().unwrap();
    let mut save_txn = cache.save_txn(&mut wtxn, room_id.clone()).unwrap();
    let first = save_txn.save_event(&message_event("$1:h", "@x:h", 1, "hi"), false).unwrap();
    let SaveOutcome::Saved { order, .. } = first else { panic!("expected Saved") };

    let second = save_txn.save_event(&redaction_event("$2:h", "@x:h", 2, "$1:h"), false).unwrap();
    wtxn.commit().unwrap();

    let SaveOutcome::Saved { redacted_order, .. } = second else { panic!("expected Saved") };
    assert_eq!(redacted_order, Some(order));

    let events = cache.event_iter(&room_id, None, 10).unwrap();
    let target = events.iter().find(|(o, _)| *o == order).unwrap();
    assert_eq!(target.1["content"], serde_json::json!({}));

    let room = Room::new(room_id.clone());
    room.push_message(
        matrix_tui_engine::room::Message::new(
            ruma::event_id!("$1:h").to_owned(),
            order,
            "@x:h".to_owned(),
            "x".to_owned(),
            "hi".to_owned(),
            None,
            false,
        ),
        false,
    );
    let bounds = matrix_tui_engine::room::ViewBounds { x1: 0, x2: 80 };
    room.fill_events(bounds);
    assert!(room.with_buffer(|buf| !buf.lines().is_empty()));

    assert!(room.redact_message(order, ruma::event_id!("$1:h")));
    let found = room.find_message(order).unwrap();
    assert!(found.redacted);
    assert!(found.body.is_empty());
    assert!(room.with_buffer(|buf| buf.lines().is_empty()));
}

/// Scenario 4: space child arrives before its parent's own confirmation.
#[test]
fn space_child_before_parent_is_deferred_then_added() {
    let (_dir, cache) = open_cache();
    let parent = ruma::room_id!("!p:h").to_owned();
    let child = ruma::room_id!("!c:h").to_owned();

    let create = SyncEvent::State(matrix_tui_engine::codec::StateEvent {
        base: EventBase {
            event_id: ruma::event_id!("$create:h").to_owned(),
            sender: ruma::user_id!("@x:h").to_owned(),
            origin_server_ts: ruma::MilliSecondsSinceUnixEpoch(1u32.into()),
            event_type: "m.room.create".to_owned(),
        },
        state_key: String::new(),
        content: matrix_tui_engine::codec::StateContent::Create {
            creator: Some("@x:h".to_owned()),
            federate: true,
            room_version: "1".to_owned(),
            is_space: true,
        },
        raw_content: serde_json::json!({ "type": "m.space" }),
    });

    let space_child = SyncEvent::State(matrix_tui_engine::codec::StateEvent {
        base: EventBase {
            event_id: ruma::event_id!("$child:h").to_owned(),
            sender: ruma::user_id!("@x:h").to_owned(),
            origin_server_ts: ruma::MilliSecondsSinceUnixEpoch(2u32.into()),
            event_type: "m.space.child".to_owned(),
        },
        state_key: child.as_str().to_owned(),
        content: matrix_tui_engine::codec::StateContent::SpaceChild { via: Some(vec!["h".to_owned()]) },
        raw_content: serde_json::json!({ "via": ["h"] }),
    });

    let mut wtxn = cache.begin_rw().unwrap();
    let mut save_txn = cache.save_txn(&mut wtxn, parent.clone()).unwrap();
    save_txn.save_event(&create, false).unwrap();
    let outcome = save_txn.save_event(&space_child, false).unwrap();
    assert!(matches!(outcome, SaveOutcome::Saved { .. }));
    let deferred = save_txn.take_deferred();
    assert_eq!(deferred.len(), 1);
    cache.save_room(&mut wtxn, &parent, true).unwrap();
    wtxn.commit().unwrap();

    let results = cache.resolve_deferred(deferred).unwrap();
    assert_eq!(results, vec![DeferredOutcome::Added]);
    assert_eq!(cache.space_children_iter(&parent).unwrap(), vec![child.clone()]);
}

/// Scenario 5: a later `via: null` tears the relation back down.
#[test]
fn space_child_break_removes_relation() {
    let (_dir, cache) = open_cache();
    let parent = ruma::room_id!("!p:h").to_owned();
    let child = ruma::room_id!("!c:h").to_owned();

    let create = SyncEvent::State(matrix_tui_engine::codec::StateEvent {
        base: EventBase {
            event_id: ruma::event_id!("$create:h").to_owned(),
            sender: ruma::user_id!("@x:h").to_owned(),
            origin_server_ts: ruma::MilliSecondsSinceUnixEpoch(1u32.into()),
            event_type: "m.room.create".to_owned(),
        },
        state_key: String::new(),
        content: matrix_tui_engine::codec::StateContent::Create {
            creator: Some("@x:h".to_owned()),
            federate: true,
            room_version: "1".to_owned(),
            is_space: true,
        },
        raw_content: serde_json::json!({ "type": "m.space" }),
    });

    let add = SyncEvent::State(matrix_tui_engine::codec::StateEvent {
        base: EventBase {
            event_id: ruma::event_id!("$child1:h").to_owned(),
            sender: ruma::user_id!("@x:h").to_owned(),
            origin_server_ts: ruma::MilliSecondsSinceUnixEpoch(2u32.into()),
            event_type: "m.space.child".to_owned(),
        },
        state_key: child.as_str().to_owned(),
        content: matrix_tui_engine::codec::StateContent::SpaceChild { via: Some(vec!["h".to_owned()]) },
        raw_content: serde_json::json!({ "via": ["h"] }),
    });

    let mut wtxn = cache.begin_rw().unwrap();
    let mut save_txn = cache.save_txn(&mut wtxn, parent.clone()).unwrap();
    save_txn.save_event(&create, false).unwrap();
    save_txn.save_event(&add, false).unwrap();
    let deferred = save_txn.take_deferred();
    cache.save_room(&mut wtxn, &parent, true).unwrap();
    wtxn.commit().unwrap();
    cache.resolve_deferred(deferred).unwrap();
    assert_eq!(cache.space_children_iter(&parent).unwrap(), vec![child.clone()]);

    let remove = SyncEvent::State(matrix_tui_engine::codec::StateEvent {
        base: EventBase {
            event_id: ruma::event_id!("$child2:h").to_owned(),
            sender: ruma::user_id!("@x:h").to_owned(),
            origin_server_ts: ruma::MilliSecondsSinceUnixEpoch(3u32.into()),
            event_type: "m.space.child".to_owned(),
        },
        state_key: child.as_str().to_owned(),
        content: matrix_tui_engine::codec::StateContent::SpaceChild { via: None },
        raw_content: serde_json::json!({ "via": null }),
    });

    let mut wtxn = cache.begin_rw().unwrap();
    let mut save_txn = cache.save_txn(&mut wtxn, parent.clone()).unwrap();
    save_txn.save_event(&remove, false).unwrap();
    let deferred = save_txn.take_deferred();
    wtxn.commit().unwrap();

    let results = cache.resolve_deferred(deferred).unwrap();
    assert_eq!(results, vec![DeferredOutcome::Removed]);
    assert!(cache.space_children_iter(&parent).unwrap().is_empty());
}

/// An `m.space.parent` event (saved in the child room) can also establish
/// the relation, once the parent's own `m.space.child` confirmation is
/// already on file.
#[test]
fn space_parent_initiated_add_requires_existing_child_confirmation() {
    let (_dir, cache) = open_cache();
    let parent = ruma::room_id!("!p:h").to_owned();
    let child = ruma::room_id!("!c:h").to_owned();

    let create = SyncEvent::State(matrix_tui_engine::codec::StateEvent {
        base: EventBase {
            event_id: ruma::event_id!("$create:h").to_owned(),
            sender: ruma::user_id!("@x:h").to_owned(),
            origin_server_ts: ruma::MilliSecondsSinceUnixEpoch(1u32.into()),
            event_type: "m.room.create".to_owned(),
        },
        state_key: String::new(),
        content: matrix_tui_engine::codec::StateContent::Create {
            creator: Some("@x:h".to_owned()),
            federate: true,
            room_version: "1".to_owned(),
            is_space: true,
        },
        raw_content: serde_json::json!({ "type": "m.space" }),
    });
    let space_child = SyncEvent::State(matrix_tui_engine::codec::StateEvent {
        base: EventBase {
            event_id: ruma::event_id!("$child:h").to_owned(),
            sender: ruma::user_id!("@x:h").to_owned(),
            origin_server_ts: ruma::MilliSecondsSinceUnixEpoch(2u32.into()),
            event_type: "m.space.child".to_owned(),
        },
        state_key: child.as_str().to_owned(),
        content: matrix_tui_engine::codec::StateContent::SpaceChild { via: Some(vec!["h".to_owned()]) },
        raw_content: serde_json::json!({ "via": ["h"] }),
    });

    // The parent's own confirmation lands first; its deferred `Child`
    // event is left unresolved on purpose, since `space_child_via` reads
    // the saved state directly rather than the resolved relation.
    let mut wtxn = cache.begin_rw().unwrap();
    let mut save_txn = cache.save_txn(&mut wtxn, parent.clone()).unwrap();
    save_txn.save_event(&create, false).unwrap();
    save_txn.save_event(&space_child, false).unwrap();
    let _ = save_txn.take_deferred();
    cache.save_room(&mut wtxn, &parent, true).unwrap();
    wtxn.commit().unwrap();

    // The child room's own `m.space.parent` confirmation, with a `via`.
    let space_parent = SyncEvent::State(matrix_tui_engine::codec::StateEvent {
        base: EventBase {
            event_id: ruma::event_id!("$parent:h").to_owned(),
            sender: ruma::user_id!("@x:h").to_owned(),
            origin_server_ts: ruma::MilliSecondsSinceUnixEpoch(3u32.into()),
            event_type: "m.space.parent".to_owned(),
        },
        state_key: parent.as_str().to_owned(),
        content: matrix_tui_engine::codec::StateContent::SpaceParent { via: Some(vec!["h".to_owned()]) },
        raw_content: serde_json::json!({ "via": ["h"] }),
    });

    let mut wtxn = cache.begin_rw().unwrap();
    let mut save_txn = cache.save_txn(&mut wtxn, child.clone()).unwrap();
    save_txn.save_event(&space_parent, false).unwrap();
    let deferred = save_txn.take_deferred();
    wtxn.commit().unwrap();
    assert_eq!(deferred.len(), 1);

    let results = cache.resolve_deferred(deferred).unwrap();
    assert_eq!(results, vec![DeferredOutcome::Added]);
    assert_eq!(cache.space_children_iter(&parent).unwrap(), vec![child.clone()]);
}

/// A parent-initiated `via: null` never tears the relation down, matching
/// `original_source`'s dead removal branch for this side (see DESIGN.md).
#[test]
fn space_parent_initiated_null_via_is_a_no_op() {
    let (_dir, cache) = open_cache();
    let parent = ruma::room_id!("!p:h").to_owned();
    let child = ruma::room_id!("!c:h").to_owned();

    let create = SyncEvent::State(matrix_tui_engine::codec::StateEvent {
        base: EventBase {
            event_id: ruma::event_id!("$create:h").to_owned(),
            sender: ruma::user_id!("@x:h").to_owned(),
            origin_server_ts: ruma::MilliSecondsSinceUnixEpoch(1u32.into()),
            event_type: "m.room.create".to_owned(),
        },
        state_key: String::new(),
        content: matrix_tui_engine::codec::StateContent::Create {
            creator: Some("@x:h".to_owned()),
            federate: true,
            room_version: "1".to_owned(),
            is_space: true,
        },
        raw_content: serde_json::json!({ "type": "m.space" }),
    });
    let space_child = SyncEvent::State(matrix_tui_engine::codec::StateEvent {
        base: EventBase {
            event_id: ruma::event_id!("$child:h").to_owned(),
            sender: ruma::user_id!("@x:h").to_owned(),
            origin_server_ts: ruma::MilliSecondsSinceUnixEpoch(2u32.into()),
            event_type: "m.space.child".to_owned(),
        },
        state_key: child.as_str().to_owned(),
        content: matrix_tui_engine::codec::StateContent::SpaceChild { via: Some(vec!["h".to_owned()]) },
        raw_content: serde_json::json!({ "via": ["h"] }),
    });

    let mut wtxn = cache.begin_rw().unwrap();
    let mut save_txn = cache.save_txn(&mut wtxn, parent.clone()).unwrap();
    save_txn.save_event(&create, false).unwrap();
    save_txn.save_event(&space_child, false).unwrap();
    let deferred = save_txn.take_deferred();
    cache.save_room(&mut wtxn, &parent, true).unwrap();
    wtxn.commit().unwrap();
    cache.resolve_deferred(deferred).unwrap();
    assert_eq!(cache.space_children_iter(&parent).unwrap(), vec![child.clone()]);

    let space_parent_null = SyncEvent::State(matrix_tui_engine::codec::StateEvent {
        base: EventBase {
            event_id: ruma::event_id!("$parent:h").to_owned(),
            sender: ruma::user_id!("@x:h").to_owned(),
            origin_server_ts: ruma::MilliSecondsSinceUnixEpoch(3u32.into()),
            event_type: "m.space.parent".to_owned(),
        },
        state_key: parent.as_str().to_owned(),
        content: matrix_tui_engine::codec::StateContent::SpaceParent { via: None },
        raw_content: serde_json::json!({ "via": null }),
    });

    let mut wtxn = cache.begin_rw().unwrap();
    let mut save_txn = cache.save_txn(&mut wtxn, child.clone()).unwrap();
    save_txn.save_event(&space_parent_null, false).unwrap();
    let deferred = save_txn.take_deferred();
    wtxn.commit().unwrap();

    let results = cache.resolve_deferred(deferred).unwrap();
    assert_eq!(results, vec![DeferredOutcome::Failed]);
    assert_eq!(cache.space_children_iter(&parent).unwrap(), vec![child.clone()]);
}
