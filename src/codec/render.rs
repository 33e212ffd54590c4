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

//! Render outbound records back into wire bytes.
//!
//! The mirror image of the parsing side: the codec is also the place that
//! knows how to turn a `send` request's fields into the JSON body
//! `PUT /rooms/{room_id}/send/m.room.message/{txn_id}` expects (§6).

use ruma::OwnedEventId;
use serde_json::{json, Value};

/// The body of an outbound `m.room.message` send.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SendBody {
    pub body: String,
    pub msgtype: String,
    pub format: Option<String>,
    pub formatted_body: Option<String>,
    pub reply_to: Option<OwnedEventId>,
}

impl SendBody {
    pub fn plain_text(body: impl Into<String>) -> Self {
        SendBody { body: body.into(), msgtype: "m.text".to_owned(), format: None, formatted_body: None, reply_to: None }
    }
}

/// Render a [`SendBody`] into the JSON value sent as the request body.
pub fn render_send_body(send: &SendBody) -> Value {
    let mut value = json!({
        "body": send.body,
        "msgtype": send.msgtype,
    });

    let obj = value.as_object_mut().expect("constructed as an object above");

    if let Some(format) = &send.format {
        obj.insert("format".to_owned(), json!(format));
    }
    if let Some(formatted_body) = &send.formatted_body {
        obj.insert("formatted_body".to_owned(), json!(formatted_body));
    }
    if let Some(reply_to) = &send.reply_to {
        obj.insert(
            "m.relates_to".to_owned(),
            json!({ "m.in_reply_to": { "event_id": reply_to.as_str() } }),
        );
    }

    value
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn renders_plain_text() {
        let send = SendBody::plain_text("hello");
        let value = render_send_body(&send);
        assert_eq!(value["body"], "hello");
        assert_eq!(value["msgtype"], "m.text");
        assert!(value.get("format").is_none());
    }

    #[test]
    fn renders_reply() {
        let mut send = SendBody::plain_text("hi");
        send.reply_to = Some(ruma::event_id!("$parent:h").to_owned());
        let value = render_send_body(&send);
        assert_eq!(value["m.relates_to"]["m.in_reply_to"]["event_id"], "$parent:h");
    }
}
