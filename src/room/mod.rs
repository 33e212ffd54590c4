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

//! The in-memory room model (§4.D): a single-writer (sync thread),
//! single-reader (UI thread) view over one room's members, timelines, and
//! rendered-line buffer.

mod layout;
mod message;
mod model;
mod registry;
mod timeline;

pub use layout::{BufLine, MessageBuffer, ViewBounds};
pub use message::Message;
pub use model::{MemberInfo, Room, RoomInfo, RoomSnapshot};
pub use registry::RoomRegistry;
pub use timeline::{Direction, Timeline};
