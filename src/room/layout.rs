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

//! Greedy word-wrap layout buffer, matching `message_buffer.c`.
//!
//! Each [`Message`] becomes one or more [`BufLine`]s, one per rendered
//! line, so a renderer can treat `lines[scroll..]` as the rows to draw
//! without re-wrapping anything. The source identifies which lines belong
//! to a message by pointer equality on `struct message *`; this buffer
//! holds an owned [`Message`] clone per line's metadata, so the analogous
//! check is `message.event_id` equality between adjacent lines.

use super::message::Message;

/// The drawable region a layout is computed for, matching `widget_points`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ViewBounds {
    pub x1: usize,
    pub x2: usize,
}

/// One line of a wrapped message: a `[start, end)` byte-offset range into
/// `message.body`, plus the sender-name padding every continuation line
/// after the first reserves, matching `struct buf_item`.
#[derive(Clone, Debug)]
pub struct BufLine {
    pub message: Message,
    pub padding: usize,
    pub start: usize,
    pub end: usize,
}

#[derive(Default)]
pub struct MessageBuffer {
    lines: Vec<BufLine>,
    scroll: usize,
    points_valid: bool,
    last_bounds: Option<ViewBounds>,
}

/// Characters the wrapper is willing to break a line on, mirroring
/// `ch_can_split_word`'s whitespace/punctuation set.
fn can_split_word(ch: char) -> bool {
    ch.is_whitespace() || matches!(ch, '.' | ',' | ';' | ':' | '!' | '?' | '-' | '/' | '\\' | '(' | ')' | '[' | ']')
}

impl MessageBuffer {
    pub fn new() -> Self {
        MessageBuffer::default()
    }

    pub fn lines(&self) -> &[BufLine] {
        &self.lines
    }

    pub fn scroll(&self) -> usize {
        self.scroll
    }

    /// Wrap and append one message's body into the buffer at the current
    /// bounds. Returns the number of lines produced.
    pub fn insert(&mut self, message: &Message, bounds: ViewBounds) -> usize {
        let padding = message.sender_display.chars().count() + 3; // "<" name "> "
        let start_x = bounds.x1 + padding + 1;

        if start_x >= bounds.x2 {
            return 0;
        }

        if !self.points_valid {
            self.points_valid = true;
            self.last_bounds = Some(bounds);
        }

        let chars: Vec<char> = message.body.chars().collect();
        let len = chars.len();
        let width = bounds.x2.saturating_sub(start_x).max(1);

        let mut produced = 0;
        let mut i = 0usize;
        let mut prev_end = 0usize;
        let mut x = 0usize;

        while i < len {
            x += 1;
            let overflow = x >= width;
            let at_end = i + 1 == len;

            if overflow || at_end {
                if overflow {
                    let (word_start, word_end, word_width) = find_word_bounds(&chars, i);
                    if word_width < width {
                        self.lines.push(BufLine { message: message.clone(), padding, start: prev_end, end: word_start });
                        produced += 1;

                        let next_word_start = find_next_word_start(&chars, word_end, width);
                        self.lines.push(BufLine {
                            message: message.clone(),
                            padding,
                            start: word_start,
                            end: next_word_start,
                        });
                        produced += 1;

                        i = next_word_start;
                        prev_end = next_word_start;
                        x = 0;
                        continue;
                    }
                }

                self.lines.push(BufLine { message: message.clone(), padding, start: prev_end, end: i + 1 });
                produced += 1;
                prev_end = i + 1;
                x = 0;
            }

            i += 1;
        }

        produced
    }

    /// Clear the buffer (e.g. before a full re-layout), matching
    /// `message_buffer_zero`.
    pub fn clear(&mut self) {
        self.lines.clear();
        self.points_valid = false;
    }

    /// Whether the view's horizontal bounds changed enough that previously
    /// wrapped lines are no longer valid. Only `x1`/`x2` matter, not the
    /// vertical extent, matching `message_buffer_should_recalculate`.
    pub fn should_recalculate(&self, bounds: ViewBounds) -> bool {
        match self.last_bounds {
            Some(last) => last.x1 != bounds.x1 || last.x2 != bounds.x2,
            None => true,
        }
    }

    /// Remove every line belonging to the message at `index`, matching
    /// `message_buffer_redact`'s contiguous-run delete by pointer equality
    /// (here: `event_id` equality, since lines for one message are always
    /// inserted together).
    pub fn redact(&mut self, event_id: &ruma::EventId) -> bool {
        let Some(pos) = self.lines.iter().position(|l| l.message.event_id.as_str() == event_id.as_str()) else {
            return false;
        };

        let mut start = pos;
        while start > 0 && self.lines[start - 1].message.event_id.as_str() == event_id.as_str() {
            start -= 1;
        }
        let mut end = pos;
        while end + 1 < self.lines.len() && self.lines[end + 1].message.event_id.as_str() == event_id.as_str() {
            end += 1;
        }

        self.lines.drain(start..=end);
        self.ensure_sane_scroll();
        true
    }

    pub fn ensure_sane_scroll(&mut self) {
        if self.lines.is_empty() {
            self.scroll = 0;
        } else if self.scroll >= self.lines.len() {
            self.scroll = self.lines.len() - 1;
        }
    }

    pub fn scroll_up(&mut self, by: usize) {
        self.scroll = self.scroll.saturating_sub(by);
    }

    pub fn scroll_down(&mut self, by: usize) {
        self.scroll = (self.scroll + by).min(self.lines.len().saturating_sub(1));
    }
}

/// Find the word straddling `current`, returning `(start, end, width)` in
/// char indices, matching `find_word_start_end`.
fn find_word_bounds(chars: &[char], current: usize) -> (usize, usize, usize) {
    let mut start = current;
    while start > 0 && !can_split_word(chars[start - 1]) {
        start -= 1;
    }
    let mut end = current;
    while end < chars.len() && !can_split_word(chars[end]) {
        end += 1;
    }
    (start, end, end - start)
}

/// Find where the next word starts after `current`, walking forward until
/// the line would overflow `width` or text runs out, matching
/// `find_next_word_start`.
fn find_next_word_start(chars: &[char], mut current: usize, width: usize) -> usize {
    let len = chars.len();
    let mut last_large_word_start = current;
    let mut x = 0usize;

    while current < len {
        if can_split_word(chars[current]) || current + 1 == len {
            last_large_word_start = current + 1;
        }
        x += 1;
        if x >= width {
            break;
        }
        current += 1;
    }

    last_large_word_start
}

#[cfg(test)]
mod tests {
    use super::*;
    use ruma::event_id;

    fn msg(body: &str) -> Message {
        Message::new(event_id!("$1:h").to_owned(), 1, "@a:h".into(), "alice".into(), body.into(), None, false)
    }

    #[test]
    fn short_message_is_a_single_line() {
        let mut buf = MessageBuffer::new();
        let bounds = ViewBounds { x1: 0, x2: 80 };
        buf.insert(&msg("hello"), bounds);
        assert_eq!(buf.lines().len(), 1);
    }

    #[test]
    fn redact_removes_all_lines_for_the_message() {
        let mut buf = MessageBuffer::new();
        let bounds = ViewBounds { x1: 0, x2: 20 };
        let long = "a".repeat(200);
        buf.insert(&msg(&long), bounds);
        assert!(buf.lines().len() > 1);

        let event_id = event_id!("$1:h");
        assert!(buf.redact(event_id));
        assert!(buf.lines().is_empty());
    }

    #[test]
    fn should_recalculate_on_width_change() {
        let mut buf = MessageBuffer::new();
        let bounds = ViewBounds { x1: 0, x2: 80 };
        assert!(buf.should_recalculate(bounds));
        buf.insert(&msg("hi"), bounds);
        assert!(!buf.should_recalculate(bounds));
        assert!(buf.should_recalculate(ViewBounds { x1: 0, x2: 40 }));
    }
}
