//! Server-Sent Events framing.
//!
//! ```text
//! : connected
//!
//! id: 3
//! event: msg
//! data: hello
//!
//! event: timeout
//! data: 60s
//! ```
//!
//! Multi-line message text is split over several `data:` lines, which SSE
//! clients join back with `\n`. A bare `\r` ends a line too, so message text
//! can never start a field of its own.

use std::fmt::Write;

use crate::stream::StreamEvent;

pub const CONTENT_TYPE: &str = "text/event-stream";

pub const MSG_EVENT: &str = "msg";
pub const TIMEOUT_EVENT: &str = "timeout";

/// Appends the SSE frame for `event` to `buf`.
pub fn encode_into(buf: &mut String, event: &StreamEvent) {
    match event {
        StreamEvent::Established => buf.push_str(": connected\n"),
        StreamEvent::Message(message) => {
            let _ = writeln!(buf, "id: {}", message.id());
            let _ = writeln!(buf, "event: {MSG_EVENT}");
            for line in lines(message.text()) {
                let _ = writeln!(buf, "data: {line}");
            }
        }
        StreamEvent::Timeout { elapsed } => {
            let _ = writeln!(buf, "event: {TIMEOUT_EVENT}");
            let _ = writeln!(buf, "data: {}s", elapsed.as_secs());
        }
    }
    buf.push('\n');
}

/// Splits on every SSE line terminator: `\r\n`, `\r` and `\n`.
fn lines(text: &str) -> impl Iterator<Item = &str> {
    text.split("\r\n").flat_map(|line| line.split(['\r', '\n']))
}

pub fn encode(event: &StreamEvent) -> String {
    let mut buf = String::new();
    encode_into(&mut buf, event);
    buf
}
