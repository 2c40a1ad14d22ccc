//! Minimal server-sent-events frame parser for the realtime stream.
//!
//! Only the subset of the SSE wire format the remote store emits is
//! handled: `event:` and `data:` lines, comment lines, and blank-line
//! message boundaries. `id:` and `retry:` lines are ignored.

/// One decoded SSE message.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SseMessage {
    /// Event name; empty when the stream omitted the `event:` line
    pub event: String,
    /// Concatenated data payload
    pub data: String,
}

impl SseMessage {
    fn is_empty(&self) -> bool {
        self.event.is_empty() && self.data.is_empty()
    }
}

/// Incremental SSE decoder; feed it raw chunks, collect complete messages.
#[derive(Debug, Default)]
pub struct SseParser {
    buffer: String,
    current: SseMessage,
}

impl SseParser {
    /// Create an empty parser.
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed one chunk of bytes; returns every message completed by it.
    ///
    /// Invalid UTF-8 is replaced rather than treated as an error; a garbled
    /// line at worst drops one event, never the stream.
    pub fn feed(&mut self, chunk: &[u8]) -> Vec<SseMessage> {
        self.buffer.push_str(&String::from_utf8_lossy(chunk));

        let mut messages = Vec::new();
        while let Some(newline) = self.buffer.find('\n') {
            let line: String = self.buffer.drain(..=newline).collect();
            let line = line.trim_end_matches(['\n', '\r']);

            if line.is_empty() {
                if !self.current.is_empty() {
                    messages.push(std::mem::take(&mut self.current));
                }
                continue;
            }
            if line.starts_with(':') {
                continue;
            }

            let (field, value) = match line.split_once(':') {
                Some((field, value)) => (field, value.strip_prefix(' ').unwrap_or(value)),
                None => (line, ""),
            };
            match field {
                "event" => self.current.event = value.to_string(),
                "data" => {
                    if !self.current.data.is_empty() {
                        self.current.data.push('\n');
                    }
                    self.current.data.push_str(value);
                }
                _ => {}
            }
        }
        messages
    }
}
