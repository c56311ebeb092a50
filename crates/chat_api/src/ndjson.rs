use std::sync::OnceLock;

use regex::Regex;
use serde_json::Value;

use crate::events::TokenEvent;

/// Incremental parser for newline-delimited JSON token streams.
///
/// Bytes go in via [`feed`](Self::feed) in whatever chunks the transport
/// produces; complete records come out as [`TokenEvent`]s. Malformed records
/// are dropped, never surfaced. Call [`finish`](Self::finish) exactly once
/// after end of stream to flush the residual buffer.
#[derive(Debug, Default)]
pub struct TokenStreamParser {
    /// Trailing bytes of an incomplete UTF-8 sequence, held across chunks.
    carry: Vec<u8>,
    buffer: String,
}

impl TokenStreamParser {
    /// Feed arbitrary bytes into the parser and drain complete records.
    pub fn feed(&mut self, bytes: &[u8]) -> Vec<TokenEvent> {
        self.decode_chunk(bytes);

        let mut events = Vec::new();
        while let Some(split) = self.buffer.find('\n') {
            let line = self.buffer[..split].to_string();
            self.buffer.drain(0..=split);
            parse_record(line.trim(), &mut events);
        }

        events
    }

    /// Parse a complete stream payload in one shot, including the residual
    /// buffer flush.
    pub fn parse_payload(input: &str) -> Vec<TokenEvent> {
        let mut parser = Self::default();
        let mut events = parser.feed(input.as_bytes());
        events.extend(parser.finish());
        events
    }

    /// Flush the residual buffer after end of stream.
    ///
    /// A stream that ends mid-record is not an error; the trailing fragment
    /// gets one parse attempt and is otherwise discarded.
    pub fn finish(&mut self) -> Vec<TokenEvent> {
        if !self.carry.is_empty() {
            let carry = std::mem::take(&mut self.carry);
            self.buffer.push_str(&String::from_utf8_lossy(&carry));
        }

        let rest = std::mem::take(&mut self.buffer);
        let mut events = Vec::new();
        let trimmed = rest.trim();
        if !trimmed.is_empty() {
            if let Ok(value) = serde_json::from_str::<Value>(trimmed) {
                if let Some(event) = map_event(&value) {
                    events.push(event);
                }
            }
        }

        events
    }

    pub fn is_empty_buffer(&self) -> bool {
        self.carry.is_empty() && self.buffer.trim().is_empty()
    }

    /// Decode a chunk into the text buffer, preserving a multi-byte character
    /// split across chunk boundaries. Invalid sequences decode to U+FFFD.
    fn decode_chunk(&mut self, bytes: &[u8]) {
        self.carry.extend_from_slice(bytes);
        let mut pending = std::mem::take(&mut self.carry);
        let mut offset = 0;

        while offset < pending.len() {
            match std::str::from_utf8(&pending[offset..]) {
                Ok(text) => {
                    self.buffer.push_str(text);
                    offset = pending.len();
                }
                Err(error) => {
                    let valid = error.valid_up_to();
                    self.buffer
                        .push_str(&String::from_utf8_lossy(&pending[offset..offset + valid]));
                    match error.error_len() {
                        Some(invalid) => {
                            self.buffer.push(char::REPLACEMENT_CHARACTER);
                            offset += valid + invalid;
                        }
                        None => {
                            // Incomplete trailing sequence; wait for more bytes.
                            self.carry = pending.split_off(offset + valid);
                            return;
                        }
                    }
                }
            }
        }
    }
}

fn parse_record(line: &str, events: &mut Vec<TokenEvent>) {
    if line.is_empty() {
        return;
    }

    if let Ok(value) = serde_json::from_str::<Value>(line) {
        if let Some(event) = map_event(&value) {
            events.push(event);
        }
        return;
    }

    // The upstream sometimes chunks mid-record or concatenates records onto
    // one line. Salvage every brace-delimited object that parses on its own.
    for candidate in embedded_object_regex().find_iter(line) {
        if let Ok(value) = serde_json::from_str::<Value>(candidate.as_str()) {
            if let Some(event) = map_event(&value) {
                events.push(event);
            }
        }
    }
}

fn map_event(value: &Value) -> Option<TokenEvent> {
    let text = value.get("text")?.as_str()?;
    if text.is_empty() {
        return None;
    }
    Some(TokenEvent::new(text))
}

fn embedded_object_regex() -> &'static Regex {
    static CACHED: OnceLock<Regex> = OnceLock::new();
    CACHED.get_or_init(|| Regex::new(r"\{[^}]+\}").expect("salvage regex must compile"))
}

#[cfg(test)]
mod tests {
    use super::TokenStreamParser;

    #[test]
    fn parse_records_incrementally() {
        let mut parser = TokenStreamParser::default();
        let mut events = Vec::new();

        events.extend(parser.feed(b"{\"text\":\"Hel"));
        assert!(events.is_empty());

        events.extend(parser.feed(b"lo\"}\n{\"text\":\" there\"}\n"));
        assert_eq!(events.len(), 2);
        assert_eq!(events[0].text, "Hello");
        assert_eq!(events[1].text, " there");

        events.extend(parser.finish());
        assert_eq!(events.len(), 2);
        assert!(parser.is_empty_buffer());
    }

    #[test]
    fn multibyte_character_split_across_chunks_survives() {
        let payload = "{\"text\":\"caf\u{00e9} \u{1f30d}\"}\n".as_bytes();
        let mut parser = TokenStreamParser::default();
        let mut events = Vec::new();

        for byte in payload {
            events.extend(parser.feed(std::slice::from_ref(byte)));
        }

        assert_eq!(events.len(), 1);
        assert_eq!(events[0].text, "caf\u{00e9} \u{1f30d}");
    }

    #[test]
    fn finish_parses_trailing_record_without_newline() {
        let mut parser = TokenStreamParser::default();
        assert!(parser.feed(b"{\"text\":\"tail\"}").is_empty());

        let events = parser.finish();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].text, "tail");
    }
}
