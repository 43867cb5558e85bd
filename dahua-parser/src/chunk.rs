//! Parsing of raw byte chunks from the event stream

use crate::channels::ChannelMap;
use crate::decode::decode_lossy;
use crate::error::ParseError;
use crate::line::parse_event_line;
use crate::record::EventRecord;

/// Status line that marks a successfully attached stream
pub const STATUS_OK_LINE: &str = "HTTP/1.1 200 OK";

/// Prefix of every event line
pub const EVENT_LINE_PREFIX: &str = "Code=";

/// Everything extracted from one chunk
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParsedChunk {
    /// Event records, in the order their lines appeared
    pub records: Vec<EventRecord>,

    /// Whether the chunk contained the success status line
    pub connected: bool,

    /// Segments skipped while parsing event lines
    pub errors: Vec<ParseError>,
}

/// Parse a chunk of bytes received on a device's connection.
///
/// Lines are CRLF separated. The success status line sets
/// [`ParsedChunk::connected`], `Code=` lines become records, and every
/// other line (headers, multipart boundaries, keep-alive blanks) is ignored.
pub fn parse_chunk(bytes: &[u8], device_name: &str, channels: &ChannelMap) -> ParsedChunk {
    let text = decode_lossy(bytes);
    let mut parsed = ParsedChunk::default();

    for line in text.split("\r\n") {
        if line == STATUS_OK_LINE {
            parsed.connected = true;
            continue;
        }

        if !line.starts_with(EVENT_LINE_PREFIX) {
            continue;
        }

        let (record, errors) = parse_event_line(line, device_name, channels);
        parsed.records.push(record);
        parsed.errors.extend(errors);
    }

    parsed
}
