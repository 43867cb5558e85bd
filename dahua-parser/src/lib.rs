//! # dahua-parser
//!
//! Parsing for the line protocol streamed by Dahua devices on
//! `/cgi-bin/eventManager.cgi?action=attach`.
//!
//! The device keeps the HTTP response open and writes one line per event:
//!
//! ```text
//! Code=VideoMotion;action=Start;index=0
//! ```
//!
//! This crate turns raw byte chunks from that stream into [`EventRecord`]s.
//! It does no I/O and keeps no connection state, apart from the optional
//! [`LineAssembler`] that stitches lines split across network reads.
//!
//! ## Usage
//!
//! ```rust
//! use dahua_parser::{parse_chunk, ChannelMap};
//!
//! let channels = ChannelMap::from_iter([(1, "Front Door")]);
//! let parsed = parse_chunk(b"Code=VideoMotion;action=Start;index=1\r\n", "nvr", &channels);
//!
//! assert_eq!(parsed.records.len(), 1);
//! assert_eq!(parsed.records[0].channel_label.as_deref(), Some("Front Door"));
//! ```

pub mod assembler;
pub mod channels;
pub mod chunk;
pub mod decode;
pub mod error;
pub mod line;
pub mod record;

pub use assembler::LineAssembler;
pub use channels::ChannelMap;
pub use chunk::{parse_chunk, ParsedChunk, EVENT_LINE_PREFIX, STATUS_OK_LINE};
pub use decode::decode_lossy;
pub use error::ParseError;
pub use line::parse_event_line;
pub use record::EventRecord;
