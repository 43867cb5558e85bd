//! Parsing of a single `Code=...` event line

use crate::channels::ChannelMap;
use crate::error::ParseError;
use crate::record::EventRecord;

/// Parse one event line into a record.
///
/// The line is split on `;` and every segment on its first `=`, so values
/// may themselves contain `=`. Segments without `=` are skipped and
/// returned alongside the record. A repeated key keeps its last value.
///
/// The caller is expected to have checked the `Code=` prefix already.
pub fn parse_event_line(
    line: &str,
    device_name: &str,
    channels: &ChannelMap,
) -> (EventRecord, Vec<ParseError>) {
    let mut record = EventRecord::new(device_name);
    let mut errors = Vec::new();

    for segment in line.split(';') {
        match segment.split_once('=') {
            Some((key, value)) => {
                record.fields.insert(key.to_string(), value.to_string());
            }
            // Dahua terminates some lines with ';'
            None if segment.is_empty() => {}
            None => errors.push(ParseError::MissingSeparator {
                segment: segment.to_string(),
            }),
        }
    }

    record.channel_label = record
        .index()
        .and_then(|index| channels.resolve(index))
        .map(str::to_string);

    (record, errors)
}
