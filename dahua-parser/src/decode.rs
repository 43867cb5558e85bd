//! Best-effort text decoding

/// Decode `bytes` as UTF-8, dropping every invalid sequence.
///
/// Unlike [`String::from_utf8_lossy`] no replacement character is inserted,
/// so a stray byte in the middle of a line does not change its content.
pub fn decode_lossy(bytes: &[u8]) -> String {
    let mut text = String::with_capacity(bytes.len());
    for chunk in bytes.utf8_chunks() {
        text.push_str(chunk.valid());
    }
    text
}
