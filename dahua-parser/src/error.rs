//! Error types for event line parsing
//!
//! Nothing here aborts a chunk. Parsing always produces a result; these
//! errors are collected next to it so the caller can log what was skipped.

use thiserror::Error;

/// Problems found while parsing a single event line
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ParseError {
    /// A `;`-separated segment had no `=` and was skipped
    #[error("segment {segment:?} has no '=' separator")]
    MissingSeparator {
        /// The offending segment, verbatim
        segment: String,
    },
}
