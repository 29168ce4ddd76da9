//! Error types for the wire protocol.

use thiserror::Error;

/// Result type for protocol operations.
pub type ProtocolResult<T> = Result<T, ProtocolError>;

/// Errors that can occur while encoding or decoding wire records.
#[derive(Error, Debug)]
pub enum ProtocolError {
    /// A line that cannot be parsed into a well-formed record.
    #[error("malformed wire record `{line}`: {reason}")]
    Malformed {
        /// The offending line (truncated for display).
        line: String,
        /// Why it failed to parse.
        reason: String,
    },

    /// A path that violates the relative-path safety invariant.
    #[error("unsafe path `{path}`: {reason}")]
    UnsafePath {
        /// The offending path.
        path: String,
        /// Which rule it violates.
        reason: &'static str,
    },

    /// Serialization failed while encoding a record.
    #[error("encode error: {0}")]
    Encode(#[from] serde_json::Error),
}

impl ProtocolError {
    /// Creates a malformed-record error, truncating long lines.
    pub fn malformed(line: &str, reason: impl Into<String>) -> Self {
        const MAX_PREVIEW: usize = 120;
        let line = if line.len() > MAX_PREVIEW {
            let cut = line
                .char_indices()
                .take_while(|(i, _)| *i < MAX_PREVIEW)
                .last()
                .map(|(i, c)| i + c.len_utf8())
                .unwrap_or(0);
            format!("{}...", &line[..cut])
        } else {
            line.to_string()
        };
        Self::Malformed {
            line,
            reason: reason.into(),
        }
    }
}
