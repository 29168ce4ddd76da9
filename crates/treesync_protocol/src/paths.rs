//! Relative-path safety validation.
//!
//! Every path carried on the wire is a slash-normalized path relative to
//! the synchronized root. A path that could resolve outside the root is
//! rejected before it ever reaches the filesystem.

use crate::error::{ProtocolError, ProtocolResult};

/// Validates a wire path against the safety invariant.
///
/// A valid path is non-empty, uses `/` separators only, is relative, and
/// contains no `.` or `..` segments.
pub fn validate(path: &str) -> ProtocolResult<()> {
    let unsafe_path = |reason: &'static str| ProtocolError::UnsafePath {
        path: path.to_string(),
        reason,
    };

    if path.is_empty() {
        return Err(unsafe_path("empty path"));
    }
    if path.contains('\0') {
        return Err(unsafe_path("contains NUL byte"));
    }
    if path.contains('\\') {
        return Err(unsafe_path("contains backslash separator"));
    }
    if path.starts_with('/') {
        return Err(unsafe_path("absolute path"));
    }
    for segment in path.split('/') {
        match segment {
            "" => return Err(unsafe_path("empty path segment")),
            "." | ".." => return Err(unsafe_path("relative path segment")),
            _ => {}
        }
    }
    Ok(())
}
