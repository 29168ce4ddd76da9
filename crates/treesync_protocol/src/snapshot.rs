//! Full-tree snapshot for the initial sync handshake.

use crate::error::ProtocolResult;
use crate::paths;
use std::collections::BTreeMap;

/// A full path-to-content mapping of the shared tree.
///
/// Sent by the accepting side as the first message on a new connection,
/// before any live change events.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SnapshotMessage {
    files: BTreeMap<String, String>,
}

impl SnapshotMessage {
    /// Creates an empty snapshot.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a file to the snapshot, replacing any previous entry.
    pub fn insert(&mut self, path: impl Into<String>, content: impl Into<String>) {
        self.files.insert(path.into(), content.into());
    }

    /// Iterates over the `(path, content)` entries in path order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.files.iter().map(|(p, c)| (p.as_str(), c.as_str()))
    }

    /// Returns the content for a path, if present.
    pub fn get(&self, path: &str) -> Option<&str> {
        self.files.get(path).map(String::as_str)
    }

    /// Number of files in the snapshot.
    pub fn len(&self) -> usize {
        self.files.len()
    }

    /// Returns true if the snapshot contains no files.
    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    /// Validates every path key against the safety invariant.
    pub fn validate(&self) -> ProtocolResult<()> {
        for path in self.files.keys() {
            paths::validate(path)?;
        }
        Ok(())
    }
}

impl FromIterator<(String, String)> for SnapshotMessage {
    fn from_iter<I: IntoIterator<Item = (String, String)>>(iter: I) -> Self {
        Self {
            files: iter.into_iter().collect(),
        }
    }
}
