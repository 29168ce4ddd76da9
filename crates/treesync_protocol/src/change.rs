//! Filesystem change records.

use crate::error::ProtocolResult;
use crate::paths;

/// A single filesystem mutation, the unit of propagation.
///
/// Each variant carries exactly the fields that are meaningful for its
/// action, so the "content present iff Create/Modify, oldPath present iff
/// Rename" invariant holds by construction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChangeEvent {
    /// A file was created.
    Create {
        /// Path relative to the synchronized root.
        path: String,
        /// Full UTF-8 content of the file.
        content: String,
    },
    /// A file's content changed.
    Modify {
        /// Path relative to the synchronized root.
        path: String,
        /// Full UTF-8 content of the file.
        content: String,
    },
    /// A file was removed.
    Delete {
        /// Path relative to the synchronized root.
        path: String,
    },
    /// A file was moved within the tree.
    Rename {
        /// The pre-rename relative path.
        old_path: String,
        /// The post-rename relative path.
        path: String,
    },
}

impl ChangeEvent {
    /// Creates a `Create` event.
    pub fn create(path: impl Into<String>, content: impl Into<String>) -> Self {
        Self::Create {
            path: path.into(),
            content: content.into(),
        }
    }

    /// Creates a `Modify` event.
    pub fn modify(path: impl Into<String>, content: impl Into<String>) -> Self {
        Self::Modify {
            path: path.into(),
            content: content.into(),
        }
    }

    /// Creates a `Delete` event.
    pub fn delete(path: impl Into<String>) -> Self {
        Self::Delete { path: path.into() }
    }

    /// Creates a `Rename` event.
    pub fn rename(old_path: impl Into<String>, path: impl Into<String>) -> Self {
        Self::Rename {
            old_path: old_path.into(),
            path: path.into(),
        }
    }

    /// The action name as it appears on the wire.
    pub fn action(&self) -> &'static str {
        match self {
            Self::Create { .. } => "Create",
            Self::Modify { .. } => "Modify",
            Self::Delete { .. } => "Delete",
            Self::Rename { .. } => "Rename",
        }
    }

    /// The target path of the event.
    pub fn path(&self) -> &str {
        match self {
            Self::Create { path, .. }
            | Self::Modify { path, .. }
            | Self::Delete { path }
            | Self::Rename { path, .. } => path,
        }
    }

    /// The file content, for `Create` and `Modify`.
    pub fn content(&self) -> Option<&str> {
        match self {
            Self::Create { content, .. } | Self::Modify { content, .. } => Some(content),
            _ => None,
        }
    }

    /// The pre-rename path, for `Rename`.
    pub fn old_path(&self) -> Option<&str> {
        match self {
            Self::Rename { old_path, .. } => Some(old_path),
            _ => None,
        }
    }

    /// Validates every path the event carries.
    pub fn validate(&self) -> ProtocolResult<()> {
        paths::validate(self.path())?;
        if let Some(old) = self.old_path() {
            paths::validate(old)?;
        }
        Ok(())
    }
}
