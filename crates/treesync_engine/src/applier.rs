//! Idempotent application of change events to a local directory tree.

use crate::error::{ApplyError, ApplyResult};
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;
use tracing::debug;
use treesync_protocol::ChangeEvent;

/// What applying an event did to the tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApplyOutcome {
    /// The tree was mutated.
    Applied,
    /// The event was a no-op (absent delete target or rename source).
    Skipped,
}

/// Applies decoded change events to a directory tree.
///
/// Writes are atomic: content lands in a temp file in the target's
/// directory and is renamed into place, so a concurrent reader never
/// observes a partially-written file. The temp file's dotted name falls
/// inside the watch adapter's artifact filter.
#[derive(Debug, Clone)]
pub struct Applier {
    root: PathBuf,
}

impl Applier {
    /// Creates an applier rooted at `root`.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// The synchronized root.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Applies one event. Applying the same event twice leaves the tree
    /// in the same state as applying it once.
    pub fn apply(&self, event: &ChangeEvent) -> ApplyResult<ApplyOutcome> {
        event.validate()?;
        match event {
            ChangeEvent::Create { path, content } | ChangeEvent::Modify { path, content } => {
                self.write_file(path, content)
            }
            ChangeEvent::Delete { path } => self.remove_file(path),
            ChangeEvent::Rename { old_path, path } => self.rename_file(old_path, path),
        }
    }

    fn resolve(&self, rel: &str) -> PathBuf {
        // `rel` passed event.validate(), so joining cannot escape root.
        self.root.join(rel)
    }

    fn write_file(&self, rel: &str, content: &str) -> ApplyResult<ApplyOutcome> {
        let target = self.resolve(rel);
        let parent = target.parent().unwrap_or(&self.root);
        fs::create_dir_all(parent).map_err(|e| ApplyError::io("create directories", rel, e))?;

        let mut tmp =
            NamedTempFile::new_in(parent).map_err(|e| ApplyError::io("create temp file", rel, e))?;
        tmp.write_all(content.as_bytes())
            .map_err(|e| ApplyError::io("write", rel, e))?;
        tmp.persist(&target)
            .map_err(|e| ApplyError::io("rename into place", rel, e.error))?;
        Ok(ApplyOutcome::Applied)
    }

    fn remove_file(&self, rel: &str) -> ApplyResult<ApplyOutcome> {
        match fs::remove_file(self.resolve(rel)) {
            Ok(()) => Ok(ApplyOutcome::Applied),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!(path = rel, "delete target already absent");
                Ok(ApplyOutcome::Skipped)
            }
            Err(e) => Err(ApplyError::io("delete", rel, e)),
        }
    }

    fn rename_file(&self, old_rel: &str, new_rel: &str) -> ApplyResult<ApplyOutcome> {
        let from = self.resolve(old_rel);
        if !from.exists() {
            // The target may already exist from a prior duplicate event.
            debug!(from = old_rel, to = new_rel, "rename source absent, dropping");
            return Ok(ApplyOutcome::Skipped);
        }
        let to = self.resolve(new_rel);
        let parent = to.parent().unwrap_or(&self.root);
        fs::create_dir_all(parent)
            .map_err(|e| ApplyError::io("create directories", new_rel, e))?;
        fs::rename(&from, &to).map_err(|e| ApplyError::io("rename", new_rel, e))?;
        Ok(ApplyOutcome::Applied)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn read(root: &Path, rel: &str) -> String {
        fs::read_to_string(root.join(rel)).unwrap()
    }

    #[test]
    fn create_makes_intermediate_directories() {
        let dir = TempDir::new().unwrap();
        let applier = Applier::new(dir.path());

        let outcome = applier
            .apply(&ChangeEvent::create("deep/nested/file.txt", "hello"))
            .unwrap();

        assert_eq!(outcome, ApplyOutcome::Applied);
        assert_eq!(read(dir.path(), "deep/nested/file.txt"), "hello");
    }

    #[test]
    fn modify_overwrites() {
        let dir = TempDir::new().unwrap();
        let applier = Applier::new(dir.path());

        applier.apply(&ChangeEvent::create("f.txt", "v1")).unwrap();
        applier.apply(&ChangeEvent::modify("f.txt", "v2")).unwrap();

        assert_eq!(read(dir.path(), "f.txt"), "v2");
    }

    #[test]
    fn apply_is_idempotent() {
        let dir = TempDir::new().unwrap();
        let applier = Applier::new(dir.path());
        let event = ChangeEvent::modify("f.txt", "same");

        applier.apply(&event).unwrap();
        applier.apply(&event).unwrap();

        assert_eq!(read(dir.path(), "f.txt"), "same");
        assert_eq!(fs::read_dir(dir.path()).unwrap().count(), 1);
    }

    #[test]
    fn delete_removes_file() {
        let dir = TempDir::new().unwrap();
        let applier = Applier::new(dir.path());

        applier.apply(&ChangeEvent::create("f.txt", "x")).unwrap();
        let outcome = applier.apply(&ChangeEvent::delete("f.txt")).unwrap();

        assert_eq!(outcome, ApplyOutcome::Applied);
        assert!(!dir.path().join("f.txt").exists());
    }

    #[test]
    fn delete_of_absent_path_is_noop() {
        let dir = TempDir::new().unwrap();
        let applier = Applier::new(dir.path());

        let outcome = applier.apply(&ChangeEvent::delete("never-existed.txt")).unwrap();
        assert_eq!(outcome, ApplyOutcome::Skipped);
    }

    #[test]
    fn rename_moves_content() {
        let dir = TempDir::new().unwrap();
        let applier = Applier::new(dir.path());

        applier.apply(&ChangeEvent::create("x.txt", "data")).unwrap();
        let outcome = applier
            .apply(&ChangeEvent::rename("x.txt", "sub/y.txt"))
            .unwrap();

        assert_eq!(outcome, ApplyOutcome::Applied);
        assert!(!dir.path().join("x.txt").exists());
        assert_eq!(read(dir.path(), "sub/y.txt"), "data");
    }

    #[test]
    fn rename_with_absent_source_is_dropped() {
        let dir = TempDir::new().unwrap();
        let applier = Applier::new(dir.path());

        let outcome = applier
            .apply(&ChangeEvent::rename("ghost.txt", "y.txt"))
            .unwrap();

        assert_eq!(outcome, ApplyOutcome::Skipped);
        assert!(!dir.path().join("y.txt").exists());
    }

    #[test]
    fn rejects_escaping_paths() {
        let dir = TempDir::new().unwrap();
        let applier = Applier::new(dir.path());

        let err = applier
            .apply(&ChangeEvent::create("../outside.txt", "x"))
            .unwrap_err();
        assert!(matches!(err, ApplyError::UnsafePath(_)));
    }

    #[test]
    fn no_temp_files_left_behind() {
        let dir = TempDir::new().unwrap();
        let applier = Applier::new(dir.path());

        applier.apply(&ChangeEvent::create("f.txt", "x")).unwrap();

        let names: Vec<_> = fs::read_dir(dir.path())
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names, vec!["f.txt"]);
    }
}
