//! Content-hash memory used to tell genuine changes from echoes.

use parking_lot::Mutex;
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use treesync_protocol::ChangeEvent;

/// SHA-256 fingerprint of file content.
type Fingerprint = [u8; 32];

fn fingerprint(content: &str) -> Fingerprint {
    Sha256::digest(content.as_bytes()).into()
}

/// Per-path fingerprints of the last content this process sent or applied.
///
/// The cache is the echo suppressor: after a remote change is written to
/// disk, the watch adapter observes our own write and reports it as a
/// local event. [`HashCache::should_send`] recognizes that event's content
/// as already-known and suppresses it, breaking the propagation loop.
///
/// Scoped to the running process; never persisted.
#[derive(Debug, Default)]
pub struct HashCache {
    entries: Mutex<HashMap<String, Fingerprint>>,
}

impl HashCache {
    /// Creates an empty cache.
    pub fn new() -> Self {
        Self::default()
    }

    /// Decides whether a locally observed change is genuinely new.
    ///
    /// Returns false (suppress) when `content` matches the cached
    /// fingerprint for `path`. Otherwise records the new fingerprint and
    /// returns true.
    pub fn should_send(&self, path: &str, content: &str) -> bool {
        let fp = fingerprint(content);
        let mut entries = self.entries.lock();
        if entries.get(path) == Some(&fp) {
            return false;
        }
        entries.insert(path.to_string(), fp);
        true
    }

    /// Records a remotely-originated write so its local echo is
    /// suppressed.
    pub fn mark_applied(&self, path: &str, content: &str) {
        self.entries
            .lock()
            .insert(path.to_string(), fingerprint(content));
    }

    /// Drops the entry for a deleted path.
    pub fn forget(&self, path: &str) {
        self.entries.lock().remove(path);
    }

    /// Moves an entry to a renamed path without recomputation.
    pub fn on_rename(&self, old_path: &str, new_path: &str) {
        let mut entries = self.entries.lock();
        if let Some(fp) = entries.remove(old_path) {
            entries.insert(new_path.to_string(), fp);
        }
    }

    /// Performs the bookkeeping for a successfully applied remote event.
    pub fn record_applied(&self, event: &ChangeEvent) {
        match event {
            ChangeEvent::Create { path, content } | ChangeEvent::Modify { path, content } => {
                self.mark_applied(path, content);
            }
            ChangeEvent::Delete { path } => self.forget(path),
            ChangeEvent::Rename { old_path, path } => self.on_rename(old_path, path),
        }
    }

    /// Returns true if the cache tracks `path`.
    pub fn contains(&self, path: &str) -> bool {
        self.entries.lock().contains_key(path)
    }

    /// Number of tracked paths.
    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    /// Returns true if no paths are tracked.
    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_sighting_is_novel() {
        let cache = HashCache::new();
        assert!(cache.should_send("a.txt", "hello"));
        assert!(cache.contains("a.txt"));
    }

    #[test]
    fn repeated_content_is_suppressed() {
        let cache = HashCache::new();
        assert!(cache.should_send("a.txt", "hello"));
        assert!(!cache.should_send("a.txt", "hello"));
        assert!(cache.should_send("a.txt", "changed"));
        assert!(!cache.should_send("a.txt", "changed"));
    }

    #[test]
    fn mark_applied_suppresses_echo() {
        let cache = HashCache::new();
        cache.mark_applied("f.txt", "v2");
        // The watch notification for our own write is an echo.
        assert!(!cache.should_send("f.txt", "v2"));
        // A genuinely new edit still goes out.
        assert!(cache.should_send("f.txt", "v3"));
    }

    #[test]
    fn forget_removes_entry() {
        let cache = HashCache::new();
        cache.mark_applied("a.txt", "x");
        cache.forget("a.txt");
        assert!(!cache.contains("a.txt"));
        assert!(cache.should_send("a.txt", "x"));
    }

    #[test]
    fn forget_absent_is_noop() {
        let cache = HashCache::new();
        cache.forget("never-seen");
        assert!(cache.is_empty());
    }

    #[test]
    fn rename_moves_fingerprint() {
        let cache = HashCache::new();
        cache.mark_applied("x.txt", "content");
        cache.on_rename("x.txt", "y.txt");

        assert!(!cache.contains("x.txt"));
        assert!(cache.contains("y.txt"));
        // Fingerprint travelled with the key: same content under the new
        // name is still an echo.
        assert!(!cache.should_send("y.txt", "content"));
    }

    #[test]
    fn rename_of_untracked_path_is_noop() {
        let cache = HashCache::new();
        cache.on_rename("a.txt", "b.txt");
        assert!(cache.is_empty());
    }

    #[test]
    fn record_applied_dispatches() {
        let cache = HashCache::new();

        cache.record_applied(&ChangeEvent::create("a.txt", "one"));
        assert!(!cache.should_send("a.txt", "one"));

        cache.record_applied(&ChangeEvent::rename("a.txt", "b.txt"));
        assert!(!cache.contains("a.txt"));
        assert!(!cache.should_send("b.txt", "one"));

        cache.record_applied(&ChangeEvent::delete("b.txt"));
        assert!(cache.is_empty());
    }
}
