//! Full-tree scanning and installation for the initial sync handshake.

use crate::applier::Applier;
use crate::hash_cache::HashCache;
use crate::relpath::wire_path;
use std::fs;
use std::io;
use std::path::Path;
use tracing::warn;
use treesync_protocol::{ChangeEvent, SnapshotMessage};

/// Recursively reads every regular file under `root` into a snapshot.
///
/// File bytes are read as lossy UTF-8, so the resulting contents are
/// always valid wire strings. A missing root yields an empty snapshot.
pub fn scan_tree(root: &Path) -> io::Result<SnapshotMessage> {
    let mut snapshot = SnapshotMessage::new();
    if root.is_dir() {
        scan_into(root, root, &mut snapshot)?;
    }
    Ok(snapshot)
}

fn scan_into(root: &Path, dir: &Path, snapshot: &mut SnapshotMessage) -> io::Result<()> {
    for entry in fs::read_dir(dir)? {
        let entry = entry?;
        let path = entry.path();
        let file_type = entry.file_type()?;
        if file_type.is_dir() {
            scan_into(root, &path, snapshot)?;
        } else if file_type.is_file() {
            let Some(rel) = wire_path(root, &path) else {
                continue;
            };
            let bytes = fs::read(&path)?;
            snapshot.insert(rel, String::from_utf8_lossy(&bytes).into_owned());
        }
    }
    Ok(())
}

/// Installs every snapshot entry into the local tree.
///
/// Each written file is recorded in the hash cache so the watch adapter's
/// notifications for these writes are suppressed. Installation never
/// broadcasts. An entry that fails to apply is logged and skipped; the
/// rest of the snapshot still installs. Returns the number of files
/// installed.
pub fn apply_snapshot(
    applier: &Applier,
    cache: &HashCache,
    snapshot: &SnapshotMessage,
) -> usize {
    let mut installed = 0;
    for (path, content) in snapshot.iter() {
        match applier.apply(&ChangeEvent::create(path, content)) {
            Ok(_) => {
                cache.mark_applied(path, content);
                installed += 1;
            }
            Err(e) => warn!(path, error = %e, "failed to install snapshot entry"),
        }
    }
    installed
}
