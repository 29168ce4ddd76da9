//! Filesystem watch adapter.
//!
//! Bridges `notify` events into a tokio channel of [`FsEvent`]s with
//! wire-relative paths, and turns those into outbound [`ChangeEvent`]s
//! gated by the hash cache.

use crate::hash_cache::HashCache;
use crate::relpath::wire_path;
use notify::event::{ModifyKind, RemoveKind, RenameMode};
use notify::{Config, Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use std::fs;
use std::path::{Path, PathBuf};
use tokio::sync::mpsc;
use tracing::{debug, warn};
use treesync_protocol::ChangeEvent;

/// A raw filesystem event, with paths relative to the watch root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FsEvent {
    /// A file appeared.
    Created(String),
    /// A file's content changed.
    Modified(String),
    /// A file disappeared.
    Deleted(String),
    /// A file moved within the tree.
    Moved {
        /// Pre-move relative path.
        from: String,
        /// Post-move relative path.
        to: String,
    },
}

/// Keeps the underlying watcher alive; dropping it stops the watch.
#[derive(Debug)]
pub struct WatcherHandle {
    _watcher: RecommendedWatcher,
}

/// Starts watching `root` recursively.
///
/// Returns the event receiver and a handle that must be kept alive for
/// the duration of the watch. Directory-only events are dropped before
/// they reach the channel. Must be called from within a tokio runtime.
pub fn spawn_watcher(
    root: PathBuf,
) -> Result<(mpsc::Receiver<FsEvent>, WatcherHandle), notify::Error> {
    let (raw_tx, mut raw_rx) = mpsc::channel::<Result<Event, notify::Error>>(256);
    let mut watcher = RecommendedWatcher::new(
        move |res| {
            let _ = raw_tx.blocking_send(res);
        },
        Config::default(),
    )?;
    watcher.watch(&root, RecursiveMode::Recursive)?;
    debug!(root = %root.display(), "watching");

    let (tx, rx) = mpsc::channel(256);
    tokio::spawn(async move {
        while let Some(res) = raw_rx.recv().await {
            match res {
                Ok(event) => {
                    for fs_event in translate(&root, event) {
                        if tx.send(fs_event).await.is_err() {
                            return;
                        }
                    }
                }
                Err(e) => warn!(error = %e, "filesystem watch error"),
            }
        }
    });

    Ok((rx, WatcherHandle { _watcher: watcher }))
}

fn translate(root: &Path, event: Event) -> Vec<FsEvent> {
    match event.kind {
        EventKind::Modify(ModifyKind::Name(mode)) => translate_rename(root, mode, &event.paths),
        EventKind::Remove(RemoveKind::Folder) => Vec::new(),
        kind if kind.is_create() || kind.is_modify() => {
            let Some((path, rel)) = first_path(root, &event.paths) else {
                return Vec::new();
            };
            if path.is_dir() {
                return Vec::new();
            }
            if kind.is_create() {
                vec![FsEvent::Created(rel)]
            } else {
                vec![FsEvent::Modified(rel)]
            }
        }
        kind if kind.is_remove() => match first_path(root, &event.paths) {
            Some((_, rel)) => vec![FsEvent::Deleted(rel)],
            None => Vec::new(),
        },
        _ => Vec::new(),
    }
}

fn translate_rename(root: &Path, mode: RenameMode, paths: &[PathBuf]) -> Vec<FsEvent> {
    match mode {
        RenameMode::Both if paths.len() == 2 => {
            let from = wire_path(root, &paths[0]);
            let to = wire_path(root, &paths[1]);
            match (from, to) {
                (Some(from), Some(to)) => {
                    if paths[1].is_dir() {
                        Vec::new()
                    } else {
                        vec![FsEvent::Moved { from, to }]
                    }
                }
                _ => Vec::new(),
            }
        }
        RenameMode::From => match first_path(root, paths) {
            Some((_, rel)) => vec![FsEvent::Deleted(rel)],
            None => Vec::new(),
        },
        RenameMode::To => match first_path(root, paths) {
            Some((path, rel)) if !path.is_dir() => vec![FsEvent::Created(rel)],
            _ => Vec::new(),
        },
        // The platform could not tell us the direction; infer from what
        // is on disk, the way one-sided renames are usually resolved.
        _ => match first_path(root, paths) {
            Some((path, rel)) => {
                if path.is_dir() {
                    Vec::new()
                } else if path.exists() {
                    vec![FsEvent::Created(rel)]
                } else {
                    vec![FsEvent::Deleted(rel)]
                }
            }
            None => Vec::new(),
        },
    }
}

fn first_path<'a>(root: &Path, paths: &'a [PathBuf]) -> Option<(&'a PathBuf, String)> {
    let path = paths.first()?;
    let rel = wire_path(root, path)?;
    Some((path, rel))
}

/// Returns true for transient or editor-artifact paths that must not
/// propagate: dotted segments, names ending in `~`, and `.tmp`/`.swp`/
/// `.lock` suffixes.
pub fn is_ignored(rel: &str) -> bool {
    if rel.split('/').any(|segment| segment.starts_with('.')) {
        return true;
    }
    let name = rel.rsplit('/').next().unwrap_or(rel);
    name.ends_with('~')
        || name.ends_with(".tmp")
        || name.ends_with(".swp")
        || name.ends_with(".lock")
}

/// Turns a raw event into an outbound change, consulting the hash cache
/// for novelty and keeping it current for local deletes and renames.
///
/// Returns `None` for ignored paths, unreadable files and echoes.
pub fn change_for_event(root: &Path, cache: &HashCache, event: FsEvent) -> Option<ChangeEvent> {
    match event {
        FsEvent::Created(rel) => read_novel(root, cache, &rel, true),
        FsEvent::Modified(rel) => read_novel(root, cache, &rel, false),
        FsEvent::Deleted(rel) => {
            if is_ignored(&rel) {
                return None;
            }
            cache.forget(&rel);
            Some(ChangeEvent::delete(rel))
        }
        FsEvent::Moved { from, to } => match (is_ignored(&from), is_ignored(&to)) {
            (true, true) => None,
            // An editor finishing an atomic write: temp file renamed onto
            // the real target.
            (true, false) => read_novel(root, cache, &to, false),
            (false, true) => {
                cache.forget(&from);
                Some(ChangeEvent::delete(from))
            }
            (false, false) => {
                cache.on_rename(&from, &to);
                Some(ChangeEvent::rename(from, to))
            }
        },
    }
}

fn read_novel(root: &Path, cache: &HashCache, rel: &str, created: bool) -> Option<ChangeEvent> {
    if is_ignored(rel) {
        return None;
    }
    // The file may already be gone again; that is not an error, the
    // delete event is on its way.
    let bytes = fs::read(root.join(rel)).ok()?;
    let content = String::from_utf8_lossy(&bytes).into_owned();
    if !cache.should_send(rel, &content) {
        debug!(path = rel, "suppressing echo");
        return None;
    }
    Some(if created {
        ChangeEvent::create(rel, content)
    } else {
        ChangeEvent::modify(rel, content)
    })
}
