//! Line codec for the newline-delimited JSON wire format.
//!
//! Each record is one JSON object per line. A change record carries an
//! `action` tag plus the fields that action requires; a snapshot record is
//! marked by its `sync` field and is only legal as the first message on a
//! stream (the session enforces that, not the codec).

use crate::change::ChangeEvent;
use crate::error::{ProtocolError, ProtocolResult};
use crate::paths;
use crate::snapshot::SnapshotMessage;
use serde_json::{json, Map, Value};

/// A decoded wire record.
#[derive(Debug, Clone, PartialEq)]
pub enum WireMessage {
    /// A live change event.
    Change(ChangeEvent),
    /// A full-tree snapshot (handshake only).
    Snapshot(SnapshotMessage),
}

impl From<ChangeEvent> for WireMessage {
    fn from(event: ChangeEvent) -> Self {
        Self::Change(event)
    }
}

impl From<SnapshotMessage> for WireMessage {
    fn from(snapshot: SnapshotMessage) -> Self {
        Self::Snapshot(snapshot)
    }
}

/// Encodes a message as one self-delimited line, without the trailing
/// newline.
///
/// JSON string escaping guarantees the result contains no raw newline, so
/// any well-formed message encodes successfully.
pub fn encode_line(message: &WireMessage) -> ProtocolResult<String> {
    let value = match message {
        WireMessage::Change(event) => match event {
            ChangeEvent::Create { path, content } => {
                json!({"action": "Create", "path": path, "content": content})
            }
            ChangeEvent::Modify { path, content } => {
                json!({"action": "Modify", "path": path, "content": content})
            }
            ChangeEvent::Delete { path } => json!({"action": "Delete", "path": path}),
            ChangeEvent::Rename { old_path, path } => {
                json!({"action": "Rename", "path": path, "oldPath": old_path})
            }
        },
        WireMessage::Snapshot(snapshot) => {
            let files: Map<String, Value> = snapshot
                .iter()
                .map(|(path, content)| (path.to_string(), Value::from(content)))
                .collect();
            json!({"sync": true, "files": files})
        }
    };
    Ok(serde_json::to_string(&value)?)
}

/// Decodes one line into a wire message.
///
/// Fails with [`ProtocolError::Malformed`] for anything that is not a
/// well-formed record, and with [`ProtocolError::UnsafePath`] when a
/// carried path violates the safety invariant.
pub fn decode_line(line: &str) -> ProtocolResult<WireMessage> {
    let value: Value = serde_json::from_str(line)
        .map_err(|e| ProtocolError::malformed(line, e.to_string()))?;
    let map = value
        .as_object()
        .ok_or_else(|| ProtocolError::malformed(line, "expected a JSON object"))?;

    if map.contains_key("sync") {
        decode_snapshot(map, line).map(WireMessage::Snapshot)
    } else {
        decode_change(map, line).map(WireMessage::Change)
    }
}

fn decode_change(map: &Map<String, Value>, line: &str) -> ProtocolResult<ChangeEvent> {
    let get_str = |name: &str| map.get(name).and_then(Value::as_str);
    // An explicit JSON null counts as absent, matching Option semantics.
    let has = |name: &str| map.get(name).is_some_and(|v| !v.is_null());

    let action = get_str("action")
        .ok_or_else(|| ProtocolError::malformed(line, "missing or non-string `action`"))?;
    let path = get_str("path")
        .ok_or_else(|| ProtocolError::malformed(line, "missing or non-string `path`"))?;
    paths::validate(path)?;

    let event = match action {
        "Create" | "Modify" => {
            if has("oldPath") {
                return Err(ProtocolError::malformed(
                    line,
                    format!("unexpected `oldPath` for action {action}"),
                ));
            }
            let content = get_str("content").ok_or_else(|| {
                ProtocolError::malformed(
                    line,
                    format!("missing or non-string `content` for action {action}"),
                )
            })?;
            if action == "Create" {
                ChangeEvent::create(path, content)
            } else {
                ChangeEvent::modify(path, content)
            }
        }
        "Delete" => {
            if has("content") || has("oldPath") {
                return Err(ProtocolError::malformed(
                    line,
                    "unexpected `content` or `oldPath` for action Delete",
                ));
            }
            ChangeEvent::delete(path)
        }
        "Rename" => {
            if has("content") {
                return Err(ProtocolError::malformed(
                    line,
                    "unexpected `content` for action Rename",
                ));
            }
            let old_path = get_str("oldPath").ok_or_else(|| {
                ProtocolError::malformed(line, "missing or non-string `oldPath` for action Rename")
            })?;
            paths::validate(old_path)?;
            ChangeEvent::rename(old_path, path)
        }
        other => {
            return Err(ProtocolError::malformed(
                line,
                format!("unknown action `{other}`"),
            ))
        }
    };

    Ok(event)
}

fn decode_snapshot(map: &Map<String, Value>, line: &str) -> ProtocolResult<SnapshotMessage> {
    let sync = map.get("sync").and_then(Value::as_bool).unwrap_or(false);
    if !sync {
        return Err(ProtocolError::malformed(line, "`sync` must be true"));
    }

    let files = map
        .get("files")
        .and_then(Value::as_object)
        .ok_or_else(|| ProtocolError::malformed(line, "missing or non-object `files`"))?;

    let mut snapshot = SnapshotMessage::new();
    for (path, content) in files {
        paths::validate(path)?;
        let content = content.as_str().ok_or_else(|| {
            ProtocolError::malformed(line, format!("non-string content for `{path}`"))
        })?;
        snapshot.insert(path.clone(), content);
    }
    Ok(snapshot)
}
