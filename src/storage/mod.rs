//! State snapshot codec
//!
//! Snapshots are opaque JSON strings produced by the engine. The codec
//! validates them before they reach the engine and handles the byte-level
//! framing for disk persistence, including the first-run "no save yet" case.

use crate::error::{PlayerError, PlayerResult};

/// Check that a snapshot string is well-formed JSON.
///
/// This runs before the snapshot is handed to the engine so that an obviously
/// broken save never disturbs the current execution position.
pub fn validate(snapshot: &str) -> PlayerResult<()> {
    serde_json::from_str::<serde_json::Value>(snapshot)
        .map(|_| ())
        .map_err(|e| PlayerError::MalformedState(e.to_string()))
}

/// Encode a snapshot string for disk storage.
pub fn to_bytes(snapshot: &str) -> Vec<u8> {
    snapshot.as_bytes().to_vec()
}

/// Decode bytes read from disk back into a snapshot string.
///
/// A zero-length resource decodes to `None`: loading before any save exists
/// is tolerated as a no-op rather than an error.
pub fn from_bytes(bytes: &[u8]) -> PlayerResult<Option<String>> {
    if bytes.is_empty() {
        return Ok(None);
    }
    let snapshot = String::from_utf8(bytes.to_vec())
        .map_err(|e| PlayerError::MalformedState(e.to_string()))?;
    Ok(Some(snapshot))
}
