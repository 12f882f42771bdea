//! Wire payload builders. Field names are fixed vendor contracts and must be
//! reproduced exactly for interoperability.

use serde_json::{Value, json};

/// Single-field body for request/response brands: `{"key": <code>}`.
pub fn key_field(code: &str) -> Value {
    json!({ "key": code })
}

/// Remote-key-click envelope for persistent-socket brands.
pub fn socket_envelope(method: &str, code: &str) -> Value {
    json!({
        "method": method,
        "params": {
            "Cmd": "Click",
            "DataOfCmd": code,
            "Option": "false",
            "TypeOfRemote": "SendRemoteKey"
        }
    })
}

/// ECP-style path: the translated command becomes a URL path segment.
pub fn ecp_path(prefix: &str, code: &str) -> String {
    format!("{}{}", prefix, code)
}

/// Generic envelope for unclassified brands, carrying the logical command
/// name untranslated.
pub fn generic_fallback(command: &str, payload: Option<&Value>) -> Value {
    match payload {
        Some(payload) => json!({ "command": command, "payload": payload }),
        None => json!({ "command": command }),
    }
}
