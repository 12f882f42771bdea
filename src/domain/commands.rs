use crate::domain::device::Brand;
use serde_json::Value;
use thiserror::Error;

/// A vendor-neutral command for a single device. The logical name is
/// translated into a brand-specific code by the registry before transmission.
#[derive(Clone, PartialEq, Debug)]
pub struct CommandRequest {
    pub command: String,
    pub payload: Option<Value>,
}

impl CommandRequest {
    pub fn new(command: &str) -> Self {
        CommandRequest {
            command: command.to_string(),
            payload: None,
        }
    }

    pub fn with_payload(command: &str, payload: Value) -> Self {
        CommandRequest {
            command: command.to_string(),
            payload: Some(payload),
        }
    }
}

/// Outcome of a single dispatch. Transport failures are transient and safe to
/// retry at the caller's discretion; rejections are permanent and indicate a
/// data or configuration mismatch.
#[derive(PartialEq, Debug)]
pub enum SendOutcome {
    Delivered,
    Rejected(RejectReason),
    Transport(String),
}

#[derive(PartialEq, Debug, Error)]
pub enum RejectReason {
    #[error("unsupported protocol")]
    UnsupportedProtocol,
    #[error("unsupported command '{command}' for brand {brand}")]
    UnsupportedCommand { brand: Brand, command: String },
}

/// Result of a fail-fast command sequence: how many commands were attempted
/// and the outcome of the last one.
#[derive(PartialEq, Debug)]
pub struct SequenceOutcome {
    pub completed: usize,
    pub outcome: SendOutcome,
}
