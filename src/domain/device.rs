use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt::Display;
use std::net::Ipv4Addr;

/// A consumer display device on the local network.
///
/// Records are owned by the caller-side store; the core only produces and
/// consumes transient copies. The id is assigned at creation and never changes.
#[derive(Clone, PartialEq, Debug, Serialize, Deserialize)]
pub struct Device {
    pub id: String,
    pub name: String,
    pub address: Ipv4Addr,
    pub port: u16,
    pub brand: Brand,
    pub protocol: Protocol,
    pub online: bool,
    pub paired: bool,
    pub last_seen: Option<DateTime<Utc>>,
    pub last_command: Option<DateTime<Utc>>,
    pub auth_token: Option<String>,
}

#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Brand {
    Philips,
    Samsung,
    Lg,
    Roku,
    Unknown,
}

impl Brand {
    /// Human-readable vendor name for display purposes.
    pub fn label(&self) -> &'static str {
        match self {
            Brand::Philips => "Philips",
            Brand::Samsung => "Samsung",
            Brand::Lg => "LG",
            Brand::Roku => "Roku",
            Brand::Unknown => "Unknown",
        }
    }
}

impl Display for Brand {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let token = match self {
            Brand::Philips => "philips",
            Brand::Samsung => "samsung",
            Brand::Lg => "lg",
            Brand::Roku => "roku",
            Brand::Unknown => "unknown",
        };
        write!(f, "{}", token)
    }
}

/// Transport dialect a device speaks. Each brand has exactly one default
/// protocol in the registry, but a device record may override it.
#[derive(Clone, Copy, PartialEq, Eq, Debug, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Protocol {
    /// Stateless request/response over HTTP.
    Http,
    /// One long-lived full-duplex connection per device.
    Socket,
    /// Path-based command endpoints, no request body.
    Ecp,
    Unknown,
}
