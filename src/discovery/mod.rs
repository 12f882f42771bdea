mod engine;
mod probe;

pub use engine::{AddressRange, DiscoveryEngine, DiscoveryError};
pub use probe::Prober;
