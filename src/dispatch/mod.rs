mod connection_manager;
mod dispatcher;
mod payload;

pub use connection_manager::{ConnectionError, ConnectionHandle, ConnectionManager};
pub use dispatcher::Dispatcher;
