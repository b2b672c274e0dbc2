pub mod connection;
pub mod heartbeat;
pub mod hub;
pub mod registry;
pub mod relay;
pub mod signal;
pub mod typing;

pub use hub::{Hub, HubSettings};
