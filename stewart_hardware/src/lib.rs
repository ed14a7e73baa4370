#[cfg(all(feature = "hardware", target_os = "linux"))]
pub mod gpio;

pub mod error;
pub mod sim;
pub mod store;

pub use sim::{SimHandle, SimParams, SimSnapshot, SimulatedActuator};
pub use store::{FileStore, MemoryStore};
