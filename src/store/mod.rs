pub mod container;
pub mod generic;
pub mod lid;
pub mod memory;

pub use container::MemoryContainer;
pub use lid::MemoryLidStore;
pub use memory::MemoryStore;
pub use wacore::store::error::{Result, StoreError};
pub use wacore::store::traits::*;
pub use wacore::store::{DatabaseErrorHandler, Device, DeviceCommand, apply_command_to_device};
