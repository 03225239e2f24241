#[macro_use]
extern crate log;

#[cfg(test)]
#[macro_use]
extern crate lazy_static;

pub mod capture;
pub mod core;
pub mod registry;
pub mod snapshot;

pub use crate::capture::Capture;
pub use crate::core::aspect::Aspect;
pub use crate::core::types::{Error, Pid, SnapshotFormat};
pub use crate::registry::{RegistryConfig, SnapshotRegistry};
pub use crate::snapshot::SnapshotInstance;
