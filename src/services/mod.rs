pub mod handler;
pub mod health;
pub mod registry;

pub use registry::{RegistryStore, ServiceKind, ServiceRecord, ServiceStatus, SharedRegistry};
