//! Registry module
//!
//! The registry is split into two components:
//! - `types`: service records, kinds, statuses and the registration payload
//! - `store`: the reader/writer locked store shared by handlers and the health monitor

pub mod store;
pub mod types;

// Re-export public types for easier access
pub use store::RegistryStore;
pub use types::{Registration, ServiceKind, ServiceRecord, ServiceStatus, SharedRegistry};
