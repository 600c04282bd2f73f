//! Health checking module
//!
//! - `checker`: the protocol-agnostic `HealthChecker` trait
//! - `rest`: HTTP `GET /status` check
//! - `rpc`: `StatusService.CheckStatus` call over a plaintext channel
//! - `monitor`: the periodic sweep that dispatches checks and writes results back

pub mod checker;
pub mod error;
pub mod monitor;
pub mod rest;
pub mod rpc;

pub use checker::HealthChecker;
pub use error::CheckError;
pub use monitor::HealthMonitor;
pub use rest::RestChecker;
pub use rpc::RpcChecker;
