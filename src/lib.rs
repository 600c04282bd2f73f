pub mod status {
    tonic::include_proto!("status");
}
pub mod config;
pub mod logging;
pub mod server;
pub mod services;
