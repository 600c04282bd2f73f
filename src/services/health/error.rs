use std::time::Duration;

use tonic::Status;

/// 健康检查错误类型（统一映射为 Down，不会向外传播）
#[derive(Debug, thiserror::Error)]
pub enum CheckError {
    #[error("Invalid address {address}: {source}")]
    InvalidAddress {
        address: String,
        #[source]
        source: tonic::transport::Error,
    },
    #[error("Connect error: {0}")]
    Connect(#[source] tonic::transport::Error),
    #[error("gRPC error: {0}")]
    Rpc(#[from] Status),
    #[error("Timeout after {0:?}")]
    Timeout(Duration),
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("Unexpected HTTP status: {0}")]
    UnexpectedStatus(u16),
    #[error("Failed to build HTTP client: {0}")]
    ClientBuild(#[source] reqwest::Error),
}
