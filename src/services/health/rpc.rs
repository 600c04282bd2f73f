use std::time::Duration;

use tonic::Request;
use tonic::transport::Endpoint;

use super::checker::HealthChecker;
use super::error::CheckError;
use crate::services::registry::ServiceStatus;
use crate::status::StatusRequest;
use crate::status::status_service_client::StatusServiceClient;

/// 基于 `StatusService.CheckStatus` 的健康检查
///
/// 每次检查都新建明文通道，检查结束即释放。调用成功时远端返回的状态字符串
/// 会被原样保存，不做 Up/Down 归一化。
#[derive(Debug, Clone)]
pub struct RpcChecker {
    // 同时作为建连超时和调用期限
    timeout: Duration,
}

impl RpcChecker {
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }

    async fn fetch_status(&self, host: &str, port: u16) -> Result<ServiceStatus, CheckError> {
        let address = format!("http://{host}:{port}");
        let endpoint = Endpoint::from_shared(address.clone())
            .map_err(|source| CheckError::InvalidAddress { address, source })?
            .connect_timeout(self.timeout);

        let channel = endpoint.connect().await.map_err(CheckError::Connect)?;
        let mut client = StatusServiceClient::new(channel);

        let mut request = Request::new(StatusRequest {});
        request.set_timeout(self.timeout);

        let response = tokio::time::timeout(self.timeout, client.check_status(request))
            .await
            .map_err(|_| CheckError::Timeout(self.timeout))??;

        Ok(ServiceStatus::from(response.into_inner().status))
    }
}

#[tonic::async_trait]
impl HealthChecker for RpcChecker {
    async fn check(&self, host: &str, port: u16) -> ServiceStatus {
        match self.fetch_status(host, port).await {
            Ok(status) => {
                tracing::debug!(host = %host, port = port, status = %status, "RPC status checked");
                status
            }
            Err(e) => {
                tracing::warn!(host = %host, port = port, error = %e, "RPC status check failed");
                ServiceStatus::Down
            }
        }
    }
}
