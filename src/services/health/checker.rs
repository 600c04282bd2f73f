use crate::services::registry::ServiceStatus;

/// 协议相关的健康检查策略
///
/// 实现方负责把所有失败归类为 `ServiceStatus::Down`，调用方只关心结果。
#[tonic::async_trait]
pub trait HealthChecker: Send + Sync + std::fmt::Debug {
    async fn check(&self, host: &str, port: u16) -> ServiceStatus;
}
