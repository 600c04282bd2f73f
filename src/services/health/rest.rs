use std::time::Duration;

use super::checker::HealthChecker;
use super::error::CheckError;
use crate::services::registry::ServiceStatus;

/// 基于 HTTP GET 的健康检查
///
/// 只看响应码：2xx 为 Up，其余（包括连接失败、超时）均为 Down。
#[derive(Debug, Clone)]
pub struct RestChecker {
    client: reqwest::Client,
    status_path: String,
}

impl RestChecker {
    pub fn new(timeout: Duration, status_path: impl Into<String>) -> Result<Self, CheckError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(CheckError::ClientBuild)?;

        Ok(Self {
            client,
            status_path: status_path.into(),
        })
    }

    pub fn status_url(&self, host: &str, port: u16) -> String {
        format!("http://{host}:{port}{}", self.status_path)
    }

    async fn fetch_status(&self, host: &str, port: u16) -> Result<ServiceStatus, CheckError> {
        let response = self.client.get(self.status_url(host, port)).send().await?;
        let status = response.status();

        if status.is_success() {
            Ok(ServiceStatus::Up)
        } else {
            Err(CheckError::UnexpectedStatus(status.as_u16()))
        }
    }
}

#[tonic::async_trait]
impl HealthChecker for RestChecker {
    async fn check(&self, host: &str, port: u16) -> ServiceStatus {
        match self.fetch_status(host, port).await {
            Ok(status) => status,
            Err(e) => {
                tracing::warn!(
                    url = %self.status_url(host, port),
                    error = %e,
                    "REST status check failed"
                );
                ServiceStatus::Down
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    async fn status_for(code: u16) -> ServiceStatus {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/status"))
            .respond_with(ResponseTemplate::new(code))
            .mount(&server)
            .await;

        let checker = RestChecker::new(Duration::from_secs(2), "/status").unwrap();
        let address = server.address();
        checker.check(&address.ip().to_string(), address.port()).await
    }

    #[tokio::test]
    async fn test_success_response_is_up() {
        assert_eq!(status_for(200).await, ServiceStatus::Up);
    }

    #[tokio::test]
    async fn test_not_found_is_down() {
        assert_eq!(status_for(404).await, ServiceStatus::Down);
    }

    #[tokio::test]
    async fn test_server_error_is_down() {
        assert_eq!(status_for(500).await, ServiceStatus::Down);
    }

    #[tokio::test]
    async fn test_connection_refused_is_down() {
        // 绑定后立即释放，得到一个无人监听的端口
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        drop(listener);

        let checker = RestChecker::new(Duration::from_secs(2), "/status").unwrap();
        assert_eq!(checker.check("127.0.0.1", port).await, ServiceStatus::Down);
    }

    #[tokio::test]
    async fn test_slow_response_times_out_as_down() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/status"))
            .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_secs(2)))
            .mount(&server)
            .await;

        let checker = RestChecker::new(Duration::from_millis(200), "/status").unwrap();
        let address = server.address();
        let status = checker.check(&address.ip().to_string(), address.port()).await;
        assert_eq!(status, ServiceStatus::Down);
    }
}
