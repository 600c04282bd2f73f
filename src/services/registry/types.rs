use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use super::store::RegistryStore;

// 服务协议类型（决定使用哪种健康检查）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ServiceKind {
    #[serde(rename = "REST")]
    Rest,
    #[serde(rename = "RPC", alias = "gRPC", alias = "GRPC")]
    Rpc,
}

impl fmt::Display for ServiceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ServiceKind::Rest => write!(f, "REST"),
            ServiceKind::Rpc => write!(f, "RPC"),
        }
    }
}

/// 服务健康状态
///
/// REST 检查只会产生 `Up`/`Down`；RPC 检查会原样保存远端返回的字符串，
/// 因此额外有 `Reported` 变体。序列化时统一为裸字符串。
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum ServiceStatus {
    #[default]
    Unknown,
    Up,
    Down,
    Reported(String),
}

impl ServiceStatus {
    pub fn as_str(&self) -> &str {
        match self {
            ServiceStatus::Unknown => "Unknown",
            ServiceStatus::Up => "Up",
            ServiceStatus::Down => "Down",
            ServiceStatus::Reported(status) => status.as_str(),
        }
    }

    pub fn is_unknown(&self) -> bool {
        matches!(self, ServiceStatus::Unknown)
    }
}

impl From<String> for ServiceStatus {
    fn from(value: String) -> Self {
        match value.as_str() {
            "Unknown" => ServiceStatus::Unknown,
            "Up" => ServiceStatus::Up,
            "Down" => ServiceStatus::Down,
            _ => ServiceStatus::Reported(value),
        }
    }
}

impl From<ServiceStatus> for String {
    fn from(value: ServiceStatus) -> Self {
        match value {
            ServiceStatus::Reported(status) => status,
            other => other.as_str().to_string(),
        }
    }
}

impl fmt::Display for ServiceStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// 注册请求（客户端发送的消息体）
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Registration {
    pub name: String,
    pub host: String,
    pub port: u16,
    #[serde(rename = "type")]
    pub kind: ServiceKind,
}

// 注册表中的服务记录
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceRecord {
    pub name: String,
    pub host: String,
    pub port: u16,
    #[serde(rename = "type")]
    pub kind: ServiceKind,
    pub status: ServiceStatus,
    /// 每次 upsert 由存储分配的版本号，不对外暴露
    #[serde(skip)]
    pub generation: u64,
}

impl ServiceRecord {
    pub fn from_registration(registration: Registration, generation: u64) -> Self {
        Self {
            name: registration.name,
            host: registration.host,
            port: registration.port,
            kind: registration.kind,
            status: ServiceStatus::Unknown,
            generation,
        }
    }

    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

// 在处理器和监控任务之间共享的注册表
pub type SharedRegistry = Arc<RegistryStore>;
