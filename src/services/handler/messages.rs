use crate::services::registry::{Registration, ServiceRecord};

/// 注册消息解析错误
#[derive(Debug, thiserror::Error)]
pub enum RegistrationError {
    #[error("malformed payload: {0}")]
    Malformed(#[from] serde_json::Error),
    #[error("field `{0}` must not be empty")]
    EmptyField(&'static str),
}

/// 服务列表发送错误
#[derive(Debug, thiserror::Error)]
pub enum ListingError {
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
    #[error("Send error: {0}")]
    Send(String),
}

// 解析并校验一条注册消息
pub fn decode_registration(payload: &[u8]) -> Result<Registration, RegistrationError> {
    let registration: Registration = serde_json::from_slice(payload)?;

    if registration.name.trim().is_empty() {
        return Err(RegistrationError::EmptyField("name"));
    }
    if registration.host.trim().is_empty() {
        return Err(RegistrationError::EmptyField("host"));
    }

    Ok(registration)
}

pub fn registration_success(name: &str) -> String {
    format!("Service {name} registered successfully")
}

pub fn registration_failure(error: &RegistrationError) -> String {
    format!("Invalid registration data: {error}")
}

pub fn encode_service_list(records: &[ServiceRecord]) -> Result<String, ListingError> {
    Ok(serde_json::to_string(records)?)
}
