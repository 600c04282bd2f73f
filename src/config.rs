use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use std::time::Duration;
use tokio::sync::Semaphore;

const DEFAULT_CONFIG_PATH: &str = "config.toml";
const ENV_PREFIX: &str = "REGISTRY_";

/// 配置加载错误
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("Failed to parse config file: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("Invalid environment override: {0}")]
    Env(#[from] envy::Error),
    #[error("Invalid config value `{field}`: {reason}")]
    Invalid { field: &'static str, reason: String },
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub server: ServerConfig,
    pub monitor: MonitorConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub bind_address: String,
    pub port: u16,
    pub register_path: String,
    pub services_path: String,
    /// 单条 WebSocket 消息的最大字节数
    pub max_message_size: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0".to_string(),
            port: 8090,
            register_path: "/register".to_string(),
            services_path: "/services".to_string(),
            max_message_size: 64 * 1024,
        }
    }
}

impl ServerConfig {
    pub fn listen_address(&self) -> String {
        format!("{}:{}", self.bind_address, self.port)
    }
}

// 健康检查相关配置（时间单位：秒）
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MonitorConfig {
    pub interval_secs: u64,
    pub rpc_timeout_secs: u64,
    pub rest_timeout_secs: u64,
    pub status_path: String,
    pub max_concurrent_checks: usize,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            interval_secs: 10,
            rpc_timeout_secs: 5,
            rest_timeout_secs: 5,
            status_path: "/status".to_string(),
            max_concurrent_checks: 64,
        }
    }
}

impl MonitorConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs)
    }

    pub fn rpc_timeout(&self) -> Duration {
        Duration::from_secs(self.rpc_timeout_secs)
    }

    pub fn rest_timeout(&self) -> Duration {
        Duration::from_secs(self.rest_timeout_secs)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

// 以 REGISTRY_ 为前缀的环境变量覆盖项
#[derive(Debug, Default, Deserialize)]
pub struct EnvOverrides {
    pub bind_address: Option<String>,
    pub port: Option<u16>,
    pub monitor_interval_secs: Option<u64>,
    pub max_concurrent_checks: Option<usize>,
    pub log_level: Option<String>,
}

impl Config {
    /// 加载顺序：默认值 -> 配置文件（可选）-> .env / 环境变量
    pub fn load() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();

        let path = std::env::var(format!("{ENV_PREFIX}CONFIG"))
            .unwrap_or_else(|_| DEFAULT_CONFIG_PATH.to_string());
        let mut config = if Path::new(&path).exists() {
            Self::from_file(&path)?
        } else {
            Self::default()
        };

        let overrides: EnvOverrides = envy::prefixed(ENV_PREFIX).from_env()?;
        config.apply_overrides(overrides);
        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: &str) -> Result<Self, ConfigError> {
        let config_str = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_string(),
            source,
        })?;
        Self::from_toml(&config_str)
    }

    pub fn from_toml(config_str: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(config_str)?)
    }

    pub fn apply_overrides(&mut self, overrides: EnvOverrides) {
        if let Some(bind_address) = overrides.bind_address {
            self.server.bind_address = bind_address;
        }
        if let Some(port) = overrides.port {
            self.server.port = port;
        }
        if let Some(interval_secs) = overrides.monitor_interval_secs {
            self.monitor.interval_secs = interval_secs;
        }
        if let Some(max_concurrent_checks) = overrides.max_concurrent_checks {
            self.monitor.max_concurrent_checks = max_concurrent_checks;
        }
        if let Some(level) = overrides.log_level {
            self.logging.level = level;
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let positive = [
            ("monitor.interval_secs", self.monitor.interval_secs),
            ("monitor.rpc_timeout_secs", self.monitor.rpc_timeout_secs),
            ("monitor.rest_timeout_secs", self.monitor.rest_timeout_secs),
            ("monitor.max_concurrent_checks", self.monitor.max_concurrent_checks as u64),
            ("server.max_message_size", self.server.max_message_size as u64),
        ];
        for (field, value) in positive {
            if value == 0 {
                return Err(ConfigError::Invalid {
                    field,
                    reason: "must be greater than zero".to_string(),
                });
            }
        }

        if self.monitor.max_concurrent_checks > Semaphore::MAX_PERMITS {
            return Err(ConfigError::Invalid {
                field: "monitor.max_concurrent_checks",
                reason: format!("must not exceed {}", Semaphore::MAX_PERMITS),
            });
        }

        let paths = [
            ("server.register_path", &self.server.register_path),
            ("server.services_path", &self.server.services_path),
            ("monitor.status_path", &self.monitor.status_path),
        ];
        for (field, path) in paths {
            if !path.starts_with('/') {
                return Err(ConfigError::Invalid {
                    field,
                    reason: format!("path `{path}` must start with '/'"),
                });
            }
        }

        if self.server.register_path == self.server.services_path {
            return Err(ConfigError::Invalid {
                field: "server.services_path",
                reason: "must differ from server.register_path".to_string(),
            });
        }

        Ok(())
    }
}
