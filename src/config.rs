use dotenvy::dotenv;
use std::{env, net::SocketAddr, path::PathBuf};
use thiserror::Error;

#[derive(Error, Debug, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Env variable: \"{0}\" doesn't exist in env variables, please add it and start again")]
    Missing(&'static str),
    #[error("Env variable: \"{var}\" has an invalid value {value:?}")]
    Invalid { var: &'static str, value: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageType {
    Local,
    Memory,
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub auth_tokens: Vec<String>,
    pub base_url: String,
    pub upload_limit_mb: u64,
    pub storage_type: StorageType,
    pub images_dir: PathBuf,
    pub host: String,
    pub port: u16,
    pub debug: bool,
}

impl AppConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenv().ok();
        Self::from_vars(|key| env::var(key).ok())
    }

    pub fn from_vars(var: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let required = |key: &'static str| {
            var(key)
                .filter(|v| !v.trim().is_empty())
                .ok_or(ConfigError::Missing(key))
        };

        let port = required("PORT")?;
        let port = port
            .trim()
            .parse::<u16>()
            .map_err(|_| ConfigError::Invalid { var: "PORT", value: port })?;

        let upload_limit = required("UPLOAD_LIMIT")?;
        let upload_limit_mb = match upload_limit.trim().parse::<u64>() {
            Ok(mb) if mb > 0 => mb,
            _ => {
                return Err(ConfigError::Invalid {
                    var: "UPLOAD_LIMIT",
                    value: upload_limit,
                });
            }
        };

        let auth_tokens: Vec<String> = required("AUTH")?
            .split(',')
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .map(str::to_string)
            .collect();
        if auth_tokens.is_empty() {
            return Err(ConfigError::Missing("AUTH"));
        }

        let base_url = required("BASE_URL")?;

        let storage_type = match var("STORAGE_TYPE").as_deref().map(str::trim) {
            None | Some("") | Some("local") => StorageType::Local,
            Some("memory") => StorageType::Memory,
            Some(other) => {
                return Err(ConfigError::Invalid {
                    var: "STORAGE_TYPE",
                    value: other.to_string(),
                });
            }
        };

        Ok(Self {
            auth_tokens,
            base_url,
            upload_limit_mb,
            storage_type,
            images_dir: var("IMAGES_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from("images")),
            host: var("HOST").unwrap_or_else(|| "0.0.0.0".to_string()),
            port,
            debug: var("DEBUG").is_some_and(|v| is_truthy(&v)),
        })
    }

    pub fn upload_limit_bytes(&self) -> usize {
        (self.upload_limit_mb as usize).saturating_mul(1024 * 1024)
    }

    pub fn socket_addr(&self) -> Result<SocketAddr, ConfigError> {
        format!("{}:{}", self.host, self.port)
            .parse()
            .map_err(|_| ConfigError::Invalid {
                var: "HOST",
                value: self.host.clone(),
            })
    }
}

fn is_truthy(value: &str) -> bool {
    !matches!(
        value.trim().to_ascii_lowercase().as_str(),
        "" | "0" | "false" | "no" | "off"
    )
}
