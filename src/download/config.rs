//!
//! 配置模块
//!

use std::fs;
use std::num::NonZeroU64;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use reqwest::Client;
use serde::{Deserialize, Serialize};

const CONFIG_DIR_NAME: &str = "range-fetch";
const CONFIG_FILE_NAME: &str = "config.json";

#[derive(Deserialize, Serialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct Config {
    /// 每个 range 请求的大小，单位 KiB
    pub chunk_size_kib: u64,
    pub request_timeout_secs: Option<u64>,
    pub use_browser_user_agent: bool,
    /// HEAD 响应缺少 Content-Length 时按 0 处理，而不是报错
    pub allow_missing_content_length: bool,
    pub log_level: String,
    pub log_file: Option<String>,
    pub server_port: u16,
}

impl Config {
    pub fn load_from_file(file_path: impl AsRef<Path>) -> Result<Self> {
        let file_path = file_path.as_ref();
        let config_data = fs::read_to_string(file_path)
            .with_context(|| format!("Read config failed: {}", file_path.display()))?;
        let config: Config = serde_json::from_str(&config_data)
            .with_context(|| format!("Parse config failed: {}", file_path.display()))?;

        Ok(config)
    }

    /// 指定路径必须存在；未指定时尝试用户配置目录，都没有则使用默认值
    pub fn load(explicit_path: Option<&Path>) -> Result<Self> {
        if let Some(path) = explicit_path {
            return Self::load_from_file(path);
        }

        match Self::default_path() {
            Some(path) if path.exists() => Self::load_from_file(path),
            _ => Ok(Self::default()),
        }
    }

    pub fn default_path() -> Option<PathBuf> {
        let mut dir = dirs::config_dir()?;
        dir.push(CONFIG_DIR_NAME);
        dir.push(CONFIG_FILE_NAME);

        Some(dir)
    }

    /// KiB 转换为字节
    pub fn chunk_size_bytes(&self) -> Result<NonZeroU64> {
        kib_to_bytes(self.chunk_size_kib)
    }

    pub fn build_client(&self) -> Result<Client> {
        let mut builder = Client::builder();
        if let Some(secs) = self.request_timeout_secs {
            builder = builder.timeout(Duration::from_secs(secs));
        }

        builder.build().context("Build http client failed")
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            chunk_size_kib: 100 * 1024,
            request_timeout_secs: None,
            use_browser_user_agent: false,
            allow_missing_content_length: false,
            log_level: "info".to_string(),
            log_file: None,
            server_port: 8082,
        }
    }
}

pub fn kib_to_bytes(kib: u64) -> Result<NonZeroU64> {
    kib.checked_mul(1024)
        .and_then(NonZeroU64::new)
        .with_context(|| format!("Invalid chunk size: {} KiB", kib))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_chunk_size_is_100_mib() {
        let config = Config::default();
        assert_eq!(config.chunk_size_bytes().unwrap().get(), 100 * 1024 * 1024);
        assert_eq!(config.server_port, 8082);
        assert!(!config.allow_missing_content_length);
    }

    #[test]
    fn kib_conversion() {
        assert_eq!(kib_to_bytes(1).unwrap().get(), 1024);
        assert!(kib_to_bytes(0).is_err());
        assert!(kib_to_bytes(u64::MAX).is_err());
    }

    #[test]
    fn load_partial_file_fills_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        fs::write(&path, r#"{ "chunk_size_kib": 4, "allow_missing_content_length": true }"#).unwrap();

        let config = Config::load(Some(&path)).unwrap();
        assert_eq!(config.chunk_size_kib, 4);
        assert!(config.allow_missing_content_length);
        assert_eq!(config.log_level, "info");
    }

    #[test]
    fn explicit_missing_file_is_error() {
        let dir = tempfile::tempdir().unwrap();
        assert!(Config::load(Some(&dir.path().join("nope.json"))).is_err());
    }
}
