//! 客户端配置
//!
//! 以 JSON 格式保存在 `<config_dir>/ics-client/config.json`，文件不存在或
//! 格式无效时使用默认配置。

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// 配置读写错误
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Unable to locate the configuration directory")]
    NoConfigDir,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid configuration: {0}")]
    Json(#[from] serde_json::Error),
}

/// 会话能力（决定哪些受限类别的监听器可以注册）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Capabilities {
    /// 求战列表
    pub seeks: bool,
    /// 好友上下线通知
    pub friends: bool,
    /// 对局列表（FICS 会话不提供）
    pub game_lists: bool,
}

impl Default for Capabilities {
    fn default() -> Self {
        Self {
            seeks: true,
            friends: true,
            game_lists: false,
        }
    }
}

/// 客户端配置
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    // === 会话设置 ===
    pub capabilities: Capabilities,
    /// 是否接收求战信息（seekinfo）
    pub seek_info: bool,

    // === 运行时设置 ===
    /// 事件通道容量
    pub event_capacity: usize,
    /// 默认日志过滤指令，可被 RUST_LOG 覆盖
    pub log_filter: String,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            capabilities: Capabilities::default(),
            seek_info: true,
            event_capacity: 256,
            log_filter: "ics_client=info".to_string(),
        }
    }
}

impl ClientConfig {
    /// 获取默认配置文件路径
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|mut path| {
            path.push("ics-client");
            path.push("config.json");
            path
        })
    }

    /// 从默认路径加载配置
    pub fn load() -> Self {
        match Self::default_path() {
            Some(path) => Self::load_from(&path),
            None => {
                tracing::warn!("无法获取配置目录，使用默认配置");
                Self::default()
            }
        }
    }

    /// 从指定文件加载配置
    pub fn load_from(path: &Path) -> Self {
        if !path.exists() {
            tracing::info!("配置文件不存在，使用默认配置: {:?}", path);
            return Self::default();
        }

        match std::fs::read_to_string(path) {
            Ok(content) => match serde_json::from_str(&content) {
                Ok(config) => {
                    tracing::info!("已加载配置: {:?}", path);
                    config
                }
                Err(e) => {
                    tracing::warn!("配置文件格式无效: {}，使用默认配置", e);
                    Self::default()
                }
            },
            Err(e) => {
                tracing::warn!("无法读取配置文件: {}，使用默认配置", e);
                Self::default()
            }
        }
    }

    /// 保存到默认路径
    pub fn save(&self) -> Result<(), ConfigError> {
        let path = Self::default_path().ok_or(ConfigError::NoConfigDir)?;
        self.save_to(&path)
    }

    /// 保存到指定文件
    pub fn save_to(&self, path: &Path) -> Result<(), ConfigError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let content = serde_json::to_string_pretty(self)?;
        std::fs::write(path, content)?;

        tracing::info!("配置已保存: {:?}", path);
        Ok(())
    }
}
