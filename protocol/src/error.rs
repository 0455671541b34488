//! 错误类型定义

use thiserror::Error;

/// 协议行解析错误
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ParseError {
    /// 缺少字段
    #[error("{record}: missing field `{field}`")]
    MissingField {
        record: &'static str,
        field: &'static str,
    },

    /// 字段取值无效
    #[error("{record}: invalid value {value:?} for field `{field}`")]
    InvalidField {
        record: &'static str,
        field: &'static str,
        value: String,
    },

    /// 棋盘字符串格式错误
    #[error("Invalid board string: {reason}")]
    InvalidBoard { reason: String },
}

impl ParseError {
    pub(crate) fn invalid(record: &'static str, field: &'static str, value: &str) -> Self {
        ParseError::InvalidField {
            record,
            field,
            value: value.to_string(),
        }
    }
}

/// 协议错误类型
#[derive(Error, Debug)]
pub enum ProtocolError {
    /// IO 错误
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// 解析错误
    #[error("Parse error: {0}")]
    Parse(#[from] ParseError),

    /// 命令过长
    #[error("Command too long: {len} bytes (max: {max})")]
    CommandTooLong { len: usize, max: usize },

    /// 连接已关闭
    #[error("Connection closed")]
    ConnectionClosed,
}

/// 协议操作结果类型
pub type Result<T> = std::result::Result<T, ProtocolError>;
