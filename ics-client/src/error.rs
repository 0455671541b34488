//! 错误类型定义

use protocol::{GameId, ProtocolError, SeekIndex};
use thiserror::Error;

/// 规则引擎适配层错误
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RulesError {
    /// 规则引擎无法表示该局面
    #[error("Position not representable by the rules engine: {fen}")]
    InvalidPosition { fen: String },

    /// 走法文本格式错误
    #[error("Malformed move text: {text:?}")]
    MalformedMove { text: String },

    /// 走法在该局面下不合法
    #[error("Illegal move {text:?} in position {fen}")]
    IllegalMove { text: String, fen: String },
}

/// 同步引擎错误
#[derive(Error, Debug)]
pub enum SyncError {
    /// 对局不存在
    #[error("No such game: {0}")]
    NoSuchGame(GameId),

    /// 求战不存在
    #[error("No such seek: {0}")]
    NoSuchSeek(SeekIndex),

    /// 本地状态与服务器失去同步
    #[error("Game {game} desynchronized: {reason}")]
    Desync { game: GameId, reason: String },

    /// 增量棋盘只适用于标准规则
    #[error("Game {0} does not use the standard rules; delta boards are unsupported")]
    DeltaUnsupported(GameId),

    /// 操作要求用户正在下的对局
    #[error("Game {0} is not a game played by the user")]
    NotPlayedGame(GameId),

    /// 操作要求用户正在研究的对局
    #[error("Game {0} is not a game examined by the user")]
    NotExaminedGame(GameId),

    /// 半回合数无效
    #[error("Invalid ply count: {0}")]
    InvalidPlyCount(u32),

    /// 规则错误
    #[error("Rules error: {0}")]
    Rules(#[from] RulesError),

    /// 协议错误
    #[error("Protocol error: {0}")]
    Protocol(#[from] ProtocolError),
}

/// 监听器注册错误
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RegistrationError {
    /// 会话不支持该类监听器
    #[error("The session does not support {category} listeners")]
    CapabilityUnsupported { category: &'static str },
}

/// 同步操作结果类型
pub type Result<T> = std::result::Result<T, SyncError>;
