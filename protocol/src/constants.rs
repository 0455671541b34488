//! 协议常量定义

/// 完整棋盘快照（style 12）行前缀
pub const STYLE12_PREFIX: &str = "<12>";

/// 增量棋盘（compressmove）行前缀
pub const DELTA_BOARD_PREFIX: &str = "<d1>";

/// 对局元数据（gameinfo）行前缀
pub const GAME_INFO_PREFIX: &str = "<g1>";

/// 发给用户的提议（pendinfo）
pub const PENDING_FROM_PREFIX: &str = "<pf>";

/// 用户发出的提议（pendinfo）
pub const PENDING_TO_PREFIX: &str = "<pt>";

/// 提议被移除（pendinfo）
pub const PENDING_REMOVED_PREFIX: &str = "<pr>";

/// 新增求战（seekinfo）
pub const SEEK_ADDED_PREFIX: &str = "<s>";

/// 移除求战（seekinfo）
pub const SEEKS_REMOVED_PREFIX: &str = "<sr>";

/// 清空求战列表（seekinfo）
pub const SEEKS_CLEARED_LINE: &str = "<sc>";

/// 棋盘边长
pub const BOARD_SIZE: usize = 8;

/// 棋盘字符串长度（8x8，从第 8 行到第 1 行）
pub const BOARD_SQUARES: usize = BOARD_SIZE * BOARD_SIZE;

/// 棋盘字符串中空格子的字符
pub const EMPTY_SQUARE: char = '-';

/// 服务器为尚未发送元数据的对局使用的占位类别
pub const UNKNOWN_VARIANT: &str = "Unknown variant";

/// 单条命令最大长度（服务器会截断更长的输入）
pub const MAX_COMMAND_LEN: usize = 1024;

/// 服务器提示符，出现在行首时需剥离
pub const PROMPT: &str = "fics% ";
