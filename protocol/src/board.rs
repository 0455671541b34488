//! 棋盘快照（style 12）
//!
//! 服务器每次推送的完整、自描述的棋盘状态。棋盘以 64 个字符表示，
//! 从第 8 行到第 1 行、每行从 a 列到 h 列，空格子用 `-` 表示。
//!
//! 示例：
//! `<12> rnbqkbnr pppppppp -------- -------- ----P--- -------- PPPP-PPP RNBQKBNR B 4 1 1 1 1 0 7 Newton Einstein 1 2 12 39 39 119 122 2 P/e2-e4 (0:06) e4 0 1 0`

use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::constants::{BOARD_SIZE, BOARD_SQUARES, EMPTY_SQUARE, STYLE12_PREFIX};
use crate::error::ParseError;
use crate::piece::{PieceKind, Side};
use crate::record::GameId;

const RECORD: &str = "style12";

/// 王车易位权利
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct CastlingRights {
    pub white_kingside: bool,
    pub white_queenside: bool,
    pub black_kingside: bool,
    pub black_queenside: bool,
}

impl CastlingRights {
    /// 双方均保留全部易位权利
    pub fn all() -> Self {
        Self {
            white_kingside: true,
            white_queenside: true,
            black_kingside: true,
            black_queenside: true,
        }
    }

    pub fn kingside(&self, side: Side) -> bool {
        match side {
            Side::White => self.white_kingside,
            Side::Black => self.black_kingside,
        }
    }

    pub fn queenside(&self, side: Side) -> bool {
        match side {
            Side::White => self.white_queenside,
            Side::Black => self.black_queenside,
        }
    }

    /// FEN 易位字段（无权利时为 `-`）
    pub fn to_fen(&self) -> String {
        let mut s = String::new();
        if self.white_kingside {
            s.push('K');
        }
        if self.white_queenside {
            s.push('Q');
        }
        if self.black_kingside {
            s.push('k');
        }
        if self.black_queenside {
            s.push('q');
        }
        if s.is_empty() {
            s.push('-');
        }
        s
    }
}

/// 对局种类
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum GameType {
    /// 用户自己在下或在研究的对局
    MyGame,
    /// 用户观看的对局
    Observed,
    /// 孤立局面（例如 `refresh` 一个已结束的对局）
    Isolated,
}

/// 用户与棋盘的关系（style 12 的 relation 字段）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Relation {
    /// -3：孤立局面
    IsolatedPosition,
    /// -2：观看一个正在被研究的对局
    ObservingExamined,
    /// 2：用户是研究者
    Examining,
    /// -1：用户在下棋，轮到对手
    PlayingOpponentMove,
    /// 1：用户在下棋，轮到自己
    PlayingMyMove,
    /// 0：观看一个正在进行的对局
    ObservingPlayed,
}

impl Relation {
    pub fn from_code(code: i32) -> Option<Relation> {
        match code {
            -3 => Some(Relation::IsolatedPosition),
            -2 => Some(Relation::ObservingExamined),
            2 => Some(Relation::Examining),
            -1 => Some(Relation::PlayingOpponentMove),
            1 => Some(Relation::PlayingMyMove),
            0 => Some(Relation::ObservingPlayed),
            _ => None,
        }
    }

    pub fn code(&self) -> i32 {
        match self {
            Relation::IsolatedPosition => -3,
            Relation::ObservingExamined => -2,
            Relation::Examining => 2,
            Relation::PlayingOpponentMove => -1,
            Relation::PlayingMyMove => 1,
            Relation::ObservingPlayed => 0,
        }
    }

    pub fn game_type(&self) -> GameType {
        match self {
            Relation::IsolatedPosition => GameType::Isolated,
            Relation::ObservingExamined | Relation::ObservingPlayed => GameType::Observed,
            Relation::Examining | Relation::PlayingOpponentMove | Relation::PlayingMyMove => {
                GameType::MyGame
            }
        }
    }

    /// 是否为正在进行（而非研究中）的对局
    pub fn is_played(&self) -> bool {
        matches!(
            self,
            Relation::PlayingOpponentMove | Relation::PlayingMyMove | Relation::ObservingPlayed
        )
    }

    pub fn is_my_turn(&self) -> bool {
        *self == Relation::PlayingMyMove
    }

    /// 下棋关系在走子后翻转，其余关系保持不变
    pub fn with_my_turn(self, my_turn: bool) -> Relation {
        match self {
            Relation::PlayingMyMove | Relation::PlayingOpponentMove => {
                if my_turn {
                    Relation::PlayingMyMove
                } else {
                    Relation::PlayingOpponentMove
                }
            }
            other => other,
        }
    }
}

/// 完整棋盘快照
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BoardSnapshot {
    /// 64 字符棋盘
    pub board: String,
    /// 当前走子方
    pub side_to_move: Side,
    /// 上一步双步推兵所在列（0..8）
    pub double_pawn_push_file: Option<u8>,
    pub castling: CastlingRights,
    /// 自上一次不可逆走法以来的半回合数
    pub reversible_plies: u32,
    pub game_id: GameId,
    pub white_name: String,
    pub black_name: String,
    pub relation: Relation,
    /// 初始时间（秒）
    pub initial_time_secs: u32,
    /// 每步加秒（秒）
    pub increment_secs: u32,
    pub white_strength: u32,
    pub black_strength: u32,
    /// 白方剩余时间（毫秒，超时后可能为负）
    pub white_time_ms: i64,
    /// 黑方剩余时间（毫秒，超时后可能为负）
    pub black_time_ms: i64,
    /// 下一步的回合数
    pub next_move_number: u32,
    /// 上一步的 verbose 表示，例如 `P/e2-e4`、`o-o`
    pub move_verbose: Option<String>,
    /// 上一步耗时（毫秒）
    pub move_time_ms: u32,
    /// 上一步的 SAN 表示
    pub move_san: Option<String>,
    /// 棋盘是否翻转（黑方在下）
    pub flipped: bool,
    pub clock_running: bool,
    /// 网络延迟（毫秒）
    pub lag_ms: u32,
}

impl BoardSnapshot {
    /// 解析一行 style 12
    pub fn parse_style12(line: &str) -> Result<Self, ParseError> {
        let rest = line
            .trim()
            .strip_prefix(STYLE12_PREFIX)
            .ok_or_else(|| ParseError::invalid(RECORD, "prefix", line))?;
        let tokens: Vec<&str> = rest.split_whitespace().collect();

        let mut board = String::with_capacity(BOARD_SQUARES);
        for row in 0..BOARD_SIZE {
            board.push_str(field(&tokens, row, "board")?);
        }
        validate_board(&board)?;

        let side_token = field(&tokens, 8, "side")?;
        let side_to_move = side_token
            .chars()
            .next()
            .and_then(Side::from_style12_char)
            .ok_or_else(|| ParseError::invalid(RECORD, "side", side_token))?;

        let dpp: i32 = number(&tokens, 9, "double_pawn_push")?;
        let double_pawn_push_file = match dpp {
            -1 => None,
            0..=7 => Some(dpp as u8),
            _ => return Err(ParseError::invalid(RECORD, "double_pawn_push", &dpp.to_string())),
        };

        let castling = CastlingRights {
            white_kingside: flag(&tokens, 10, "white_kingside")?,
            white_queenside: flag(&tokens, 11, "white_queenside")?,
            black_kingside: flag(&tokens, 12, "black_kingside")?,
            black_queenside: flag(&tokens, 13, "black_queenside")?,
        };

        let relation_code: i32 = number(&tokens, 18, "relation")?;
        let relation = Relation::from_code(relation_code)
            .ok_or_else(|| ParseError::invalid(RECORD, "relation", &relation_code.to_string()))?;

        let initial_time_secs = number::<u32>(&tokens, 19, "initial_time")?
            .checked_mul(60)
            .ok_or_else(|| invalid_at(&tokens, 19, "initial_time"))?;
        let white_time_ms = number::<i64>(&tokens, 23, "white_time")?
            .checked_mul(1000)
            .ok_or_else(|| invalid_at(&tokens, 23, "white_time"))?;
        let black_time_ms = number::<i64>(&tokens, 24, "black_time")?
            .checked_mul(1000)
            .ok_or_else(|| invalid_at(&tokens, 24, "black_time"))?;

        Ok(Self {
            board,
            side_to_move,
            double_pawn_push_file,
            castling,
            reversible_plies: number(&tokens, 14, "reversible_plies")?,
            game_id: GameId(number(&tokens, 15, "game")?),
            white_name: field(&tokens, 16, "white_name")?.to_string(),
            black_name: field(&tokens, 17, "black_name")?.to_string(),
            relation,
            initial_time_secs,
            increment_secs: number(&tokens, 20, "increment")?,
            white_strength: number(&tokens, 21, "white_strength")?,
            black_strength: number(&tokens, 22, "black_strength")?,
            white_time_ms,
            black_time_ms,
            next_move_number: number(&tokens, 25, "next_move_number")?,
            move_verbose: optional_move(field(&tokens, 26, "move_verbose")?),
            move_time_ms: parse_move_time(field(&tokens, 27, "move_time")?)?,
            move_san: optional_move(field(&tokens, 28, "move_san")?),
            // 旧服务器不发送以下字段
            flipped: optional_flag(&tokens, 29, "flipped", false)?,
            clock_running: optional_flag(&tokens, 30, "clock_running", true)?,
            lag_ms: match tokens.get(31) {
                Some(_) => number(&tokens, 31, "lag")?,
                None => 0,
            },
        })
    }

    /// 已走半回合数
    pub fn played_plies(&self) -> u32 {
        let full = self.next_move_number.saturating_sub(1).saturating_mul(2);
        match self.side_to_move {
            Side::White => full,
            Side::Black => full.saturating_add(1),
        }
    }

    /// 获取指定格子的棋子（file、rank 均为 0..8，a1 为 (0, 0)）
    pub fn piece_at(&self, file: usize, rank: usize) -> Option<(PieceKind, Side)> {
        piece_at(&self.board, file, rank)
    }

    /// FEN 的棋子摆放字段
    pub fn placement_fen(&self) -> String {
        placement_fen(&self.board)
    }

    /// 指定阵营的子力
    pub fn material(&self, side: Side) -> u32 {
        material(&self.board, side)
    }

    /// 指定阵营的剩余时间（毫秒）
    pub fn time_ms(&self, side: Side) -> i64 {
        match side {
            Side::White => self.white_time_ms,
            Side::Black => self.black_time_ms,
        }
    }
}

/// 棋盘字符串中格子的下标
pub fn square_index(file: usize, rank: usize) -> usize {
    (BOARD_SIZE - 1 - rank) * BOARD_SIZE + file
}

/// 校验 64 字符棋盘
pub fn validate_board(board: &str) -> Result<(), ParseError> {
    if board.chars().count() != BOARD_SQUARES {
        return Err(ParseError::InvalidBoard {
            reason: format!("expected {} squares, got {}", BOARD_SQUARES, board.chars().count()),
        });
    }
    if let Some(c) = board
        .chars()
        .find(|&c| c != EMPTY_SQUARE && PieceKind::from_board_char(c).is_none())
    {
        return Err(ParseError::InvalidBoard {
            reason: format!("unexpected character {:?}", c),
        });
    }
    Ok(())
}

/// 获取棋盘字符串中指定格子的棋子
pub fn piece_at(board: &str, file: usize, rank: usize) -> Option<(PieceKind, Side)> {
    if file >= BOARD_SIZE || rank >= BOARD_SIZE {
        return None;
    }
    board
        .as_bytes()
        .get(square_index(file, rank))
        .and_then(|&b| PieceKind::from_board_char(b as char))
}

/// 棋盘字符串转 FEN 棋子摆放
pub fn placement_fen(board: &str) -> String {
    let mut fen = String::with_capacity(BOARD_SQUARES + BOARD_SIZE);
    for (row_idx, row) in board.as_bytes().chunks(BOARD_SIZE).enumerate() {
        if row_idx > 0 {
            fen.push('/');
        }
        let mut empty = 0;
        for &b in row {
            if b as char == EMPTY_SQUARE {
                empty += 1;
            } else {
                if empty > 0 {
                    fen.push_str(&empty.to_string());
                    empty = 0;
                }
                fen.push(b as char);
            }
        }
        if empty > 0 {
            fen.push_str(&empty.to_string());
        }
    }
    fen
}

/// 计算指定阵营的子力（兵 1、马 3、象 3、车 5、后 9、王 0）
pub fn material(board: &str, side: Side) -> u32 {
    board
        .chars()
        .filter_map(PieceKind::from_board_char)
        .filter(|(_, s)| *s == side)
        .map(|(kind, _)| kind.strength())
        .sum()
}

fn field<'a>(tokens: &[&'a str], idx: usize, name: &'static str) -> Result<&'a str, ParseError> {
    tokens.get(idx).copied().ok_or(ParseError::MissingField {
        record: RECORD,
        field: name,
    })
}

fn number<T: FromStr>(tokens: &[&str], idx: usize, name: &'static str) -> Result<T, ParseError> {
    let raw = field(tokens, idx, name)?;
    raw.parse().map_err(|_| ParseError::invalid(RECORD, name, raw))
}

/// 数值换算单位后溢出，按字段无效处理
fn invalid_at(tokens: &[&str], idx: usize, name: &'static str) -> ParseError {
    ParseError::invalid(RECORD, name, tokens.get(idx).copied().unwrap_or_default())
}

fn flag(tokens: &[&str], idx: usize, name: &'static str) -> Result<bool, ParseError> {
    match field(tokens, idx, name)? {
        "1" => Ok(true),
        "0" => Ok(false),
        other => Err(ParseError::invalid(RECORD, name, other)),
    }
}

fn optional_flag(
    tokens: &[&str],
    idx: usize,
    name: &'static str,
    default: bool,
) -> Result<bool, ParseError> {
    if tokens.get(idx).is_some() {
        flag(tokens, idx, name)
    } else {
        Ok(default)
    }
}

fn optional_move(raw: &str) -> Option<String> {
    if raw == "none" {
        None
    } else {
        Some(raw.to_string())
    }
}

/// 解析 `(m:ss)`、`(m:ss.mmm)` 或 `(h:mm:ss)` 形式的耗时
fn parse_move_time(raw: &str) -> Result<u32, ParseError> {
    let invalid = || ParseError::invalid(RECORD, "move_time", raw);
    let inner = raw
        .strip_prefix('(')
        .and_then(|s| s.strip_suffix(')'))
        .ok_or_else(invalid)?;

    let mut total_ms: u64 = 0;
    for part in inner.split(':') {
        let (secs, millis) = match part.split_once('.') {
            Some((s, ms)) => (s, ms),
            None => (part, ""),
        };
        let secs: u64 = secs.parse().map_err(|_| invalid())?;
        total_ms = total_ms
            .checked_mul(60)
            .and_then(|t| t.checked_add(secs.checked_mul(1000)?))
            .ok_or_else(invalid)?;
        if !millis.is_empty() {
            let ms: u64 = millis.parse().map_err(|_| invalid())?;
            total_ms = total_ms.checked_add(ms).ok_or_else(invalid)?;
        }
    }
    u32::try_from(total_ms).map_err(|_| invalid())
}
