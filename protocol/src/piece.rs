//! 棋子与阵营定义

use serde::{Deserialize, Serialize};

/// 棋子类型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PieceKind {
    /// 兵
    Pawn,
    /// 马
    Knight,
    /// 象
    Bishop,
    /// 车
    Rook,
    /// 后
    Queen,
    /// 王
    King,
}

impl PieceKind {
    /// 子力分值（服务器 style 12 中的 strength 字段使用同样的计分）
    pub fn strength(&self) -> u32 {
        match self {
            PieceKind::Pawn => 1,
            PieceKind::Knight => 3,
            PieceKind::Bishop => 3,
            PieceKind::Rook => 5,
            PieceKind::Queen => 9,
            PieceKind::King => 0,
        }
    }

    /// 获取棋盘字符（白方大写，黑方小写）
    pub fn to_board_char(&self, side: Side) -> char {
        let c = self.letter().to_ascii_lowercase();
        match side {
            Side::White => c.to_ascii_uppercase(),
            Side::Black => c,
        }
    }

    /// 大写字母表示（服务器总是用大写表示升变目标与 verbose 走法中的棋子）
    pub fn letter(&self) -> char {
        match self {
            PieceKind::Pawn => 'P',
            PieceKind::Knight => 'N',
            PieceKind::Bishop => 'B',
            PieceKind::Rook => 'R',
            PieceKind::Queen => 'Q',
            PieceKind::King => 'K',
        }
    }

    /// 从棋盘字符解析
    pub fn from_board_char(c: char) -> Option<(PieceKind, Side)> {
        let side = if c.is_ascii_uppercase() {
            Side::White
        } else {
            Side::Black
        };
        let kind = Self::from_letter(c)?;
        Some((kind, side))
    }

    /// 从字母解析（不区分大小写）
    pub fn from_letter(c: char) -> Option<PieceKind> {
        let kind = match c.to_ascii_uppercase() {
            'P' => PieceKind::Pawn,
            'N' => PieceKind::Knight,
            'B' => PieceKind::Bishop,
            'R' => PieceKind::Rook,
            'Q' => PieceKind::Queen,
            'K' => PieceKind::King,
            _ => return None,
        };
        Some(kind)
    }
}

/// 阵营
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Side {
    /// 白方（先手）
    White,
    /// 黑方（后手）
    Black,
}

impl Side {
    /// 获取对方阵营
    pub fn opponent(&self) -> Side {
        match self {
            Side::White => Side::Black,
            Side::Black => Side::White,
        }
    }

    pub fn is_white(&self) -> bool {
        *self == Side::White
    }

    /// 用作按阵营索引的数组下标
    pub fn index(&self) -> usize {
        match self {
            Side::White => 0,
            Side::Black => 1,
        }
    }

    /// style 12 中的走子方字符
    pub fn to_style12_char(&self) -> char {
        match self {
            Side::White => 'W',
            Side::Black => 'B',
        }
    }

    /// 从 style 12 走子方字符解析
    pub fn from_style12_char(c: char) -> Option<Side> {
        match c {
            'W' => Some(Side::White),
            'B' => Some(Side::Black),
            _ => None,
        }
    }
}

impl std::fmt::Display for Side {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Side::White => write!(f, "white"),
            Side::Black => write!(f, "black"),
        }
    }
}
