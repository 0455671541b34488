//! 规则引擎适配层
//!
//! 以 `chess` crate 作为规则引擎。[`Position`] 总是可以保存（包括摆棋模式下
//! 规则引擎无法表示的局面），只有需要判断合法性的操作才会返回 [`RulesError`]。

use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

use chess::{Board, ChessMove, Color, File, Piece, Rank, Square};
use protocol::{
    material, piece_at, placement_fen, validate_board, BoardSnapshot, CastlingRights, PieceKind,
    Side, BOARD_SIZE, EMPTY_SQUARE, UNKNOWN_VARIANT,
};
use serde::{Deserialize, Serialize};

use crate::error::RulesError;

/// 标准初始局面
const INITIAL_BOARD: &str =
    "rnbqkbnrpppppppp--------------------------------PPPPPPPPRNBQKBNR";

// ============================================================================
// 规则集
// ============================================================================

/// 规则集
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Variant {
    /// 标准规则
    Chess,
    /// 走法与标准规则相同、初始局面任意（部分 wild 与 losers）
    ChessLike,
}

impl Variant {
    /// 是否可以使用增量棋盘
    pub fn supports_delta(&self) -> bool {
        matches!(self, Variant::Chess)
    }
}

/// 对局类别到规则集的映射表
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VariantTable {
    variants: HashMap<String, Variant>,
}

impl VariantTable {
    pub fn empty() -> Self {
        Self {
            variants: HashMap::new(),
        }
    }

    /// 添加一个类别
    pub fn with(mut self, category: &str, variant: Variant) -> Self {
        self.variants.insert(category.to_string(), variant);
        self
    }

    /// 服务器使用的类别
    pub fn fics() -> Self {
        let standard = ["lightning", "blitz", "standard", "untimed", UNKNOWN_VARIANT];
        let chess_like = ["wild/2", "wild/3", "wild/5", "wild/8", "wild/8a", "losers"];

        let table = standard
            .iter()
            .fold(Self::empty(), |table, name| table.with(name, Variant::Chess));
        chess_like
            .iter()
            .fold(table, |table, name| table.with(name, Variant::ChessLike))
    }

    /// 查找类别对应的规则集，不支持的类别返回 `None`
    pub fn lookup(&self, category: &str) -> Option<Variant> {
        self.variants.get(category).copied()
    }
}

impl Default for VariantTable {
    fn default() -> Self {
        Self::fics()
    }
}

// ============================================================================
// 走法
// ============================================================================

/// 王车易位方向
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CastlingSide {
    Kingside,
    Queenside,
}

/// 一步经过合法性验证的走法
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Move {
    inner: ChessMove,
    piece: PieceKind,
    side: Side,
    captured: Option<PieceKind>,
    castling: Option<CastlingSide>,
    en_passant: bool,
    san: Option<String>,
}

impl Move {
    pub fn piece(&self) -> PieceKind {
        self.piece
    }

    /// 走子方
    pub fn side(&self) -> Side {
        self.side
    }

    pub fn from_square(&self) -> Square {
        self.inner.get_source()
    }

    pub fn to_square(&self) -> Square {
        self.inner.get_dest()
    }

    pub fn captured(&self) -> Option<PieceKind> {
        self.captured
    }

    pub fn is_capture(&self) -> bool {
        self.captured.is_some()
    }

    pub fn is_pawn_move(&self) -> bool {
        self.piece == PieceKind::Pawn
    }

    pub fn is_en_passant(&self) -> bool {
        self.en_passant
    }

    pub fn castling(&self) -> Option<CastlingSide> {
        self.castling
    }

    pub fn promotion(&self) -> Option<PieceKind> {
        self.inner.get_promotion().map(from_piece)
    }

    /// 双步推兵时返回所在列
    pub fn double_push_file(&self) -> Option<u8> {
        let from = self.from_square();
        let to = self.to_square();
        let distance = from.get_rank().to_index().abs_diff(to.get_rank().to_index());
        (self.is_pawn_move() && distance == 2).then(|| from.get_file().to_index() as u8)
    }

    /// 服务器给出的 SAN
    pub fn san(&self) -> Option<&str> {
        self.san.as_deref()
    }

    pub fn with_san(mut self, san: Option<String>) -> Self {
        self.san = san;
        self
    }

    /// 规范字符串：`e2e4`、`O-O`、`O-O-O`、`e7e8=Q`
    ///
    /// 用于发送给服务器以及与服务器回显、拒绝通知进行比对。
    pub fn canonical(&self) -> String {
        match self.castling {
            Some(CastlingSide::Kingside) => "O-O".to_string(),
            Some(CastlingSide::Queenside) => "O-O-O".to_string(),
            None => match self.promotion() {
                Some(promotion) => format!(
                    "{}{}={}",
                    self.from_square(),
                    self.to_square(),
                    promotion.letter()
                ),
                None => format!("{}{}", self.from_square(), self.to_square()),
            },
        }
    }

    /// style 12 的 verbose 表示：`P/e2-e4`、`o-o`、`P/e7-e8=Q`
    pub fn verbose(&self) -> String {
        match self.castling {
            Some(CastlingSide::Kingside) => "o-o".to_string(),
            Some(CastlingSide::Queenside) => "o-o-o".to_string(),
            None => {
                let mut text = format!(
                    "{}/{}-{}",
                    self.piece.letter(),
                    self.from_square(),
                    self.to_square()
                );
                if let Some(promotion) = self.promotion() {
                    text.push('=');
                    text.push(promotion.letter());
                }
                text
            }
        }
    }
}

impl fmt::Display for Move {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.san {
            Some(san) => f.write_str(san),
            None => f.write_str(&self.canonical()),
        }
    }
}

// ============================================================================
// 局面
// ============================================================================

/// 局面：64 字符棋盘、走子方、易位权利与可吃过路兵的列
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Position {
    board: String,
    side_to_move: Side,
    castling: CastlingRights,
    en_passant_file: Option<u8>,
}

impl Position {
    /// 标准初始局面
    pub fn initial() -> Self {
        Self {
            board: INITIAL_BOARD.to_string(),
            side_to_move: Side::White,
            castling: CastlingRights::all(),
            en_passant_file: None,
        }
    }

    pub fn new(
        board: &str,
        side_to_move: Side,
        castling: CastlingRights,
        en_passant_file: Option<u8>,
    ) -> Result<Self, RulesError> {
        validate_board(board).map_err(|_| RulesError::InvalidPosition {
            fen: board.to_string(),
        })?;
        Ok(Self {
            board: board.to_string(),
            side_to_move,
            castling,
            en_passant_file,
        })
    }

    /// 快照中的局面
    pub fn from_snapshot(snapshot: &BoardSnapshot) -> Self {
        Self {
            board: snapshot.board.clone(),
            side_to_move: snapshot.side_to_move,
            castling: snapshot.castling,
            en_passant_file: snapshot.double_pawn_push_file,
        }
    }

    /// 64 字符棋盘
    pub fn lexigraphic(&self) -> &str {
        &self.board
    }

    pub fn side_to_move(&self) -> Side {
        self.side_to_move
    }

    pub fn castling(&self) -> CastlingRights {
        self.castling
    }

    pub fn en_passant_file(&self) -> Option<u8> {
        self.en_passant_file
    }

    pub fn piece_on(&self, square: Square) -> Option<(PieceKind, Side)> {
        piece_at(
            &self.board,
            square.get_file().to_index(),
            square.get_rank().to_index(),
        )
    }

    pub fn material(&self, side: Side) -> u32 {
        material(&self.board, side)
    }

    /// 棋子摆放与走子方是否相同
    pub fn same_placement(&self, other: &Position) -> bool {
        self.board == other.board && self.side_to_move == other.side_to_move
    }

    /// FEN；不与棋子位置相符的易位权利和无法实现的吃过路兵会被去掉
    pub fn fen(&self) -> String {
        let side = match self.side_to_move {
            Side::White => 'w',
            Side::Black => 'b',
        };
        format!(
            "{} {} {} {} 0 1",
            placement_fen(&self.board),
            side,
            self.effective_castling().to_fen(),
            self.en_passant_target().unwrap_or_else(|| "-".to_string())
        )
    }

    fn effective_castling(&self) -> CastlingRights {
        let at = |file: usize, rank: usize, kind: PieceKind, side: Side| {
            piece_at(&self.board, file, rank) == Some((kind, side))
        };
        let white_king = at(4, 0, PieceKind::King, Side::White);
        let black_king = at(4, 7, PieceKind::King, Side::Black);
        CastlingRights {
            white_kingside: self.castling.white_kingside
                && white_king
                && at(7, 0, PieceKind::Rook, Side::White),
            white_queenside: self.castling.white_queenside
                && white_king
                && at(0, 0, PieceKind::Rook, Side::White),
            black_kingside: self.castling.black_kingside
                && black_king
                && at(7, 7, PieceKind::Rook, Side::Black),
            black_queenside: self.castling.black_queenside
                && black_king
                && at(0, 7, PieceKind::Rook, Side::Black),
        }
    }

    fn en_passant_target(&self) -> Option<String> {
        let file = self.en_passant_file? as usize;
        let mover = self.side_to_move.opponent();
        let (pawn_rank, target_rank) = match mover {
            Side::White => (3, 2),
            Side::Black => (4, 5),
        };
        if piece_at(&self.board, file, pawn_rank) != Some((PieceKind::Pawn, mover)) {
            return None;
        }
        let capturer = Some((PieceKind::Pawn, self.side_to_move));
        let can_capture = (file > 0 && piece_at(&self.board, file - 1, pawn_rank) == capturer)
            || piece_at(&self.board, file + 1, pawn_rank) == capturer;
        can_capture.then(|| format!("{}{}", (b'a' + file as u8) as char, target_rank + 1))
    }

    fn to_board(&self) -> Result<Board, RulesError> {
        let fen = self.fen();
        Board::from_str(&fen).map_err(|_| RulesError::InvalidPosition { fen })
    }

    /// 走一步，返回新局面
    pub fn apply(&self, mv: &Move) -> Result<Position, RulesError> {
        let board = self.to_board()?;
        if !board.legal(mv.inner) {
            return Err(RulesError::IllegalMove {
                text: mv.canonical(),
                fen: self.fen(),
            });
        }
        let next = board.make_move_new(mv.inner);

        let mut lexigraphic = String::with_capacity(self.board.len());
        for rank in (0..BOARD_SIZE).rev() {
            for file in 0..BOARD_SIZE {
                let sq = square(file, rank);
                let c = match (next.piece_on(sq), next.color_on(sq)) {
                    (Some(piece), Some(color)) => from_piece(piece).to_board_char(from_color(color)),
                    _ => EMPTY_SQUARE,
                };
                lexigraphic.push(c);
            }
        }

        let white = next.castle_rights(Color::White);
        let black = next.castle_rights(Color::Black);
        Ok(Position {
            board: lexigraphic,
            side_to_move: from_color(next.side_to_move()),
            castling: CastlingRights {
                white_kingside: white.has_kingside(),
                white_queenside: white.has_queenside(),
                black_kingside: black.has_kingside(),
                black_queenside: black.has_queenside(),
            },
            en_passant_file: mv.double_push_file(),
        })
    }

    /// 解析 verbose 走法：`P/e2-e4`、`P/e7-e8=Q`、`o-o`、`o-o-o`
    pub fn parse_verbose(&self, text: &str) -> Result<Move, RulesError> {
        match text {
            "o-o" | "O-O" => return self.short_castle(),
            "o-o-o" | "O-O-O" => return self.long_castle(),
            _ => {}
        }
        let malformed = || RulesError::MalformedMove {
            text: text.to_string(),
        };

        let (_, body) = text.split_once('/').ok_or_else(malformed)?;
        let (body, promotion) = match body.split_once('=') {
            Some((body, promotion)) => (body, Some(promotion)),
            None => (body, None),
        };
        let (from, to) = body.split_once('-').ok_or_else(malformed)?;
        let from = Square::from_str(from).map_err(|_| malformed())?;
        let to = Square::from_str(to).map_err(|_| malformed())?;
        let promotion = match promotion {
            Some(letter) => Some(promotion_piece(letter).ok_or_else(malformed)?),
            None => None,
        };

        self.build_move(from, to, promotion, text)
    }

    /// 解析 Warren Smith 记法：`e2e4`、`e4d5p`、`e1g1c`、`e5d6E`、`e7e8Q`
    pub fn parse_smith(&self, text: &str) -> Result<Move, RulesError> {
        let malformed = || RulesError::MalformedMove {
            text: text.to_string(),
        };
        if text.len() < 4 || !text.is_ascii() {
            return Err(malformed());
        }

        let from = Square::from_str(&text[0..2]).map_err(|_| malformed())?;
        let to = Square::from_str(&text[2..4]).map_err(|_| malformed())?;
        let mut promotion = None;
        for c in text[4..].chars() {
            match c {
                'N' | 'B' | 'R' | 'Q' => {
                    promotion = PieceKind::from_letter(c).map(to_piece);
                }
                // 被吃的棋子、王车易位、吃过路兵
                'p' | 'n' | 'b' | 'r' | 'q' | 'c' | 'C' | 'E' => {}
                _ => return Err(malformed()),
            }
        }

        self.build_move(from, to, promotion, text)
    }

    /// 解析规范字符串或坐标记法：`e2e4`、`e7e8=Q`、`e7e8q`、`O-O`、`O-O-O`
    pub fn parse_move(&self, text: &str) -> Result<Move, RulesError> {
        match text {
            "O-O" | "o-o" | "0-0" => return self.short_castle(),
            "O-O-O" | "o-o-o" | "0-0-0" => return self.long_castle(),
            _ => {}
        }
        let malformed = || RulesError::MalformedMove {
            text: text.to_string(),
        };
        if text.len() < 4 || !text.is_ascii() {
            return Err(malformed());
        }

        let from = Square::from_str(&text[0..2]).map_err(|_| malformed())?;
        let to = Square::from_str(&text[2..4]).map_err(|_| malformed())?;
        let promotion = match text[4..].trim_start_matches('=') {
            "" => None,
            letter => Some(promotion_piece(letter).ok_or_else(malformed)?),
        };

        self.build_move(from, to, promotion, text)
    }

    /// 走子方短易位
    pub fn short_castle(&self) -> Result<Move, RulesError> {
        self.castle(CastlingSide::Kingside, "O-O")
    }

    /// 走子方长易位
    pub fn long_castle(&self) -> Result<Move, RulesError> {
        self.castle(CastlingSide::Queenside, "O-O-O")
    }

    fn castle(&self, side: CastlingSide, text: &str) -> Result<Move, RulesError> {
        let rank = match self.side_to_move {
            Side::White => 0,
            Side::Black => BOARD_SIZE - 1,
        };
        let king = (0..BOARD_SIZE)
            .find(|&file| piece_at(&self.board, file, rank) == Some((PieceKind::King, self.side_to_move)))
            .ok_or_else(|| RulesError::IllegalMove {
                text: text.to_string(),
                fen: self.fen(),
            })?;
        let dest = match side {
            CastlingSide::Kingside => 6,
            CastlingSide::Queenside => 2,
        };
        self.build_move(square(king, rank), square(dest, rank), None, text)
    }

    fn build_move(
        &self,
        from: Square,
        to: Square,
        promotion: Option<Piece>,
        text: &str,
    ) -> Result<Move, RulesError> {
        let board = self.to_board()?;
        let illegal = || RulesError::IllegalMove {
            text: text.to_string(),
            fen: self.fen(),
        };

        let inner = ChessMove::new(from, to, promotion);
        if !board.legal(inner) {
            return Err(illegal());
        }
        let piece = board.piece_on(from).map(from_piece).ok_or_else(illegal)?;
        let side = board.color_on(from).map(from_color).ok_or_else(illegal)?;

        let file_delta = to.get_file().to_index() as i32 - from.get_file().to_index() as i32;
        let castling = match (piece, file_delta) {
            (PieceKind::King, 2) => Some(CastlingSide::Kingside),
            (PieceKind::King, -2) => Some(CastlingSide::Queenside),
            _ => None,
        };
        let en_passant =
            piece == PieceKind::Pawn && file_delta != 0 && board.piece_on(to).is_none();
        let captured = if en_passant {
            Some(PieceKind::Pawn)
        } else {
            board.piece_on(to).map(from_piece)
        };

        Ok(Move {
            inner,
            piece,
            side,
            captured,
            castling,
            en_passant,
            san: None,
        })
    }
}

/// 从初始局面依次走完所有走法
pub fn replay(initial: &Position, moves: &[Move]) -> Result<Position, RulesError> {
    moves
        .iter()
        .try_fold(initial.clone(), |position, mv| position.apply(mv))
}

// === 类型转换 ===

fn square(file: usize, rank: usize) -> Square {
    Square::make_square(Rank::from_index(rank), File::from_index(file))
}

fn promotion_piece(letter: &str) -> Option<Piece> {
    let mut chars = letter.chars();
    let kind = PieceKind::from_letter(chars.next()?)?;
    if chars.next().is_some() || matches!(kind, PieceKind::Pawn | PieceKind::King) {
        return None;
    }
    Some(to_piece(kind))
}

fn to_piece(kind: PieceKind) -> Piece {
    match kind {
        PieceKind::Pawn => Piece::Pawn,
        PieceKind::Knight => Piece::Knight,
        PieceKind::Bishop => Piece::Bishop,
        PieceKind::Rook => Piece::Rook,
        PieceKind::Queen => Piece::Queen,
        PieceKind::King => Piece::King,
    }
}

fn from_piece(piece: Piece) -> PieceKind {
    match piece {
        Piece::Pawn => PieceKind::Pawn,
        Piece::Knight => PieceKind::Knight,
        Piece::Bishop => PieceKind::Bishop,
        Piece::Rook => PieceKind::Rook,
        Piece::Queen => PieceKind::Queen,
        Piece::King => PieceKind::King,
    }
}

fn from_color(color: Color) -> Side {
    match color {
        Color::White => Side::White,
        Color::Black => Side::Black,
    }
}
