//! 国际象棋服务器文本协议库
//!
//! 包含:
//! - 棋子、阵营与 style 12 棋盘快照
//! - 对局信息、增量棋盘、提议、求战等结构化记录
//! - 逐行解码 (ServerRecord)
//! - 传输层抽象 (RecordSource, CommandSink traits)

mod board;
mod constants;
mod error;
mod message;
mod piece;
mod record;
mod transport;

pub use board::{
    material, piece_at, placement_fen, square_index, validate_board, BoardSnapshot,
    CastlingRights, GameType, Relation,
};
pub use constants::*;
pub use error::{ParseError, ProtocolError, Result};
pub use message::ServerRecord;
pub use piece::{PieceKind, Side};
pub use record::{
    ChatMessage, DeltaBoard, GameEnd, GameId, GameInfo, GameOutcome, IllegalMoveReason, Ivar,
    OfferIndex, OfferKind, OfferRecord, PendingOffer, Rating, RatingMark, SeekIndex, SeekInfo,
};
pub use transport::{CommandSink, LineSource, LineWriter, RecordSource};
