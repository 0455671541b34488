//! 增量棋盘归一化
//!
//! 把 `<d1>` 增量棋盘还原为完整快照，交给分类器按普通快照处理。

use protocol::{BoardSnapshot, CastlingRights, DeltaBoard, PieceKind, Side};

use crate::error::{Result, SyncError};
use crate::rules::{replay, Position};
use crate::store::GameRecord;

/// 由对局记录与增量棋盘构造完整快照
///
/// 走法历史无法用规则引擎重放时返回 [`SyncError::Desync`]。
pub fn normalize(record: &GameRecord, delta: &DeltaBoard) -> Result<BoardSnapshot> {
    let game = record.game();
    if !game.variant.supports_delta() {
        return Err(SyncError::DeltaUnsupported(game.id));
    }
    let desync = |reason: String| SyncError::Desync {
        game: game.id,
        reason,
    };

    let before = replay(&game.initial_position, record.moves())
        .map_err(|e| desync(format!("replay failed: {}", e)))?;
    let previous = record.last_snapshot();
    if !before.same_placement(&Position::from_snapshot(previous)) {
        return Err(desync("replayed position differs from the last board".to_string()));
    }

    let mv = before
        .parse_smith(&delta.move_smith)
        .map_err(|e| desync(format!("delta move rejected: {}", e)))?
        .with_san(Some(delta.move_san.clone()));
    let after = before
        .apply(&mv)
        .map_err(|e| desync(format!("delta move rejected: {}", e)))?;

    let from = mv.from_square();
    let from_home = |file: usize, rank: usize| {
        from.get_file().to_index() == file && from.get_rank().to_index() == rank
    };
    // 只有走子方的王移动才影响该方的易位权
    let king_moved = |side: Side| mv.piece() == PieceKind::King && mv.side() == side;
    let white_king = king_moved(Side::White);
    let black_king = king_moved(Side::Black);
    let old = previous.castling;
    let castling = CastlingRights {
        white_kingside: old.white_kingside && !white_king && !from_home(7, 0),
        white_queenside: old.white_queenside && !white_king && !from_home(0, 0),
        black_kingside: old.black_kingside && !black_king && !from_home(7, 7),
        black_queenside: old.black_queenside && !black_king && !from_home(0, 7),
    };
    let irreversible = mv.is_pawn_move() || mv.is_capture() || castling != old;

    let side_to_move = after.side_to_move();
    let relation = match game.user_side {
        Some(user) => previous.relation.with_my_turn(side_to_move == user),
        None => previous.relation,
    };
    let (white_time_ms, black_time_ms) = match mv.side() {
        Side::White => (delta.remaining_ms, previous.black_time_ms),
        Side::Black => (previous.white_time_ms, delta.remaining_ms),
    };
    let next_move_number = match side_to_move {
        Side::White => previous.next_move_number + 1,
        Side::Black => previous.next_move_number,
    };

    Ok(BoardSnapshot {
        board: after.lexigraphic().to_string(),
        side_to_move,
        double_pawn_push_file: mv.double_push_file(),
        castling,
        reversible_plies: if irreversible {
            0
        } else {
            previous.reversible_plies + 1
        },
        game_id: previous.game_id,
        white_name: previous.white_name.clone(),
        black_name: previous.black_name.clone(),
        relation,
        initial_time_secs: previous.initial_time_secs,
        increment_secs: previous.increment_secs,
        white_strength: after.material(Side::White),
        black_strength: after.material(Side::Black),
        white_time_ms,
        black_time_ms,
        next_move_number,
        move_verbose: Some(mv.verbose()),
        move_time_ms: delta.taken_ms,
        move_san: Some(delta.move_san.clone()),
        flipped: previous.flipped,
        clock_running: true,
        lag_ms: 0,
    })
}
