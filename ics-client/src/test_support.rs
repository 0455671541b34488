//! 测试辅助：通过规则引擎回放走法构造快照

use protocol::{BoardSnapshot, GameId, GameInfo, Relation, Side};

use crate::rules::{Move, Position};

/// 快照参数
pub struct SnapshotSpec<'a> {
    pub game_id: u32,
    /// 从初始局面开始依次走的着法（规范字符串）
    pub moves: &'a [&'a str],
    pub relation: Relation,
    pub white_time_ms: i64,
    pub black_time_ms: i64,
    pub flipped: bool,
    pub clock_running: bool,
    /// 是否带上最后一步的描述
    pub with_move_text: bool,
}

impl Default for SnapshotSpec<'_> {
    fn default() -> Self {
        Self {
            game_id: 7,
            moves: &[],
            relation: Relation::ObservingPlayed,
            white_time_ms: 120_000,
            black_time_ms: 120_000,
            flipped: false,
            clock_running: true,
            with_move_text: true,
        }
    }
}

/// 依次走完着法，返回最终局面与每一步
pub fn play(moves: &[&str]) -> (Position, Vec<Move>) {
    let mut position = Position::initial();
    let mut played = Vec::new();
    for text in moves {
        let mv = position.parse_move(text).unwrap();
        position = position.apply(&mv).unwrap();
        played.push(mv);
    }
    (position, played)
}

pub fn snapshot(spec: &SnapshotSpec<'_>) -> BoardSnapshot {
    let (position, moves) = play(spec.moves);
    let plies = moves.len() as u32;
    let last = moves.last().filter(|_| spec.with_move_text);

    BoardSnapshot {
        board: position.lexigraphic().to_string(),
        side_to_move: position.side_to_move(),
        double_pawn_push_file: position.en_passant_file(),
        castling: position.castling(),
        reversible_plies: 0,
        game_id: GameId(spec.game_id),
        white_name: "Newton".to_string(),
        black_name: "Einstein".to_string(),
        relation: spec.relation,
        initial_time_secs: 120,
        increment_secs: 12,
        white_strength: position.material(Side::White),
        black_strength: position.material(Side::Black),
        white_time_ms: spec.white_time_ms,
        black_time_ms: spec.black_time_ms,
        next_move_number: plies / 2 + 1,
        move_verbose: last.map(Move::verbose),
        move_time_ms: 0,
        move_san: last.map(Move::canonical),
        flipped: spec.flipped,
        clock_running: spec.clock_running,
        lag_ms: 0,
    }
}

/// 指定类别的对局信息
pub fn info_for(snapshot: &BoardSnapshot, category: &str) -> GameInfo {
    GameInfo {
        category: category.to_string(),
        ..GameInfo::placeholder(snapshot)
    }
}

/// 把快照渲染为 style 12 行
pub fn style12(snapshot: &BoardSnapshot) -> String {
    let rows: Vec<&str> = (0..8).map(|i| &snapshot.board[i * 8..i * 8 + 8]).collect();
    let flag = |b: bool| if b { "1" } else { "0" };
    format!(
        "<12> {} {} {} {} {} {} {} {} {} {} {} {} {} {} {} {} {} {} {} {} (0:00) {} {} {} {}",
        rows.join(" "),
        snapshot.side_to_move.to_style12_char(),
        snapshot
            .double_pawn_push_file
            .map_or(-1, |file| i32::from(file)),
        flag(snapshot.castling.white_kingside),
        flag(snapshot.castling.white_queenside),
        flag(snapshot.castling.black_kingside),
        flag(snapshot.castling.black_queenside),
        snapshot.reversible_plies,
        snapshot.game_id,
        snapshot.white_name,
        snapshot.black_name,
        snapshot.relation.code(),
        snapshot.initial_time_secs / 60,
        snapshot.increment_secs,
        snapshot.white_strength,
        snapshot.black_strength,
        snapshot.white_time_ms / 1000,
        snapshot.black_time_ms / 1000,
        snapshot.next_move_number,
        snapshot.move_verbose.as_deref().unwrap_or("none"),
        snapshot.move_san.as_deref().unwrap_or("none"),
        flag(snapshot.flipped),
        flag(snapshot.clock_running),
        snapshot.lag_ms,
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_style12_rendering_parses_back() {
        let snap = snapshot(&SnapshotSpec {
            moves: &["e2e4", "c7c5"],
            ..SnapshotSpec::default()
        });
        assert_eq!(BoardSnapshot::parse_style12(&style12(&snap)).unwrap(), snap);
    }
}
