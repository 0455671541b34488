//! 走法回显关联
//!
//! 用户发出的走法在服务器确认（回显）或拒绝之前保存在对局的未确认队列中。
//! 比较一律使用走法的规范字符串，也就是发给服务器的那个字符串。

use protocol::IllegalMoveReason;

use crate::events::GameEvent;
use crate::rules::Move;
use crate::store::{GameRecord, GameStore};

/// 分类器得到的走法是否为队首的未确认走法，是则出队
pub fn echo(record: &mut GameRecord, mv: &Move) -> bool {
    let echoed = record
        .unechoed_head()
        .is_some_and(|head| head.canonical() == mv.canonical());
    if echoed {
        record.pop_unechoed();
        tracing::trace!("对局 {}: 走法 {} 已回显", record.id(), mv.canonical());
    }
    echoed
}

/// 处理服务器的非法走法通知
///
/// 只有本客户端发出的走法被拒绝时才产生事件；通知可能不带走法文本
/// （例如不是用户走棋时）。
pub fn reject(
    store: &mut GameStore,
    move_text: Option<&str>,
    reason: IllegalMoveReason,
) -> Option<GameEvent> {
    let id = store.find_my_game()?;
    let record = store.lookup_mut(id).ok()?;
    let Some(head) = record.unechoed_head() else {
        tracing::debug!("对局 {}: 没有未确认的走法，忽略非法走法通知", id);
        return None;
    };

    let ours = move_text.map_or(true, |text| text == head.canonical());
    if !ours {
        tracing::debug!(
            "对局 {}: 被拒绝的走法 {:?} 不是本客户端发出的",
            id,
            move_text
        );
        return None;
    }

    let mv = head.clone();
    record.clear_unechoed();
    tracing::info!("对局 {}: 走法 {} 被拒绝 ({:?})", id, mv.canonical(), reason);
    Some(GameEvent::IllegalMove {
        game: record.game().clone(),
        mv,
        reason,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::Game;
    use crate::rules::{Position, Variant};
    use crate::test_support::{info_for, snapshot, SnapshotSpec};
    use protocol::{GameId, Relation};

    fn my_game() -> GameStore {
        let snap = snapshot(&SnapshotSpec {
            relation: Relation::PlayingMyMove,
            ..SnapshotSpec::default()
        });
        let mut store = GameStore::new();
        store.create(
            Game::new(&info_for(&snap, "blitz"), &snap, Variant::Chess),
            snap,
        );
        store
    }

    fn queue(store: &mut GameStore, text: &str) -> Move {
        let mv = Position::initial().parse_move(text).unwrap();
        store
            .lookup_mut(GameId(7))
            .unwrap()
            .enqueue_unechoed(mv.clone());
        mv
    }

    #[test]
    fn test_rejected_then_ignored() {
        let mut store = my_game();
        let knight = queue(&mut store, "g1f3");

        let event = reject(&mut store, Some("g1f3"), IllegalMoveReason::Illegal).unwrap();
        match event {
            GameEvent::IllegalMove { mv, reason, .. } => {
                assert_eq!(mv, knight);
                assert_eq!(reason, IllegalMoveReason::Illegal);
            }
            other => panic!("unexpected event: {:?}", other),
        }
        assert_eq!(store.lookup(GameId(7)).unwrap().unechoed_len(), 0);

        // 队列已空
        assert!(reject(&mut store, Some("g1f3"), IllegalMoveReason::Illegal).is_none());
    }

    #[test]
    fn test_rejection_without_text_clears_queue() {
        let mut store = my_game();
        queue(&mut store, "e2e4");
        queue(&mut store, "d2d4");

        let event = reject(&mut store, None, IllegalMoveReason::NotYourTurn);
        assert!(matches!(
            event,
            Some(GameEvent::IllegalMove { reason: IllegalMoveReason::NotYourTurn, ref mv, .. })
                if mv.canonical() == "e2e4"
        ));
        assert_eq!(store.lookup(GameId(7)).unwrap().unechoed_len(), 0);
    }

    #[test]
    fn test_rejection_of_other_command_ignored() {
        let mut store = my_game();
        queue(&mut store, "e2e4");

        assert!(reject(&mut store, Some("Qh5"), IllegalMoveReason::Illegal).is_none());
        assert_eq!(store.lookup(GameId(7)).unwrap().unechoed_len(), 1);
    }

    #[test]
    fn test_no_game_is_ignored() {
        let mut store = GameStore::new();
        assert!(reject(&mut store, None, IllegalMoveReason::Other).is_none());
    }

    #[test]
    fn test_echo_pops_matching_head() {
        let mut store = my_game();
        let e4 = queue(&mut store, "e2e4");
        let d4 = Position::initial().parse_move("d2d4").unwrap();

        let record = store.lookup_mut(GameId(7)).unwrap();
        assert!(!echo(record, &d4));
        assert_eq!(record.unechoed_len(), 1);
        assert!(echo(record, &e4.with_san(Some("e4".to_string()))));
        assert_eq!(record.unechoed_len(), 0);
    }
}
