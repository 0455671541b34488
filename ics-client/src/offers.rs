//! 提议状态机
//!
//! 和棋、中止、封盘提议按 (玩家, 种类) 记录开关状态，悔棋提议按玩家记录
//! 半回合数（0 表示没有）。服务器既发送带编号的提议（`<pf>`/`<pt>`/`<pr>`），
//! 也发送纯文本通知，两种形式作用于同一份状态。

use protocol::{GameId, OfferIndex, OfferKind, OfferRecord, PendingOffer, Side};

use crate::events::GameEvent;
use crate::store::{GameRecord, GameStore};

/// 带编号的提议
pub fn offer_made(store: &mut GameStore, offer: &OfferRecord) -> Vec<GameEvent> {
    let Some(kind) = offer.offer.kind() else {
        tracing::trace!("忽略对局外的提议 {}", offer.index);
        return Vec::new();
    };
    let Some(id) = store.find_my_game_against(&offer.opponent) else {
        tracing::debug!("提议 {}: 没有与 {} 的对局", offer.index, offer.opponent);
        return Vec::new();
    };
    let Ok(record) = store.lookup_mut(id) else {
        return Vec::new();
    };
    let Some(user) = record.game().user_side else {
        return Vec::new();
    };
    let player = if offer.to_user { user.opponent() } else { user };

    let mut events = Vec::new();
    match offer.offer {
        PendingOffer::Takeback(plies) => {
            record.record_takeback_index(offer.index, player, plies);
            // 新的悔棋提议总是取代对方的悔棋提议
            update_takeback(record, player.opponent(), 0, &mut events);
            update_takeback(record, player, plies, &mut events);
        }
        _ => {
            record.record_offer_index(offer.index, player, kind);
            update_offer(record, kind, player, true, &mut events);
        }
    }
    store.register_offer(offer.index, id);
    events
}

/// 带编号的提议被移除；未知编号（已经处理过）直接忽略
pub fn offer_removed(store: &mut GameStore, index: OfferIndex) -> Vec<GameEvent> {
    let Some(id) = store.take_offer(index) else {
        tracing::trace!("提议 {} 未知或已移除", index);
        return Vec::new();
    };
    let Ok(record) = store.lookup_mut(id) else {
        return Vec::new();
    };

    let mut events = Vec::new();
    if let Some((player, kind)) = record.take_offer_index(index) {
        update_offer(record, kind, player, false, &mut events);
    } else if let Some((player, _)) = record.take_takeback_index(index) {
        update_takeback(record, player, 0, &mut events);
    }
    events
}

/// `NAME offers a KIND.`
pub fn player_offered(
    store: &mut GameStore,
    game_id: GameId,
    name: &str,
    kind: OfferKind,
) -> Vec<GameEvent> {
    with_player(store, game_id, name, |record, player, events| {
        update_offer(record, kind, player, true, events)
    })
}

/// `NAME declines the KIND request.`，被拒绝的是对方的提议
pub fn player_declined(
    store: &mut GameStore,
    game_id: GameId,
    name: &str,
    kind: OfferKind,
) -> Vec<GameEvent> {
    with_player(store, game_id, name, |record, player, events| {
        update_offer(record, kind, player.opponent(), false, events)
    })
}

/// `NAME withdraws the KIND request.`
pub fn player_withdrew(
    store: &mut GameStore,
    game_id: GameId,
    name: &str,
    kind: OfferKind,
) -> Vec<GameEvent> {
    with_player(store, game_id, name, |record, player, events| {
        update_offer(record, kind, player, false, events)
    })
}

/// `NAME requests to take back K half move(s).`
pub fn player_offered_takeback(
    store: &mut GameStore,
    game_id: GameId,
    name: &str,
    plies: u32,
) -> Vec<GameEvent> {
    with_player(store, game_id, name, |record, player, events| {
        update_takeback(record, player, plies, events)
    })
}

/// `NAME proposes a different number (K) of half-move(s) to take back.`
///
/// 先撤回对方的悔棋提议，再设置新的半回合数；每一步都产生事件。
pub fn player_countered_takeback(
    store: &mut GameStore,
    game_id: GameId,
    name: &str,
    plies: u32,
) -> Vec<GameEvent> {
    with_player(store, game_id, name, |record, player, events| {
        update_takeback(record, player.opponent(), 0, events);
        update_takeback(record, player, plies, events);
    })
}

fn with_player(
    store: &mut GameStore,
    game_id: GameId,
    name: &str,
    update: impl FnOnce(&mut GameRecord, Side, &mut Vec<GameEvent>),
) -> Vec<GameEvent> {
    let Ok(record) = store.lookup_mut(game_id) else {
        tracing::debug!("对局 {} 不存在，忽略 {} 的提议通知", game_id, name);
        return Vec::new();
    };
    let Some(player) = record.game().player_named(name) else {
        tracing::debug!("对局 {} 中没有玩家 {}", game_id, name);
        return Vec::new();
    };

    let mut events = Vec::new();
    update(record, player, &mut events);
    events
}

fn update_offer(
    record: &mut GameRecord,
    kind: OfferKind,
    player: Side,
    on: bool,
    events: &mut Vec<GameEvent>,
) {
    if kind == OfferKind::Takeback {
        // 服务器不说明半回合数，按 1 处理；撤回一个未知的提议时也要产生事件
        if !on && record.takeback_offer(player) == 0 {
            record.set_takeback_offer(player, 1);
        }
        update_takeback(record, player.opponent(), 0, events);
        update_takeback(record, player, u32::from(on), events);
        return;
    }

    record.set_offer(kind, player, on);
    events.push(GameEvent::OfferUpdated {
        game: record.game().clone(),
        kind,
        player,
        on,
        plies: 0,
    });
}

fn update_takeback(record: &mut GameRecord, player: Side, plies: u32, events: &mut Vec<GameEvent>) {
    let old = record.takeback_offer(player);
    if old != 0 {
        events.push(GameEvent::OfferUpdated {
            game: record.game().clone(),
            kind: OfferKind::Takeback,
            player,
            on: false,
            plies: old,
        });
    }

    record.set_takeback_offer(player, plies);
    if plies != 0 {
        events.push(GameEvent::OfferUpdated {
            game: record.game().clone(),
            kind: OfferKind::Takeback,
            player,
            on: true,
            plies,
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::Game;
    use crate::rules::Variant;
    use crate::test_support::{info_for, snapshot, SnapshotSpec};
    use protocol::Relation;

    /// 用户 Newton 执白与 Einstein 对局
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

    fn offer(line: &str) -> OfferRecord {
        let to_user = line.starts_with("<pf>");
        OfferRecord::parse_line(line, to_user).unwrap()
    }

    /// (种类, 玩家, 开关, 半回合数)
    fn summary(events: &[GameEvent]) -> Vec<(OfferKind, Side, bool, u32)> {
        events
            .iter()
            .filter_map(|event| match event {
                GameEvent::OfferUpdated {
                    kind,
                    player,
                    on,
                    plies,
                    ..
                } => Some((*kind, *player, *on, *plies)),
                _ => None,
            })
            .collect()
    }

    #[test]
    fn test_indexed_draw_offer() {
        let mut store = my_game();

        let events = offer_made(&mut store, &offer("<pf> 12 w=Einstein t=draw p=#"));
        assert_eq!(summary(&events), vec![(OfferKind::Draw, Side::Black, true, 0)]);
        assert!(store
            .lookup(GameId(7))
            .unwrap()
            .is_offered(OfferKind::Draw, Side::Black));

        let events = offer_removed(&mut store, OfferIndex(12));
        assert_eq!(summary(&events), vec![(OfferKind::Draw, Side::Black, false, 0)]);
        assert!(!store
            .lookup(GameId(7))
            .unwrap()
            .is_offered(OfferKind::Draw, Side::Black));

        // 重复移除
        assert!(offer_removed(&mut store, OfferIndex(12)).is_empty());
    }

    #[test]
    fn test_offer_from_user() {
        let mut store = my_game();
        let events = offer_made(&mut store, &offer("<pt> 3 w=Einstein t=abort p=#"));
        assert_eq!(summary(&events), vec![(OfferKind::Abort, Side::White, true, 0)]);
    }

    #[test]
    fn test_offer_against_unknown_opponent() {
        let mut store = my_game();
        assert!(offer_made(&mut store, &offer("<pf> 4 w=Leibniz t=draw p=#")).is_empty());
        assert!(offer_removed(&mut store, OfferIndex(4)).is_empty());
    }

    #[test]
    fn test_indexed_takeback_supersedes_opponent() {
        let mut store = my_game();
        offer_made(&mut store, &offer("<pt> 20 w=Einstein t=takeback p=2"));

        let events = offer_made(&mut store, &offer("<pf> 21 w=Einstein t=takeback p=1"));
        assert_eq!(
            summary(&events),
            vec![
                (OfferKind::Takeback, Side::White, false, 2),
                (OfferKind::Takeback, Side::Black, true, 1),
            ]
        );

        let events = offer_removed(&mut store, OfferIndex(21));
        assert_eq!(summary(&events), vec![(OfferKind::Takeback, Side::Black, false, 1)]);
        // 白方的提议已被取代
        assert!(offer_removed(&mut store, OfferIndex(20)).is_empty());
    }

    #[test]
    fn test_free_text_offers() {
        let mut store = my_game();

        let events = player_offered(&mut store, GameId(7), "Einstein", OfferKind::Adjourn);
        assert_eq!(summary(&events), vec![(OfferKind::Adjourn, Side::Black, true, 0)]);

        // 拒绝的是对方的提议
        let events = player_declined(&mut store, GameId(7), "Newton", OfferKind::Adjourn);
        assert_eq!(summary(&events), vec![(OfferKind::Adjourn, Side::Black, false, 0)]);

        let events = player_withdrew(&mut store, GameId(7), "Newton", OfferKind::Draw);
        assert_eq!(summary(&events), vec![(OfferKind::Draw, Side::White, false, 0)]);

        assert!(player_offered(&mut store, GameId(8), "Newton", OfferKind::Draw).is_empty());
        assert!(player_offered(&mut store, GameId(7), "Leibniz", OfferKind::Draw).is_empty());
    }

    #[test]
    fn test_free_text_takeback_defaults_to_one_ply() {
        let mut store = my_game();

        let events = player_offered(&mut store, GameId(7), "Newton", OfferKind::Takeback);
        assert_eq!(summary(&events), vec![(OfferKind::Takeback, Side::White, true, 1)]);

        // 撤回一个未知的悔棋提议也会产生事件，同时清除对方的提议
        let events = player_withdrew(&mut store, GameId(7), "Einstein", OfferKind::Takeback);
        assert_eq!(
            summary(&events),
            vec![
                (OfferKind::Takeback, Side::White, false, 1),
                (OfferKind::Takeback, Side::Black, false, 1),
            ]
        );
        let record = store.lookup(GameId(7)).unwrap();
        assert_eq!(record.takeback_offer(Side::White), 0);
        assert_eq!(record.takeback_offer(Side::Black), 0);
    }

    #[test]
    fn test_counter_takeback() {
        let mut store = my_game();

        let events = player_offered_takeback(&mut store, GameId(7), "Newton", 2);
        assert_eq!(summary(&events), vec![(OfferKind::Takeback, Side::White, true, 2)]);

        let events = player_countered_takeback(&mut store, GameId(7), "Einstein", 1);
        assert_eq!(
            summary(&events),
            vec![
                (OfferKind::Takeback, Side::White, false, 2),
                (OfferKind::Takeback, Side::Black, true, 1),
            ]
        );

        // 再次还价：先撤回自己之前的提议
        let events = player_countered_takeback(&mut store, GameId(7), "Einstein", 3);
        assert_eq!(
            summary(&events),
            vec![
                (OfferKind::Takeback, Side::Black, false, 1),
                (OfferKind::Takeback, Side::Black, true, 3),
            ]
        );
        let record = store.lookup(GameId(7)).unwrap();
        assert_eq!(record.takeback_offer(Side::Black), 3);
        assert_eq!(record.takeback_offer(Side::White), 0);
    }
}
