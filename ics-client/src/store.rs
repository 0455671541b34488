//! 对局状态存储
//!
//! 每个活动对局对应一个 [`GameRecord`]，由解码路径独占修改。

use std::collections::btree_map::Entry;
use std::collections::{BTreeMap, HashMap, HashSet, VecDeque};
use std::sync::Arc;

use chrono::Utc;
use protocol::{BoardSnapshot, GameId, GameInfo, GameOutcome, GameType, OfferIndex, OfferKind, Side};

use crate::error::{Result, SyncError};
use crate::game::Game;
use crate::rules::{Move, Position};

/// 单个对局的状态
#[derive(Debug, Clone)]
pub struct GameRecord {
    game: Arc<Game>,
    /// 自 `initial_position` 以来的走法
    moves: Vec<Move>,
    last_snapshot: BoardSnapshot,
    board_setup: bool,
    /// 用户已发出、尚未被服务器确认或拒绝的走法
    unechoed: VecDeque<Move>,
    offers: HashMap<OfferIndex, (Side, OfferKind)>,
    takeback_offers: HashMap<OfferIndex, (Side, u32)>,
    active_offers: HashSet<(Side, OfferKind)>,
    /// 每方提出悔棋的半回合数，0 表示没有
    takeback: [u32; 2],
}

impl GameRecord {
    fn new(game: Game, snapshot: BoardSnapshot) -> Self {
        Self {
            game: Arc::new(game),
            moves: Vec::new(),
            last_snapshot: snapshot,
            board_setup: false,
            unechoed: VecDeque::new(),
            offers: HashMap::new(),
            takeback_offers: HashMap::new(),
            active_offers: HashSet::new(),
            takeback: [0; 2],
        }
    }

    pub fn id(&self) -> GameId {
        self.game.id
    }

    /// 当前对局快照（事件携带）
    pub fn game(&self) -> &Arc<Game> {
        &self.game
    }

    pub fn game_mut(&mut self) -> &mut Game {
        Arc::make_mut(&mut self.game)
    }

    // === 走法历史 ===

    pub fn moves(&self) -> &[Move] {
        &self.moves
    }

    pub fn append_move(&mut self, mv: Move) {
        self.moves.push(mv);
    }

    /// 去掉最后 `count` 步，步数不足时返回 `false` 且不做修改
    pub fn truncate_moves(&mut self, count: usize) -> bool {
        match self.moves.len().checked_sub(count) {
            Some(len) => {
                self.moves.truncate(len);
                true
            }
            None => false,
        }
    }

    /// 重置初始局面并清空走法历史
    pub fn replace_initial_position(&mut self, position: Position, plies_since_start: u32) {
        self.moves.clear();
        let game = self.game_mut();
        game.initial_position = position;
        game.plies_since_start = plies_since_start;
    }

    pub fn last_snapshot(&self) -> &BoardSnapshot {
        &self.last_snapshot
    }

    pub fn set_last_snapshot(&mut self, snapshot: BoardSnapshot) {
        self.last_snapshot = snapshot;
    }

    pub fn board_setup(&self) -> bool {
        self.board_setup
    }

    pub fn set_board_setup(&mut self, on: bool) {
        self.board_setup = on;
    }

    // === 未确认走法 ===

    pub fn enqueue_unechoed(&mut self, mv: Move) {
        self.unechoed.push_back(mv);
    }

    pub fn unechoed_head(&self) -> Option<&Move> {
        self.unechoed.front()
    }

    pub fn pop_unechoed(&mut self) -> Option<Move> {
        self.unechoed.pop_front()
    }

    pub fn clear_unechoed(&mut self) {
        self.unechoed.clear();
    }

    pub fn unechoed_len(&self) -> usize {
        self.unechoed.len()
    }

    // === 提议 ===

    pub fn is_offered(&self, kind: OfferKind, side: Side) -> bool {
        self.active_offers.contains(&(side, kind))
    }

    pub fn set_offer(&mut self, kind: OfferKind, side: Side, on: bool) {
        if on {
            self.active_offers.insert((side, kind));
        } else {
            self.active_offers.remove(&(side, kind));
        }
    }

    pub fn record_offer_index(&mut self, index: OfferIndex, side: Side, kind: OfferKind) {
        self.offers.insert(index, (side, kind));
    }

    pub fn take_offer_index(&mut self, index: OfferIndex) -> Option<(Side, OfferKind)> {
        self.offers.remove(&index)
    }

    pub fn record_takeback_index(&mut self, index: OfferIndex, side: Side, plies: u32) {
        self.takeback_offers.insert(index, (side, plies));
    }

    pub fn take_takeback_index(&mut self, index: OfferIndex) -> Option<(Side, u32)> {
        self.takeback_offers.remove(&index)
    }

    fn offer_indices(&self) -> impl Iterator<Item = &OfferIndex> {
        self.offers.keys().chain(self.takeback_offers.keys())
    }

    pub fn takeback_offer(&self, side: Side) -> u32 {
        self.takeback[side.index()]
    }

    pub fn set_takeback_offer(&mut self, side: Side, plies: u32) {
        self.takeback[side.index()] = plies;
    }
}

/// 被销毁的对局
#[derive(Debug)]
pub struct DestroyedGame {
    pub game: Arc<Game>,
    /// 被销毁的是用户自己的对局（服务器在对局期间不发送求战更新）
    pub was_my_game: bool,
}

/// 所有活动对局
#[derive(Debug, Default)]
pub struct GameStore {
    games: BTreeMap<GameId, GameRecord>,
    /// 规则不受支持的对局，其后续快照全部忽略
    unsupported: HashSet<GameId>,
    /// 已收到但尚未被第一个快照使用的对局信息
    pending_info: HashMap<GameId, GameInfo>,
    offer_games: HashMap<OfferIndex, GameId>,
    primary_played: Option<GameId>,
    primary_observed: Option<GameId>,
}

impl GameStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// 创建对局记录
    pub fn create(&mut self, game: Game, snapshot: BoardSnapshot) -> &mut GameRecord {
        let id = game.id;
        if game.is_my_played_game() && self.primary_played.is_none() {
            self.primary_played = Some(id);
        }
        let record = GameRecord::new(game, snapshot);
        match self.games.entry(id) {
            Entry::Occupied(mut entry) => {
                tracing::warn!("对局 {} 已存在，替换旧记录", id);
                let old = entry.insert(record);
                for index in old.offer_indices() {
                    self.offer_games.remove(index);
                }
                entry.into_mut()
            }
            Entry::Vacant(entry) => entry.insert(record),
        }
    }

    pub fn contains(&self, id: GameId) -> bool {
        self.games.contains_key(&id)
    }

    pub fn lookup(&self, id: GameId) -> Result<&GameRecord> {
        self.games.get(&id).ok_or(SyncError::NoSuchGame(id))
    }

    pub fn lookup_mut(&mut self, id: GameId) -> Result<&mut GameRecord> {
        self.games.get_mut(&id).ok_or(SyncError::NoSuchGame(id))
    }

    /// 所有活动对局的编号（升序）
    pub fn ids(&self) -> Vec<GameId> {
        self.games.keys().copied().collect()
    }

    pub fn is_empty(&self) -> bool {
        self.games.is_empty()
    }

    /// 销毁对局记录，清除指向它的主对局标记与提议编号
    ///
    /// 无论对局是否存在都会清除其“不受支持”标记。
    pub fn destroy(&mut self, id: GameId, outcome: GameOutcome) -> Result<DestroyedGame> {
        self.unsupported.remove(&id);
        self.pending_info.remove(&id);
        let record = self.games.remove(&id).ok_or(SyncError::NoSuchGame(id))?;

        if self.primary_played == Some(id) {
            self.primary_played = None;
        }
        if self.primary_observed == Some(id) {
            self.primary_observed = None;
        }
        for index in record.offer_indices() {
            self.offer_games.remove(index);
        }

        let mut game = record.game;
        {
            let game = Arc::make_mut(&mut game);
            game.outcome = Some(outcome);
            game.ended_at = Some(Utc::now());
        }
        let was_my_game = game.game_type == GameType::MyGame;
        Ok(DestroyedGame { game, was_my_game })
    }

    // === 对局信息与不支持的对局 ===

    pub fn stash_info(&mut self, info: GameInfo) {
        self.pending_info.insert(info.game_id, info);
    }

    pub fn take_info(&mut self, id: GameId) -> Option<GameInfo> {
        self.pending_info.remove(&id)
    }

    pub fn mark_unsupported(&mut self, id: GameId) {
        self.unsupported.insert(id);
    }

    pub fn is_unsupported(&self, id: GameId) -> bool {
        self.unsupported.contains(&id)
    }

    // === 提议编号 ===

    pub fn register_offer(&mut self, index: OfferIndex, id: GameId) {
        self.offer_games.insert(index, id);
    }

    pub fn take_offer(&mut self, index: OfferIndex) -> Option<GameId> {
        self.offer_games.remove(&index)
    }

    // === 主对局 ===

    pub fn primary_played(&self) -> Option<GameId> {
        self.primary_played
    }

    pub fn primary_observed(&self) -> Option<GameId> {
        self.primary_observed
    }

    /// 按对局种类设置主对局，对局不存在时忽略
    pub fn set_primary(&mut self, id: GameId) {
        match self.games.get(&id) {
            Some(record) if record.game().is_my_played_game() => self.primary_played = Some(id),
            Some(_) => self.primary_observed = Some(id),
            None => tracing::debug!("主对局 {} 不存在，忽略", id),
        }
    }

    /// 车轮战中切换棋盘
    pub fn set_primary_played(&mut self, id: GameId) {
        self.primary_played = Some(id);
    }

    /// 用户的对局：优先主对局，否则任意一个用户自己的对局
    pub fn find_my_game(&self) -> Option<GameId> {
        if let Some(id) = self.primary_played.filter(|id| self.games.contains_key(id)) {
            return Some(id);
        }
        self.games
            .values()
            .find(|record| record.game().game_type == GameType::MyGame)
            .map(GameRecord::id)
    }

    /// 用户与指定对手正在下的对局
    pub fn find_my_game_against(&self, opponent: &str) -> Option<GameId> {
        self.games
            .values()
            .find(|record| {
                let game = record.game();
                game.is_my_played_game() && game.player_named(opponent).is_some()
            })
            .map(GameRecord::id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rules::Variant;
    use crate::test_support::{info_for, play, snapshot, SnapshotSpec};
    use protocol::Relation;

    fn game(id: u32, relation: Relation) -> (Game, BoardSnapshot) {
        let snap = snapshot(&SnapshotSpec {
            game_id: id,
            relation,
            ..SnapshotSpec::default()
        });
        (Game::new(&info_for(&snap, "blitz"), &snap, Variant::Chess), snap)
    }

    #[test]
    fn test_create_lookup_destroy() {
        let mut store = GameStore::new();
        let (g, snap) = game(7, Relation::ObservingPlayed);
        store.create(g, snap);

        assert!(store.lookup(GameId(7)).is_ok());
        assert!(matches!(
            store.lookup(GameId(8)),
            Err(SyncError::NoSuchGame(GameId(8)))
        ));

        let destroyed = store.destroy(GameId(7), GameOutcome::Draw).unwrap();
        assert!(!destroyed.was_my_game);
        assert_eq!(destroyed.game.outcome, Some(GameOutcome::Draw));
        assert!(destroyed.game.ended_at.is_some());
        assert!(store.is_empty());
        assert!(store.destroy(GameId(7), GameOutcome::Draw).is_err());
    }

    #[test]
    fn test_destroy_clears_primary_and_offers() {
        let mut store = GameStore::new();
        let (g, snap) = game(7, Relation::PlayingMyMove);
        store.create(g, snap);
        assert_eq!(store.primary_played(), Some(GameId(7)));

        store
            .lookup_mut(GameId(7))
            .unwrap()
            .record_offer_index(OfferIndex(12), Side::White, OfferKind::Draw);
        store.register_offer(OfferIndex(12), GameId(7));

        let destroyed = store.destroy(GameId(7), GameOutcome::Unknown).unwrap();
        assert!(destroyed.was_my_game);
        assert_eq!(store.primary_played(), None);
        assert_eq!(store.take_offer(OfferIndex(12)), None);
    }

    #[test]
    fn test_replacing_record_clears_old_offers() {
        let mut store = GameStore::new();
        let (g, snap) = game(7, Relation::PlayingMyMove);
        store.create(g, snap);
        store
            .lookup_mut(GameId(7))
            .unwrap()
            .record_takeback_index(OfferIndex(3), Side::Black, 2);
        store.register_offer(OfferIndex(3), GameId(7));

        let (g, snap) = game(7, Relation::PlayingMyMove);
        let record = store.create(g, snap);
        assert_eq!(record.takeback_offer(Side::Black), 0);
        assert_eq!(store.take_offer(OfferIndex(3)), None);
    }

    #[test]
    fn test_destroy_clears_unsupported_marker() {
        let mut store = GameStore::new();
        store.mark_unsupported(GameId(3));
        assert!(store.is_unsupported(GameId(3)));
        assert!(store.destroy(GameId(3), GameOutcome::Unknown).is_err());
        assert!(!store.is_unsupported(GameId(3)));
    }

    #[test]
    fn test_find_my_game() {
        let mut store = GameStore::new();
        let (observed, snap) = game(3, Relation::ObservingPlayed);
        store.create(observed, snap);
        assert_eq!(store.find_my_game(), None);

        let (examined, snap) = game(5, Relation::Examining);
        store.create(examined, snap);
        assert_eq!(store.find_my_game(), Some(GameId(5)));
        assert_eq!(store.find_my_game_against("Einstein"), None);

        let (played, snap) = game(9, Relation::PlayingOpponentMove);
        store.create(played, snap);
        assert_eq!(store.find_my_game(), Some(GameId(9)));
        assert_eq!(store.find_my_game_against("einstein"), Some(GameId(9)));

        store.set_primary(GameId(3));
        assert_eq!(store.primary_observed(), Some(GameId(3)));
    }

    #[test]
    fn test_move_history() {
        let (_, moves) = play(&["e2e4", "e7e5"]);
        let mut store = GameStore::new();
        let (g, snap) = game(7, Relation::ObservingPlayed);
        let record = store.create(g, snap);

        for mv in moves {
            record.append_move(mv);
        }
        assert!(!record.truncate_moves(3));
        assert_eq!(record.moves().len(), 2);
        assert!(record.truncate_moves(1));
        assert_eq!(record.moves()[0].canonical(), "e2e4");

        record.replace_initial_position(Position::initial(), 0);
        assert!(record.moves().is_empty());
    }

    #[test]
    fn test_takeback_offer_per_side() {
        let (g, snap) = game(7, Relation::PlayingMyMove);
        let mut store = GameStore::new();
        let record = store.create(g, snap);

        record.set_takeback_offer(Side::Black, 2);
        assert_eq!(record.takeback_offer(Side::Black), 2);
        assert_eq!(record.takeback_offer(Side::White), 0);
    }
}
