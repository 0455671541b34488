//! 会话
//!
//! 逐条处理服务器记录，维护对局状态，产生事件与需要发送给服务器的命令。
//! 用户操作（走棋、认输、提和等）也在这里校验并转换为命令。

use std::collections::HashMap;

use protocol::{BoardSnapshot, GameId, GameOutcome, GameType, Ivar, SeekIndex, ServerRecord};

use crate::classifier::{Classification, Classifier};
use crate::config::ClientConfig;
use crate::correlator;
use crate::error::{Result, SyncError};
use crate::events::{ChatEvent, ConnectionEvent, Event, FriendsEvent, GameEvent};
use crate::normalizer::normalize;
use crate::offers;
use crate::rules::{Move, Position, VariantTable};
use crate::seek::SeekTable;
use crate::store::{GameRecord, GameStore};

/// 处理一条记录或一次操作后待发出的事件与命令
#[derive(Debug, Default)]
pub struct Pending {
    pub events: Vec<Event>,
    pub commands: Vec<String>,
}

impl Pending {
    pub fn new() -> Self {
        Self::default()
    }

    fn event(&mut self, event: impl Into<Event>) {
        self.events.push(event.into());
    }

    fn game_events(&mut self, events: Vec<GameEvent>) {
        self.events.extend(events.into_iter().map(Event::Game));
    }

    fn command(&mut self, command: impl Into<String>) {
        self.commands.push(command.into());
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty() && self.commands.is_empty()
    }
}

/// 登录后总是打开的接口变量
const LOGIN_IVARS: [Ivar; 5] = [
    Ivar::GameInfo,
    Ivar::ShowOwnSeek,
    Ivar::PendInfo,
    Ivar::MoveCase,
    Ivar::Lock,
];

/// 与服务器的一次会话
pub struct Session {
    classifier: Classifier,
    store: GameStore,
    seeks: SeekTable,
    /// 已知的接口变量状态
    ivars: HashMap<Ivar, bool>,
}

impl Session {
    pub fn new(config: &ClientConfig) -> Self {
        Self::with_variants(config, VariantTable::fics())
    }

    pub fn with_variants(config: &ClientConfig, variants: VariantTable) -> Self {
        // 对局信息与提议列表依赖 gameinfo、pendinfo
        let mut ivars: HashMap<Ivar, bool> =
            LOGIN_IVARS.iter().map(|ivar| (*ivar, true)).collect();
        ivars.insert(Ivar::SeekInfo, config.seek_info);
        Self {
            classifier: Classifier::new(variants),
            store: GameStore::new(),
            seeks: SeekTable::new(),
            ivars,
        }
    }

    pub fn store(&self) -> &GameStore {
        &self.store
    }

    pub fn seeks(&self) -> &SeekTable {
        &self.seeks
    }

    pub fn ivar(&self, ivar: Ivar) -> bool {
        self.ivars.get(&ivar).copied().unwrap_or(false)
    }

    /// 登录后需要设置的接口变量
    pub fn login_commands(&self) -> Vec<String> {
        let mut ivars: Vec<_> = self.ivars.iter().collect();
        ivars.sort_by_key(|(ivar, _)| ivar.name());
        ivars
            .into_iter()
            .map(|(ivar, on)| format!("iset {} {}", ivar, u8::from(*on)))
            .collect()
    }

    // ========================================================================
    // 服务器记录
    // ========================================================================

    /// 处理一条服务器记录
    pub fn handle(&mut self, record: ServerRecord) -> Result<Pending> {
        let mut pending = Pending::new();

        match record {
            ServerRecord::Style12(snapshot) => self.handle_snapshot(snapshot, &mut pending),
            ServerRecord::Delta(delta) => {
                if self.store.is_unsupported(delta.game_id) {
                    return Ok(pending);
                }
                let snapshot = normalize(self.store.lookup(delta.game_id)?, &delta)?;
                self.handle_snapshot(snapshot, &mut pending);
            }
            ServerRecord::GameInfo(info) => self.store.stash_info(info),
            ServerRecord::OfferMade(offer) => {
                pending.game_events(offers::offer_made(&mut self.store, &offer))
            }
            ServerRecord::OfferRemoved(index) => {
                pending.game_events(offers::offer_removed(&mut self.store, index))
            }
            ServerRecord::PlayerOffered {
                game_id,
                player,
                kind,
            } => pending.game_events(offers::player_offered(&mut self.store, game_id, &player, kind)),
            ServerRecord::PlayerDeclined {
                game_id,
                player,
                kind,
            } => pending.game_events(offers::player_declined(&mut self.store, game_id, &player, kind)),
            ServerRecord::PlayerWithdrew {
                game_id,
                player,
                kind,
            } => pending.game_events(offers::player_withdrew(&mut self.store, game_id, &player, kind)),
            ServerRecord::PlayerOfferedTakeback {
                game_id,
                player,
                plies,
            } => pending.game_events(offers::player_offered_takeback(
                &mut self.store,
                game_id,
                &player,
                plies,
            )),
            ServerRecord::PlayerCounteredTakeback {
                game_id,
                player,
                plies,
            } => pending.game_events(offers::player_countered_takeback(
                &mut self.store,
                game_id,
                &player,
                plies,
            )),
            ServerRecord::IllegalMove { move_text, reason } => {
                if let Some(event) = correlator::reject(&mut self.store, move_text.as_deref(), reason) {
                    pending.event(event);
                }
            }
            ServerRecord::GameEnd(end) => {
                tracing::info!(
                    "对局结束: {} {} vs {} ({})",
                    end.game_id,
                    end.white_name,
                    end.black_name,
                    end.reason
                );
                self.close_game(end.game_id, end.outcome, &mut pending);
            }
            ServerRecord::StoppedObserving(id) | ServerRecord::StoppedExamining(id) => {
                self.close_game(id, GameOutcome::Unknown, &mut pending)
            }
            ServerRecord::IvarChanged { ivar, on } => {
                self.ivars.insert(ivar, on);
                pending.event(Event::Connection(ConnectionEvent::IvarChanged { ivar, on }));
                if ivar == Ivar::SeekInfo && !on {
                    self.clear_seeks(&mut pending);
                }
            }
            ServerRecord::BoardSetup(on) => match self.store.find_my_game() {
                Some(id) => {
                    if let Ok(record) = self.store.lookup_mut(id) {
                        tracing::debug!("对局 {}: 摆棋模式 {}", id, on);
                        record.set_board_setup(on);
                    }
                }
                None => tracing::debug!("没有用户的对局，忽略摆棋模式通知"),
            },
            ServerRecord::PrimaryGameChanged(id) => self.store.set_primary(id),
            ServerRecord::SimulBoardChanged(id) => self.store.set_primary_played(id),
            ServerRecord::SeekAdded(info) => {
                // 关闭 seekinfo 之后服务器可能仍会发来求战
                if self.ivar(Ivar::SeekInfo) {
                    for event in self.seeks.add(info, self.classifier.variants()) {
                        pending.event(event);
                    }
                }
            }
            ServerRecord::SeeksRemoved(indices) => {
                for event in self.seeks.remove(&indices) {
                    pending.event(event);
                }
            }
            ServerRecord::SeeksCleared => self.clear_seeks(&mut pending),
            ServerRecord::Chat(message) => pending.event(Event::Chat(ChatEvent::Tell(message))),
            ServerRecord::FriendArrived(name) => {
                pending.event(Event::Friends(FriendsEvent::Online(name)))
            }
            ServerRecord::FriendDeparted(name) => {
                pending.event(Event::Friends(FriendsEvent::Offline(name)))
            }
            ServerRecord::PlainText(text) => pending.event(Event::Chat(ChatEvent::PlainText(text))),
        }

        Ok(pending)
    }

    fn handle_snapshot(&mut self, snapshot: BoardSnapshot, pending: &mut Pending) {
        let id = snapshot.game_id;
        let mut events = Vec::new();
        let classification = self.classifier.classify(&mut self.store, snapshot, &mut events);
        pending.events.extend(events);

        match classification {
            Classification::Unsupported { category, .. } => warn_unsupported(&category, pending),
            Classification::Started => {
                // 对局期间服务器不发送求战的移除通知，只能全部清除，对局结束后重新获取
                let mine = self
                    .store
                    .lookup(id)
                    .is_ok_and(|record| record.game().game_type == GameType::MyGame);
                if mine {
                    self.clear_seeks(pending);
                }
            }
            Classification::MoveMade(mv) => {
                if let Ok(record) = self.store.lookup_mut(id) {
                    correlator::echo(record, &mv);
                }
            }
            Classification::Ignored
            | Classification::Takeback(_)
            | Classification::PositionChanged
            | Classification::Unchanged => {}
        }
    }

    fn close_game(&mut self, id: GameId, outcome: GameOutcome, pending: &mut Pending) {
        match self.store.destroy(id, outcome) {
            Ok(destroyed) => {
                pending.event(GameEvent::End {
                    game: destroyed.game,
                    outcome,
                });
                if destroyed.was_my_game && self.ivar(Ivar::SeekInfo) {
                    pending.command(format!("iset {} 1", Ivar::SeekInfo));
                }
            }
            Err(_) => tracing::debug!("对局 {} 不存在，忽略结束通知", id),
        }
    }

    fn clear_seeks(&mut self, pending: &mut Pending) {
        for event in self.seeks.clear() {
            pending.event(event);
        }
    }

    /// 关闭会话：以未知结果结束所有对局
    pub fn close(&mut self) -> Pending {
        let mut pending = Pending::new();
        for id in self.store.ids() {
            if let Ok(destroyed) = self.store.destroy(id, GameOutcome::Unknown) {
                pending.event(GameEvent::End {
                    game: destroyed.game,
                    outcome: GameOutcome::Unknown,
                });
            }
        }
        self.seeks.clear();
        pending
    }

    // ========================================================================
    // 用户操作
    // ========================================================================

    /// 走棋：把走法加入未确认队列，返回要发送的命令
    pub fn make_move(&mut self, id: GameId, mv: Move) -> Result<String> {
        let record = self.store.lookup_mut(id)?;
        let command = mv.canonical();
        tracing::debug!("对局 {}: 发送走法 {}", id, command);
        record.enqueue_unechoed(mv);
        Ok(command)
    }

    /// 按文本走棋（规范字符串或坐标记法），以当前局面校验
    pub fn make_move_text(&mut self, id: GameId, text: &str) -> Result<String> {
        let record = self.store.lookup(id)?;
        let position = Position::from_snapshot(record.last_snapshot());
        let mv = position.parse_move(text)?;
        self.make_move(id, mv)
    }

    pub fn resign(&self, id: GameId) -> Result<String> {
        self.played(id)?;
        Ok("resign".to_string())
    }

    pub fn request_draw(&self, id: GameId) -> Result<String> {
        self.played(id)?;
        Ok("draw".to_string())
    }

    pub fn request_abort(&self, id: GameId) -> Result<String> {
        self.played(id)?;
        Ok("abort".to_string())
    }

    pub fn request_adjourn(&self, id: GameId) -> Result<String> {
        self.played(id)?;
        Ok("adjourn".to_string())
    }

    pub fn request_takeback(&self, id: GameId, plies: u32) -> Result<String> {
        self.played(id)?;
        positive(plies)?;
        Ok(format!("takeback {}", plies))
    }

    pub fn go_backward(&self, id: GameId, plies: u32) -> Result<String> {
        self.examined(id)?;
        positive(plies)?;
        Ok(format!("backward {}", plies))
    }

    pub fn go_forward(&self, id: GameId, plies: u32) -> Result<String> {
        self.examined(id)?;
        positive(plies)?;
        Ok(format!("forward {}", plies))
    }

    pub fn go_to_beginning(&self, id: GameId) -> Result<String> {
        self.examined(id)?;
        Ok("backward 999".to_string())
    }

    pub fn go_to_end(&self, id: GameId) -> Result<String> {
        self.examined(id)?;
        Ok("forward 999".to_string())
    }

    /// 离开对局；孤立棋盘不需要命令
    pub fn quit_game(&self, id: GameId) -> Result<Option<String>> {
        let game = self.store.lookup(id)?.game();
        Ok(match game.game_type {
            GameType::MyGame if game.played => Some("resign".to_string()),
            GameType::MyGame => Some("unexamine".to_string()),
            GameType::Observed => Some(format!("unobserve {}", id)),
            GameType::Isolated => None,
        })
    }

    /// 接受求战
    pub fn accept_seek(&self, index: SeekIndex) -> Result<String> {
        let seek = self.seeks.get(index).ok_or(SyncError::NoSuchSeek(index))?;
        Ok(format!("play {}", seek.index()))
    }

    fn played(&self, id: GameId) -> Result<&GameRecord> {
        let record = self.store.lookup(id)?;
        if record.game().is_my_played_game() {
            Ok(record)
        } else {
            Err(SyncError::NotPlayedGame(id))
        }
    }

    fn examined(&self, id: GameId) -> Result<&GameRecord> {
        let record = self.store.lookup(id)?;
        if record.game().is_my_examined_game() {
            Ok(record)
        } else {
            Err(SyncError::NotExaminedGame(id))
        }
    }
}

fn positive(plies: u32) -> Result<()> {
    if plies == 0 {
        return Err(SyncError::InvalidPlyCount(plies));
    }
    Ok(())
}

/// 以星号边框的文本块提示用户
fn warn_unsupported(category: &str, pending: &mut Pending) {
    let lines = [
        format!("The game category \"{}\" is not supported.", category),
        "Boards of this game will not be displayed.".to_string(),
    ];
    let width = lines.iter().map(|line| line.chars().count()).max().unwrap_or(0);
    let border = "*".repeat(width + 4);

    pending.event(Event::Chat(ChatEvent::PlainText(border.clone())));
    for line in &lines {
        pending.event(Event::Chat(ChatEvent::PlainText(format!(
            "* {:<width$} *",
            line,
            width = width
        ))));
    }
    pending.event(Event::Chat(ChatEvent::PlainText(border)));
}
