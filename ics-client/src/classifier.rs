//! 快照分类器
//!
//! 服务器不会说明一个快照代表“走了一步”“悔棋”还是“局面被重置”，只能与
//! 上一个快照比较已走半回合数和棋盘来推断。判断不确定时总是退回到信息
//! 更少、更安全的“局面变化”。

use protocol::{BoardSnapshot, GameId, GameInfo, GameType, Side};

use crate::events::{Event, GameEvent};
use crate::game::{Game, TimeControl};
use crate::rules::{replay, Move, Position, VariantTable};
use crate::store::{GameRecord, GameStore};

/// 分类结果
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Classification {
    /// 对局类别不受支持，对局被标记为忽略
    Unsupported { game_id: GameId, category: String },
    /// 已标记为不受支持的对局的快照
    Ignored,
    Started,
    MoveMade(Move),
    Takeback(u32),
    PositionChanged,
    /// 棋盘没有变化（刷新、非法走法后重发、改名等）
    Unchanged,
}

/// 快照分类器，持有类别到规则集的映射表
#[derive(Debug, Clone, Default)]
pub struct Classifier {
    variants: VariantTable,
}

impl Classifier {
    pub fn new(variants: VariantTable) -> Self {
        Self { variants }
    }

    pub fn variants(&self) -> &VariantTable {
        &self.variants
    }

    /// 分类一个快照，把产生的事件追加到 `events`
    pub fn classify(
        &self,
        store: &mut GameStore,
        snapshot: BoardSnapshot,
        events: &mut Vec<Event>,
    ) -> Classification {
        let id = snapshot.game_id;

        if let Some(info) = store.take_info(id) {
            return self.start(store, info, snapshot, events);
        }

        if !store.contains(id) {
            if store.is_unsupported(id) {
                tracing::trace!("忽略不受支持的对局 {} 的快照", id);
                return Classification::Ignored;
            }
            // 恢复研究或刷新棋盘时服务器不发送对局信息
            tracing::debug!("对局 {} 没有对局信息，使用快照中的时间设置", id);
            let info = GameInfo::placeholder(&snapshot);
            return self.start(store, info, snapshot, events);
        }

        let Ok(record) = store.lookup_mut(id) else {
            return Classification::Ignored;
        };
        let classification = update(record, &snapshot, events);
        reconcile(record, snapshot, events);
        classification
    }

    fn start(
        &self,
        store: &mut GameStore,
        info: GameInfo,
        snapshot: BoardSnapshot,
        events: &mut Vec<Event>,
    ) -> Classification {
        let id = snapshot.game_id;
        let Some(variant) = self.variants.lookup(&info.category) else {
            tracing::warn!("对局 {} 的类别不受支持: {}", id, info.category);
            store.mark_unsupported(id);
            return Classification::Unsupported {
                game_id: id,
                category: info.category,
            };
        };

        let game = Game::new(&info, &snapshot, variant);
        tracing::info!(
            "对局开始: {} {} vs {} ({}, {:?})",
            id,
            game.white_name,
            game.black_name,
            game.category,
            game.game_type
        );

        let record = store.create(game, snapshot.clone());
        events.push(
            GameEvent::Start {
                game: record.game().clone(),
            }
            .into(),
        );
        reconcile(record, snapshot, events);
        Classification::Started
    }
}

fn update(record: &mut GameRecord, snapshot: &BoardSnapshot, events: &mut Vec<Event>) -> Classification {
    let old_plies = i64::from(record.last_snapshot().played_plies());
    let ply_diff = i64::from(snapshot.played_plies()) - old_plies;

    match ply_diff {
        diff if diff < 0 => try_takeback(record, snapshot, diff.unsigned_abs() as u32, events),
        0 if record.last_snapshot().board == snapshot.board => Classification::Unchanged,
        0 => change_position(record, snapshot, events),
        1 => match snapshot.move_verbose.as_deref() {
            Some(text) => make_move(record, snapshot, text, events),
            None => change_position(record, snapshot, events),
        },
        // 例如 forward 2
        _ => change_position(record, snapshot, events),
    }
}

fn make_move(
    record: &mut GameRecord,
    snapshot: &BoardSnapshot,
    text: &str,
    events: &mut Vec<Event>,
) -> Classification {
    let before = Position::from_snapshot(record.last_snapshot());
    let decoded = before.parse_verbose(text).and_then(|mv| {
        let after = before.apply(&mv)?;
        Ok((mv, after))
    });

    match decoded {
        Ok((mv, after)) if after.same_placement(&Position::from_snapshot(snapshot)) => {
            let mv = mv.with_san(snapshot.move_san.clone());
            tracing::debug!("对局 {}: 走法 {}", record.id(), mv);
            events.push(
                GameEvent::MoveMade {
                    game: record.game().clone(),
                    mv: mv.clone(),
                    is_new: true,
                }
                .into(),
            );
            record.append_move(mv.clone());
            Classification::MoveMade(mv)
        }
        Ok(_) => {
            tracing::debug!("对局 {}: 走法 {} 与新棋盘不符", record.id(), text);
            change_position(record, snapshot, events)
        }
        Err(e) => {
            tracing::debug!("对局 {}: 无法解析走法 {}: {}", record.id(), text, e);
            change_position(record, snapshot, events)
        }
    }
}

fn try_takeback(
    record: &mut GameRecord,
    snapshot: &BoardSnapshot,
    plies: u32,
    events: &mut Vec<Event>,
) -> Classification {
    let count = plies as usize;
    if record.moves().len() < count || record.board_setup() {
        return change_position(record, snapshot, events);
    }

    // 也可能是走了几步之后用 bsetup fen 重置了局面
    let kept = &record.moves()[..record.moves().len() - count];
    match replay(&record.game().initial_position, kept) {
        Ok(position) if position.same_placement(&Position::from_snapshot(snapshot)) => {
            tracing::debug!("对局 {}: 悔棋 {} 步", record.id(), plies);
            events.push(
                GameEvent::Takeback {
                    game: record.game().clone(),
                    plies,
                }
                .into(),
            );
            record.truncate_moves(count);
            Classification::Takeback(plies)
        }
        _ => change_position(record, snapshot, events),
    }
}

fn change_position(
    record: &mut GameRecord,
    snapshot: &BoardSnapshot,
    events: &mut Vec<Event>,
) -> Classification {
    let position = Position::from_snapshot(snapshot);
    tracing::debug!("对局 {}: 局面变化", record.id());
    record.replace_initial_position(position.clone(), snapshot.played_plies());
    events.push(
        GameEvent::PositionChanged {
            game: record.game().clone(),
            position,
        }
        .into(),
    );

    // 摆棋模式下的走法以局面变化的形式回显
    if record.board_setup() {
        if let Some(mv) = record.pop_unechoed() {
            tracing::debug!("对局 {}: 摆棋模式下的走法 {} 已回显", record.id(), mv);
        }
    }
    Classification::PositionChanged
}

/// 时钟、翻转、玩家名字与时间控制
fn reconcile(record: &mut GameRecord, snapshot: BoardSnapshot, events: &mut Vec<Event>) {
    let game = record.game().clone();
    let isolated = game.game_type == GameType::Isolated;
    for side in [Side::White, Side::Black] {
        events.push(
            GameEvent::ClockAdjustment {
                game: game.clone(),
                side,
                time_ms: snapshot.time_ms(side),
                running: !isolated && snapshot.clock_running && snapshot.side_to_move == side,
            }
            .into(),
        );
    }

    if record.last_snapshot().flipped != snapshot.flipped {
        events.push(
            GameEvent::BoardFlip {
                game,
                flipped: snapshot.flipped,
            }
            .into(),
        );
    }

    let game = record.game_mut();
    game.white_name.clone_from(&snapshot.white_name);
    game.black_name.clone_from(&snapshot.black_name);
    game.time_control = TimeControl::from_secs(
        snapshot.initial_time_secs,
        snapshot.increment_secs,
        snapshot.initial_time_secs,
        snapshot.increment_secs,
    );
    record.set_last_snapshot(snapshot);
}
