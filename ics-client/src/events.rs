//! 事件定义
//!
//! 解码路径产生的所有语义事件。对局事件携带事件发出时的对局快照
//! (`Arc<Game>`)。

use std::sync::Arc;

use protocol::{ChatMessage, GameId, GameOutcome, IllegalMoveReason, Ivar, OfferKind, Rating, Side};

use crate::game::Game;
use crate::rules::{Move, Position};
use crate::seek::Seek;

/// 连接事件
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectionEvent {
    Established,
    Lost,
    /// 接口变量状态变化
    IvarChanged { ivar: Ivar, on: bool },
}

/// 聊天事件
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChatEvent {
    /// 私聊
    Tell(ChatMessage),
    /// 无法识别的服务器文本，以及给用户的提示
    PlainText(String),
}

/// 对局事件
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GameEvent {
    Start {
        game: Arc<Game>,
    },
    MoveMade {
        game: Arc<Game>,
        mv: Move,
        /// 新走的一步（而非回放历史）
        is_new: bool,
    },
    PositionChanged {
        game: Arc<Game>,
        position: Position,
    },
    Takeback {
        game: Arc<Game>,
        plies: u32,
    },
    /// 用户发出的走法被服务器拒绝
    IllegalMove {
        game: Arc<Game>,
        mv: Move,
        reason: IllegalMoveReason,
    },
    ClockAdjustment {
        game: Arc<Game>,
        side: Side,
        time_ms: i64,
        running: bool,
    },
    BoardFlip {
        game: Arc<Game>,
        flipped: bool,
    },
    /// 提议状态变化；`plies` 只对悔棋有意义
    OfferUpdated {
        game: Arc<Game>,
        kind: OfferKind,
        player: Side,
        on: bool,
        plies: u32,
    },
    End {
        game: Arc<Game>,
        outcome: GameOutcome,
    },
}

impl GameEvent {
    pub fn game(&self) -> &Arc<Game> {
        match self {
            GameEvent::Start { game }
            | GameEvent::MoveMade { game, .. }
            | GameEvent::PositionChanged { game, .. }
            | GameEvent::Takeback { game, .. }
            | GameEvent::IllegalMove { game, .. }
            | GameEvent::ClockAdjustment { game, .. }
            | GameEvent::BoardFlip { game, .. }
            | GameEvent::OfferUpdated { game, .. }
            | GameEvent::End { game, .. } => game,
        }
    }
}

/// 求战事件
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SeekEvent {
    Added(Seek),
    Removed(Seek),
}

/// 好友事件
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FriendsEvent {
    Online(String),
    Offline(String),
}

/// 对局列表中的一项
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GameListItem {
    pub game_id: GameId,
    pub white_name: String,
    pub black_name: String,
    pub white_rating: Option<Rating>,
    pub black_rating: Option<Rating>,
    pub rated: bool,
    pub category: String,
}

/// 服务器发来的一份对局列表（历史、存档、搜索结果等）
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GameListEvent {
    pub title: String,
    pub items: Vec<GameListItem>,
}

/// 事件
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    Connection(ConnectionEvent),
    Chat(ChatEvent),
    Game(GameEvent),
    Seek(SeekEvent),
    Friends(FriendsEvent),
    GameList(GameListEvent),
}

impl Event {
    /// 事件所属的监听器类别
    pub fn category(&self) -> Category {
        match self {
            Event::Connection(_) => Category::Connection,
            Event::Chat(_) => Category::Chat,
            Event::Game(_) => Category::Game,
            Event::Seek(_) => Category::Seek,
            Event::Friends(_) => Category::Friends,
            Event::GameList(_) => Category::GameList,
        }
    }
}

impl From<GameEvent> for Event {
    fn from(event: GameEvent) -> Self {
        Event::Game(event)
    }
}

impl From<SeekEvent> for Event {
    fn from(event: SeekEvent) -> Self {
        Event::Seek(event)
    }
}

/// 监听器类别
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Category {
    Connection,
    Chat,
    Game,
    Seek,
    Friends,
    GameList,
}

impl Category {
    pub fn name(&self) -> &'static str {
        match self {
            Category::Connection => "connection",
            Category::Chat => "chat",
            Category::Game => "game",
            Category::Seek => "seek",
            Category::Friends => "friends",
            Category::GameList => "game-list",
        }
    }
}
