//! 对局对象
//!
//! 事件中携带 `Arc<Game>`，即事件发出时对局状态的快照；存储层通过
//! `Arc::make_mut` 修改自己持有的那一份。

use chrono::{DateTime, Utc};
use protocol::{BoardSnapshot, GameId, GameInfo, GameOutcome, GameType, Rating, Side};
use serde::{Deserialize, Serialize};

use crate::rules::{Position, Variant};

/// 单方的时间设置
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Clock {
    /// 初始时间（毫秒）
    pub initial_ms: u64,
    /// 每步加秒（毫秒）
    pub increment_ms: u64,
}

/// 时间控制
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TimeControl {
    /// 双方相同
    Fischer(Clock),
    /// 让时
    Odds { white: Clock, black: Clock },
}

impl TimeControl {
    /// 由双方的初始时间与加秒（均为秒）构造
    pub fn from_secs(
        white_initial: u32,
        white_increment: u32,
        black_initial: u32,
        black_increment: u32,
    ) -> Self {
        let white = Clock {
            initial_ms: u64::from(white_initial) * 1000,
            increment_ms: u64::from(white_increment) * 1000,
        };
        let black = Clock {
            initial_ms: u64::from(black_initial) * 1000,
            increment_ms: u64::from(black_increment) * 1000,
        };
        if white == black {
            TimeControl::Fischer(white)
        } else {
            TimeControl::Odds { white, black }
        }
    }

    pub fn clock(&self, side: Side) -> Clock {
        match (self, side) {
            (TimeControl::Fischer(clock), _) => *clock,
            (TimeControl::Odds { white, .. }, Side::White) => *white,
            (TimeControl::Odds { black, .. }, Side::Black) => *black,
        }
    }
}

/// 对局
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Game {
    pub id: GameId,
    pub game_type: GameType,
    pub variant: Variant,
    /// 对局类别名，例如 `blitz`
    pub category: String,
    /// 对局开始（或最近一次局面被重置）时的局面
    pub initial_position: Position,
    /// `initial_position` 之前已走的半回合数
    pub plies_since_start: u32,
    pub white_name: String,
    pub black_name: String,
    pub time_control: TimeControl,
    pub white_rating: Option<Rating>,
    pub black_rating: Option<Rating>,
    pub rated: bool,
    /// 正在进行（而非研究中）的对局
    pub played: bool,
    pub initially_flipped: bool,
    /// 用户执的一方，仅对用户自己在下的对局有效
    pub user_side: Option<Side>,
    pub outcome: Option<GameOutcome>,
    pub started_at: DateTime<Utc>,
    pub ended_at: Option<DateTime<Utc>>,
}

impl Game {
    /// 由对局信息与第一个快照创建
    pub fn new(info: &GameInfo, snapshot: &BoardSnapshot, variant: Variant) -> Self {
        let game_type = snapshot.relation.game_type();
        let played = snapshot.relation.is_played();
        let user_side = if game_type == GameType::MyGame && played {
            if snapshot.relation.is_my_turn() {
                Some(snapshot.side_to_move)
            } else {
                Some(snapshot.side_to_move.opponent())
            }
        } else {
            None
        };

        Self {
            id: snapshot.game_id,
            game_type,
            variant,
            category: info.category.clone(),
            initial_position: Position::from_snapshot(snapshot),
            plies_since_start: snapshot.played_plies(),
            white_name: snapshot.white_name.clone(),
            black_name: snapshot.black_name.clone(),
            time_control: TimeControl::from_secs(
                info.white_initial_secs,
                info.white_increment_secs,
                info.black_initial_secs,
                info.black_increment_secs,
            ),
            white_rating: info.white_rating,
            black_rating: info.black_rating,
            rated: info.rated,
            played,
            initially_flipped: snapshot.flipped,
            user_side,
            outcome: None,
            started_at: Utc::now(),
            ended_at: None,
        }
    }

    pub fn player_name(&self, side: Side) -> &str {
        match side {
            Side::White => &self.white_name,
            Side::Black => &self.black_name,
        }
    }

    /// 按名字查找玩家（不区分大小写）
    pub fn player_named(&self, name: &str) -> Option<Side> {
        if self.white_name.eq_ignore_ascii_case(name) {
            Some(Side::White)
        } else if self.black_name.eq_ignore_ascii_case(name) {
            Some(Side::Black)
        } else {
            None
        }
    }

    /// 用户自己正在下的对局
    pub fn is_my_played_game(&self) -> bool {
        self.game_type == GameType::MyGame && self.played
    }

    /// 用户自己正在研究的对局
    pub fn is_my_examined_game(&self) -> bool {
        self.game_type == GameType::MyGame && !self.played
    }
}
