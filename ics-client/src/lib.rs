//! 国际象棋服务器客户端同步引擎
//!
//! 把服务器发来的棋盘快照、增量棋盘、提议与通知同步为本地对局状态，
//! 并以类型化事件通知监听器。
//!
//! - 增量棋盘还原为完整快照 (normalizer)
//! - 快照分类为开局、走棋、悔棋、局面变化 (classifier)
//! - 对局状态存储 (store)
//! - 走法回显关联 (correlator)
//! - 提议状态机 (offers)
//! - 事件分发 (dispatcher)
//! - 会话与异步驱动 (session, driver)

pub mod classifier;
pub mod config;
pub mod correlator;
pub mod dispatcher;
pub mod driver;
pub mod error;
pub mod events;
pub mod game;
pub mod normalizer;
pub mod offers;
pub mod rules;
pub mod seek;
pub mod session;
pub mod store;

#[cfg(test)]
mod test_support;

pub use classifier::{Classification, Classifier};
pub use config::{Capabilities, ClientConfig, ConfigError};
pub use dispatcher::{
    ChatListener, ConnectionListener, FriendsListener, GameListListener, GameListener,
    ListenerFault, ListenerId, ListenerManager, ListenerResult, SeekListener,
};
pub use driver::{Action, ClientHandle, EventPump};
pub use error::{RegistrationError, Result, RulesError, SyncError};
pub use events::{
    Category, ChatEvent, ConnectionEvent, Event, FriendsEvent, GameEvent, GameListEvent,
    GameListItem, SeekEvent,
};
pub use game::{Clock, Game, TimeControl};
pub use rules::{Move, Position, Variant, VariantTable};
pub use seek::{Seek, SeekTable};
pub use session::{Pending, Session};
pub use store::{GameRecord, GameStore};
