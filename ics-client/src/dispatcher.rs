//! 事件分发
//!
//! 监听器按类别注册，事件只分发给所属类别的监听器，按注册顺序调用。
//! 单个监听器返回的错误会被记录，不影响其余监听器，也不会传给调用方。
//! 求战、好友与对局列表类别只有在会话支持对应能力时才能注册。

use std::sync::Arc;

use protocol::{ChatMessage, GameOutcome, IllegalMoveReason, Ivar, OfferKind, Side};

use crate::config::Capabilities;
use crate::error::{RegistrationError, SyncError};
use crate::events::{
    Category, ChatEvent, ConnectionEvent, Event, FriendsEvent, GameEvent, GameListEvent, SeekEvent,
};
use crate::game::Game;
use crate::rules::{Move, Position};
use crate::seek::Seek;

/// 监听器回调的结果
pub type ListenerResult = anyhow::Result<()>;

// ============================================================================
// 监听器
// ============================================================================

/// 连接监听器
pub trait ConnectionListener: Send {
    fn connection_established(&mut self) -> ListenerResult {
        Ok(())
    }

    fn connection_lost(&mut self) -> ListenerResult {
        Ok(())
    }

    fn ivar_changed(&mut self, _ivar: Ivar, _on: bool) -> ListenerResult {
        Ok(())
    }
}

/// 聊天监听器
pub trait ChatListener: Send {
    fn tell(&mut self, _message: &ChatMessage) -> ListenerResult {
        Ok(())
    }

    fn plain_text(&mut self, _text: &str) -> ListenerResult {
        Ok(())
    }
}

/// 对局监听器，每种对局事件对应一个方法
pub trait GameListener: Send {
    fn game_start(&mut self, _game: &Arc<Game>) -> ListenerResult {
        Ok(())
    }

    fn move_made(&mut self, _game: &Arc<Game>, _mv: &Move, _is_new: bool) -> ListenerResult {
        Ok(())
    }

    fn position_changed(&mut self, _game: &Arc<Game>, _position: &Position) -> ListenerResult {
        Ok(())
    }

    fn takeback(&mut self, _game: &Arc<Game>, _plies: u32) -> ListenerResult {
        Ok(())
    }

    fn illegal_move_attempted(
        &mut self,
        _game: &Arc<Game>,
        _mv: &Move,
        _reason: IllegalMoveReason,
    ) -> ListenerResult {
        Ok(())
    }

    fn clock_adjusted(
        &mut self,
        _game: &Arc<Game>,
        _side: Side,
        _time_ms: i64,
        _running: bool,
    ) -> ListenerResult {
        Ok(())
    }

    fn board_flipped(&mut self, _game: &Arc<Game>, _flipped: bool) -> ListenerResult {
        Ok(())
    }

    fn offer_updated(
        &mut self,
        _game: &Arc<Game>,
        _kind: OfferKind,
        _player: Side,
        _on: bool,
        _plies: u32,
    ) -> ListenerResult {
        Ok(())
    }

    fn game_end(&mut self, _game: &Arc<Game>, _outcome: GameOutcome) -> ListenerResult {
        Ok(())
    }
}

/// 求战监听器
pub trait SeekListener: Send {
    fn seek_added(&mut self, _seek: &Seek) -> ListenerResult {
        Ok(())
    }

    fn seek_removed(&mut self, _seek: &Seek) -> ListenerResult {
        Ok(())
    }
}

/// 好友监听器
pub trait FriendsListener: Send {
    fn friend_online(&mut self, _name: &str) -> ListenerResult {
        Ok(())
    }

    fn friend_offline(&mut self, _name: &str) -> ListenerResult {
        Ok(())
    }
}

/// 对局列表监听器
pub trait GameListListener: Send {
    fn game_list_arrived(&mut self, _list: &GameListEvent) -> ListenerResult {
        Ok(())
    }
}

// ============================================================================
// 分发
// ============================================================================

/// 监听器句柄，用于移除监听器
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

/// 一次监听器失败
#[derive(Debug)]
pub struct ListenerFault {
    pub listener: ListenerId,
    pub category: Category,
    pub error: anyhow::Error,
}

type Slots<L> = Vec<(ListenerId, Box<L>)>;

/// 监听器管理器
pub struct ListenerManager {
    capabilities: Capabilities,
    next_id: u64,
    connection: Slots<dyn ConnectionListener>,
    chat: Slots<dyn ChatListener>,
    game: Slots<dyn GameListener>,
    seek: Slots<dyn SeekListener>,
    friends: Slots<dyn FriendsListener>,
    game_list: Slots<dyn GameListListener>,
    faults: Vec<ListenerFault>,
    /// 同步引擎报告的失败（例如某个对局失去同步）
    engine_faults: Vec<SyncError>,
}

impl ListenerManager {
    pub fn new(capabilities: Capabilities) -> Self {
        Self {
            capabilities,
            next_id: 0,
            connection: Vec::new(),
            chat: Vec::new(),
            game: Vec::new(),
            seek: Vec::new(),
            friends: Vec::new(),
            game_list: Vec::new(),
            faults: Vec::new(),
            engine_faults: Vec::new(),
        }
    }

    pub fn capabilities(&self) -> Capabilities {
        self.capabilities
    }

    fn allocate_id(&mut self) -> ListenerId {
        self.next_id += 1;
        ListenerId(self.next_id)
    }

    // === 注册 ===

    pub fn add_connection_listener(&mut self, listener: impl ConnectionListener + 'static) -> ListenerId {
        let id = self.allocate_id();
        self.connection.push((id, Box::new(listener)));
        id
    }

    pub fn add_chat_listener(&mut self, listener: impl ChatListener + 'static) -> ListenerId {
        let id = self.allocate_id();
        self.chat.push((id, Box::new(listener)));
        id
    }

    pub fn add_game_listener(&mut self, listener: impl GameListener + 'static) -> ListenerId {
        let id = self.allocate_id();
        self.game.push((id, Box::new(listener)));
        id
    }

    pub fn add_seek_listener(
        &mut self,
        listener: impl SeekListener + 'static,
    ) -> Result<ListenerId, RegistrationError> {
        if !self.capabilities.seeks {
            return Err(RegistrationError::CapabilityUnsupported {
                category: Category::Seek.name(),
            });
        }
        let id = self.allocate_id();
        self.seek.push((id, Box::new(listener)));
        Ok(id)
    }

    pub fn add_friends_listener(
        &mut self,
        listener: impl FriendsListener + 'static,
    ) -> Result<ListenerId, RegistrationError> {
        if !self.capabilities.friends {
            return Err(RegistrationError::CapabilityUnsupported {
                category: Category::Friends.name(),
            });
        }
        let id = self.allocate_id();
        self.friends.push((id, Box::new(listener)));
        Ok(id)
    }

    pub fn add_game_list_listener(
        &mut self,
        listener: impl GameListListener + 'static,
    ) -> Result<ListenerId, RegistrationError> {
        if !self.capabilities.game_lists {
            return Err(RegistrationError::CapabilityUnsupported {
                category: Category::GameList.name(),
            });
        }
        let id = self.allocate_id();
        self.game_list.push((id, Box::new(listener)));
        Ok(id)
    }

    /// 移除监听器，返回是否找到
    pub fn remove_listener(&mut self, id: ListenerId) -> bool {
        fn remove<L: ?Sized>(slots: &mut Slots<L>, id: ListenerId) -> bool {
            let before = slots.len();
            slots.retain(|(slot, _)| *slot != id);
            slots.len() != before
        }

        remove(&mut self.connection, id)
            || remove(&mut self.chat, id)
            || remove(&mut self.game, id)
            || remove(&mut self.seek, id)
            || remove(&mut self.friends, id)
            || remove(&mut self.game_list, id)
    }

    pub fn listener_count(&self, category: Category) -> usize {
        match category {
            Category::Connection => self.connection.len(),
            Category::Chat => self.chat.len(),
            Category::Game => self.game.len(),
            Category::Seek => self.seek.len(),
            Category::Friends => self.friends.len(),
            Category::GameList => self.game_list.len(),
        }
    }

    // === 分发 ===

    /// 把事件分发给所属类别的监听器
    pub fn dispatch(&mut self, event: &Event) {
        let faults = &mut self.faults;
        match event {
            Event::Connection(event) => notify(&mut self.connection, Category::Connection, faults, |l| {
                match event {
                    ConnectionEvent::Established => l.connection_established(),
                    ConnectionEvent::Lost => l.connection_lost(),
                    ConnectionEvent::IvarChanged { ivar, on } => l.ivar_changed(*ivar, *on),
                }
            }),
            Event::Chat(event) => notify(&mut self.chat, Category::Chat, faults, |l| match event {
                ChatEvent::Tell(message) => l.tell(message),
                ChatEvent::PlainText(text) => l.plain_text(text),
            }),
            Event::Game(event) => notify(&mut self.game, Category::Game, faults, |l| {
                dispatch_game(l, event)
            }),
            Event::Seek(event) => notify(&mut self.seek, Category::Seek, faults, |l| match event {
                SeekEvent::Added(seek) => l.seek_added(seek),
                SeekEvent::Removed(seek) => l.seek_removed(seek),
            }),
            Event::Friends(event) => notify(&mut self.friends, Category::Friends, faults, |l| {
                match event {
                    FriendsEvent::Online(name) => l.friend_online(name),
                    FriendsEvent::Offline(name) => l.friend_offline(name),
                }
            }),
            Event::GameList(list) => notify(&mut self.game_list, Category::GameList, faults, |l| {
                l.game_list_arrived(list)
            }),
        }
    }

    /// 取出累计的监听器失败
    pub fn take_faults(&mut self) -> Vec<ListenerFault> {
        std::mem::take(&mut self.faults)
    }

    pub fn report_engine_fault(&mut self, error: SyncError) {
        self.engine_faults.push(error);
    }

    pub fn take_engine_faults(&mut self) -> Vec<SyncError> {
        std::mem::take(&mut self.engine_faults)
    }
}

fn dispatch_game(listener: &mut dyn GameListener, event: &GameEvent) -> ListenerResult {
    match event {
        GameEvent::Start { game } => listener.game_start(game),
        GameEvent::MoveMade { game, mv, is_new } => listener.move_made(game, mv, *is_new),
        GameEvent::PositionChanged { game, position } => listener.position_changed(game, position),
        GameEvent::Takeback { game, plies } => listener.takeback(game, *plies),
        GameEvent::IllegalMove { game, mv, reason } => {
            listener.illegal_move_attempted(game, mv, *reason)
        }
        GameEvent::ClockAdjustment {
            game,
            side,
            time_ms,
            running,
        } => listener.clock_adjusted(game, *side, *time_ms, *running),
        GameEvent::BoardFlip { game, flipped } => listener.board_flipped(game, *flipped),
        GameEvent::OfferUpdated {
            game,
            kind,
            player,
            on,
            plies,
        } => listener.offer_updated(game, *kind, *player, *on, *plies),
        GameEvent::End { game, outcome } => listener.game_end(game, *outcome),
    }
}

fn notify<L: ?Sized>(
    slots: &mut Slots<L>,
    category: Category,
    faults: &mut Vec<ListenerFault>,
    mut call: impl FnMut(&mut L) -> ListenerResult,
) {
    for (id, listener) in slots.iter_mut() {
        if let Err(error) = call(listener.as_mut()) {
            tracing::warn!("监听器 {:?} 处理{}事件失败: {:#}", id, category.name(), error);
            faults.push(ListenerFault {
                listener: *id,
                category,
                error,
            });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    /// 记录收到的回调
    #[derive(Clone, Default)]
    struct Recorder {
        name: &'static str,
        log: Arc<Mutex<Vec<String>>>,
    }

    impl Recorder {
        fn push(&self, entry: &str) {
            self.log.lock().unwrap().push(format!("{}:{}", self.name, entry));
        }
    }

    impl ChatListener for Recorder {
        fn plain_text(&mut self, text: &str) -> ListenerResult {
            self.push(text);
            Ok(())
        }
    }

    impl ConnectionListener for Recorder {
        fn connection_lost(&mut self) -> ListenerResult {
            self.push("lost");
            Ok(())
        }
    }

    impl SeekListener for Recorder {}

    impl GameListListener for Recorder {
        fn game_list_arrived(&mut self, list: &GameListEvent) -> ListenerResult {
            self.push(&list.title);
            Ok(())
        }
    }

    struct Failing;

    impl ChatListener for Failing {
        fn plain_text(&mut self, _text: &str) -> ListenerResult {
            anyhow::bail!("listener broke")
        }
    }

    fn text(line: &str) -> Event {
        Event::Chat(ChatEvent::PlainText(line.to_string()))
    }

    #[test]
    fn test_registration_order() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let mut manager = ListenerManager::new(Capabilities::default());
        manager.add_chat_listener(Recorder { name: "a", log: log.clone() });
        manager.add_chat_listener(Recorder { name: "b", log: log.clone() });

        manager.dispatch(&text("hello"));
        assert_eq!(*log.lock().unwrap(), vec!["a:hello", "b:hello"]);
    }

    #[test]
    fn test_fault_isolation() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let mut manager = ListenerManager::new(Capabilities::default());
        let failing = manager.add_chat_listener(Failing);
        manager.add_chat_listener(Recorder { name: "b", log: log.clone() });

        manager.dispatch(&text("hello"));
        assert_eq!(*log.lock().unwrap(), vec!["b:hello"]);

        let faults = manager.take_faults();
        assert_eq!(faults.len(), 1);
        assert_eq!(faults[0].listener, failing);
        assert_eq!(faults[0].category, Category::Chat);
        assert_eq!(faults[0].error.to_string(), "listener broke");
        assert!(manager.take_faults().is_empty());
    }

    #[test]
    fn test_only_matching_category() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let mut manager = ListenerManager::new(Capabilities::default());
        manager.add_connection_listener(Recorder { name: "conn", log: log.clone() });
        manager.add_chat_listener(Recorder { name: "chat", log: log.clone() });

        manager.dispatch(&Event::Connection(ConnectionEvent::Lost));
        assert_eq!(*log.lock().unwrap(), vec!["conn:lost"]);
    }

    #[test]
    fn test_capability_gated_registration() {
        let mut manager = ListenerManager::new(Capabilities {
            seeks: false,
            ..Capabilities::default()
        });
        let err = manager.add_seek_listener(Recorder::default()).unwrap_err();
        assert_eq!(
            err,
            RegistrationError::CapabilityUnsupported { category: "seek" }
        );
        assert_eq!(manager.listener_count(Category::Seek), 0);
    }

    #[test]
    fn test_game_list_requires_capability() {
        let mut manager = ListenerManager::new(Capabilities::default());
        let err = manager.add_game_list_listener(Recorder::default()).unwrap_err();
        assert_eq!(
            err,
            RegistrationError::CapabilityUnsupported { category: "game-list" }
        );
        assert_eq!(manager.listener_count(Category::GameList), 0);

        let log = Arc::new(Mutex::new(Vec::new()));
        let mut manager = ListenerManager::new(Capabilities {
            game_lists: true,
            ..Capabilities::default()
        });
        let id = manager
            .add_game_list_listener(Recorder { name: "list", log: log.clone() })
            .unwrap();
        manager.dispatch(&Event::GameList(GameListEvent {
            title: "History for Newton".to_string(),
            items: Vec::new(),
        }));
        assert_eq!(*log.lock().unwrap(), vec!["list:History for Newton"]);
        assert!(manager.remove_listener(id));
        assert_eq!(manager.listener_count(Category::GameList), 0);
    }

    #[test]
    fn test_remove_listener() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let mut manager = ListenerManager::new(Capabilities::default());
        let id = manager.add_chat_listener(Recorder { name: "a", log: log.clone() });
        let seek = manager.add_seek_listener(Recorder::default()).unwrap();

        assert!(manager.remove_listener(id));
        assert!(!manager.remove_listener(id));
        assert!(manager.remove_listener(seek));

        manager.dispatch(&text("hello"));
        assert!(log.lock().unwrap().is_empty());
    }
}
