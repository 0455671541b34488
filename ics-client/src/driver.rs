//! 异步驱动
//!
//! 一个 tokio 任务负责整条解码路径：读取服务器记录、交给会话处理、
//! 把产生的命令写回服务器、把事件通过通道交给 [`EventPump`]。
//! 用户操作经请求通道进入同一个任务执行，对局状态只会被这一条路径访问。

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use protocol::{CommandSink, GameId, ProtocolError, RecordSource, SeekIndex, ServerRecord};
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::config::ClientConfig;
use crate::dispatcher::ListenerManager;
use crate::error::{Result, SyncError};
use crate::events::{ConnectionEvent, Event};
use crate::session::{Pending, Session};

/// 请求通道容量
const REQUEST_CAPACITY: usize = 32;

/// 用户操作
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    /// 走棋，走法为规范字符串或坐标记法
    MakeMove { game: GameId, text: String },
    Resign(GameId),
    RequestDraw(GameId),
    RequestAbort(GameId),
    RequestAdjourn(GameId),
    RequestTakeback { game: GameId, plies: u32 },
    GoBackward { game: GameId, plies: u32 },
    GoForward { game: GameId, plies: u32 },
    GoToBeginning(GameId),
    GoToEnd(GameId),
    QuitGame(GameId),
    AcceptSeek(SeekIndex),
    /// 断开连接
    Disconnect,
}

struct Request {
    action: Action,
    reply: oneshot::Sender<Result<()>>,
}

/// 驱动任务交给事件泵的消息
enum Delivery {
    Event(Event),
    /// 同步失败，解码继续
    Fault(SyncError),
    /// 连接关闭，附带尽力产生的结束事件
    Closed(Vec<Event>),
}

// ============================================================================
// 句柄
// ============================================================================

/// 向驱动任务提交用户操作
#[derive(Clone)]
pub struct ClientHandle {
    requests: mpsc::Sender<Request>,
    closed: Arc<AtomicBool>,
}

impl ClientHandle {
    /// 执行一个操作，等待命令发出
    pub async fn perform(&self, action: Action) -> Result<()> {
        let (reply, response) = oneshot::channel();
        self.requests
            .send(Request { action, reply })
            .await
            .map_err(|_| ProtocolError::ConnectionClosed)?;
        response.await.map_err(|_| ProtocolError::ConnectionClosed)?
    }

    /// 主动断开连接，尚未投递的事件会被丢弃
    pub async fn disconnect(&self) {
        self.closed.store(true, Ordering::SeqCst);
        if self.perform(Action::Disconnect).await.is_err() {
            debug!("驱动任务已经结束");
        }
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }
}

// ============================================================================
// 事件泵
// ============================================================================

/// 在应用的事件上下文中把事件交给监听器
pub struct EventPump {
    deliveries: mpsc::Receiver<Delivery>,
    closed: Arc<AtomicBool>,
    listeners: ListenerManager,
    finished: bool,
}

impl EventPump {
    pub fn listeners(&self) -> &ListenerManager {
        &self.listeners
    }

    pub fn listeners_mut(&mut self) -> &mut ListenerManager {
        &mut self.listeners
    }

    /// 处理下一条消息，连接结束后返回 `false`
    pub async fn pump_once(&mut self) -> bool {
        if self.finished {
            return false;
        }

        match self.deliveries.recv().await {
            Some(Delivery::Event(event)) => {
                if self.closed.load(Ordering::SeqCst) {
                    debug!("连接已关闭，丢弃事件 {:?}", event.category());
                } else {
                    self.listeners.dispatch(&event);
                }
                true
            }
            Some(Delivery::Fault(error)) => {
                self.listeners.report_engine_fault(error);
                true
            }
            Some(Delivery::Closed(events)) => {
                self.finish(events);
                false
            }
            None => {
                self.finish(Vec::new());
                false
            }
        }
    }

    /// 持续投递直到连接结束
    pub async fn run(&mut self) {
        while self.pump_once().await {}
    }

    fn finish(&mut self, events: Vec<Event>) {
        self.finished = true;
        self.closed.store(true, Ordering::SeqCst);
        for event in &events {
            self.listeners.dispatch(event);
        }
        self.listeners.dispatch(&Event::Connection(ConnectionEvent::Lost));
        info!("连接已关闭");
    }
}

// ============================================================================
// 驱动任务
// ============================================================================

/// 启动驱动任务
pub fn spawn<S, C>(
    config: &ClientConfig,
    listeners: ListenerManager,
    source: S,
    sink: C,
) -> (ClientHandle, EventPump, JoinHandle<()>)
where
    S: RecordSource + 'static,
    C: CommandSink + 'static,
{
    let closed = Arc::new(AtomicBool::new(false));
    let (request_tx, request_rx) = mpsc::channel(REQUEST_CAPACITY);
    let (delivery_tx, delivery_rx) = mpsc::channel(config.event_capacity.max(1));

    let driver = Driver {
        session: Session::new(config),
        sink,
        requests: request_rx,
        deliveries: delivery_tx,
    };
    let task = tokio::spawn(driver.run(source));

    let handle = ClientHandle {
        requests: request_tx,
        closed: closed.clone(),
    };
    let pump = EventPump {
        deliveries: delivery_rx,
        closed,
        listeners,
        finished: false,
    };
    (handle, pump, task)
}

struct Driver<C> {
    session: Session,
    sink: C,
    requests: mpsc::Receiver<Request>,
    deliveries: mpsc::Sender<Delivery>,
}

impl<C: CommandSink> Driver<C> {
    async fn run<S: RecordSource + 'static>(mut self, source: S) {
        let (mut records, reader) = read_records(source);

        self.deliver(Delivery::Event(Event::Connection(ConnectionEvent::Established)))
            .await;
        for command in self.session.login_commands() {
            self.send(&command).await;
        }

        let mut requests_open = true;
        loop {
            tokio::select! {
                record = records.recv() => match record {
                    Some(Ok(record)) => self.on_record(record).await,
                    Some(Err(e)) => warn!("无法解码服务器输出: {}", e),
                    None => {
                        info!("服务器输出结束");
                        break;
                    }
                },
                request = self.requests.recv(), if requests_open => match request {
                    Some(Request { action: Action::Disconnect, reply }) => {
                        info!("断开连接");
                        let _ = reply.send(Ok(()));
                        break;
                    }
                    Some(request) => self.on_request(request).await,
                    None => requests_open = false,
                },
            }
        }

        // 读取任务持有连接，结束后连接随之关闭
        reader.abort();
        if let Err(e) = reader.await {
            if !e.is_cancelled() {
                error!("读取任务异常退出: {}", e);
            }
        }

        let pending = self.session.close();
        self.deliver(Delivery::Closed(pending.events)).await;
    }

    async fn on_record(&mut self, record: ServerRecord) {
        match self.session.handle(record) {
            Ok(pending) => self.flush(pending).await,
            Err(error) => {
                error!("处理服务器记录失败: {}", error);
                self.deliver(Delivery::Fault(error)).await;
            }
        }
    }

    async fn on_request(&mut self, Request { action, reply }: Request) {
        let result = match self.perform(action) {
            Ok(Some(command)) => self
                .sink
                .send_command(&command)
                .await
                .map_err(SyncError::from),
            Ok(None) => Ok(()),
            Err(e) => Err(e),
        };
        if let Err(e) = &result {
            debug!("操作失败: {}", e);
        }
        let _ = reply.send(result);
    }

    /// 校验操作并得到要发送的命令
    fn perform(&mut self, action: Action) -> Result<Option<String>> {
        let session = &mut self.session;
        let command = match action {
            Action::MakeMove { game, text } => session.make_move_text(game, &text)?,
            Action::Resign(game) => session.resign(game)?,
            Action::RequestDraw(game) => session.request_draw(game)?,
            Action::RequestAbort(game) => session.request_abort(game)?,
            Action::RequestAdjourn(game) => session.request_adjourn(game)?,
            Action::RequestTakeback { game, plies } => session.request_takeback(game, plies)?,
            Action::GoBackward { game, plies } => session.go_backward(game, plies)?,
            Action::GoForward { game, plies } => session.go_forward(game, plies)?,
            Action::GoToBeginning(game) => session.go_to_beginning(game)?,
            Action::GoToEnd(game) => session.go_to_end(game)?,
            Action::QuitGame(game) => return session.quit_game(game),
            Action::AcceptSeek(index) => session.accept_seek(index)?,
            Action::Disconnect => return Ok(None),
        };
        Ok(Some(command))
    }

    /// 先发送命令，再投递事件
    async fn flush(&mut self, pending: Pending) {
        for command in pending.commands {
            self.send(&command).await;
        }
        for event in pending.events {
            self.deliver(Delivery::Event(event)).await;
        }
    }

    async fn send(&mut self, command: &str) {
        if let Err(e) = self.sink.send_command(command).await {
            error!("发送命令 {} 失败: {}", command, e);
        }
    }

    async fn deliver(&mut self, delivery: Delivery) {
        if self.deliveries.send(delivery).await.is_err() {
            debug!("事件泵已经关闭");
        }
    }
}

/// 在独立任务中读取记录，解码失败的行不会中断读取
fn read_records<S: RecordSource + 'static>(
    mut source: S,
) -> (mpsc::Receiver<protocol::Result<ServerRecord>>, JoinHandle<()>) {
    let (tx, rx) = mpsc::channel(REQUEST_CAPACITY);
    let reader = tokio::spawn(async move {
        loop {
            let item = match source.next_record().await {
                Ok(Some(record)) => Ok(record),
                Ok(None) => break,
                Err(e @ ProtocolError::Parse(_)) => Err(e),
                Err(e) => {
                    error!("读取服务器输出失败: {}", e);
                    break;
                }
            };
            if tx.send(item).await.is_err() {
                break;
            }
        }
    });
    (rx, reader)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Capabilities;
    use crate::dispatcher::{ConnectionListener, GameListener, ListenerResult};
    use crate::game::Game;
    use crate::rules::Move;
    use crate::test_support::{snapshot, SnapshotSpec};
    use protocol::{DeltaBoard, GameOutcome, Relation};
    use std::sync::Mutex;

    #[derive(Clone, Default)]
    struct Recorder {
        log: Arc<Mutex<Vec<String>>>,
    }

    impl Recorder {
        fn push(&self, entry: String) -> ListenerResult {
            self.log.lock().unwrap().push(entry);
            Ok(())
        }

        fn entries(&self) -> Vec<String> {
            self.log.lock().unwrap().clone()
        }
    }

    impl ConnectionListener for Recorder {
        fn connection_established(&mut self) -> ListenerResult {
            self.push("established".to_string())
        }

        fn connection_lost(&mut self) -> ListenerResult {
            self.push("lost".to_string())
        }
    }

    impl GameListener for Recorder {
        fn game_start(&mut self, game: &Arc<Game>) -> ListenerResult {
            self.push(format!("start {}", game.id))
        }

        fn move_made(&mut self, game: &Arc<Game>, mv: &Move, _is_new: bool) -> ListenerResult {
            self.push(format!("move {} {}", game.id, mv.canonical()))
        }

        fn game_end(&mut self, game: &Arc<Game>, outcome: GameOutcome) -> ListenerResult {
            self.push(format!("end {} {:?}", game.id, outcome))
        }
    }

    struct Harness {
        records: mpsc::Sender<ServerRecord>,
        commands: mpsc::UnboundedReceiver<String>,
        handle: ClientHandle,
        pump: EventPump,
        recorder: Recorder,
        task: JoinHandle<()>,
    }

    fn harness() -> Harness {
        let recorder = Recorder::default();
        let mut listeners = ListenerManager::new(Capabilities::default());
        listeners.add_connection_listener(recorder.clone());
        listeners.add_game_listener(recorder.clone());

        let (records, source) = mpsc::channel(16);
        let (sink, commands) = mpsc::unbounded_channel();
        let (handle, pump, task) = spawn(&ClientConfig::default(), listeners, source, sink);
        Harness {
            records,
            commands,
            handle,
            pump,
            recorder,
            task,
        }
    }

    fn board(moves: &[&str], relation: Relation) -> ServerRecord {
        ServerRecord::Style12(snapshot(&SnapshotSpec {
            moves,
            relation,
            ..SnapshotSpec::default()
        }))
    }

    /// 一直投递直到记录中出现 `entry`
    async fn pump_until(harness: &mut Harness, entry: &str) {
        while !harness.recorder.entries().iter().any(|e| e == entry) {
            assert!(harness.pump.pump_once().await, "closed before {:?}", entry);
        }
    }

    #[tokio::test]
    async fn test_replay_until_source_exhausted() {
        let mut harness = harness();
        harness.records.send(board(&[], Relation::ObservingPlayed)).await.unwrap();
        harness.records.send(board(&["e2e4"], Relation::ObservingPlayed)).await.unwrap();
        drop(harness.records);

        harness.pump.run().await;
        harness.task.await.unwrap();

        assert_eq!(
            harness.recorder.entries(),
            vec!["established", "start 7", "move 7 e2e4", "end 7 Unknown", "lost"]
        );
        let mut commands = Vec::new();
        while let Ok(command) = harness.commands.try_recv() {
            commands.push(command);
        }
        assert_eq!(commands, Session::new(&ClientConfig::default()).login_commands());
    }

    #[tokio::test]
    async fn test_actions_are_validated_and_sent() {
        let mut harness = harness();
        for expected in Session::new(&ClientConfig::default()).login_commands() {
            assert_eq!(harness.commands.recv().await, Some(expected));
        }

        harness.records.send(board(&[], Relation::PlayingMyMove)).await.unwrap();
        pump_until(&mut harness, "start 7").await;

        harness
            .handle
            .perform(Action::MakeMove {
                game: GameId(7),
                text: "e2e4".to_string(),
            })
            .await
            .unwrap();
        assert_eq!(harness.commands.recv().await.as_deref(), Some("e2e4"));

        harness.handle.perform(Action::RequestDraw(GameId(7))).await.unwrap();
        assert_eq!(harness.commands.recv().await.as_deref(), Some("draw"));

        assert!(matches!(
            harness.handle.perform(Action::GoToEnd(GameId(7))).await,
            Err(SyncError::NotExaminedGame(GameId(7)))
        ));
        assert!(matches!(
            harness.handle.perform(Action::Resign(GameId(8))).await,
            Err(SyncError::NoSuchGame(GameId(8)))
        ));
    }

    #[tokio::test]
    async fn test_desync_reported_and_decoding_continues() {
        let mut harness = harness();
        let orphan = DeltaBoard {
            game_id: GameId(9),
            ply: 1,
            move_smith: "e2e4".to_string(),
            move_san: "e4".to_string(),
            taken_ms: 0,
            remaining_ms: 1000,
        };
        harness.records.send(ServerRecord::Delta(orphan)).await.unwrap();
        harness.records.send(board(&[], Relation::ObservingPlayed)).await.unwrap();

        pump_until(&mut harness, "start 7").await;
        let faults = harness.pump.listeners_mut().take_engine_faults();
        assert!(matches!(faults[..], [SyncError::NoSuchGame(GameId(9))]));
    }

    /// 永远等待下一条记录，被丢弃时记下来
    struct IdleSource {
        dropped: Arc<AtomicBool>,
    }

    #[async_trait::async_trait]
    impl RecordSource for IdleSource {
        async fn next_record(&mut self) -> protocol::Result<Option<ServerRecord>> {
            std::future::pending().await
        }
    }

    impl Drop for IdleSource {
        fn drop(&mut self) {
            self.dropped.store(true, Ordering::SeqCst);
        }
    }

    #[tokio::test]
    async fn test_disconnect_releases_source() {
        let dropped = Arc::new(AtomicBool::new(false));
        let source = IdleSource {
            dropped: dropped.clone(),
        };
        let (sink, _commands) = mpsc::unbounded_channel::<String>();
        let listeners = ListenerManager::new(Capabilities::default());
        let (handle, mut pump, task) = spawn(&ClientConfig::default(), listeners, source, sink);

        handle.disconnect().await;
        pump.run().await;
        task.await.unwrap();

        assert!(dropped.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn test_disconnect_ends_open_games() {
        let mut harness = harness();
        harness.records.send(board(&[], Relation::ObservingPlayed)).await.unwrap();
        pump_until(&mut harness, "start 7").await;

        harness.handle.disconnect().await;
        assert!(harness.handle.is_closed());
        harness.pump.run().await;

        let entries = harness.recorder.entries();
        assert_eq!(&entries[entries.len() - 2..], ["end 7 Unknown", "lost"]);
        assert!(!harness.pump.pump_once().await);
        assert!(matches!(
            harness.handle.perform(Action::GoToEnd(GameId(7))).await,
            Err(SyncError::Protocol(ProtocolError::ConnectionClosed))
        ));
    }
}
