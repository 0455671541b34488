//! ics-replay：回放录制的服务器输出，打印同步引擎产生的事件

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use async_trait::async_trait;
use clap::Parser;
use protocol::{ChatMessage, CommandSink, GameOutcome, IllegalMoveReason, Ivar, LineSource, OfferKind, Side};
use tokio::io::BufReader;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use ics_client::{
    driver, ChatListener, ClientConfig, ConnectionListener, FriendsListener, Game, GameListEvent,
    GameListListener, GameListener, ListenerManager, ListenerResult, Move, Position, Seek,
    SeekListener,
};

#[derive(Parser, Debug)]
#[command(author, version, about = "Replay a recorded chess server session through the sync engine")]
struct Args {
    /// Recorded server output, one line per record
    log: PathBuf,

    /// Configuration file (defaults to the user configuration directory)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Also print clock adjustments
    #[arg(long)]
    clocks: bool,
}

/// 把事件打印到标准输出
#[derive(Clone, Copy)]
struct Printer {
    clocks: bool,
}

impl ConnectionListener for Printer {
    fn connection_established(&mut self) -> ListenerResult {
        println!("-- connected");
        Ok(())
    }

    fn connection_lost(&mut self) -> ListenerResult {
        println!("-- disconnected");
        Ok(())
    }

    fn ivar_changed(&mut self, ivar: Ivar, on: bool) -> ListenerResult {
        println!("-- ivar {} = {}", ivar, on);
        Ok(())
    }
}

impl ChatListener for Printer {
    fn tell(&mut self, message: &ChatMessage) -> ListenerResult {
        println!("{}{} tells you: {}", message.sender, message.titles, message.text);
        Ok(())
    }

    fn plain_text(&mut self, text: &str) -> ListenerResult {
        println!("{}", text);
        Ok(())
    }
}

impl GameListener for Printer {
    fn game_start(&mut self, game: &Arc<Game>) -> ListenerResult {
        println!(
            "[{}] start {} vs {} ({}, {:?})",
            game.id, game.white_name, game.black_name, game.category, game.game_type
        );
        Ok(())
    }

    fn move_made(&mut self, game: &Arc<Game>, mv: &Move, is_new: bool) -> ListenerResult {
        let san = mv.san().unwrap_or("?");
        let tag = if is_new { "" } else { " (old)" };
        println!("[{}] move {} {}{}", game.id, mv.canonical(), san, tag);
        Ok(())
    }

    fn position_changed(&mut self, game: &Arc<Game>, position: &Position) -> ListenerResult {
        println!("[{}] position {}", game.id, position.fen());
        Ok(())
    }

    fn takeback(&mut self, game: &Arc<Game>, plies: u32) -> ListenerResult {
        println!("[{}] takeback {}", game.id, plies);
        Ok(())
    }

    fn illegal_move_attempted(
        &mut self,
        game: &Arc<Game>,
        mv: &Move,
        reason: IllegalMoveReason,
    ) -> ListenerResult {
        println!("[{}] illegal move {} ({:?})", game.id, mv.canonical(), reason);
        Ok(())
    }

    fn clock_adjusted(
        &mut self,
        game: &Arc<Game>,
        side: Side,
        time_ms: i64,
        running: bool,
    ) -> ListenerResult {
        if self.clocks {
            let state = if running { "running" } else { "stopped" };
            println!("[{}] clock {:?} {}ms {}", game.id, side, time_ms, state);
        }
        Ok(())
    }

    fn board_flipped(&mut self, game: &Arc<Game>, flipped: bool) -> ListenerResult {
        println!("[{}] flipped {}", game.id, flipped);
        Ok(())
    }

    fn offer_updated(
        &mut self,
        game: &Arc<Game>,
        kind: OfferKind,
        player: Side,
        on: bool,
        plies: u32,
    ) -> ListenerResult {
        let state = if on { "on" } else { "off" };
        if kind == OfferKind::Takeback {
            println!("[{}] {:?} takeback {} {}", game.id, player, plies, state);
        } else {
            println!("[{}] {:?} {} {}", game.id, player, kind, state);
        }
        Ok(())
    }

    fn game_end(&mut self, game: &Arc<Game>, outcome: GameOutcome) -> ListenerResult {
        println!("[{}] end {:?}", game.id, outcome);
        Ok(())
    }
}

impl SeekListener for Printer {
    fn seek_added(&mut self, seek: &Seek) -> ListenerResult {
        println!(
            "seek {} by {} ({} {})",
            seek.index(),
            seek.info.handle,
            seek.info.time_minutes,
            seek.info.increment_secs
        );
        Ok(())
    }

    fn seek_removed(&mut self, seek: &Seek) -> ListenerResult {
        println!("seek {} removed", seek.index());
        Ok(())
    }
}

impl FriendsListener for Printer {
    fn friend_online(&mut self, name: &str) -> ListenerResult {
        println!("friend {} online", name);
        Ok(())
    }

    fn friend_offline(&mut self, name: &str) -> ListenerResult {
        println!("friend {} offline", name);
        Ok(())
    }
}

impl GameListListener for Printer {
    fn game_list_arrived(&mut self, list: &GameListEvent) -> ListenerResult {
        println!("{} ({} games)", list.title, list.items.len());
        for item in &list.items {
            println!("  {} {} vs {}", item.game_id, item.white_name, item.black_name);
        }
        Ok(())
    }
}

/// 回放时不连接服务器，命令只打印出来
struct EchoSink;

#[async_trait]
impl CommandSink for EchoSink {
    async fn send_command(&mut self, command: &str) -> protocol::Result<()> {
        println!(">> {}", command);
        Ok(())
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    let config = match &args.config {
        Some(path) => ClientConfig::load_from(path),
        None => ClientConfig::load(),
    };

    // 初始化日志
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .with(tracing_subscriber::EnvFilter::from_default_env()
            .add_directive(config.log_filter.parse()?))
        .init();

    info!("ics-replay 启动中...");

    let file = tokio::fs::File::open(&args.log)
        .await
        .with_context(|| format!("无法打开录制文件 {:?}", args.log))?;
    let source = LineSource::new(BufReader::new(file));

    let printer = Printer {
        clocks: args.clocks,
    };
    let mut listeners = ListenerManager::new(config.capabilities);
    listeners.add_connection_listener(printer);
    listeners.add_chat_listener(printer);
    listeners.add_game_listener(printer);
    if config.capabilities.seeks {
        listeners.add_seek_listener(printer)?;
    }
    if config.capabilities.friends {
        listeners.add_friends_listener(printer)?;
    }
    if config.capabilities.game_lists {
        listeners.add_game_list_listener(printer)?;
    }

    let (_handle, mut pump, task) = driver::spawn(&config, listeners, source, EchoSink);
    pump.run().await;
    task.await?;

    let listeners = pump.listeners_mut();
    for fault in listeners.take_faults() {
        warn!("监听器 {:?} 出错: {}", fault.listener, fault.error);
    }
    let faults = listeners.take_engine_faults();
    if !faults.is_empty() {
        warn!("回放中有 {} 个同步错误", faults.len());
        for fault in &faults {
            warn!("{}", fault);
        }
    }

    info!("回放结束");
    Ok(())
}
