//! 传输层抽象
//!
//! 提供 RecordSource/CommandSink traits 使同步引擎与具体传输实现解耦。
//! 引擎只消费按服务器发送顺序解码好的记录，并把要发送的命令交给 sink；
//! 连接、登录与 timeseal 由外部负责。

use async_trait::async_trait;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt};
use tokio::sync::mpsc;
use tracing::trace;

use crate::constants::{MAX_COMMAND_LEN, PROMPT};
use crate::error::{ProtocolError, Result};
use crate::message::ServerRecord;

/// 记录来源 trait（解码路径的输入端）
#[async_trait]
pub trait RecordSource: Send {
    /// 读取下一条记录，来源耗尽时返回 `None`
    async fn next_record(&mut self) -> Result<Option<ServerRecord>>;
}

/// 命令出口 trait
#[async_trait]
pub trait CommandSink: Send {
    /// 发送一条命令
    async fn send_command(&mut self, command: &str) -> Result<()>;
}

// ============================================================================
// 文本行实现
// ============================================================================

/// 按行读取服务器输出并解码
pub struct LineSource<R> {
    reader: R,
    buffer: String,
}

impl<R: AsyncBufRead + Unpin + Send> LineSource<R> {
    /// 创建新的行读取器
    pub fn new(reader: R) -> Self {
        Self {
            reader,
            buffer: String::new(),
        }
    }

    /// 读取一行原始文本（已去除提示符与行尾），来源耗尽时返回 `None`
    pub async fn read_line(&mut self) -> Result<Option<String>> {
        loop {
            self.buffer.clear();
            let n = self.reader.read_line(&mut self.buffer).await?;
            if n == 0 {
                return Ok(None);
            }

            let mut line = self.buffer.trim_end_matches(['\r', '\n']);
            while let Some(rest) = line.strip_prefix(PROMPT) {
                line = rest;
            }
            // 只有提示符的行
            if line.is_empty() && self.buffer.starts_with(PROMPT) {
                continue;
            }
            return Ok(Some(line.to_string()));
        }
    }
}

#[async_trait]
impl<R: AsyncBufRead + Unpin + Send> RecordSource for LineSource<R> {
    async fn next_record(&mut self) -> Result<Option<ServerRecord>> {
        match self.read_line().await? {
            Some(line) => {
                trace!("<< {}", line);
                Ok(Some(ServerRecord::parse(&line)?))
            }
            None => Ok(None),
        }
    }
}

/// 以行为单位写出命令
pub struct LineWriter<W> {
    writer: W,
}

impl<W: AsyncWrite + Unpin + Send> LineWriter<W> {
    /// 创建新的命令写入器
    pub fn new(writer: W) -> Self {
        Self { writer }
    }

    /// 取回底层写入端
    pub fn into_inner(self) -> W {
        self.writer
    }
}

#[async_trait]
impl<W: AsyncWrite + Unpin + Send> CommandSink for LineWriter<W> {
    async fn send_command(&mut self, command: &str) -> Result<()> {
        if command.len() > MAX_COMMAND_LEN {
            return Err(ProtocolError::CommandTooLong {
                len: command.len(),
                max: MAX_COMMAND_LEN,
            });
        }
        trace!(">> {}", command);
        self.writer.write_all(command.as_bytes()).await?;
        self.writer.write_all(b"\n").await?;
        self.writer.flush().await?;
        Ok(())
    }
}

// ============================================================================
// 通道实现（进程内驱动与测试使用）
// ============================================================================

#[async_trait]
impl RecordSource for mpsc::Receiver<ServerRecord> {
    async fn next_record(&mut self) -> Result<Option<ServerRecord>> {
        Ok(self.recv().await)
    }
}

#[async_trait]
impl CommandSink for mpsc::Sender<String> {
    async fn send_command(&mut self, command: &str) -> Result<()> {
        self.send(command.to_string())
            .await
            .map_err(|_| ProtocolError::ConnectionClosed)
    }
}

#[async_trait]
impl CommandSink for mpsc::UnboundedSender<String> {
    async fn send_command(&mut self, command: &str) -> Result<()> {
        self.send(command.to_string())
            .map_err(|_| ProtocolError::ConnectionClosed)
    }
}
