//! 服务器记录
//!
//! 每一行服务器输出被解码为一个 [`ServerRecord`]。结构化的行（`<12>`、`<d1>`、
//! `<g1>`、`<pf>` 等）解析失败时返回 [`ParseError`]；无法识别的文本行一律作为
//! [`ServerRecord::PlainText`] 原样交给上层。

use serde::{Deserialize, Serialize};

use crate::board::BoardSnapshot;
use crate::constants::{
    DELTA_BOARD_PREFIX, GAME_INFO_PREFIX, PENDING_FROM_PREFIX, PENDING_REMOVED_PREFIX,
    PENDING_TO_PREFIX, SEEKS_CLEARED_LINE, SEEKS_REMOVED_PREFIX, SEEK_ADDED_PREFIX,
    STYLE12_PREFIX,
};
use crate::error::ParseError;
use crate::record::{
    parse_value, ChatMessage, DeltaBoard, GameEnd, GameId, GameInfo, GameOutcome,
    IllegalMoveReason, Ivar, OfferIndex, OfferKind, OfferRecord, SeekIndex, SeekInfo,
};

/// 一行服务器输出的解码结果
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ServerRecord {
    /// 完整棋盘快照
    Style12(BoardSnapshot),
    /// 增量棋盘
    Delta(DeltaBoard),
    /// 对局元数据
    GameInfo(GameInfo),
    /// 带编号的提议
    OfferMade(OfferRecord),
    /// 带编号的提议被移除（接受、拒绝、撤回或失效）
    OfferRemoved(OfferIndex),
    /// `Game N: NAME offers a KIND.`
    PlayerOffered {
        game_id: GameId,
        player: String,
        kind: OfferKind,
    },
    /// `Game N: NAME declines the KIND request.`
    PlayerDeclined {
        game_id: GameId,
        player: String,
        kind: OfferKind,
    },
    /// `Game N: NAME withdraws the KIND request.`
    PlayerWithdrew {
        game_id: GameId,
        player: String,
        kind: OfferKind,
    },
    /// `Game N: NAME requests to take back K half move(s).`
    PlayerOfferedTakeback {
        game_id: GameId,
        player: String,
        plies: u32,
    },
    /// `Game N: NAME proposes a different number (K) of half-move(s) to take back.`
    PlayerCounteredTakeback {
        game_id: GameId,
        player: String,
        plies: u32,
    },
    /// 走法被服务器拒绝
    IllegalMove {
        move_text: Option<String>,
        reason: IllegalMoveReason,
    },
    /// 对局结束
    GameEnd(GameEnd),
    /// 停止观看
    StoppedObserving(GameId),
    /// 停止研究
    StoppedExamining(GameId),
    /// 接口变量状态变化（`seekinfo set.`）
    IvarChanged { ivar: Ivar, on: bool },
    /// 进入/退出摆棋模式
    BoardSetup(bool),
    /// 主对局变化
    PrimaryGameChanged(GameId),
    /// 车轮战中切换到另一张棋盘
    SimulBoardChanged(GameId),
    SeekAdded(SeekInfo),
    SeeksRemoved(Vec<SeekIndex>),
    SeeksCleared,
    /// 私聊
    Chat(ChatMessage),
    /// `Notification: NAME has arrived.`
    FriendArrived(String),
    /// `Notification: NAME has departed.`
    FriendDeparted(String),
    /// 其他文本
    PlainText(String),
}

impl ServerRecord {
    /// 解码一行服务器输出
    pub fn parse(line: &str) -> Result<ServerRecord, ParseError> {
        let line = line.trim_end_matches(['\r', '\n']);

        if line.starts_with(STYLE12_PREFIX) {
            return BoardSnapshot::parse_style12(line).map(ServerRecord::Style12);
        }
        if line.starts_with(DELTA_BOARD_PREFIX) {
            return DeltaBoard::parse_line(line).map(ServerRecord::Delta);
        }
        if line.starts_with(GAME_INFO_PREFIX) {
            return GameInfo::parse_line(line).map(ServerRecord::GameInfo);
        }
        if line.starts_with(PENDING_FROM_PREFIX) {
            return OfferRecord::parse_line(line, true).map(ServerRecord::OfferMade);
        }
        if line.starts_with(PENDING_TO_PREFIX) {
            return OfferRecord::parse_line(line, false).map(ServerRecord::OfferMade);
        }
        if let Some(rest) = line.strip_prefix(PENDING_REMOVED_PREFIX) {
            let raw = rest.trim();
            return Ok(ServerRecord::OfferRemoved(OfferIndex(parse_value(
                "pending", "index", raw,
            )?)));
        }
        if line.trim() == SEEKS_CLEARED_LINE {
            return Ok(ServerRecord::SeeksCleared);
        }
        if let Some(rest) = line.strip_prefix(SEEKS_REMOVED_PREFIX) {
            let indices = rest
                .split_whitespace()
                .map(|raw| parse_value("seek", "index", raw).map(SeekIndex))
                .collect::<Result<Vec<_>, _>>()?;
            return Ok(ServerRecord::SeeksRemoved(indices));
        }
        if line.starts_with(SEEK_ADDED_PREFIX) {
            return SeekInfo::parse_line(line).map(ServerRecord::SeekAdded);
        }

        Ok(parse_text(line).unwrap_or_else(|| ServerRecord::PlainText(line.to_string())))
    }
}

/// 识别纯文本通知；不匹配任何已知格式时返回 `None`
fn parse_text(line: &str) -> Option<ServerRecord> {
    if let Some(rest) = line.strip_prefix("Game ") {
        if let Some(record) = parse_game_notice(rest) {
            return Some(record);
        }
    }
    if line.starts_with('{') {
        return parse_game_end(line).map(ServerRecord::GameEnd);
    }
    if let Some(text) = enclosed(line, "Illegal move (", ").") {
        return Some(ServerRecord::IllegalMove {
            move_text: Some(text.to_string()),
            reason: IllegalMoveReason::Illegal,
        });
    }
    if let Some(text) = enclosed(line, "Ambiguous move (", ").") {
        return Some(ServerRecord::IllegalMove {
            move_text: Some(text.to_string()),
            reason: IllegalMoveReason::Other,
        });
    }
    if line == "It is not your move." {
        return Some(ServerRecord::IllegalMove {
            move_text: None,
            reason: IllegalMoveReason::NotYourTurn,
        });
    }
    if let Some(id) = enclosed(line, "Removing game ", " from observation list.") {
        return game_id(id).map(ServerRecord::StoppedObserving);
    }
    if let Some(id) = enclosed(line, "You are no longer examining game ", ".") {
        return game_id(id).map(ServerRecord::StoppedExamining);
    }
    if let Some(id) = enclosed(line, "Your primary game is now game ", ".") {
        return game_id(id).map(ServerRecord::PrimaryGameChanged);
    }
    if let Some(rest) = enclosed(line, "You are now at ", ").") {
        // You are now at NAME's board (game N).
        let (_, id) = rest.split_once("'s board (game ")?;
        return game_id(id).map(ServerRecord::SimulBoardChanged);
    }
    match line {
        "Entering setup mode." => return Some(ServerRecord::BoardSetup(true)),
        "Exiting setup mode." => return Some(ServerRecord::BoardSetup(false)),
        _ => {}
    }
    if let Some(name) = line.strip_suffix(" unset.") {
        if let Ok(ivar) = name.parse::<Ivar>() {
            return Some(ServerRecord::IvarChanged { ivar, on: false });
        }
    }
    if let Some(name) = line.strip_suffix(" set.") {
        if let Ok(ivar) = name.parse::<Ivar>() {
            return Some(ServerRecord::IvarChanged { ivar, on: true });
        }
    }
    if let Some(name) = enclosed(line, "Notification: ", " has arrived.") {
        return split_titles(name).map(|(name, _)| ServerRecord::FriendArrived(name.to_string()));
    }
    if let Some(name) = enclosed(line, "Notification: ", " has departed.") {
        return split_titles(name).map(|(name, _)| ServerRecord::FriendDeparted(name.to_string()));
    }
    if let Some((handle, text)) = line.split_once(" tells you: ") {
        let (sender, titles) = split_titles(handle)?;
        return Some(ServerRecord::Chat(ChatMessage {
            sender: sender.to_string(),
            titles: titles.to_string(),
            text: text.to_string(),
        }));
    }
    None
}

/// `Game N: ...` 形式的提议通知
fn parse_game_notice(rest: &str) -> Option<ServerRecord> {
    let (id, rest) = rest.split_once(": ")?;
    let game_id = game_id(id)?;
    let (player, action) = rest.split_once(' ')?;
    if !is_username(player) {
        return None;
    }
    let player = player.to_string();

    if let Some(kind) = enclosed(action, "offers a ", ".") {
        let kind = OfferKind::from_name(kind)?;
        return Some(ServerRecord::PlayerOffered {
            game_id,
            player,
            kind,
        });
    }
    if let Some(kind) = enclosed(action, "declines the ", " request.") {
        let kind = OfferKind::from_name(kind)?;
        return Some(ServerRecord::PlayerDeclined {
            game_id,
            player,
            kind,
        });
    }
    if let Some(kind) = enclosed(action, "withdraws the ", " request.") {
        let kind = OfferKind::from_name(kind)?;
        return Some(ServerRecord::PlayerWithdrew {
            game_id,
            player,
            kind,
        });
    }
    if let Some(rest) = action.strip_prefix("requests to take back ") {
        let (plies, _) = rest.split_once(' ')?;
        return Some(ServerRecord::PlayerOfferedTakeback {
            game_id,
            player,
            plies: plies.parse().ok()?,
        });
    }
    if let Some(rest) = action.strip_prefix("proposes a different number (") {
        let (plies, _) = rest.split_once(')')?;
        return Some(ServerRecord::PlayerCounteredTakeback {
            game_id,
            player,
            plies: plies.parse().ok()?,
        });
    }
    None
}

/// `{Game N (W vs. B) reason} result`
fn parse_game_end(line: &str) -> Option<GameEnd> {
    let rest = line.strip_prefix("{Game ")?;
    let (id, rest) = rest.split_once(" (")?;
    let (white, rest) = rest.split_once(" vs. ")?;
    let (black, rest) = rest.split_once(") ")?;
    let (reason, result) = rest.split_once("} ")?;
    if !is_username(white) || !is_username(black) {
        return None;
    }
    Some(GameEnd {
        game_id: game_id(id)?,
        white_name: white.to_string(),
        black_name: black.to_string(),
        reason: reason.to_string(),
        outcome: GameOutcome::from_result(result),
    })
}

fn enclosed<'a>(line: &'a str, prefix: &str, suffix: &str) -> Option<&'a str> {
    line.strip_prefix(prefix)?.strip_suffix(suffix)
}

fn game_id(raw: &str) -> Option<GameId> {
    raw.parse().ok().map(GameId)
}

fn is_username(name: &str) -> bool {
    !name.is_empty() && name.len() <= 17 && name.chars().all(|c| c.is_ascii_alphabetic())
}

/// 将 `Name(GM)(C)` 拆分为名字与头衔
fn split_titles(handle: &str) -> Option<(&str, &str)> {
    let (name, titles) = match handle.find('(') {
        Some(pos) => handle.split_at(pos),
        None => (handle, ""),
    };
    if is_username(name) {
        Some((name, titles))
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::PendingOffer;

    #[test]
    fn test_parse_structured_records() {
        let style12 = "<12> rnbqkbnr pppppppp -------- -------- -------- -------- PPPPPPPP RNBQKBNR W -1 1 1 1 1 0 7 Newton Einstein 1 2 12 39 39 120 120 1 none (0:00) none 0 0 0";
        assert!(matches!(
            ServerRecord::parse(style12).unwrap(),
            ServerRecord::Style12(_)
        ));
        assert!(matches!(
            ServerRecord::parse("<d1> 7 1 e2e4 e4 1000 119000").unwrap(),
            ServerRecord::Delta(_)
        ));
        assert_eq!(
            ServerRecord::parse("<pr> 12").unwrap(),
            ServerRecord::OfferRemoved(OfferIndex(12))
        );
        assert_eq!(
            ServerRecord::parse("<sr> 3 5").unwrap(),
            ServerRecord::SeeksRemoved(vec![SeekIndex(3), SeekIndex(5)])
        );
        assert_eq!(ServerRecord::parse("<sc>").unwrap(), ServerRecord::SeeksCleared);
        match ServerRecord::parse("<pf> 12 w=Einstein t=draw p=#").unwrap() {
            ServerRecord::OfferMade(offer) => {
                assert!(offer.to_user);
                assert_eq!(offer.offer, PendingOffer::Draw);
            }
            other => panic!("Unexpected record: {:?}", other),
        }
    }

    #[test]
    fn test_structured_parse_error_propagates() {
        assert!(ServerRecord::parse("<12> garbage").is_err());
        assert!(ServerRecord::parse("<pr> x").is_err());
    }

    #[test]
    fn test_parse_offer_notices() {
        assert_eq!(
            ServerRecord::parse("Game 7: Einstein offers a draw.").unwrap(),
            ServerRecord::PlayerOffered {
                game_id: GameId(7),
                player: "Einstein".to_string(),
                kind: OfferKind::Draw,
            }
        );
        assert_eq!(
            ServerRecord::parse("Game 7: Newton declines the abort request.").unwrap(),
            ServerRecord::PlayerDeclined {
                game_id: GameId(7),
                player: "Newton".to_string(),
                kind: OfferKind::Abort,
            }
        );
        assert_eq!(
            ServerRecord::parse("Game 7: Newton withdraws the adjourn request.").unwrap(),
            ServerRecord::PlayerWithdrew {
                game_id: GameId(7),
                player: "Newton".to_string(),
                kind: OfferKind::Adjourn,
            }
        );
        assert_eq!(
            ServerRecord::parse("Game 7: Newton requests to take back 2 half move(s).").unwrap(),
            ServerRecord::PlayerOfferedTakeback {
                game_id: GameId(7),
                player: "Newton".to_string(),
                plies: 2,
            }
        );
        assert_eq!(
            ServerRecord::parse(
                "Game 7: Einstein proposes a different number (1) of half-move(s) to take back."
            )
            .unwrap(),
            ServerRecord::PlayerCounteredTakeback {
                game_id: GameId(7),
                player: "Einstein".to_string(),
                plies: 1,
            }
        );
    }

    #[test]
    fn test_parse_illegal_move() {
        assert_eq!(
            ServerRecord::parse("Illegal move (Nf3).").unwrap(),
            ServerRecord::IllegalMove {
                move_text: Some("Nf3".to_string()),
                reason: IllegalMoveReason::Illegal,
            }
        );
        assert_eq!(
            ServerRecord::parse("It is not your move.").unwrap(),
            ServerRecord::IllegalMove {
                move_text: None,
                reason: IllegalMoveReason::NotYourTurn,
            }
        );
    }

    #[test]
    fn test_parse_game_lifecycle() {
        match ServerRecord::parse("{Game 6 (Strakh vs. Svag) Strakh forfeits on time} 0-1").unwrap() {
            ServerRecord::GameEnd(end) => {
                assert_eq!(end.game_id, GameId(6));
                assert_eq!(end.white_name, "Strakh");
                assert_eq!(end.reason, "Strakh forfeits on time");
                assert_eq!(end.outcome, GameOutcome::BlackWins);
            }
            other => panic!("Unexpected record: {:?}", other),
        }
        assert_eq!(
            ServerRecord::parse("Removing game 7 from observation list.").unwrap(),
            ServerRecord::StoppedObserving(GameId(7))
        );
        assert_eq!(
            ServerRecord::parse("You are no longer examining game 114.").unwrap(),
            ServerRecord::StoppedExamining(GameId(114))
        );
        assert_eq!(
            ServerRecord::parse("Entering setup mode.").unwrap(),
            ServerRecord::BoardSetup(true)
        );
        assert_eq!(
            ServerRecord::parse("You are now at Einstein's board (game 9).").unwrap(),
            ServerRecord::SimulBoardChanged(GameId(9))
        );
    }

    #[test]
    fn test_parse_ivar_and_chat() {
        assert_eq!(
            ServerRecord::parse("seekinfo unset.").unwrap(),
            ServerRecord::IvarChanged {
                ivar: Ivar::SeekInfo,
                on: false
            }
        );
        match ServerRecord::parse("Einstein(GM) tells you: hello there").unwrap() {
            ServerRecord::Chat(chat) => {
                assert_eq!(chat.sender, "Einstein");
                assert_eq!(chat.titles, "(GM)");
                assert_eq!(chat.text, "hello there");
            }
            other => panic!("Unexpected record: {:?}", other),
        }
        assert_eq!(
            ServerRecord::parse("Notification: Einstein(GM) has arrived.").unwrap(),
            ServerRecord::FriendArrived("Einstein".to_string())
        );
        assert_eq!(
            ServerRecord::parse("Notification: Newton has departed.").unwrap(),
            ServerRecord::FriendDeparted("Newton".to_string())
        );
    }

    #[test]
    fn test_unknown_lines_are_plain_text() {
        for line in [
            "Game 7: Einstein offers a rematch.",
            "Welcome to the server.",
            "bogus set.",
        ] {
            assert_eq!(
                ServerRecord::parse(line).unwrap(),
                ServerRecord::PlainText(line.to_string())
            );
        }
    }
}
