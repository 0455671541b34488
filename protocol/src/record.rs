//! 服务器记录类型
//!
//! 除 style 12 以外的各类结构化行：`<g1>` 对局信息、`<d1>` 增量棋盘、
//! `<pf>`/`<pt>` 待定提议、`<s>` 求战信息，以及若干纯文本通知的载荷。

use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::board::BoardSnapshot;
use crate::constants::UNKNOWN_VARIANT;
use crate::error::ParseError;
use crate::piece::Side;

/// 服务器分配的对局编号
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct GameId(pub u32);

impl fmt::Display for GameId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// 服务器分配的提议编号
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct OfferIndex(pub u32);

impl fmt::Display for OfferIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// 服务器分配的求战编号
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SeekIndex(pub u32);

impl fmt::Display for SeekIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ============================================================================
// 等级分
// ============================================================================

/// 等级分标记
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RatingMark {
    /// 已确定
    Established,
    /// 临时分（`P`）
    Provisional,
    /// 估计分（`E`）
    Estimated,
}

/// 等级分
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Rating {
    pub value: u32,
    pub mark: RatingMark,
}

impl Rating {
    /// 解析 `1586`、`1586E`、`1500P`；`0` 与 `----` 表示无等级分
    pub fn parse(raw: &str) -> Option<Rating> {
        let (digits, mark) = match raw.chars().last()? {
            'E' => (&raw[..raw.len() - 1], RatingMark::Estimated),
            'P' => (&raw[..raw.len() - 1], RatingMark::Provisional),
            _ => (raw, RatingMark::Established),
        };
        let value: u32 = digits.parse().ok()?;
        if value == 0 {
            None
        } else {
            Some(Rating { value, mark })
        }
    }
}

// ============================================================================
// <g1> 对局信息
// ============================================================================

/// 对局元数据（`<g1>`），在一个对局的第一个快照之前发送
///
/// 示例：`<g1> 1 p=0 t=blitz r=1 u=0,0 it=5,5 i=8,8 pt=0 rt=1586E,2100 ts=1,0`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GameInfo {
    pub game_id: GameId,
    pub private: bool,
    /// 对局类别，例如 `blitz`、`wild/5`、`crazyhouse`
    pub category: String,
    pub rated: bool,
    pub white_registered: bool,
    pub black_registered: bool,
    /// 白方初始时间（秒）
    pub white_initial_secs: u32,
    pub black_initial_secs: u32,
    /// 白方每步加秒（秒）
    pub white_increment_secs: u32,
    pub black_increment_secs: u32,
    /// 双人赛中搭档的对局
    pub partner_game: Option<GameId>,
    pub white_rating: Option<Rating>,
    pub black_rating: Option<Rating>,
    pub white_timeseal: bool,
    pub black_timeseal: bool,
}

impl GameInfo {
    const RECORD: &'static str = "gameinfo";

    pub fn parse_line(line: &str) -> Result<Self, ParseError> {
        let rest = strip_tag(line, crate::constants::GAME_INFO_PREFIX, Self::RECORD)?;
        let mut tokens = rest.split_whitespace();
        let game_raw = tokens.next().ok_or(ParseError::MissingField {
            record: Self::RECORD,
            field: "game",
        })?;
        let game_id = GameId(parse_value(Self::RECORD, "game", game_raw)?);
        let fields = key_values(tokens);
        let get = |key: &'static str| {
            fields.get(key).copied().ok_or(ParseError::MissingField {
                record: Self::RECORD,
                field: key,
            })
        };

        let (white_unreg, black_unreg) = pair(Self::RECORD, "u", get("u")?)?;
        let (white_it, black_it) = pair(Self::RECORD, "it", get("it")?)?;
        let (white_inc, black_inc) = pair(Self::RECORD, "i", get("i")?)?;
        let (white_rt, black_rt) = get("rt")?
            .split_once(',')
            .ok_or_else(|| ParseError::invalid(Self::RECORD, "rt", fields["rt"]))?;
        let white_unreg: u32 = parse_value(Self::RECORD, "u", white_unreg)?;
        let black_unreg: u32 = parse_value(Self::RECORD, "u", black_unreg)?;
        let partner: u32 = match fields.get("pt") {
            Some(raw) => parse_value(Self::RECORD, "pt", raw)?,
            None => 0,
        };
        let (white_ts, black_ts) = match fields.get("ts") {
            Some(raw) => {
                let (w, b) = pair(Self::RECORD, "ts", raw)?;
                (w == "1", b == "1")
            }
            None => (false, false),
        };

        Ok(Self {
            game_id,
            private: get("p")? == "1",
            category: get("t")?.to_string(),
            rated: get("r")? == "1",
            white_registered: white_unreg == 0,
            black_registered: black_unreg == 0,
            white_initial_secs: minutes_to_secs(Self::RECORD, "it", white_it)?,
            black_initial_secs: minutes_to_secs(Self::RECORD, "it", black_it)?,
            white_increment_secs: parse_value(Self::RECORD, "i", white_inc)?,
            black_increment_secs: parse_value(Self::RECORD, "i", black_inc)?,
            partner_game: (partner != 0).then_some(GameId(partner)),
            white_rating: Rating::parse(white_rt).filter(|_| white_unreg == 0),
            black_rating: Rating::parse(black_rt).filter(|_| black_unreg == 0),
            white_timeseal: white_ts,
            black_timeseal: black_ts,
        })
    }

    /// 服务器未发送 `<g1>` 时（开始研究、`refresh`）由快照合成的占位信息
    pub fn placeholder(snapshot: &BoardSnapshot) -> Self {
        Self {
            game_id: snapshot.game_id,
            private: false,
            category: UNKNOWN_VARIANT.to_string(),
            rated: false,
            white_registered: false,
            black_registered: false,
            white_initial_secs: snapshot.initial_time_secs,
            black_initial_secs: snapshot.initial_time_secs,
            white_increment_secs: snapshot.increment_secs,
            black_increment_secs: snapshot.increment_secs,
            partner_game: None,
            white_rating: None,
            black_rating: None,
            white_timeseal: false,
            black_timeseal: false,
        }
    }
}

// ============================================================================
// <d1> 增量棋盘
// ============================================================================

/// 增量棋盘（`<d1>`），仅描述一步走法
///
/// 示例：`<d1> 7 2 e7e5 e5 1234 178654`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeltaBoard {
    pub game_id: GameId,
    /// 该步之后的已走半回合数
    pub ply: u32,
    /// Warren Smith 记法，例如 `e2e4`、`e4d5p`、`e1g1c`、`e7e8Q`
    pub move_smith: String,
    pub move_san: String,
    /// 该步耗时（毫秒）
    pub taken_ms: u32,
    /// 走子方剩余时间（毫秒）
    pub remaining_ms: i64,
}

impl DeltaBoard {
    const RECORD: &'static str = "delta";

    pub fn parse_line(line: &str) -> Result<Self, ParseError> {
        let rest = strip_tag(line, crate::constants::DELTA_BOARD_PREFIX, Self::RECORD)?;
        let tokens: Vec<&str> = rest.split_whitespace().collect();
        let at = |idx: usize, name: &'static str| {
            tokens.get(idx).copied().ok_or(ParseError::MissingField {
                record: Self::RECORD,
                field: name,
            })
        };

        Ok(Self {
            game_id: GameId(parse_value(Self::RECORD, "game", at(0, "game")?)?),
            ply: parse_value(Self::RECORD, "ply", at(1, "ply")?)?,
            move_smith: at(2, "smith")?.to_string(),
            move_san: at(3, "san")?.to_string(),
            taken_ms: parse_value(Self::RECORD, "taken", at(4, "taken")?)?,
            remaining_ms: parse_value(Self::RECORD, "remaining", at(5, "remaining")?)?,
        })
    }
}

// ============================================================================
// 待定提议
// ============================================================================

/// 对局内的提议种类
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum OfferKind {
    Draw,
    Abort,
    Adjourn,
    Takeback,
}

impl OfferKind {
    /// 从服务器使用的提议名解析
    pub fn from_name(name: &str) -> Option<OfferKind> {
        match name {
            "draw" => Some(OfferKind::Draw),
            "abort" => Some(OfferKind::Abort),
            "adjourn" => Some(OfferKind::Adjourn),
            "takeback" => Some(OfferKind::Takeback),
            _ => None,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            OfferKind::Draw => "draw",
            OfferKind::Abort => "abort",
            OfferKind::Adjourn => "adjourn",
            OfferKind::Takeback => "takeback",
        }
    }
}

impl fmt::Display for OfferKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// `<pf>`/`<pt>` 中的提议内容
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum PendingOffer {
    Draw,
    Abort,
    Adjourn,
    /// 悔棋的半回合数
    Takeback(u32),
    /// 对局外的提议（match、partner、switch 等），保留原始类型与参数
    Other { kind: String, params: String },
}

impl PendingOffer {
    fn parse(kind: &str, params: &str) -> Result<Self, ParseError> {
        Ok(match kind {
            "draw" => PendingOffer::Draw,
            "abort" => PendingOffer::Abort,
            "adjourn" => PendingOffer::Adjourn,
            "takeback" => PendingOffer::Takeback(parse_value("pending", "p", params.trim())?),
            _ => PendingOffer::Other {
                kind: kind.to_string(),
                params: params.to_string(),
            },
        })
    }

    /// 对局内提议的种类
    pub fn kind(&self) -> Option<OfferKind> {
        match self {
            PendingOffer::Draw => Some(OfferKind::Draw),
            PendingOffer::Abort => Some(OfferKind::Abort),
            PendingOffer::Adjourn => Some(OfferKind::Adjourn),
            PendingOffer::Takeback(_) => Some(OfferKind::Takeback),
            PendingOffer::Other { .. } => None,
        }
    }
}

/// 一条带编号的提议（`<pf>` 发给用户，`<pt>` 由用户发出）
///
/// 示例：`<pf> 12 w=Einstein t=draw p=#`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OfferRecord {
    /// 提议是否发给用户
    pub to_user: bool,
    pub index: OfferIndex,
    /// 对方的名字
    pub opponent: String,
    pub offer: PendingOffer,
}

impl OfferRecord {
    const RECORD: &'static str = "pending";

    pub fn parse_line(line: &str, to_user: bool) -> Result<Self, ParseError> {
        let prefix = if to_user {
            crate::constants::PENDING_FROM_PREFIX
        } else {
            crate::constants::PENDING_TO_PREFIX
        };
        let rest = strip_tag(line, prefix, Self::RECORD)?;
        let (index_raw, rest) = rest
            .split_once(' ')
            .ok_or(ParseError::MissingField {
                record: Self::RECORD,
                field: "w",
            })?;
        let index = OfferIndex(parse_value(Self::RECORD, "index", index_raw)?);

        // p= 是最后一个字段，其值可能包含空格
        let (head, params) = match rest.split_once(" p=") {
            Some((head, params)) => (head, params),
            None => (rest, ""),
        };
        let fields = key_values(head.split_whitespace());
        let opponent = fields.get("w").ok_or(ParseError::MissingField {
            record: Self::RECORD,
            field: "w",
        })?;
        let kind = fields.get("t").ok_or(ParseError::MissingField {
            record: Self::RECORD,
            field: "t",
        })?;

        Ok(Self {
            to_user,
            index,
            opponent: opponent.to_string(),
            offer: PendingOffer::parse(kind, params)?,
        })
    }
}

// ============================================================================
// <s> 求战信息
// ============================================================================

/// 求战信息（`<s>`）
///
/// 示例：`<s> 8 w=visar ti=02 rt=2194  t=4 i=0 r=r tp=blitz c=? rr=0-9999 a=t f=f`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SeekInfo {
    pub index: SeekIndex,
    pub handle: String,
    /// 头衔位图
    pub titles: u32,
    pub rating: Option<Rating>,
    pub time_minutes: u32,
    pub increment_secs: u32,
    pub rated: bool,
    /// 对局类别
    pub category: String,
    /// 求战者希望执的颜色，`None` 表示不限
    pub color: Option<Side>,
    pub min_rating: u32,
    pub max_rating: u32,
    /// 是否自动接受
    pub automatic: bool,
    /// 是否使用公式过滤
    pub formula: bool,
}

impl SeekInfo {
    const RECORD: &'static str = "seek";

    /// 未注册用户
    pub const UNREGISTERED: u32 = 0x01;
    /// 计算机
    pub const COMPUTER: u32 = 0x02;
    pub const GM: u32 = 0x04;
    pub const IM: u32 = 0x08;
    pub const FM: u32 = 0x10;
    pub const WGM: u32 = 0x20;
    pub const WIM: u32 = 0x40;
    pub const WFM: u32 = 0x80;

    pub fn parse_line(line: &str) -> Result<Self, ParseError> {
        let rest = strip_tag(line, crate::constants::SEEK_ADDED_PREFIX, Self::RECORD)?;
        let mut tokens = rest.split_whitespace();
        let index_raw = tokens.next().ok_or(ParseError::MissingField {
            record: Self::RECORD,
            field: "index",
        })?;
        let fields = key_values(tokens);
        let get = |key: &'static str| {
            fields.get(key).copied().ok_or(ParseError::MissingField {
                record: Self::RECORD,
                field: key,
            })
        };

        let titles_raw = get("ti")?;
        let titles = u32::from_str_radix(titles_raw, 16)
            .map_err(|_| ParseError::invalid(Self::RECORD, "ti", titles_raw))?;
        let color = match get("c")? {
            "W" => Some(Side::White),
            "B" => Some(Side::Black),
            "?" => None,
            other => return Err(ParseError::invalid(Self::RECORD, "c", other)),
        };
        let range = get("rr")?;
        let (min_rating, max_rating) = range
            .split_once('-')
            .ok_or_else(|| ParseError::invalid(Self::RECORD, "rr", range))?;

        Ok(Self {
            index: SeekIndex(parse_value(Self::RECORD, "index", index_raw)?),
            handle: get("w")?.to_string(),
            titles,
            rating: Rating::parse(get("rt")?),
            time_minutes: parse_value(Self::RECORD, "t", get("t")?)?,
            increment_secs: parse_value(Self::RECORD, "i", get("i")?)?,
            rated: get("r")? == "r",
            category: get("tp")?.to_string(),
            color,
            min_rating: parse_value(Self::RECORD, "rr", min_rating)?,
            max_rating: parse_value(Self::RECORD, "rr", max_rating)?,
            automatic: get("a")? == "t",
            formula: get("f")? == "t",
        })
    }

    pub fn is_registered(&self) -> bool {
        self.titles & Self::UNREGISTERED == 0
    }

    pub fn is_computer(&self) -> bool {
        self.titles & Self::COMPUTER != 0
    }

    /// 头衔文本，例如 `(GM)(C)`
    pub fn title_text(&self) -> String {
        [
            (Self::COMPUTER, "(C)"),
            (Self::GM, "(GM)"),
            (Self::IM, "(IM)"),
            (Self::FM, "(FM)"),
            (Self::WGM, "(WGM)"),
            (Self::WIM, "(WIM)"),
            (Self::WFM, "(WFM)"),
        ]
        .iter()
        .filter(|(bit, _)| self.titles & bit != 0)
        .map(|(_, text)| *text)
        .collect()
    }

    /// 是否限制了对手等级分
    pub fn is_rating_limited(&self) -> bool {
        self.min_rating > 0 || self.max_rating < 9999
    }
}

// ============================================================================
// 纯文本通知的载荷
// ============================================================================

/// 非法走法的原因
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum IllegalMoveReason {
    Illegal,
    NotYourTurn,
    Other,
}

/// 对局结果
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum GameOutcome {
    WhiteWins,
    BlackWins,
    Draw,
    /// 未决（中止、封盘或连接断开）
    Unknown,
}

impl GameOutcome {
    pub fn from_result(result: &str) -> GameOutcome {
        match result.trim() {
            "1-0" => GameOutcome::WhiteWins,
            "0-1" => GameOutcome::BlackWins,
            "1/2-1/2" => GameOutcome::Draw,
            _ => GameOutcome::Unknown,
        }
    }
}

/// 对局结束通知
///
/// 示例：`{Game 6 (Strakh vs. Svag) Strakh forfeits on time} 0-1`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GameEnd {
    pub game_id: GameId,
    pub white_name: String,
    pub black_name: String,
    pub reason: String,
    pub outcome: GameOutcome,
}

/// 服务器接口变量（ivar）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Ivar {
    GameInfo,
    SeekInfo,
    PendInfo,
    CompressMove,
    MoveCase,
    Lock,
    ShowOwnSeek,
    Ms,
    SmartMove,
    Premove,
}

impl Ivar {
    pub fn name(&self) -> &'static str {
        match self {
            Ivar::GameInfo => "gameinfo",
            Ivar::SeekInfo => "seekinfo",
            Ivar::PendInfo => "pendinfo",
            Ivar::CompressMove => "compressmove",
            Ivar::MoveCase => "movecase",
            Ivar::Lock => "lock",
            Ivar::ShowOwnSeek => "showownseek",
            Ivar::Ms => "ms",
            Ivar::SmartMove => "smartmove",
            Ivar::Premove => "premove",
        }
    }
}

impl FromStr for Ivar {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s {
            "gameinfo" => Ivar::GameInfo,
            "seekinfo" => Ivar::SeekInfo,
            "pendinfo" => Ivar::PendInfo,
            "compressmove" => Ivar::CompressMove,
            "movecase" => Ivar::MoveCase,
            "lock" => Ivar::Lock,
            "showownseek" => Ivar::ShowOwnSeek,
            "ms" => Ivar::Ms,
            "smartmove" => Ivar::SmartMove,
            "premove" => Ivar::Premove,
            other => return Err(ParseError::invalid("ivar", "name", other)),
        })
    }
}

impl fmt::Display for Ivar {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// 私聊消息
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub sender: String,
    /// 发送者头衔，例如 `(GM)(C)`
    pub titles: String,
    pub text: String,
}

// ============================================================================
// 解析辅助
// ============================================================================

fn strip_tag<'a>(line: &'a str, tag: &str, record: &'static str) -> Result<&'a str, ParseError> {
    line.trim()
        .strip_prefix(tag)
        .map(str::trim_start)
        .ok_or_else(|| ParseError::invalid(record, "prefix", line))
}

pub(crate) fn parse_value<T: FromStr>(
    record: &'static str,
    field: &'static str,
    raw: &str,
) -> Result<T, ParseError> {
    raw.parse().map_err(|_| ParseError::invalid(record, field, raw))
}

fn minutes_to_secs(record: &'static str, field: &'static str, raw: &str) -> Result<u32, ParseError> {
    parse_value::<u32>(record, field, raw)?
        .checked_mul(60)
        .ok_or_else(|| ParseError::invalid(record, field, raw))
}

fn key_values<'a>(tokens: impl Iterator<Item = &'a str>) -> HashMap<&'a str, &'a str> {
    tokens.filter_map(|token| token.split_once('=')).collect()
}

fn pair<'a>(
    record: &'static str,
    field: &'static str,
    raw: &'a str,
) -> Result<(&'a str, &'a str), ParseError> {
    raw.split_once(',')
        .ok_or_else(|| ParseError::invalid(record, field, raw))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_game_info() {
        let info =
            GameInfo::parse_line("<g1> 1 p=0 t=blitz r=1 u=0,1 it=5,3 i=8,0 pt=0 rt=1586E,2100 ts=1,0")
                .unwrap();

        assert_eq!(info.game_id, GameId(1));
        assert_eq!(info.category, "blitz");
        assert!(info.rated);
        assert!(info.white_registered);
        assert!(!info.black_registered);
        assert_eq!(info.white_initial_secs, 300);
        assert_eq!(info.black_initial_secs, 180);
        assert_eq!(info.white_increment_secs, 8);
        assert_eq!(info.partner_game, None);
        assert_eq!(
            info.white_rating,
            Some(Rating {
                value: 1586,
                mark: RatingMark::Estimated
            })
        );
        // 未注册用户没有等级分
        assert_eq!(info.black_rating, None);
        assert!(info.white_timeseal);
    }

    #[test]
    fn test_parse_game_info_missing_field() {
        let err = GameInfo::parse_line("<g1> 1 p=0 t=blitz r=1").unwrap_err();
        assert!(matches!(err, ParseError::MissingField { field: "u", .. }));
    }

    #[test]
    fn test_parse_game_info_rejects_overflowing_time() {
        let err = GameInfo::parse_line("<g1> 1 p=0 t=blitz r=1 u=0,0 it=99999999,3 i=8,0 rt=0,0")
            .unwrap_err();
        assert!(matches!(err, ParseError::InvalidField { field: "it", .. }));
    }

    #[test]
    fn test_parse_delta_board() {
        let delta = DeltaBoard::parse_line("<d1> 7 2 e7e5 e5 1234 -500").unwrap();
        assert_eq!(delta.game_id, GameId(7));
        assert_eq!(delta.ply, 2);
        assert_eq!(delta.move_smith, "e7e5");
        assert_eq!(delta.taken_ms, 1234);
        assert_eq!(delta.remaining_ms, -500);
    }

    #[test]
    fn test_parse_pending_offers() {
        let draw = OfferRecord::parse_line("<pf> 12 w=Einstein t=draw p=#", true).unwrap();
        assert_eq!(draw.index, OfferIndex(12));
        assert_eq!(draw.opponent, "Einstein");
        assert_eq!(draw.offer, PendingOffer::Draw);
        assert_eq!(draw.offer.kind(), Some(OfferKind::Draw));

        let takeback = OfferRecord::parse_line("<pt> 13 w=Newton t=takeback p=2", false).unwrap();
        assert!(!takeback.to_user);
        assert_eq!(takeback.offer, PendingOffer::Takeback(2));

        let m = OfferRecord::parse_line(
            "<pf> 14 w=Friend t=match p=Friend (----) [white] Me (1500) unrated blitz 2 12",
            true,
        )
        .unwrap();
        assert_eq!(m.offer.kind(), None);
        match m.offer {
            PendingOffer::Other { kind, params } => {
                assert_eq!(kind, "match");
                assert!(params.ends_with("blitz 2 12"));
            }
            _ => panic!("Expected other offer"),
        }
    }

    #[test]
    fn test_parse_seek() {
        let seek =
            SeekInfo::parse_line("<s> 8 w=visar ti=06 rt=2194P  t=4 i=0 r=r tp=blitz c=W rr=0-9999 a=t f=f")
                .unwrap();
        assert_eq!(seek.index, SeekIndex(8));
        assert_eq!(seek.handle, "visar");
        assert!(seek.is_computer());
        assert!(seek.is_registered());
        assert_eq!(seek.title_text(), "(C)(GM)");
        assert_eq!(seek.rating.map(|r| r.mark), Some(RatingMark::Provisional));
        assert_eq!(seek.color, Some(Side::White));
        assert!(seek.rated);
        assert!(!seek.is_rating_limited());
    }

    #[test]
    fn test_rating_parse() {
        assert_eq!(Rating::parse("0"), None);
        assert_eq!(Rating::parse("----"), None);
        assert_eq!(Rating::parse("1900").map(|r| r.value), Some(1900));
    }

    #[test]
    fn test_outcome_and_ivar() {
        assert_eq!(GameOutcome::from_result("1/2-1/2"), GameOutcome::Draw);
        assert_eq!(GameOutcome::from_result("*"), GameOutcome::Unknown);
        assert_eq!("seekinfo".parse::<Ivar>().unwrap(), Ivar::SeekInfo);
        assert!("bogus".parse::<Ivar>().is_err());
    }
}
