/// 경매 유형 및 시장 시간대(phase) 계산
/// 라이브 16:00-19:00, 인스턴트 19:00-22:00, 사일런트 22:00-16:00 (시장 현지 시간)
// region:    --- Imports
use chrono::{DateTime, FixedOffset, NaiveDateTime, Timelike, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

// endregion: --- Imports

// region:    --- Auction Type
/// 경매 유형
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AuctionType {
    #[serde(alias = "live_auction")]
    Live,
    #[serde(alias = "live_instant")]
    Instant,
    #[serde(alias = "silent_instant")]
    Silent,
}

impl AuctionType {
    pub fn as_str(&self) -> &'static str {
        match self {
            AuctionType::Live => "live",
            AuctionType::Instant => "instant",
            AuctionType::Silent => "silent",
        }
    }

    /// 자동 입찰 대상 여부 (사일런트는 비공개 입찰이라 제외)
    pub fn supports_auto_bid(&self) -> bool {
        !matches!(self, AuctionType::Silent)
    }
}

impl fmt::Display for AuctionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AuctionType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "live" | "live_auction" => Ok(AuctionType::Live),
            "instant" | "live_instant" => Ok(AuctionType::Instant),
            "silent" | "silent_instant" => Ok(AuctionType::Silent),
            other => Err(format!("unknown auction type: {}", other)),
        }
    }
}
// endregion: --- Auction Type

// region:    --- Market Phase
/// 하루 중 시장 시간대
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MarketPhase {
    Live,
    Instant,
    Silent,
}

impl MarketPhase {
    /// 현지 시각(시)으로 시간대 결정
    pub fn at_hour(hour: u32) -> Self {
        match hour {
            16..=18 => MarketPhase::Live,
            19..=21 => MarketPhase::Instant,
            _ => MarketPhase::Silent,
        }
    }

    /// 해당 시간대에 상품이 가져야 할 경매 유형
    /// 라이브 승인을 받지 않은 상품은 라이브 시간대에도 인스턴트로 진행
    pub fn auction_type_for(&self, approved_for_live: bool) -> AuctionType {
        match self {
            MarketPhase::Live if approved_for_live => AuctionType::Live,
            MarketPhase::Live | MarketPhase::Instant => AuctionType::Instant,
            MarketPhase::Silent => AuctionType::Silent,
        }
    }
}
// endregion: --- Market Phase

// region:    --- Market Clock
/// 시장 현지 시간 기준 시계 (기본: UTC+3, 리야드)
#[derive(Debug, Clone, Copy)]
pub struct MarketClock {
    offset: FixedOffset,
}

impl MarketClock {
    /// 범위를 벗어난 오프셋(±24시간)은 None
    pub fn from_offset_hours(hours: i32) -> Option<Self> {
        FixedOffset::east_opt(hours * 3600).map(|offset| Self { offset })
    }

    pub fn local_time(&self, now: DateTime<Utc>) -> NaiveDateTime {
        now.with_timezone(&self.offset).naive_local()
    }

    pub fn phase_at(&self, now: DateTime<Utc>) -> MarketPhase {
        MarketPhase::at_hour(now.with_timezone(&self.offset).hour())
    }
}
// endregion: --- Market Clock
