/// 경매 상태 머신
/// scheduled -> live -> closing -> settled (+ failed, cancelled)
// region:    --- Imports
use super::model::Item;
use crate::error::{RejectCode, Rejection};
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

// endregion: --- Imports

// region:    --- Auction Status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AuctionStatus {
    Scheduled,
    Live,
    Closing,
    Settled,
    Failed,
    Cancelled,
}

impl AuctionStatus {
    pub const OPEN: [AuctionStatus; 2] = [AuctionStatus::Live, AuctionStatus::Closing];

    pub fn as_str(&self) -> &'static str {
        match self {
            AuctionStatus::Scheduled => "scheduled",
            AuctionStatus::Live => "live",
            AuctionStatus::Closing => "closing",
            AuctionStatus::Settled => "settled",
            AuctionStatus::Failed => "failed",
            AuctionStatus::Cancelled => "cancelled",
        }
    }

    /// 입찰을 받을 수 있는 상태
    pub fn is_open(&self) -> bool {
        matches!(self, AuctionStatus::Live | AuctionStatus::Closing)
    }

    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            AuctionStatus::Settled | AuctionStatus::Failed | AuctionStatus::Cancelled
        )
    }

    /// 허용된 상태 전이
    pub fn can_transition_to(&self, next: AuctionStatus) -> bool {
        use AuctionStatus::*;
        if self.is_terminal() {
            return false;
        }
        matches!(
            (self, next),
            (Scheduled, Live)
                | (Scheduled, Cancelled)
                | (Live, Closing)
                | (Live, Settled)
                | (Live, Failed)
                | (Live, Cancelled)
                | (Closing, Settled)
                | (Closing, Failed)
                | (Closing, Cancelled)
        )
    }

    pub fn ensure_transition(&self, next: AuctionStatus) -> Result<(), Rejection> {
        if self.is_terminal() {
            return Err(Rejection::new(
                RejectCode::InvalidTransition,
                format!("المزاد منتهٍ بالفعل (الحالة {})", self),
            ));
        }
        if self.can_transition_to(next) {
            Ok(())
        } else {
            Err(Rejection::new(
                RejectCode::InvalidTransition,
                format!("لا يمكن نقل المزاد من حالة {} إلى {}", self, next),
            ))
        }
    }
}

impl fmt::Display for AuctionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AuctionStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "scheduled" | "pending" => Ok(AuctionStatus::Scheduled),
            "live" | "active" => Ok(AuctionStatus::Live),
            "closing" => Ok(AuctionStatus::Closing),
            "settled" | "ended" | "completed" => Ok(AuctionStatus::Settled),
            "failed" => Ok(AuctionStatus::Failed),
            "cancelled" => Ok(AuctionStatus::Cancelled),
            other => Err(format!("unknown auction status: {}", other)),
        }
    }
}
// endregion: --- Auction Status

// region:    --- Bidding Window
/// 입찰 가능 여부 검증 (상태 + 시간)
pub fn ensure_open_for_bids(item: &Item, now: DateTime<Utc>) -> Result<(), Rejection> {
    match item.status {
        AuctionStatus::Scheduled => Err(Rejection::new(
            RejectCode::NotStarted,
            "لم يبدأ المزاد بعد",
        )),
        AuctionStatus::Settled | AuctionStatus::Failed => Err(Rejection::new(
            RejectCode::AlreadyEnded,
            "انتهى وقت المزاد",
        )),
        AuctionStatus::Cancelled => Err(Rejection::new(
            RejectCode::InvalidStatus,
            "المزاد غير نشط حالياً",
        )),
        AuctionStatus::Live | AuctionStatus::Closing => {
            if now < item.start_time {
                Err(Rejection::new(RejectCode::NotStarted, "لم يبدأ المزاد بعد"))
            } else if now > item.effective_end() {
                Err(Rejection::new(RejectCode::AlreadyEnded, "انتهى وقت المزاد"))
            } else {
                Ok(())
            }
        }
    }
}

/// 남은 시간(초), 열려있지 않으면 0
pub fn time_remaining_secs(item: &Item, now: DateTime<Utc>) -> i64 {
    if !item.status.is_open() {
        return 0;
    }
    (item.effective_end() - now).num_seconds().max(0)
}

/// 종료 임박 여부
pub fn is_ending_soon(item: &Item, now: DateTime<Utc>, threshold: Duration) -> bool {
    let remaining = item.effective_end() - now;
    item.status.is_open() && remaining > Duration::zero() && remaining <= threshold
}
// endregion: --- Bidding Window

// region:    --- Time Driven Transitions
/// 시간 경과에 따른 다음 상태
pub fn due_transition(
    item: &Item,
    now: DateTime<Utc>,
    closing_window: Duration,
) -> Option<AuctionStatus> {
    let end = item.effective_end();
    match item.status {
        AuctionStatus::Scheduled if now >= item.start_time => Some(AuctionStatus::Live),
        AuctionStatus::Live | AuctionStatus::Closing if now > end => Some(outcome(item)),
        AuctionStatus::Live if end - now <= closing_window => Some(AuctionStatus::Closing),
        _ => None,
    }
}

/// 종료 시 낙찰/유찰 판정: 입찰이 있고 최저 낙찰가 이상이면 낙찰
pub fn outcome(item: &Item) -> AuctionStatus {
    if item.bid_count > 0 && item.current_price >= item.reserve_price {
        AuctionStatus::Settled
    } else {
        AuctionStatus::Failed
    }
}
// endregion: --- Time Driven Transitions
