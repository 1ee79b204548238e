use super::lifecycle::AuctionStatus;
use super::model::{BidSource, SaleResult};
use super::phase::AuctionType;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// 원장(ledger)에 기록되는 경매 이벤트
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub enum AuctionEvent {
    // 상품 등록
    ItemListed {
        item_id: i64,
        seller_id: Option<i64>,
        auction_type: AuctionType,
        status: AuctionStatus,
        start_price: i64,
        timestamp: DateTime<Utc>,
    },
    // 경매 시작 (scheduled -> live)
    AuctionOpened {
        item_id: i64,
        timestamp: DateTime<Utc>,
    },
    // 입찰 이벤트
    BidPlaced {
        item_id: i64,
        seller_id: Option<i64>,
        bidder_id: Option<i64>,
        bid_amount: i64,
        previous_price: i64,
        current_price: i64,
        previous_leader_id: Option<i64>,
        took_lead: bool,
        auction_type: AuctionType,
        source: BidSource,
        extended_until: Option<DateTime<Utc>>,
        timestamp: DateTime<Utc>,
    },
    // 마감 구간 진입 (live -> closing)
    AuctionClosing {
        item_id: i64,
        ends_at: DateTime<Utc>,
        timestamp: DateTime<Utc>,
    },
    // 낙찰
    AuctionSettled {
        item_id: i64,
        buyer_id: Option<i64>,
        seller_id: Option<i64>,
        final_price: i64,
        platform_fee: i64,
        #[serde(default)]
        platform_fee_vat: i64,
        timestamp: DateTime<Utc>,
    },
    // 유찰
    AuctionFailed {
        item_id: i64,
        seller_id: Option<i64>,
        highest_price: i64,
        timestamp: DateTime<Utc>,
    },
    // 취소
    AuctionCancelled {
        item_id: i64,
        leading_bidder_id: Option<i64>,
        timestamp: DateTime<Utc>,
    },
    // 시간대 변경에 따른 경매 유형 변경
    PhaseChanged {
        item_id: i64,
        from: AuctionType,
        to: AuctionType,
        opening_price: i64,
        timestamp: DateTime<Utc>,
    },
    // 판매자 판매 확정
    SaleConfirmed {
        item_id: i64,
        result: SaleResult,
        status: AuctionStatus,
        buyer_id: Option<i64>,
        final_price: i64,
        timestamp: DateTime<Utc>,
    },
}

impl AuctionEvent {
    /// 이벤트 저장소의 event_type 컬럼 값
    pub fn event_type(&self) -> &'static str {
        match self {
            AuctionEvent::ItemListed { .. } => "ItemListed",
            AuctionEvent::AuctionOpened { .. } => "AuctionOpened",
            AuctionEvent::BidPlaced { .. } => "BidPlaced",
            AuctionEvent::AuctionClosing { .. } => "AuctionClosing",
            AuctionEvent::AuctionSettled { .. } => "AuctionSettled",
            AuctionEvent::AuctionFailed { .. } => "AuctionFailed",
            AuctionEvent::AuctionCancelled { .. } => "AuctionCancelled",
            AuctionEvent::PhaseChanged { .. } => "PhaseChanged",
            AuctionEvent::SaleConfirmed { .. } => "SaleConfirmed",
        }
    }

    pub fn timestamp(&self) -> DateTime<Utc> {
        match self {
            AuctionEvent::ItemListed { timestamp, .. }
            | AuctionEvent::AuctionOpened { timestamp, .. }
            | AuctionEvent::BidPlaced { timestamp, .. }
            | AuctionEvent::AuctionClosing { timestamp, .. }
            | AuctionEvent::AuctionSettled { timestamp, .. }
            | AuctionEvent::AuctionFailed { timestamp, .. }
            | AuctionEvent::AuctionCancelled { timestamp, .. }
            | AuctionEvent::PhaseChanged { timestamp, .. }
            | AuctionEvent::SaleConfirmed { timestamp, .. } => *timestamp,
        }
    }
}
