/// 저장소 추상화
/// 상품에 대한 모든 쓰기는 버전 기반 compare-and-set 커밋 하나로 처리한다.
/// (상품 갱신 + 입찰 기록 + 원장 이벤트 + 정산을 하나의 트랜잭션으로)
// region:    --- Imports
use crate::auction::events::AuctionEvent;
use crate::auction::lifecycle::AuctionStatus;
use crate::auction::model::{
    AutoBid, Bid, BidSource, Item, ItemFilter, MembershipRequest, NewAutoBid, NewItem,
    NewMembershipRequest, NewNotification, NewSettlement, Notification, SaleResult, Settlement,
};
use crate::auction::phase::AuctionType;
use crate::event_store::Event;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;

pub mod memory;
pub mod postgres;

pub use memory::MemoryStore;
pub use postgres::PgStore;

// endregion: --- Imports

// region:    --- Errors
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("corrupt row: {0}")]
    Corrupt(String),
}

pub type StoreResult<T> = Result<T, StoreError>;
// endregion: --- Errors

// region:    --- Commit Model
/// 상품 변경 내용 (None 인 필드는 유지)
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ItemPatch {
    pub status: Option<AuctionStatus>,
    pub auction_type: Option<AuctionType>,
    pub current_price: Option<i64>,
    pub start_price: Option<i64>,
    /// Some(x) 이면 선두 입찰자를 x 로 교체 (익명 입찰이면 None)
    pub leading_bidder_id: Option<Option<i64>>,
    pub extended_until: Option<DateTime<Utc>>,
    pub last_bid_at: Option<DateTime<Utc>>,
    pub auction_result: Option<SaleResult>,
    pub record_bid: bool,
}

impl ItemPatch {
    /// 패치를 메모리 상의 상품에 적용 (버전은 호출자가 관리)
    pub fn apply_to(&self, item: &mut Item) {
        if let Some(status) = self.status {
            item.status = status;
        }
        if let Some(auction_type) = self.auction_type {
            item.auction_type = auction_type;
        }
        if let Some(price) = self.current_price {
            item.current_price = price;
        }
        if let Some(price) = self.start_price {
            item.start_price = price;
        }
        if let Some(leader) = self.leading_bidder_id {
            item.leading_bidder_id = leader;
        }
        if let Some(until) = self.extended_until {
            item.extended_until = Some(until);
        }
        if let Some(at) = self.last_bid_at {
            item.last_bid_at = Some(at);
        }
        if let Some(result) = self.auction_result {
            item.auction_result = Some(result);
        }
        if self.record_bid {
            item.bid_count += 1;
        }
    }
}

/// 커밋에 포함되는 입찰 기록
#[derive(Debug, Clone, PartialEq)]
pub struct NewBid {
    pub bidder_id: Option<i64>,
    pub bid_amount: i64,
    pub increment: i64,
    pub auction_type_at_bid: AuctionType,
    pub source: BidSource,
    pub created_at: DateTime<Utc>,
}

/// 버전 기반 원자적 커밋
#[derive(Debug, Clone)]
pub struct ItemCommit {
    pub item_id: i64,
    pub expected_version: i64,
    pub patch: ItemPatch,
    pub bid: Option<NewBid>,
    pub settlement: Option<NewSettlement>,
    pub event: AuctionEvent,
}

/// 커밋 결과
#[derive(Debug, Clone)]
pub struct CommitOutcome {
    pub item: Item,
    pub bid: Option<Bid>,
    pub event: Event,
}

/// 상품 등록 결과
#[derive(Debug, Clone)]
pub struct ListedItem {
    pub item: Item,
    pub event: Event,
}
// endregion: --- Commit Model

// region:    --- Store Trait
#[async_trait]
pub trait AuctionStore: Send + Sync {
    // 상품
    async fn insert_item(
        &self,
        item: NewItem,
        status: AuctionStatus,
        now: DateTime<Utc>,
    ) -> StoreResult<ListedItem>;
    async fn get_item(&self, item_id: i64) -> StoreResult<Option<Item>>;
    async fn list_items(&self, filter: &ItemFilter) -> StoreResult<Vec<Item>>;
    async fn items_in_status(&self, statuses: &[AuctionStatus]) -> StoreResult<Vec<Item>>;

    /// expected_version 이 일치할 때만 적용. 불일치 시 Ok(None)
    async fn commit(&self, commit: ItemCommit) -> StoreResult<Option<CommitOutcome>>;

    // 입찰 / 원장
    async fn list_bids(&self, item_id: i64) -> StoreResult<Vec<Bid>>;
    async fn list_events(&self, item_id: i64) -> StoreResult<Vec<Event>>;

    // 자동 입찰
    async fn upsert_auto_bid(&self, auto_bid: NewAutoBid, now: DateTime<Utc>)
        -> StoreResult<AutoBid>;
    async fn get_auto_bid(&self, item_id: i64, user_id: i64) -> StoreResult<Option<AutoBid>>;
    async fn delete_auto_bid(&self, item_id: i64, user_id: i64) -> StoreResult<bool>;
    async fn active_auto_bids(&self, item_id: i64) -> StoreResult<Vec<AutoBid>>;

    // 정산
    async fn get_settlement(&self, item_id: i64) -> StoreResult<Option<Settlement>>;

    // 알림 (event_id, user_id, kind 중복 시 false)
    async fn insert_notification(&self, notification: NewNotification) -> StoreResult<bool>;
    async fn list_notifications(&self, user_id: i64) -> StoreResult<Vec<Notification>>;

    // VIP 회원 신청
    async fn insert_membership_request(
        &self,
        request: NewMembershipRequest,
        now: DateTime<Utc>,
    ) -> StoreResult<MembershipRequest>;
}
// endregion: --- Store Trait
