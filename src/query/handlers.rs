// region:    --- Imports
use crate::auction::lifecycle::{self, AuctionStatus};
use crate::auction::model::{Bid, Item, ItemFilter};
use crate::auction::phase::{AuctionType, MarketClock, MarketPhase};
use crate::error::{AppError, AppResult};
use crate::store::AuctionStore;
use chrono::{DateTime, Duration, NaiveDateTime, Utc};
use serde::Serialize;
use std::collections::HashMap;
use tracing::info;

// endregion: --- Imports

/// 리더보드 크기
pub const LEADERBOARD_SIZE: usize = 10;
/// 종료 임박 기준(초)
pub const ENDING_SOON_SECS: i64 = 300;
/// 번호판 카테고리
pub const PLATE_CATEGORY: &str = "plates";

// region:    --- Read Models
/// 경매 상세 화면
#[derive(Debug, Serialize)]
pub struct AuctionView {
    pub item: Item,
    pub time_remaining_secs: i64,
    pub ending_soon: bool,
    pub highest_bid: Option<i64>,
    pub bid_count: i64,
}

#[derive(Debug, Serialize, PartialEq)]
pub struct LeaderboardEntry {
    pub rank: usize,
    pub bidder_id: i64,
    pub highest_bid: i64,
    pub bid_count: usize,
    pub last_bid_at: DateTime<Utc>,
}

#[derive(Debug, Serialize)]
pub struct PhaseView {
    pub phase: MarketPhase,
    pub auction_type: AuctionType,
    pub local_time: NaiveDateTime,
}
// endregion: --- Read Models

// region:    --- Query Handlers

/// 상품 조회
pub async fn get_item(store: &dyn AuctionStore, item_id: i64) -> AppResult<Item> {
    info!("{:<12} --> 상품 조회 id: {}", "Query", item_id);
    store
        .get_item(item_id)
        .await?
        .ok_or_else(|| AppError::item_not_found(item_id))
}

/// 상품 목록 조회
pub async fn list_items(store: &dyn AuctionStore, filter: &ItemFilter) -> AppResult<Vec<Item>> {
    info!("{:<12} --> 상품 목록 조회 {:?}", "Query", filter);
    Ok(store.list_items(filter).await?)
}

/// 입찰 이력 조회 (최신순)
pub async fn get_bid_history(store: &dyn AuctionStore, item_id: i64) -> AppResult<Vec<Bid>> {
    info!("{:<12} --> 입찰 이력 조회 id: {}", "Query", item_id);
    get_item(store, item_id).await?;
    Ok(store.list_bids(item_id).await?)
}

/// 경매 상세 조회
pub async fn get_auction_view(
    store: &dyn AuctionStore,
    item_id: i64,
    now: DateTime<Utc>,
) -> AppResult<AuctionView> {
    let item = get_item(store, item_id).await?;
    let bids = store.list_bids(item_id).await?;
    Ok(auction_view(item, &bids, now))
}

pub fn auction_view(item: Item, bids: &[Bid], now: DateTime<Utc>) -> AuctionView {
    AuctionView {
        time_remaining_secs: lifecycle::time_remaining_secs(&item, now),
        ending_soon: lifecycle::is_ending_soon(&item, now, Duration::seconds(ENDING_SOON_SECS)),
        highest_bid: bids.iter().map(|b| b.bid_amount).max(),
        bid_count: item.bid_count,
        item,
    }
}

/// 리더보드 조회
pub async fn get_leaderboard(
    store: &dyn AuctionStore,
    item_id: i64,
) -> AppResult<Vec<LeaderboardEntry>> {
    info!("{:<12} --> 리더보드 조회 id: {}", "Query", item_id);
    get_item(store, item_id).await?;
    let bids = store.list_bids(item_id).await?;
    Ok(leaderboard(&bids))
}

/// 입찰자별 최고 입찰가 상위 10명 (동률이면 먼저 도달한 입찰자 우선, 익명 입찰 제외)
pub fn leaderboard(bids: &[Bid]) -> Vec<LeaderboardEntry> {
    // bidder -> (최고가, 최고가 도달 시각, 입찰 수, 마지막 입찰 시각)
    let mut by_bidder: HashMap<i64, (i64, DateTime<Utc>, usize, DateTime<Utc>)> = HashMap::new();
    for bid in bids {
        let Some(bidder_id) = bid.bidder_id else {
            continue;
        };
        let entry = by_bidder
            .entry(bidder_id)
            .or_insert((bid.bid_amount, bid.created_at, 0, bid.created_at));
        if bid.bid_amount > entry.0 || (bid.bid_amount == entry.0 && bid.created_at < entry.1) {
            entry.0 = bid.bid_amount;
            entry.1 = bid.created_at;
        }
        entry.2 += 1;
        entry.3 = entry.3.max(bid.created_at);
    }

    let mut rows: Vec<_> = by_bidder.into_iter().collect();
    rows.sort_by(|(a_id, a), (b_id, b)| {
        b.0.cmp(&a.0)
            .then_with(|| a.1.cmp(&b.1))
            .then_with(|| a_id.cmp(b_id))
    });

    rows.into_iter()
        .take(LEADERBOARD_SIZE)
        .enumerate()
        .map(|(i, (bidder_id, (highest_bid, _, bid_count, last_bid_at)))| LeaderboardEntry {
            rank: i + 1,
            bidder_id,
            highest_bid,
            bid_count,
            last_bid_at,
        })
        .collect()
}

/// 인스턴트 경매 조회 (인스턴트가 아니면 404)
pub async fn get_instant_auction(store: &dyn AuctionStore, item_id: i64) -> AppResult<Item> {
    let item = get_item(store, item_id).await?;
    if item.auction_type != AuctionType::Instant {
        return Err(AppError::NotFound(format!(
            "المزاد {} ليس مزاداً فورياً",
            item_id
        )));
    }
    Ok(item)
}

/// 현재 진행 중인 라이브 경매 (가장 먼저 시작한 것)
pub async fn current_live_item(
    store: &dyn AuctionStore,
    category: Option<&str>,
) -> AppResult<Item> {
    info!("{:<12} --> 라이브 경매 조회 category={:?}", "Query", category);
    let open = store.items_in_status(&AuctionStatus::OPEN).await?;
    pick_live_item(open, category)
        .ok_or_else(|| AppError::NotFound("لا يوجد مزاد مباشر حالياً".to_string()))
}

pub fn pick_live_item(items: Vec<Item>, category: Option<&str>) -> Option<Item> {
    items
        .into_iter()
        .filter(|item| item.status.is_open() && item.auction_type == AuctionType::Live)
        .filter(|item| category.map_or(true, |c| item.category == c))
        .min_by(|a, b| a.start_time.cmp(&b.start_time).then(a.id.cmp(&b.id)))
}

/// 현재 시장 시간대
pub fn market_phase(clock: &MarketClock, now: DateTime<Utc>) -> PhaseView {
    let phase = clock.phase_at(now);
    PhaseView {
        phase,
        auction_type: phase.auction_type_for(true),
        local_time: clock.local_time(now),
    }
}
// endregion: --- Query Handlers
