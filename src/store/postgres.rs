/// Postgres 저장소
// region:    --- Imports
use super::{AuctionStore, CommitOutcome, ItemCommit, ListedItem, StoreError, StoreResult};
use crate::auction::events::AuctionEvent;
use crate::auction::lifecycle::AuctionStatus;
use crate::auction::model::{
    AutoBid, Bid, BidSource, Item, ItemFilter, MembershipRequest, NewAutoBid, NewItem,
    NewMembershipRequest, NewNotification, Notification, SaleResult, Settlement,
};
use crate::database::DatabaseManager;
use crate::event_store::Event;
use crate::query::queries;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::types::Json;
use sqlx::{FromRow, PgConnection};
use std::sync::Arc;
use tracing::{debug, warn};

// endregion: --- Imports

// region:    --- Rows
#[derive(FromRow)]
struct ItemRow {
    id: i64,
    title: String,
    description: String,
    category: String,
    subcategory: Option<String>,
    seller_id: Option<i64>,
    auction_type: String,
    status: String,
    start_price: i64,
    current_price: i64,
    min_price: Option<i64>,
    max_price: Option<i64>,
    reserve_price: i64,
    leading_bidder_id: Option<i64>,
    bid_count: i64,
    images: Json<Vec<String>>,
    auction_result: Option<String>,
    approved_for_live: bool,
    start_time: DateTime<Utc>,
    end_time: DateTime<Utc>,
    extended_until: Option<DateTime<Utc>>,
    last_bid_at: Option<DateTime<Utc>>,
    version: i64,
    created_at: DateTime<Utc>,
}

impl TryFrom<ItemRow> for Item {
    type Error = StoreError;

    fn try_from(row: ItemRow) -> Result<Self, Self::Error> {
        let auction_result = match row.auction_result.as_deref() {
            Some(raw) => Some(SaleResult::parse(raw).ok_or_else(|| {
                StoreError::Corrupt(format!("item {}: auction_result {}", row.id, raw))
            })?),
            None => None,
        };
        Ok(Item {
            id: row.id,
            title: row.title,
            description: row.description,
            category: row.category,
            subcategory: row.subcategory,
            seller_id: row.seller_id,
            auction_type: row.auction_type.parse().map_err(StoreError::Corrupt)?,
            status: row.status.parse().map_err(StoreError::Corrupt)?,
            start_price: row.start_price,
            current_price: row.current_price,
            min_price: row.min_price,
            max_price: row.max_price,
            reserve_price: row.reserve_price,
            leading_bidder_id: row.leading_bidder_id,
            bid_count: row.bid_count,
            images: row.images.0,
            auction_result,
            approved_for_live: row.approved_for_live,
            start_time: row.start_time,
            end_time: row.end_time,
            extended_until: row.extended_until,
            last_bid_at: row.last_bid_at,
            version: row.version,
            created_at: row.created_at,
        })
    }
}

#[derive(FromRow)]
struct BidRow {
    id: i64,
    item_id: i64,
    bidder_id: Option<i64>,
    bid_amount: i64,
    increment: i64,
    auction_type_at_bid: String,
    source: String,
    created_at: DateTime<Utc>,
}

impl TryFrom<BidRow> for Bid {
    type Error = StoreError;

    fn try_from(row: BidRow) -> Result<Self, Self::Error> {
        let source = BidSource::parse(&row.source)
            .ok_or_else(|| StoreError::Corrupt(format!("bid {}: source {}", row.id, row.source)))?;
        Ok(Bid {
            id: row.id,
            item_id: row.item_id,
            bidder_id: row.bidder_id,
            bid_amount: row.bid_amount,
            increment: row.increment,
            auction_type_at_bid: row.auction_type_at_bid.parse().map_err(StoreError::Corrupt)?,
            source,
            created_at: row.created_at,
        })
    }
}

fn items_from_rows(rows: Vec<ItemRow>) -> StoreResult<Vec<Item>> {
    rows.into_iter().map(Item::try_from).collect()
}
// endregion: --- Rows

// region:    --- Transactional Writes
async fn append_event(
    conn: &mut PgConnection,
    item_id: i64,
    version: i64,
    event: &AuctionEvent,
) -> StoreResult<Event> {
    let event = sqlx::query_as::<_, Event>(queries::INSERT_EVENT)
        .bind(item_id)
        .bind(event.event_type())
        .bind(serde_json::to_value(event)?)
        .bind(event.timestamp())
        .bind(version)
        .fetch_one(conn)
        .await?;
    Ok(event)
}

async fn insert_item_tx(
    conn: &mut PgConnection,
    new_item: NewItem,
    status: AuctionStatus,
    now: DateTime<Utc>,
) -> StoreResult<ListedItem> {
    let row = sqlx::query_as::<_, ItemRow>(queries::INSERT_ITEM)
        .bind(&new_item.title)
        .bind(&new_item.description)
        .bind(&new_item.category)
        .bind(&new_item.subcategory)
        .bind(new_item.seller_id)
        .bind(new_item.auction_type.as_str())
        .bind(status.as_str())
        .bind(new_item.start_price)
        .bind(new_item.min_price)
        .bind(new_item.max_price)
        .bind(new_item.reserve_price)
        .bind(Json(&new_item.images))
        .bind(new_item.approved_for_live)
        .bind(new_item.start_time)
        .bind(new_item.end_time)
        .bind(now)
        .fetch_one(&mut *conn)
        .await?;
    let item = Item::try_from(row)?;

    let listed = AuctionEvent::ItemListed {
        item_id: item.id,
        seller_id: item.seller_id,
        auction_type: item.auction_type,
        status,
        start_price: item.start_price,
        timestamp: now,
    };
    let event = append_event(conn, item.id, item.version, &listed).await?;
    Ok(ListedItem { item, event })
}

async fn apply_commit(
    conn: &mut PgConnection,
    commit: ItemCommit,
) -> StoreResult<Option<CommitOutcome>> {
    let patch = &commit.patch;
    let row = sqlx::query_as::<_, ItemRow>(queries::APPLY_ITEM_PATCH)
        .bind(commit.item_id)
        .bind(commit.expected_version)
        .bind(patch.status.map(|s| s.as_str()))
        .bind(patch.auction_type.map(|t| t.as_str()))
        .bind(patch.current_price)
        .bind(patch.start_price)
        .bind(patch.leading_bidder_id.flatten())
        .bind(patch.extended_until)
        .bind(patch.last_bid_at)
        .bind(patch.auction_result.map(|r| r.as_str()))
        .bind(patch.record_bid)
        .bind(patch.leading_bidder_id.is_some())
        .fetch_optional(&mut *conn)
        .await?;

    // 버전 충돌: 다른 요청이 먼저 커밋함
    let Some(row) = row else {
        debug!(
            "{:<12} --> 버전 충돌 item={} expected={}",
            "PgStore", commit.item_id, commit.expected_version
        );
        return Ok(None);
    };
    let item = Item::try_from(row)?;

    let bid = match &commit.bid {
        Some(new_bid) => {
            let row = sqlx::query_as::<_, BidRow>(queries::INSERT_BID)
                .bind(item.id)
                .bind(new_bid.bidder_id)
                .bind(new_bid.bid_amount)
                .bind(new_bid.increment)
                .bind(new_bid.auction_type_at_bid.as_str())
                .bind(new_bid.source.as_str())
                .bind(new_bid.created_at)
                .fetch_one(&mut *conn)
                .await?;
            Some(Bid::try_from(row)?)
        }
        None => None,
    };

    let event = append_event(&mut *conn, item.id, item.version, &commit.event).await?;

    if let Some(settlement) = &commit.settlement {
        sqlx::query(queries::INSERT_SETTLEMENT)
            .bind(item.id)
            .bind(settlement.buyer_id)
            .bind(settlement.final_price)
            .bind(settlement.platform_fee)
            .bind(settlement.platform_fee_vat)
            .bind(settlement.net_amount)
            .bind(event.timestamp)
            .execute(&mut *conn)
            .await?;
    }

    Ok(Some(CommitOutcome { item, bid, event }))
}
// endregion: --- Transactional Writes

// region:    --- Pg Store
pub struct PgStore {
    db: Arc<DatabaseManager>,
}

impl PgStore {
    pub fn new(db: Arc<DatabaseManager>) -> Self {
        Self { db }
    }
}

#[async_trait]
impl AuctionStore for PgStore {
    async fn insert_item(
        &self,
        item: NewItem,
        status: AuctionStatus,
        now: DateTime<Utc>,
    ) -> StoreResult<ListedItem> {
        self.db
            .transaction(move |tx| {
                Box::pin(async move { insert_item_tx(&mut **tx, item, status, now).await })
            })
            .await
    }

    async fn get_item(&self, item_id: i64) -> StoreResult<Option<Item>> {
        let row = sqlx::query_as::<_, ItemRow>(queries::GET_ITEM)
            .bind(item_id)
            .fetch_optional(self.db.pool())
            .await?;
        row.map(Item::try_from).transpose()
    }

    async fn list_items(&self, filter: &ItemFilter) -> StoreResult<Vec<Item>> {
        let rows = sqlx::query_as::<_, ItemRow>(queries::LIST_ITEMS)
            .bind(filter.id)
            .bind(filter.category.as_deref())
            .bind(filter.subcategory.as_deref())
            .fetch_all(self.db.pool())
            .await?;
        items_from_rows(rows)
    }

    async fn items_in_status(&self, statuses: &[AuctionStatus]) -> StoreResult<Vec<Item>> {
        let statuses: Vec<String> = statuses.iter().map(|s| s.as_str().to_string()).collect();
        let rows = sqlx::query_as::<_, ItemRow>(queries::ITEMS_IN_STATUS)
            .bind(statuses)
            .fetch_all(self.db.pool())
            .await?;

        // 스케줄러 후보 조회: 읽을 수 없는 행은 건너뛴다
        Ok(rows
            .into_iter()
            .filter_map(|row| {
                let id = row.id;
                Item::try_from(row)
                    .map_err(|e| warn!("{:<12} --> item={} 건너뜀: {}", "PgStore", id, e))
                    .ok()
            })
            .collect())
    }

    async fn commit(&self, commit: ItemCommit) -> StoreResult<Option<CommitOutcome>> {
        self.db
            .transaction(move |tx| Box::pin(async move { apply_commit(&mut **tx, commit).await }))
            .await
    }

    async fn list_bids(&self, item_id: i64) -> StoreResult<Vec<Bid>> {
        let rows = sqlx::query_as::<_, BidRow>(queries::GET_ITEM_BIDS)
            .bind(item_id)
            .fetch_all(self.db.pool())
            .await?;
        rows.into_iter().map(Bid::try_from).collect()
    }

    async fn list_events(&self, item_id: i64) -> StoreResult<Vec<Event>> {
        Ok(sqlx::query_as::<_, Event>(queries::GET_ITEM_EVENTS)
            .bind(item_id)
            .fetch_all(self.db.pool())
            .await?)
    }

    async fn upsert_auto_bid(
        &self,
        auto_bid: NewAutoBid,
        now: DateTime<Utc>,
    ) -> StoreResult<AutoBid> {
        Ok(sqlx::query_as::<_, AutoBid>(queries::UPSERT_AUTO_BID)
            .bind(auto_bid.item_id)
            .bind(auto_bid.user_id)
            .bind(auto_bid.increment)
            .bind(auto_bid.maximum)
            .bind(now)
            .fetch_one(self.db.pool())
            .await?)
    }

    async fn get_auto_bid(&self, item_id: i64, user_id: i64) -> StoreResult<Option<AutoBid>> {
        Ok(sqlx::query_as::<_, AutoBid>(queries::GET_AUTO_BID)
            .bind(item_id)
            .bind(user_id)
            .fetch_optional(self.db.pool())
            .await?)
    }

    async fn delete_auto_bid(&self, item_id: i64, user_id: i64) -> StoreResult<bool> {
        let result = sqlx::query(queries::DELETE_AUTO_BID)
            .bind(item_id)
            .bind(user_id)
            .execute(self.db.pool())
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn active_auto_bids(&self, item_id: i64) -> StoreResult<Vec<AutoBid>> {
        Ok(sqlx::query_as::<_, AutoBid>(queries::ACTIVE_AUTO_BIDS)
            .bind(item_id)
            .fetch_all(self.db.pool())
            .await?)
    }

    async fn get_settlement(&self, item_id: i64) -> StoreResult<Option<Settlement>> {
        Ok(sqlx::query_as::<_, Settlement>(queries::GET_SETTLEMENT)
            .bind(item_id)
            .fetch_optional(self.db.pool())
            .await?)
    }

    async fn insert_notification(&self, notification: NewNotification) -> StoreResult<bool> {
        let result = sqlx::query(queries::INSERT_NOTIFICATION)
            .bind(notification.user_id)
            .bind(notification.item_id)
            .bind(notification.event_id)
            .bind(notification.kind)
            .bind(&notification.message)
            .execute(self.db.pool())
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn list_notifications(&self, user_id: i64) -> StoreResult<Vec<Notification>> {
        Ok(sqlx::query_as::<_, Notification>(queries::GET_USER_NOTIFICATIONS)
            .bind(user_id)
            .fetch_all(self.db.pool())
            .await?)
    }

    async fn insert_membership_request(
        &self,
        request: NewMembershipRequest,
        now: DateTime<Utc>,
    ) -> StoreResult<MembershipRequest> {
        Ok(
            sqlx::query_as::<_, MembershipRequest>(queries::INSERT_MEMBERSHIP_REQUEST)
                .bind(&request.full_name)
                .bind(&request.email)
                .bind(&request.phone)
                .bind(&request.message)
                .bind(now)
                .fetch_one(self.db.pool())
                .await?,
        )
    }
}
// endregion: --- Pg Store
