/// 메모리 저장소 (데모 모드 및 테스트용)
/// 하나의 뮤텍스로 커밋 전체를 직렬화하므로 Postgres 트랜잭션과 같은 원자성을 가진다.
// region:    --- Imports
use super::{AuctionStore, CommitOutcome, ItemCommit, ListedItem, StoreResult};
use crate::auction::events::AuctionEvent;
use crate::auction::lifecycle::AuctionStatus;
use crate::auction::model::{
    AutoBid, Bid, Item, ItemFilter, MembershipRequest, NewAutoBid, NewItem,
    NewMembershipRequest, NewNotification, Notification, Settlement,
};
use crate::event_store::Event;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::{BTreeMap, HashSet};
use tokio::sync::Mutex;

// endregion: --- Imports

#[derive(Default)]
struct MemoryState {
    next_id: i64,
    items: BTreeMap<i64, Item>,
    bids: Vec<Bid>,
    events: Vec<Event>,
    auto_bids: Vec<AutoBid>,
    settlements: Vec<Settlement>,
    notifications: Vec<Notification>,
    notification_keys: HashSet<(i64, i64, String)>,
    membership_requests: Vec<MembershipRequest>,
}

impl MemoryState {
    fn next_id(&mut self) -> i64 {
        self.next_id += 1;
        self.next_id
    }

    /// data 는 호출자가 미리 직렬화한다 (실패 시 상태를 건드리지 않도록)
    fn push_event(
        &mut self,
        item_id: i64,
        version: i64,
        event: &AuctionEvent,
        data: serde_json::Value,
    ) -> Event {
        let record = Event {
            id: self.next_id(),
            aggregate_id: item_id,
            event_type: event.event_type().to_string(),
            data,
            timestamp: event.timestamp(),
            version,
        };
        self.events.push(record.clone());
        record
    }
}

#[derive(Default)]
pub struct MemoryStore {
    state: Mutex<MemoryState>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl AuctionStore for MemoryStore {
    async fn insert_item(
        &self,
        new_item: NewItem,
        status: AuctionStatus,
        now: DateTime<Utc>,
    ) -> StoreResult<ListedItem> {
        let mut state = self.state.lock().await;
        let id = state.next_id();
        let item = Item {
            id,
            title: new_item.title,
            description: new_item.description,
            category: new_item.category,
            subcategory: new_item.subcategory,
            seller_id: new_item.seller_id,
            auction_type: new_item.auction_type,
            status,
            start_price: new_item.start_price,
            current_price: new_item.start_price,
            min_price: new_item.min_price,
            max_price: new_item.max_price,
            reserve_price: new_item.reserve_price,
            leading_bidder_id: None,
            bid_count: 0,
            images: new_item.images,
            auction_result: None,
            approved_for_live: new_item.approved_for_live,
            start_time: new_item.start_time,
            end_time: new_item.end_time,
            extended_until: None,
            last_bid_at: None,
            version: 1,
            created_at: now,
        };
        let listed = AuctionEvent::ItemListed {
            item_id: id,
            seller_id: item.seller_id,
            auction_type: item.auction_type,
            status,
            start_price: item.start_price,
            timestamp: now,
        };
        let data = serde_json::to_value(&listed)?;
        let event = state.push_event(id, 1, &listed, data);
        state.items.insert(id, item.clone());
        Ok(ListedItem { item, event })
    }

    async fn get_item(&self, item_id: i64) -> StoreResult<Option<Item>> {
        Ok(self.state.lock().await.items.get(&item_id).cloned())
    }

    async fn list_items(&self, filter: &ItemFilter) -> StoreResult<Vec<Item>> {
        let state = self.state.lock().await;
        let mut items: Vec<Item> = state
            .items
            .values()
            .filter(|item| filter.matches(item))
            .cloned()
            .collect();
        items.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
        Ok(items)
    }

    async fn items_in_status(&self, statuses: &[AuctionStatus]) -> StoreResult<Vec<Item>> {
        let state = self.state.lock().await;
        Ok(state
            .items
            .values()
            .filter(|item| statuses.contains(&item.status))
            .cloned()
            .collect())
    }

    async fn commit(&self, commit: ItemCommit) -> StoreResult<Option<CommitOutcome>> {
        let data = serde_json::to_value(&commit.event)?;
        let mut state = self.state.lock().await;

        let mut item = match state.items.get(&commit.item_id) {
            Some(item) if item.version == commit.expected_version => item.clone(),
            _ => return Ok(None),
        };
        commit.patch.apply_to(&mut item);
        item.version += 1;

        let bid = match commit.bid {
            Some(new_bid) => {
                let bid = Bid {
                    id: state.next_id(),
                    item_id: item.id,
                    bidder_id: new_bid.bidder_id,
                    bid_amount: new_bid.bid_amount,
                    increment: new_bid.increment,
                    auction_type_at_bid: new_bid.auction_type_at_bid,
                    source: new_bid.source,
                    created_at: new_bid.created_at,
                };
                state.bids.push(bid.clone());
                Some(bid)
            }
            None => None,
        };

        let event = state.push_event(item.id, item.version, &commit.event, data);

        if let Some(settlement) = commit.settlement {
            if !state.settlements.iter().any(|s| s.item_id == item.id) {
                let record = Settlement {
                    id: state.next_id(),
                    item_id: item.id,
                    buyer_id: settlement.buyer_id,
                    final_price: settlement.final_price,
                    platform_fee: settlement.platform_fee,
                    platform_fee_vat: settlement.platform_fee_vat,
                    net_amount: settlement.net_amount,
                    status: "pending".to_string(),
                    created_at: event.timestamp,
                };
                state.settlements.push(record);
            }
        }

        state.items.insert(item.id, item.clone());
        Ok(Some(CommitOutcome { item, bid, event }))
    }

    async fn list_bids(&self, item_id: i64) -> StoreResult<Vec<Bid>> {
        let state = self.state.lock().await;
        let mut bids: Vec<Bid> = state
            .bids
            .iter()
            .filter(|b| b.item_id == item_id)
            .cloned()
            .collect();
        bids.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
        Ok(bids)
    }

    async fn list_events(&self, item_id: i64) -> StoreResult<Vec<Event>> {
        let state = self.state.lock().await;
        let mut events: Vec<Event> = state
            .events
            .iter()
            .filter(|e| e.aggregate_id == item_id)
            .cloned()
            .collect();
        events.sort_by_key(|e| e.version);
        Ok(events)
    }

    async fn upsert_auto_bid(
        &self,
        auto_bid: NewAutoBid,
        now: DateTime<Utc>,
    ) -> StoreResult<AutoBid> {
        let mut state = self.state.lock().await;
        state
            .auto_bids
            .retain(|a| !(a.item_id == auto_bid.item_id && a.user_id == auto_bid.user_id));
        let record = AutoBid {
            id: state.next_id(),
            item_id: auto_bid.item_id,
            user_id: auto_bid.user_id,
            increment: auto_bid.increment,
            maximum: auto_bid.maximum,
            is_active: true,
            created_at: now,
        };
        state.auto_bids.push(record.clone());
        Ok(record)
    }

    async fn get_auto_bid(&self, item_id: i64, user_id: i64) -> StoreResult<Option<AutoBid>> {
        let state = self.state.lock().await;
        Ok(state
            .auto_bids
            .iter()
            .find(|a| a.item_id == item_id && a.user_id == user_id && a.is_active)
            .cloned())
    }

    async fn delete_auto_bid(&self, item_id: i64, user_id: i64) -> StoreResult<bool> {
        let mut state = self.state.lock().await;
        let before = state.auto_bids.len();
        state
            .auto_bids
            .retain(|a| !(a.item_id == item_id && a.user_id == user_id));
        Ok(state.auto_bids.len() != before)
    }

    async fn active_auto_bids(&self, item_id: i64) -> StoreResult<Vec<AutoBid>> {
        let state = self.state.lock().await;
        Ok(state
            .auto_bids
            .iter()
            .filter(|a| a.item_id == item_id && a.is_active)
            .cloned()
            .collect())
    }

    async fn get_settlement(&self, item_id: i64) -> StoreResult<Option<Settlement>> {
        let state = self.state.lock().await;
        Ok(state
            .settlements
            .iter()
            .find(|s| s.item_id == item_id)
            .cloned())
    }

    async fn insert_notification(&self, notification: NewNotification) -> StoreResult<bool> {
        let mut state = self.state.lock().await;
        let key = (
            notification.event_id,
            notification.user_id,
            notification.kind.to_string(),
        );
        if !state.notification_keys.insert(key) {
            return Ok(false);
        }
        let record = Notification {
            id: state.next_id(),
            user_id: notification.user_id,
            item_id: notification.item_id,
            event_id: notification.event_id,
            kind: notification.kind.to_string(),
            message: notification.message,
            created_at: Utc::now(),
        };
        state.notifications.push(record);
        Ok(true)
    }

    async fn list_notifications(&self, user_id: i64) -> StoreResult<Vec<Notification>> {
        let state = self.state.lock().await;
        let mut notifications: Vec<Notification> = state
            .notifications
            .iter()
            .filter(|n| n.user_id == user_id)
            .cloned()
            .collect();
        notifications.sort_by(|a, b| b.id.cmp(&a.id));
        Ok(notifications)
    }

    async fn insert_membership_request(
        &self,
        request: NewMembershipRequest,
        now: DateTime<Utc>,
    ) -> StoreResult<MembershipRequest> {
        let mut state = self.state.lock().await;
        let record = MembershipRequest {
            id: state.next_id(),
            full_name: request.full_name,
            email: request.email,
            phone: request.phone,
            message: request.message,
            created_at: now,
        };
        state.membership_requests.push(record.clone());
        Ok(record)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auction::model::BidSource;
    use crate::auction::phase::AuctionType;
    use crate::store::{ItemPatch, NewBid};
    use chrono::Duration;

    async fn listed(store: &MemoryStore) -> Item {
        let now = Utc::now();
        let new_item = NewItem {
            title: "Lexus LX600".to_string(),
            description: String::new(),
            category: "cars".to_string(),
            subcategory: None,
            seller_id: Some(100),
            auction_type: AuctionType::Live,
            start_price: 1_000,
            min_price: None,
            max_price: None,
            reserve_price: 0,
            images: vec![],
            approved_for_live: true,
            start_time: now - Duration::minutes(1),
            end_time: now + Duration::hours(1),
        };
        store
            .insert_item(new_item, AuctionStatus::Live, now)
            .await
            .unwrap()
            .item
    }

    fn bid_commit(item: &Item, expected_version: i64, amount: i64) -> ItemCommit {
        let now = Utc::now();
        ItemCommit {
            item_id: item.id,
            expected_version,
            patch: ItemPatch {
                current_price: Some(amount),
                leading_bidder_id: Some(Some(1)),
                record_bid: true,
                ..Default::default()
            },
            bid: Some(NewBid {
                bidder_id: Some(1),
                bid_amount: amount,
                increment: amount - item.current_price,
                auction_type_at_bid: item.auction_type,
                source: BidSource::Manual,
                created_at: now,
            }),
            settlement: None,
            event: AuctionEvent::BidPlaced {
                item_id: item.id,
                seller_id: item.seller_id,
                bidder_id: Some(1),
                bid_amount: amount,
                previous_price: item.current_price,
                current_price: amount,
                previous_leader_id: None,
                took_lead: true,
                auction_type: item.auction_type,
                source: BidSource::Manual,
                extended_until: None,
                timestamp: now,
            },
        }
    }

    #[tokio::test]
    async fn stale_commit_leaves_no_bid_or_event() {
        let store = MemoryStore::new();
        let item = listed(&store).await;

        assert!(store.commit(bid_commit(&item, 7, 2_000)).await.unwrap().is_none());
        assert!(store.list_bids(item.id).await.unwrap().is_empty());
        assert_eq!(store.list_events(item.id).await.unwrap().len(), 1);
        assert_eq!(store.get_item(item.id).await.unwrap().unwrap().version, 1);
    }

    #[tokio::test]
    async fn committed_bid_is_paired_with_its_ledger_version() {
        let store = MemoryStore::new();
        let item = listed(&store).await;

        let outcome = store
            .commit(bid_commit(&item, 1, 2_000))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(outcome.item.version, 2);
        assert_eq!(outcome.event.version, 2);
        assert_eq!(outcome.bid.map(|b| b.bid_amount), Some(2_000));

        let bids = store.list_bids(item.id).await.unwrap();
        let events = store.list_events(item.id).await.unwrap();
        assert_eq!(bids.len(), 1);
        assert_eq!(events.iter().map(|e| e.version).collect::<Vec<_>>(), vec![1, 2]);
    }
}
