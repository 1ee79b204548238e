/// 자동 입찰 (대리 입찰)
/// 사용자가 최대 금액과 증가폭을 등록하면, 다른 입찰으로 선두를 잃을 때마다
/// 최대 금액까지 대신 입찰한다. 사일런트 경매에는 적용하지 않는다.
// region:    --- Imports
use super::commands::{place_bid_once, PlaceBidCommand};
use super::rules;
use crate::auction::lifecycle;
use crate::auction::model::{AutoBid, Bid, BidSource, Item, NewAutoBid};
use crate::error::{AppError, AppResult, RejectCode, Rejection};
use crate::event_store::EventPublisher;
use crate::store::AuctionStore;
use chrono::Utc;
use tracing::{error, info, warn};

// endregion: --- Imports

/// 입찰 1건당 자동 입찰 최대 반복 횟수
pub const MAX_AUTO_ROUNDS: usize = 200;

/// 자동 입찰 등록 (사용자별 하나, 재등록 시 갱신)
pub async fn register(
    auto_bid: NewAutoBid,
    store: &dyn AuctionStore,
    publisher: &dyn EventPublisher,
) -> AppResult<AutoBid> {
    if auto_bid.increment < rules::MIN_AUTO_BID_INCREMENT {
        return Err(Rejection::new(
            RejectCode::AutoBidTooLow,
            format!(
                "يجب ألا تقل قيمة الزيادة عن {} ريال",
                rules::MIN_AUTO_BID_INCREMENT
            ),
        )
        .into());
    }
    if auto_bid.maximum > rules::MAX_PRICE {
        return Err(Rejection::new(
            RejectCode::BidTooHigh,
            format!("يجب ألا يتجاوز الحد الأقصى {}", rules::MAX_PRICE),
        )
        .into());
    }

    let item = store
        .get_item(auto_bid.item_id)
        .await?
        .ok_or_else(|| AppError::item_not_found(auto_bid.item_id))?;
    lifecycle::ensure_open_for_bids(&item, Utc::now())?;
    rules::ensure_not_seller(item.seller_id, Some(auto_bid.user_id))?;

    if !item.auction_type.supports_auto_bid() {
        return Err(Rejection::new(
            RejectCode::InvalidStatus,
            "المزايدة التلقائية غير متاحة في المزاد الصامت",
        )
        .into());
    }
    if auto_bid.maximum <= item.current_price {
        return Err(Rejection::new(
            RejectCode::LowBid,
            format!(
                "يجب أن يكون الحد الأقصى أعلى من السعر الحالي {}",
                item.current_price
            ),
        )
        .into());
    }

    let registered = store.upsert_auto_bid(auto_bid, Utc::now()).await?;
    info!(
        "{:<12} --> 자동 입찰 등록 item={} user={} max={}",
        "AutoBid", registered.item_id, registered.user_id, registered.maximum
    );

    // 등록 즉시 한 번 진행
    run_proxy_bidding(item, store, publisher).await;
    Ok(registered)
}

/// 다음 자동 입찰 (입찰자, 금액)
/// 선두가 아닌 등록자 중 최대 금액이 가장 큰(동률이면 먼저 등록한) 사용자가
/// min(현재가 + max(증가폭, 구간 증가폭), 최대 금액) 으로 입찰한다.
pub fn next_proxy_bid(item: &Item, auto_bids: &[AutoBid]) -> Option<(i64, i64)> {
    if !item.status.is_open() || !item.auction_type.supports_auto_bid() {
        return None;
    }

    auto_bids
        .iter()
        .filter(|a| a.is_active && a.item_id == item.id)
        .filter(|a| Some(a.user_id) != item.leading_bidder_id)
        .filter(|a| a.maximum > item.current_price)
        .max_by(|a, b| {
            a.maximum
                .cmp(&b.maximum)
                .then_with(|| b.created_at.cmp(&a.created_at))
        })
        .map(|a| {
            let step = a.increment.max(rules::tier_increment(item.current_price));
            let amount = item.current_price.saturating_add(step).min(a.maximum);
            (a.user_id, amount)
        })
}

/// 자동 입찰 진행. 마지막 상품 상태와 자동으로 들어간 입찰 목록을 반환
/// 자동 입찰 실패는 원래 요청을 실패시키지 않는다.
pub async fn run_proxy_bidding(
    item: Item,
    store: &dyn AuctionStore,
    publisher: &dyn EventPublisher,
) -> (Item, Vec<Bid>) {
    let mut current = item;
    let mut placed = Vec::new();

    for _ in 0..MAX_AUTO_ROUNDS {
        let auto_bids = match store.active_auto_bids(current.id).await {
            Ok(auto_bids) => auto_bids,
            Err(e) => {
                error!("{:<12} --> 자동 입찰 조회 오류: {}", "AutoBid", e);
                break;
            }
        };
        let Some((user_id, amount)) = next_proxy_bid(&current, &auto_bids) else {
            break;
        };

        let cmd = PlaceBidCommand {
            item_id: current.id,
            bidder_id: Some(user_id),
            bid_amount: amount,
        };
        match place_bid_once(&cmd, BidSource::Auto, store, publisher).await {
            Ok(outcome) => {
                placed.extend(outcome.bid);
                current = outcome.item;
            }
            Err(e) => {
                warn!(
                    "{:<12} --> 자동 입찰 중단 item={} user={}: {}",
                    "AutoBid", current.id, user_id, e
                );
                break;
            }
        }
    }

    if !placed.is_empty() {
        info!(
            "{:<12} --> 자동 입찰 {}건 item={} price={}",
            "AutoBid",
            placed.len(),
            current.id,
            current.current_price
        );
    }
    (current, placed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auction::lifecycle::AuctionStatus;
    use crate::auction::model::NewItem;
    use crate::auction::phase::AuctionType;
    use crate::bidding::commands::handle_list_item;
    use crate::event_store::LocalEventBus;
    use crate::store::MemoryStore;
    use chrono::Duration;

    fn auto(user_id: i64, increment: i64, maximum: i64, secs_ago: i64) -> AutoBid {
        AutoBid {
            id: user_id,
            item_id: 1,
            user_id,
            increment,
            maximum,
            is_active: true,
            created_at: Utc::now() - Duration::seconds(secs_ago),
        }
    }

    fn open_item(current_price: i64, leader: Option<i64>) -> Item {
        let now = Utc::now();
        Item {
            id: 1,
            title: "Nissan Patrol".to_string(),
            description: String::new(),
            category: "cars".to_string(),
            subcategory: None,
            seller_id: Some(100),
            auction_type: AuctionType::Instant,
            status: AuctionStatus::Live,
            start_price: 1_000,
            current_price,
            min_price: None,
            max_price: None,
            reserve_price: 0,
            leading_bidder_id: leader,
            bid_count: 1,
            images: vec![],
            auction_result: None,
            approved_for_live: false,
            start_time: now - Duration::hours(1),
            end_time: now + Duration::hours(1),
            extended_until: None,
            last_bid_at: None,
            version: 2,
            created_at: now,
        }
    }

    #[test]
    fn highest_maximum_bids_next() {
        let item = open_item(10_000, Some(9));
        let candidates = vec![auto(1, 200, 12_000, 10), auto(2, 300, 15_000, 5)];
        assert_eq!(next_proxy_bid(&item, &candidates), Some((2, 10_500)));
    }

    #[test]
    fn leader_does_not_bid_against_itself() {
        let item = open_item(10_000, Some(2));
        let candidates = vec![auto(2, 300, 15_000, 5)];
        assert_eq!(next_proxy_bid(&item, &candidates), None);
    }

    #[test]
    fn amount_is_capped_at_maximum() {
        let item = open_item(10_000, Some(9));
        let candidates = vec![auto(1, 2_000, 10_400, 5)];
        assert_eq!(next_proxy_bid(&item, &candidates), Some((1, 10_400)));
    }

    #[test]
    fn tie_goes_to_earliest_registration() {
        let item = open_item(10_000, Some(9));
        let candidates = vec![auto(1, 200, 12_000, 5), auto(2, 200, 12_000, 60)];
        assert_eq!(next_proxy_bid(&item, &candidates).map(|(u, _)| u), Some(2));
    }

    #[test]
    fn silent_items_never_auto_bid() {
        let mut item = open_item(10_000, Some(9));
        item.auction_type = AuctionType::Silent;
        assert_eq!(next_proxy_bid(&item, &[auto(1, 200, 20_000, 5)]), None);
    }

    async fn listed(store: &MemoryStore, bus: &LocalEventBus, auction_type: AuctionType) -> Item {
        let now = Utc::now();
        let new_item = NewItem {
            title: "Hyundai Sonata".to_string(),
            description: String::new(),
            category: "cars".to_string(),
            subcategory: None,
            seller_id: Some(100),
            auction_type,
            start_price: 10_000,
            min_price: None,
            max_price: None,
            reserve_price: 0,
            images: vec![],
            approved_for_live: false,
            start_time: now - Duration::minutes(5),
            end_time: now + Duration::hours(1),
        };
        handle_list_item(new_item, store, bus).await.unwrap()
    }

    #[tokio::test]
    async fn two_proxies_bid_until_lower_maximum_is_exhausted() {
        let store = MemoryStore::new();
        let (bus, _rx) = LocalEventBus::channel();
        let item = listed(&store, &bus, AuctionType::Instant).await;

        let first = NewAutoBid {
            item_id: item.id,
            user_id: 1,
            increment: 500,
            maximum: 12_000,
        };
        register(first, &store, &bus).await.unwrap();
        let item_now = store.get_item(item.id).await.unwrap().unwrap();
        assert_eq!(item_now.leading_bidder_id, Some(1));
        assert_eq!(item_now.current_price, 10_500);

        let second = NewAutoBid {
            item_id: item.id,
            user_id: 2,
            increment: 500,
            maximum: 15_000,
        };
        register(second, &store, &bus).await.unwrap();

        let item_now = store.get_item(item.id).await.unwrap().unwrap();
        assert_eq!(item_now.leading_bidder_id, Some(2));
        // 1번의 최대 금액에서 멈춘다
        assert_eq!(item_now.current_price, 12_000);
        let bids = store.list_bids(item.id).await.unwrap();
        assert!(bids.iter().all(|b| b.source == BidSource::Auto));
    }

    #[tokio::test]
    async fn registration_validates_increment_and_type() {
        let store = MemoryStore::new();
        let (bus, _rx) = LocalEventBus::channel();
        let instant = listed(&store, &bus, AuctionType::Instant).await;
        let silent = listed(&store, &bus, AuctionType::Silent).await;

        let too_small = NewAutoBid {
            item_id: instant.id,
            user_id: 1,
            increment: 199,
            maximum: 50_000,
        };
        let err = register(too_small, &store, &bus).await.unwrap_err();
        assert!(matches!(err, AppError::Rejected(r) if r.code == RejectCode::AutoBidTooLow));

        let on_silent = NewAutoBid {
            item_id: silent.id,
            user_id: 1,
            increment: 200,
            maximum: 50_000,
        };
        let err = register(on_silent, &store, &bus).await.unwrap_err();
        assert!(matches!(err, AppError::Rejected(r) if r.code == RejectCode::InvalidStatus));

        let below_price = NewAutoBid {
            item_id: instant.id,
            user_id: 1,
            increment: 200,
            maximum: 10_000,
        };
        let err = register(below_price, &store, &bus).await.unwrap_err();
        assert!(matches!(err, AppError::Rejected(r) if r.code == RejectCode::LowBid));

        let above_ceiling = NewAutoBid {
            item_id: instant.id,
            user_id: 1,
            increment: 200,
            maximum: i64::MAX,
        };
        let err = register(above_ceiling, &store, &bus).await.unwrap_err();
        assert!(matches!(err, AppError::Rejected(r) if r.code == RejectCode::BidTooHigh));
    }

    #[tokio::test]
    async fn seller_cannot_register_proxy_on_own_item() {
        let store = MemoryStore::new();
        let (bus, _rx) = LocalEventBus::channel();
        let item = listed(&store, &bus, AuctionType::Instant).await;

        let own = NewAutoBid {
            item_id: item.id,
            user_id: 100,
            increment: 500,
            maximum: 50_000,
        };
        let err = register(own, &store, &bus).await.unwrap_err();
        assert!(matches!(err, AppError::Rejected(r) if r.code == RejectCode::OwnAuction));
        assert!(store.get_auto_bid(item.id, 100).await.unwrap().is_none());
    }
}
