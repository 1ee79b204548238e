/// 경매 관련 커맨드 처리
/// 1. 상품 등록
/// 2. 입찰
/// 3. 판매 확정
/// 4. 경매 취소
/// 모든 쓰기는 버전 조건부 커밋으로 처리하고, 충돌 시 최신 상태를 다시 읽어 재시도한다.
// region:    --- Imports
use super::auto_bid;
use super::rules;
use crate::auction::events::AuctionEvent;
use crate::auction::lifecycle::{self, AuctionStatus};
use crate::auction::model::{Bid, BidSource, Item, NewItem, NewSettlement, SaleResult};
use crate::auction::phase::AuctionType;
use crate::error::{AppError, AppResult, RejectCode, Rejection};
use crate::event_store::{Event, EventPublisher};
use crate::store::{AuctionStore, CommitOutcome, ItemCommit, ItemPatch, NewBid};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

// endregion: --- Imports

// 최대 재시도 횟수
pub const MAX_RETRIES: i32 = 100;

// region:    --- Commands
/// 입찰 명령
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct PlaceBidCommand {
    #[serde(alias = "itemId")]
    pub item_id: i64,
    #[serde(default, alias = "bidderId", alias = "user_id")]
    pub bidder_id: Option<i64>,
    #[serde(alias = "bidAmount")]
    pub bid_amount: i64,
}

/// 판매 확정 명령
#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(rename_all = "camelCase")]
pub struct ConfirmSaleCommand {
    #[serde(alias = "item_id")]
    pub item_id: i64,
    pub result: SaleResult,
}

/// 입찰 결과
#[derive(Debug, Clone)]
pub struct BidReceipt {
    pub item: Item,
    pub bid: Bid,
    /// 이 입찰로 인해 발생한 자동 입찰
    pub auto_bids: Vec<Bid>,
}

/// 1. 상품 등록
pub async fn handle_list_item(
    new_item: NewItem,
    store: &dyn AuctionStore,
    publisher: &dyn EventPublisher,
) -> AppResult<Item> {
    new_item.validate().map_err(AppError::InvalidRequest)?;

    let now = Utc::now();
    let status = new_item.initial_status(now);
    let listed = store.insert_item(new_item, status, now).await?;
    info!(
        "{:<12} --> 상품 등록 id={} status={}",
        "Command", listed.item.id, listed.item.status
    );

    publish_event(publisher, &listed.event).await;
    Ok(listed.item)
}

/// 2. 입찰 (수동 입찰 후 자동 입찰 대리 진행)
pub async fn handle_place_bid(
    cmd: PlaceBidCommand,
    store: &dyn AuctionStore,
    publisher: &dyn EventPublisher,
) -> AppResult<BidReceipt> {
    info!("{:<12} --> 입찰 요청 처리 시작: {:?}", "Command", cmd);

    let outcome = place_bid_once(&cmd, BidSource::Manual, store, publisher).await?;
    let bid = outcome
        .bid
        .ok_or_else(|| AppError::Internal("입찰 커밋에 입찰 기록이 없습니다".to_string()))?;

    let (item, auto_bids) = auto_bid::run_proxy_bidding(outcome.item, store, publisher).await;
    Ok(BidReceipt {
        item,
        bid,
        auto_bids,
    })
}

/// 입찰 1건 커밋 (버전 충돌 시 재시도)
pub(crate) async fn place_bid_once(
    cmd: &PlaceBidCommand,
    source: BidSource,
    store: &dyn AuctionStore,
    publisher: &dyn EventPublisher,
) -> AppResult<CommitOutcome> {
    let mut retries = 0;

    while retries < MAX_RETRIES {
        let item = load_item(store, cmd.item_id).await?;
        let now = Utc::now();

        // 경매 상태 및 시간 검증
        lifecycle::ensure_open_for_bids(&item, now)?;
        rules::ensure_not_seller(item.seller_id, cmd.bidder_id)?;
        rules::validate_bid(item.auction_type, item.current_price, cmd.bid_amount)?;

        let commit = bid_commit(&item, cmd, source, now);
        match store.commit(commit).await? {
            Some(outcome) => {
                info!(
                    "{:<12} --> 입찰 저장 item={} amount={} v{}",
                    "Command", cmd.item_id, cmd.bid_amount, outcome.item.version
                );
                publish_event(publisher, &outcome.event).await;
                return Ok(outcome);
            }
            None => {
                warn!(
                    "{:<12} --> 낙관적 업데이트로 인한 버전 충돌: 재시도",
                    "Command"
                );
                retries += 1;
            }
        }
    }

    Err(AppError::Conflict)
}

/// 입찰 커밋 구성
/// 새 현재가는 max(현재가, 입찰가), 현재가보다 높을 때만 선두가 바뀐다.
fn bid_commit(
    item: &Item,
    cmd: &PlaceBidCommand,
    source: BidSource,
    now: DateTime<Utc>,
) -> ItemCommit {
    let took_lead = cmd.bid_amount > item.current_price;
    let current_price = item.current_price.max(cmd.bid_amount);
    let extended_until = rules::sniping_extension(item.effective_end(), now);

    ItemCommit {
        item_id: item.id,
        expected_version: item.version,
        patch: ItemPatch {
            current_price: Some(current_price),
            leading_bidder_id: took_lead.then_some(cmd.bidder_id),
            extended_until,
            last_bid_at: Some(now),
            record_bid: true,
            ..Default::default()
        },
        bid: Some(NewBid {
            bidder_id: cmd.bidder_id,
            bid_amount: cmd.bid_amount,
            increment: cmd.bid_amount - item.current_price,
            auction_type_at_bid: item.auction_type,
            source,
            created_at: now,
        }),
        settlement: None,
        event: AuctionEvent::BidPlaced {
            item_id: item.id,
            seller_id: item.seller_id,
            bidder_id: cmd.bidder_id,
            bid_amount: cmd.bid_amount,
            previous_price: item.current_price,
            current_price,
            previous_leader_id: item.leading_bidder_id,
            took_lead,
            auction_type: item.auction_type,
            source,
            extended_until,
            timestamp: now,
        },
    }
}

/// 3. 판매 확정
pub async fn handle_confirm_sale(
    cmd: ConfirmSaleCommand,
    store: &dyn AuctionStore,
    publisher: &dyn EventPublisher,
) -> AppResult<Item> {
    info!("{:<12} --> 판매 확정 요청: {:?}", "Command", cmd);
    let mut retries = 0;

    while retries < MAX_RETRIES {
        let item = load_item(store, cmd.item_id).await?;
        let commit = confirm_sale_commit(&item, cmd.result, Utc::now())?;

        match store.commit(commit).await? {
            Some(outcome) => {
                publish_event(publisher, &outcome.event).await;
                return Ok(outcome.item);
            }
            None => retries += 1,
        }
    }

    Err(AppError::Conflict)
}

/// 판매 확정 커밋 구성
/// - 진행 중: sold 는 입찰이 있어야 하며 낙찰(정산 생성), not_sold 는 유찰
/// - 낙찰: 결과만 기록
/// - 유찰: not_sold 만 허용
fn confirm_sale_commit(
    item: &Item,
    result: SaleResult,
    now: DateTime<Utc>,
) -> Result<ItemCommit, Rejection> {
    let (status, settlement) = match (item.status, result) {
        (AuctionStatus::Live | AuctionStatus::Closing, SaleResult::Sold) => {
            if item.bid_count == 0 {
                return Err(Rejection::new(
                    RejectCode::NoBids,
                    "لا يمكن تأكيد البيع لمزاد بدون مزايدات",
                ));
            }
            (AuctionStatus::Settled, Some(settlement_for(item)))
        }
        (AuctionStatus::Live | AuctionStatus::Closing, SaleResult::NotSold) => {
            (AuctionStatus::Failed, None)
        }
        (AuctionStatus::Settled, _) | (AuctionStatus::Failed, SaleResult::NotSold) => {
            (item.status, None)
        }
        (from, _) => {
            return Err(Rejection::new(
                RejectCode::InvalidTransition,
                format!("لا يمكن تأكيد نتيجة البيع لمزاد في حالة {}", from),
            ))
        }
    };

    Ok(ItemCommit {
        item_id: item.id,
        expected_version: item.version,
        patch: ItemPatch {
            status: (status != item.status).then_some(status),
            auction_result: Some(result),
            ..Default::default()
        },
        bid: None,
        settlement,
        event: AuctionEvent::SaleConfirmed {
            item_id: item.id,
            result,
            status,
            buyer_id: item.leading_bidder_id,
            final_price: item.current_price,
            timestamp: now,
        },
    })
}

/// 4. 경매 취소
pub async fn handle_cancel(
    item_id: i64,
    store: &dyn AuctionStore,
    publisher: &dyn EventPublisher,
) -> AppResult<Item> {
    info!("{:<12} --> 경매 취소 요청 item={}", "Command", item_id);
    let outcome = apply_transition(store, publisher, item_id, AuctionStatus::Cancelled).await?;
    Ok(outcome.item)
}

/// 상태 전이 적용 (스케줄러, 취소 공용)
pub async fn apply_transition(
    store: &dyn AuctionStore,
    publisher: &dyn EventPublisher,
    item_id: i64,
    to: AuctionStatus,
) -> AppResult<CommitOutcome> {
    let mut retries = 0;

    while retries < MAX_RETRIES {
        let item = load_item(store, item_id).await?;
        let commit = transition_commit(&item, to, Utc::now())?;

        match store.commit(commit).await? {
            Some(outcome) => {
                info!(
                    "{:<12} --> 상태 전이 item={} {} -> {}",
                    "Command", item_id, item.status, to
                );
                publish_event(publisher, &outcome.event).await;
                return Ok(outcome);
            }
            None => retries += 1,
        }
    }

    Err(AppError::Conflict)
}

/// 상태 전이 커밋 구성
pub fn transition_commit(
    item: &Item,
    to: AuctionStatus,
    now: DateTime<Utc>,
) -> Result<ItemCommit, Rejection> {
    item.status.ensure_transition(to)?;

    let mut settlement = None;
    let event = match to {
        AuctionStatus::Live => AuctionEvent::AuctionOpened {
            item_id: item.id,
            timestamp: now,
        },
        AuctionStatus::Closing => AuctionEvent::AuctionClosing {
            item_id: item.id,
            ends_at: item.effective_end(),
            timestamp: now,
        },
        AuctionStatus::Settled => {
            let new_settlement = settlement_for(item);
            let event = AuctionEvent::AuctionSettled {
                item_id: item.id,
                buyer_id: item.leading_bidder_id,
                seller_id: item.seller_id,
                final_price: item.current_price,
                platform_fee: new_settlement.platform_fee,
                platform_fee_vat: new_settlement.platform_fee_vat,
                timestamp: now,
            };
            settlement = Some(new_settlement);
            event
        }
        AuctionStatus::Failed => AuctionEvent::AuctionFailed {
            item_id: item.id,
            seller_id: item.seller_id,
            highest_price: item.current_price,
            timestamp: now,
        },
        AuctionStatus::Cancelled => AuctionEvent::AuctionCancelled {
            item_id: item.id,
            leading_bidder_id: item.leading_bidder_id,
            timestamp: now,
        },
        AuctionStatus::Scheduled => {
            return Err(Rejection::new(
                RejectCode::InvalidTransition,
                "لا يمكن إعادة جدولة المزاد",
            ))
        }
    };

    Ok(ItemCommit {
        item_id: item.id,
        expected_version: item.version,
        patch: ItemPatch {
            status: Some(to),
            ..Default::default()
        },
        bid: None,
        settlement,
        event,
    })
}

/// 시간대 변경 커밋 구성
/// 라이브/인스턴트에서 입찰이 있었다면 다음 시간대는 현재가에서 시작한다.
pub fn phase_change_commit(item: &Item, to: AuctionType, now: DateTime<Utc>) -> ItemCommit {
    let carries_price = item.bid_count > 0 && item.auction_type != AuctionType::Silent;
    let opening_price = if carries_price {
        item.current_price
    } else {
        item.start_price
    };

    ItemCommit {
        item_id: item.id,
        expected_version: item.version,
        patch: ItemPatch {
            auction_type: Some(to),
            start_price: carries_price.then_some(opening_price),
            ..Default::default()
        },
        bid: None,
        settlement: None,
        event: AuctionEvent::PhaseChanged {
            item_id: item.id,
            from: item.auction_type,
            to,
            opening_price,
            timestamp: now,
        },
    }
}

/// 낙찰 정산 (구간별 수수료 + 수수료 부가세)
pub fn settlement_for(item: &Item) -> NewSettlement {
    let platform_fee = rules::commission_for(item.current_price);
    let platform_fee_vat = rules::commission_vat(platform_fee);
    NewSettlement {
        buyer_id: item.leading_bidder_id,
        final_price: item.current_price,
        platform_fee,
        platform_fee_vat,
        net_amount: item
            .current_price
            .saturating_sub(platform_fee)
            .saturating_sub(platform_fee_vat)
            .max(0),
    }
}

async fn load_item(store: &dyn AuctionStore, item_id: i64) -> AppResult<Item> {
    store
        .get_item(item_id)
        .await?
        .ok_or_else(|| AppError::item_not_found(item_id))
}

/// 이벤트 발행 (원장 커밋 이후이므로 실패해도 요청은 성공)
pub(crate) async fn publish_event(publisher: &dyn EventPublisher, event: &Event) {
    if let Err(e) = publisher.publish(event).await {
        warn!(
            "{:<12} --> 이벤트 발행 실패 {} v{}: {}",
            "Command", event.event_type, event.version, e
        );
    }
}
// endregion: --- Commands
