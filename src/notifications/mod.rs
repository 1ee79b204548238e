/// 원장 이벤트 -> 사용자 알림 투영
/// 같은 이벤트가 여러 번 전달되어도 (event_id, user_id, kind) 유니크 제약으로 한 번만 저장된다.
// region:    --- Imports
use crate::auction::events::AuctionEvent;
use crate::auction::model::{NewNotification, SaleResult};
use crate::event_store::Event;
use crate::store::{AuctionStore, StoreResult};
use std::sync::Arc;

// endregion: --- Imports

pub struct NotificationProjector {
    store: Arc<dyn AuctionStore>,
}

impl NotificationProjector {
    pub fn new(store: Arc<dyn AuctionStore>) -> Self {
        Self { store }
    }

    /// 이벤트 하나를 투영하고 새로 생성된 알림 수를 반환
    pub async fn project(&self, event: &Event) -> StoreResult<usize> {
        let payload = event.payload()?;
        let mut created = 0;
        for notification in notifications_for(event.id, &payload) {
            if self.store.insert_notification(notification).await? {
                created += 1;
            }
        }
        Ok(created)
    }
}

/// 이벤트별 알림 대상과 내용
pub fn notifications_for(event_id: i64, event: &AuctionEvent) -> Vec<NewNotification> {
    let mut out = Vec::new();
    let mut push = |user_id: Option<i64>, item_id: i64, kind: &'static str, message: String| {
        if let Some(user_id) = user_id {
            out.push(NewNotification {
                user_id,
                item_id,
                event_id,
                kind,
                message,
            });
        }
    };

    match event {
        AuctionEvent::BidPlaced {
            item_id,
            seller_id,
            bidder_id,
            bid_amount,
            current_price,
            previous_leader_id,
            took_lead,
            ..
        } => {
            if *took_lead && previous_leader_id.is_some() && previous_leader_id != bidder_id {
                push(
                    *previous_leader_id,
                    *item_id,
                    "outbid",
                    format!("تمت المزايدة على عرضك، السعر الحالي {}", current_price),
                );
            }
            push(
                *seller_id,
                *item_id,
                "new_bid",
                format!("مزايدة جديدة على مزادك بمبلغ {}", bid_amount),
            );
        }
        AuctionEvent::AuctionSettled {
            item_id,
            buyer_id,
            seller_id,
            final_price,
            ..
        } => {
            push(
                *buyer_id,
                *item_id,
                "won",
                format!("مبروك! فزت بالمزاد بسعر {}", final_price),
            );
            push(
                *seller_id,
                *item_id,
                "sold",
                format!("تم بيع سيارتك بسعر {}", final_price),
            );
        }
        AuctionEvent::AuctionFailed {
            item_id,
            seller_id,
            highest_price,
            ..
        } => {
            push(
                *seller_id,
                *item_id,
                "unsold",
                format!("انتهى المزاد دون الوصول للسعر المطلوب، أعلى سعر {}", highest_price),
            );
        }
        AuctionEvent::AuctionCancelled {
            item_id,
            leading_bidder_id,
            ..
        } => {
            push(
                *leading_bidder_id,
                *item_id,
                "cancelled",
                "تم إلغاء المزاد".to_string(),
            );
        }
        AuctionEvent::SaleConfirmed {
            item_id,
            result: SaleResult::Sold,
            buyer_id,
            final_price,
            ..
        } => {
            push(
                *buyer_id,
                *item_id,
                "sale_confirmed",
                format!("تم تأكيد البيع بسعر {}", final_price),
            );
        }
        _ => {}
    }
    out
}
