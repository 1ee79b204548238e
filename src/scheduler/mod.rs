/// 경매 상태 업데이트 스케줄러
/// 매 틱마다 시간 경과에 따른 상태 전이(scheduled -> live -> closing -> settled/failed)와
/// 시장 시간대 변경(라이브 -> 인스턴트 -> 사일런트)을 적용한다.
/// 모든 변경은 입찰과 같은 버전 조건부 커밋으로 처리되며, 충돌한 상품은 다음 틱에 다시 처리된다.
// region:    --- Imports
use crate::auction::lifecycle::{self, AuctionStatus};
use crate::auction::model::Item;
use crate::auction::phase::MarketClock;
use crate::bidding::commands::{phase_change_commit, publish_event, transition_commit};
use crate::event_store::EventPublisher;
use crate::store::{AuctionStore, ItemCommit, StoreResult};
use chrono::{DateTime, Utc};
use std::sync::Arc;
use tokio::time::{interval, Duration};
use tracing::{debug, error, info};

// endregion: --- Imports

// region:    --- Auction Scheduler
/// 틱 처리 결과
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct TickReport {
    pub transitions: usize,
    pub phase_changes: usize,
    pub conflicts: usize,
    /// 저장소 오류로 건너뛴 상품 수
    pub errors: usize,
}

/// 경매 상태 업데이트 스케줄러
pub struct AuctionScheduler {
    store: Arc<dyn AuctionStore>,
    publisher: Arc<dyn EventPublisher>,
    clock: MarketClock,
    closing_window: chrono::Duration,
    phase_rotation: bool,
    tick_every: Duration,
}

impl AuctionScheduler {
    pub fn new(
        store: Arc<dyn AuctionStore>,
        publisher: Arc<dyn EventPublisher>,
        clock: MarketClock,
    ) -> Self {
        Self {
            store,
            publisher,
            clock,
            closing_window: chrono::Duration::seconds(60),
            phase_rotation: true,
            tick_every: Duration::from_secs(1),
        }
    }

    pub fn with_closing_window(mut self, window: chrono::Duration) -> Self {
        self.closing_window = window;
        self
    }

    pub fn with_phase_rotation(mut self, enabled: bool) -> Self {
        self.phase_rotation = enabled;
        self
    }

    pub fn with_tick(mut self, every: Duration) -> Self {
        self.tick_every = every;
        self
    }

    /// 경매 상태 업데이트 스케줄러 시작
    pub fn start(self) -> tokio::task::JoinHandle<()> {
        info!(
            "{:<12} --> 스케줄러 시작 (tick={:?}, rotation={})",
            "Scheduler", self.tick_every, self.phase_rotation
        );
        tokio::spawn(async move {
            let mut interval = interval(self.tick_every);
            loop {
                interval.tick().await;
                match self.tick(Utc::now()).await {
                    Ok(report) if report != TickReport::default() => {
                        debug!("{:<12} --> {:?}", "Scheduler", report)
                    }
                    Ok(_) => {}
                    Err(e) => error!(
                        "{:<12} --> 경매 상태 업데이트 중 오류 발생: {:?}",
                        "Scheduler", e
                    ),
                }
            }
        })
    }

    /// 한 번의 틱 처리
    pub async fn tick(&self, now: DateTime<Utc>) -> StoreResult<TickReport> {
        let mut report = TickReport::default();
        let candidates = self
            .store
            .items_in_status(&[
                AuctionStatus::Scheduled,
                AuctionStatus::Live,
                AuctionStatus::Closing,
            ])
            .await?;

        // 한 상품의 오류가 나머지 상품 처리를 막지 않는다
        for item in candidates {
            let (commit, is_transition) = match self.due_commit(&item, now) {
                Some(commit) => (commit, true),
                None => match self.phase_commit(&item, now) {
                    Some(commit) => (commit, false),
                    None => continue,
                },
            };

            match self.apply(commit).await {
                Ok(true) if is_transition => report.transitions += 1,
                Ok(true) => report.phase_changes += 1,
                Ok(false) => report.conflicts += 1,
                Err(e) => {
                    error!(
                        "{:<12} --> item={} 처리 실패, 건너뜀: {}",
                        "Scheduler", item.id, e
                    );
                    report.errors += 1;
                }
            }
        }
        Ok(report)
    }

    /// 시간 경과에 따른 상태 전이 커밋
    fn due_commit(&self, item: &Item, now: DateTime<Utc>) -> Option<ItemCommit> {
        let to = lifecycle::due_transition(item, now, self.closing_window)?;
        match transition_commit(item, to, now) {
            Ok(commit) => Some(commit),
            Err(e) => {
                error!(
                    "{:<12} --> 허용되지 않은 전이 item={}: {}",
                    "Scheduler", item.id, e
                );
                None
            }
        }
    }

    /// 시장 시간대 변경 커밋 (진행 중인 상품만)
    fn phase_commit(&self, item: &Item, now: DateTime<Utc>) -> Option<ItemCommit> {
        if !self.phase_rotation || !item.status.is_open() {
            return None;
        }
        let target = self
            .clock
            .phase_at(now)
            .auction_type_for(item.approved_for_live);
        (target != item.auction_type).then(|| phase_change_commit(item, target, now))
    }

    /// 커밋 후 발행. 버전 충돌이면 false
    async fn apply(&self, commit: ItemCommit) -> StoreResult<bool> {
        let item_id = commit.item_id;
        match self.store.commit(commit).await? {
            Some(outcome) => {
                info!(
                    "{:<12} --> item={} {} (status={}, type={})",
                    "Scheduler",
                    item_id,
                    outcome.event.event_type,
                    outcome.item.status,
                    outcome.item.auction_type
                );
                publish_event(self.publisher.as_ref(), &outcome.event).await;
                Ok(true)
            }
            None => {
                debug!("{:<12} --> 버전 충돌, 다음 틱에 재시도 item={}", "Scheduler", item_id);
                Ok(false)
            }
        }
    }
}
// endregion: --- Auction Scheduler
