// region:    --- Imports
use crate::auction::events::AuctionEvent;
use crate::message_broker::{BrokerError, KafkaConsumer};
use crate::notifications::NotificationProjector;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{error, info, warn};

// endregion: --- Imports

// region:    --- Event Model
/// 이벤트 저장소(원장)에 저장되는 이벤트 모델
#[derive(Debug, Serialize, Deserialize, FromRow, Clone, PartialEq)]
pub struct Event {
    pub id: i64,
    pub aggregate_id: i64,
    pub event_type: String,
    pub data: serde_json::Value,
    pub timestamp: chrono::DateTime<chrono::Utc>,
    pub version: i64,
}

impl Event {
    /// 원장 데이터를 도메인 이벤트로 복원
    pub fn payload(&self) -> Result<AuctionEvent, serde_json::Error> {
        serde_json::from_value(self.data.clone())
    }
}
// endregion: --- Event Model

// region:    --- Event Publisher
/// 원장에 커밋된 이벤트를 외부로 발행
#[async_trait]
pub trait EventPublisher: Send + Sync {
    async fn publish(&self, event: &Event) -> Result<(), BrokerError>;
}

/// 프로세스 내부 이벤트 버스 (Kafka 없이 실행할 때)
#[derive(Clone)]
pub struct LocalEventBus {
    sender: mpsc::UnboundedSender<Event>,
}

impl LocalEventBus {
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<Event>) {
        let (sender, receiver) = mpsc::unbounded_channel();
        (Self { sender }, receiver)
    }
}

#[async_trait]
impl EventPublisher for LocalEventBus {
    async fn publish(&self, event: &Event) -> Result<(), BrokerError> {
        self.sender
            .send(event.clone())
            .map_err(|_| BrokerError::Closed)
    }
}
// endregion: --- Event Publisher

// region:    --- Event Consumer
/// 이벤트 소비자: 발행된 이벤트를 알림으로 투영
pub struct EventConsumer {
    projector: Arc<NotificationProjector>,
}

impl EventConsumer {
    pub fn new(projector: Arc<NotificationProjector>) -> Self {
        EventConsumer { projector }
    }

    /// Kafka 토픽 소비 시작
    pub async fn start_kafka(&self, kafka_consumer: Arc<KafkaConsumer>, topic: &str) {
        let projector = Arc::clone(&self.projector);
        if let Err(e) = kafka_consumer
            .consume_events(topic, move |event| {
                let projector = Arc::clone(&projector);
                Box::pin(async move {
                    Self::process_event(&projector, event).await;
                })
            })
            .await
        {
            error!("{:<12} --> 이벤트 소비 오류: {:?}", "EventConsume", e);
        }
    }

    /// 로컬 버스 소비 시작 (송신측이 모두 닫히면 종료)
    pub async fn start_local(&self, mut receiver: mpsc::UnboundedReceiver<Event>) {
        info!("{:<12} --> 로컬 이벤트 버스 소비 시작", "EventConsume");
        while let Some(event) = receiver.recv().await {
            Self::process_event(&self.projector, event).await;
        }
        warn!("{:<12} --> 로컬 이벤트 버스 종료", "EventConsume");
    }

    /// 이벤트 처리
    async fn process_event(projector: &NotificationProjector, event: Event) {
        match projector.project(&event).await {
            Ok(created) => info!(
                "{:<12} --> {} v{} 처리 (알림 {}건)",
                "EventConsume", event.event_type, event.version, created
            ),
            Err(e) => error!(
                "{:<12} --> 이벤트 처리 오류 {} v{}: {}",
                "EventConsume", event.event_type, event.version, e
            ),
        }
    }
}
// endregion: --- Event Consumer
