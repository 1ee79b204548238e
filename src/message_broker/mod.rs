/// Kafka 연동: 원장 이벤트를 auction-events 토픽으로 발행하고 소비한다.
/// 상품 id 를 메시지 키로 사용하므로 같은 상품의 이벤트는 한 파티션 안에서 순서가 유지된다.
// region:    --- Imports
use crate::event_store::{Event, EventPublisher};
use async_trait::async_trait;
use rdkafka::admin::{AdminClient, AdminOptions, NewTopic, TopicReplication};
use rdkafka::client::DefaultClientContext;
use rdkafka::consumer::{Consumer, StreamConsumer};
use rdkafka::error::KafkaError;
use rdkafka::message::Message;
use rdkafka::producer::{FutureProducer, FutureRecord};
use rdkafka::ClientConfig;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::time;
use tracing::{debug, error, info, warn};

// endregion: --- Imports

/// 연결 확인용 토픽
const HANDSHAKE_TOPIC: &str = "init-topic";
const HANDSHAKE_PAYLOAD: &[u8] = b"init-message";
const HANDSHAKE_ATTEMPTS: u32 = 10;

// region:    --- Errors
#[derive(Debug, Error)]
pub enum BrokerError {
    #[error("kafka error: {0}")]
    Kafka(#[from] KafkaError),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("event channel closed")]
    Closed,

    #[error("broker handshake failed: {0}")]
    Handshake(String),
}
// endregion: --- Errors

/// 수신 메시지 본문을 원장 이벤트로 복원 (빈 본문은 None)
pub fn decode_event(payload: Option<&[u8]>) -> Result<Option<Event>, BrokerError> {
    match payload {
        None | Some([]) => Ok(None),
        Some(bytes) => Ok(Some(serde_json::from_slice(bytes)?)),
    }
}

// region:    --- Kafka Producer
#[derive(Clone)]
pub struct KafkaProducer {
    producer: Arc<FutureProducer>,
    events_topic: String,
}

impl KafkaProducer {
    pub fn new(brokers: &str, events_topic: &str) -> Result<Self, BrokerError> {
        let producer: FutureProducer = ClientConfig::new()
            .set("bootstrap.servers", brokers)
            .set("message.timeout.ms", "5000")
            .create()?;

        Ok(KafkaProducer {
            producer: Arc::new(producer),
            events_topic: events_topic.to_string(),
        })
    }

    /// 임의 토픽으로 메시지 전송
    async fn send_raw(&self, topic: &str, key: &str, payload: &[u8]) -> Result<(), BrokerError> {
        let record = FutureRecord::to(topic).key(key).payload(payload);
        self.producer
            .send(record, Duration::from_secs(0))
            .await
            .map(|_| ())
            .map_err(|(e, _)| BrokerError::Kafka(e))
    }
}

#[async_trait]
impl EventPublisher for KafkaProducer {
    async fn publish(&self, event: &Event) -> Result<(), BrokerError> {
        let payload = serde_json::to_vec(event)?;
        let key = event.aggregate_id.to_string();
        debug!(
            "{:<12} --> {} v{} 발행 (key={})",
            "Producer", event.event_type, event.version, key
        );
        self.send_raw(&self.events_topic, &key, &payload).await
    }
}

// endregion: --- Kafka Producer

// region:    --- Kafka Consumer
pub struct KafkaConsumer {
    consumer: Arc<StreamConsumer>,
}

impl KafkaConsumer {
    pub fn new(brokers: &str, group_id: &str) -> Result<Self, BrokerError> {
        // at-least-once 수신: 알림 투영은 멱등이라 재전달되어도 무방
        let consumer: StreamConsumer = ClientConfig::new()
            .set("bootstrap.servers", brokers)
            .set("group.id", group_id)
            .set("enable.auto.commit", "true")
            .set("auto.offset.reset", "earliest")
            .set("session.timeout.ms", "6000")
            .set("allow.auto.create.topics", "true")
            .create()?;

        Ok(KafkaConsumer {
            consumer: Arc::new(consumer),
        })
    }

    /// 토픽을 구독하고 이벤트마다 handler 를 호출 (수신 오류는 로그 후 계속)
    pub async fn consume_events<F, Fut>(&self, topic: &str, handler: F) -> Result<(), BrokerError>
    where
        F: Fn(Event) -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        self.consumer.subscribe(&[topic])?;
        info!("{:<12} --> 구독 시작: {}", "Consumer", topic);

        loop {
            let message = match self.consumer.recv().await {
                Ok(message) => message,
                Err(e) => {
                    error!("{:<12} --> 메시지 수신 오류: {:?}", "Consumer", e);
                    continue;
                }
            };
            debug!(
                "{:<12} --> partition={} offset={}",
                "Consumer",
                message.partition(),
                message.offset()
            );

            match decode_event(message.payload()) {
                Ok(Some(event)) => handler(event).await,
                Ok(None) => warn!("{:<12} --> 빈 페이로드 수신", "Consumer"),
                Err(e) => error!("{:<12} --> 이벤트 복원 실패: {}", "Consumer", e),
            }
        }
    }
}

// endregion: --- Kafka Consumer

// region:    --- Kafka Manager
pub struct KafkaManager {
    producer: Arc<KafkaProducer>,
    consumer: Arc<KafkaConsumer>,
    brokers: String,
}

impl KafkaManager {
    pub fn new(brokers: &str, group_id: &str, events_topic: &str) -> Result<Self, BrokerError> {
        Ok(KafkaManager {
            producer: Arc::new(KafkaProducer::new(brokers, events_topic)?),
            consumer: Arc::new(KafkaConsumer::new(brokers, group_id)?),
            brokers: brokers.to_string(),
        })
    }

    pub fn get_producer(&self) -> Arc<KafkaProducer> {
        Arc::clone(&self.producer)
    }

    pub fn get_consumer(&self) -> Arc<KafkaConsumer> {
        Arc::clone(&self.consumer)
    }

    /// 연결 확인: 확인용 토픽에 보낸 메시지를 다시 받을 때까지 대기
    pub async fn initialize(&self) -> Result<(), BrokerError> {
        info!("{:<12} --> Kafka 연결 확인 시작", "Manager");
        let consumer = &self.consumer.consumer;

        consumer.subscribe(&[HANDSHAKE_TOPIC])?;
        self.producer
            .send_raw(HANDSHAKE_TOPIC, "init-key", HANDSHAKE_PAYLOAD)
            .await?;

        for attempt in 1..=HANDSHAKE_ATTEMPTS {
            match time::timeout(Duration::from_secs(1), consumer.recv()).await {
                Ok(Ok(message)) if message.payload() == Some(HANDSHAKE_PAYLOAD) => {
                    consumer.unsubscribe();
                    info!("{:<12} --> Kafka 연결 확인 완료", "Manager");
                    return Ok(());
                }
                Ok(Ok(_)) => {}
                Ok(Err(e)) => error!("{:<12} --> 확인 메시지 수신 오류: {:?}", "Manager", e),
                Err(_) => warn!(
                    "{:<12} --> 확인 메시지 대기 중 ({}/{})",
                    "Manager", attempt, HANDSHAKE_ATTEMPTS
                ),
            }
        }

        consumer.unsubscribe();
        Err(BrokerError::Handshake(format!(
            "{} 에서 확인 메시지를 받지 못했습니다",
            HANDSHAKE_TOPIC
        )))
    }

    /// 토픽 생성 (이미 있으면 경고만 남김)
    pub async fn create_topic(
        &self,
        topic_name: &str,
        num_partitions: i32,
        replication_factor: i32,
    ) -> Result<(), BrokerError> {
        let admin_client: AdminClient<DefaultClientContext> = ClientConfig::new()
            .set("bootstrap.servers", &self.brokers)
            .create()?;

        let new_topic = NewTopic::new(
            topic_name,
            num_partitions,
            TopicReplication::Fixed(replication_factor),
        );
        let results = admin_client
            .create_topics(&[new_topic], &AdminOptions::new())
            .await?;

        for result in results {
            match result {
                Ok(name) => info!("{:<12} --> 토픽 생성: {}", "Manager", name),
                Err((name, code)) => warn!(
                    "{:<12} --> 토픽 생성 건너뜀: {} ({:?})",
                    "Manager", name, code
                ),
            }
        }
        Ok(())
    }
}

// endregion: --- Kafka Manager

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    #[test]
    fn decode_skips_empty_payloads() {
        assert!(decode_event(None).unwrap().is_none());
        assert!(decode_event(Some(&b""[..])).unwrap().is_none());
    }

    #[test]
    fn decode_restores_ledger_event() {
        let event = Event {
            id: 7,
            aggregate_id: 3,
            event_type: "AuctionOpened".to_string(),
            data: serde_json::json!({ "AuctionOpened": { "item_id": 3, "timestamp": Utc::now() } }),
            timestamp: Utc::now(),
            version: 2,
        };
        let bytes = serde_json::to_vec(&event).unwrap();
        assert_eq!(decode_event(Some(bytes.as_slice())).unwrap(), Some(event));
    }

    #[test]
    fn decode_rejects_garbage() {
        assert!(matches!(
            decode_event(Some(&b"not json"[..])),
            Err(BrokerError::Serialization(_))
        ));
    }
}
