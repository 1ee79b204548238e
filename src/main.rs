// region:    --- Imports
use dasm_auction::app::{build_router, AppState};
use dasm_auction::auction::phase::MarketClock;
use dasm_auction::config::{Config, ConfigError, EventBus, StoreBackend};
use dasm_auction::database::DatabaseManager;
use dasm_auction::event_store::{EventConsumer, EventPublisher, LocalEventBus};
use dasm_auction::message_broker::KafkaManager;
use dasm_auction::notifications::NotificationProjector;
use dasm_auction::scheduler::AuctionScheduler;
use dasm_auction::store::{AuctionStore, MemoryStore, PgStore};
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tracing::{error, info, warn};
// endregion: --- Imports

// region:    --- Main
#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // logging 초기화
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .without_time()
        .with_target(false)
        .init();

    let config = Config::from_env()?;
    let clock = MarketClock::from_offset_hours(config.market_utc_offset_hours).ok_or(
        ConfigError::Invalid {
            key: "MARKET_UTC_OFFSET_HOURS",
            value: config.market_utc_offset_hours.to_string(),
        },
    )?;

    // 저장소 선택
    let store: Arc<dyn AuctionStore> = match config.store_backend {
        StoreBackend::Postgres => {
            let url = config
                .database_url
                .as_deref()
                .ok_or(ConfigError::Missing("DATABASE_URL"))?;
            let db_manager =
                Arc::new(DatabaseManager::connect(url, config.database_max_connections).await?);

            // 데이터베이스 초기화
            if let Err(e) = db_manager.initialize_database().await {
                error!("{:<12} --> 데이터베이스 초기화 실패: {:?}", "Main", e);
                return Err(e.into());
            }
            info!("{:<12} --> 데이터베이스 초기화 성공", "Main");
            Arc::new(PgStore::new(db_manager))
        }
        StoreBackend::Memory => {
            warn!("{:<12} --> 메모리 저장소 사용 (재시작 시 데이터 유실)", "Main");
            Arc::new(MemoryStore::new())
        }
    };

    // 이벤트 소비자: 원장 이벤트 -> 알림
    let event_consumer = EventConsumer::new(Arc::new(NotificationProjector::new(Arc::clone(
        &store,
    ))));

    // 이벤트 버스 선택
    let publisher: Arc<dyn EventPublisher> = match config.event_bus {
        EventBus::Kafka => {
            let kafka_manager = Arc::new(KafkaManager::new(
                &config.kafka_brokers,
                &config.kafka_group_id,
                &config.events_topic,
            )?);
            if let Err(e) = kafka_manager.initialize().await {
                error!("{:<12} --> Kafka 초기화 실패: {:?}", "Main", e);
                return Err(e.into());
            }
            info!("{:<12} --> Kafka 초기화 성공", "Main");

            // 토픽 생성
            kafka_manager.create_topic(&config.events_topic, 5, 1).await?;

            let consumer = kafka_manager.get_consumer();
            let topic = config.events_topic.clone();
            tokio::spawn(async move {
                event_consumer.start_kafka(consumer, &topic).await;
            });
            kafka_manager.get_producer()
        }
        EventBus::Local => {
            let (bus, receiver) = LocalEventBus::channel();
            tokio::spawn(async move {
                event_consumer.start_local(receiver).await;
            });
            Arc::new(bus)
        }
    };

    // 경매 상태 및 시장 시간대 스케줄러
    AuctionScheduler::new(Arc::clone(&store), Arc::clone(&publisher), clock)
        .with_closing_window(chrono::Duration::seconds(config.closing_window_secs))
        .with_phase_rotation(config.phase_rotation)
        .with_tick(Duration::from_millis(config.scheduler_tick_ms))
        .start();

    let routes_all = build_router(AppState {
        store,
        publisher,
        clock,
    });

    let listener = TcpListener::bind(config.bind_addr).await?;
    info!(
        "{:<12} --> Web Server: Listening on {}",
        "Main",
        listener.local_addr()?
    );

    // 서버 실행
    if let Err(err) = axum::serve(listener, routes_all.into_make_service()).await {
        error!("{:<12} --> Server error: {}", "Main", err);
    }
    Ok(())
}
// endregion: --- Main
