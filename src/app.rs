// region:    --- Imports
use crate::auction::phase::MarketClock;
use crate::event_store::EventPublisher;
use crate::handlers;
use crate::store::AuctionStore;
use axum::{
    extract::DefaultBodyLimit,
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};

// endregion: --- Imports

/// 요청 본문 최대 크기 (20MB)
pub const BODY_LIMIT: usize = 1024 * 1024 * 20;

/// 핸들러 공유 상태
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn AuctionStore>,
    pub publisher: Arc<dyn EventPublisher>,
    pub clock: MarketClock,
}

/// 라우터 설정
pub fn build_router(state: AppState) -> Router {
    // 프론트엔드 연동을 위한 cors 설정
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        // 상품
        .route(
            "/api/items",
            get(handlers::handle_get_items).post(handlers::handle_create_item),
        )
        .route("/api/items/confirm-sale", post(handlers::handle_confirm))
        .route("/api/items/:id", get(handlers::handle_get_item))
        .route("/api/items/:id/bids", get(handlers::handle_get_item_bids))
        .route(
            "/api/items/:id/settlement",
            get(handlers::handle_get_settlement),
        )
        // 경매
        .route("/api/auctions/:id", get(handlers::handle_get_auction))
        .route(
            "/api/auctions/:id/leaderboard",
            get(handlers::handle_get_leaderboard),
        )
        .route(
            "/api/auctions/:id/events",
            get(handlers::handle_get_auction_events),
        )
        .route(
            "/api/auctions/:id/cancel",
            post(handlers::handle_cancel_auction),
        )
        .route(
            "/api/instant-auctions/:id",
            get(handlers::handle_get_instant_auction),
        )
        .route("/api/live-market/current", get(handlers::handle_live_current))
        .route("/api/live-market/plate", get(handlers::handle_live_plate))
        .route("/api/market/phase", get(handlers::handle_market_phase))
        // 입찰
        .route("/api/submit-bid", post(handlers::handle_submit_bid))
        .route("/api/auto-bids", post(handlers::handle_register_auto_bid))
        .route(
            "/api/auto-bids/:item_id/:user_id",
            get(handlers::handle_get_auto_bid).delete(handlers::handle_delete_auto_bid),
        )
        // 사용자
        .route(
            "/api/users/:id/notifications",
            get(handlers::handle_get_notifications),
        )
        .route(
            "/api/executive-auctions",
            post(handlers::handle_executive_request),
        )
        .layer(cors)
        .layer(DefaultBodyLimit::max(BODY_LIMIT))
        .with_state(state)
}
