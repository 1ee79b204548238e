// region:    --- Imports
use crate::app::AppState;
use crate::auction::model::{
    AutoBid, Bid, Item, ItemFilter, MembershipRequest, NewAutoBid, NewItem, NewMembershipRequest,
    Notification, Settlement,
};
use crate::bidding::auto_bid;
use crate::bidding::commands::{
    handle_cancel, handle_confirm_sale, handle_list_item, handle_place_bid, ConfirmSaleCommand,
    PlaceBidCommand,
};
use crate::error::{AppError, AppResult};
use crate::event_store::Event;
use crate::query::handlers::{self as query, AuctionView, LeaderboardEntry, PhaseView};
use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::Json;
use chrono::Utc;
use serde_json::{json, Value};
use tracing::info;

// endregion: --- Imports

// region:    --- Command Handlers

/// 입찰 요청 처리
pub async fn handle_submit_bid(
    State(state): State<AppState>,
    payload: Result<Json<PlaceBidCommand>, JsonRejection>,
) -> AppResult<Json<Value>> {
    let Json(cmd) = payload?;
    let receipt = handle_place_bid(cmd, state.store.as_ref(), state.publisher.as_ref()).await?;

    info!(
        "{:<12} --> 입찰 완료 item={} price={}",
        "Handler", receipt.item.id, receipt.item.current_price
    );
    Ok(Json(json!({
        "success": true,
        "current_price": receipt.item.current_price,
        "leading_bidder_id": receipt.item.leading_bidder_id,
        "extended_until": receipt.item.extended_until,
        "bid": receipt.bid,
        "auto_bids": receipt.auto_bids,
    })))
}

/// 상품 등록
pub async fn handle_create_item(
    State(state): State<AppState>,
    payload: Result<Json<NewItem>, JsonRejection>,
) -> AppResult<(StatusCode, Json<Item>)> {
    let Json(new_item) = payload?;
    let item = handle_list_item(new_item, state.store.as_ref(), state.publisher.as_ref()).await?;
    Ok((StatusCode::CREATED, Json(item)))
}

/// 판매 확정
pub async fn handle_confirm(
    State(state): State<AppState>,
    payload: Result<Json<ConfirmSaleCommand>, JsonRejection>,
) -> AppResult<Json<Value>> {
    let Json(cmd) = payload?;
    let item = handle_confirm_sale(cmd, state.store.as_ref(), state.publisher.as_ref()).await?;
    Ok(Json(json!({ "success": true, "item": item })))
}

/// 경매 취소
pub async fn handle_cancel_auction(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> AppResult<Json<Item>> {
    let item = handle_cancel(id, state.store.as_ref(), state.publisher.as_ref()).await?;
    Ok(Json(item))
}

/// 자동 입찰 등록
pub async fn handle_register_auto_bid(
    State(state): State<AppState>,
    payload: Result<Json<NewAutoBid>, JsonRejection>,
) -> AppResult<(StatusCode, Json<AutoBid>)> {
    let Json(cmd) = payload?;
    let registered = auto_bid::register(cmd, state.store.as_ref(), state.publisher.as_ref()).await?;
    Ok((StatusCode::CREATED, Json(registered)))
}

/// 자동 입찰 해제
pub async fn handle_delete_auto_bid(
    State(state): State<AppState>,
    Path((item_id, user_id)): Path<(i64, i64)>,
) -> AppResult<Json<Value>> {
    if !state.store.delete_auto_bid(item_id, user_id).await? {
        return Err(AppError::NotFound("لا توجد مزايدة تلقائية".to_string()));
    }
    info!(
        "{:<12} --> 자동 입찰 해제 item={} user={}",
        "Handler", item_id, user_id
    );
    Ok(Json(json!({ "success": true })))
}

/// VIP 경매 회원 신청
pub async fn handle_executive_request(
    State(state): State<AppState>,
    payload: Result<Json<NewMembershipRequest>, JsonRejection>,
) -> AppResult<(StatusCode, Json<MembershipRequest>)> {
    let Json(request) = payload?;
    request.validate().map_err(AppError::InvalidRequest)?;
    let saved = state
        .store
        .insert_membership_request(request, Utc::now())
        .await?;
    info!("{:<12} --> VIP 회원 신청 id={}", "Handler", saved.id);
    Ok((StatusCode::CREATED, Json(saved)))
}

// endregion: --- Command Handlers

// region:    --- Query Handlers

/// 상품 목록 조회
pub async fn handle_get_items(
    State(state): State<AppState>,
    Query(filter): Query<ItemFilter>,
) -> AppResult<Json<Vec<Item>>> {
    Ok(Json(query::list_items(state.store.as_ref(), &filter).await?))
}

/// 상품 조회
pub async fn handle_get_item(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> AppResult<Json<Item>> {
    Ok(Json(query::get_item(state.store.as_ref(), id).await?))
}

/// 상품 입찰 이력
pub async fn handle_get_item_bids(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> AppResult<Json<Vec<Bid>>> {
    Ok(Json(query::get_bid_history(state.store.as_ref(), id).await?))
}

/// 정산 조회
pub async fn handle_get_settlement(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> AppResult<Json<Settlement>> {
    state
        .store
        .get_settlement(id)
        .await?
        .map(Json)
        .ok_or_else(|| AppError::NotFound(format!("لا توجد تسوية للمزاد رقم {}", id)))
}

/// 경매 상세
pub async fn handle_get_auction(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> AppResult<Json<AuctionView>> {
    Ok(Json(
        query::get_auction_view(state.store.as_ref(), id, Utc::now()).await?,
    ))
}

/// 리더보드
pub async fn handle_get_leaderboard(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> AppResult<Json<Vec<LeaderboardEntry>>> {
    Ok(Json(query::get_leaderboard(state.store.as_ref(), id).await?))
}

/// 원장 이벤트 (버전 오름차순)
pub async fn handle_get_auction_events(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> AppResult<Json<Vec<Event>>> {
    query::get_item(state.store.as_ref(), id).await?;
    Ok(Json(state.store.list_events(id).await?))
}

/// 인스턴트 경매 조회
pub async fn handle_get_instant_auction(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> AppResult<Json<Item>> {
    Ok(Json(
        query::get_instant_auction(state.store.as_ref(), id).await?,
    ))
}

/// 현재 라이브 경매
pub async fn handle_live_current(State(state): State<AppState>) -> AppResult<Json<Item>> {
    Ok(Json(
        query::current_live_item(state.store.as_ref(), None).await?,
    ))
}

/// 현재 라이브 번호판 경매
pub async fn handle_live_plate(State(state): State<AppState>) -> AppResult<Json<Item>> {
    Ok(Json(
        query::current_live_item(state.store.as_ref(), Some(query::PLATE_CATEGORY)).await?,
    ))
}

/// 현재 시장 시간대
pub async fn handle_market_phase(State(state): State<AppState>) -> Json<PhaseView> {
    Json(query::market_phase(&state.clock, Utc::now()))
}

/// 자동 입찰 조회
pub async fn handle_get_auto_bid(
    State(state): State<AppState>,
    Path((item_id, user_id)): Path<(i64, i64)>,
) -> AppResult<Json<AutoBid>> {
    state
        .store
        .get_auto_bid(item_id, user_id)
        .await?
        .map(Json)
        .ok_or_else(|| AppError::NotFound("لا توجد مزايدة تلقائية".to_string()))
}

/// 사용자 알림 (최신순)
pub async fn handle_get_notifications(
    State(state): State<AppState>,
    Path(user_id): Path<i64>,
) -> AppResult<Json<Vec<Notification>>> {
    Ok(Json(state.store.list_notifications(user_id).await?))
}

// endregion: --- Query Handlers
