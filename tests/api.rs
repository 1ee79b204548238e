use chrono::{DateTime, Duration, Utc};
use dasm_auction::app::{build_router, AppState};
use dasm_auction::auction::phase::MarketClock;
use dasm_auction::event_store::{EventConsumer, LocalEventBus};
use dasm_auction::notifications::NotificationProjector;
use dasm_auction::store::{AuctionStore, MemoryStore};
use reqwest::{Client, StatusCode};
use serde_json::{json, Value};
use std::sync::Arc;
use tokio::net::TcpListener;

/// 트레이싱 초기화 (여러 테스트에서 호출되어도 한 번만 적용)
fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .without_time()
        .with_target(false)
        .with_test_writer()
        .try_init();
}

/// 메모리 저장소 + 로컬 이벤트 버스로 서버를 임의 포트에 띄운다
async fn spawn_app() -> String {
    init_tracing();

    let store: Arc<dyn AuctionStore> = Arc::new(MemoryStore::new());
    let (bus, receiver) = LocalEventBus::channel();
    let consumer = EventConsumer::new(Arc::new(NotificationProjector::new(Arc::clone(&store))));
    tokio::spawn(async move { consumer.start_local(receiver).await });

    let router = build_router(AppState {
        store,
        publisher: Arc::new(bus),
        clock: MarketClock::from_offset_hours(3).unwrap(),
    });

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, router.into_make_service())
            .await
            .unwrap();
    });
    format!("http://{}", addr)
}

fn item_body(auction_type: &str, start_price: i64, category: &str) -> Value {
    json!({
        "title": "Toyota Camry 2021",
        "description": "فحص كامل",
        "category": category,
        "seller_id": 100,
        "auction_type": auction_type,
        "start_price": start_price,
        "approved_for_live": true,
        "start_time": (Utc::now() - Duration::minutes(5)).to_rfc3339(),
        "end_time": (Utc::now() + Duration::hours(2)).to_rfc3339(),
    })
}

async fn create_item(client: &Client, base: &str, body: Value) -> Value {
    let response = client
        .post(format!("{}/api/items", base))
        .json(&body)
        .send()
        .await
        .expect("Failed to send request");
    assert_eq!(response.status(), StatusCode::CREATED);
    response.json().await.unwrap()
}

async fn submit_bid(
    client: &Client,
    base: &str,
    item_id: i64,
    bidder: i64,
    amount: i64,
) -> (StatusCode, Value) {
    let response = client
        .post(format!("{}/api/submit-bid", base))
        .json(&json!({ "item_id": item_id, "bidder_id": bidder, "bid_amount": amount }))
        .send()
        .await
        .expect("Failed to send request");
    let status = response.status();
    (status, response.json().await.unwrap())
}

async fn get_json(client: &Client, url: String) -> (StatusCode, Value) {
    let response = client.get(url).send().await.expect("Failed to send request");
    let status = response.status();
    (status, response.json().await.unwrap())
}

/// 라이브 경매: 현재가와 같은 입찰은 거절, 1 높은 입찰은 수락
#[tokio::test]
async fn test_live_bid_must_exceed_current_price() {
    let base = spawn_app().await;
    let client = Client::new();
    let item = create_item(&client, &base, item_body("live", 100_000, "cars")).await;
    let id = item["id"].as_i64().unwrap();

    let (status, body) = submit_bid(&client, &base, id, 1, 100_000).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "LOW_BID");
    assert!(body["error"].is_string());

    let (status, body) = submit_bid(&client, &base, id, 1, 100_001).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], true);
    assert_eq!(body["current_price"], 100_001);

    let (_, item) = get_json(&client, format!("{}/api/items/{}", base, id)).await;
    assert_eq!(item["current_price"], 100_001);
    assert_eq!(item["bid_count"], 1);
    assert_eq!(item["leading_bidder_id"], 1);
}

/// 사일런트 경매: 현재가의 90% 까지 허용
#[tokio::test]
async fn test_silent_bid_floor() {
    let base = spawn_app().await;
    let client = Client::new();
    let item = create_item(&client, &base, item_body("silent", 100_000, "cars")).await;
    let id = item["id"].as_i64().unwrap();

    let (status, body) = submit_bid(&client, &base, id, 1, 90_000).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["current_price"], 100_000);

    let (status, body) = submit_bid(&client, &base, id, 2, 89_999).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "BELOW_SILENT_FLOOR");
}

/// 동시 입찰: 최종 가격은 수락된 최고 입찰가, 원장 버전은 연속
#[tokio::test]
async fn test_concurrent_bidding() {
    let base = spawn_app().await;
    let client = Client::new();
    let item = create_item(&client, &base, item_body("instant", 1_000, "cars")).await;
    let id = item["id"].as_i64().unwrap();

    let mut handles = Vec::new();
    for bidder in 1..=30i64 {
        let client = client.clone();
        let base = base.clone();
        handles.push(tokio::spawn(async move {
            let amount = 1_000 + bidder * 100;
            let (status, _) = submit_bid(&client, &base, id, bidder, amount).await;
            (status, amount)
        }));
    }

    let mut accepted = Vec::new();
    for handle in handles {
        let (status, amount) = handle.await.unwrap();
        if status == StatusCode::OK {
            accepted.push(amount);
        } else {
            assert_ne!(status, StatusCode::INTERNAL_SERVER_ERROR);
        }
    }
    assert!(!accepted.is_empty());

    let (_, item) = get_json(&client, format!("{}/api/items/{}", base, id)).await;
    assert_eq!(item["current_price"], *accepted.iter().max().unwrap());
    assert_eq!(item["bid_count"], accepted.len() as i64);

    let (_, events) = get_json(&client, format!("{}/api/auctions/{}/events", base, id)).await;
    let versions: Vec<i64> = events
        .as_array()
        .unwrap()
        .iter()
        .map(|e| e["version"].as_i64().unwrap())
        .collect();
    let expected: Vec<i64> = (1..=versions.len() as i64).collect();
    assert_eq!(versions, expected);
    assert_eq!(versions.len(), accepted.len() + 1);
}

/// 판매 확정 후 정산 조회
#[tokio::test]
async fn test_confirm_sale_creates_settlement() {
    let base = spawn_app().await;
    let client = Client::new();
    let item = create_item(&client, &base, item_body("live", 50_000, "cars")).await;
    let id = item["id"].as_i64().unwrap();

    let (status, _) = get_json(&client, format!("{}/api/items/{}/settlement", base, id)).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    submit_bid(&client, &base, id, 7, 60_000).await;
    let response = client
        .post(format!("{}/api/items/confirm-sale", base))
        .json(&json!({ "itemId": id, "result": "sold" }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["item"]["status"], "settled");
    assert_eq!(body["item"]["auction_result"], "sold");

    let (status, settlement) = get_json(&client, format!("{}/api/items/{}/settlement", base, id)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(settlement["buyer_id"], 7);
    // 50,000 ~ 99,999 구간 수수료 700 + 부가세 105
    assert_eq!(settlement["platform_fee"], 700);
    assert_eq!(settlement["platform_fee_vat"], 105);
    assert_eq!(settlement["net_amount"], 59_195);

    // 종료된 경매에는 입찰 불가
    let (status, body) = submit_bid(&client, &base, id, 8, 70_000).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "ALREADY_ENDED");
}

/// 자동 입찰 등록, 조회, 해제
#[tokio::test]
async fn test_auto_bid_flow() {
    let base = spawn_app().await;
    let client = Client::new();
    let item = create_item(&client, &base, item_body("instant", 10_000, "cars")).await;
    let id = item["id"].as_i64().unwrap();

    let response = client
        .post(format!("{}/api/auto-bids", base))
        .json(&json!({ "item_id": id, "user_id": 2, "increment": 500, "maximum": 20_000 }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CREATED);

    // 수동 입찰이 들어오면 자동 입찰이 곧바로 선두를 되찾는다
    let (status, body) = submit_bid(&client, &base, id, 1, 12_000).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["leading_bidder_id"], 2);
    assert_eq!(body["current_price"], 12_500);
    assert_eq!(body["auto_bids"].as_array().unwrap().len(), 1);

    let (status, auto_bid) = get_json(&client, format!("{}/api/auto-bids/{}/2", base, id)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(auto_bid["maximum"], 20_000);

    let response = client
        .delete(format!("{}/api/auto-bids/{}/2", base, id))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let (status, _) = get_json(&client, format!("{}/api/auto-bids/{}/2", base, id)).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let response = client
        .post(format!("{}/api/auto-bids", base))
        .json(&json!({ "item_id": id, "user_id": 3, "increment": 100, "maximum": 30_000 }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["code"], "AUTO_BID_TOO_LOW");
}

/// 선두를 빼앗긴 입찰자에게 알림
#[tokio::test]
async fn test_outbid_notification() {
    let base = spawn_app().await;
    let client = Client::new();
    let item = create_item(&client, &base, item_body("live", 100_000, "cars")).await;
    let id = item["id"].as_i64().unwrap();

    submit_bid(&client, &base, id, 1, 101_000).await;
    submit_bid(&client, &base, id, 2, 102_000).await;

    // 이벤트 처리 대기
    let mut kinds = Vec::new();
    for _ in 0..40 {
        let (_, notes) = get_json(&client, format!("{}/api/users/1/notifications", base)).await;
        kinds = notes
            .as_array()
            .unwrap()
            .iter()
            .map(|n| n["kind"].as_str().unwrap().to_string())
            .collect();
        if !kinds.is_empty() {
            break;
        }
        tokio::time::sleep(tokio::time::Duration::from_millis(50)).await;
    }
    assert_eq!(kinds, vec!["outbid".to_string()]);
}

/// 경매 상세, 리더보드, 라이브 마켓 조회
#[tokio::test]
async fn test_read_models() {
    let base = spawn_app().await;
    let client = Client::new();
    let car = create_item(&client, &base, item_body("live", 100_000, "cars")).await;
    let plate = create_item(&client, &base, item_body("live", 5_000, "plates")).await;
    let car_id = car["id"].as_i64().unwrap();

    submit_bid(&client, &base, car_id, 1, 101_000).await;
    submit_bid(&client, &base, car_id, 2, 103_000).await;
    submit_bid(&client, &base, car_id, 1, 104_000).await;

    let (status, view) = get_json(&client, format!("{}/api/auctions/{}", base, car_id)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(view["highest_bid"], 104_000);
    assert_eq!(view["bid_count"], 3);
    assert_eq!(view["ending_soon"], false);
    assert!(view["time_remaining_secs"].as_i64().unwrap() > 0);

    let (_, board) = get_json(&client, format!("{}/api/auctions/{}/leaderboard", base, car_id)).await;
    let board = board.as_array().unwrap();
    assert_eq!(board.len(), 2);
    assert_eq!(board[0]["bidder_id"], 1);
    assert_eq!(board[0]["highest_bid"], 104_000);

    let (status, plate_now) = get_json(&client, format!("{}/api/live-market/plate", base)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(plate_now["id"], plate["id"]);

    let (status, _) = get_json(&client, format!("{}/api/live-market/current", base)).await;
    assert_eq!(status, StatusCode::OK);

    // 라이브 상품은 인스턴트 경매 조회에서 404
    let (status, _) = get_json(&client, format!("{}/api/instant-auctions/{}", base, car_id)).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, phase) = get_json(&client, format!("{}/api/market/phase", base)).await;
    assert_eq!(status, StatusCode::OK);
    assert!(["live", "instant", "silent"].contains(&phase["phase"].as_str().unwrap()));

    let (_, cars) = get_json(&client, format!("{}/api/items?category=cars", base)).await;
    assert_eq!(cars.as_array().unwrap().len(), 1);
}

/// 오류 응답 형식
#[tokio::test]
async fn test_error_responses() {
    let base = spawn_app().await;
    let client = Client::new();

    let (status, body) = get_json(&client, format!("{}/api/items/9999", base)).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["code"], "NOT_FOUND");

    let (status, body) = submit_bid(&client, &base, 9999, 1, 1_000).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["code"], "NOT_FOUND");

    let response = client
        .post(format!("{}/api/submit-bid", base))
        .json(&json!({ "item_id": "abc" }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["code"], "INVALID_REQUEST");

    let mut invalid = item_body("live", 1_000, "cars");
    invalid["title"] = json!("  ");
    let response = client
        .post(format!("{}/api/items", base))
        .json(&invalid)
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

/// VIP 경매 회원 신청
#[tokio::test]
async fn test_executive_membership_request() {
    let base = spawn_app().await;
    let client = Client::new();

    let response = client
        .post(format!("{}/api/executive-auctions", base))
        .json(&json!({
            "full_name": "عبدالله القحطاني",
            "email": "abdullah@example.com",
            "phone": "+966 50 123 4567",
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CREATED);
    let saved: Value = response.json().await.unwrap();
    assert!(saved["id"].as_i64().unwrap() > 0);

    let response = client
        .post(format!("{}/api/executive-auctions", base))
        .json(&json!({ "full_name": "x", "email": "not-an-email", "phone": "0501234567" }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

/// 판매자는 자기 상품에 입찰할 수 없다
#[tokio::test]
async fn test_seller_cannot_bid_on_own_item() {
    let base = spawn_app().await;
    let client = Client::new();
    let item = create_item(&client, &base, item_body("live", 10_000, "cars")).await;
    let id = item["id"].as_i64().unwrap();

    let (status, body) = submit_bid(&client, &base, id, 100, 20_000).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "OWN_AUCTION");

    let (status, body) = submit_bid(&client, &base, id, 5, i64::MAX / 4).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "BID_TOO_HIGH");

    let (_, item) = get_json(&client, format!("{}/api/items/{}", base, id)).await;
    assert_eq!(item["bid_count"], 0);
}

/// 종료 직전 입찰은 종료 시간을 5분 연장한다
#[tokio::test]
async fn test_last_minute_bid_extends_end_time() {
    let base = spawn_app().await;
    let client = Client::new();
    let mut body = item_body("live", 10_000, "cars");
    body["end_time"] = json!((Utc::now() + Duration::seconds(30)).to_rfc3339());
    let item = create_item(&client, &base, body).await;
    let id = item["id"].as_i64().unwrap();
    let end = DateTime::parse_from_rfc3339(item["end_time"].as_str().unwrap()).unwrap();

    let (status, body) = submit_bid(&client, &base, id, 1, 11_000).await;
    assert_eq!(status, StatusCode::OK);
    let extended =
        DateTime::parse_from_rfc3339(body["extended_until"].as_str().unwrap()).unwrap();
    assert_eq!(extended, end + Duration::minutes(5));

    let (_, auction) = get_json(&client, format!("{}/api/items/{}", base, id)).await;
    let stored =
        DateTime::parse_from_rfc3339(auction["extended_until"].as_str().unwrap()).unwrap();
    assert_eq!(stored, extended);
}
