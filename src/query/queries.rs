/// 상품 컬럼 목록
macro_rules! item_columns {
    () => {
        "id, title, description, category, subcategory, seller_id, auction_type, status, \
         start_price, current_price, min_price, max_price, reserve_price, leading_bidder_id, \
         bid_count, images, auction_result, approved_for_live, start_time, end_time, \
         extended_until, last_bid_at, version, created_at"
    };
}

/// 상품 등록
pub const INSERT_ITEM: &str = concat!(
    "INSERT INTO items (title, description, category, subcategory, seller_id, auction_type, status, \
     start_price, current_price, min_price, max_price, reserve_price, images, approved_for_live, \
     start_time, end_time, version, created_at) \
     VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $8, $9, $10, $11, $12, $13, $14, $15, 1, $16) \
     RETURNING ",
    item_columns!()
);

/// 상품 조회
pub const GET_ITEM: &str = concat!("SELECT ", item_columns!(), " FROM items WHERE id = $1");

/// 상품 목록 조회 (NULL 파라미터는 필터 미적용)
pub const LIST_ITEMS: &str = concat!(
    "SELECT ",
    item_columns!(),
    " FROM items \
     WHERE ($1::BIGINT IS NULL OR id = $1) \
       AND ($2::TEXT IS NULL OR category = $2) \
       AND ($3::TEXT IS NULL OR subcategory = $3) \
     ORDER BY created_at DESC, id DESC"
);

/// 상태별 상품 조회
pub const ITEMS_IN_STATUS: &str = concat!(
    "SELECT ",
    item_columns!(),
    " FROM items WHERE status = ANY($1) ORDER BY start_time ASC"
);

/// 버전 기반 조건부 갱신 (낙관적 동시성 제어)
pub const APPLY_ITEM_PATCH: &str = concat!(
    "UPDATE items SET \
       status = COALESCE($3, status), \
       auction_type = COALESCE($4, auction_type), \
       current_price = COALESCE($5, current_price), \
       start_price = COALESCE($6, start_price), \
       leading_bidder_id = CASE WHEN $12 THEN $7 ELSE leading_bidder_id END, \
       extended_until = COALESCE($8, extended_until), \
       last_bid_at = COALESCE($9, last_bid_at), \
       auction_result = COALESCE($10, auction_result), \
       bid_count = bid_count + CASE WHEN $11 THEN 1 ELSE 0 END, \
       version = version + 1 \
     WHERE id = $1 AND version = $2 \
     RETURNING ",
    item_columns!()
);

/// 입찰 기록 추가
pub const INSERT_BID: &str = r#"
    INSERT INTO bids (item_id, bidder_id, bid_amount, increment, auction_type_at_bid, source, created_at)
    VALUES ($1, $2, $3, $4, $5, $6, $7)
    RETURNING id, item_id, bidder_id, bid_amount, increment, auction_type_at_bid, source, created_at
"#;

/// 상품 입찰 조회
pub const GET_ITEM_BIDS: &str = r#"
    SELECT id, item_id, bidder_id, bid_amount, increment, auction_type_at_bid, source, created_at
    FROM bids
    WHERE item_id = $1
    ORDER BY created_at DESC, id DESC
"#;

/// 원장 이벤트 추가
pub const INSERT_EVENT: &str = r#"
    INSERT INTO events (aggregate_id, event_type, data, timestamp, version)
    VALUES ($1, $2, $3, $4, $5)
    RETURNING id, aggregate_id, event_type, data, timestamp, version
"#;

/// 원장 조회
pub const GET_ITEM_EVENTS: &str = r#"
    SELECT id, aggregate_id, event_type, data, timestamp, version
    FROM events
    WHERE aggregate_id = $1
    ORDER BY version ASC
"#;

/// 자동 입찰 등록 (사용자별 하나)
pub const UPSERT_AUTO_BID: &str = r#"
    INSERT INTO auto_bids (item_id, user_id, increment, maximum, is_active, created_at)
    VALUES ($1, $2, $3, $4, TRUE, $5)
    ON CONFLICT (item_id, user_id)
    DO UPDATE SET increment = EXCLUDED.increment, maximum = EXCLUDED.maximum,
                  is_active = TRUE, created_at = EXCLUDED.created_at
    RETURNING id, item_id, user_id, increment, maximum, is_active, created_at
"#;

pub const GET_AUTO_BID: &str = r#"
    SELECT id, item_id, user_id, increment, maximum, is_active, created_at
    FROM auto_bids
    WHERE item_id = $1 AND user_id = $2 AND is_active
"#;

pub const DELETE_AUTO_BID: &str = "DELETE FROM auto_bids WHERE item_id = $1 AND user_id = $2";

pub const ACTIVE_AUTO_BIDS: &str = r#"
    SELECT id, item_id, user_id, increment, maximum, is_active, created_at
    FROM auto_bids
    WHERE item_id = $1 AND is_active
    ORDER BY maximum DESC, created_at ASC
"#;

/// 정산
pub const INSERT_SETTLEMENT: &str = r#"
    INSERT INTO settlements
        (item_id, buyer_id, final_price, platform_fee, platform_fee_vat, net_amount, status, created_at)
    VALUES ($1, $2, $3, $4, $5, $6, 'pending', $7)
    ON CONFLICT (item_id) DO NOTHING
"#;

pub const GET_SETTLEMENT: &str = r#"
    SELECT id, item_id, buyer_id, final_price, platform_fee, platform_fee_vat, net_amount, status,
        created_at
    FROM settlements
    WHERE item_id = $1
"#;

/// 알림 (재처리 시 중복 방지)
pub const INSERT_NOTIFICATION: &str = r#"
    INSERT INTO notifications (user_id, item_id, event_id, kind, message)
    VALUES ($1, $2, $3, $4, $5)
    ON CONFLICT (event_id, user_id, kind) DO NOTHING
"#;

pub const GET_USER_NOTIFICATIONS: &str = r#"
    SELECT id, user_id, item_id, event_id, kind, message, created_at
    FROM notifications
    WHERE user_id = $1
    ORDER BY id DESC
"#;

/// VIP 회원 신청
pub const INSERT_MEMBERSHIP_REQUEST: &str = r#"
    INSERT INTO membership_requests (full_name, email, phone, message, created_at)
    VALUES ($1, $2, $3, $4, $5)
    RETURNING id, full_name, email, phone, message, created_at
"#;
