use super::lifecycle::AuctionStatus;
use super::phase::AuctionType;
use crate::bidding::rules::MAX_PRICE;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// 상품(경매) 모델
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Item {
    pub id: i64,
    pub title: String,
    pub description: String,
    pub category: String,
    pub subcategory: Option<String>,
    pub seller_id: Option<i64>,
    pub auction_type: AuctionType,
    pub status: AuctionStatus,
    pub start_price: i64,
    pub current_price: i64,
    pub min_price: Option<i64>,
    pub max_price: Option<i64>,
    pub reserve_price: i64,
    pub leading_bidder_id: Option<i64>,
    pub bid_count: i64,
    pub images: Vec<String>,
    pub auction_result: Option<SaleResult>,
    pub approved_for_live: bool,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub extended_until: Option<DateTime<Utc>>,
    pub last_bid_at: Option<DateTime<Utc>>,
    pub version: i64,
    pub created_at: DateTime<Utc>,
}

impl Item {
    /// 연장 시간이 있으면 연장 시간, 없으면 원래 종료 시간
    pub fn effective_end(&self) -> DateTime<Utc> {
        self.extended_until.unwrap_or(self.end_time)
    }
}

// 입찰 모델
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Bid {
    pub id: i64,
    pub item_id: i64,
    pub bidder_id: Option<i64>,
    pub bid_amount: i64,
    pub increment: i64,
    pub auction_type_at_bid: AuctionType,
    pub source: BidSource,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BidSource {
    Manual,
    Auto,
}

impl BidSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            BidSource::Manual => "manual",
            BidSource::Auto => "auto",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "manual" => Some(BidSource::Manual),
            "auto" => Some(BidSource::Auto),
            _ => None,
        }
    }
}

// 판매 확정 결과
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SaleResult {
    Sold,
    #[serde(alias = "not-sold", alias = "unsold")]
    NotSold,
}

impl SaleResult {
    pub fn as_str(&self) -> &'static str {
        match self {
            SaleResult::Sold => "sold",
            SaleResult::NotSold => "not_sold",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "sold" => Some(SaleResult::Sold),
            "not_sold" | "not-sold" | "unsold" => Some(SaleResult::NotSold),
            _ => None,
        }
    }
}

// region:    --- New Item
fn default_auction_type() -> AuctionType {
    AuctionType::Live
}

/// 상품 등록 요청
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewItem {
    pub title: String,
    #[serde(default)]
    pub description: String,
    pub category: String,
    #[serde(default)]
    pub subcategory: Option<String>,
    #[serde(default)]
    pub seller_id: Option<i64>,
    #[serde(default = "default_auction_type")]
    pub auction_type: AuctionType,
    pub start_price: i64,
    #[serde(default)]
    pub min_price: Option<i64>,
    #[serde(default)]
    pub max_price: Option<i64>,
    #[serde(default)]
    pub reserve_price: i64,
    #[serde(default)]
    pub images: Vec<String>,
    #[serde(default)]
    pub approved_for_live: bool,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
}

impl NewItem {
    /// 등록 전 입력값 검증
    pub fn validate(&self) -> Result<(), String> {
        if self.title.trim().is_empty() {
            return Err("عنوان المزاد مطلوب".to_string());
        }
        if self.category.trim().is_empty() {
            return Err("تصنيف المزاد مطلوب".to_string());
        }
        let prices = [
            Some(self.start_price),
            self.min_price,
            self.max_price,
            Some(self.reserve_price),
        ];
        if prices.iter().flatten().any(|p| *p < 0) {
            return Err("لا يمكن أن تكون الأسعار سالبة".to_string());
        }
        if prices.iter().flatten().any(|p| *p > MAX_PRICE) {
            return Err(format!("يجب ألا تتجاوز الأسعار {}", MAX_PRICE));
        }
        if let (Some(min), Some(max)) = (self.min_price, self.max_price) {
            if min > max {
                return Err("الحد الأدنى للسعر أكبر من الحد الأعلى".to_string());
            }
        }
        if self.start_time >= self.end_time {
            return Err("يجب أن يكون وقت البداية قبل وقت النهاية".to_string());
        }
        if self.images.iter().any(|url| url.trim().is_empty()) {
            return Err("رابط صورة غير صالح".to_string());
        }
        Ok(())
    }

    /// 등록 시점 기준 초기 상태
    pub fn initial_status(&self, now: DateTime<Utc>) -> AuctionStatus {
        if self.start_time > now {
            AuctionStatus::Scheduled
        } else {
            AuctionStatus::Live
        }
    }
}
// endregion: --- New Item

/// 상품 목록 필터 (쿼리 파라미터)
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ItemFilter {
    pub id: Option<i64>,
    pub category: Option<String>,
    pub subcategory: Option<String>,
}

impl ItemFilter {
    pub fn matches(&self, item: &Item) -> bool {
        self.id.map_or(true, |id| item.id == id)
            && self
                .category
                .as_deref()
                .map_or(true, |c| item.category == c)
            && self
                .subcategory
                .as_deref()
                .map_or(true, |s| item.subcategory.as_deref() == Some(s))
    }
}

// region:    --- Auto Bid
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, sqlx::FromRow)]
pub struct AutoBid {
    pub id: i64,
    pub item_id: i64,
    pub user_id: i64,
    pub increment: i64,
    pub maximum: i64,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
}

/// 자동 입찰 등록 요청
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewAutoBid {
    pub item_id: i64,
    pub user_id: i64,
    pub increment: i64,
    pub maximum: i64,
}
// endregion: --- Auto Bid

// region:    --- Settlement
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, sqlx::FromRow)]
pub struct Settlement {
    pub id: i64,
    pub item_id: i64,
    pub buyer_id: Option<i64>,
    pub final_price: i64,
    pub platform_fee: i64,
    pub platform_fee_vat: i64,
    pub net_amount: i64,
    pub status: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct NewSettlement {
    pub buyer_id: Option<i64>,
    pub final_price: i64,
    pub platform_fee: i64,
    pub platform_fee_vat: i64,
    pub net_amount: i64,
}
// endregion: --- Settlement

// region:    --- Notification
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, sqlx::FromRow)]
pub struct Notification {
    pub id: i64,
    pub user_id: i64,
    pub item_id: i64,
    pub event_id: i64,
    pub kind: String,
    pub message: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct NewNotification {
    pub user_id: i64,
    pub item_id: i64,
    pub event_id: i64,
    pub kind: &'static str,
    pub message: String,
}
// endregion: --- Notification

// region:    --- Membership
/// VIP(이그제큐티브) 경매 회원 신청
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewMembershipRequest {
    pub full_name: String,
    pub email: String,
    pub phone: String,
    #[serde(default)]
    pub message: Option<String>,
}

impl NewMembershipRequest {
    pub fn validate(&self) -> Result<(), String> {
        if self.full_name.trim().is_empty() {
            return Err("الاسم مطلوب".to_string());
        }
        let email = self.email.trim();
        match email.split_once('@') {
            Some((local, domain)) if !local.is_empty() && domain.contains('.') => {}
            _ => return Err("البريد الإلكتروني غير صالح".to_string()),
        }
        let digits = self.phone.chars().filter(|c| c.is_ascii_digit()).count();
        if digits < 8 {
            return Err("رقم الجوال غير صالح".to_string());
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, sqlx::FromRow)]
pub struct MembershipRequest {
    pub id: i64,
    pub full_name: String,
    pub email: String,
    pub phone: String,
    pub message: Option<String>,
    pub created_at: DateTime<Utc>,
}
// endregion: --- Membership
