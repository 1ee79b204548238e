/// 입찰 규칙
/// - 라이브/인스턴트: 현재가보다 높아야 함
/// - 사일런트: 현재가의 90% 이상이면 허용
// region:    --- Imports
use crate::auction::phase::AuctionType;
use crate::error::{RejectCode, Rejection};
use chrono::{DateTime, Duration, Utc};

// endregion: --- Imports

// region:    --- Constants
/// 마감 직전 입찰 시 연장 기준(초)
pub const EXTENSION_THRESHOLD_SECS: i64 = 60;
/// 연장 시간(분)
pub const EXTENSION_DURATION_MINS: i64 = 5;
/// 입찰가 및 상품 가격 상한 (SAR)
pub const MAX_PRICE: i64 = 1_000_000_000_000;
/// 수수료 부가세(%)
pub const VAT_PERCENT: i64 = 15;
/// 자동 입찰 최소 증가폭
pub const MIN_AUTO_BID_INCREMENT: i64 = 200;
// endregion: --- Constants

// region:    --- Bid Rule
/// 입찰 금액 검증
pub fn validate_bid(
    auction_type: AuctionType,
    current_price: i64,
    bid_amount: i64,
) -> Result<(), Rejection> {
    if bid_amount < 1 {
        return Err(Rejection::new(
            RejectCode::LowBid,
            "مبلغ المزايدة غير صالح",
        ));
    }
    if bid_amount > MAX_PRICE {
        return Err(Rejection::new(
            RejectCode::BidTooHigh,
            format!("يجب ألا يتجاوز مبلغ المزايدة {}", MAX_PRICE),
        ));
    }

    match auction_type {
        AuctionType::Silent => {
            // bid >= current * 0.9 를 정수로 비교
            if (bid_amount as i128) * 10 < (current_price as i128) * 9 {
                return Err(Rejection::new(
                    RejectCode::BelowSilentFloor,
                    format!(
                        "في المزاد الصامت يجب ألا يقل مبلغ المزايدة عن {}",
                        silent_floor(current_price)
                    ),
                ));
            }
        }
        AuctionType::Live | AuctionType::Instant => {
            if bid_amount <= current_price {
                return Err(Rejection::new(
                    RejectCode::LowBid,
                    format!(
                        "يجب أن يكون مبلغ المزايدة أعلى من السعر الحالي {}",
                        current_price
                    ),
                ));
            }
        }
    }
    Ok(())
}

/// 판매자는 자기 상품에 입찰할 수 없다
pub fn ensure_not_seller(
    seller_id: Option<i64>,
    bidder_id: Option<i64>,
) -> Result<(), Rejection> {
    match (seller_id, bidder_id) {
        (Some(seller), Some(bidder)) if seller == bidder => Err(Rejection::new(
            RejectCode::OwnAuction,
            "لا يمكنك المزايدة على مزادك الخاص",
        )),
        _ => Ok(()),
    }
}

/// 사일런트 최저 허용가 (현재가의 90%, 올림)
pub fn silent_floor(current_price: i64) -> i64 {
    let scaled = current_price as i128 * 9;
    ((scaled + 9) / 10) as i64
}
// endregion: --- Bid Rule

// region:    --- Anti Sniping
/// 종료 직전 입찰이면 새 종료 시간을 반환
pub fn sniping_extension(
    effective_end: DateTime<Utc>,
    bid_time: DateTime<Utc>,
) -> Option<DateTime<Utc>> {
    if bid_time >= effective_end {
        return None;
    }
    let remaining = effective_end - bid_time;
    if remaining <= Duration::seconds(EXTENSION_THRESHOLD_SECS) {
        Some(effective_end + Duration::minutes(EXTENSION_DURATION_MINS))
    } else {
        None
    }
}
// endregion: --- Anti Sniping

// region:    --- Increments & Fees
/// 현재가 구간별 자동 입찰 증가폭 (SAR)
pub fn tier_increment(current_price: i64) -> i64 {
    match current_price {
        p if p < 1_000 => 50,
        p if p < 5_000 => 100,
        p if p < 10_000 => 250,
        p if p < 50_000 => 500,
        p if p < 100_000 => 1_000,
        _ => 2_000,
    }
}

/// 낙찰가 구간별 플랫폼 수수료 (고정 금액, SAR). 낙찰가를 넘지 않는다.
pub fn commission_for(final_price: i64) -> i64 {
    let tier = match final_price {
        p if p < 50_000 => 350,
        p if p < 100_000 => 700,
        p if p < 150_000 => 1_000,
        p if p < 200_000 => 1_500,
        p if p < 500_000 => 2_500,
        _ => 5_000,
    };
    tier.min(final_price.max(0))
}

/// 수수료 부가세 15% (반올림)
pub fn commission_vat(commission: i64) -> i64 {
    let scaled = commission as i128 * VAT_PERCENT as i128;
    ((scaled + 50) / 100) as i64
}
// endregion: --- Increments & Fees

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn live_bid_must_be_strictly_higher() {
        let err = validate_bid(AuctionType::Live, 100_000, 100_000).unwrap_err();
        assert_eq!(err.code, RejectCode::LowBid);
        assert!(validate_bid(AuctionType::Live, 100_000, 100_001).is_ok());
    }

    #[test]
    fn instant_follows_live_rule() {
        assert!(validate_bid(AuctionType::Instant, 5_000, 4_999).is_err());
        assert!(validate_bid(AuctionType::Instant, 5_000, 5_001).is_ok());
    }

    #[test]
    fn silent_allows_ten_percent_below() {
        assert!(validate_bid(AuctionType::Silent, 100_000, 90_000).is_ok());
        let err = validate_bid(AuctionType::Silent, 100_000, 89_999).unwrap_err();
        assert_eq!(err.code, RejectCode::BelowSilentFloor);
        assert!(validate_bid(AuctionType::Silent, 100_000, 150_000).is_ok());
    }

    #[test]
    fn silent_floor_rounds_up_for_uneven_prices() {
        assert_eq!(silent_floor(100_000), 90_000);
        // 0.9 * 1001 = 900.9
        assert_eq!(silent_floor(1_001), 901);
        assert!(validate_bid(AuctionType::Silent, 1_001, 900).is_err());
        assert!(validate_bid(AuctionType::Silent, 1_001, 901).is_ok());
    }

    #[test]
    fn non_positive_amounts_are_rejected() {
        assert!(validate_bid(AuctionType::Silent, 0, 0).is_err());
        assert!(validate_bid(AuctionType::Live, 0, -5).is_err());
    }

    #[test]
    fn last_minute_bid_extends_auction() {
        let end = Utc::now();
        let extended = sniping_extension(end, end - Duration::seconds(30)).unwrap();
        assert_eq!(extended, end + Duration::minutes(5));
        assert_eq!(sniping_extension(end, end - Duration::seconds(61)), None);
        assert_eq!(sniping_extension(end, end), None);
    }

    #[test]
    fn tier_increments() {
        assert_eq!(tier_increment(999), 50);
        assert_eq!(tier_increment(1_000), 100);
        assert_eq!(tier_increment(9_999), 250);
        assert_eq!(tier_increment(49_999), 500);
        assert_eq!(tier_increment(99_999), 1_000);
        assert_eq!(tier_increment(100_000), 2_000);
    }

    #[test]
    fn commission_follows_price_tiers() {
        assert_eq!(commission_for(49_999), 350);
        assert_eq!(commission_for(50_000), 700);
        assert_eq!(commission_for(99_999), 700);
        assert_eq!(commission_for(100_000), 1_000);
        assert_eq!(commission_for(150_000), 1_500);
        assert_eq!(commission_for(200_000), 2_500);
        assert_eq!(commission_for(499_999), 2_500);
        assert_eq!(commission_for(500_000), 5_000);
        // 낙찰가보다 큰 수수료는 없다
        assert_eq!(commission_for(200), 200);
    }

    #[test]
    fn vat_is_fifteen_percent_rounded() {
        assert_eq!(commission_vat(700), 105);
        assert_eq!(commission_vat(350), 53);
        assert_eq!(commission_vat(0), 0);
    }

    #[test]
    fn huge_prices_neither_overflow_nor_pass_validation() {
        let err = validate_bid(AuctionType::Live, 1_000, i64::MAX / 4).unwrap_err();
        assert_eq!(err.code, RejectCode::BidTooHigh);
        assert!(validate_bid(AuctionType::Live, 1_000, MAX_PRICE).is_ok());
        assert_eq!(commission_for(i64::MAX), 5_000);
        assert_eq!(commission_vat(commission_for(i64::MAX)), 750);
    }

    #[test]
    fn seller_cannot_bid_on_own_item() {
        let err = ensure_not_seller(Some(100), Some(100)).unwrap_err();
        assert_eq!(err.code, RejectCode::OwnAuction);
        assert!(ensure_not_seller(Some(100), Some(7)).is_ok());
        assert!(ensure_not_seller(None, Some(100)).is_ok());
        assert!(ensure_not_seller(Some(100), None).is_ok());
    }
}
