//! Promo code and wheel prize validation.
//!
//! Codes starting with [`WHEEL_PREFIX`] are looked up in the wheel prize
//! ledger; everything else goes to the database validation function.

use be_remote_db::{DiscountType, PromoCode, WheelPrize};
use chrono::{DateTime, Utc};
use rust_decimal::{Decimal, RoundingStrategy};
use rust_decimal_macros::dec;
use serde::Serialize;
use uuid::Uuid;

use crate::error::PromoError;
use crate::store::{GeneralValidation, PromoStore};

pub const WHEEL_PREFIX: &str = "ROULETTE";
pub const FREE_DRINK: &str = "free_drink";

/// Trimmed and uppercased, or `None` when empty.
pub fn normalize_code(code: &str) -> Option<String> {
    let code = code.trim().to_uppercase();
    (!code.is_empty()).then_some(code)
}

pub fn is_wheel_code(code: &str) -> bool {
    code.starts_with(WHEEL_PREFIX)
}

fn round_cents(value: Decimal) -> Decimal {
    value.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero)
}

/// Discount granted by `promo` on `order_amount`, rounded to cents and
/// clamped to `[0, order_amount]`.
pub fn compute_discount(promo: &PromoCode, order_amount: Decimal) -> Decimal {
    let raw = match promo.discount_type {
        DiscountType::Percentage => {
            let discount = order_amount * promo.value / dec!(100);
            match promo.max_discount_amount {
                Some(cap) => discount.min(cap),
                None => discount,
            }
        }
        DiscountType::Fixed => promo.value.min(order_amount),
        DiscountType::FreeDelivery | DiscountType::FreeItem => Decimal::ZERO,
    };

    round_cents(raw).max(Decimal::ZERO).min(order_amount)
}

#[derive(Debug, Clone)]
pub struct ValidateRequest {
    pub code: String,
    pub user_id: Option<Uuid>,
    pub order_amount: Decimal,
    pub restaurant_id: Option<Uuid>,
    pub is_first_order: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidationOutcome {
    pub valid: bool,
    pub discount_amount: Decimal,
    pub discount_type: Option<String>,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub promo_code_id: Option<Uuid>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub wheel_prize_id: Option<Uuid>,
}

impl ValidationOutcome {
    pub fn rejected(message: impl Into<String>) -> Self {
        Self {
            valid: false,
            discount_amount: Decimal::ZERO,
            discount_type: None,
            message: message.into(),
            promo_code_id: None,
            wheel_prize_id: None,
        }
    }
}

/// Resolves a code to a discount. Rejections are reported in the outcome,
/// only store failures are errors.
#[tracing::instrument(skip(store, request), fields(code = %request.code))]
pub async fn validate(
    store: &dyn PromoStore,
    request: ValidateRequest,
    now: DateTime<Utc>,
) -> Result<ValidationOutcome, PromoError> {
    let code = normalize_code(&request.code).ok_or(PromoError::MissingField("code"))?;
    if request.order_amount <= Decimal::ZERO {
        return Err(PromoError::InvalidField("orderAmount"));
    }

    // Unknown users validate anonymously.
    let user_id = match request.user_id {
        Some(id) if store.user_exists(id).await? => Some(id),
        _ => None,
    };

    if is_wheel_code(&code) {
        return validate_wheel_code(store, &code, user_id, request.order_amount, now).await;
    }

    let result = store
        .validate_general(&GeneralValidation {
            code,
            user_id,
            order_amount: request.order_amount,
            restaurant_id: request.restaurant_id,
            is_first_order: request.is_first_order,
        })
        .await?;

    let discount_amount = if result.valid {
        round_cents(result.discount_amount)
            .max(Decimal::ZERO)
            .min(request.order_amount)
    } else {
        Decimal::ZERO
    };

    Ok(ValidationOutcome {
        valid: result.valid,
        discount_amount,
        discount_type: result.discount_type.map(|t| t.to_string()),
        message: result.message,
        promo_code_id: result.promo_code_id,
        wheel_prize_id: None,
    })
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PrizeRejection {
    OtherAccount,
    Expired,
    Used,
}

impl PrizeRejection {
    pub fn message(&self) -> &'static str {
        match self {
            PrizeRejection::OtherAccount => "This code belongs to another account",
            PrizeRejection::Expired => "This code has expired",
            PrizeRejection::Used => "This code has already been used",
        }
    }
}

/// Why a wheel prize cannot be redeemed, if it cannot.
pub fn prize_rejection(
    prize: &WheelPrize,
    user_id: Option<Uuid>,
    now: DateTime<Utc>,
) -> Option<PrizeRejection> {
    if let (Some(owner), Some(user)) = (prize.user_id, user_id)
        && owner != user
    {
        return Some(PrizeRejection::OtherAccount);
    }
    if prize.valid_until <= now {
        return Some(PrizeRejection::Expired);
    }
    if prize.used_at.is_some() {
        return Some(PrizeRejection::Used);
    }
    None
}

async fn validate_wheel_code(
    store: &dyn PromoStore,
    code: &str,
    user_id: Option<Uuid>,
    order_amount: Decimal,
    now: DateTime<Utc>,
) -> Result<ValidationOutcome, PromoError> {
    let Some(prize) = store.wheel_prize(code).await? else {
        return Ok(ValidationOutcome::rejected("Invalid promo code"));
    };

    if let Some(rejection) = prize_rejection(&prize, user_id, now) {
        tracing::debug!(prize_id = %prize.id, ?rejection, "Wheel prize rejected");
        return Ok(ValidationOutcome::rejected(rejection.message()));
    }

    let Some(promo_code_id) = prize.promo_code_id else {
        if prize.prize_type == FREE_DRINK {
            return Ok(ValidationOutcome {
                valid: true,
                discount_amount: Decimal::ZERO,
                discount_type: Some(DiscountType::FreeItem.to_string()),
                message: prize
                    .description
                    .clone()
                    .unwrap_or_else(|| "Free drink added to your order".to_string()),
                promo_code_id: None,
                wheel_prize_id: Some(prize.id),
            });
        }
        return Ok(ValidationOutcome::rejected("Invalid promo code"));
    };

    let Some(promo) = store.promo_by_id(promo_code_id).await? else {
        return Ok(ValidationOutcome::rejected("Invalid promo code"));
    };
    if !promo.is_active {
        return Ok(ValidationOutcome::rejected("This promo code is no longer active"));
    }
    if order_amount < promo.min_order_amount {
        return Ok(ValidationOutcome::rejected(format!(
            "Minimum order amount is {}",
            promo.min_order_amount
        )));
    }

    Ok(ValidationOutcome {
        valid: true,
        discount_amount: compute_discount(&promo, order_amount),
        discount_type: Some(promo.discount_type.to_string()),
        message: promo
            .description
            .clone()
            .unwrap_or_else(|| "Promo code applied".to_string()),
        promo_code_id: Some(promo.id),
        wheel_prize_id: Some(prize.id),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{FakePromoStore, OWNER, OTHER_USER, prize, promo};
    use chrono::Duration;

    fn request(code: &str, user: Option<Uuid>, amount: Decimal) -> ValidateRequest {
        ValidateRequest {
            code: code.to_string(),
            user_id: user,
            order_amount: amount,
            restaurant_id: None,
            is_first_order: false,
        }
    }

    #[test]
    fn codes_are_trimmed_and_uppercased() {
        assert_eq!(normalize_code("  roulette1a2b3c "), Some("ROULETTE1A2B3C".into()));
        assert_eq!(normalize_code("   "), None);
    }

    #[test]
    fn percentage_discount_respects_cap() {
        let mut p = promo(DiscountType::Percentage, dec!(20));
        assert_eq!(compute_discount(&p, dec!(50)), dec!(10.00));
        p.max_discount_amount = Some(dec!(6));
        assert_eq!(compute_discount(&p, dec!(50)), dec!(6));
    }

    #[test]
    fn fixed_discount_never_exceeds_order() {
        let p = promo(DiscountType::Fixed, dec!(15));
        assert_eq!(compute_discount(&p, dec!(9.99)), dec!(9.99));
        assert_eq!(compute_discount(&p, dec!(40)), dec!(15));
    }

    #[test]
    fn free_delivery_and_items_carry_no_amount() {
        assert_eq!(
            compute_discount(&promo(DiscountType::FreeDelivery, dec!(0)), dec!(30)),
            Decimal::ZERO
        );
        assert_eq!(
            compute_discount(&promo(DiscountType::FreeItem, dec!(5)), dec!(30)),
            Decimal::ZERO
        );
    }

    #[test]
    fn percentage_rounds_half_away_from_zero() {
        let p = promo(DiscountType::Percentage, dec!(5));
        // 12.30 * 5% = 0.615
        assert_eq!(compute_discount(&p, dec!(12.30)), dec!(0.62));
    }

    #[tokio::test]
    async fn used_prize_is_rejected_even_for_its_owner() {
        let now = Utc::now();
        let store = FakePromoStore::default();
        let linked = store.add_promo(promo(DiscountType::Percentage, dec!(10)));
        let mut used = prize("ROULETTEAB12CD", Some(OWNER), Some(linked), now);
        used.used_at = Some(now - Duration::hours(1));
        store.add_prize(used);

        for _ in 0..2 {
            let outcome = validate(&store, request("rouletteab12cd", Some(OWNER), dec!(30)), now)
                .await
                .unwrap();
            assert!(!outcome.valid);
            assert_eq!(outcome.discount_amount, Decimal::ZERO);
        }
    }

    #[tokio::test]
    async fn prize_owned_by_someone_else_is_rejected() {
        let now = Utc::now();
        let store = FakePromoStore::default();
        let linked = store.add_promo(promo(DiscountType::Fixed, dec!(3)));
        store.add_prize(prize("ROULETTEXYZ123", Some(OWNER), Some(linked), now));

        let outcome = validate(&store, request("ROULETTEXYZ123", Some(OTHER_USER), dec!(30)), now)
            .await
            .unwrap();
        assert!(!outcome.valid);
        assert_eq!(outcome.message, "This code belongs to another account");
    }

    #[tokio::test]
    async fn expired_prize_is_rejected() {
        let now = Utc::now();
        let store = FakePromoStore::default();
        let linked = store.add_promo(promo(DiscountType::Fixed, dec!(3)));
        let mut expired = prize("ROULETTEOLD000", Some(OWNER), Some(linked), now);
        expired.valid_until = now;
        store.add_prize(expired);

        let outcome = validate(&store, request("ROULETTEOLD000", Some(OWNER), dec!(30)), now)
            .await
            .unwrap();
        assert!(!outcome.valid);
    }

    #[tokio::test]
    async fn valid_prize_uses_linked_rule() {
        let now = Utc::now();
        let store = FakePromoStore::default();
        let linked = store.add_promo(promo(DiscountType::Percentage, dec!(10)));
        let p = store.add_prize(prize("ROULETTEGOOD01", Some(OWNER), Some(linked), now));

        let outcome = validate(&store, request("ROULETTEGOOD01", Some(OWNER), dec!(30)), now)
            .await
            .unwrap();
        assert!(outcome.valid);
        assert_eq!(outcome.discount_amount, dec!(3.00));
        assert_eq!(outcome.discount_type.as_deref(), Some("percentage"));
        assert_eq!(outcome.promo_code_id, Some(linked));
        assert_eq!(outcome.wheel_prize_id, Some(p));
    }

    #[tokio::test]
    async fn free_drink_without_rule_validates_as_free_item() {
        let now = Utc::now();
        let store = FakePromoStore::default();
        let mut drink = prize("ROULETTEDRINK1", Some(OWNER), None, now);
        drink.prize_type = FREE_DRINK.to_string();
        store.add_prize(drink);

        let outcome = validate(&store, request("ROULETTEDRINK1", None, dec!(20)), now)
            .await
            .unwrap();
        assert!(outcome.valid);
        assert_eq!(outcome.discount_type.as_deref(), Some("free_item"));
        assert_eq!(outcome.discount_amount, Decimal::ZERO);
    }

    #[tokio::test]
    async fn unknown_user_validates_anonymously() {
        let now = Utc::now();
        let store = FakePromoStore::default();
        let linked = store.add_promo(promo(DiscountType::Fixed, dec!(2)));
        store.add_prize(prize("ROULETTEANON01", Some(OWNER), Some(linked), now));

        // not a registered user, so ownership is not checked
        let stranger = Uuid::from_u128(0xdead);
        let outcome = validate(&store, request("ROULETTEANON01", Some(stranger), dec!(20)), now)
            .await
            .unwrap();
        assert!(outcome.valid);
        assert_eq!(outcome.discount_amount, dec!(2));
    }

    #[tokio::test]
    async fn general_codes_are_delegated_and_clamped() {
        let store = FakePromoStore::default();
        store.set_general_result(true, dec!(50));

        let outcome = validate(&store, request("bienvenue", Some(OWNER), dec!(20)), Utc::now())
            .await
            .unwrap();
        assert!(outcome.valid);
        assert_eq!(outcome.discount_amount, dec!(20));
        assert_eq!(store.general_calls()[0].code, "BIENVENUE");
    }

    #[tokio::test]
    async fn missing_code_and_bad_amount_are_errors() {
        let store = FakePromoStore::default();
        assert!(matches!(
            validate(&store, request("  ", None, dec!(10)), Utc::now()).await,
            Err(PromoError::MissingField("code"))
        ));
        assert!(matches!(
            validate(&store, request("X", None, dec!(0)), Utc::now()).await,
            Err(PromoError::InvalidField("orderAmount"))
        ));
    }
}
