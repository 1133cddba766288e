use be_remote_db::DiscountType;
use chrono::{DateTime, Datelike, Duration, NaiveDate, TimeZone, Utc};
use rand::TryRngCore;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::PromoError;
use crate::store::{NewPromoRule, NewWheelPrize, PromoStore};
use crate::validator::WHEEL_PREFIX;

const CODE_CHARSET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";
const CODE_SUFFIX_LEN: usize = 6;
const MAX_CODE_ATTEMPTS: usize = 5;
const PRIZE_MIN_ORDER: Decimal = dec!(15);
const DEFAULT_DISCOUNT_PERCENT: Decimal = dec!(10);
/// Discount percentages the wheel can land on.
const WHEEL_DISCOUNT_PERCENTS: &[Decimal] = &[DEFAULT_DISCOUNT_PERCENT];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PrizeType {
    Discount,
    FreeDelivery,
    FreeDrink,
    Surprise,
}

impl PrizeType {
    pub fn as_str(&self) -> &'static str {
        match self {
            PrizeType::Discount => "discount",
            PrizeType::FreeDelivery => "free_delivery",
            PrizeType::FreeDrink => "free_drink",
            PrizeType::Surprise => "surprise",
        }
    }
}

/// Discount attached to a prize.
#[derive(Debug, Clone, PartialEq)]
pub struct PrizeRule {
    pub discount_type: DiscountType,
    pub value: Decimal,
    pub description: String,
}

fn random_bytes<const N: usize>() -> Result<[u8; N], PromoError> {
    let mut bytes = [0u8; N];
    rand::rngs::OsRng
        .try_fill_bytes(&mut bytes)
        .map_err(|e| PromoError::Random(e.to_string()))?;
    Ok(bytes)
}

/// `ROULETTE` followed by six uppercase alphanumerics.
pub fn generate_code() -> Result<String, PromoError> {
    let bytes = random_bytes::<CODE_SUFFIX_LEN>()?;
    let suffix: String = bytes
        .iter()
        .map(|b| CODE_CHARSET[*b as usize % CODE_CHARSET.len()] as char)
        .collect();
    Ok(format!("{WHEEL_PREFIX}{suffix}"))
}

/// `None` for prizes delivered as an item. A requested discount outside the
/// wheel's percentages falls back to the default.
pub fn prize_rule(prize: PrizeType, value: Option<Decimal>, pick: u8) -> Option<PrizeRule> {
    match prize {
        PrizeType::Discount => {
            let percent = value
                .filter(|v| WHEEL_DISCOUNT_PERCENTS.contains(v))
                .unwrap_or(DEFAULT_DISCOUNT_PERCENT);
            Some(PrizeRule {
                discount_type: DiscountType::Percentage,
                value: percent,
                description: format!("{percent}% off your next order"),
            })
        }
        PrizeType::FreeDelivery => Some(PrizeRule {
            discount_type: DiscountType::FreeDelivery,
            value: Decimal::ZERO,
            description: "Free delivery on your next order".to_string(),
        }),
        PrizeType::FreeDrink => None,
        PrizeType::Surprise => {
            let (discount_type, value, description) = match pick % 3 {
                0 => (DiscountType::Fixed, dec!(2), "Surprise: 2 EUR off your next order"),
                1 => (DiscountType::Fixed, dec!(3), "Surprise: 3 EUR off your next order"),
                _ => (DiscountType::Percentage, dec!(5), "Surprise: 5% off your next order"),
            };
            Some(PrizeRule {
                discount_type,
                value,
                description: description.to_string(),
            })
        }
    }
}

/// One week, except free delivery which runs until the end of December 23
/// (falling back to one week once that date has passed).
pub fn prize_valid_until(prize: PrizeType, now: DateTime<Utc>) -> DateTime<Utc> {
    let one_week = now + Duration::days(7);
    if prize != PrizeType::FreeDelivery {
        return one_week;
    }

    NaiveDate::from_ymd_opt(now.year(), 12, 23)
        .and_then(|d| d.and_hms_opt(23, 59, 59))
        .map(|dt| Utc.from_utc_datetime(&dt))
        .filter(|deadline| *deadline > now)
        .unwrap_or(one_week)
}

#[derive(Debug, Clone)]
pub struct GenerateRequest {
    pub prize_type: PrizeType,
    pub value: Option<Decimal>,
    pub description: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GeneratedPrize {
    pub success: bool,
    pub code: String,
    pub prize_type: PrizeType,
    pub description: String,
    pub discount_type: Option<String>,
    pub discount_value: Decimal,
    pub valid_until: DateTime<Utc>,
    pub wheel_prize_id: Uuid,
}

async fn unique_code(store: &dyn PromoStore) -> Result<String, PromoError> {
    for _ in 0..MAX_CODE_ATTEMPTS {
        let code = generate_code()?;
        if !store.code_exists(&code).await? {
            return Ok(code);
        }
        tracing::debug!(%code, "Prize code collision; drawing again");
    }
    Err(PromoError::CodeSpaceExhausted)
}

#[tracing::instrument(skip(store, request), fields(prize = request.prize_type.as_str()))]
pub async fn generate(
    store: &dyn PromoStore,
    user_id: Uuid,
    request: GenerateRequest,
    now: DateTime<Utc>,
) -> Result<GeneratedPrize, PromoError> {
    let code = unique_code(store).await?;
    let valid_until = prize_valid_until(request.prize_type, now);
    let [pick] = random_bytes::<1>()?;
    let rule = prize_rule(request.prize_type, request.value, pick);

    let description = request
        .description
        .map(|d| d.trim().to_string())
        .filter(|d| !d.is_empty())
        .or_else(|| rule.as_ref().map(|r| r.description.clone()))
        .unwrap_or_else(|| "Free drink with your next order".to_string());

    let promo_code_id = match &rule {
        Some(rule) => Some(
            store
                .create_promo(NewPromoRule {
                    code: code.clone(),
                    description: description.clone(),
                    discount_type: rule.discount_type,
                    value: rule.value,
                    min_order_amount: PRIZE_MIN_ORDER,
                    valid_until,
                })
                .await?
                .id,
        ),
        None => None,
    };

    let prize = store
        .create_prize(NewWheelPrize {
            user_id,
            code: code.clone(),
            prize_type: request.prize_type.as_str().to_string(),
            promo_code_id,
            description: description.clone(),
            valid_until,
        })
        .await?;

    tracing::info!(prize_id = %prize.id, %user_id, "Wheel prize generated");

    Ok(GeneratedPrize {
        success: true,
        code,
        prize_type: request.prize_type,
        description,
        discount_type: rule.as_ref().map(|r| r.discount_type.to_string()),
        discount_value: rule.map(|r| r.value).unwrap_or(Decimal::ZERO),
        valid_until,
        wheel_prize_id: prize.id,
    })
}
