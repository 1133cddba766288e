use rust_decimal::Decimal;
use serde::{Deserialize, Deserializer};
use uuid::Uuid;

use crate::error::PromoError;
use crate::generator::{GenerateRequest, PrizeType};
use crate::usage::ApplyRequest;
use crate::validator::ValidateRequest;

/// Non-UUID values are treated as absent.
fn lenient_uuid<'de, D>(deserializer: D) -> Result<Option<Uuid>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Option::<String>::deserialize(deserializer)?;
    Ok(raw.and_then(|s| Uuid::parse_str(s.trim()).ok()))
}

fn amount(value: Option<f64>, field: &'static str) -> Result<Decimal, PromoError> {
    let value = value.ok_or(PromoError::MissingField(field))?;
    if !value.is_finite() {
        return Err(PromoError::InvalidField(field));
    }
    Decimal::try_from(value).map_err(|_| PromoError::InvalidField(field))
}

#[derive(Debug, Deserialize)]
pub struct ValidateBody {
    pub code: Option<String>,
    #[serde(default, alias = "userId", deserialize_with = "lenient_uuid")]
    pub user_id: Option<Uuid>,
    #[serde(alias = "orderAmount")]
    pub order_amount: Option<f64>,
    #[serde(default, alias = "restaurantId", deserialize_with = "lenient_uuid")]
    pub restaurant_id: Option<Uuid>,
    #[serde(alias = "isFirstOrder")]
    pub is_first_order: Option<bool>,
}

impl TryFrom<ValidateBody> for ValidateRequest {
    type Error = PromoError;

    fn try_from(body: ValidateBody) -> Result<Self, Self::Error> {
        Ok(ValidateRequest {
            code: body.code.ok_or(PromoError::MissingField("code"))?,
            user_id: body.user_id,
            order_amount: amount(body.order_amount, "orderAmount")?,
            restaurant_id: body.restaurant_id,
            is_first_order: body.is_first_order.unwrap_or(false),
        })
    }
}

#[derive(Debug, Deserialize)]
pub struct ApplyBody {
    pub code: Option<String>,
    #[serde(alias = "orderId")]
    pub order_id: Option<String>,
    #[serde(alias = "discountAmount")]
    pub discount_amount: Option<f64>,
}

impl TryFrom<ApplyBody> for ApplyRequest {
    type Error = PromoError;

    fn try_from(body: ApplyBody) -> Result<Self, Self::Error> {
        let order_id = body.order_id.ok_or(PromoError::MissingField("orderId"))?;
        Ok(ApplyRequest {
            code: body.code.ok_or(PromoError::MissingField("code"))?,
            order_id: Uuid::parse_str(order_id.trim())
                .map_err(|_| PromoError::InvalidField("orderId"))?,
            discount_amount: amount(body.discount_amount, "discountAmount")?,
        })
    }
}

#[derive(Debug, Deserialize)]
pub struct GenerateBody {
    #[serde(alias = "prizeType")]
    pub prize_type: Option<String>,
    pub value: Option<f64>,
    pub description: Option<String>,
}

impl TryFrom<GenerateBody> for GenerateRequest {
    type Error = PromoError;

    fn try_from(body: GenerateBody) -> Result<Self, Self::Error> {
        let prize_type = match body
            .prize_type
            .ok_or(PromoError::MissingField("prizeType"))?
            .trim()
        {
            "discount" => PrizeType::Discount,
            "free_delivery" => PrizeType::FreeDelivery,
            "free_drink" => PrizeType::FreeDrink,
            "surprise" => PrizeType::Surprise,
            _ => return Err(PromoError::InvalidField("prizeType")),
        };
        let value = match body.value {
            Some(v) => Some(amount(Some(v), "value")?),
            None => None,
        };
        Ok(GenerateRequest {
            prize_type,
            value,
            description: body.description,
        })
    }
}
