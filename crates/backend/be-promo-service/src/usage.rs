use be_remote_db::DbError;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Serialize;
use uuid::Uuid;

use crate::error::PromoError;
use crate::store::PromoStore;
use crate::validator::{PrizeRejection, is_wheel_code, normalize_code, prize_rejection};

impl From<PrizeRejection> for PromoError {
    fn from(rejection: PrizeRejection) -> Self {
        match rejection {
            PrizeRejection::OtherAccount => PromoError::PrizeNotOwned,
            PrizeRejection::Expired => PromoError::PrizeExpired,
            PrizeRejection::Used => PromoError::PrizeAlreadyUsed,
        }
    }
}

fn usage_error(e: DbError) -> PromoError {
    match e {
        DbError::Duplicate { .. } => PromoError::AlreadyApplied,
        other => PromoError::Database(other),
    }
}

#[derive(Debug, Clone)]
pub struct ApplyRequest {
    pub code: String,
    pub order_id: Uuid,
    pub discount_amount: Decimal,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ApplyOutcome {
    pub success: bool,
    pub usage_id: Uuid,
    pub promo_code_id: Option<Uuid>,
    pub wheel_prize_id: Option<Uuid>,
}

/// Records that `user_id` used a code on one of their orders.
///
/// A wheel prize must belong to `user_id` and be unexpired. Its `used_at`
/// stamp and the usage row are written together: of two concurrent
/// redemptions only one succeeds, and a failed insert leaves the prize
/// unused.
#[tracing::instrument(skip(store, request, now), fields(order_id = %request.order_id))]
pub async fn apply(
    store: &dyn PromoStore,
    user_id: Uuid,
    request: ApplyRequest,
    now: DateTime<Utc>,
) -> Result<ApplyOutcome, PromoError> {
    let code = normalize_code(&request.code).ok_or(PromoError::MissingField("code"))?;
    if request.discount_amount < Decimal::ZERO {
        return Err(PromoError::InvalidField("discountAmount"));
    }

    match store.order_customer(request.order_id).await? {
        Some(owner) if owner == user_id => {}
        Some(_) | None => return Err(PromoError::NotFound("Order")),
    }

    let (usage, promo_code_id, wheel_prize_id) = if is_wheel_code(&code) {
        let prize = store
            .wheel_prize(&code)
            .await?
            .ok_or(PromoError::NotFound("Promo code"))?;
        if let Some(rejection) = prize_rejection(&prize, Some(user_id), now) {
            tracing::warn!(prize_id = %prize.id, %user_id, ?rejection, "Wheel prize redemption refused");
            return Err(rejection.into());
        }
        let usage = store
            .redeem_prize(
                prize.id,
                prize.promo_code_id,
                user_id,
                request.order_id,
                request.discount_amount,
            )
            .await
            .map_err(usage_error)?
            .ok_or(PromoError::PrizeAlreadyUsed)?;
        (usage, prize.promo_code_id, Some(prize.id))
    } else {
        let promo = store
            .promo_by_code(&code)
            .await?
            .ok_or(PromoError::NotFound("Promo code"))?;
        let usage = store
            .record_usage(
                Some(promo.id),
                None,
                user_id,
                request.order_id,
                request.discount_amount,
            )
            .await
            .map_err(usage_error)?;
        (usage, Some(promo.id), None)
    };

    if let Some(promo_code_id) = promo_code_id
        && let Err(e) = store.increment_usage(promo_code_id).await
    {
        tracing::warn!(%promo_code_id, error = %e, "Failed to increment promo usage counter");
    }

    tracing::info!(usage_id = %usage.id, %user_id, "Promo code applied");

    Ok(ApplyOutcome {
        success: true,
        usage_id: usage.id,
        promo_code_id,
        wheel_prize_id,
    })
}
