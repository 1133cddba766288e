//! Server-side recomputation of the amount a customer is charged.
//!
//! The client submits an amount; it is accepted only when it matches what
//! the stored order fields say the charge should be.

use axum::http::StatusCode;
use be_remote_db::OrderChargeContext;
use rust_decimal::{Decimal, RoundingStrategy, prelude::ToPrimitive};
use rust_decimal_macros::dec;
use uuid::Uuid;

use crate::store::PaymentStore;

pub const PLATFORM_FEE: Decimal = dec!(0.49);
pub const AMOUNT_TOLERANCE: Decimal = dec!(0.05);
pub const MIN_DELIVERY_FEE: Decimal = dec!(2.50);
pub const MIN_CHARGE: Decimal = dec!(0.50);
pub const POINTS_PER_UNIT: Decimal = dec!(20);

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ReconcileError {
    #[error("Delivery fee {fee} is below the 2.50 minimum")]
    DeliveryFeeTooLow { fee: Decimal },

    #[error("Submitted amount {submitted} does not match the expected amount {expected}")]
    AmountMismatch { expected: Decimal, submitted: Decimal },

    #[error("Order {0} not found")]
    OrderNotFound(Uuid),

    #[error("Payment verification is temporarily unavailable. Please try again.")]
    VerificationUnavailable,

    #[error("Payment verification failed")]
    VerificationFailed,
}

impl ReconcileError {
    pub fn code(&self) -> &'static str {
        match self {
            ReconcileError::DeliveryFeeTooLow { .. } => "DELIVERY_FEE_TOO_LOW",
            ReconcileError::AmountMismatch { .. } => "AMOUNT_MISMATCH",
            ReconcileError::OrderNotFound(_) => "ORDER_NOT_FOUND",
            ReconcileError::VerificationUnavailable => "VERIFICATION_UNAVAILABLE",
            ReconcileError::VerificationFailed => "VERIFICATION_FAILED",
        }
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            ReconcileError::DeliveryFeeTooLow { .. } | ReconcileError::AmountMismatch { .. } => {
                StatusCode::BAD_REQUEST
            }
            ReconcileError::OrderNotFound(_) => StatusCode::NOT_FOUND,
            ReconcileError::VerificationUnavailable => StatusCode::SERVICE_UNAVAILABLE,
            ReconcileError::VerificationFailed => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

/// Half-away-from-zero rounding to cents.
pub fn round2(value: Decimal) -> Decimal {
    value.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero)
}

/// Minor units for the processor.
pub fn to_cents(amount: Decimal) -> i64 {
    (amount * dec!(100))
        .round_dp_with_strategy(0, RoundingStrategy::MidpointAwayFromZero)
        .to_i64()
        .unwrap_or(i64::MAX)
}

pub fn expected_charge(ctx: &OrderChargeContext, points_used: u32) -> Decimal {
    let discount = ctx.discount_amount.min(ctx.total);
    let subtotal = round2(ctx.total - discount).max(Decimal::ZERO);
    let delivery = if ctx.free_delivery {
        Decimal::ZERO
    } else {
        ctx.delivery_fee
    };

    let expected = round2(subtotal + delivery + PLATFORM_FEE);

    if points_used > 0 {
        let redeemed = Decimal::from(points_used) / POINTS_PER_UNIT;
        round2(expected - redeemed).max(MIN_CHARGE)
    } else {
        expected
    }
}

/// Checks a submitted amount against the stored order. The fee floor is
/// checked first so a low fee is rejected whatever the amount.
pub fn reconcile(
    ctx: &OrderChargeContext,
    submitted: Decimal,
    points_used: u32,
) -> Result<Decimal, ReconcileError> {
    if !ctx.free_delivery && ctx.delivery_fee < MIN_DELIVERY_FEE {
        return Err(ReconcileError::DeliveryFeeTooLow {
            fee: ctx.delivery_fee,
        });
    }

    let expected = expected_charge(ctx, points_used);
    if (submitted - expected).abs() > AMOUNT_TOLERANCE {
        return Err(ReconcileError::AmountMismatch {
            expected,
            submitted,
        });
    }

    Ok(expected)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verification {
    Verified { expected: Decimal },
    /// The store could not be reached and fail-open is configured.
    Bypassed,
}

#[tracing::instrument(skip(store))]
pub async fn verify_charge(
    store: &dyn PaymentStore,
    order_id: Uuid,
    submitted: Decimal,
    points_used: u32,
    fail_open: bool,
) -> Result<Verification, ReconcileError> {
    let ctx = match store.charge_context(order_id).await {
        Ok(Some(ctx)) => ctx,
        Ok(None) => return Err(ReconcileError::OrderNotFound(order_id)),
        Err(e) if !e.is_unavailable() => {
            tracing::error!(%order_id, error = %e, "Order lookup failed; rejecting charge");
            return Err(ReconcileError::VerificationFailed);
        }
        Err(e) if fail_open => {
            tracing::warn!(
                %order_id,
                error = %e,
                "Order store unreachable; accepting charge without reconciliation (fail-open)"
            );
            return Ok(Verification::Bypassed);
        }
        Err(e) => {
            tracing::error!(%order_id, error = %e, "Order store unreachable; rejecting charge");
            return Err(ReconcileError::VerificationUnavailable);
        }
    };

    match reconcile(&ctx, submitted, points_used) {
        Ok(expected) => Ok(Verification::Verified { expected }),
        Err(err) => {
            tracing::warn!(%order_id, %submitted, error = %err, "Charge rejected by reconciliation");
            Err(err)
        }
    }
}
