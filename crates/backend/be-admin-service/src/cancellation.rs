//! Order cancellation with bounded refunds.
//!
//! The conditional update to `cancelled`, taken only from a non-terminal
//! status, is the only gate to the refund: of any number of concurrent or
//! repeated cancellations of one order, exactly one proceeds past it.
//! Delivered orders never reach it. The refund itself is capped by what
//! the processor still holds on the intent, and every secondary effect goes
//! through the outbox.

use std::collections::HashMap;
use std::sync::Arc;

use be_email_service::EmailTemplate;
use be_notification_service::{
    EmailPayload, LedgerPayload, NotificationPayload, Outbox, SideEffect,
};
use be_payment_service::{GatewayError, PaymentGateway, RefundRequest, to_cents};
use be_remote_db::{DbError, Order, OrderStatus};
use chrono::{DateTime, TimeZone, Utc};
use rust_decimal::Decimal;
use serde::Serialize;
use serde_json::json;
use tracing::{info, warn};
use uuid::Uuid;

use crate::error::AdminError;
use crate::store::AdminStore;

pub const ADMIN_CANCEL_REASON: &str = "Commande annulée par l'administration";
pub const REFUNDED_CANCEL_REASON: &str = "Commande remboursée et annulée automatiquement";

#[derive(Debug, thiserror::Error)]
pub enum RefundError {
    #[error("no payment intent")]
    MissingIntent,

    #[error("payment intent {0} has no charge to refund")]
    MissingCharge(String),

    #[error(transparent)]
    Gateway(#[from] GatewayError),

    #[error("Database error: {0}")]
    Database(#[from] DbError),
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct IssuedRefund {
    pub id: String,
    pub amount: Decimal,
}

#[derive(Debug, Clone)]
pub enum Cancellation {
    /// Another call won the gate; nothing was done.
    AlreadyCancelled(Order),
    Cancelled {
        order: Order,
        refund: Option<IssuedRefund>,
        refund_error: Option<String>,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BatchError {
    pub order_id: Uuid,
    pub error: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct BatchOutcome {
    pub cancelled: u32,
    pub refunded: u32,
    pub errors: Vec<BatchError>,
}

fn short_id(order_id: Uuid) -> String {
    order_id.to_string()[..8].to_uppercase()
}

/// Midnight UTC of the day containing `now`.
pub fn start_of_day(now: DateTime<Utc>) -> DateTime<Utc> {
    Utc.from_utc_datetime(&now.date_naive().and_time(chrono::NaiveTime::MIN))
}

#[derive(Clone)]
pub struct Canceller {
    store: Arc<dyn AdminStore>,
    gateway: Arc<dyn PaymentGateway>,
    outbox: Outbox,
}

impl Canceller {
    pub fn new(
        store: Arc<dyn AdminStore>,
        gateway: Arc<dyn PaymentGateway>,
        outbox: Outbox,
    ) -> Self {
        Self {
            store,
            gateway,
            outbox,
        }
    }

    /// Cancels one order, refunding it when money was captured.
    ///
    /// Refund failures do not undo the cancellation; they are reported in
    /// `refund_error`.
    #[tracing::instrument(skip(self, reason))]
    pub async fn cancel(&self, order_id: Uuid, reason: &str) -> Result<Cancellation, AdminError> {
        let Some(mut order) = self.store.cancel_if_active(order_id).await? else {
            return match self.store.find_order(order_id).await? {
                Some(order) if order.status == OrderStatus::Cancelled => {
                    info!(%order_id, "Order already cancelled; nothing to do");
                    Ok(Cancellation::AlreadyCancelled(order))
                }
                Some(order) => Err(AdminError::NotCancellable(order.status)),
                None => Err(AdminError::NotFound("Order")),
            };
        };

        let (refund, refund_error) = match self.settle_refund(&mut order, reason).await {
            Ok(refund) => (refund, None),
            Err(e) => {
                warn!(%order_id, error = %e, "Order cancelled but refund failed");
                (None, Some(e.to_string()))
            }
        };

        self.enqueue_effects(&order, reason, refund.as_ref()).await;

        info!(
            %order_id,
            refunded = refund.is_some(),
            payment_status = %order.payment_status,
            "Order cancelled"
        );

        Ok(Cancellation::Cancelled {
            order,
            refund,
            refund_error,
        })
    }

    /// Runs [`Canceller::cancel`] on each order in turn. One order failing
    /// never stops the others.
    pub async fn cancel_batch(
        &self,
        order_ids: Vec<Uuid>,
        reason: &str,
    ) -> BatchOutcome {
        let mut outcome = BatchOutcome::default();

        for order_id in order_ids {
            match self.cancel(order_id, reason).await {
                Ok(Cancellation::Cancelled {
                    refund,
                    refund_error,
                    ..
                }) => {
                    outcome.cancelled += 1;
                    if refund.is_some() {
                        outcome.refunded += 1;
                    }
                    if let Some(error) = refund_error {
                        outcome.errors.push(BatchError { order_id, error });
                    }
                }
                Ok(Cancellation::AlreadyCancelled(_)) => {}
                Err(e) => outcome.errors.push(BatchError {
                    order_id,
                    error: e.to_string(),
                }),
            }
        }

        info!(
            cancelled = outcome.cancelled,
            refunded = outcome.refunded,
            errors = outcome.errors.len(),
            "Batch cancellation finished"
        );
        outcome
    }

    async fn settle_refund(
        &self,
        order: &mut Order,
        reason: &str,
    ) -> Result<Option<IssuedRefund>, RefundError> {
        let owed = order.total + order.delivery_fee;
        if !order.payment_status.is_captured() || owed <= Decimal::ZERO {
            return Ok(None);
        }

        let intent_id = order
            .payment_intent_id
            .clone()
            .filter(|id| !id.trim().is_empty())
            .ok_or(RefundError::MissingIntent)?;

        let balance = self
            .gateway
            .refundable_balance(&intent_id)
            .await?
            .ok_or_else(|| RefundError::MissingCharge(intent_id.clone()))?;
        let amount_cents = to_cents(owed).min(balance.remaining_cents());

        if amount_cents <= 0 {
            // Refunded out of band: record it, but only if the processor agrees.
            if balance.has_refund()
                && self
                    .store
                    .mark_refunded(order.id, None, Decimal::new(balance.refunded_cents, 2))
                    .await?
            {
                order.payment_status = be_remote_db::PaymentStatus::Refunded;
            }
            return Ok(None);
        }

        let refund = self
            .gateway
            .refund(RefundRequest {
                intent_id,
                amount_cents,
                idempotency_key: format!("refund:{}", order.id),
                metadata: HashMap::from([
                    ("order_id".to_string(), order.id.to_string()),
                    ("reason".to_string(), reason.to_string()),
                ]),
            })
            .await?;

        let amount = Decimal::new(refund.amount_cents, 2);
        if self
            .store
            .mark_refunded(order.id, Some(&refund.id), amount)
            .await?
        {
            order.payment_status = be_remote_db::PaymentStatus::Refunded;
            order.refund_id = Some(refund.id.clone());
            order.refund_amount = Some(amount);
        } else {
            warn!(order_id = %order.id, refund_id = %refund.id, "Refund issued but order was no longer in a paid state");
        }

        Ok(Some(IssuedRefund {
            id: refund.id,
            amount,
        }))
    }

    async fn enqueue_effects(&self, order: &Order, reason: &str, refund: Option<&IssuedRefund>) {
        let short = short_id(order.id);
        let (kind, title, message) = match refund {
            Some(refund) => (
                "order_cancelled_refunded",
                "Commande annulée et remboursée",
                format!(
                    "Votre commande #{short} a été annulée. Un remboursement de {:.2} € sera visible sur votre compte sous 2 à 5 jours ouvrés.",
                    refund.amount
                ),
            ),
            None => (
                "order_cancelled",
                "Commande annulée",
                format!("Votre commande #{short} a été annulée."),
            ),
        };

        let mut effects = vec![SideEffect::Notification(NotificationPayload {
            user_id: Some(order.customer_id),
            restaurant_id: None,
            kind: kind.to_string(),
            title: title.to_string(),
            message,
            data: json!({
                "order_id": order.id.to_string(),
                "reason": reason,
                "refund_id": refund.map(|r| r.id.clone()),
                "refund_amount": refund.map(|r| r.amount),
            }),
        })];

        match self.store.find_user(order.customer_id).await {
            Ok(Some(customer)) => effects.push(SideEffect::Email(EmailPayload {
                to: customer.email,
                to_name: customer.full_name.clone(),
                content: EmailTemplate::OrderCancelled {
                    order_id: order.id.to_string(),
                    customer_name: customer.full_name,
                    reason: Some(reason.to_string()),
                    refund_amount: refund.map(|r| r.amount),
                },
            })),
            Ok(None) => warn!(customer_id = %order.customer_id, "Customer not found; skipping email"),
            Err(e) => warn!(error = %e, "Customer lookup failed; skipping email"),
        }

        if let Some(refund) = refund {
            effects.push(SideEffect::PaymentLedger(LedgerPayload {
                order_id: order.id,
                processor_intent_id: order.payment_intent_id.clone(),
                processor_refund_id: Some(refund.id.clone()),
                kind: "refund".to_string(),
                amount: refund.amount,
            }));
        }

        self.outbox.enqueue_all_or_log(effects).await;
    }
}
