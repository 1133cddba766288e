use be_remote_db::{Order, OrderStatus, PaymentStatus};
use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::cancellation::{BatchOutcome, Cancellation, IssuedRefund};
use crate::error::AdminError;
use crate::payouts::PayoutRequest;

#[derive(Debug, Default, Deserialize)]
pub struct CancelBody {
    pub reason: Option<String>,
}

impl CancelBody {
    pub fn reason(&self) -> Option<&str> {
        self.reason.as_deref().map(str::trim).filter(|r| !r.is_empty())
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct CancelPendingBody {
    #[serde(default, alias = "includeUnpaid")]
    pub include_unpaid: bool,
}

#[derive(Debug, Serialize)]
pub struct CancelResponse {
    pub success: bool,
    pub message: String,
    pub order_id: Uuid,
    pub status: OrderStatus,
    pub payment_status: PaymentStatus,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub already_cancelled: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub refund: Option<IssuedRefund>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub refund_error: Option<String>,
}

impl From<Cancellation> for CancelResponse {
    fn from(cancellation: Cancellation) -> Self {
        match cancellation {
            Cancellation::AlreadyCancelled(order) => CancelResponse {
                success: true,
                message: "Commande déjà annulée".to_string(),
                order_id: order.id,
                status: order.status,
                payment_status: order.payment_status,
                already_cancelled: true,
                refund: None,
                refund_error: None,
            },
            Cancellation::Cancelled {
                order,
                refund,
                refund_error,
            } => {
                let message = match (&refund, &refund_error) {
                    (Some(_), _) => "Commande annulée et remboursée",
                    (None, Some(_)) => "Commande annulée, le remboursement a échoué",
                    (None, None) => "Commande annulée",
                };
                CancelResponse {
                    success: true,
                    message: message.to_string(),
                    order_id: order.id,
                    status: order.status,
                    payment_status: order.payment_status,
                    already_cancelled: false,
                    refund,
                    refund_error,
                }
            }
        }
    }
}

#[derive(Debug, Serialize)]
pub struct BatchResponse {
    pub success: bool,
    pub message: String,
    #[serde(flatten)]
    pub outcome: BatchOutcome,
}

impl BatchResponse {
    pub fn new(selected: usize, outcome: BatchOutcome) -> Self {
        Self {
            success: true,
            message: format!(
                "{} commande(s) annulée(s) sur {selected}, {} remboursement(s)",
                outcome.cancelled, outcome.refunded
            ),
            outcome,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct PreviewOrder {
    pub id: Uuid,
    pub total: Decimal,
    pub created_at: DateTime<Utc>,
    pub status: OrderStatus,
}

impl From<&Order> for PreviewOrder {
    fn from(order: &Order) -> Self {
        Self {
            id: order.id,
            total: order.total,
            created_at: order.created_at,
            status: order.status,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct PreviewResponse {
    pub count: usize,
    pub orders: Vec<PreviewOrder>,
}

#[derive(Debug, Deserialize)]
pub struct PayoutBody {
    #[serde(alias = "deliveryId")]
    pub delivery_id: Option<String>,
    pub amount: Option<f64>,
    #[serde(alias = "transferDate")]
    pub transfer_date: Option<String>,
    #[serde(alias = "reference_number", alias = "referenceNumber")]
    pub reference: Option<String>,
    pub notes: Option<String>,
}

fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

impl TryFrom<PayoutBody> for PayoutRequest {
    type Error = AdminError;

    fn try_from(body: PayoutBody) -> Result<Self, Self::Error> {
        let driver_id = non_blank(body.delivery_id).ok_or(AdminError::MissingField("delivery_id"))?;
        let amount = body.amount.ok_or(AdminError::MissingField("amount"))?;
        let transfer_date =
            non_blank(body.transfer_date).ok_or(AdminError::MissingField("transfer_date"))?;

        if !amount.is_finite() {
            return Err(AdminError::InvalidField("amount"));
        }

        Ok(PayoutRequest {
            driver_id: Uuid::parse_str(&driver_id)
                .map_err(|_| AdminError::InvalidField("delivery_id"))?,
            amount: Decimal::try_from(amount)
                .map_err(|_| AdminError::InvalidField("amount"))?
                .round_dp(2),
            // Accept full timestamps too; only the date is kept.
            transfer_date: NaiveDate::parse_from_str(
                transfer_date.get(..10).unwrap_or(&transfer_date),
                "%Y-%m-%d",
            )
            .map_err(|_| AdminError::InvalidField("transfer_date"))?,
            reference: non_blank(body.reference),
            notes: non_blank(body.notes),
        })
    }
}

#[derive(Debug, Deserialize)]
pub struct ResetBody {
    #[serde(default)]
    pub confirmation: String,
}
