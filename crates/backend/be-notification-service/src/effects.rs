use be_email_service::{EmailMessage, EmailTemplate};
use be_remote_db::OutboxKind;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NotificationPayload {
    pub user_id: Option<Uuid>,
    pub restaurant_id: Option<Uuid>,
    pub kind: String,
    pub title: String,
    pub message: String,
    #[serde(default)]
    pub data: serde_json::Value,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EmailPayload {
    pub to: String,
    pub to_name: Option<String>,
    pub content: EmailTemplate,
}

impl EmailPayload {
    pub fn to_message(&self) -> EmailMessage {
        self.content.to_message(self.to.clone(), self.to_name.clone())
    }
}

/// Mirror row for the `payments` ledger.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LedgerPayload {
    pub order_id: Uuid,
    pub processor_intent_id: Option<String>,
    pub processor_refund_id: Option<String>,
    pub kind: String,
    pub amount: Decimal,
}

#[derive(Debug, Clone, PartialEq)]
pub enum SideEffect {
    Notification(NotificationPayload),
    Email(EmailPayload),
    PaymentLedger(LedgerPayload),
}

impl SideEffect {
    pub fn kind(&self) -> OutboxKind {
        match self {
            SideEffect::Notification(_) => OutboxKind::Notification,
            SideEffect::Email(_) => OutboxKind::Email,
            SideEffect::PaymentLedger(_) => OutboxKind::PaymentLedger,
        }
    }

    pub fn to_payload(&self) -> Result<serde_json::Value, serde_json::Error> {
        match self {
            SideEffect::Notification(p) => serde_json::to_value(p),
            SideEffect::Email(p) => serde_json::to_value(p),
            SideEffect::PaymentLedger(p) => serde_json::to_value(p),
        }
    }

    pub fn from_payload(
        kind: OutboxKind,
        payload: &serde_json::Value,
    ) -> Result<Self, serde_json::Error> {
        Ok(match kind {
            OutboxKind::Notification => {
                SideEffect::Notification(NotificationPayload::deserialize(payload)?)
            }
            OutboxKind::Email => SideEffect::Email(EmailPayload::deserialize(payload)?),
            OutboxKind::PaymentLedger => {
                SideEffect::PaymentLedger(LedgerPayload::deserialize(payload)?)
            }
        })
    }
}
