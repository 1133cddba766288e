use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::types::Json;
use sqlx::{FromRow, Type};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Type)]
#[sqlx(type_name = "user_role", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum UserRole {
    Customer,
    Restaurant,
    Delivery,
    Admin,
}

impl From<UserRole> for auth_core::Role {
    fn from(role: UserRole) -> Self {
        match role {
            UserRole::Customer => auth_core::Role::Customer,
            UserRole::Restaurant => auth_core::Role::Restaurant,
            UserRole::Delivery => auth_core::Role::Delivery,
            UserRole::Admin => auth_core::Role::Admin,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct User {
    pub id: Uuid,
    pub email: String,
    pub full_name: Option<String>,
    pub role: UserRole,
    pub is_flagged: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Order lifecycle. `Delivered` and `Cancelled` are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Type)]
#[sqlx(type_name = "order_status", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    Pending,
    Accepted,
    Preparing,
    Ready,
    OutForDelivery,
    Delivered,
    Cancelled,
}

impl OrderStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, OrderStatus::Delivered | OrderStatus::Cancelled)
    }

    /// Orders that still occupy the restaurant's kitchen.
    pub fn is_active_in_kitchen(&self) -> bool {
        matches!(
            self,
            OrderStatus::Pending
                | OrderStatus::Accepted
                | OrderStatus::Preparing
                | OrderStatus::Ready
        )
    }

    pub fn can_transition_to(&self, next: OrderStatus) -> bool {
        use OrderStatus::*;
        match (self, next) {
            (from, Cancelled) => !from.is_terminal(),
            (Pending, Accepted)
            | (Accepted, Preparing)
            | (Preparing, Ready)
            | (Ready, OutForDelivery)
            | (OutForDelivery, Delivered) => true,
            _ => false,
        }
    }
}

impl std::fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            OrderStatus::Pending => "pending",
            OrderStatus::Accepted => "accepted",
            OrderStatus::Preparing => "preparing",
            OrderStatus::Ready => "ready",
            OrderStatus::OutForDelivery => "out_for_delivery",
            OrderStatus::Delivered => "delivered",
            OrderStatus::Cancelled => "cancelled",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Type)]
#[sqlx(type_name = "payment_status", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum PaymentStatus {
    Pending,
    Paid,
    Succeeded,
    Refunded,
    Failed,
}

impl PaymentStatus {
    /// Money has been captured and not yet returned.
    pub fn is_captured(&self) -> bool {
        matches!(self, PaymentStatus::Paid | PaymentStatus::Succeeded)
    }

    /// Whether a processor-reported outcome may overwrite this status.
    /// Refunds are final and a captured payment is never downgraded.
    pub fn accepts_outcome(&self, outcome: PaymentStatus) -> bool {
        match self {
            PaymentStatus::Refunded => false,
            PaymentStatus::Paid | PaymentStatus::Succeeded => outcome.is_captured(),
            PaymentStatus::Pending | PaymentStatus::Failed => true,
        }
    }
}

impl std::fmt::Display for PaymentStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            PaymentStatus::Pending => "pending",
            PaymentStatus::Paid => "paid",
            PaymentStatus::Succeeded => "succeeded",
            PaymentStatus::Refunded => "refunded",
            PaymentStatus::Failed => "failed",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Order {
    pub id: Uuid,
    pub customer_id: Uuid,
    pub restaurant_id: Uuid,
    pub driver_id: Option<Uuid>,
    pub total: Decimal,
    pub delivery_fee: Decimal,
    pub discount_amount: Decimal,
    pub promo_code_id: Option<Uuid>,
    pub status: OrderStatus,
    pub payment_status: PaymentStatus,
    pub payment_intent_id: Option<String>,
    pub refund_id: Option<String>,
    pub refund_amount: Option<Decimal>,
    pub refunded_at: Option<DateTime<Utc>>,
    pub driver_paid_at: Option<DateTime<Utc>>,
    pub delivery_postal_code: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Stored order fields needed to recompute the expected charge.
#[derive(Debug, Clone, FromRow)]
pub struct OrderChargeContext {
    pub order_id: Uuid,
    pub total: Decimal,
    pub discount_amount: Decimal,
    pub delivery_fee: Decimal,
    pub promo_code_id: Option<Uuid>,
    pub free_delivery: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct OrderItem {
    pub id: Uuid,
    pub order_id: Uuid,
    pub menu_item_id: Option<Uuid>,
    pub formula_id: Option<Uuid>,
    pub quantity: i32,
    pub unit_price: Decimal,
    pub customizations: Option<Json<serde_json::Value>>,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Restaurant {
    pub id: Uuid,
    pub owner_id: Option<Uuid>,
    pub name: String,
    pub is_active: bool,
    pub is_closed: bool,
    pub hours: Option<Json<serde_json::Value>>,
    pub min_order: Decimal,
    pub delivery_postal_codes: Vec<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct MenuItem {
    pub id: Uuid,
    pub restaurant_id: Uuid,
    pub name: String,
    pub price: Decimal,
    pub is_available: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Type)]
#[sqlx(type_name = "promo_discount_type", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum DiscountType {
    Percentage,
    Fixed,
    FreeDelivery,
    FreeItem,
}

impl std::fmt::Display for DiscountType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            DiscountType::Percentage => "percentage",
            DiscountType::Fixed => "fixed",
            DiscountType::FreeDelivery => "free_delivery",
            DiscountType::FreeItem => "free_item",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct PromoCode {
    pub id: Uuid,
    pub code: String,
    pub description: Option<String>,
    pub discount_type: DiscountType,
    pub value: Decimal,
    pub max_discount_amount: Option<Decimal>,
    pub min_order_amount: Decimal,
    pub valid_from: DateTime<Utc>,
    pub valid_until: Option<DateTime<Utc>>,
    pub max_uses: Option<i32>,
    pub max_uses_per_user: Option<i32>,
    pub used_count: i32,
    pub first_order_only: bool,
    pub restaurant_id: Option<Uuid>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
}

/// Row returned by the `validate_promo_code` SQL function.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct PromoValidation {
    pub valid: bool,
    pub discount_amount: Decimal,
    pub discount_type: Option<DiscountType>,
    pub message: String,
    pub promo_code_id: Option<Uuid>,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct WheelPrize {
    pub id: Uuid,
    pub user_id: Option<Uuid>,
    pub code: String,
    pub prize_type: String,
    pub promo_code_id: Option<Uuid>,
    pub description: Option<String>,
    pub valid_until: DateTime<Utc>,
    pub used_at: Option<DateTime<Utc>>,
    pub used_in_order_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct PromoUsage {
    pub id: Uuid,
    pub promo_code_id: Option<Uuid>,
    pub wheel_prize_id: Option<Uuid>,
    pub user_id: Uuid,
    pub order_id: Uuid,
    pub discount_amount: Decimal,
    pub created_at: DateTime<Utc>,
}

/// Idempotency record binding a caller key to one processor intent.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct PaymentIntentRecord {
    pub id: Uuid,
    pub idempotency_key: String,
    pub order_id: Uuid,
    pub processor_intent_id: String,
    pub client_secret: String,
    pub amount_cents: i64,
    pub currency: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct PaymentLedgerEntry {
    pub id: Uuid,
    pub order_id: Uuid,
    pub processor_intent_id: Option<String>,
    pub processor_refund_id: Option<String>,
    pub kind: String,
    pub amount: Decimal,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct DeliveryTransfer {
    pub id: Uuid,
    pub driver_id: Uuid,
    pub amount: Decimal,
    pub transfer_date: NaiveDate,
    pub reference: Option<String>,
    pub notes: Option<String>,
    pub created_by: Uuid,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Notification {
    pub id: Uuid,
    pub user_id: Option<Uuid>,
    pub restaurant_id: Option<Uuid>,
    pub kind: String,
    pub title: String,
    pub message: String,
    pub data: Json<serde_json::Value>,
    pub read: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Type)]
#[sqlx(type_name = "complaint_status", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum ComplaintStatus {
    Pending,
    Approved,
    Rejected,
    Resolved,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Complaint {
    pub id: Uuid,
    pub order_id: Uuid,
    pub customer_id: Uuid,
    pub restaurant_id: Uuid,
    pub complaint_type: String,
    pub description: String,
    pub requested_refund: Decimal,
    pub status: ComplaintStatus,
    pub trust_score: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Past complaint counts used to score a new complaint.
#[derive(Debug, Clone, Copy, Default, FromRow)]
pub struct ComplaintRecord {
    pub total: i64,
    pub rejected: i64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Type)]
#[sqlx(type_name = "outbox_kind", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum OutboxKind {
    Notification,
    Email,
    PaymentLedger,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Type)]
#[sqlx(type_name = "outbox_status", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum OutboxStatus {
    Pending,
    Done,
    Failed,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct OutboxTask {
    pub id: Uuid,
    pub kind: OutboxKind,
    pub payload: Json<serde_json::Value>,
    pub status: OutboxStatus,
    pub attempts: i32,
    pub next_attempt_at: DateTime<Utc>,
    pub last_error: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Tables wiped by the administrative reset, in foreign-key order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ResettableTable {
    OrderItems,
    ComplaintHistory,
    Complaints,
    PromoUsages,
    Payments,
    PaymentIntents,
    Orders,
    Notifications,
}

impl ResettableTable {
    pub const RESET_ORDER: [ResettableTable; 8] = [
        ResettableTable::OrderItems,
        ResettableTable::ComplaintHistory,
        ResettableTable::Complaints,
        ResettableTable::PromoUsages,
        ResettableTable::Payments,
        ResettableTable::PaymentIntents,
        ResettableTable::Orders,
        ResettableTable::Notifications,
    ];

    pub fn table_name(&self) -> &'static str {
        match self {
            ResettableTable::OrderItems => "order_items",
            ResettableTable::ComplaintHistory => "complaint_history",
            ResettableTable::Complaints => "complaints",
            ResettableTable::PromoUsages => "promo_usages",
            ResettableTable::Payments => "payments",
            ResettableTable::PaymentIntents => "payment_intents",
            ResettableTable::Orders => "orders",
            ResettableTable::Notifications => "notifications",
        }
    }
}
