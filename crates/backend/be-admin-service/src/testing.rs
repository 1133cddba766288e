use std::collections::{HashMap, HashSet};

use async_trait::async_trait;
use be_notification_service::{LedgerPayload, NotificationPayload, OutboxStore};
use be_payment_service::gateway::{CreatedIntent, IntentRequest};
use be_payment_service::{
    GatewayError, IssuedRefund, PaymentGateway, RefundRequest, RefundableBalance,
};
use be_remote_db::{
    DbError, DbResult, DeliveryTransfer, Order, OrderStatus, OutboxKind, OutboxTask,
    PaymentStatus, ResettableTable, User, UserRole,
};
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use rust_decimal::Decimal;
use uuid::Uuid;

use crate::store::{AdminStore, NewTransfer};

pub const CUSTOMER: Uuid = Uuid::from_u128(9);
pub const DRIVER: Uuid = Uuid::from_u128(0xd1);

/// A pending, unpaid order of 18.00 plus 3.00 delivery.
pub fn order(id: Uuid) -> Order {
    let now = Utc::now();
    Order {
        id,
        customer_id: CUSTOMER,
        restaurant_id: Uuid::from_u128(10),
        driver_id: None,
        total: Decimal::new(1800, 2),
        delivery_fee: Decimal::new(300, 2),
        discount_amount: Decimal::ZERO,
        promo_code_id: None,
        status: OrderStatus::Pending,
        payment_status: PaymentStatus::Pending,
        payment_intent_id: None,
        refund_id: None,
        refund_amount: None,
        refunded_at: None,
        driver_paid_at: None,
        delivery_postal_code: None,
        created_at: now,
        updated_at: now,
    }
}

pub fn user(id: Uuid, role: UserRole) -> User {
    let now = Utc::now();
    User {
        id,
        email: format!("{}@example.test", &id.to_string()[..8]),
        full_name: Some("Camille Martin".to_string()),
        role,
        is_flagged: false,
        created_at: now,
        updated_at: now,
    }
}

#[derive(Default)]
struct StoreState {
    orders: HashMap<Uuid, Order>,
    users: HashMap<Uuid, User>,
    transfers: Vec<DeliveryTransfer>,
    failing_payouts: HashSet<Uuid>,
    row_counts: HashMap<&'static str, i64>,
    failing_tables: HashSet<&'static str>,
    deleted_tables: Vec<&'static str>,
}

pub struct FakeAdminStore {
    state: Mutex<StoreState>,
}

impl Default for FakeAdminStore {
    fn default() -> Self {
        let store = Self {
            state: Mutex::new(StoreState::default()),
        };
        store.insert_user(user(CUSTOMER, UserRole::Customer));
        store.insert_user(user(DRIVER, UserRole::Delivery));
        store
    }
}

impl FakeAdminStore {
    pub fn insert_order(&self, order: Order) {
        self.state.lock().orders.insert(order.id, order);
    }

    pub fn order(&self, id: Uuid) -> Option<Order> {
        self.state.lock().orders.get(&id).cloned()
    }

    pub fn insert_user(&self, user: User) {
        self.state.lock().users.insert(user.id, user);
    }

    pub fn transfers(&self) -> Vec<DeliveryTransfer> {
        self.state.lock().transfers.clone()
    }

    pub fn fail_payout_marking(&self, order_id: Uuid) {
        self.state.lock().failing_payouts.insert(order_id);
    }

    pub fn set_row_count(&self, table: ResettableTable, count: i64) {
        self.state
            .lock()
            .row_counts
            .insert(table.table_name(), count);
    }

    pub fn fail_table(&self, table: ResettableTable) {
        self.state.lock().failing_tables.insert(table.table_name());
    }

    pub fn deleted_tables(&self) -> Vec<&'static str> {
        self.state.lock().deleted_tables.clone()
    }
}

#[async_trait]
impl AdminStore for FakeAdminStore {
    async fn find_order(&self, order_id: Uuid) -> DbResult<Option<Order>> {
        Ok(self.order(order_id))
    }

    async fn cancel_if_active(&self, order_id: Uuid) -> DbResult<Option<Order>> {
        let mut state = self.state.lock();
        match state.orders.get_mut(&order_id) {
            Some(order) if order.status.can_transition_to(OrderStatus::Cancelled) => {
                order.status = OrderStatus::Cancelled;
                order.updated_at = Utc::now();
                Ok(Some(order.clone()))
            }
            _ => Ok(None),
        }
    }

    async fn mark_refunded(
        &self,
        order_id: Uuid,
        refund_id: Option<&str>,
        amount: Decimal,
    ) -> DbResult<bool> {
        let mut state = self.state.lock();
        match state.orders.get_mut(&order_id) {
            Some(order) if order.payment_status.is_captured() => {
                order.payment_status = PaymentStatus::Refunded;
                order.refund_id = refund_id.map(str::to_string);
                order.refund_amount = Some(amount);
                order.refunded_at = Some(Utc::now());
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn pending_for_cancellation(&self, include_unpaid: bool) -> DbResult<Vec<Order>> {
        let mut orders: Vec<Order> = self
            .state
            .lock()
            .orders
            .values()
            .filter(|o| o.status == OrderStatus::Pending)
            .filter(|o| {
                o.payment_status.is_captured()
                    || (include_unpaid && o.payment_status == PaymentStatus::Pending)
            })
            .cloned()
            .collect();
        orders.sort_by_key(|o| o.created_at);
        Ok(orders)
    }

    async fn refunded_uncancelled_since(&self, since: DateTime<Utc>) -> DbResult<Vec<Order>> {
        let mut orders: Vec<Order> = self
            .state
            .lock()
            .orders
            .values()
            .filter(|o| {
                o.payment_status == PaymentStatus::Refunded
                    && o.status != OrderStatus::Cancelled
                    && o.created_at >= since
            })
            .cloned()
            .collect();
        orders.sort_by_key(|o| o.created_at);
        Ok(orders)
    }

    async fn find_user(&self, user_id: Uuid) -> DbResult<Option<User>> {
        Ok(self.state.lock().users.get(&user_id).cloned())
    }

    async fn create_transfer(&self, transfer: NewTransfer) -> DbResult<DeliveryTransfer> {
        let mut state = self.state.lock();
        let created = DeliveryTransfer {
            id: Uuid::from_u128(0x7000 + state.transfers.len() as u128),
            driver_id: transfer.driver_id,
            amount: transfer.amount,
            transfer_date: transfer.transfer_date,
            reference: transfer.reference,
            notes: transfer.notes,
            created_by: transfer.created_by,
            created_at: Utc::now(),
        };
        state.transfers.push(created.clone());
        Ok(created)
    }

    async fn unpaid_deliveries(&self, driver_id: Uuid) -> DbResult<Vec<Order>> {
        let mut orders: Vec<Order> = self
            .state
            .lock()
            .orders
            .values()
            .filter(|o| {
                o.driver_id == Some(driver_id)
                    && o.status == OrderStatus::Delivered
                    && o.driver_paid_at.is_none()
            })
            .cloned()
            .collect();
        orders.sort_by_key(|o| o.created_at);
        Ok(orders)
    }

    async fn mark_delivery_paid(&self, order_id: Uuid) -> DbResult<bool> {
        let mut state = self.state.lock();
        if state.failing_payouts.contains(&order_id) {
            return Err(DbError::Connection("connection reset".to_string()));
        }
        match state.orders.get_mut(&order_id) {
            Some(order) if order.driver_paid_at.is_none() => {
                order.driver_paid_at = Some(Utc::now());
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn count_rows(&self, table: ResettableTable) -> DbResult<i64> {
        Ok(self
            .state
            .lock()
            .row_counts
            .get(table.table_name())
            .copied()
            .unwrap_or(0))
    }

    async fn delete_rows(&self, table: ResettableTable) -> DbResult<u64> {
        let mut state = self.state.lock();
        let name = table.table_name();
        if state.failing_tables.contains(name) {
            return Err(DbError::ForeignKeyViolation {
                entity: name.to_string(),
            });
        }
        state.deleted_tables.push(name);
        let count = state.row_counts.insert(name, 0).unwrap_or(0);
        Ok(count.max(0) as u64)
    }
}

#[derive(Default)]
struct GatewayState {
    balances: HashMap<String, Option<RefundableBalance>>,
    refunds: Vec<RefundRequest>,
    fail_refunds: bool,
}

#[derive(Default)]
pub struct FakeGateway {
    state: Mutex<GatewayState>,
}

impl FakeGateway {
    pub fn set_balance(&self, intent_id: &str, captured_cents: i64, refunded_cents: i64) {
        self.state.lock().balances.insert(
            intent_id.to_string(),
            Some(RefundableBalance {
                captured_cents,
                refunded_cents,
            }),
        );
    }

    /// The intent exists but the processor reports no charge on it.
    pub fn set_no_charge(&self, intent_id: &str) {
        self.state.lock().balances.insert(intent_id.to_string(), None);
    }

    pub fn fail_refunds(&self) {
        self.state.lock().fail_refunds = true;
    }

    pub fn refunds(&self) -> Vec<RefundRequest> {
        self.state.lock().refunds.clone()
    }
}

#[async_trait]
impl PaymentGateway for FakeGateway {
    async fn create_intent(&self, request: IntentRequest) -> Result<CreatedIntent, GatewayError> {
        Ok(CreatedIntent {
            id: format!("pi_{}", request.idempotency_key),
            client_secret: "secret".to_string(),
        })
    }

    async fn refundable_balance(
        &self,
        intent_id: &str,
    ) -> Result<Option<RefundableBalance>, GatewayError> {
        self.state
            .lock()
            .balances
            .get(intent_id)
            .copied()
            .ok_or_else(|| GatewayError::Rejected {
                status: 404,
                message: format!("No such payment_intent: {intent_id}"),
            })
    }

    async fn refund(&self, request: RefundRequest) -> Result<IssuedRefund, GatewayError> {
        let mut state = self.state.lock();
        if state.fail_refunds {
            return Err(GatewayError::Communication("connection reset".to_string()));
        }
        if let Some(Some(balance)) = state.balances.get_mut(&request.intent_id) {
            balance.refunded_cents += request.amount_cents;
        }
        let issued = IssuedRefund {
            id: format!("re_{}", state.refunds.len() + 1),
            amount_cents: request.amount_cents,
        };
        state.refunds.push(request);
        Ok(issued)
    }
}

/// Records enqueued side effects without delivering them.
#[derive(Default)]
pub struct RecordingOutbox {
    tasks: Mutex<Vec<(OutboxKind, serde_json::Value)>>,
}

impl RecordingOutbox {
    pub fn count(&self, kind: OutboxKind) -> usize {
        self.tasks.lock().iter().filter(|(k, _)| *k == kind).count()
    }

    pub fn payloads(&self, kind: OutboxKind) -> Vec<serde_json::Value> {
        self.tasks
            .lock()
            .iter()
            .filter(|(k, _)| *k == kind)
            .map(|(_, p)| p.clone())
            .collect()
    }

    pub fn last_notification_kind(&self) -> Option<String> {
        self.payloads(OutboxKind::Notification)
            .last()
            .and_then(|p| p["kind"].as_str().map(str::to_string))
    }
}

#[async_trait]
impl OutboxStore for RecordingOutbox {
    async fn enqueue(&self, kind: OutboxKind, payload: serde_json::Value) -> DbResult<Uuid> {
        let mut tasks = self.tasks.lock();
        tasks.push((kind, payload));
        Ok(Uuid::from_u128(tasks.len() as u128))
    }

    async fn claim_due(
        &self,
        _limit: i64,
        _lease: std::time::Duration,
    ) -> DbResult<Vec<OutboxTask>> {
        Ok(Vec::new())
    }

    async fn complete(&self, _task_id: Uuid) -> DbResult<()> {
        Ok(())
    }

    async fn record_failure(
        &self,
        _task_id: Uuid,
        _error: &str,
        _retry_at: Option<DateTime<Utc>>,
    ) -> DbResult<()> {
        Ok(())
    }

    async fn insert_notification(&self, _notification: &NotificationPayload) -> DbResult<()> {
        Ok(())
    }

    async fn insert_ledger_entry(&self, _entry: &LedgerPayload) -> DbResult<()> {
        Ok(())
    }
}
