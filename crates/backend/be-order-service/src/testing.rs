use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use be_notification_service::{LedgerPayload, NotificationPayload, OutboxStore};
use be_remote_db::{
    Complaint, ComplaintRecord, ComplaintStatus, DbError, DbResult, MenuItem, Order, OrderStatus,
    OutboxKind, OutboxTask, PaymentStatus, Restaurant, User, UserRole,
};
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use rust_decimal::Decimal;
use uuid::Uuid;

use crate::store::{NewComplaint, OrderStore};

pub const RESTAURANT: Uuid = Uuid::from_u128(0x100);
pub const CUSTOMER: Uuid = Uuid::from_u128(0x200);

/// Active, always open, 10.00 minimum, delivers to 34190 only.
pub fn restaurant() -> Restaurant {
    let now = Utc::now();
    Restaurant {
        id: RESTAURANT,
        owner_id: Some(Uuid::from_u128(0x300)),
        name: "La Table de Ganges".to_string(),
        is_active: true,
        is_closed: false,
        hours: None,
        min_order: Decimal::new(1000, 2),
        delivery_postal_codes: vec!["34190".to_string()],
        created_at: now,
        updated_at: now,
    }
}

pub fn menu_item(id: Uuid, price: Decimal, available: bool) -> MenuItem {
    MenuItem {
        id,
        restaurant_id: RESTAURANT,
        name: format!("Plat {}", id.as_u128()),
        price,
        is_available: available,
    }
}

/// A delivered order of `CUSTOMER` worth 25.00, delivered at `delivered_at`.
pub fn delivered_order(id: Uuid, delivered_at: DateTime<Utc>) -> Order {
    Order {
        id,
        customer_id: CUSTOMER,
        restaurant_id: RESTAURANT,
        driver_id: Some(Uuid::from_u128(0xd1)),
        total: Decimal::new(2500, 2),
        delivery_fee: Decimal::new(300, 2),
        discount_amount: Decimal::ZERO,
        promo_code_id: None,
        status: OrderStatus::Delivered,
        payment_status: PaymentStatus::Paid,
        payment_intent_id: Some("pi_1".to_string()),
        refund_id: None,
        refund_amount: None,
        refunded_at: None,
        driver_paid_at: None,
        delivery_postal_code: Some("34190".to_string()),
        created_at: delivered_at - chrono::Duration::minutes(45),
        updated_at: delivered_at,
    }
}

pub fn customer(id: Uuid, flagged: bool) -> User {
    let now = Utc::now();
    User {
        id,
        email: "client@example.test".to_string(),
        full_name: Some("Camille Martin".to_string()),
        role: UserRole::Customer,
        is_flagged: flagged,
        created_at: now,
        updated_at: now,
    }
}

#[derive(Default)]
struct State {
    restaurants: HashMap<Uuid, Restaurant>,
    items: HashMap<Uuid, MenuItem>,
    active_orders: HashMap<Uuid, i64>,
    fail_active_count: bool,
    orders: HashMap<Uuid, Order>,
    users: HashMap<Uuid, User>,
    records: HashMap<Uuid, ComplaintRecord>,
    complaints: Vec<Complaint>,
}

#[derive(Default)]
pub struct FakeOrderStore {
    state: Mutex<State>,
    restaurant_lookups: AtomicUsize,
}

impl FakeOrderStore {
    pub fn add_restaurant(&self, restaurant: Restaurant) {
        self.state
            .lock()
            .restaurants
            .insert(restaurant.id, restaurant);
    }

    pub fn add_item(&self, item: MenuItem) {
        self.state.lock().items.insert(item.id, item);
    }

    pub fn set_active_orders(&self, restaurant_id: Uuid, count: i64) {
        self.state.lock().active_orders.insert(restaurant_id, count);
    }

    pub fn fail_active_count(&self) {
        self.state.lock().fail_active_count = true;
    }

    pub fn add_order(&self, order: Order) {
        self.state.lock().orders.insert(order.id, order);
    }

    pub fn add_user(&self, user: User) {
        self.state.lock().users.insert(user.id, user);
    }

    pub fn set_record(&self, customer_id: Uuid, total: i64, rejected: i64) {
        self.state
            .lock()
            .records
            .insert(customer_id, ComplaintRecord { total, rejected });
    }

    pub fn complaints(&self) -> Vec<Complaint> {
        self.state.lock().complaints.clone()
    }

    pub fn restaurant_lookups(&self) -> usize {
        self.restaurant_lookups.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl OrderStore for FakeOrderStore {
    async fn find_restaurant(&self, restaurant_id: Uuid) -> DbResult<Option<Restaurant>> {
        self.restaurant_lookups.fetch_add(1, Ordering::SeqCst);
        Ok(self.state.lock().restaurants.get(&restaurant_id).cloned())
    }

    async fn find_menu_item(
        &self,
        restaurant_id: Uuid,
        item_id: Uuid,
    ) -> DbResult<Option<MenuItem>> {
        Ok(self
            .state
            .lock()
            .items
            .get(&item_id)
            .filter(|item| item.restaurant_id == restaurant_id)
            .cloned())
    }

    async fn count_active_orders(&self, restaurant_id: Uuid) -> DbResult<i64> {
        let state = self.state.lock();
        if state.fail_active_count {
            return Err(DbError::Connection("connection reset".to_string()));
        }
        Ok(state.active_orders.get(&restaurant_id).copied().unwrap_or(0))
    }

    async fn find_order(&self, order_id: Uuid) -> DbResult<Option<Order>> {
        Ok(self.state.lock().orders.get(&order_id).cloned())
    }

    async fn find_user(&self, user_id: Uuid) -> DbResult<Option<User>> {
        Ok(self.state.lock().users.get(&user_id).cloned())
    }

    async fn complaint_record(&self, customer_id: Uuid) -> DbResult<ComplaintRecord> {
        Ok(self
            .state
            .lock()
            .records
            .get(&customer_id)
            .copied()
            .unwrap_or_default())
    }

    async fn find_complaint_for_order(&self, order_id: Uuid) -> DbResult<Option<Complaint>> {
        Ok(self
            .state
            .lock()
            .complaints
            .iter()
            .find(|c| c.order_id == order_id)
            .cloned())
    }

    async fn create_complaint(&self, complaint: NewComplaint) -> DbResult<Complaint> {
        let mut state = self.state.lock();
        if state
            .complaints
            .iter()
            .any(|c| c.order_id == complaint.order_id)
        {
            return Err(DbError::duplicate("order_id", complaint.order_id.to_string()));
        }
        let now = Utc::now();
        let created = Complaint {
            id: Uuid::from_u128(0xc000 + state.complaints.len() as u128),
            order_id: complaint.order_id,
            customer_id: complaint.customer_id,
            restaurant_id: complaint.restaurant_id,
            complaint_type: complaint.complaint_type,
            description: complaint.description,
            requested_refund: complaint.requested_refund,
            status: ComplaintStatus::Pending,
            trust_score: complaint.trust_score,
            created_at: now,
            updated_at: now,
        };
        state.complaints.push(created.clone());
        Ok(created)
    }

    async fn list_complaints(
        &self,
        customer_id: Option<Uuid>,
        limit: i64,
    ) -> DbResult<Vec<Complaint>> {
        let mut complaints: Vec<Complaint> = self
            .state
            .lock()
            .complaints
            .iter()
            .filter(|c| customer_id.is_none_or(|id| c.customer_id == id))
            .cloned()
            .collect();
        complaints.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        complaints.truncate(usize::try_from(limit).unwrap_or(0));
        Ok(complaints)
    }
}

/// Records enqueued side effects without delivering them.
#[derive(Default)]
pub struct RecordingOutbox {
    tasks: Mutex<Vec<(OutboxKind, serde_json::Value)>>,
}

impl RecordingOutbox {
    pub fn payloads(&self, kind: OutboxKind) -> Vec<serde_json::Value> {
        self.tasks
            .lock()
            .iter()
            .filter(|(k, _)| *k == kind)
            .map(|(_, p)| p.clone())
            .collect()
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
