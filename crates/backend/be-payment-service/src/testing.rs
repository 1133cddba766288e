use std::collections::HashMap;

use async_trait::async_trait;
use be_remote_db::{
    DbError, DbResult, Order, OrderChargeContext, OrderStatus, PaymentIntentRecord, PaymentStatus,
};
use parking_lot::Mutex;
use rust_decimal::Decimal;
use uuid::Uuid;

use crate::{
    config::PaymentConfig,
    gateway::{
        CreatedIntent, GatewayError, IntentRequest, IssuedRefund, PaymentGateway,
        RefundRequest, RefundableBalance,
    },
    store::PaymentStore,
};

pub(crate) const ORDER_ID: Uuid = Uuid::from_u128(0x0190_f3a2_7c1e_7000_8000_0000_0000_0042);

pub(crate) fn test_config() -> PaymentConfig {
    PaymentConfig {
        stripe_secret_key: "sk_test_fake".to_string(),
        stripe_webhook_secret: "whsec_test_secret".to_string(),
        currency: "eur".to_string(),
        verify_fail_open: false,
    }
}

pub(crate) fn order_row(id: Uuid, intent_id: Option<&str>) -> Order {
    let now = chrono::Utc::now();
    Order {
        id,
        customer_id: Uuid::from_u128(9),
        restaurant_id: Uuid::from_u128(10),
        driver_id: None,
        total: Decimal::new(1800, 2),
        delivery_fee: Decimal::new(300, 2),
        discount_amount: Decimal::ZERO,
        promo_code_id: None,
        status: OrderStatus::Pending,
        payment_status: PaymentStatus::Pending,
        payment_intent_id: intent_id.map(str::to_string),
        refund_id: None,
        refund_amount: None,
        refunded_at: None,
        driver_paid_at: None,
        delivery_postal_code: None,
        created_at: now,
        updated_at: now,
    }
}

#[derive(Default)]
struct StoreState {
    maintenance: bool,
    unavailable: bool,
    corrupt: bool,
    orders: HashMap<Uuid, OrderChargeContext>,
    rows: HashMap<String, Order>,
    intents: HashMap<String, PaymentIntentRecord>,
    outcomes: Vec<(String, PaymentStatus, bool)>,
}

#[derive(Default)]
pub(crate) struct FakeStore {
    state: Mutex<StoreState>,
}

impl FakeStore {
    pub(crate) fn with_order(total: Decimal, discount: Decimal, fee: Decimal) -> Self {
        let store = Self::default();
        store.add_order(ORDER_ID, total, discount, fee);
        store
    }

    pub(crate) fn add_order(&self, id: Uuid, total: Decimal, discount: Decimal, fee: Decimal) {
        self.state.lock().orders.insert(
            id,
            OrderChargeContext {
                order_id: id,
                total,
                discount_amount: discount,
                delivery_fee: fee,
                promo_code_id: None,
                free_delivery: false,
            },
        );
    }

    pub(crate) fn set_maintenance(&self, on: bool) {
        self.state.lock().maintenance = on;
    }

    /// Makes order lookups fail as if the database were down.
    pub(crate) fn set_unavailable(&self, down: bool) {
        self.state.lock().unavailable = down;
    }

    /// Makes order lookups fail with a decoding error from a reachable database.
    pub(crate) fn set_corrupt(&self, corrupt: bool) {
        self.state.lock().corrupt = corrupt;
    }

    /// The order row carrying `intent_id`, once a webhook outcome touched it.
    pub(crate) fn order_for_intent(&self, intent_id: &str) -> Option<Order> {
        self.state.lock().rows.get(intent_id).cloned()
    }

    pub(crate) fn outcomes(&self) -> Vec<(String, PaymentStatus, bool)> {
        self.state.lock().outcomes.clone()
    }
}

#[async_trait]
impl PaymentStore for FakeStore {
    async fn is_maintenance_mode(&self) -> DbResult<bool> {
        Ok(self.state.lock().maintenance)
    }

    async fn charge_context(&self, order_id: Uuid) -> DbResult<Option<OrderChargeContext>> {
        let state = self.state.lock();
        if state.unavailable {
            return Err(DbError::Connection("connection refused".to_string()));
        }
        if state.corrupt {
            return Err(DbError::encoding("invalid value for column delivery_fee"));
        }
        Ok(state.orders.get(&order_id).cloned())
    }

    async fn find_intent(&self, idempotency_key: &str) -> DbResult<Option<PaymentIntentRecord>> {
        Ok(self.state.lock().intents.get(idempotency_key).cloned())
    }

    async fn save_intent(
        &self,
        idempotency_key: &str,
        order_id: Uuid,
        intent_id: &str,
        client_secret: &str,
        amount_cents: i64,
        currency: &str,
    ) -> DbResult<PaymentIntentRecord> {
        let mut state = self.state.lock();
        let record = state
            .intents
            .entry(idempotency_key.to_string())
            .or_insert_with(|| PaymentIntentRecord {
                id: Uuid::from_u128(order_id.as_u128() ^ 1),
                idempotency_key: idempotency_key.to_string(),
                order_id,
                processor_intent_id: intent_id.to_string(),
                client_secret: client_secret.to_string(),
                amount_cents,
                currency: currency.to_string(),
                created_at: chrono::Utc::now(),
            });
        Ok(record.clone())
    }

    async fn apply_payment_outcome(
        &self,
        intent_id: &str,
        payment_status: PaymentStatus,
        cancel_order: bool,
    ) -> DbResult<Option<Order>> {
        let mut state = self.state.lock();
        state
            .outcomes
            .push((intent_id.to_string(), payment_status, cancel_order));

        let known = state
            .intents
            .values()
            .find(|r| r.processor_intent_id == intent_id)
            .map(|r| r.order_id);

        let Some(order_id) = known else {
            return Ok(None);
        };
        let order = state
            .rows
            .entry(intent_id.to_string())
            .or_insert_with(|| order_row(order_id, Some(intent_id)));
        if !order.payment_status.accepts_outcome(payment_status) {
            return Ok(None);
        }
        order.payment_status = payment_status;
        if cancel_order && order.status.can_transition_to(OrderStatus::Cancelled) {
            order.status = OrderStatus::Cancelled;
        }
        Ok(Some(order.clone()))
    }
}

#[derive(Default)]
pub(crate) struct FakeGateway {
    created: Mutex<Vec<IntentRequest>>,
}

impl FakeGateway {
    pub(crate) fn created(&self) -> Vec<IntentRequest> {
        self.created.lock().clone()
    }
}

#[async_trait]
impl PaymentGateway for FakeGateway {
    async fn create_intent(&self, request: IntentRequest) -> Result<CreatedIntent, GatewayError> {
        let mut created = self.created.lock();
        let id = format!("pi_test_{}", created.len() + 1);
        created.push(request);
        Ok(CreatedIntent {
            client_secret: format!("{id}_secret_test"),
            id,
        })
    }

    async fn refundable_balance(
        &self,
        _intent_id: &str,
    ) -> Result<Option<RefundableBalance>, GatewayError> {
        Ok(Some(RefundableBalance::default()))
    }

    async fn refund(&self, request: RefundRequest) -> Result<IssuedRefund, GatewayError> {
        Ok(IssuedRefund {
            id: format!("re_{}", request.intent_id),
            amount_cents: request.amount_cents,
        })
    }
}
