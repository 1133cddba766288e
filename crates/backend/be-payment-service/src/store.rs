use async_trait::async_trait;
use be_remote_db::{
    DatabaseManager, DbResult, Order, OrderChargeContext, PaymentIntentRecord, PaymentStatus,
};
use uuid::Uuid;

/// Persistence needed by the payment routes.
#[async_trait]
pub trait PaymentStore: Send + Sync {
    async fn is_maintenance_mode(&self) -> DbResult<bool>;

    async fn charge_context(&self, order_id: Uuid) -> DbResult<Option<OrderChargeContext>>;

    async fn find_intent(&self, idempotency_key: &str) -> DbResult<Option<PaymentIntentRecord>>;

    /// Stores the intent for the key and links it to the order. Returns the
    /// record that won if another request stored one first.
    async fn save_intent(
        &self,
        idempotency_key: &str,
        order_id: Uuid,
        intent_id: &str,
        client_secret: &str,
        amount_cents: i64,
        currency: &str,
    ) -> DbResult<PaymentIntentRecord>;

    async fn apply_payment_outcome(
        &self,
        intent_id: &str,
        payment_status: PaymentStatus,
        cancel_order: bool,
    ) -> DbResult<Option<Order>>;
}

#[async_trait]
impl PaymentStore for DatabaseManager {
    async fn is_maintenance_mode(&self) -> DbResult<bool> {
        DatabaseManager::is_maintenance_mode(self).await
    }

    async fn charge_context(&self, order_id: Uuid) -> DbResult<Option<OrderChargeContext>> {
        self.get_order_charge_context(order_id).await
    }

    async fn find_intent(&self, idempotency_key: &str) -> DbResult<Option<PaymentIntentRecord>> {
        self.find_payment_intent_by_key(idempotency_key).await
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
        self.save_payment_intent()
            .idempotency_key(idempotency_key)
            .order_id(order_id)
            .processor_intent_id(intent_id)
            .client_secret(client_secret)
            .amount_cents(amount_cents)
            .currency(currency)
            .call()
            .await
    }

    async fn apply_payment_outcome(
        &self,
        intent_id: &str,
        payment_status: PaymentStatus,
        cancel_order: bool,
    ) -> DbResult<Option<Order>> {
        DatabaseManager::apply_payment_outcome(self)
            .payment_intent_id(intent_id)
            .payment_status(payment_status)
            .cancel_order(cancel_order)
            .call()
            .await
    }
}
