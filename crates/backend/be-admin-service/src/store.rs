use async_trait::async_trait;
use be_remote_db::{
    DatabaseManager, DbError, DbResult, DeliveryTransfer, Order, ResettableTable, User,
};
use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq)]
pub struct NewTransfer {
    pub driver_id: Uuid,
    pub amount: Decimal,
    pub transfer_date: NaiveDate,
    pub reference: Option<String>,
    pub notes: Option<String>,
    pub created_by: Uuid,
}

#[async_trait]
pub trait AdminStore: Send + Sync {
    async fn find_order(&self, order_id: Uuid) -> DbResult<Option<Order>>;

    /// Moves the order to `cancelled` unless it is already terminal. Only the
    /// caller that gets the row back may refund.
    async fn cancel_if_active(&self, order_id: Uuid) -> DbResult<Option<Order>>;

    /// Returns `false` when the order was no longer in a captured state.
    async fn mark_refunded(
        &self,
        order_id: Uuid,
        refund_id: Option<&str>,
        amount: Decimal,
    ) -> DbResult<bool>;

    async fn pending_for_cancellation(&self, include_unpaid: bool) -> DbResult<Vec<Order>>;

    async fn refunded_uncancelled_since(&self, since: DateTime<Utc>) -> DbResult<Vec<Order>>;

    async fn find_user(&self, user_id: Uuid) -> DbResult<Option<User>>;

    async fn create_transfer(&self, transfer: NewTransfer) -> DbResult<DeliveryTransfer>;

    async fn unpaid_deliveries(&self, driver_id: Uuid) -> DbResult<Vec<Order>>;

    async fn mark_delivery_paid(&self, order_id: Uuid) -> DbResult<bool>;

    async fn count_rows(&self, table: ResettableTable) -> DbResult<i64>;

    async fn delete_rows(&self, table: ResettableTable) -> DbResult<u64>;
}

#[async_trait]
impl AdminStore for DatabaseManager {
    async fn find_order(&self, order_id: Uuid) -> DbResult<Option<Order>> {
        DatabaseManager::find_order(self, order_id).await
    }

    async fn cancel_if_active(&self, order_id: Uuid) -> DbResult<Option<Order>> {
        self.cancel_order_if_active(order_id).await
    }

    async fn mark_refunded(
        &self,
        order_id: Uuid,
        refund_id: Option<&str>,
        amount: Decimal,
    ) -> DbResult<bool> {
        self.mark_order_refunded()
            .order_id(order_id)
            .maybe_refund_id(refund_id)
            .refund_amount(amount)
            .call()
            .await
    }

    async fn pending_for_cancellation(&self, include_unpaid: bool) -> DbResult<Vec<Order>> {
        self.list_pending_orders_for_cancellation(include_unpaid)
            .await
    }

    async fn refunded_uncancelled_since(&self, since: DateTime<Utc>) -> DbResult<Vec<Order>> {
        self.list_refunded_uncancelled_since(since).await
    }

    async fn find_user(&self, user_id: Uuid) -> DbResult<Option<User>> {
        match self.get_user().id(user_id).call().await {
            Ok(user) => Ok(Some(user)),
            Err(DbError::NotFound { .. }) => Ok(None),
            Err(e) => Err(e),
        }
    }

    async fn create_transfer(&self, transfer: NewTransfer) -> DbResult<DeliveryTransfer> {
        self.create_delivery_transfer()
            .driver_id(transfer.driver_id)
            .amount(transfer.amount)
            .transfer_date(transfer.transfer_date)
            .maybe_reference(transfer.reference)
            .maybe_notes(transfer.notes)
            .created_by(transfer.created_by)
            .call()
            .await
    }

    async fn unpaid_deliveries(&self, driver_id: Uuid) -> DbResult<Vec<Order>> {
        self.list_unpaid_deliveries(driver_id).await
    }

    async fn mark_delivery_paid(&self, order_id: Uuid) -> DbResult<bool> {
        DatabaseManager::mark_delivery_paid(self, order_id).await
    }

    async fn count_rows(&self, table: ResettableTable) -> DbResult<i64> {
        DatabaseManager::count_rows(self, table).await
    }

    async fn delete_rows(&self, table: ResettableTable) -> DbResult<u64> {
        self.delete_all_rows(table).await
    }
}
