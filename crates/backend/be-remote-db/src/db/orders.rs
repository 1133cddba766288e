use bon::bon;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use uuid::Uuid;

use crate::{
    DatabaseManager,
    error::{DbError, DbResult},
    types::{Order, OrderChargeContext, PaymentStatus},
};

macro_rules! order_columns {
    () => {
        "id, customer_id, restaurant_id, driver_id, total, delivery_fee, discount_amount, \
         promo_code_id, status, payment_status, payment_intent_id, refund_id, refund_amount, \
         refunded_at, driver_paid_at, delivery_postal_code, created_at, updated_at"
    };
}

#[bon]
impl DatabaseManager {
    pub async fn find_order(&self, order_id: Uuid) -> DbResult<Option<Order>> {
        let order = sqlx::query_as::<_, Order>(concat!(
            "SELECT ",
            order_columns!(),
            " FROM orders WHERE id = $1"
        ))
        .bind(order_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(order)
    }

    pub async fn get_order(&self, order_id: Uuid) -> DbResult<Order> {
        self.find_order(order_id)
            .await?
            .ok_or_else(|| DbError::not_found_with_id("order", order_id.to_string()))
    }

    pub async fn find_order_by_payment_intent(&self, intent_id: &str) -> DbResult<Option<Order>> {
        let order = sqlx::query_as::<_, Order>(concat!(
            "SELECT ",
            order_columns!(),
            " FROM orders WHERE payment_intent_id = $1"
        ))
        .bind(intent_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(order)
    }

    /// Stored amounts plus whether the attached promo waives the delivery fee.
    pub async fn get_order_charge_context(
        &self,
        order_id: Uuid,
    ) -> DbResult<Option<OrderChargeContext>> {
        let context = sqlx::query_as::<_, OrderChargeContext>(
            r#"
            SELECT o.id AS order_id,
                   o.total,
                   o.discount_amount,
                   o.delivery_fee,
                   o.promo_code_id,
                   COALESCE(p.discount_type = 'free_delivery', false) AS free_delivery
            FROM orders o
            LEFT JOIN promo_codes p ON p.id = o.promo_code_id
            WHERE o.id = $1
            "#,
        )
        .bind(order_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(context)
    }

    #[builder]
    pub async fn set_order_payment_intent(
        &self,
        order_id: Uuid,
        payment_intent_id: &str,
    ) -> DbResult<()> {
        sqlx::query(
            r#"
            UPDATE orders
            SET payment_intent_id = $2, updated_at = now()
            WHERE id = $1
            "#,
        )
        .bind(order_id)
        .bind(payment_intent_id)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Compare-and-swap to `cancelled`. Returns `None` when the order is
    /// already terminal (or does not exist): only the caller that receives
    /// the row may go on to refund.
    pub async fn cancel_order_if_active(&self, order_id: Uuid) -> DbResult<Option<Order>> {
        let order = sqlx::query_as::<_, Order>(concat!(
            "UPDATE orders SET status = 'cancelled', updated_at = now() \
             WHERE id = $1 AND status NOT IN ('cancelled', 'delivered') RETURNING ",
            order_columns!()
        ))
        .bind(order_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(order)
    }

    /// Single-row refund stamp, only from a captured payment state.
    #[builder]
    pub async fn mark_order_refunded(
        &self,
        order_id: Uuid,
        refund_id: Option<&str>,
        refund_amount: Decimal,
    ) -> DbResult<bool> {
        let result = sqlx::query(
            r#"
            UPDATE orders
            SET payment_status = 'refunded',
                refund_id = $2,
                refund_amount = $3,
                refunded_at = now(),
                updated_at = now()
            WHERE id = $1 AND payment_status IN ('paid', 'succeeded')
            "#,
        )
        .bind(order_id)
        .bind(refund_id)
        .bind(refund_amount)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() == 1)
    }

    /// Pending orders awaiting cancellation: captured ones, plus never-charged
    /// ones when `include_unpaid` is set.
    pub async fn list_pending_orders_for_cancellation(
        &self,
        include_unpaid: bool,
    ) -> DbResult<Vec<Order>> {
        let orders = sqlx::query_as::<_, Order>(concat!(
            "SELECT ",
            order_columns!(),
            " FROM orders WHERE status = 'pending' \
              AND (payment_status IN ('paid', 'succeeded') \
                   OR ($1 AND payment_status = 'pending')) \
              ORDER BY created_at ASC"
        ))
        .bind(include_unpaid)
        .fetch_all(&self.pool)
        .await?;

        Ok(orders)
    }

    pub async fn list_refunded_uncancelled_since(
        &self,
        since: DateTime<Utc>,
    ) -> DbResult<Vec<Order>> {
        let orders = sqlx::query_as::<_, Order>(concat!(
            "SELECT ",
            order_columns!(),
            " FROM orders WHERE payment_status = 'refunded' \
              AND status <> 'cancelled' AND created_at >= $1 \
              ORDER BY created_at ASC"
        ))
        .bind(since)
        .fetch_all(&self.pool)
        .await?;

        Ok(orders)
    }

    /// Applies a processor-reported payment outcome. A failed payment also
    /// cancels the order unless it is already terminal. Outcomes arriving
    /// after a refund, or a failure arriving after capture, match no row
    /// (see [`PaymentStatus::accepts_outcome`]).
    #[builder]
    pub async fn apply_payment_outcome(
        &self,
        payment_intent_id: &str,
        payment_status: PaymentStatus,
        cancel_order: bool,
    ) -> DbResult<Option<Order>> {
        let order = sqlx::query_as::<_, Order>(concat!(
            "UPDATE orders SET payment_status = $2, \
               status = CASE WHEN $3 AND status NOT IN ('delivered', 'cancelled') \
                             THEN 'cancelled'::order_status ELSE status END, \
               updated_at = now() \
             WHERE payment_intent_id = $1 AND payment_status <> 'refunded' \
               AND ($4 OR payment_status NOT IN ('paid', 'succeeded')) \
             RETURNING ",
            order_columns!()
        ))
        .bind(payment_intent_id)
        .bind(payment_status)
        .bind(cancel_order)
        .bind(payment_status.is_captured())
        .fetch_optional(&self.pool)
        .await?;

        Ok(order)
    }

    pub async fn count_active_orders(&self, restaurant_id: Uuid) -> DbResult<i64> {
        let count = sqlx::query_scalar::<_, i64>(
            r#"
            SELECT COUNT(*)
            FROM orders
            WHERE restaurant_id = $1
              AND status IN ('pending', 'accepted', 'preparing', 'ready')
            "#,
        )
        .bind(restaurant_id)
        .fetch_one(&self.pool)
        .await?;

        Ok(count)
    }

    pub async fn count_customer_orders(&self, customer_id: Uuid) -> DbResult<i64> {
        let count = sqlx::query_scalar::<_, i64>(
            r#"
            SELECT COUNT(*) FROM orders WHERE customer_id = $1 AND status <> 'cancelled'
            "#,
        )
        .bind(customer_id)
        .fetch_one(&self.pool)
        .await?;

        Ok(count)
    }

    /// Delivered orders of a driver not yet covered by a payout, oldest first.
    pub async fn list_unpaid_deliveries(&self, driver_id: Uuid) -> DbResult<Vec<Order>> {
        let orders = sqlx::query_as::<_, Order>(concat!(
            "SELECT ",
            order_columns!(),
            " FROM orders WHERE driver_id = $1 AND status = 'delivered' \
              AND driver_paid_at IS NULL ORDER BY created_at ASC"
        ))
        .bind(driver_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(orders)
    }

    pub async fn mark_delivery_paid(&self, order_id: Uuid) -> DbResult<bool> {
        let result = sqlx::query(
            r#"
            UPDATE orders
            SET driver_paid_at = now(), updated_at = now()
            WHERE id = $1 AND driver_paid_at IS NULL
            "#,
        )
        .bind(order_id)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() == 1)
    }
}
