use bon::bon;
use chrono::NaiveDate;
use rust_decimal::Decimal;
use uuid::Uuid;

use crate::{
    DatabaseManager,
    error::DbResult,
    types::{DeliveryTransfer, PaymentIntentRecord, PaymentLedgerEntry},
};

#[bon]
impl DatabaseManager {
    pub async fn find_payment_intent_by_key(
        &self,
        idempotency_key: &str,
    ) -> DbResult<Option<PaymentIntentRecord>> {
        let record = sqlx::query_as::<_, PaymentIntentRecord>(
            r#"
            SELECT id, idempotency_key, order_id, processor_intent_id, client_secret,
                   amount_cents, currency, created_at
            FROM payment_intents
            WHERE idempotency_key = $1
            "#,
        )
        .bind(idempotency_key)
        .fetch_optional(&self.pool)
        .await?;

        Ok(record)
    }

    /// Stores the intent for `idempotency_key`. If a concurrent request
    /// stored one first, that earlier record is returned instead.
    #[builder]
    pub async fn save_payment_intent(
        &self,
        idempotency_key: &str,
        order_id: Uuid,
        processor_intent_id: &str,
        client_secret: &str,
        amount_cents: i64,
        currency: &str,
    ) -> DbResult<PaymentIntentRecord> {
        let mut tx = self.pool.begin().await?;

        let inserted = sqlx::query_as::<_, PaymentIntentRecord>(
            r#"
            INSERT INTO payment_intents (id, idempotency_key, order_id, processor_intent_id,
                                         client_secret, amount_cents, currency, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, now())
            ON CONFLICT (idempotency_key) DO NOTHING
            RETURNING id, idempotency_key, order_id, processor_intent_id, client_secret,
                      amount_cents, currency, created_at
            "#,
        )
        .bind(Uuid::now_v7())
        .bind(idempotency_key)
        .bind(order_id)
        .bind(processor_intent_id)
        .bind(client_secret)
        .bind(amount_cents)
        .bind(currency)
        .fetch_optional(&mut *tx)
        .await?;

        let record = match inserted {
            Some(record) => {
                sqlx::query(
                    r#"
                    UPDATE orders SET payment_intent_id = $2, updated_at = now() WHERE id = $1
                    "#,
                )
                .bind(order_id)
                .bind(processor_intent_id)
                .execute(&mut *tx)
                .await?;
                record
            }
            None => {
                sqlx::query_as::<_, PaymentIntentRecord>(
                    r#"
                    SELECT id, idempotency_key, order_id, processor_intent_id, client_secret,
                           amount_cents, currency, created_at
                    FROM payment_intents
                    WHERE idempotency_key = $1
                    "#,
                )
                .bind(idempotency_key)
                .fetch_one(&mut *tx)
                .await?
            }
        };

        tx.commit().await?;

        Ok(record)
    }

    #[builder]
    pub async fn insert_payment_ledger_entry(
        &self,
        order_id: Uuid,
        processor_intent_id: Option<String>,
        processor_refund_id: Option<String>,
        kind: &str,
        amount: Decimal,
    ) -> DbResult<PaymentLedgerEntry> {
        let entry = sqlx::query_as::<_, PaymentLedgerEntry>(
            r#"
            INSERT INTO payments (id, order_id, processor_intent_id, processor_refund_id, kind, amount, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, now())
            RETURNING id, order_id, processor_intent_id, processor_refund_id, kind, amount, created_at
            "#,
        )
        .bind(Uuid::now_v7())
        .bind(order_id)
        .bind(&processor_intent_id)
        .bind(&processor_refund_id)
        .bind(kind)
        .bind(amount)
        .fetch_one(&self.pool)
        .await?;

        Ok(entry)
    }

    #[builder]
    pub async fn create_delivery_transfer(
        &self,
        driver_id: Uuid,
        amount: Decimal,
        transfer_date: NaiveDate,
        reference: Option<String>,
        notes: Option<String>,
        created_by: Uuid,
    ) -> DbResult<DeliveryTransfer> {
        let transfer = sqlx::query_as::<_, DeliveryTransfer>(
            r#"
            INSERT INTO delivery_transfers (id, driver_id, amount, transfer_date, reference, notes, created_by, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, now())
            RETURNING id, driver_id, amount, transfer_date, reference, notes, created_by, created_at
            "#,
        )
        .bind(Uuid::now_v7())
        .bind(driver_id)
        .bind(amount)
        .bind(transfer_date)
        .bind(&reference)
        .bind(&notes)
        .bind(created_by)
        .fetch_one(&self.pool)
        .await?;

        Ok(transfer)
    }
}
