//! One charge intent per logical checkout.

use std::collections::HashMap;

use be_remote_db::PaymentIntentRecord;
use rust_decimal::Decimal;
use uuid::Uuid;

use crate::{
    config::PaymentConfig,
    error::PaymentError,
    gateway::{IntentRequest, PaymentGateway},
    reconcile::{MIN_CHARGE, Verification, to_cents, verify_charge},
    store::PaymentStore,
    types::CreatePaymentIntentResponse,
};

#[derive(Debug, Clone)]
pub struct IssueRequest {
    pub order_id: Uuid,
    pub customer_id: Uuid,
    pub amount: Decimal,
    pub currency: String,
    pub idempotency_key: Option<String>,
    pub points_used: u32,
}

impl IssueRequest {
    pub fn idempotency_key(&self) -> String {
        self.idempotency_key
            .as_deref()
            .map(str::trim)
            .filter(|k| !k.is_empty())
            .map(str::to_string)
            .unwrap_or_else(|| format!("order:{}", self.order_id))
    }

    fn has_caller_key(&self) -> bool {
        self.idempotency_key
            .as_deref()
            .is_some_and(|k| !k.trim().is_empty())
    }
}

fn reuse(existing: PaymentIntentRecord) -> CreatePaymentIntentResponse {
    tracing::info!(intent_id = %existing.processor_intent_id, "Reusing payment intent for idempotency key");
    CreatePaymentIntentResponse {
        client_secret: existing.client_secret,
        payment_intent_id: existing.processor_intent_id,
    }
}

#[tracing::instrument(skip(store, gateway, config), fields(order_id = %request.order_id))]
pub async fn issue_payment_intent(
    store: &dyn PaymentStore,
    gateway: &dyn PaymentGateway,
    config: &PaymentConfig,
    request: IssueRequest,
) -> Result<CreatePaymentIntentResponse, PaymentError> {
    match store.is_maintenance_mode().await {
        Ok(true) => return Err(PaymentError::Maintenance),
        Ok(false) => {}
        Err(e) => tracing::warn!(error = %e, "Could not read maintenance flag"),
    }

    if request.amount < MIN_CHARGE {
        return Err(PaymentError::InvalidAmount(format!(
            "The minimum payment amount is {MIN_CHARGE} €"
        )));
    }

    let verification = verify_charge(
        store,
        request.order_id,
        request.amount,
        request.points_used,
        config.verify_fail_open,
    )
    .await?;

    if verification == Verification::Bypassed {
        tracing::warn!(amount = %request.amount, "Issuing intent for an unreconciled amount");
    }

    let amount_cents = to_cents(request.amount);
    let mut key = request.idempotency_key();

    if let Some(existing) = store.find_intent(&key).await? {
        if existing.order_id != request.order_id {
            return Err(PaymentError::InvalidField("idempotency_key"));
        }
        if existing.amount_cents == amount_cents {
            return Ok(reuse(existing));
        }
        if request.has_caller_key() {
            return Err(PaymentError::IdempotencyConflict {
                stored_cents: existing.amount_cents,
                requested_cents: amount_cents,
            });
        }
        // The order's default key already charges another amount.
        key = format!("{key}:{amount_cents}");
        if let Some(existing) = store.find_intent(&key).await? {
            return Ok(reuse(existing));
        }
    }
    let mut metadata = HashMap::from([
        ("order_id".to_string(), request.order_id.to_string()),
        ("user_id".to_string(), request.customer_id.to_string()),
    ]);
    if request.points_used > 0 {
        metadata.insert("points_used".to_string(), request.points_used.to_string());
    }

    let created = gateway
        .create_intent(IntentRequest {
            amount_cents,
            currency: request.currency.clone(),
            idempotency_key: key.clone(),
            metadata,
        })
        .await?;

    let record = store
        .save_intent(
            &key,
            request.order_id,
            &created.id,
            &created.client_secret,
            amount_cents,
            &request.currency,
        )
        .await?;

    tracing::info!(intent_id = %record.processor_intent_id, amount_cents, "Payment intent issued");

    Ok(CreatePaymentIntentResponse {
        client_secret: record.client_secret,
        payment_intent_id: record.processor_intent_id,
    })
}

#[cfg(test)]
mod tests {
    use rust_decimal_macros::dec;

    use super::*;
    use crate::reconcile::ReconcileError;
    use crate::testing::{FakeGateway, FakeStore, ORDER_ID, test_config};

    fn request(amount: Decimal) -> IssueRequest {
        IssueRequest {
            order_id: ORDER_ID,
            customer_id: Uuid::from_u128(9),
            amount,
            currency: "eur".to_string(),
            idempotency_key: None,
            points_used: 0,
        }
    }

    #[tokio::test]
    async fn issues_once_per_idempotency_key() {
        let store = FakeStore::with_order(dec!(18.00), dec!(3.00), dec!(3.00));
        let gateway = FakeGateway::default();
        let config = test_config();

        let first = issue_payment_intent(&store, &gateway, &config, request(dec!(18.49)))
            .await
            .unwrap();
        let second = issue_payment_intent(&store, &gateway, &config, request(dec!(18.49)))
            .await
            .unwrap();

        assert_eq!(first.payment_intent_id, second.payment_intent_id);
        assert_eq!(gateway.created().len(), 1);
        assert_eq!(gateway.created()[0].idempotency_key, format!("order:{ORDER_ID}"));
        assert_eq!(gateway.created()[0].amount_cents, 1849);
    }

    #[tokio::test]
    async fn maintenance_blocks_payments() {
        let store = FakeStore::with_order(dec!(18.00), dec!(0), dec!(3.00));
        store.set_maintenance(true);
        let gateway = FakeGateway::default();

        let err = issue_payment_intent(&store, &gateway, &test_config(), request(dec!(21.49)))
            .await
            .unwrap_err();

        assert!(matches!(err, PaymentError::Maintenance));
        assert!(gateway.created().is_empty());
    }

    #[tokio::test]
    async fn below_minimum_charge_is_rejected() {
        let store = FakeStore::with_order(dec!(0), dec!(0), dec!(3.00));
        let gateway = FakeGateway::default();

        let err = issue_payment_intent(&store, &gateway, &test_config(), request(dec!(0.40)))
            .await
            .unwrap_err();

        assert!(matches!(err, PaymentError::InvalidAmount(_)));
    }

    #[tokio::test]
    async fn unreachable_store_rejects_by_default() {
        let store = FakeStore::with_order(dec!(18.00), dec!(0), dec!(3.00));
        store.set_unavailable(true);
        let gateway = FakeGateway::default();

        let err = issue_payment_intent(&store, &gateway, &test_config(), request(dec!(21.49)))
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            PaymentError::Reconcile(ReconcileError::VerificationUnavailable)
        ));
        assert!(gateway.created().is_empty());
    }

    #[tokio::test]
    async fn fail_open_only_when_configured() {
        let store = FakeStore::with_order(dec!(18.00), dec!(0), dec!(3.00));
        store.set_unavailable(true);
        let gateway = FakeGateway::default();
        let mut config = test_config();
        config.verify_fail_open = true;

        let response = issue_payment_intent(&store, &gateway, &config, request(dec!(99.00)))
            .await
            .unwrap();

        assert_eq!(gateway.created().len(), 1);
        assert_eq!(gateway.created()[0].amount_cents, 9900);
        assert!(!response.client_secret.is_empty());
    }

    #[tokio::test]
    async fn mismatched_amount_never_reaches_processor() {
        let store = FakeStore::with_order(dec!(18.00), dec!(3.00), dec!(3.00));
        let gateway = FakeGateway::default();

        let err = issue_payment_intent(&store, &gateway, &test_config(), request(dec!(19.00)))
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            PaymentError::Reconcile(ReconcileError::AmountMismatch { .. })
        ));
        assert!(gateway.created().is_empty());
    }

    #[tokio::test]
    async fn reused_key_for_another_order_is_rejected() {
        let store = FakeStore::with_order(dec!(18.00), dec!(3.00), dec!(3.00));
        let gateway = FakeGateway::default();
        let config = test_config();

        let mut first = request(dec!(18.49));
        first.idempotency_key = Some("checkout-1".into());
        issue_payment_intent(&store, &gateway, &config, first)
            .await
            .unwrap();

        store.add_order(Uuid::from_u128(77), dec!(18.00), dec!(3.00), dec!(3.00));
        let mut second = request(dec!(18.49));
        second.order_id = Uuid::from_u128(77);
        second.idempotency_key = Some("checkout-1".into());

        let err = issue_payment_intent(&store, &gateway, &config, second)
            .await
            .unwrap_err();
        assert!(matches!(err, PaymentError::InvalidField("idempotency_key")));
    }

    #[tokio::test]
    async fn changed_amount_gets_its_own_intent() {
        let store = FakeStore::with_order(dec!(18.00), dec!(3.00), dec!(3.00));
        let gateway = FakeGateway::default();
        let config = test_config();

        let first = issue_payment_intent(&store, &gateway, &config, request(dec!(18.49)))
            .await
            .unwrap();

        let mut with_points = request(dec!(13.49));
        with_points.points_used = 100;
        let second = issue_payment_intent(&store, &gateway, &config, with_points.clone())
            .await
            .unwrap();
        let third = issue_payment_intent(&store, &gateway, &config, with_points)
            .await
            .unwrap();

        assert_ne!(first.payment_intent_id, second.payment_intent_id);
        assert_eq!(second.payment_intent_id, third.payment_intent_id);
        let created = gateway.created();
        assert_eq!(created.len(), 2);
        assert_eq!(created[1].amount_cents, 1349);
        assert_eq!(created[1].idempotency_key, format!("order:{ORDER_ID}:1349"));
    }

    #[tokio::test]
    async fn caller_key_reused_for_another_amount_conflicts() {
        let store = FakeStore::with_order(dec!(18.00), dec!(3.00), dec!(3.00));
        let gateway = FakeGateway::default();
        let config = test_config();

        let mut first = request(dec!(18.49));
        first.idempotency_key = Some("checkout-7".into());
        issue_payment_intent(&store, &gateway, &config, first)
            .await
            .unwrap();

        let mut second = request(dec!(13.49));
        second.points_used = 100;
        second.idempotency_key = Some("checkout-7".into());
        let err = issue_payment_intent(&store, &gateway, &config, second)
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            PaymentError::IdempotencyConflict {
                stored_cents: 1849,
                requested_cents: 1349
            }
        ));
        assert_eq!(err.status_code(), axum::http::StatusCode::CONFLICT);
        assert_eq!(gateway.created().len(), 1);
    }

    #[tokio::test]
    async fn store_errors_other_than_outages_never_fail_open() {
        let store = FakeStore::with_order(dec!(18.00), dec!(0), dec!(3.00));
        store.set_corrupt(true);
        let gateway = FakeGateway::default();
        let mut config = test_config();
        config.verify_fail_open = true;

        let err = issue_payment_intent(&store, &gateway, &config, request(dec!(99.00)))
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            PaymentError::Reconcile(ReconcileError::VerificationFailed)
        ));
        assert_eq!(err.status_code(), axum::http::StatusCode::INTERNAL_SERVER_ERROR);
        assert!(gateway.created().is_empty());
    }
}
