use std::sync::Arc;

use be_remote_db::PaymentStatus;

use crate::error::PaymentError;
use crate::store::PaymentStore;

/// Reactions to payment intent lifecycle events delivered by the processor.
#[allow(unused_variables)]
pub trait WebhookEventHandler: Send + Sync + 'static {
    /// The customer's payment was captured.
    fn on_payment_succeeded(
        &self,
        intent_id: String,
    ) -> impl std::future::Future<Output = Result<(), PaymentError>> + Send {
        async { Ok(()) }
    }

    /// The payment attempt failed; the order will not be fulfilled.
    fn on_payment_failed(
        &self,
        intent_id: String,
    ) -> impl std::future::Future<Output = Result<(), PaymentError>> + Send {
        async { Ok(()) }
    }

    fn on_payment_canceled(
        &self,
        intent_id: String,
    ) -> impl std::future::Future<Output = Result<(), PaymentError>> + Send {
        async { Ok(()) }
    }
}

/// Mirrors processor outcomes onto the order row that carries the intent.
pub struct OrderPaymentHandler {
    store: Arc<dyn PaymentStore>,
}

impl OrderPaymentHandler {
    pub fn new(store: Arc<dyn PaymentStore>) -> Self {
        Self { store }
    }

    async fn apply(
        &self,
        intent_id: &str,
        payment_status: PaymentStatus,
        cancel_order: bool,
    ) -> Result<(), PaymentError> {
        match self
            .store
            .apply_payment_outcome(intent_id, payment_status, cancel_order)
            .await?
        {
            Some(order) => {
                tracing::info!(
                    order_id = %order.id,
                    %intent_id,
                    payment_status = %order.payment_status,
                    status = %order.status,
                    "Order payment status updated from webhook"
                );
            }
            None => {
                tracing::warn!(
                    %intent_id,
                    outcome = %payment_status,
                    "Webhook outcome ignored: no matching order, or its payment is already final"
                );
            }
        }
        Ok(())
    }
}

impl WebhookEventHandler for OrderPaymentHandler {
    async fn on_payment_succeeded(&self, intent_id: String) -> Result<(), PaymentError> {
        self.apply(&intent_id, PaymentStatus::Paid, false).await
    }

    async fn on_payment_failed(&self, intent_id: String) -> Result<(), PaymentError> {
        self.apply(&intent_id, PaymentStatus::Failed, true).await
    }

    async fn on_payment_canceled(&self, intent_id: String) -> Result<(), PaymentError> {
        self.apply(&intent_id, PaymentStatus::Failed, false).await
    }
}

/// Logs events without touching any order.
pub struct LoggingWebhookHandler;

impl WebhookEventHandler for LoggingWebhookHandler {
    async fn on_payment_succeeded(&self, intent_id: String) -> Result<(), PaymentError> {
        tracing::info!(%intent_id, "Payment succeeded (no-op handler)");
        Ok(())
    }

    async fn on_payment_failed(&self, intent_id: String) -> Result<(), PaymentError> {
        tracing::info!(%intent_id, "Payment failed (no-op handler)");
        Ok(())
    }
}
