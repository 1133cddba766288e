//! Payment processor boundary.
//!
//! Handlers and workflows talk to [`PaymentGateway`]; [`StripeGateway`] is the
//! production implementation. Every mutating call carries an idempotency key
//! so a retried request never creates a second intent or refund.

use std::collections::HashMap;

use async_trait::async_trait;
use axum::http::StatusCode;
use stripe::{
    Client, CreatePaymentIntent, CreatePaymentIntentAutomaticPaymentMethods, CreateRefund,
    Currency, ErrorType, PaymentIntent, PaymentIntentId, Refund, RefundReasonFilter,
    RequestStrategy, StripeError,
};

#[derive(Debug, thiserror::Error)]
pub enum GatewayError {
    #[error("payment processor configuration error: {0}")]
    Configuration(String),

    #[error("payment processor communication error: {0}")]
    Communication(String),

    #[error("payment processor rejected the request ({status}): {message}")]
    Rejected { status: u16, message: String },
}

impl GatewayError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            GatewayError::Configuration(_) | GatewayError::Communication(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
            GatewayError::Rejected { .. } => StatusCode::BAD_REQUEST,
        }
    }

    pub fn is_retryable(&self) -> bool {
        matches!(self, GatewayError::Communication(_))
    }
}

impl From<StripeError> for GatewayError {
    fn from(err: StripeError) -> Self {
        match err {
            StripeError::Stripe(request) => {
                let message = request
                    .message
                    .clone()
                    .unwrap_or_else(|| "Payment processing error".to_string());
                match request.error_type {
                    ErrorType::Authentication => GatewayError::Configuration(message),
                    ErrorType::Api | ErrorType::Connection | ErrorType::RateLimit => {
                        GatewayError::Communication(message)
                    }
                    ErrorType::Card
                    | ErrorType::InvalidRequest
                    | ErrorType::IdempotencyError
                    | ErrorType::Validation => GatewayError::Rejected {
                        status: request.http_status,
                        message,
                    },
                    _ => match request.http_status {
                        401 | 403 => GatewayError::Configuration(message),
                        429 | 500..=599 => GatewayError::Communication(message),
                        status => GatewayError::Rejected { status, message },
                    },
                }
            }
            StripeError::ClientError(msg) => GatewayError::Communication(msg),
            StripeError::Timeout => GatewayError::Communication("timeout".to_string()),
            other => GatewayError::Configuration(other.to_string()),
        }
    }
}

#[derive(Debug, Clone)]
pub struct IntentRequest {
    pub amount_cents: i64,
    pub currency: String,
    pub idempotency_key: String,
    pub metadata: HashMap<String, String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreatedIntent {
    pub id: String,
    pub client_secret: String,
}

/// Captured and refunded totals of the latest charge of an intent, in cents.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RefundableBalance {
    pub captured_cents: i64,
    pub refunded_cents: i64,
}

impl RefundableBalance {
    pub fn remaining_cents(&self) -> i64 {
        (self.captured_cents - self.refunded_cents).max(0)
    }

    pub fn has_refund(&self) -> bool {
        self.refunded_cents > 0
    }
}

#[derive(Debug, Clone)]
pub struct RefundRequest {
    pub intent_id: String,
    pub amount_cents: i64,
    pub idempotency_key: String,
    pub metadata: HashMap<String, String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IssuedRefund {
    pub id: String,
    pub amount_cents: i64,
}

#[async_trait]
pub trait PaymentGateway: Send + Sync {
    /// Creates a charge intent with automatic payment methods enabled.
    async fn create_intent(&self, request: IntentRequest) -> Result<CreatedIntent, GatewayError>;

    /// `None` when the intent has no charge to refund against.
    async fn refundable_balance(
        &self,
        intent_id: &str,
    ) -> Result<Option<RefundableBalance>, GatewayError>;

    /// Issues a refund with reason `requested_by_customer`.
    async fn refund(&self, request: RefundRequest) -> Result<IssuedRefund, GatewayError>;
}

#[derive(Clone)]
pub struct StripeGateway {
    client: Client,
}

impl StripeGateway {
    pub fn new(secret_key: &str) -> Self {
        Self {
            client: Client::new(secret_key),
        }
    }

    fn idempotent(&self, key: &str) -> Client {
        self.client
            .clone()
            .with_strategy(RequestStrategy::Idempotent(key.to_string()))
    }
}

fn parse_intent_id(intent_id: &str) -> Result<PaymentIntentId, GatewayError> {
    intent_id.parse::<PaymentIntentId>().map_err(|_| GatewayError::Rejected {
        status: 400,
        message: format!("'{intent_id}' is not a payment intent id"),
    })
}

#[async_trait]
impl PaymentGateway for StripeGateway {
    async fn create_intent(&self, request: IntentRequest) -> Result<CreatedIntent, GatewayError> {
        let currency = request
            .currency
            .parse::<Currency>()
            .map_err(|_| GatewayError::Configuration(format!("unknown currency {}", request.currency)))?;

        let mut params = CreatePaymentIntent::new(request.amount_cents, currency);
        params.automatic_payment_methods = Some(CreatePaymentIntentAutomaticPaymentMethods {
            allow_redirects: None,
            enabled: true,
        });
        params.metadata = Some(request.metadata);

        let client = self.idempotent(&request.idempotency_key);
        let intent = PaymentIntent::create(&client, params).await?;

        let client_secret = intent.client_secret.ok_or_else(|| {
            GatewayError::Communication("payment intent returned without a client secret".into())
        })?;

        Ok(CreatedIntent {
            id: intent.id.to_string(),
            client_secret,
        })
    }

    async fn refundable_balance(
        &self,
        intent_id: &str,
    ) -> Result<Option<RefundableBalance>, GatewayError> {
        let id = parse_intent_id(intent_id)?;
        let intent = PaymentIntent::retrieve(&self.client, &id, &["latest_charge"]).await?;

        let balance = intent
            .latest_charge
            .as_ref()
            .and_then(|charge| charge.as_object())
            .map(|charge| RefundableBalance {
                captured_cents: charge.amount_captured,
                refunded_cents: charge.amount_refunded,
            });

        Ok(balance)
    }

    async fn refund(&self, request: RefundRequest) -> Result<IssuedRefund, GatewayError> {
        let mut params = CreateRefund::new();
        params.payment_intent = Some(parse_intent_id(&request.intent_id)?);
        params.amount = Some(request.amount_cents);
        params.reason = Some(RefundReasonFilter::RequestedByCustomer);
        params.metadata = Some(request.metadata);

        let client = self.idempotent(&request.idempotency_key);
        let refund = Refund::create(&client, params).await?;

        Ok(IssuedRefund {
            id: refund.id.to_string(),
            amount_cents: refund.amount,
        })
    }
}
