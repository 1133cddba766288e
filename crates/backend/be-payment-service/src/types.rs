use serde::{Deserialize, Serialize};

#[derive(Debug, Deserialize)]
pub struct CreatePaymentIntentRequest {
    pub amount: Option<f64>,
    pub currency: Option<String>,
    #[serde(alias = "idempotencyKey")]
    pub idempotency_key: Option<String>,
    #[serde(default)]
    pub metadata: PaymentMetadata,
}

#[derive(Debug, Default, Deserialize)]
pub struct PaymentMetadata {
    #[serde(alias = "orderId")]
    pub order_id: Option<String>,
    #[serde(alias = "pointsUsed")]
    pub points_used: Option<u32>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CreatePaymentIntentResponse {
    pub client_secret: String,
    pub payment_intent_id: String,
}
