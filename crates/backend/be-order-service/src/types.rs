use rust_decimal::Decimal;
use serde::Deserialize;
use uuid::Uuid;

use crate::complaints::ComplaintRequest;
use crate::error::OrderError;
use crate::validation::{OrderLine, ValidateOrderRequest};

fn parse_uuid(raw: Option<String>, field: &'static str) -> Result<Uuid, OrderError> {
    let raw = raw.ok_or(OrderError::MissingField(field))?;
    Uuid::parse_str(raw.trim()).map_err(|_| OrderError::InvalidField(field))
}

#[derive(Debug, Deserialize)]
pub struct CartLineBody {
    pub id: Option<String>,
    pub quantity: Option<i64>,
    /// Sent by the client for display; ignored in favour of the menu price.
    #[serde(default)]
    pub price: Option<f64>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeliveryInfoBody {
    #[serde(alias = "postal_code", alias = "codePostal")]
    pub postal_code: Option<String>,
    pub address: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidateOrderBody {
    #[serde(alias = "restaurant_id")]
    pub restaurant_id: Option<String>,
    pub items: Option<Vec<CartLineBody>>,
    #[serde(default, alias = "delivery_info")]
    pub delivery_info: Option<DeliveryInfoBody>,
}

impl TryFrom<ValidateOrderBody> for ValidateOrderRequest {
    type Error = OrderError;

    fn try_from(body: ValidateOrderBody) -> Result<Self, Self::Error> {
        let restaurant_id = parse_uuid(body.restaurant_id, "restaurantId")?;
        let items = body
            .items
            .filter(|items| !items.is_empty())
            .ok_or(OrderError::MissingField("items"))?
            .into_iter()
            .map(|line| {
                let quantity = line.quantity.unwrap_or(1);
                Ok(OrderLine {
                    item_id: parse_uuid(line.id, "items.id")?,
                    quantity: u32::try_from(quantity)
                        .ok()
                        .filter(|q| *q >= 1)
                        .ok_or(OrderError::InvalidField("quantity"))?,
                })
            })
            .collect::<Result<Vec<_>, OrderError>>()?;

        Ok(ValidateOrderRequest {
            restaurant_id,
            items,
            postal_code: body.delivery_info.and_then(|info| info.postal_code),
        })
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ComplaintBody {
    #[serde(alias = "order_id")]
    pub order_id: Option<String>,
    #[serde(alias = "complaint_type")]
    pub complaint_type: Option<String>,
    pub description: Option<String>,
    #[serde(alias = "requested_refund_amount")]
    pub requested_refund_amount: Option<f64>,
}

impl TryFrom<ComplaintBody> for ComplaintRequest {
    type Error = OrderError;

    fn try_from(body: ComplaintBody) -> Result<Self, Self::Error> {
        let requested_refund = body
            .requested_refund_amount
            .map(|amount| {
                if !amount.is_finite() {
                    return Err(OrderError::InvalidField("requestedRefundAmount"));
                }
                Decimal::try_from(amount)
                    .map_err(|_| OrderError::InvalidField("requestedRefundAmount"))
            })
            .transpose()?;

        Ok(ComplaintRequest {
            order_id: parse_uuid(body.order_id, "orderId")?,
            complaint_type: body
                .complaint_type
                .ok_or(OrderError::MissingField("complaintType"))?,
            description: body
                .description
                .ok_or(OrderError::MissingField("description"))?,
            requested_refund,
        })
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct ListParams {
    pub limit: Option<i64>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn cart_body_converts() {
        let body: ValidateOrderBody = serde_json::from_value(json!({
            "restaurantId": "00000000-0000-0000-0000-000000000100",
            "items": [{ "id": "00000000-0000-0000-0000-000000000001", "quantity": 2, "price": 1.0 }],
            "deliveryInfo": { "postalCode": "34190", "address": "1 rue de la Paix" }
        }))
        .unwrap();

        let request = ValidateOrderRequest::try_from(body).unwrap();
        assert_eq!(request.restaurant_id, Uuid::from_u128(0x100));
        assert_eq!(request.items[0].quantity, 2);
        assert_eq!(request.postal_code.as_deref(), Some("34190"));
    }

    #[test]
    fn negative_quantity_is_invalid() {
        let body: ValidateOrderBody = serde_json::from_value(json!({
            "restaurantId": "00000000-0000-0000-0000-000000000100",
            "items": [{ "id": "00000000-0000-0000-0000-000000000001", "quantity": -1 }]
        }))
        .unwrap();

        let err = ValidateOrderRequest::try_from(body).unwrap_err();
        assert!(matches!(err, OrderError::InvalidField("quantity")));
    }

    #[test]
    fn empty_cart_is_missing_items() {
        let body: ValidateOrderBody = serde_json::from_value(json!({
            "restaurantId": "00000000-0000-0000-0000-000000000100",
            "items": []
        }))
        .unwrap();

        let err = ValidateOrderRequest::try_from(body).unwrap_err();
        assert!(matches!(err, OrderError::MissingField("items")));
    }

    #[test]
    fn complaint_body_requires_order_id() {
        let body: ComplaintBody = serde_json::from_value(json!({
            "complaintType": "late",
            "description": "Livré avec une heure de retard"
        }))
        .unwrap();

        let err = ComplaintRequest::try_from(body).unwrap_err();
        assert!(matches!(err, OrderError::MissingField("orderId")));
    }
}
