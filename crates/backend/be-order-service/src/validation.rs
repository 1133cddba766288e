//! Pre-checkout validation of a cart against the restaurant's current state.
//!
//! Checks run in a fixed order and the first failure is reported. Prices
//! always come from the menu, never from the client.

use std::sync::Arc;
use std::time::Duration;

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use be_remote_db::Restaurant;
use chrono::{DateTime, FixedOffset, Utc};
use futures::future::try_join_all;
use rust_decimal::Decimal;
use serde::Serialize;
use serde_json::json;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::cache::TtlCache;
use crate::error::OrderError;
use crate::hours::{NextOpening, OpeningHours};
use crate::store::OrderStore;

pub const RESTAURANT_CACHE_TTL: Duration = Duration::from_secs(60);
pub const MAX_ACTIVE_ORDERS: i64 = 10;
const BASE_PREP_MINUTES: i64 = 15;
const PREP_MINUTES_PER_ORDER: i64 = 2;
const WAIT_MINUTES_PER_ORDER: i64 = 5;

#[derive(Debug, Clone, PartialEq)]
pub struct OrderLine {
    pub item_id: Uuid,
    pub quantity: u32,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ValidateOrderRequest {
    pub restaurant_id: Uuid,
    pub items: Vec<OrderLine>,
    pub postal_code: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RestaurantSummary {
    pub id: Uuid,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ValidatedItem {
    pub id: Uuid,
    pub name: String,
    pub price: Decimal,
    pub quantity: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidatedOrder {
    pub valid: bool,
    pub message: &'static str,
    pub restaurant: RestaurantSummary,
    pub items: Vec<ValidatedItem>,
    pub subtotal: Decimal,
    pub estimated_prep_time: i64,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Rejection {
    Inactive,
    Closed {
        next_opening: Option<NextOpening>,
    },
    ItemUnavailable {
        item_id: Uuid,
        name: Option<String>,
    },
    MinimumOrder {
        minimum: Decimal,
        subtotal: Decimal,
    },
    DeliveryZone {
        postal_code: Option<String>,
    },
    Overloaded {
        active_orders: i64,
    },
}

impl Rejection {
    pub fn code(&self) -> &'static str {
        match self {
            Rejection::Inactive => "RESTAURANT_INACTIVE",
            Rejection::Closed { .. } => "RESTAURANT_CLOSED",
            Rejection::ItemUnavailable { .. } => "ITEM_UNAVAILABLE",
            Rejection::MinimumOrder { .. } => "MINIMUM_ORDER",
            Rejection::DeliveryZone { .. } => "DELIVERY_ZONE_INVALID",
            Rejection::Overloaded { .. } => "RESTAURANT_OVERLOADED",
        }
    }

    fn error(&self) -> &'static str {
        match self {
            Rejection::Inactive => "Restaurant temporairement fermé",
            Rejection::Closed { .. } => "Restaurant fermé",
            Rejection::ItemUnavailable { .. } => "Article non disponible",
            Rejection::MinimumOrder { .. } => "Commande minimum non atteinte",
            Rejection::DeliveryZone { .. } => "Zone de livraison non couverte",
            Rejection::Overloaded { .. } => "Restaurant surchargé",
        }
    }

    pub fn body(&self) -> serde_json::Value {
        let mut body = json!({
            "valid": false,
            "error": self.error(),
            "code": self.code(),
        });
        let extra = match self {
            Rejection::Inactive => json!({
                "message": "Ce restaurant n'accepte pas de commandes pour le moment",
            }),
            Rejection::Closed { next_opening } => json!({
                "message": "Le restaurant est fermé actuellement",
                "nextOpening": next_opening,
            }),
            Rejection::ItemUnavailable { item_id, name } => {
                let message = match name {
                    Some(name) => format!("Article non disponible: {name}"),
                    None => "Article introuvable dans ce restaurant".to_string(),
                };
                json!({ "message": message, "itemId": item_id })
            }
            Rejection::MinimumOrder { minimum, subtotal } => json!({
                "message": format!("Commande minimum: {minimum:.2}€"),
                "minimum": minimum,
                "currentAmount": subtotal,
                "missing": minimum - subtotal,
            }),
            Rejection::DeliveryZone { postal_code } => json!({
                "message": "Ce restaurant ne livre pas à cette adresse",
                "postalCode": postal_code,
            }),
            Rejection::Overloaded { active_orders } => json!({
                "message": "Le restaurant a trop de commandes en cours",
                "estimatedWait": active_orders * WAIT_MINUTES_PER_ORDER,
            }),
        };
        if let (Some(body), Some(extra)) = (body.as_object_mut(), extra.as_object()) {
            body.extend(extra.clone());
        }
        body
    }
}

impl IntoResponse for Rejection {
    fn into_response(self) -> Response {
        (StatusCode::BAD_REQUEST, Json(self.body())).into_response()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Verdict {
    Valid(ValidatedOrder),
    Rejected(Rejection),
}

#[derive(Clone)]
pub struct OrderValidator {
    store: Arc<dyn OrderStore>,
    restaurants: Arc<TtlCache<Uuid, Restaurant>>,
    timezone: FixedOffset,
}

impl OrderValidator {
    pub fn new(
        store: Arc<dyn OrderStore>,
        restaurants: Arc<TtlCache<Uuid, Restaurant>>,
        timezone: FixedOffset,
    ) -> Self {
        Self {
            store,
            restaurants,
            timezone,
        }
    }

    async fn restaurant(&self, restaurant_id: Uuid) -> Result<Option<Restaurant>, OrderError> {
        if let Some(cached) = self.restaurants.get(&restaurant_id) {
            return Ok(Some(cached));
        }
        let restaurant = self.store.find_restaurant(restaurant_id).await?;
        if let Some(restaurant) = &restaurant {
            self.restaurants
                .insert_with_ttl(restaurant_id, restaurant.clone(), RESTAURANT_CACHE_TTL);
        }
        Ok(restaurant)
    }

    #[tracing::instrument(skip(self, request), fields(restaurant_id = %request.restaurant_id))]
    pub async fn validate(
        &self,
        request: ValidateOrderRequest,
        now: DateTime<Utc>,
    ) -> Result<Verdict, OrderError> {
        if request.items.is_empty() {
            return Err(OrderError::MissingField("items"));
        }
        if request.items.iter().any(|line| line.quantity == 0) {
            return Err(OrderError::InvalidField("quantity"));
        }

        let restaurant = self
            .restaurant(request.restaurant_id)
            .await?
            .ok_or(OrderError::NotFound("Restaurant"))?;

        if !restaurant.is_active {
            return Ok(Verdict::Rejected(Rejection::Inactive));
        }

        let local = now.with_timezone(&self.timezone).naive_local();
        let hours = restaurant
            .hours
            .as_ref()
            .and_then(|hours| OpeningHours::from_json(&hours.0));
        let open = !restaurant.is_closed && hours.as_ref().is_none_or(|h| h.is_open_at(local));
        if !open {
            return Ok(Verdict::Rejected(Rejection::Closed {
                next_opening: hours.and_then(|h| h.next_opening(local)),
            }));
        }

        let lookups = request
            .items
            .iter()
            .map(|line| self.store.find_menu_item(restaurant.id, line.item_id));
        let menu_items = try_join_all(lookups).await?;

        let mut items = Vec::with_capacity(request.items.len());
        let mut subtotal = Decimal::ZERO;
        for (line, menu_item) in request.items.iter().zip(menu_items) {
            let Some(menu_item) = menu_item else {
                return Ok(Verdict::Rejected(Rejection::ItemUnavailable {
                    item_id: line.item_id,
                    name: None,
                }));
            };
            if !menu_item.is_available {
                return Ok(Verdict::Rejected(Rejection::ItemUnavailable {
                    item_id: line.item_id,
                    name: Some(menu_item.name),
                }));
            }
            subtotal += menu_item.price * Decimal::from(line.quantity);
            items.push(ValidatedItem {
                id: menu_item.id,
                name: menu_item.name,
                price: menu_item.price,
                quantity: line.quantity,
            });
        }

        if subtotal < restaurant.min_order {
            return Ok(Verdict::Rejected(Rejection::MinimumOrder {
                minimum: restaurant.min_order,
                subtotal,
            }));
        }

        if !restaurant.delivery_postal_codes.is_empty() {
            let postal_code = request
                .postal_code
                .as_deref()
                .map(str::trim)
                .filter(|pc| !pc.is_empty());
            let covered = postal_code.is_some_and(|pc| {
                restaurant
                    .delivery_postal_codes
                    .iter()
                    .any(|zone| zone.trim() == pc)
            });
            if !covered {
                return Ok(Verdict::Rejected(Rejection::DeliveryZone {
                    postal_code: postal_code.map(str::to_string),
                }));
            }
        }

        let active_orders = match self.store.count_active_orders(restaurant.id).await {
            Ok(count) => count,
            Err(e) => {
                warn!(error = %e, "Could not count active orders; assuming none");
                0
            }
        };
        if active_orders >= MAX_ACTIVE_ORDERS {
            return Ok(Verdict::Rejected(Rejection::Overloaded { active_orders }));
        }

        debug!(%subtotal, active_orders, "Order validated");

        Ok(Verdict::Valid(ValidatedOrder {
            valid: true,
            message: "Commande validée avec succès",
            restaurant: RestaurantSummary {
                id: restaurant.id,
                name: restaurant.name,
            },
            items,
            subtotal,
            estimated_prep_time: BASE_PREP_MINUTES + PREP_MINUTES_PER_ORDER * active_orders,
        }))
    }
}
