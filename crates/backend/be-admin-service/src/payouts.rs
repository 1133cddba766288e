use be_remote_db::{DeliveryTransfer, Order, UserRole};
use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::Serialize;
use tracing::{info, warn};
use uuid::Uuid;

use crate::error::AdminError;
use crate::store::{AdminStore, NewTransfer};

#[derive(Debug, Clone)]
pub struct PayoutRequest {
    pub driver_id: Uuid,
    pub amount: Decimal,
    pub transfer_date: NaiveDate,
    pub reference: Option<String>,
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct PayoutOutcome {
    pub success: bool,
    pub transfer: DeliveryTransfer,
    pub orders_marked: usize,
    pub amount_marked: Decimal,
    pub message: String,
}

/// Oldest-first prefix of `orders` whose delivery fees fit in `budget`.
/// Stops at the first order that would exceed it.
pub fn covered_orders(orders: &[Order], budget: Decimal) -> (Vec<Uuid>, Decimal) {
    let mut covered = Vec::new();
    let mut sum = Decimal::ZERO;
    for order in orders {
        if sum + order.delivery_fee > budget {
            break;
        }
        sum += order.delivery_fee;
        covered.push(order.id);
    }
    (covered, sum)
}

/// Records a transfer to a driver, then marks the deliveries it covers as
/// paid. Marking is best-effort: the transfer is the record of truth.
#[tracing::instrument(skip(store, request), fields(driver_id = %request.driver_id))]
pub async fn record_payout(
    store: &dyn AdminStore,
    admin_id: Uuid,
    request: PayoutRequest,
) -> Result<PayoutOutcome, AdminError> {
    if request.amount <= Decimal::ZERO {
        return Err(AdminError::InvalidField("amount"));
    }

    let driver = store
        .find_user(request.driver_id)
        .await?
        .ok_or(AdminError::NotFound("Driver"))?;
    if driver.role != UserRole::Delivery {
        return Err(AdminError::NotADriver);
    }

    let transfer = store
        .create_transfer(NewTransfer {
            driver_id: driver.id,
            amount: request.amount,
            transfer_date: request.transfer_date,
            reference: request.reference,
            notes: request.notes,
            created_by: admin_id,
        })
        .await?;

    let (orders_marked, amount_marked) = match store.unpaid_deliveries(driver.id).await {
        Ok(orders) => {
            let (covered, planned) = covered_orders(&orders, request.amount);
            let mut marked = 0;
            let mut amount = Decimal::ZERO;
            for order_id in covered {
                match store.mark_delivery_paid(order_id).await {
                    Ok(true) => {
                        marked += 1;
                        if let Some(order) = orders.iter().find(|o| o.id == order_id) {
                            amount += order.delivery_fee;
                        }
                    }
                    Ok(false) => {}
                    Err(e) => warn!(%order_id, error = %e, "Failed to mark delivery as paid"),
                }
            }
            if amount != planned {
                warn!(%planned, marked = %amount, "Not every covered delivery could be marked");
            }
            (marked, amount)
        }
        Err(e) => {
            warn!(error = %e, "Failed to load unpaid deliveries; transfer recorded without marking");
            (0, Decimal::ZERO)
        }
    };

    info!(transfer_id = %transfer.id, %admin_id, orders_marked, %amount_marked, "Driver payout recorded");

    Ok(PayoutOutcome {
        success: true,
        message: format!(
            "Paiement enregistré. {orders_marked} commande(s) marquée(s) comme payée(s)."
        ),
        transfer,
        orders_marked,
        amount_marked,
    })
}
