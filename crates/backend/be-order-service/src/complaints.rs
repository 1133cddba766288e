//! Customer complaints about delivered orders.

use std::sync::Arc;

use be_email_service::EmailTemplate;
use be_notification_service::{EmailPayload, NotificationPayload, Outbox, SideEffect};
use be_remote_db::{Complaint, ComplaintRecord, DbError, OrderStatus};
use chrono::{DateTime, Duration, Utc};
use rust_decimal::Decimal;
use serde::Serialize;
use serde_json::json;
use tracing::{info, warn};
use uuid::Uuid;

use crate::error::OrderError;
use crate::store::{NewComplaint, OrderStore};

pub const MIN_DESCRIPTION_CHARS: usize = 10;
pub const LIST_LIMIT: i64 = 100;
const BASE_TRUST_SCORE: i32 = 50;
const FREQUENT_COMPLAINER_THRESHOLD: i64 = 5;
const FREQUENT_COMPLAINER_PENALTY: i32 = 20;
const REJECTED_COMPLAINT_PENALTY: i32 = 10;

fn earliest_filing() -> Duration {
    Duration::hours(1)
}

fn latest_filing() -> Duration {
    Duration::hours(48)
}

#[derive(Debug, Clone, PartialEq)]
pub struct ComplaintRequest {
    pub order_id: Uuid,
    pub complaint_type: String,
    pub description: String,
    pub requested_refund: Option<Decimal>,
}

#[derive(Debug, Clone, Serialize)]
pub struct FiledComplaint {
    pub success: bool,
    pub message: &'static str,
    pub complaint: Complaint,
}

/// Starts at 50, loses 20 for more than five past complaints and 10 per
/// rejected one. Never negative.
pub fn trust_score(record: ComplaintRecord) -> i32 {
    let mut score = BASE_TRUST_SCORE;
    if record.total > FREQUENT_COMPLAINER_THRESHOLD {
        score -= FREQUENT_COMPLAINER_PENALTY;
    }
    let rejected = i32::try_from(record.rejected).unwrap_or(i32::MAX);
    score = score.saturating_sub(rejected.saturating_mul(REJECTED_COMPLAINT_PENALTY));
    score.max(0)
}

#[derive(Clone)]
pub struct ComplaintDesk {
    store: Arc<dyn OrderStore>,
    outbox: Outbox,
}

impl ComplaintDesk {
    pub fn new(store: Arc<dyn OrderStore>, outbox: Outbox) -> Self {
        Self { store, outbox }
    }

    #[tracing::instrument(skip(self, request), fields(order_id = %request.order_id))]
    pub async fn file(
        &self,
        customer_id: Uuid,
        request: ComplaintRequest,
        now: DateTime<Utc>,
    ) -> Result<FiledComplaint, OrderError> {
        let complaint_type = request.complaint_type.trim().to_string();
        if complaint_type.is_empty() {
            return Err(OrderError::MissingField("complaintType"));
        }
        let description = request.description.trim().to_string();
        if description.chars().count() < MIN_DESCRIPTION_CHARS {
            return Err(OrderError::InvalidField("description"));
        }
        if request
            .requested_refund
            .is_some_and(|amount| amount < Decimal::ZERO)
        {
            return Err(OrderError::InvalidField("requestedRefundAmount"));
        }

        let customer = self.store.find_user(customer_id).await?;
        if customer.as_ref().is_some_and(|c| c.is_flagged) {
            return Err(OrderError::AccountFlagged);
        }

        let order = self
            .store
            .find_order(request.order_id)
            .await?
            .filter(|order| order.customer_id == customer_id)
            .ok_or(OrderError::NotFound("Order"))?;
        if order.status != OrderStatus::Delivered {
            return Err(OrderError::OrderNotDelivered);
        }

        let since_delivery = now - order.updated_at;
        if since_delivery < earliest_filing() {
            return Err(OrderError::ComplaintTooEarly);
        }
        if since_delivery > latest_filing() {
            return Err(OrderError::ComplaintWindowExpired);
        }

        if self
            .store
            .find_complaint_for_order(order.id)
            .await?
            .is_some()
        {
            return Err(OrderError::DuplicateComplaint);
        }

        let record = self.store.complaint_record(customer_id).await?;
        let requested_refund = request
            .requested_refund
            .unwrap_or(Decimal::ZERO)
            .min(order.total)
            .round_dp(2);

        let complaint = self
            .store
            .create_complaint(NewComplaint {
                order_id: order.id,
                customer_id,
                restaurant_id: order.restaurant_id,
                complaint_type: complaint_type.clone(),
                description,
                requested_refund,
                trust_score: trust_score(record),
            })
            .await
            .map_err(|e| match e {
                // Lost a race with a concurrent filing for the same order.
                DbError::Duplicate { .. } => OrderError::DuplicateComplaint,
                other => OrderError::Database(other),
            })?;

        info!(
            complaint_id = %complaint.id,
            %customer_id,
            trust_score = complaint.trust_score,
            "Complaint filed"
        );

        let mut effects = vec![SideEffect::Notification(NotificationPayload {
            user_id: None,
            restaurant_id: Some(order.restaurant_id),
            kind: "new_complaint".to_string(),
            title: "Nouvelle réclamation".to_string(),
            message: format!(
                "Une réclamation ({complaint_type}) a été déposée pour la commande #{}.",
                order.id.to_string()[..8].to_uppercase()
            ),
            data: json!({
                "complaint_id": complaint.id,
                "order_id": order.id,
                "requested_refund": requested_refund,
            }),
        })];
        match customer {
            Some(customer) => effects.push(SideEffect::Email(EmailPayload {
                to: customer.email,
                to_name: customer.full_name.clone(),
                content: EmailTemplate::ComplaintReceived {
                    complaint_id: complaint.id.to_string(),
                    order_id: order.id.to_string(),
                    customer_name: customer.full_name,
                    complaint_type,
                },
            })),
            None => warn!(%customer_id, "Customer row missing; skipping complaint email"),
        }
        self.outbox.enqueue_all_or_log(effects).await;

        Ok(FiledComplaint {
            success: true,
            message: "Réclamation créée avec succès",
            complaint,
        })
    }

    /// Admins see every complaint, everyone else only their own.
    pub async fn list(
        &self,
        caller: Uuid,
        is_admin: bool,
        limit: Option<i64>,
    ) -> Result<Vec<Complaint>, OrderError> {
        let limit = limit.unwrap_or(LIST_LIMIT).clamp(1, LIST_LIMIT);
        let customer_id = (!is_admin).then_some(caller);
        Ok(self.store.list_complaints(customer_id, limit).await?)
    }
}
