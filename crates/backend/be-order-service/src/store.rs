use async_trait::async_trait;
use be_remote_db::{
    Complaint, ComplaintRecord, DatabaseManager, DbError, DbResult, MenuItem, Order, Restaurant,
    User,
};
use rust_decimal::Decimal;
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq)]
pub struct NewComplaint {
    pub order_id: Uuid,
    pub customer_id: Uuid,
    pub restaurant_id: Uuid,
    pub complaint_type: String,
    pub description: String,
    pub requested_refund: Decimal,
    pub trust_score: i32,
}

#[async_trait]
pub trait OrderStore: Send + Sync {
    async fn find_restaurant(&self, restaurant_id: Uuid) -> DbResult<Option<Restaurant>>;

    async fn find_menu_item(&self, restaurant_id: Uuid, item_id: Uuid)
    -> DbResult<Option<MenuItem>>;

    /// Orders in `pending`, `accepted`, `preparing` or `ready`.
    async fn count_active_orders(&self, restaurant_id: Uuid) -> DbResult<i64>;

    async fn find_order(&self, order_id: Uuid) -> DbResult<Option<Order>>;

    async fn find_user(&self, user_id: Uuid) -> DbResult<Option<User>>;

    async fn complaint_record(&self, customer_id: Uuid) -> DbResult<ComplaintRecord>;

    async fn find_complaint_for_order(&self, order_id: Uuid) -> DbResult<Option<Complaint>>;

    async fn create_complaint(&self, complaint: NewComplaint) -> DbResult<Complaint>;

    /// Newest first; `None` lists every customer's complaints.
    async fn list_complaints(&self, customer_id: Option<Uuid>, limit: i64)
    -> DbResult<Vec<Complaint>>;
}

#[async_trait]
impl OrderStore for DatabaseManager {
    async fn find_restaurant(&self, restaurant_id: Uuid) -> DbResult<Option<Restaurant>> {
        DatabaseManager::find_restaurant(self, restaurant_id).await
    }

    async fn find_menu_item(
        &self,
        restaurant_id: Uuid,
        item_id: Uuid,
    ) -> DbResult<Option<MenuItem>> {
        DatabaseManager::find_menu_item(self)
            .restaurant_id(restaurant_id)
            .menu_item_id(item_id)
            .call()
            .await
    }

    async fn count_active_orders(&self, restaurant_id: Uuid) -> DbResult<i64> {
        DatabaseManager::count_active_orders(self, restaurant_id).await
    }

    async fn find_order(&self, order_id: Uuid) -> DbResult<Option<Order>> {
        DatabaseManager::find_order(self, order_id).await
    }

    async fn find_user(&self, user_id: Uuid) -> DbResult<Option<User>> {
        match self.get_user().id(user_id).call().await {
            Ok(user) => Ok(Some(user)),
            Err(DbError::NotFound { .. }) => Ok(None),
            Err(e) => Err(e),
        }
    }

    async fn complaint_record(&self, customer_id: Uuid) -> DbResult<ComplaintRecord> {
        DatabaseManager::complaint_record(self, customer_id).await
    }

    async fn find_complaint_for_order(&self, order_id: Uuid) -> DbResult<Option<Complaint>> {
        DatabaseManager::find_complaint_for_order(self, order_id).await
    }

    async fn create_complaint(&self, complaint: NewComplaint) -> DbResult<Complaint> {
        DatabaseManager::create_complaint(self)
            .order_id(complaint.order_id)
            .customer_id(complaint.customer_id)
            .restaurant_id(complaint.restaurant_id)
            .complaint_type(complaint.complaint_type)
            .description(complaint.description)
            .requested_refund(complaint.requested_refund)
            .trust_score(complaint.trust_score)
            .call()
            .await
    }

    async fn list_complaints(
        &self,
        customer_id: Option<Uuid>,
        limit: i64,
    ) -> DbResult<Vec<Complaint>> {
        DatabaseManager::list_complaints(self)
            .maybe_customer_id(customer_id)
            .limit(limit)
            .call()
            .await
    }
}
