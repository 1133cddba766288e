use bon::bon;
use rust_decimal::Decimal;
use uuid::Uuid;

use crate::{
    DatabaseManager,
    error::DbResult,
    types::{Complaint, ComplaintRecord},
};

macro_rules! complaint_columns {
    () => {
        "id, order_id, customer_id, restaurant_id, complaint_type, description, \
         requested_refund, status, trust_score, created_at, updated_at"
    };
}

#[bon]
impl DatabaseManager {
    pub async fn find_complaint_for_order(&self, order_id: Uuid) -> DbResult<Option<Complaint>> {
        let complaint = sqlx::query_as::<_, Complaint>(concat!(
            "SELECT ",
            complaint_columns!(),
            " FROM complaints WHERE order_id = $1"
        ))
        .bind(order_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(complaint)
    }

    pub async fn complaint_record(&self, customer_id: Uuid) -> DbResult<ComplaintRecord> {
        let record = sqlx::query_as::<_, ComplaintRecord>(
            r#"
            SELECT COUNT(*) AS total,
                   COUNT(*) FILTER (WHERE status = 'rejected') AS rejected
            FROM complaints
            WHERE customer_id = $1
            "#,
        )
        .bind(customer_id)
        .fetch_one(&self.pool)
        .await?;

        Ok(record)
    }

    /// Inserts the complaint and its first history entry in one transaction.
    #[builder]
    pub async fn create_complaint(
        &self,
        order_id: Uuid,
        customer_id: Uuid,
        restaurant_id: Uuid,
        complaint_type: String,
        description: String,
        requested_refund: Decimal,
        trust_score: i32,
    ) -> DbResult<Complaint> {
        let mut tx = self.pool.begin().await?;

        let complaint = sqlx::query_as::<_, Complaint>(concat!(
            "INSERT INTO complaints (id, order_id, customer_id, restaurant_id, complaint_type, \
               description, requested_refund, status, trust_score, created_at, updated_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, 'pending', $8, now(), now()) \
             RETURNING ",
            complaint_columns!()
        ))
        .bind(Uuid::now_v7())
        .bind(order_id)
        .bind(customer_id)
        .bind(restaurant_id)
        .bind(&complaint_type)
        .bind(&description)
        .bind(requested_refund)
        .bind(trust_score)
        .fetch_one(&mut *tx)
        .await?;

        sqlx::query(
            r#"
            INSERT INTO complaint_history (id, complaint_id, status, note, created_at)
            VALUES ($1, $2, 'pending', 'Complaint filed by customer', now())
            "#,
        )
        .bind(Uuid::now_v7())
        .bind(complaint.id)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;

        Ok(complaint)
    }

    /// Newest first. `customer_id = None` lists every complaint.
    #[builder]
    pub async fn list_complaints(
        &self,
        customer_id: Option<Uuid>,
        #[builder(default = 100)] limit: i64,
    ) -> DbResult<Vec<Complaint>> {
        let complaints = sqlx::query_as::<_, Complaint>(concat!(
            "SELECT ",
            complaint_columns!(),
            " FROM complaints WHERE ($1::uuid IS NULL OR customer_id = $1) \
              ORDER BY created_at DESC LIMIT $2"
        ))
        .bind(customer_id)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        Ok(complaints)
    }
}
