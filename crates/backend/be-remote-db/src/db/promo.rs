use bon::bon;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use uuid::Uuid;

use crate::{
    DatabaseManager,
    error::DbResult,
    types::{DiscountType, PromoCode, PromoUsage, PromoValidation, WheelPrize},
};

macro_rules! promo_columns {
    () => {
        "id, code, description, discount_type, value, max_discount_amount, min_order_amount, \
         valid_from, valid_until, max_uses, max_uses_per_user, used_count, first_order_only, \
         restaurant_id, is_active, created_at"
    };
}

macro_rules! wheel_prize_columns {
    () => {
        "id, user_id, code, prize_type, promo_code_id, description, valid_until, used_at, \
         used_in_order_id, created_at"
    };
}

#[bon]
impl DatabaseManager {
    pub async fn find_promo_code(&self, promo_code_id: Uuid) -> DbResult<Option<PromoCode>> {
        let promo = sqlx::query_as::<_, PromoCode>(concat!(
            "SELECT ",
            promo_columns!(),
            " FROM promo_codes WHERE id = $1"
        ))
        .bind(promo_code_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(promo)
    }

    pub async fn find_promo_code_by_code(&self, code: &str) -> DbResult<Option<PromoCode>> {
        let promo = sqlx::query_as::<_, PromoCode>(concat!(
            "SELECT ",
            promo_columns!(),
            " FROM promo_codes WHERE code = $1"
        ))
        .bind(code)
        .fetch_optional(&self.pool)
        .await?;

        Ok(promo)
    }

    pub async fn find_wheel_prize_by_code(&self, code: &str) -> DbResult<Option<WheelPrize>> {
        let prize = sqlx::query_as::<_, WheelPrize>(concat!(
            "SELECT ",
            wheel_prize_columns!(),
            " FROM wheel_prizes WHERE code = $1"
        ))
        .bind(code)
        .fetch_optional(&self.pool)
        .await?;

        Ok(prize)
    }

    pub async fn wheel_code_exists(&self, code: &str) -> DbResult<bool> {
        let exists = sqlx::query_scalar::<_, bool>(
            r#"
            SELECT EXISTS (SELECT 1 FROM wheel_prizes WHERE code = $1)
                OR EXISTS (SELECT 1 FROM promo_codes WHERE code = $1)
            "#,
        )
        .bind(code)
        .fetch_one(&self.pool)
        .await?;

        Ok(exists)
    }

    /// Atomic rule check for general promo codes, executed by the
    /// `validate_promo_code` SQL function.
    #[builder]
    pub async fn validate_promo_code(
        &self,
        code: &str,
        user_id: Option<Uuid>,
        order_amount: Decimal,
        restaurant_id: Option<Uuid>,
        is_first_order: bool,
    ) -> DbResult<PromoValidation> {
        let validation = sqlx::query_as::<_, PromoValidation>(
            r#"
            SELECT valid, discount_amount, discount_type, message, promo_code_id
            FROM validate_promo_code($1, $2, $3, $4, $5)
            "#,
        )
        .bind(code)
        .bind(user_id)
        .bind(order_amount)
        .bind(restaurant_id)
        .bind(is_first_order)
        .fetch_one(&self.pool)
        .await?;

        Ok(validation)
    }

    /// Appends a usage row. A second usage of the same promo on the same
    /// order violates `promo_usages_order_promo_key` and surfaces as
    /// [`crate::DbError::Duplicate`].
    #[builder]
    pub async fn record_promo_usage(
        &self,
        promo_code_id: Option<Uuid>,
        wheel_prize_id: Option<Uuid>,
        user_id: Uuid,
        order_id: Uuid,
        discount_amount: Decimal,
    ) -> DbResult<PromoUsage> {
        let usage = sqlx::query_as::<_, PromoUsage>(
            r#"
            INSERT INTO promo_usages (id, promo_code_id, wheel_prize_id, user_id, order_id, discount_amount, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, now())
            RETURNING id, promo_code_id, wheel_prize_id, user_id, order_id, discount_amount, created_at
            "#,
        )
        .bind(Uuid::now_v7())
        .bind(promo_code_id)
        .bind(wheel_prize_id)
        .bind(user_id)
        .bind(order_id)
        .bind(discount_amount)
        .fetch_one(&self.pool)
        .await?;

        Ok(usage)
    }

    pub async fn increment_promo_usage(&self, promo_code_id: Uuid) -> DbResult<()> {
        sqlx::query(
            r#"
            UPDATE promo_codes SET used_count = used_count + 1 WHERE id = $1
            "#,
        )
        .bind(promo_code_id)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Stamps a wheel prize as consumed and records its usage in one
    /// transaction. Returns `None` when another order already consumed it;
    /// a failed insert rolls the stamp back.
    #[builder]
    pub async fn redeem_wheel_prize(
        &self,
        wheel_prize_id: Uuid,
        promo_code_id: Option<Uuid>,
        user_id: Uuid,
        order_id: Uuid,
        discount_amount: Decimal,
    ) -> DbResult<Option<PromoUsage>> {
        let mut tx = self.pool.begin().await?;

        let stamped = sqlx::query(
            r#"
            UPDATE wheel_prizes
            SET used_at = now(), used_in_order_id = $2
            WHERE id = $1 AND used_at IS NULL
            "#,
        )
        .bind(wheel_prize_id)
        .bind(order_id)
        .execute(&mut *tx)
        .await?;

        if stamped.rows_affected() != 1 {
            tx.rollback().await?;
            return Ok(None);
        }

        let usage = sqlx::query_as::<_, PromoUsage>(
            r#"
            INSERT INTO promo_usages (id, promo_code_id, wheel_prize_id, user_id, order_id, discount_amount, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, now())
            RETURNING id, promo_code_id, wheel_prize_id, user_id, order_id, discount_amount, created_at
            "#,
        )
        .bind(Uuid::now_v7())
        .bind(promo_code_id)
        .bind(wheel_prize_id)
        .bind(user_id)
        .bind(order_id)
        .bind(discount_amount)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;

        Ok(Some(usage))
    }

    #[builder]
    pub async fn create_promo_code(
        &self,
        code: String,
        description: Option<String>,
        discount_type: DiscountType,
        value: Decimal,
        max_discount_amount: Option<Decimal>,
        #[builder(default)] min_order_amount: Decimal,
        valid_until: Option<DateTime<Utc>>,
        max_uses: Option<i32>,
        max_uses_per_user: Option<i32>,
        #[builder(default)] first_order_only: bool,
        restaurant_id: Option<Uuid>,
    ) -> DbResult<PromoCode> {
        let promo = sqlx::query_as::<_, PromoCode>(concat!(
            "INSERT INTO promo_codes (id, code, description, discount_type, value, \
               max_discount_amount, min_order_amount, valid_from, valid_until, max_uses, \
               max_uses_per_user, used_count, first_order_only, restaurant_id, is_active, created_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, now(), $8, $9, $10, 0, $11, $12, true, now()) \
             RETURNING ",
            promo_columns!()
        ))
        .bind(Uuid::now_v7())
        .bind(&code)
        .bind(&description)
        .bind(discount_type)
        .bind(value)
        .bind(max_discount_amount)
        .bind(min_order_amount)
        .bind(valid_until)
        .bind(max_uses)
        .bind(max_uses_per_user)
        .bind(first_order_only)
        .bind(restaurant_id)
        .fetch_one(&self.pool)
        .await?;

        Ok(promo)
    }

    #[builder]
    pub async fn create_wheel_prize(
        &self,
        user_id: Uuid,
        code: String,
        prize_type: String,
        promo_code_id: Option<Uuid>,
        description: Option<String>,
        valid_until: DateTime<Utc>,
    ) -> DbResult<WheelPrize> {
        let prize = sqlx::query_as::<_, WheelPrize>(concat!(
            "INSERT INTO wheel_prizes (id, user_id, code, prize_type, promo_code_id, \
               description, valid_until, created_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, now()) \
             RETURNING ",
            wheel_prize_columns!()
        ))
        .bind(Uuid::now_v7())
        .bind(user_id)
        .bind(&code)
        .bind(&prize_type)
        .bind(promo_code_id)
        .bind(&description)
        .bind(valid_until)
        .fetch_one(&self.pool)
        .await?;

        Ok(prize)
    }
}
