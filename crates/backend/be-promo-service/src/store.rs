use async_trait::async_trait;
use be_remote_db::{
    DatabaseManager, DbResult, DiscountType, PromoCode, PromoUsage, PromoValidation, WheelPrize,
};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use uuid::Uuid;

/// Fields of a promo rule created for a wheel prize.
#[derive(Debug, Clone, PartialEq)]
pub struct NewPromoRule {
    pub code: String,
    pub description: String,
    pub discount_type: DiscountType,
    pub value: Decimal,
    pub min_order_amount: Decimal,
    pub valid_until: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct NewWheelPrize {
    pub user_id: Uuid,
    pub code: String,
    pub prize_type: String,
    pub promo_code_id: Option<Uuid>,
    pub description: String,
    pub valid_until: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct GeneralValidation {
    pub code: String,
    pub user_id: Option<Uuid>,
    pub order_amount: Decimal,
    pub restaurant_id: Option<Uuid>,
    pub is_first_order: bool,
}

#[async_trait]
pub trait PromoStore: Send + Sync {
    async fn user_exists(&self, user_id: Uuid) -> DbResult<bool>;

    async fn wheel_prize(&self, code: &str) -> DbResult<Option<WheelPrize>>;

    async fn promo_by_id(&self, promo_code_id: Uuid) -> DbResult<Option<PromoCode>>;

    async fn promo_by_code(&self, code: &str) -> DbResult<Option<PromoCode>>;

    /// Rule check for codes outside the wheel namespace, done atomically by
    /// the database.
    async fn validate_general(&self, request: &GeneralValidation) -> DbResult<PromoValidation>;

    async fn order_customer(&self, order_id: Uuid) -> DbResult<Option<Uuid>>;

    async fn record_usage(
        &self,
        promo_code_id: Option<Uuid>,
        wheel_prize_id: Option<Uuid>,
        user_id: Uuid,
        order_id: Uuid,
        discount_amount: Decimal,
    ) -> DbResult<PromoUsage>;

    async fn increment_usage(&self, promo_code_id: Uuid) -> DbResult<()>;

    /// Consumes a wheel prize and records its usage atomically. `None` when
    /// the prize was already consumed; on any error the prize stays unused.
    async fn redeem_prize(
        &self,
        wheel_prize_id: Uuid,
        promo_code_id: Option<Uuid>,
        user_id: Uuid,
        order_id: Uuid,
        discount_amount: Decimal,
    ) -> DbResult<Option<PromoUsage>>;

    async fn code_exists(&self, code: &str) -> DbResult<bool>;

    async fn create_promo(&self, rule: NewPromoRule) -> DbResult<PromoCode>;

    async fn create_prize(&self, prize: NewWheelPrize) -> DbResult<WheelPrize>;
}

#[async_trait]
impl PromoStore for DatabaseManager {
    async fn user_exists(&self, user_id: Uuid) -> DbResult<bool> {
        Ok(self.get_user_role(user_id).await?.is_some())
    }

    async fn wheel_prize(&self, code: &str) -> DbResult<Option<WheelPrize>> {
        self.find_wheel_prize_by_code(code).await
    }

    async fn promo_by_id(&self, promo_code_id: Uuid) -> DbResult<Option<PromoCode>> {
        self.find_promo_code(promo_code_id).await
    }

    async fn promo_by_code(&self, code: &str) -> DbResult<Option<PromoCode>> {
        self.find_promo_code_by_code(code).await
    }

    async fn validate_general(&self, request: &GeneralValidation) -> DbResult<PromoValidation> {
        self.validate_promo_code()
            .code(&request.code)
            .maybe_user_id(request.user_id)
            .order_amount(request.order_amount)
            .maybe_restaurant_id(request.restaurant_id)
            .is_first_order(request.is_first_order)
            .call()
            .await
    }

    async fn order_customer(&self, order_id: Uuid) -> DbResult<Option<Uuid>> {
        Ok(self.find_order(order_id).await?.map(|o| o.customer_id))
    }

    async fn record_usage(
        &self,
        promo_code_id: Option<Uuid>,
        wheel_prize_id: Option<Uuid>,
        user_id: Uuid,
        order_id: Uuid,
        discount_amount: Decimal,
    ) -> DbResult<PromoUsage> {
        self.record_promo_usage()
            .maybe_promo_code_id(promo_code_id)
            .maybe_wheel_prize_id(wheel_prize_id)
            .user_id(user_id)
            .order_id(order_id)
            .discount_amount(discount_amount)
            .call()
            .await
    }

    async fn increment_usage(&self, promo_code_id: Uuid) -> DbResult<()> {
        self.increment_promo_usage(promo_code_id).await
    }

    async fn redeem_prize(
        &self,
        wheel_prize_id: Uuid,
        promo_code_id: Option<Uuid>,
        user_id: Uuid,
        order_id: Uuid,
        discount_amount: Decimal,
    ) -> DbResult<Option<PromoUsage>> {
        self.redeem_wheel_prize()
            .wheel_prize_id(wheel_prize_id)
            .maybe_promo_code_id(promo_code_id)
            .user_id(user_id)
            .order_id(order_id)
            .discount_amount(discount_amount)
            .call()
            .await
    }

    async fn code_exists(&self, code: &str) -> DbResult<bool> {
        self.wheel_code_exists(code).await
    }

    async fn create_promo(&self, rule: NewPromoRule) -> DbResult<PromoCode> {
        self.create_promo_code()
            .code(rule.code)
            .description(rule.description)
            .discount_type(rule.discount_type)
            .value(rule.value)
            .min_order_amount(rule.min_order_amount)
            .valid_until(rule.valid_until)
            .max_uses(1)
            .max_uses_per_user(1)
            .call()
            .await
    }

    async fn create_prize(&self, prize: NewWheelPrize) -> DbResult<WheelPrize> {
        self.create_wheel_prize()
            .user_id(prize.user_id)
            .code(prize.code)
            .prize_type(prize.prize_type)
            .maybe_promo_code_id(prize.promo_code_id)
            .description(prize.description)
            .valid_until(prize.valid_until)
            .call()
            .await
    }
}
