use std::collections::HashMap;

use async_trait::async_trait;
use be_remote_db::{
    DbError, DbResult, DiscountType, PromoCode, PromoUsage, PromoValidation, WheelPrize,
};
use chrono::{DateTime, Duration, Utc};
use parking_lot::Mutex;
use rust_decimal::Decimal;
use uuid::Uuid;

use crate::store::{GeneralValidation, NewPromoRule, NewWheelPrize, PromoStore};

pub const OWNER: Uuid = Uuid::from_u128(0x100);
pub const OTHER_USER: Uuid = Uuid::from_u128(0x200);

/// A general promo with code `WELCOME3`.
pub fn promo(discount_type: DiscountType, value: Decimal) -> PromoCode {
    PromoCode {
        id: Uuid::nil(),
        code: "WELCOME3".to_string(),
        description: None,
        discount_type,
        value,
        max_discount_amount: None,
        min_order_amount: Decimal::ZERO,
        valid_from: Utc::now() - Duration::days(1),
        valid_until: None,
        max_uses: None,
        max_uses_per_user: None,
        used_count: 0,
        first_order_only: false,
        restaurant_id: None,
        is_active: true,
        created_at: Utc::now(),
    }
}

pub fn prize(
    code: &str,
    user_id: Option<Uuid>,
    promo_code_id: Option<Uuid>,
    now: DateTime<Utc>,
) -> WheelPrize {
    WheelPrize {
        id: Uuid::nil(),
        user_id,
        code: code.to_string(),
        prize_type: "discount".to_string(),
        promo_code_id,
        description: None,
        valid_until: now + Duration::days(7),
        used_at: None,
        used_in_order_id: None,
        created_at: now,
    }
}

#[derive(Default)]
struct State {
    next_id: u128,
    promos: Vec<PromoCode>,
    prizes: Vec<WheelPrize>,
    orders: HashMap<Uuid, Uuid>,
    usages: Vec<PromoUsage>,
    increments: Vec<Uuid>,
    general_calls: Vec<GeneralValidation>,
    general_result: Option<(bool, Decimal)>,
    lose_stamp_race: bool,
    fail_usage_inserts: bool,
    collide_all_codes: bool,
    created_rules: Vec<NewPromoRule>,
    created_prizes: Vec<NewWheelPrize>,
}

impl State {
    fn id(&mut self) -> Uuid {
        self.next_id += 1;
        Uuid::from_u128(0x1000 + self.next_id)
    }
}

fn insert_usage(
    state: &mut State,
    promo_code_id: Option<Uuid>,
    wheel_prize_id: Option<Uuid>,
    user_id: Uuid,
    order_id: Uuid,
    discount_amount: Decimal,
) -> DbResult<PromoUsage> {
    if state.fail_usage_inserts {
        return Err(DbError::Connection("connection reset".to_string()));
    }
    let duplicate = state.usages.iter().any(|u| {
        u.order_id == order_id
            && ((promo_code_id.is_some() && u.promo_code_id == promo_code_id)
                || (wheel_prize_id.is_some() && u.wheel_prize_id == wheel_prize_id))
    });
    if duplicate {
        return Err(DbError::duplicate("constraint", "promo_usages_order_promo_key"));
    }
    let usage = PromoUsage {
        id: state.id(),
        promo_code_id,
        wheel_prize_id,
        user_id,
        order_id,
        discount_amount,
        created_at: Utc::now(),
    };
    state.usages.push(usage.clone());
    Ok(usage)
}

#[derive(Default)]
pub struct FakePromoStore {
    state: Mutex<State>,
}

impl FakePromoStore {
    pub fn add_promo(&self, mut promo: PromoCode) -> Uuid {
        let mut state = self.state.lock();
        promo.id = state.id();
        let id = promo.id;
        state.promos.push(promo);
        id
    }

    pub fn add_prize(&self, mut prize: WheelPrize) -> Uuid {
        let mut state = self.state.lock();
        prize.id = state.id();
        let id = prize.id;
        state.prizes.push(prize);
        id
    }

    pub fn add_order(&self, order_id: Uuid, customer_id: Uuid) {
        self.state.lock().orders.insert(order_id, customer_id);
    }

    pub fn set_general_result(&self, valid: bool, discount: Decimal) {
        self.state.lock().general_result = Some((valid, discount));
    }

    pub fn lose_stamp_race(&self) {
        self.state.lock().lose_stamp_race = true;
    }

    /// Usage inserts fail as if the database rejected the row.
    pub fn fail_usage_inserts(&self, fail: bool) {
        self.state.lock().fail_usage_inserts = fail;
    }

    pub fn prize_by_id(&self, id: Uuid) -> Option<WheelPrize> {
        self.state.lock().prizes.iter().find(|p| p.id == id).cloned()
    }

    pub fn collide_all_codes(&self) {
        self.state.lock().collide_all_codes = true;
    }

    pub fn usages(&self) -> Vec<PromoUsage> {
        self.state.lock().usages.clone()
    }

    pub fn increments(&self) -> Vec<Uuid> {
        self.state.lock().increments.clone()
    }

    pub fn general_calls(&self) -> Vec<GeneralValidation> {
        self.state.lock().general_calls.clone()
    }

    pub fn created_rules(&self) -> Vec<NewPromoRule> {
        self.state.lock().created_rules.clone()
    }

    pub fn created_prizes(&self) -> Vec<NewWheelPrize> {
        self.state.lock().created_prizes.clone()
    }
}

#[async_trait]
impl PromoStore for FakePromoStore {
    async fn user_exists(&self, user_id: Uuid) -> DbResult<bool> {
        Ok(user_id == OWNER || user_id == OTHER_USER)
    }

    async fn wheel_prize(&self, code: &str) -> DbResult<Option<WheelPrize>> {
        Ok(self
            .state
            .lock()
            .prizes
            .iter()
            .find(|p| p.code == code)
            .cloned())
    }

    async fn promo_by_id(&self, promo_code_id: Uuid) -> DbResult<Option<PromoCode>> {
        Ok(self
            .state
            .lock()
            .promos
            .iter()
            .find(|p| p.id == promo_code_id)
            .cloned())
    }

    async fn promo_by_code(&self, code: &str) -> DbResult<Option<PromoCode>> {
        Ok(self
            .state
            .lock()
            .promos
            .iter()
            .find(|p| p.code == code)
            .cloned())
    }

    async fn validate_general(&self, request: &GeneralValidation) -> DbResult<PromoValidation> {
        let mut state = self.state.lock();
        state.general_calls.push(request.clone());
        let (valid, discount) = state.general_result.unwrap_or((false, Decimal::ZERO));
        Ok(PromoValidation {
            valid,
            discount_amount: discount,
            discount_type: valid.then_some(DiscountType::Fixed),
            message: if valid { "OK" } else { "Invalid promo code" }.to_string(),
            promo_code_id: valid.then(|| Uuid::from_u128(0xabc)),
        })
    }

    async fn order_customer(&self, order_id: Uuid) -> DbResult<Option<Uuid>> {
        Ok(self.state.lock().orders.get(&order_id).copied())
    }

    async fn record_usage(
        &self,
        promo_code_id: Option<Uuid>,
        wheel_prize_id: Option<Uuid>,
        user_id: Uuid,
        order_id: Uuid,
        discount_amount: Decimal,
    ) -> DbResult<PromoUsage> {
        let mut state = self.state.lock();
        insert_usage(
            &mut state,
            promo_code_id,
            wheel_prize_id,
            user_id,
            order_id,
            discount_amount,
        )
    }

    async fn increment_usage(&self, promo_code_id: Uuid) -> DbResult<()> {
        self.state.lock().increments.push(promo_code_id);
        Ok(())
    }

    async fn redeem_prize(
        &self,
        wheel_prize_id: Uuid,
        promo_code_id: Option<Uuid>,
        user_id: Uuid,
        order_id: Uuid,
        discount_amount: Decimal,
    ) -> DbResult<Option<PromoUsage>> {
        let mut state = self.state.lock();
        let unused = state
            .prizes
            .iter()
            .any(|p| p.id == wheel_prize_id && p.used_at.is_none());
        if state.lose_stamp_race || !unused {
            return Ok(None);
        }
        let usage = insert_usage(
            &mut state,
            promo_code_id,
            Some(wheel_prize_id),
            user_id,
            order_id,
            discount_amount,
        )?;
        if let Some(prize) = state.prizes.iter_mut().find(|p| p.id == wheel_prize_id) {
            prize.used_at = Some(Utc::now());
            prize.used_in_order_id = Some(order_id);
        }
        Ok(Some(usage))
    }

    async fn code_exists(&self, code: &str) -> DbResult<bool> {
        let state = self.state.lock();
        Ok(state.collide_all_codes
            || state.prizes.iter().any(|p| p.code == code)
            || state.promos.iter().any(|p| p.code == code))
    }

    async fn create_promo(&self, rule: NewPromoRule) -> DbResult<PromoCode> {
        let mut state = self.state.lock();
        state.created_rules.push(rule.clone());
        let mut created = promo(rule.discount_type, rule.value);
        created.id = state.id();
        created.code = rule.code;
        created.min_order_amount = rule.min_order_amount;
        created.valid_until = Some(rule.valid_until);
        created.max_uses = Some(1);
        created.max_uses_per_user = Some(1);
        state.promos.push(created.clone());
        Ok(created)
    }

    async fn create_prize(&self, new: NewWheelPrize) -> DbResult<WheelPrize> {
        let mut state = self.state.lock();
        state.created_prizes.push(new.clone());
        let created = WheelPrize {
            id: state.id(),
            user_id: Some(new.user_id),
            code: new.code,
            prize_type: new.prize_type,
            promo_code_id: new.promo_code_id,
            description: Some(new.description),
            valid_until: new.valid_until,
            used_at: None,
            used_in_order_id: None,
            created_at: Utc::now(),
        };
        state.prizes.push(created.clone());
        Ok(created)
    }
}
