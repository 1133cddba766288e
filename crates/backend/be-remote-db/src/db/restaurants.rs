use bon::bon;
use uuid::Uuid;

use crate::{
    DatabaseManager,
    error::DbResult,
    types::{MenuItem, Restaurant},
};

#[bon]
impl DatabaseManager {
    pub async fn find_restaurant(&self, restaurant_id: Uuid) -> DbResult<Option<Restaurant>> {
        let restaurant = sqlx::query_as::<_, Restaurant>(
            r#"
            SELECT id, owner_id, name, is_active, is_closed, hours, min_order,
                   delivery_postal_codes, created_at, updated_at
            FROM restaurants
            WHERE id = $1
            "#,
        )
        .bind(restaurant_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(restaurant)
    }

    #[builder]
    pub async fn find_menu_item(
        &self,
        restaurant_id: Uuid,
        menu_item_id: Uuid,
    ) -> DbResult<Option<MenuItem>> {
        let item = sqlx::query_as::<_, MenuItem>(
            r#"
            SELECT id, restaurant_id, name, price, is_available
            FROM menu_items
            WHERE id = $1 AND restaurant_id = $2
            "#,
        )
        .bind(menu_item_id)
        .bind(restaurant_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(item)
    }
}
