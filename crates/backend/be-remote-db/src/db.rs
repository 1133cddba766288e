use bon::bon;
use sqlx::{
    migrate::MigrateDatabase,
    postgres::{PgPool, PgPoolOptions},
};
use std::time::Duration;
use uuid::Uuid;

use crate::{
    error::{DbError, DbResult},
    types::{ResettableTable, User, UserRole},
};

mod complaints;
mod orders;
mod outbox;
mod payments;
mod promo;
mod restaurants;

#[derive(Debug)]
pub struct DatabaseManager {
    pub pool: PgPool,
}

#[bon]
impl DatabaseManager {
    pub async fn new(database_url: &str) -> DbResult<Self> {
        if !sqlx::Postgres::database_exists(database_url).await? {
            sqlx::Postgres::create_database(database_url).await?;
        }

        let pool = PgPoolOptions::new()
            .max_connections(50)
            .min_connections(3)
            .acquire_timeout(Duration::from_secs(10))
            .connect(database_url)
            .await?;

        let db_manager = DatabaseManager { pool };

        Self::run_migrations(&db_manager.pool).await?;

        Ok(db_manager)
    }

    async fn run_migrations(pool: &PgPool) -> DbResult<()> {
        let migrator = sqlx::migrate!("./src/migrations");
        migrator.run(pool).await?;
        tracing::debug!("Database migrations applied");
        Ok(())
    }

    #[builder]
    pub async fn get_user(&self, id: Uuid) -> DbResult<User> {
        let user = sqlx::query_as::<_, User>(
            r#"
            SELECT id, email, full_name, role, is_flagged, created_at, updated_at
            FROM users
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| DbError::not_found_with_id("user", id.to_string()))?;

        Ok(user)
    }

    pub async fn get_user_role(&self, id: Uuid) -> DbResult<Option<UserRole>> {
        let role = sqlx::query_scalar::<_, UserRole>(
            r#"
            SELECT role FROM users WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(role)
    }

    /// Global maintenance flag. A missing row means the platform is open.
    pub async fn is_maintenance_mode(&self) -> DbResult<bool> {
        let value = sqlx::query_scalar::<_, sqlx::types::Json<serde_json::Value>>(
            r#"
            SELECT value FROM platform_settings WHERE key = 'maintenance_mode'
            "#,
        )
        .fetch_optional(&self.pool)
        .await?;

        Ok(value
            .map(|v| match v.0 {
                serde_json::Value::Bool(b) => b,
                serde_json::Value::Object(map) => map
                    .get("enabled")
                    .and_then(|e| e.as_bool())
                    .unwrap_or(false),
                _ => false,
            })
            .unwrap_or(false))
    }

    pub async fn count_rows(&self, table: ResettableTable) -> DbResult<i64> {
        // Table names come from a closed enum, never from user input.
        let query = format!("SELECT COUNT(*) FROM {}", table.table_name());
        let count = sqlx::query_scalar::<_, i64>(&query)
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }

    pub async fn delete_all_rows(&self, table: ResettableTable) -> DbResult<u64> {
        let query = format!("DELETE FROM {}", table.table_name());
        let result = sqlx::query(&query).execute(&self.pool).await?;
        Ok(result.rows_affected())
    }
}
