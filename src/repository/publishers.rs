//! Publishers repository for database operations

use chrono::{DateTime, Utc};
use sqlx::{Pool, Postgres};

use super::is_foreign_key_violation;
use crate::{
    error::{AppError, AppResult},
    models::publisher::{Publisher, PublisherInput},
};

const PUBLISHER_COLUMNS: &str = "id, name, address, phone, email, website, created_at";

#[derive(Clone)]
pub struct PublishersRepository {
    pool: Pool<Postgres>,
}

impl PublishersRepository {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }

    pub async fn list(&self) -> AppResult<Vec<Publisher>> {
        let publishers = sqlx::query_as::<_, Publisher>(&format!(
            "SELECT {} FROM publishers ORDER BY name",
            PUBLISHER_COLUMNS
        ))
        .fetch_all(&self.pool)
        .await?;
        Ok(publishers)
    }

    pub async fn get_by_id(&self, id: i32) -> AppResult<Publisher> {
        sqlx::query_as::<_, Publisher>(&format!(
            "SELECT {} FROM publishers WHERE id = $1",
            PUBLISHER_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Publisher with id {} not found", id)))
    }

    pub async fn exists(&self, id: i32) -> AppResult<bool> {
        let exists: bool = sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM publishers WHERE id = $1)")
            .bind(id)
            .fetch_one(&self.pool)
            .await?;
        Ok(exists)
    }

    pub async fn create(&self, input: &PublisherInput, now: DateTime<Utc>) -> AppResult<Publisher> {
        let publisher = sqlx::query_as::<_, Publisher>(&format!(
            r#"
            INSERT INTO publishers (name, address, phone, email, website, created_at)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING {}
            "#,
            PUBLISHER_COLUMNS
        ))
        .bind(&input.name)
        .bind(&input.address)
        .bind(&input.phone)
        .bind(&input.email)
        .bind(&input.website)
        .bind(now)
        .fetch_one(&self.pool)
        .await?;
        Ok(publisher)
    }

    pub async fn update(&self, id: i32, input: &PublisherInput) -> AppResult<Publisher> {
        sqlx::query_as::<_, Publisher>(&format!(
            r#"
            UPDATE publishers
            SET name = $1, address = $2, phone = $3, email = $4, website = $5
            WHERE id = $6
            RETURNING {}
            "#,
            PUBLISHER_COLUMNS
        ))
        .bind(&input.name)
        .bind(&input.address)
        .bind(&input.phone)
        .bind(&input.email)
        .bind(&input.website)
        .bind(id)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Publisher with id {} not found", id)))
    }

    /// Delete a publisher; refused while books reference it
    pub async fn delete(&self, id: i32) -> AppResult<()> {
        let result = sqlx::query("DELETE FROM publishers WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(|e| {
                if is_foreign_key_violation(&e) {
                    AppError::Conflict("Publisher still has books".to_string())
                } else {
                    AppError::Database(e)
                }
            })?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound(format!("Publisher with id {} not found", id)));
        }
        Ok(())
    }
}
