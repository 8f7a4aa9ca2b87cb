//! Authors repository for database operations

use chrono::{DateTime, Utc};
use sqlx::{Pool, Postgres};

use crate::{
    error::{AppError, AppResult},
    models::author::{Author, AuthorInput},
};

const AUTHOR_COLUMNS: &str =
    "id, first_name, last_name, biography, date_of_birth, country, created_at";

#[derive(Clone)]
pub struct AuthorsRepository {
    pool: Pool<Postgres>,
}

impl AuthorsRepository {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }

    /// List authors, optionally filtered by name or country
    pub async fn list(&self, search: Option<&str>) -> AppResult<Vec<Author>> {
        let pattern = search
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(|s| format!("%{}%", s.to_lowercase()));

        let authors = sqlx::query_as::<_, Author>(&format!(
            r#"
            SELECT {} FROM authors
            WHERE $1::text IS NULL
               OR LOWER(first_name) LIKE $1
               OR LOWER(last_name) LIKE $1
               OR LOWER(COALESCE(country, '')) LIKE $1
            ORDER BY last_name, first_name
            "#,
            AUTHOR_COLUMNS
        ))
        .bind(pattern)
        .fetch_all(&self.pool)
        .await?;
        Ok(authors)
    }

    pub async fn get_by_id(&self, id: i32) -> AppResult<Author> {
        sqlx::query_as::<_, Author>(&format!("SELECT {} FROM authors WHERE id = $1", AUTHOR_COLUMNS))
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Author with id {} not found", id)))
    }

    /// Number of the given ids that exist
    pub async fn count_existing(&self, ids: &[i32]) -> AppResult<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM authors WHERE id = ANY($1)")
            .bind(ids)
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }

    pub async fn create(&self, input: &AuthorInput, now: DateTime<Utc>) -> AppResult<Author> {
        let author = sqlx::query_as::<_, Author>(&format!(
            r#"
            INSERT INTO authors (first_name, last_name, biography, date_of_birth, country, created_at)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING {}
            "#,
            AUTHOR_COLUMNS
        ))
        .bind(&input.first_name)
        .bind(&input.last_name)
        .bind(&input.biography)
        .bind(input.date_of_birth)
        .bind(&input.country)
        .bind(now)
        .fetch_one(&self.pool)
        .await?;
        Ok(author)
    }

    pub async fn update(&self, id: i32, input: &AuthorInput) -> AppResult<Author> {
        sqlx::query_as::<_, Author>(&format!(
            r#"
            UPDATE authors
            SET first_name = $1, last_name = $2, biography = $3, date_of_birth = $4, country = $5
            WHERE id = $6
            RETURNING {}
            "#,
            AUTHOR_COLUMNS
        ))
        .bind(&input.first_name)
        .bind(&input.last_name)
        .bind(&input.biography)
        .bind(input.date_of_birth)
        .bind(&input.country)
        .bind(id)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Author with id {} not found", id)))
    }

    /// Delete an author; book links cascade
    pub async fn delete(&self, id: i32) -> AppResult<()> {
        let result = sqlx::query("DELETE FROM authors WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound(format!("Author with id {} not found", id)));
        }
        Ok(())
    }
}
