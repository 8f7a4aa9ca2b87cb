//! Books repository for database operations

use chrono::{DateTime, Utc};
use sqlx::{Pool, Postgres, QueryBuilder};

use super::is_foreign_key_violation;
use crate::{
    error::{AppError, AppResult},
    models::{
        author::AuthorShort,
        book::{Book, BookInput, BookQuery},
    },
};

const BOOK_COLUMNS: &str = "b.id, b.title, b.isbn, b.published_year, b.description, \
     b.total_copies, b.available_copies, b.cover_image_url, b.category_id, b.publisher_id, \
     b.created_at, b.updated_at";

/// Appends the WHERE conditions shared by the count and page queries
fn push_search_filters(qb: &mut QueryBuilder<'_, Postgres>, query: &BookQuery) {
    if let Some(term) = query.search.as_deref().map(str::trim).filter(|t| !t.is_empty()) {
        let pattern = format!("%{}%", term.to_lowercase());
        qb.push(" AND (LOWER(b.title) LIKE ")
            .push_bind(pattern.clone())
            .push(" OR LOWER(b.isbn) LIKE ")
            .push_bind(pattern.clone())
            .push(" OR LOWER(COALESCE(b.description, '')) LIKE ")
            .push_bind(pattern)
            .push(")");
    }

    if let Some(category_id) = query.category_id {
        qb.push(" AND b.category_id = ").push_bind(category_id);
    }

    if let Some(author_id) = query.author_id {
        qb.push(" AND EXISTS (SELECT 1 FROM book_authors ba WHERE ba.book_id = b.id AND ba.author_id = ")
            .push_bind(author_id)
            .push(")");
    }
}

#[derive(Clone)]
pub struct BooksRepository {
    pool: Pool<Postgres>,
}

impl BooksRepository {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }

    // =========================================================================
    // READ
    // =========================================================================

    /// Get book by ID
    pub async fn get_by_id(&self, id: i32) -> AppResult<Book> {
        sqlx::query_as::<_, Book>(&format!("SELECT {} FROM books b WHERE b.id = $1", BOOK_COLUMNS))
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Book with id {} not found", id)))
    }

    /// Search books with filters, sort and pagination
    pub async fn search(&self, query: &BookQuery) -> AppResult<(Vec<Book>, i64)> {
        let per_page = query.per_page();
        let offset = query.offset();

        let mut count = QueryBuilder::<Postgres>::new("SELECT COUNT(*) FROM books b WHERE 1=1");
        push_search_filters(&mut count, query);
        let total = count.build_query_scalar::<i64>().fetch_one(&self.pool).await?;

        let mut select = QueryBuilder::<Postgres>::new(format!(
            "SELECT {} FROM books b JOIN categories c ON c.id = b.category_id WHERE 1=1",
            BOOK_COLUMNS
        ));
        push_search_filters(&mut select, query);
        select
            .push(" ORDER BY ")
            .push(query.sort.unwrap_or_default().order_by())
            .push(" LIMIT ")
            .push_bind(per_page)
            .push(" OFFSET ")
            .push_bind(offset);

        let books = select.build_query_as::<Book>().fetch_all(&self.pool).await?;

        Ok((books, total))
    }

    /// Authors linked to a book
    pub async fn get_authors(&self, book_id: i32) -> AppResult<Vec<AuthorShort>> {
        let authors = sqlx::query_as::<_, AuthorShort>(
            r#"
            SELECT a.id, a.first_name, a.last_name
            FROM authors a
            JOIN book_authors ba ON ba.author_id = a.id
            WHERE ba.book_id = $1
            ORDER BY a.last_name, a.first_name
            "#,
        )
        .bind(book_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(authors)
    }

    pub async fn count(&self) -> AppResult<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM books")
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }

    // =========================================================================
    // WRITE
    // =========================================================================

    /// Create a book; every copy starts available
    pub async fn create(&self, input: &BookInput, now: DateTime<Utc>) -> AppResult<Book> {
        let mut tx = self.pool.begin().await?;

        let book = sqlx::query_as::<_, Book>(
            r#"
            INSERT INTO books (title, isbn, published_year, description, total_copies,
                               available_copies, cover_image_url, category_id, publisher_id, created_at)
            VALUES ($1, $2, $3, $4, $5, $5, $6, $7, $8, $9)
            RETURNING id, title, isbn, published_year, description, total_copies, available_copies,
                      cover_image_url, category_id, publisher_id, created_at, updated_at
            "#,
        )
        .bind(&input.title)
        .bind(&input.isbn)
        .bind(input.published_year)
        .bind(&input.description)
        .bind(input.total_copies)
        .bind(&input.cover_image_url)
        .bind(input.category_id)
        .bind(input.publisher_id)
        .bind(now)
        .fetch_one(&mut *tx)
        .await?;

        for author_id in &input.author_ids {
            sqlx::query("INSERT INTO book_authors (book_id, author_id) VALUES ($1, $2) ON CONFLICT DO NOTHING")
                .bind(book.id)
                .bind(author_id)
                .execute(&mut *tx)
                .await?;
        }

        tx.commit().await?;
        Ok(book)
    }

    /// Replace a book's fields and author links.
    ///
    /// A change of total copies moves available copies by the same delta so
    /// copies currently on loan stay accounted for.
    pub async fn update(&self, id: i32, input: &BookInput, now: DateTime<Utc>) -> AppResult<Book> {
        let mut tx = self.pool.begin().await?;

        let (total, available): (i32, i32) = sqlx::query_as(
            "SELECT total_copies, available_copies FROM books WHERE id = $1 FOR UPDATE",
        )
        .bind(id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Book with id {} not found", id)))?;

        let new_available = available + (input.total_copies - total);
        if new_available < 0 {
            return Err(AppError::Validation(format!(
                "Total copies cannot drop below the {} copies currently on loan",
                total - available
            )));
        }

        let book = sqlx::query_as::<_, Book>(
            r#"
            UPDATE books
            SET title = $1, isbn = $2, published_year = $3, description = $4,
                total_copies = $5, available_copies = $6, cover_image_url = $7,
                category_id = $8, publisher_id = $9, updated_at = $10
            WHERE id = $11
            RETURNING id, title, isbn, published_year, description, total_copies, available_copies,
                      cover_image_url, category_id, publisher_id, created_at, updated_at
            "#,
        )
        .bind(&input.title)
        .bind(&input.isbn)
        .bind(input.published_year)
        .bind(&input.description)
        .bind(input.total_copies)
        .bind(new_available)
        .bind(&input.cover_image_url)
        .bind(input.category_id)
        .bind(input.publisher_id)
        .bind(now)
        .bind(id)
        .fetch_one(&mut *tx)
        .await?;

        sqlx::query("DELETE FROM book_authors WHERE book_id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await?;

        for author_id in &input.author_ids {
            sqlx::query("INSERT INTO book_authors (book_id, author_id) VALUES ($1, $2) ON CONFLICT DO NOTHING")
                .bind(id)
                .bind(author_id)
                .execute(&mut *tx)
                .await?;
        }

        tx.commit().await?;
        Ok(book)
    }

    /// Delete a book; refused while loans or reservations reference it
    pub async fn delete(&self, id: i32) -> AppResult<()> {
        let result = sqlx::query("DELETE FROM books WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(|e| {
                if is_foreign_key_violation(&e) {
                    AppError::Conflict("Book has loan or reservation history".to_string())
                } else {
                    AppError::Database(e)
                }
            })?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound(format!("Book with id {} not found", id)));
        }
        Ok(())
    }
}
