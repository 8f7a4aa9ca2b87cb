//! Statistics service

use serde::Serialize;
use sqlx::FromRow;
use std::sync::Arc;
use utoipa::ToSchema;

use crate::{
    clock::Clock,
    error::AppResult,
    models::enums::{LoanStatus, ReservationStatus},
    repository::Repository,
};

/// Library-wide counters
#[derive(Debug, Clone, Serialize, FromRow, ToSchema)]
pub struct LibraryStats {
    pub total_books: i64,
    pub total_users: i64,
    pub total_categories: i64,
    pub total_copies: i64,
    pub available_copies: i64,
    pub copies_on_loan: i64,
    pub active_loans: i64,
    /// Active loans past due at the time of the request
    pub overdue_loans: i64,
    pub pending_reservations: i64,
}

#[derive(Clone)]
pub struct StatsService {
    repository: Repository,
    clock: Arc<dyn Clock>,
}

impl StatsService {
    pub fn new(repository: Repository, clock: Arc<dyn Clock>) -> Self {
        Self { repository, clock }
    }

    pub async fn get_stats(&self) -> AppResult<LibraryStats> {
        let stats = sqlx::query_as::<_, LibraryStats>(
            r#"
            SELECT
                (SELECT COUNT(*) FROM books) AS total_books,
                (SELECT COUNT(*) FROM users) AS total_users,
                (SELECT COUNT(*) FROM categories) AS total_categories,
                (SELECT COALESCE(SUM(total_copies), 0)::BIGINT FROM books) AS total_copies,
                (SELECT COALESCE(SUM(available_copies), 0)::BIGINT FROM books) AS available_copies,
                (SELECT COALESCE(SUM(total_copies - available_copies), 0)::BIGINT FROM books) AS copies_on_loan,
                (SELECT COUNT(*) FROM loans WHERE status = $1) AS active_loans,
                (SELECT COUNT(*) FROM loans WHERE status = $1 AND due_date < $2) AS overdue_loans,
                (SELECT COUNT(*) FROM reservations WHERE status = $3) AS pending_reservations
            "#,
        )
        .bind(LoanStatus::Active)
        .bind(self.clock.now())
        .bind(ReservationStatus::Pending)
        .fetch_one(&self.repository.pool)
        .await?;

        Ok(stats)
    }
}
