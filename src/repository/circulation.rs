//! Transactional storage for loans, reservations and book stock.
//!
//! The lifecycle engine only talks to [`CirculationStore`]; PostgreSQL is the
//! production backend and [`super::memory::MemoryCirculationStore`] backs tests.
//! A transaction that is dropped without [`CirculationTx::commit`] is rolled back.

use async_trait::async_trait;
use sqlx::{Pool, Postgres, Transaction};

use crate::{
    error::{AppError, AppResult},
    models::{
        book::BookStock,
        enums::{LoanStatus, ReservationStatus},
        loan::{Loan, LoanFilter, NewLoan},
        reservation::{NewReservation, Reservation, ReservationFilter},
    },
};

#[async_trait]
pub trait CirculationStore: Send + Sync {
    /// Open a transaction scoped to one lifecycle operation
    async fn begin(&self) -> AppResult<Box<dyn CirculationTx>>;

    async fn get_loan(&self, id: i32) -> AppResult<Option<Loan>>;

    /// Loans ordered by loan date, newest first
    async fn list_loans(&self, filter: &LoanFilter) -> AppResult<Vec<Loan>>;

    async fn get_reservation(&self, id: i32) -> AppResult<Option<Reservation>>;

    /// Reservations ordered by reservation date, oldest first
    async fn list_reservations(&self, filter: &ReservationFilter) -> AppResult<Vec<Reservation>>;
}

/// Row access inside one transaction.
///
/// `lock_*` methods take a row lock that is held until commit or rollback.
#[async_trait]
pub trait CirculationTx: Send {
    async fn lock_book(&mut self, book_id: i32) -> AppResult<Option<BookStock>>;

    async fn set_available_copies(&mut self, book_id: i32, available: i32) -> AppResult<()>;

    async fn user_exists(&mut self, user_id: i32) -> AppResult<bool>;

    async fn has_active_loan(&mut self, book_id: i32, user_id: i32) -> AppResult<bool>;

    async fn insert_loan(&mut self, loan: &NewLoan) -> AppResult<Loan>;

    async fn lock_loan(&mut self, loan_id: i32) -> AppResult<Option<Loan>>;

    /// Persist return date, status and late fee
    async fn update_loan(&mut self, loan: &Loan) -> AppResult<()>;

    async fn has_pending_reservation(&mut self, book_id: i32, user_id: i32) -> AppResult<bool>;

    async fn insert_reservation(&mut self, reservation: &NewReservation) -> AppResult<Reservation>;

    async fn lock_reservation(&mut self, reservation_id: i32) -> AppResult<Option<Reservation>>;

    /// First pending reservation for the book by reservation date (then id)
    async fn oldest_pending_reservation(&mut self, book_id: i32) -> AppResult<Option<Reservation>>;

    /// Persist status and expiry date
    async fn update_reservation(&mut self, reservation: &Reservation) -> AppResult<()>;

    async fn commit(self: Box<Self>) -> AppResult<()>;
}

const LOAN_COLUMNS: &str =
    "id, book_id, user_id, loan_date, due_date, return_date, status, late_fee, notes";

const RESERVATION_COLUMNS: &str =
    "id, book_id, user_id, reservation_date, expiry_date, status, notes";

/// Maps the partial unique indexes onto lifecycle errors
fn map_unique_violation(err: sqlx::Error) -> AppError {
    if let sqlx::Error::Database(ref db) = err {
        match db.constraint() {
            Some("loans_one_active_per_user_book") => {
                return AppError::DuplicateLoan("User already has this book on loan".to_string())
            }
            Some("reservations_one_pending_per_user_book") => {
                return AppError::DuplicateReservation(
                    "User already has a reservation for this book".to_string(),
                )
            }
            _ => {}
        }
    }
    AppError::Database(err)
}

#[derive(Clone)]
pub struct PgCirculationStore {
    pool: Pool<Postgres>,
}

impl PgCirculationStore {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl CirculationStore for PgCirculationStore {
    async fn begin(&self) -> AppResult<Box<dyn CirculationTx>> {
        let tx = self.pool.begin().await?;
        Ok(Box::new(PgCirculationTx { tx }))
    }

    async fn get_loan(&self, id: i32) -> AppResult<Option<Loan>> {
        let loan = sqlx::query_as::<_, Loan>(&format!(
            "SELECT {} FROM loans WHERE id = $1",
            LOAN_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(loan)
    }

    async fn list_loans(&self, filter: &LoanFilter) -> AppResult<Vec<Loan>> {
        let loans = sqlx::query_as::<_, Loan>(&format!(
            r#"
            SELECT {} FROM loans
            WHERE ($1::int IS NULL OR user_id = $1)
              AND ($2::int IS NULL OR book_id = $2)
              AND ($3::loan_status IS NULL OR status = $3)
              AND ($4::timestamptz IS NULL OR due_date < $4)
            ORDER BY loan_date DESC, id DESC
            "#,
            LOAN_COLUMNS
        ))
        .bind(filter.user_id)
        .bind(filter.book_id)
        .bind(filter.status)
        .bind(filter.due_before)
        .fetch_all(&self.pool)
        .await?;
        Ok(loans)
    }

    async fn get_reservation(&self, id: i32) -> AppResult<Option<Reservation>> {
        let reservation = sqlx::query_as::<_, Reservation>(&format!(
            "SELECT {} FROM reservations WHERE id = $1",
            RESERVATION_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(reservation)
    }

    async fn list_reservations(&self, filter: &ReservationFilter) -> AppResult<Vec<Reservation>> {
        let reservations = sqlx::query_as::<_, Reservation>(&format!(
            r#"
            SELECT {} FROM reservations
            WHERE ($1::int IS NULL OR user_id = $1)
              AND ($2::int IS NULL OR book_id = $2)
              AND ($3::reservation_status IS NULL OR status = $3)
            ORDER BY reservation_date ASC, id ASC
            "#,
            RESERVATION_COLUMNS
        ))
        .bind(filter.user_id)
        .bind(filter.book_id)
        .bind(filter.status)
        .fetch_all(&self.pool)
        .await?;
        Ok(reservations)
    }
}

struct PgCirculationTx {
    tx: Transaction<'static, Postgres>,
}

#[async_trait]
impl CirculationTx for PgCirculationTx {
    async fn lock_book(&mut self, book_id: i32) -> AppResult<Option<BookStock>> {
        let stock = sqlx::query_as::<_, BookStock>(
            "SELECT id, total_copies, available_copies FROM books WHERE id = $1 FOR UPDATE",
        )
        .bind(book_id)
        .fetch_optional(&mut *self.tx)
        .await?;
        Ok(stock)
    }

    async fn set_available_copies(&mut self, book_id: i32, available: i32) -> AppResult<()> {
        sqlx::query("UPDATE books SET available_copies = $1 WHERE id = $2")
            .bind(available)
            .bind(book_id)
            .execute(&mut *self.tx)
            .await?;
        Ok(())
    }

    async fn user_exists(&mut self, user_id: i32) -> AppResult<bool> {
        let exists: bool = sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM users WHERE id = $1)")
            .bind(user_id)
            .fetch_one(&mut *self.tx)
            .await?;
        Ok(exists)
    }

    async fn has_active_loan(&mut self, book_id: i32, user_id: i32) -> AppResult<bool> {
        let exists: bool = sqlx::query_scalar(
            "SELECT EXISTS(SELECT 1 FROM loans WHERE book_id = $1 AND user_id = $2 AND status = $3)",
        )
        .bind(book_id)
        .bind(user_id)
        .bind(LoanStatus::Active)
        .fetch_one(&mut *self.tx)
        .await?;
        Ok(exists)
    }

    async fn insert_loan(&mut self, loan: &NewLoan) -> AppResult<Loan> {
        sqlx::query_as::<_, Loan>(&format!(
            r#"
            INSERT INTO loans (book_id, user_id, loan_date, due_date, status)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING {}
            "#,
            LOAN_COLUMNS
        ))
        .bind(loan.book_id)
        .bind(loan.user_id)
        .bind(loan.loan_date)
        .bind(loan.due_date)
        .bind(LoanStatus::Active)
        .fetch_one(&mut *self.tx)
        .await
        .map_err(map_unique_violation)
    }

    async fn lock_loan(&mut self, loan_id: i32) -> AppResult<Option<Loan>> {
        let loan = sqlx::query_as::<_, Loan>(&format!(
            "SELECT {} FROM loans WHERE id = $1 FOR UPDATE",
            LOAN_COLUMNS
        ))
        .bind(loan_id)
        .fetch_optional(&mut *self.tx)
        .await?;
        Ok(loan)
    }

    async fn update_loan(&mut self, loan: &Loan) -> AppResult<()> {
        sqlx::query("UPDATE loans SET return_date = $1, status = $2, late_fee = $3 WHERE id = $4")
            .bind(loan.return_date)
            .bind(loan.status)
            .bind(loan.late_fee)
            .bind(loan.id)
            .execute(&mut *self.tx)
            .await?;
        Ok(())
    }

    async fn has_pending_reservation(&mut self, book_id: i32, user_id: i32) -> AppResult<bool> {
        let exists: bool = sqlx::query_scalar(
            "SELECT EXISTS(SELECT 1 FROM reservations WHERE book_id = $1 AND user_id = $2 AND status = $3)",
        )
        .bind(book_id)
        .bind(user_id)
        .bind(ReservationStatus::Pending)
        .fetch_one(&mut *self.tx)
        .await?;
        Ok(exists)
    }

    async fn insert_reservation(&mut self, reservation: &NewReservation) -> AppResult<Reservation> {
        sqlx::query_as::<_, Reservation>(&format!(
            r#"
            INSERT INTO reservations (book_id, user_id, reservation_date, expiry_date, status)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING {}
            "#,
            RESERVATION_COLUMNS
        ))
        .bind(reservation.book_id)
        .bind(reservation.user_id)
        .bind(reservation.reservation_date)
        .bind(reservation.expiry_date)
        .bind(ReservationStatus::Pending)
        .fetch_one(&mut *self.tx)
        .await
        .map_err(map_unique_violation)
    }

    async fn lock_reservation(&mut self, reservation_id: i32) -> AppResult<Option<Reservation>> {
        let reservation = sqlx::query_as::<_, Reservation>(&format!(
            "SELECT {} FROM reservations WHERE id = $1 FOR UPDATE",
            RESERVATION_COLUMNS
        ))
        .bind(reservation_id)
        .fetch_optional(&mut *self.tx)
        .await?;
        Ok(reservation)
    }

    async fn oldest_pending_reservation(&mut self, book_id: i32) -> AppResult<Option<Reservation>> {
        let reservation = sqlx::query_as::<_, Reservation>(&format!(
            r#"
            SELECT {} FROM reservations
            WHERE book_id = $1 AND status = $2
            ORDER BY reservation_date ASC, id ASC
            LIMIT 1
            FOR UPDATE
            "#,
            RESERVATION_COLUMNS
        ))
        .bind(book_id)
        .bind(ReservationStatus::Pending)
        .fetch_optional(&mut *self.tx)
        .await?;
        Ok(reservation)
    }

    async fn update_reservation(&mut self, reservation: &Reservation) -> AppResult<()> {
        sqlx::query("UPDATE reservations SET status = $1, expiry_date = $2 WHERE id = $3")
            .bind(reservation.status)
            .bind(reservation.expiry_date)
            .bind(reservation.id)
            .execute(&mut *self.tx)
            .await?;
        Ok(())
    }

    async fn commit(self: Box<Self>) -> AppResult<()> {
        self.tx.commit().await?;
        Ok(())
    }
}
