//! In-memory circulation store.
//!
//! Holds the whole state behind one async mutex. A transaction owns the lock
//! and works on a copy; commit swaps the copy in, drop throws it away. Used by
//! the service tests and handy for local experiments without PostgreSQL.

use async_trait::async_trait;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard};

use super::circulation::{CirculationStore, CirculationTx};
use crate::{
    error::{AppError, AppResult},
    models::{
        book::BookStock,
        enums::{LoanStatus, ReservationStatus},
        loan::{Loan, LoanFilter, NewLoan},
        reservation::{NewReservation, Reservation, ReservationFilter},
    },
};

#[derive(Debug, Default, Clone)]
struct MemoryState {
    books: BTreeMap<i32, BookStock>,
    users: BTreeSet<i32>,
    loans: BTreeMap<i32, Loan>,
    reservations: BTreeMap<i32, Reservation>,
    last_loan_id: i32,
    last_reservation_id: i32,
}

#[derive(Clone, Default)]
pub struct MemoryCirculationStore {
    state: Arc<Mutex<MemoryState>>,
}

impl MemoryCirculationStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a book with `copies` total and available copies
    pub async fn add_book(&self, book_id: i32, copies: i32) {
        self.state.lock().await.books.insert(
            book_id,
            BookStock {
                id: book_id,
                total_copies: copies,
                available_copies: copies,
            },
        );
    }

    pub async fn add_user(&self, user_id: i32) {
        self.state.lock().await.users.insert(user_id);
    }

    pub async fn book(&self, book_id: i32) -> Option<BookStock> {
        self.state.lock().await.books.get(&book_id).copied()
    }
}

#[async_trait]
impl CirculationStore for MemoryCirculationStore {
    async fn begin(&self) -> AppResult<Box<dyn CirculationTx>> {
        let guard = self.state.clone().lock_owned().await;
        let work = guard.clone();
        Ok(Box::new(MemoryTx { guard, work }))
    }

    async fn get_loan(&self, id: i32) -> AppResult<Option<Loan>> {
        Ok(self.state.lock().await.loans.get(&id).cloned())
    }

    async fn list_loans(&self, filter: &LoanFilter) -> AppResult<Vec<Loan>> {
        let state = self.state.lock().await;
        let mut loans: Vec<Loan> = state
            .loans
            .values()
            .filter(|l| filter.matches(l))
            .cloned()
            .collect();
        loans.sort_by(|a, b| (b.loan_date, b.id).cmp(&(a.loan_date, a.id)));
        Ok(loans)
    }

    async fn get_reservation(&self, id: i32) -> AppResult<Option<Reservation>> {
        Ok(self.state.lock().await.reservations.get(&id).cloned())
    }

    async fn list_reservations(&self, filter: &ReservationFilter) -> AppResult<Vec<Reservation>> {
        let state = self.state.lock().await;
        let mut reservations: Vec<Reservation> = state
            .reservations
            .values()
            .filter(|r| filter.matches(r))
            .cloned()
            .collect();
        reservations.sort_by_key(|r| (r.reservation_date, r.id));
        Ok(reservations)
    }
}

struct MemoryTx {
    guard: OwnedMutexGuard<MemoryState>,
    work: MemoryState,
}

#[async_trait]
impl CirculationTx for MemoryTx {
    async fn lock_book(&mut self, book_id: i32) -> AppResult<Option<BookStock>> {
        Ok(self.work.books.get(&book_id).copied())
    }

    async fn set_available_copies(&mut self, book_id: i32, available: i32) -> AppResult<()> {
        let book = self
            .work
            .books
            .get_mut(&book_id)
            .ok_or_else(|| AppError::NotFound(format!("Book with id {} not found", book_id)))?;

        // Same range as the books_available_copies_range check constraint
        if available < 0 || available > book.total_copies {
            return Err(AppError::Internal(format!(
                "available copies {} out of range for book {}",
                available, book_id
            )));
        }
        book.available_copies = available;
        Ok(())
    }

    async fn user_exists(&mut self, user_id: i32) -> AppResult<bool> {
        Ok(self.work.users.contains(&user_id))
    }

    async fn has_active_loan(&mut self, book_id: i32, user_id: i32) -> AppResult<bool> {
        Ok(self.work.loans.values().any(|l| {
            l.book_id == book_id && l.user_id == user_id && l.status == LoanStatus::Active
        }))
    }

    async fn insert_loan(&mut self, loan: &NewLoan) -> AppResult<Loan> {
        if self.has_active_loan(loan.book_id, loan.user_id).await? {
            return Err(AppError::DuplicateLoan(
                "User already has this book on loan".to_string(),
            ));
        }

        self.work.last_loan_id += 1;
        let created = Loan {
            id: self.work.last_loan_id,
            book_id: loan.book_id,
            user_id: loan.user_id,
            loan_date: loan.loan_date,
            due_date: loan.due_date,
            return_date: None,
            status: LoanStatus::Active,
            late_fee: None,
            notes: None,
        };
        self.work.loans.insert(created.id, created.clone());
        Ok(created)
    }

    async fn lock_loan(&mut self, loan_id: i32) -> AppResult<Option<Loan>> {
        Ok(self.work.loans.get(&loan_id).cloned())
    }

    async fn update_loan(&mut self, loan: &Loan) -> AppResult<()> {
        let stored = self
            .work
            .loans
            .get_mut(&loan.id)
            .ok_or_else(|| AppError::NotFound(format!("Loan with id {} not found", loan.id)))?;
        stored.return_date = loan.return_date;
        stored.status = loan.status;
        stored.late_fee = loan.late_fee;
        Ok(())
    }

    async fn has_pending_reservation(&mut self, book_id: i32, user_id: i32) -> AppResult<bool> {
        Ok(self.work.reservations.values().any(|r| {
            r.book_id == book_id
                && r.user_id == user_id
                && r.status == ReservationStatus::Pending
        }))
    }

    async fn insert_reservation(&mut self, reservation: &NewReservation) -> AppResult<Reservation> {
        if self
            .has_pending_reservation(reservation.book_id, reservation.user_id)
            .await?
        {
            return Err(AppError::DuplicateReservation(
                "User already has a reservation for this book".to_string(),
            ));
        }

        self.work.last_reservation_id += 1;
        let created = Reservation {
            id: self.work.last_reservation_id,
            book_id: reservation.book_id,
            user_id: reservation.user_id,
            reservation_date: reservation.reservation_date,
            expiry_date: reservation.expiry_date,
            status: ReservationStatus::Pending,
            notes: None,
        };
        self.work.reservations.insert(created.id, created.clone());
        Ok(created)
    }

    async fn lock_reservation(&mut self, reservation_id: i32) -> AppResult<Option<Reservation>> {
        Ok(self.work.reservations.get(&reservation_id).cloned())
    }

    async fn oldest_pending_reservation(&mut self, book_id: i32) -> AppResult<Option<Reservation>> {
        Ok(self
            .work
            .reservations
            .values()
            .filter(|r| r.book_id == book_id && r.status == ReservationStatus::Pending)
            .min_by_key(|r| (r.reservation_date, r.id))
            .cloned())
    }

    async fn update_reservation(&mut self, reservation: &Reservation) -> AppResult<()> {
        let stored = self
            .work
            .reservations
            .get_mut(&reservation.id)
            .ok_or_else(|| {
                AppError::NotFound(format!("Reservation with id {} not found", reservation.id))
            })?;
        stored.status = reservation.status;
        stored.expiry_date = reservation.expiry_date;
        Ok(())
    }

    async fn commit(self: Box<Self>) -> AppResult<()> {
        let MemoryTx { mut guard, work } = *self;
        *guard = work;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_dropped_transaction_rolls_back() {
        let store = MemoryCirculationStore::new();
        store.add_book(1, 2).await;

        {
            let mut tx = store.begin().await.unwrap();
            tx.set_available_copies(1, 0).await.unwrap();
        }
        assert_eq!(store.book(1).await.unwrap().available_copies, 2);

        let mut tx = store.begin().await.unwrap();
        tx.set_available_copies(1, 1).await.unwrap();
        tx.commit().await.unwrap();
        assert_eq!(store.book(1).await.unwrap().available_copies, 1);
    }

    #[tokio::test]
    async fn test_copy_range_is_enforced() {
        let store = MemoryCirculationStore::new();
        store.add_book(1, 1).await;

        let mut tx = store.begin().await.unwrap();
        assert!(tx.set_available_copies(1, 2).await.is_err());
        assert!(tx.set_available_copies(1, -1).await.is_err());
    }
}
