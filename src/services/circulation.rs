//! Loan and reservation lifecycle.
//!
//! Every state-changing operation runs inside one store transaction: the book
//! row (or the loan / reservation row) is locked first, checks and writes
//! follow, and nothing is visible until commit. Overdue loans and expired
//! reservations are derived from the clock and never written back.

use chrono::{DateTime, Duration, Utc};
use rust_decimal::Decimal;
use serde::Serialize;
use std::sync::Arc;
use utoipa::ToSchema;

use super::notifier::Notifier;
use crate::{
    clock::Clock,
    config::CirculationConfig,
    error::{AppError, AppResult},
    models::{
        enums::{LoanStatus, ReservationStatus},
        loan::{Loan, LoanDetails, LoanFilter, NewLoan},
        reservation::{NewReservation, Reservation, ReservationDetails, ReservationFilter},
    },
    repository::{CirculationStore, CirculationTx},
};

/// Loan period, pickup window and fee rate
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CirculationPolicy {
    pub loan_period: Duration,
    pub pickup_window: Duration,
    pub late_fee_per_day: Decimal,
}

impl Default for CirculationPolicy {
    fn default() -> Self {
        Self::from(&CirculationConfig::default())
    }
}

impl From<&CirculationConfig> for CirculationPolicy {
    fn from(config: &CirculationConfig) -> Self {
        Self {
            loan_period: Duration::days(config.loan_period_days),
            pickup_window: Duration::days(config.pickup_window_days),
            late_fee_per_day: config.late_fee_per_day,
        }
    }
}

/// Late fee owed for a loan: whole days between due date and return date
/// times the daily rate. Zero when the loan is not returned or not late.
pub fn calculate_late_fee(loan: &Loan, fee_per_day: Decimal) -> Decimal {
    let Some(returned) = loan.return_date else {
        return Decimal::ZERO;
    };

    let days_late = (returned - loan.due_date).num_days();
    if days_late > 0 {
        Decimal::from(days_late) * fee_per_day
    } else {
        Decimal::ZERO
    }
}

/// Result of a return
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct ReturnReceipt {
    pub loan: Loan,
    /// Reservation promoted to fulfilled by this return, if any
    pub fulfilled_reservation: Option<Reservation>,
}

#[derive(Clone)]
pub struct CirculationService {
    store: Arc<dyn CirculationStore>,
    clock: Arc<dyn Clock>,
    notifier: Arc<dyn Notifier>,
    policy: CirculationPolicy,
}

impl CirculationService {
    pub fn new(
        store: Arc<dyn CirculationStore>,
        clock: Arc<dyn Clock>,
        notifier: Arc<dyn Notifier>,
        policy: CirculationPolicy,
    ) -> Self {
        Self {
            store,
            clock,
            notifier,
            policy,
        }
    }

    pub fn policy(&self) -> CirculationPolicy {
        self.policy
    }

    pub fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    // =========================================================================
    // LOANS
    // =========================================================================

    /// Lend one copy of a book to a user
    pub async fn borrow_book(&self, book_id: i32, user_id: i32) -> AppResult<Loan> {
        let now = self.clock.now();
        let mut tx = self.store.begin().await?;

        let book = tx
            .lock_book(book_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Book with id {} not found", book_id)))?;

        if !tx.user_exists(user_id).await? {
            return Err(AppError::NotFound(format!("User with id {} not found", user_id)));
        }

        if tx.has_active_loan(book_id, user_id).await? {
            return Err(AppError::DuplicateLoan(
                "User already has this book on loan".to_string(),
            ));
        }

        if book.available_copies <= 0 {
            return Err(AppError::Unavailable(
                "No copies of this book are available".to_string(),
            ));
        }

        let loan = tx
            .insert_loan(&NewLoan {
                book_id,
                user_id,
                loan_date: now,
                due_date: now + self.policy.loan_period,
            })
            .await?;
        tx.set_available_copies(book_id, book.available_copies - 1)
            .await?;
        tx.commit().await?;

        Ok(loan)
    }

    /// Close an active loan (staff desk)
    pub async fn return_book(&self, loan_id: i32) -> AppResult<ReturnReceipt> {
        let mut tx = self.store.begin().await?;
        let loan = tx
            .lock_loan(loan_id)
            .await?
            .ok_or_else(|| loan_not_found(loan_id))?;

        self.complete_return(tx, loan).await
    }

    /// Close an active loan on behalf of its borrower.
    ///
    /// A loan belonging to someone else is reported as missing.
    pub async fn return_own_book(&self, loan_id: i32, user_id: i32) -> AppResult<ReturnReceipt> {
        let mut tx = self.store.begin().await?;
        let loan = tx
            .lock_loan(loan_id)
            .await?
            .filter(|loan| loan.user_id == user_id)
            .ok_or_else(|| loan_not_found(loan_id))?;

        self.complete_return(tx, loan).await
    }

    async fn complete_return(
        &self,
        mut tx: Box<dyn CirculationTx>,
        mut loan: Loan,
    ) -> AppResult<ReturnReceipt> {
        if loan.status != LoanStatus::Active {
            return Err(AppError::NotActive(format!(
                "Loan {} is {}, only active loans can be returned",
                loan.id, loan.status
            )));
        }

        let now = self.clock.now();
        loan.return_date = Some(now);
        loan.status = LoanStatus::Returned;
        let fee = calculate_late_fee(&loan, self.policy.late_fee_per_day);
        loan.late_fee = (fee > Decimal::ZERO).then_some(fee);
        tx.update_loan(&loan).await?;

        let book = tx.lock_book(loan.book_id).await?.ok_or_else(|| {
            AppError::Internal(format!("Book {} of loan {} is missing", loan.book_id, loan.id))
        })?;
        tx.set_available_copies(book.id, book.available_copies + 1)
            .await?;

        let fulfilled_reservation = match tx.oldest_pending_reservation(book.id).await? {
            Some(mut reservation) => {
                reservation.status = ReservationStatus::Fulfilled;
                reservation.expiry_date = now + self.policy.pickup_window;
                tx.update_reservation(&reservation).await?;
                Some(reservation)
            }
            None => None,
        };

        tx.commit().await?;

        if let Some(reservation) = &fulfilled_reservation {
            if let Err(e) = self.notifier.reservation_ready(reservation).await {
                tracing::warn!(
                    reservation_id = reservation.id,
                    error = %e,
                    "Failed to notify reader of fulfilled reservation"
                );
            }
        }

        Ok(ReturnReceipt {
            loan,
            fulfilled_reservation,
        })
    }

    /// Fee the loan would carry, using the configured daily rate
    pub fn calculate_late_fee(&self, loan: &Loan) -> Decimal {
        calculate_late_fee(loan, self.policy.late_fee_per_day)
    }

    pub async fn get_loan(&self, loan_id: i32) -> AppResult<LoanDetails> {
        let loan = self
            .store
            .get_loan(loan_id)
            .await?
            .ok_or_else(|| loan_not_found(loan_id))?;
        Ok(LoanDetails::new(loan, self.clock.now()))
    }

    pub async fn list_loans(&self, filter: &LoanFilter) -> AppResult<Vec<LoanDetails>> {
        let now = self.clock.now();
        let loans = self.store.list_loans(filter).await?;
        Ok(loans
            .into_iter()
            .map(|loan| LoanDetails::new(loan, now))
            .collect())
    }

    /// Full loan history of a user
    pub async fn user_loans(&self, user_id: i32) -> AppResult<Vec<LoanDetails>> {
        self.list_loans(&LoanFilter {
            user_id: Some(user_id),
            ..Default::default()
        })
        .await
    }

    /// Loans the user still holds
    pub async fn active_user_loans(&self, user_id: i32) -> AppResult<Vec<LoanDetails>> {
        self.list_loans(&LoanFilter {
            user_id: Some(user_id),
            status: Some(LoanStatus::Active),
            ..Default::default()
        })
        .await
    }

    /// Active loans past their due date
    pub async fn overdue_loans(&self) -> AppResult<Vec<LoanDetails>> {
        self.list_loans(&LoanFilter {
            status: Some(LoanStatus::Active),
            due_before: Some(self.clock.now()),
            ..Default::default()
        })
        .await
    }

    // =========================================================================
    // RESERVATIONS
    // =========================================================================

    /// Join the queue for a book, whether or not copies are on the shelf
    pub async fn reserve_book(&self, book_id: i32, user_id: i32) -> AppResult<Reservation> {
        let now = self.clock.now();
        let mut tx = self.store.begin().await?;

        tx.lock_book(book_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Book with id {} not found", book_id)))?;

        if !tx.user_exists(user_id).await? {
            return Err(AppError::NotFound(format!("User with id {} not found", user_id)));
        }

        if tx.has_pending_reservation(book_id, user_id).await? {
            return Err(AppError::DuplicateReservation(
                "User already has a reservation for this book".to_string(),
            ));
        }

        let reservation = tx
            .insert_reservation(&NewReservation {
                book_id,
                user_id,
                reservation_date: now,
                expiry_date: now + self.policy.pickup_window,
            })
            .await?;
        tx.commit().await?;

        Ok(reservation)
    }

    /// Withdraw a pending reservation.
    ///
    /// Reservations of other users are reported as missing.
    pub async fn cancel_reservation(
        &self,
        reservation_id: i32,
        user_id: i32,
    ) -> AppResult<Reservation> {
        let mut tx = self.store.begin().await?;

        let mut reservation = tx
            .lock_reservation(reservation_id)
            .await?
            .filter(|r| r.user_id == user_id)
            .ok_or_else(|| reservation_not_found(reservation_id))?;

        if reservation.status != ReservationStatus::Pending {
            return Err(AppError::NotActive(format!(
                "Reservation {} is {}, only pending reservations can be cancelled",
                reservation.id, reservation.status
            )));
        }

        reservation.status = ReservationStatus::Cancelled;
        tx.update_reservation(&reservation).await?;
        tx.commit().await?;

        Ok(reservation)
    }

    pub async fn get_reservation(&self, reservation_id: i32) -> AppResult<ReservationDetails> {
        let reservation = self
            .store
            .get_reservation(reservation_id)
            .await?
            .ok_or_else(|| reservation_not_found(reservation_id))?;
        Ok(ReservationDetails::new(reservation, self.clock.now()))
    }

    pub async fn list_reservations(
        &self,
        filter: &ReservationFilter,
    ) -> AppResult<Vec<ReservationDetails>> {
        let now = self.clock.now();
        let reservations = self.store.list_reservations(filter).await?;
        Ok(reservations
            .into_iter()
            .map(|r| ReservationDetails::new(r, now))
            .collect())
    }

    pub async fn user_reservations(&self, user_id: i32) -> AppResult<Vec<ReservationDetails>> {
        self.list_reservations(&ReservationFilter {
            user_id: Some(user_id),
            ..Default::default()
        })
        .await
    }

    /// Pending reservations in queue order
    pub async fn pending_reservations(&self) -> AppResult<Vec<ReservationDetails>> {
        self.list_reservations(&ReservationFilter {
            status: Some(ReservationStatus::Pending),
            ..Default::default()
        })
        .await
    }
}

fn loan_not_found(loan_id: i32) -> AppError {
    AppError::NotFound(format!("Loan with id {} not found", loan_id))
}

fn reservation_not_found(reservation_id: i32) -> AppError {
    AppError::NotFound(format!("Reservation with id {} not found", reservation_id))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        clock::FixedClock,
        repository::MemoryCirculationStore,
        services::notifier::{MockNotifier, TracingNotifier},
    };
    use chrono::TimeZone;

    fn start() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 1, 10, 0, 0).unwrap()
    }

    async fn setup(
        notifier: Arc<dyn Notifier>,
    ) -> (CirculationService, MemoryCirculationStore, Arc<FixedClock>) {
        let store = MemoryCirculationStore::new();
        store.add_book(1, 1).await;
        store.add_book(2, 3).await;
        for user in 1..=3 {
            store.add_user(user).await;
        }
        let clock = Arc::new(FixedClock::new(start()));
        let service = CirculationService::new(
            Arc::new(store.clone()),
            clock.clone(),
            notifier,
            CirculationPolicy::default(),
        );
        (service, store, clock)
    }

    fn loan_due(due: DateTime<Utc>, returned: Option<DateTime<Utc>>) -> Loan {
        Loan {
            id: 1,
            book_id: 1,
            user_id: 1,
            loan_date: due - Duration::days(14),
            due_date: due,
            return_date: returned,
            status: LoanStatus::Returned,
            late_fee: None,
            notes: None,
        }
    }

    #[test]
    fn test_late_fee_counts_whole_days() {
        let due = start();
        let rate = Decimal::new(100, 2);

        assert_eq!(calculate_late_fee(&loan_due(due, None), rate), Decimal::ZERO);
        assert_eq!(
            calculate_late_fee(&loan_due(due, Some(due - Duration::days(2))), rate),
            Decimal::ZERO
        );
        assert_eq!(
            calculate_late_fee(&loan_due(due, Some(due + Duration::hours(23))), rate),
            Decimal::ZERO
        );
        assert_eq!(
            calculate_late_fee(&loan_due(due, Some(due + Duration::days(3))), rate),
            Decimal::new(300, 2)
        );
        assert_eq!(
            calculate_late_fee(
                &loan_due(due, Some(due + Duration::days(5) + Duration::hours(6))),
                Decimal::new(25, 2)
            ),
            Decimal::new(125, 2)
        );
    }

    #[test]
    fn test_policy_from_config() {
        let policy = CirculationPolicy::default();
        assert_eq!(policy.loan_period, Duration::days(14));
        assert_eq!(policy.pickup_window, Duration::days(7));
        assert_eq!(policy.late_fee_per_day, Decimal::ONE);
    }

    #[tokio::test]
    async fn test_borrow_sets_due_date_and_takes_a_copy() {
        let (service, store, _) = setup(Arc::new(TracingNotifier)).await;

        let loan = service.borrow_book(2, 1).await.unwrap();
        assert_eq!(loan.status, LoanStatus::Active);
        assert_eq!(loan.loan_date, start());
        assert_eq!(loan.due_date, start() + Duration::days(14));
        assert_eq!(store.book(2).await.unwrap().available_copies, 2);
    }

    #[tokio::test]
    async fn test_borrow_errors() {
        let (service, store, _) = setup(Arc::new(TracingNotifier)).await;

        assert!(matches!(service.borrow_book(99, 1).await, Err(AppError::NotFound(_))));
        assert!(matches!(service.borrow_book(1, 99).await, Err(AppError::NotFound(_))));

        service.borrow_book(1, 1).await.unwrap();
        assert!(matches!(service.borrow_book(1, 1).await, Err(AppError::DuplicateLoan(_))));
        assert!(matches!(service.borrow_book(1, 2).await, Err(AppError::Unavailable(_))));
        assert_eq!(store.book(1).await.unwrap().available_copies, 0);
    }

    #[tokio::test]
    async fn test_late_return_charges_fee() {
        let (service, store, clock) = setup(Arc::new(TracingNotifier)).await;

        let loan = service.borrow_book(1, 1).await.unwrap();
        clock.advance(Duration::days(17));

        let receipt = service.return_book(loan.id).await.unwrap();
        assert_eq!(receipt.loan.status, LoanStatus::Returned);
        assert_eq!(receipt.loan.late_fee, Some(Decimal::new(300, 2)));
        assert!(receipt.fulfilled_reservation.is_none());
        assert_eq!(store.book(1).await.unwrap().available_copies, 1);

        assert!(matches!(service.return_book(loan.id).await, Err(AppError::NotActive(_))));
        assert!(matches!(service.return_book(42).await, Err(AppError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_on_time_return_has_no_fee() {
        let (service, _, clock) = setup(Arc::new(TracingNotifier)).await;

        let loan = service.borrow_book(1, 1).await.unwrap();
        clock.advance(Duration::days(14));
        let receipt = service.return_book(loan.id).await.unwrap();
        assert_eq!(receipt.loan.late_fee, None);
    }

    #[tokio::test]
    async fn test_return_own_book_hides_other_loans() {
        let (service, _, _) = setup(Arc::new(TracingNotifier)).await;

        let loan = service.borrow_book(1, 1).await.unwrap();
        assert!(matches!(
            service.return_own_book(loan.id, 2).await,
            Err(AppError::NotFound(_))
        ));
        assert!(service.return_own_book(loan.id, 1).await.is_ok());
    }

    #[tokio::test]
    async fn test_return_fulfills_oldest_reservation_and_notifies() {
        let mut notifier = MockNotifier::new();
        notifier
            .expect_reservation_ready()
            .withf(|r| r.user_id == 2 && r.status == ReservationStatus::Fulfilled)
            .times(1)
            .returning(|_| Ok(()));
        let (service, _, clock) = setup(Arc::new(notifier)).await;

        let loan = service.borrow_book(1, 1).await.unwrap();
        clock.advance(Duration::hours(1));
        let first = service.reserve_book(1, 2).await.unwrap();
        clock.advance(Duration::hours(1));
        let second = service.reserve_book(1, 3).await.unwrap();

        clock.advance(Duration::days(2));
        let receipt = service.return_book(loan.id).await.unwrap();
        let fulfilled = receipt.fulfilled_reservation.unwrap();
        assert_eq!(fulfilled.id, first.id);
        assert_eq!(fulfilled.expiry_date, clock.now() + Duration::days(7));

        let still_pending = service.get_reservation(second.id).await.unwrap();
        assert_eq!(still_pending.reservation.status, ReservationStatus::Pending);
    }

    #[tokio::test]
    async fn test_notification_failure_keeps_the_return() {
        let mut notifier = MockNotifier::new();
        notifier
            .expect_reservation_ready()
            .times(1)
            .returning(|_| Err(AppError::Internal("smtp down".to_string())));
        let (service, store, _) = setup(Arc::new(notifier)).await;

        let loan = service.borrow_book(1, 1).await.unwrap();
        service.reserve_book(1, 2).await.unwrap();

        let receipt = service.return_book(loan.id).await.unwrap();
        assert!(receipt.fulfilled_reservation.is_some());
        assert_eq!(store.book(1).await.unwrap().available_copies, 1);
    }

    #[tokio::test]
    async fn test_reserve_and_cancel() {
        let (service, _, _) = setup(Arc::new(TracingNotifier)).await;

        let reservation = service.reserve_book(2, 1).await.unwrap();
        assert_eq!(reservation.status, ReservationStatus::Pending);
        assert_eq!(reservation.expiry_date, start() + Duration::days(7));
        assert!(matches!(
            service.reserve_book(2, 1).await,
            Err(AppError::DuplicateReservation(_))
        ));
        assert!(matches!(service.reserve_book(99, 1).await, Err(AppError::NotFound(_))));

        assert!(matches!(
            service.cancel_reservation(reservation.id, 2).await,
            Err(AppError::NotFound(_))
        ));
        let cancelled = service.cancel_reservation(reservation.id, 1).await.unwrap();
        assert_eq!(cancelled.status, ReservationStatus::Cancelled);
        assert!(matches!(
            service.cancel_reservation(reservation.id, 1).await,
            Err(AppError::NotActive(_))
        ));

        // A cancelled reservation no longer blocks a new one
        assert!(service.reserve_book(2, 1).await.is_ok());
    }

    #[tokio::test]
    async fn test_overdue_is_derived() {
        let (service, _, clock) = setup(Arc::new(TracingNotifier)).await;

        let loan = service.borrow_book(2, 1).await.unwrap();
        service.borrow_book(2, 2).await.unwrap();
        assert!(service.overdue_loans().await.unwrap().is_empty());

        clock.advance(Duration::days(16));
        let overdue = service.overdue_loans().await.unwrap();
        assert_eq!(overdue.len(), 2);
        assert!(overdue.iter().all(|l| l.days_overdue == 2));

        service.return_book(loan.id).await.unwrap();
        assert_eq!(service.overdue_loans().await.unwrap().len(), 1);
        let details = service.get_loan(loan.id).await.unwrap();
        assert!(!details.is_overdue);
        assert_eq!(details.loan.status, LoanStatus::Returned);
    }

    #[tokio::test]
    async fn test_user_listings() {
        let (service, _, _) = setup(Arc::new(TracingNotifier)).await;

        let first = service.borrow_book(1, 1).await.unwrap();
        service.borrow_book(2, 1).await.unwrap();
        service.return_book(first.id).await.unwrap();
        service.reserve_book(1, 1).await.unwrap();

        assert_eq!(service.user_loans(1).await.unwrap().len(), 2);
        assert_eq!(service.active_user_loans(1).await.unwrap().len(), 1);
        assert_eq!(service.user_reservations(1).await.unwrap().len(), 1);
        assert_eq!(service.pending_reservations().await.unwrap().len(), 1);
        assert!(service.user_loans(2).await.unwrap().is_empty());
    }
}
