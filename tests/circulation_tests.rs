//! Lifecycle scenarios against the in-memory store

use async_trait::async_trait;
use bibliotheca_server::{
    clock::{Clock, FixedClock},
    error::{AppError, AppResult},
    models::{
        enums::{LoanStatus, ReservationStatus},
        reservation::Reservation,
    },
    repository::MemoryCirculationStore,
    services::{
        circulation::{CirculationPolicy, CirculationService},
        notifier::Notifier,
    },
};
use chrono::{Duration, TimeZone, Utc};
use rust_decimal::Decimal;
use std::sync::{Arc, Mutex};

/// Keeps every notice it receives
#[derive(Default)]
struct RecordingNotifier {
    seen: Mutex<Vec<Reservation>>,
}

impl RecordingNotifier {
    fn seen(&self) -> Vec<Reservation> {
        self.seen.lock().unwrap().clone()
    }
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn reservation_ready(&self, reservation: &Reservation) -> AppResult<()> {
        self.seen.lock().unwrap().push(reservation.clone());
        Ok(())
    }
}

struct Desk {
    service: CirculationService,
    store: MemoryCirculationStore,
    clock: Arc<FixedClock>,
    notifier: Arc<RecordingNotifier>,
}

async fn desk(books: &[(i32, i32)], users: i32) -> Desk {
    let store = MemoryCirculationStore::new();
    for (id, copies) in books {
        store.add_book(*id, *copies).await;
    }
    for user in 1..=users {
        store.add_user(user).await;
    }

    let clock = Arc::new(FixedClock::new(
        Utc.with_ymd_and_hms(2024, 1, 15, 9, 30, 0).unwrap(),
    ));
    let notifier = Arc::new(RecordingNotifier::default());
    let service = CirculationService::new(
        Arc::new(store.clone()),
        clock.clone(),
        notifier.clone(),
        CirculationPolicy::default(),
    );

    Desk {
        service,
        store,
        clock,
        notifier,
    }
}

#[tokio::test]
async fn test_copy_count_stays_within_bounds() {
    let desk = desk(&[(1, 2)], 3).await;

    let a = desk.service.borrow_book(1, 1).await.unwrap();
    let b = desk.service.borrow_book(1, 2).await.unwrap();
    assert!(matches!(
        desk.service.borrow_book(1, 3).await,
        Err(AppError::Unavailable(_))
    ));
    assert_eq!(desk.store.book(1).await.unwrap().available_copies, 0);

    desk.service.return_book(a.id).await.unwrap();
    desk.service.return_book(b.id).await.unwrap();
    let stock = desk.store.book(1).await.unwrap();
    assert_eq!(stock.available_copies, stock.total_copies);
}

#[tokio::test]
async fn test_borrow_then_return_restores_count() {
    let desk = desk(&[(1, 3)], 1).await;

    let loan = desk.service.borrow_book(1, 1).await.unwrap();
    assert_eq!(desk.store.book(1).await.unwrap().available_copies, 2);

    let receipt = desk.service.return_book(loan.id).await.unwrap();
    assert_eq!(receipt.loan.status, LoanStatus::Returned);
    assert!(receipt.loan.return_date.is_some());
    assert_eq!(desk.store.book(1).await.unwrap().available_copies, 3);
}

#[tokio::test]
async fn test_duplicate_borrow_leaves_count_unchanged() {
    let desk = desk(&[(1, 3)], 1).await;

    desk.service.borrow_book(1, 1).await.unwrap();
    assert!(matches!(
        desk.service.borrow_book(1, 1).await,
        Err(AppError::DuplicateLoan(_))
    ));
    assert_eq!(desk.store.book(1).await.unwrap().available_copies, 2);
}

#[tokio::test]
async fn test_late_fee_is_truncated_to_whole_days() {
    let desk = desk(&[(1, 1)], 1).await;

    let loan = desk.service.borrow_book(1, 1).await.unwrap();
    desk.clock
        .advance(Duration::days(14) + Duration::days(1) + Duration::hours(23));

    let receipt = desk.service.return_book(loan.id).await.unwrap();
    assert_eq!(receipt.loan.late_fee, Some(Decimal::new(100, 2)));
}

#[tokio::test]
async fn test_reservations_are_served_first_come_first_served() {
    let desk = desk(&[(1, 1)], 4).await;

    let loan = desk.service.borrow_book(1, 1).await.unwrap();
    let first = desk.service.reserve_book(1, 2).await.unwrap();
    desk.clock.advance(Duration::minutes(5));
    let cancelled = desk.service.reserve_book(1, 3).await.unwrap();
    desk.clock.advance(Duration::minutes(5));
    let last = desk.service.reserve_book(1, 4).await.unwrap();

    desk.service.cancel_reservation(cancelled.id, 3).await.unwrap();

    let receipt = desk.service.return_book(loan.id).await.unwrap();
    assert_eq!(receipt.fulfilled_reservation.map(|r| r.id), Some(first.id));

    // The copy comes back to the shelf; the next return serves the queue again
    let loan = desk.service.borrow_book(1, 2).await.unwrap();
    let receipt = desk.service.return_book(loan.id).await.unwrap();
    assert_eq!(receipt.fulfilled_reservation.map(|r| r.id), Some(last.id));

    let seen: Vec<i32> = desk.notifier.seen().iter().map(|r| r.id).collect();
    assert_eq!(seen, vec![first.id, last.id]);
    assert!(desk
        .notifier
        .seen()
        .iter()
        .all(|r| r.status == ReservationStatus::Fulfilled));
}

#[tokio::test]
async fn test_fulfilled_reservation_expires_after_pickup_window() {
    let desk = desk(&[(1, 1)], 2).await;

    let loan = desk.service.borrow_book(1, 1).await.unwrap();
    let reservation = desk.service.reserve_book(1, 2).await.unwrap();
    desk.service.return_book(loan.id).await.unwrap();

    desk.clock.advance(Duration::days(7));
    let details = desk.service.get_reservation(reservation.id).await.unwrap();
    assert_eq!(details.reservation.status, ReservationStatus::Fulfilled);
    assert!(!details.is_expired);

    desk.clock.advance(Duration::seconds(1));
    let details = desk.service.get_reservation(reservation.id).await.unwrap();
    assert!(details.is_expired);
}

#[tokio::test]
async fn test_fulfilled_reservation_cannot_be_cancelled() {
    let desk = desk(&[(1, 1)], 2).await;

    let loan = desk.service.borrow_book(1, 1).await.unwrap();
    let reservation = desk.service.reserve_book(1, 2).await.unwrap();
    desk.service.return_book(loan.id).await.unwrap();

    assert!(matches!(
        desk.service.cancel_reservation(reservation.id, 2).await,
        Err(AppError::NotActive(_))
    ));
}

#[tokio::test]
async fn test_concurrent_borrows_never_oversell() {
    let desk = desk(&[(1, 3)], 10).await;
    let service = Arc::new(desk.service);

    let handles: Vec<_> = (1..=10)
        .map(|user| {
            let service = service.clone();
            tokio::spawn(async move { service.borrow_book(1, user).await })
        })
        .collect();

    let mut granted = 0;
    for handle in handles {
        match handle.await.unwrap() {
            Ok(_) => granted += 1,
            Err(AppError::Unavailable(_)) => {}
            Err(other) => panic!("unexpected error: {}", other),
        }
    }

    assert_eq!(granted, 3);
    assert_eq!(desk.store.book(1).await.unwrap().available_copies, 0);
    assert_eq!(service.overdue_loans().await.unwrap().len(), 0);
    assert_eq!(desk.clock.now(), service.now());
}

#[tokio::test]
async fn test_reserve_requires_known_user_and_book() {
    let desk = desk(&[(1, 1)], 1).await;

    assert!(matches!(
        desk.service.reserve_book(1, 99).await,
        Err(AppError::NotFound(_))
    ));
    assert!(matches!(
        desk.service.reserve_book(42, 1).await,
        Err(AppError::NotFound(_))
    ));
    assert!(desk.service.pending_reservations().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_concurrent_borrows_and_returns_keep_count_consistent() {
    let desk = desk(&[(1, 5)], 10).await;

    let mut held = Vec::new();
    for user in 1..=5 {
        held.push(desk.service.borrow_book(1, user).await.unwrap().id);
    }

    let service = Arc::new(desk.service);
    let returns: Vec<_> = held
        .into_iter()
        .map(|loan_id| {
            let service = service.clone();
            tokio::spawn(async move { service.return_book(loan_id).await.map(|_| ()) })
        })
        .collect();
    let borrows: Vec<_> = (6..=10)
        .map(|user| {
            let service = service.clone();
            tokio::spawn(async move { service.borrow_book(1, user).await.map(|_| ()) })
        })
        .collect();

    for handle in returns {
        handle.await.unwrap().unwrap();
    }
    let mut granted = 0;
    for handle in borrows {
        match handle.await.unwrap() {
            Ok(()) => granted += 1,
            Err(AppError::Unavailable(_)) => {}
            Err(other) => panic!("unexpected error: {}", other),
        }
    }

    let stock = desk.store.book(1).await.unwrap();
    assert!(stock.available_copies >= 0);
    assert!(stock.available_copies <= stock.total_copies);
    assert_eq!(stock.available_copies, stock.total_copies - granted);
}
