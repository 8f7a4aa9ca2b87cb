//! Reservation model and related types

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;

use super::enums::ReservationStatus;

/// Reservation model from database
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow, ToSchema)]
pub struct Reservation {
    pub id: i32,
    pub book_id: i32,
    pub user_id: i32,
    pub reservation_date: DateTime<Utc>,
    /// Queue deadline while pending, pickup deadline once fulfilled
    pub expiry_date: DateTime<Utc>,
    pub status: ReservationStatus,
    pub notes: Option<String>,
}

impl Reservation {
    /// Still open (pending or awaiting pickup) but past its expiry date
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        matches!(
            self.status,
            ReservationStatus::Pending | ReservationStatus::Fulfilled
        ) && now > self.expiry_date
    }
}

/// Reservation as shown to clients
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct ReservationDetails {
    #[serde(flatten)]
    pub reservation: Reservation,
    pub is_expired: bool,
}

impl ReservationDetails {
    pub fn new(reservation: Reservation, now: DateTime<Utc>) -> Self {
        Self {
            is_expired: reservation.is_expired(now),
            reservation,
        }
    }
}

#[derive(Debug, Clone)]
pub struct NewReservation {
    pub book_id: i32,
    pub user_id: i32,
    pub reservation_date: DateTime<Utc>,
    pub expiry_date: DateTime<Utc>,
}

/// Selection criteria for reservation listings
#[derive(Debug, Clone, Default)]
pub struct ReservationFilter {
    pub user_id: Option<i32>,
    pub book_id: Option<i32>,
    pub status: Option<ReservationStatus>,
}

impl ReservationFilter {
    pub fn matches(&self, reservation: &Reservation) -> bool {
        self.user_id.map_or(true, |id| reservation.user_id == id)
            && self.book_id.map_or(true, |id| reservation.book_id == id)
            && self.status.map_or(true, |s| reservation.status == s)
    }
}
