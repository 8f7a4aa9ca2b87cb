//! Notices sent to readers when circulation events concern them

use async_trait::async_trait;

use super::email::EmailService;
use crate::{error::AppResult, models::reservation::Reservation, repository::Repository};

/// Receives reservation events after they are committed.
///
/// Delivery failures are reported back to the caller, which logs them; they
/// never undo the committed change.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Notifier: Send + Sync {
    /// The reservation has been fulfilled and a copy is held for pickup
    async fn reservation_ready(&self, reservation: &Reservation) -> AppResult<()>;
}

/// Writes notices to the log only
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingNotifier;

#[async_trait]
impl Notifier for TracingNotifier {
    async fn reservation_ready(&self, reservation: &Reservation) -> AppResult<()> {
        tracing::info!(
            reservation_id = reservation.id,
            book_id = reservation.book_id,
            user_id = reservation.user_id,
            pickup_until = %reservation.expiry_date,
            "Reservation ready for pickup"
        );
        Ok(())
    }
}

/// Mails the reader, resolving address and title from the catalog
#[derive(Clone)]
pub struct EmailNotifier {
    email: EmailService,
    repository: Repository,
}

impl EmailNotifier {
    pub fn new(email: EmailService, repository: Repository) -> Self {
        Self { email, repository }
    }
}

#[async_trait]
impl Notifier for EmailNotifier {
    async fn reservation_ready(&self, reservation: &Reservation) -> AppResult<()> {
        let user = self.repository.users.get_by_id(reservation.user_id).await?;
        let book = self.repository.books.get_by_id(reservation.book_id).await?;

        self.email
            .send_reservation_ready(
                &user.email,
                &user.first_name,
                &book.title,
                reservation.expiry_date,
            )
            .await?;

        tracing::info!(
            reservation_id = reservation.id,
            to = %user.email,
            "Reservation notice mailed"
        );
        Ok(())
    }
}
