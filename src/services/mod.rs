//! Business logic services

pub mod catalog;
pub mod circulation;
pub mod email;
pub mod notifier;
pub mod stats;
pub mod users;

use std::sync::Arc;

use crate::{clock::Clock, config::AppConfig, error::AppResult, repository::Repository};

use circulation::CirculationPolicy;
use notifier::{EmailNotifier, Notifier, TracingNotifier};

/// Container for all services
#[derive(Clone)]
pub struct Services {
    pub catalog: catalog::CatalogService,
    pub users: users::UsersService,
    pub circulation: circulation::CirculationService,
    pub stats: stats::StatsService,
    repository: Repository,
}

impl Services {
    /// Create all services with the given repository
    pub fn new(repository: Repository, config: &AppConfig, clock: Arc<dyn Clock>) -> Self {
        let notifier: Arc<dyn Notifier> = if config.email.enabled {
            Arc::new(EmailNotifier::new(
                email::EmailService::new(config.email.clone()),
                repository.clone(),
            ))
        } else {
            Arc::new(TracingNotifier)
        };

        Self {
            catalog: catalog::CatalogService::new(repository.clone(), clock.clone()),
            users: users::UsersService::new(repository.clone(), clock.clone(), config.users.clone()),
            circulation: circulation::CirculationService::new(
                Arc::new(repository.circulation.clone()),
                clock.clone(),
                notifier,
                CirculationPolicy::from(&config.circulation),
            ),
            stats: stats::StatsService::new(repository.clone(), clock),
            repository,
        }
    }

    /// Round-trip to the database
    pub async fn check_database(&self) -> AppResult<()> {
        sqlx::query("SELECT 1").execute(&self.repository.pool).await?;
        Ok(())
    }
}
