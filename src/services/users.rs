//! Member registry service

use std::sync::Arc;
use validator::Validate;

use crate::{
    clock::Clock,
    config::UsersConfig,
    error::{AppError, AppResult},
    models::{
        enums::Role,
        user::{CreateUser, UpdateProfile, User, UserQuery},
    },
    repository::Repository,
    validators::{is_not_in_future, meets_minimum_age},
};

#[derive(Clone)]
pub struct UsersService {
    repository: Repository,
    clock: Arc<dyn Clock>,
    config: UsersConfig,
}

impl UsersService {
    pub fn new(repository: Repository, clock: Arc<dyn Clock>, config: UsersConfig) -> Self {
        Self {
            repository,
            clock,
            config,
        }
    }

    pub async fn search_users(&self, query: &UserQuery) -> AppResult<(Vec<User>, i64)> {
        self.repository.users.search(query).await
    }

    pub async fn get_user(&self, id: i32) -> AppResult<User> {
        self.repository.users.get_by_id(id).await
    }

    /// Register a user after field, date and age checks
    pub async fn create_user(&self, mut user: CreateUser) -> AppResult<User> {
        user.validate()?;
        user.email = user.email.trim().to_lowercase();

        let today = self.clock.today();
        if !is_not_in_future(user.date_of_birth, today) {
            return Err(AppError::Validation(
                "Date of birth cannot be in the future".to_string(),
            ));
        }
        if !meets_minimum_age(user.date_of_birth, self.config.minimum_age, today) {
            return Err(AppError::Validation(format!(
                "Users must be at least {} years old",
                self.config.minimum_age
            )));
        }

        if self.repository.users.get_by_email(&user.email).await?.is_some() {
            return Err(AppError::Conflict(
                "A user with this email already exists".to_string(),
            ));
        }

        let created = self.repository.users.create(&user, self.clock.now()).await?;
        tracing::info!(user_id = created.id, role = %created.role, "User registered");
        Ok(created)
    }

    pub async fn update_profile(&self, id: i32, profile: UpdateProfile) -> AppResult<User> {
        profile.validate()?;
        self.repository.users.update_profile(id, &profile).await
    }

    pub async fn update_role(&self, id: i32, role: Role) -> AppResult<User> {
        let user = self.repository.users.update_role(id, role).await?;
        tracing::info!(user_id = id, role = %role, "User role changed");
        Ok(user)
    }

    /// Remove a user who holds no active loans
    pub async fn delete_user(&self, id: i32) -> AppResult<()> {
        self.repository.users.get_by_id(id).await?;

        let active = self.repository.users.count_active_loans(id).await?;
        if active > 0 {
            return Err(AppError::Conflict(format!(
                "User still has {} active loan(s)",
                active
            )));
        }

        self.repository.users.delete(id).await
    }
}
