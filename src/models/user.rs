//! User model, access claims and related types

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::{IntoParams, ToSchema};
use validator::Validate;

use super::{enums::Role, MAX_PAGE};
use crate::error::AppError;

/// User model from database
#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
pub struct User {
    pub id: i32,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub address: Option<String>,
    pub phone: Option<String>,
    pub date_of_birth: NaiveDate,
    pub role: Role,
    pub created_at: DateTime<Utc>,
}

/// User query parameters
#[derive(Debug, Default, Deserialize, IntoParams, ToSchema)]
#[into_params(parameter_in = Query)]
pub struct UserQuery {
    /// Matches first name, last name or email
    pub search: Option<String>,
    pub page: Option<i64>,
    pub per_page: Option<i64>,
}

impl UserQuery {
    pub fn page(&self) -> i64 {
        self.page.unwrap_or(1).clamp(1, MAX_PAGE)
    }

    pub fn per_page(&self) -> i64 {
        self.per_page.unwrap_or(20).clamp(1, 100)
    }

    /// Rows to skip for the requested page
    pub fn offset(&self) -> i64 {
        (self.page() - 1) * self.per_page()
    }
}

/// Register a user (staff operation)
#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
pub struct CreateUser {
    #[validate(email(message = "Invalid email format"))]
    pub email: String,
    #[validate(length(min = 1, max = 100, message = "First name is required"))]
    pub first_name: String,
    #[validate(length(min = 1, max = 100, message = "Last name is required"))]
    pub last_name: String,
    #[validate(length(max = 200))]
    pub address: Option<String>,
    #[validate(length(max = 30))]
    pub phone: Option<String>,
    pub date_of_birth: NaiveDate,
    pub role: Option<Role>,
}

/// Profile fields a user may change
#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
pub struct UpdateProfile {
    #[validate(length(min = 1, max = 100))]
    pub first_name: Option<String>,
    #[validate(length(min = 1, max = 100))]
    pub last_name: Option<String>,
    #[validate(length(max = 200))]
    pub address: Option<String>,
    #[validate(length(max = 30))]
    pub phone: Option<String>,
}

/// Update role request (admin only)
#[derive(Debug, Deserialize, ToSchema)]
pub struct UpdateRole {
    pub role: Role,
}

/// JWT claims issued by the identity provider
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserClaims {
    pub sub: String,
    pub user_id: i32,
    pub role: Role,
    pub exp: i64,
    pub iat: i64,
}

impl UserClaims {
    /// Encode claims into a JWT token
    pub fn create_token(&self, secret: &str) -> Result<String, jsonwebtoken::errors::Error> {
        use jsonwebtoken::{encode, EncodingKey, Header};
        encode(
            &Header::default(),
            self,
            &EncodingKey::from_secret(secret.as_bytes()),
        )
    }

    /// Parse JWT token
    pub fn from_token(token: &str, secret: &str) -> Result<Self, jsonwebtoken::errors::Error> {
        use jsonwebtoken::{decode, DecodingKey, Validation};
        let token_data = decode::<Self>(
            token,
            &DecodingKey::from_secret(secret.as_bytes()),
            &Validation::default(),
        )?;
        Ok(token_data.claims)
    }

    // Authorization checks

    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }

    pub fn is_staff(&self) -> bool {
        self.role.is_staff()
    }

    /// Require admin privileges
    pub fn require_admin(&self) -> Result<(), AppError> {
        if self.is_admin() {
            Ok(())
        } else {
            Err(AppError::Authorization("Administrator privileges required".to_string()))
        }
    }

    /// Require admin or librarian
    pub fn require_staff(&self) -> Result<(), AppError> {
        if self.is_staff() {
            Ok(())
        } else {
            Err(AppError::Authorization("Librarian privileges required".to_string()))
        }
    }

    /// Admins may read any account, everyone else only their own
    pub fn require_self_or_admin(&self, user_id: i32) -> Result<(), AppError> {
        if self.is_admin() || self.user_id == user_id {
            Ok(())
        } else {
            Err(AppError::Authorization("Insufficient rights to read this user".to_string()))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn claims(role: Role) -> UserClaims {
        let now = Utc::now().timestamp();
        UserClaims {
            sub: "reader@library.local".to_string(),
            user_id: 7,
            role,
            exp: now + 3600,
            iat: now,
        }
    }

    #[test]
    fn test_token_roundtrip_keeps_role() {
        let token = claims(Role::Librarian).create_token("secret").unwrap();
        let decoded = UserClaims::from_token(&token, "secret").unwrap();
        assert_eq!(decoded.role, Role::Librarian);
        assert_eq!(decoded.user_id, 7);
        assert!(UserClaims::from_token(&token, "other").is_err());
    }

    #[test]
    fn test_role_checks() {
        let member = claims(Role::Member);
        assert!(member.require_staff().is_err());
        assert!(member.require_admin().is_err());
        assert!(member.require_self_or_admin(7).is_ok());
        assert!(member.require_self_or_admin(8).is_err());

        let librarian = claims(Role::Librarian);
        assert!(librarian.require_staff().is_ok());
        assert!(librarian.require_admin().is_err());

        let admin = claims(Role::Admin);
        assert!(admin.require_self_or_admin(8).is_ok());
    }

    #[test]
    fn test_user_query_paging_bounds() {
        let q = UserQuery {
            search: None,
            page: Some(200_000_000_000_000_000),
            per_page: Some(100),
        };
        assert_eq!(q.page(), MAX_PAGE);
        assert_eq!(q.offset(), (MAX_PAGE - 1) * 100);

        let q = UserQuery {
            search: None,
            page: Some(-3),
            per_page: None,
        };
        assert_eq!(q.page(), 1);
        assert_eq!(q.per_page(), 20);
        assert_eq!(q.offset(), 0);
    }
}
