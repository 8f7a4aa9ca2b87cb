//! Publisher model

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;
use validator::Validate;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
pub struct Publisher {
    pub id: i32,
    pub name: String,
    pub address: Option<String>,
    pub phone: Option<String>,
    pub email: Option<String>,
    pub website: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
pub struct PublisherInput {
    #[validate(length(min = 1, max = 200, message = "Publisher name is required"))]
    pub name: String,
    #[validate(length(max = 200))]
    pub address: Option<String>,
    #[validate(length(max = 30))]
    pub phone: Option<String>,
    #[validate(email(message = "Invalid email format"))]
    pub email: Option<String>,
    #[validate(url(message = "Invalid website URL"))]
    pub website: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_publisher_input_validation() {
        let mut input = PublisherInput {
            name: "Penguin Books".to_string(),
            address: None,
            phone: None,
            email: Some("info@penguin.com".to_string()),
            website: Some("https://www.penguin.com".to_string()),
        };
        assert!(input.validate().is_ok());

        input.email = Some("not-an-email".to_string());
        assert!(input.validate().is_err());
    }
}
