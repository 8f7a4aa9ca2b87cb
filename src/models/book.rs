//! Book (catalog) model and related types

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::{IntoParams, ToSchema};
use validator::Validate;

use super::{author::AuthorShort, category::Category, publisher::Publisher, MAX_PAGE};

/// Book model from database
#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
pub struct Book {
    pub id: i32,
    pub title: String,
    pub isbn: String,
    pub published_year: i32,
    pub description: Option<String>,
    pub total_copies: i32,
    pub available_copies: i32,
    pub cover_image_url: Option<String>,
    pub category_id: i32,
    pub publisher_id: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: Option<DateTime<Utc>>,
}

/// Book with its category, publisher and authors resolved
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct BookDetails {
    pub book: Book,
    pub category: Category,
    pub publisher: Publisher,
    pub authors: Vec<AuthorShort>,
}

/// Copy counters of a book, as seen by circulation
#[derive(Debug, Clone, Copy, PartialEq, Eq, FromRow)]
pub struct BookStock {
    pub id: i32,
    pub total_copies: i32,
    pub available_copies: i32,
}

/// Availability answer for a book
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct BookAvailability {
    pub book_id: i32,
    pub available: bool,
    pub available_copies: i32,
    pub total_copies: i32,
}

impl From<&Book> for BookAvailability {
    fn from(book: &Book) -> Self {
        Self {
            book_id: book.id,
            available: book.available_copies > 0,
            available_copies: book.available_copies,
            total_copies: book.total_copies,
        }
    }
}

/// Create or replace a book
#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
pub struct BookInput {
    #[validate(length(min = 1, max = 200, message = "Title must be between 1 and 200 characters"))]
    pub title: String,
    #[validate(
        length(min = 1, message = "ISBN is required"),
        custom(function = "crate::validators::validate_isbn")
    )]
    pub isbn: String,
    pub published_year: i32,
    #[validate(length(max = 1000))]
    pub description: Option<String>,
    #[validate(range(min = 1, max = 1000, message = "Total copies must be between 1 and 1000"))]
    pub total_copies: i32,
    #[validate(url(message = "Invalid cover image URL"))]
    pub cover_image_url: Option<String>,
    pub category_id: i32,
    pub publisher_id: i32,
    #[serde(default)]
    pub author_ids: Vec<i32>,
}

/// Sort order for book listings
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum BookSort {
    #[default]
    Title,
    TitleDesc,
    Year,
    YearDesc,
    Category,
}

impl BookSort {
    pub fn order_by(&self) -> &'static str {
        match self {
            BookSort::Title => "b.title ASC, b.id ASC",
            BookSort::TitleDesc => "b.title DESC, b.id ASC",
            BookSort::Year => "b.published_year ASC, b.title ASC",
            BookSort::YearDesc => "b.published_year DESC, b.title ASC",
            BookSort::Category => "c.name ASC, b.title ASC",
        }
    }
}

/// Book query parameters
#[derive(Debug, Default, Deserialize, IntoParams, ToSchema)]
#[into_params(parameter_in = Query)]
pub struct BookQuery {
    /// Matches title, ISBN or description
    pub search: Option<String>,
    pub category_id: Option<i32>,
    pub author_id: Option<i32>,
    pub sort: Option<BookSort>,
    pub page: Option<i64>,
    pub per_page: Option<i64>,
}

impl BookQuery {
    pub fn page(&self) -> i64 {
        self.page.unwrap_or(1).clamp(1, MAX_PAGE)
    }

    pub fn per_page(&self) -> i64 {
        self.per_page.unwrap_or(10).clamp(1, 100)
    }

    /// Rows to skip for the requested page
    pub fn offset(&self) -> i64 {
        (self.page() - 1) * self.per_page()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn input(isbn: &str, copies: i32) -> BookInput {
        BookInput {
            title: "1984".to_string(),
            isbn: isbn.to_string(),
            published_year: 1949,
            description: None,
            total_copies: copies,
            cover_image_url: None,
            category_id: 1,
            publisher_id: 1,
            author_ids: vec![1],
        }
    }

    #[test]
    fn test_book_input_validation() {
        assert!(input("978-0451524935", 3).validate().is_ok());
        assert!(input("1234567890123", 3).validate().is_err());
        assert!(input("", 3).validate().is_err());
        assert!(input("0451524934", 0).validate().is_err());
    }

    #[test]
    fn test_query_paging_bounds() {
        let q = BookQuery {
            page: Some(0),
            per_page: Some(1000),
            ..Default::default()
        };
        assert_eq!(q.page(), 1);
        assert_eq!(q.per_page(), 100);
        assert_eq!(q.offset(), 0);
    }

    #[test]
    fn test_huge_page_is_capped() {
        let q = BookQuery {
            page: Some(200_000_000_000_000_000),
            per_page: Some(100),
            ..Default::default()
        };
        assert_eq!(q.page(), MAX_PAGE);
        assert_eq!(q.offset(), (MAX_PAGE - 1) * 100);

        let q = BookQuery {
            page: Some(i64::MAX),
            per_page: Some(i64::MAX),
            ..Default::default()
        };
        assert!(q.offset() >= 0);
    }
}
