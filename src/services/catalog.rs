//! Catalog management service: books, authors, publishers, categories

use chrono::Datelike;
use std::sync::Arc;
use validator::Validate;

use crate::{
    clock::Clock,
    error::{AppError, AppResult},
    models::{
        author::{Author, AuthorInput},
        book::{Book, BookAvailability, BookDetails, BookInput, BookQuery},
        category::{Category, CategoryInput},
        publisher::{Publisher, PublisherInput},
    },
    repository::Repository,
    validators::{is_not_in_future, normalize_isbn},
};

/// Earliest publication year accepted for a book
pub const FIRST_PRINT_YEAR: i32 = 1450;

/// Publication year must lie between the first printed books and next year
pub fn check_published_year(year: i32, current_year: i32) -> AppResult<()> {
    if (FIRST_PRINT_YEAR..=current_year + 1).contains(&year) {
        Ok(())
    } else {
        Err(AppError::Validation(format!(
            "Published year must be between {} and {}",
            FIRST_PRINT_YEAR,
            current_year + 1
        )))
    }
}

#[derive(Clone)]
pub struct CatalogService {
    repository: Repository,
    clock: Arc<dyn Clock>,
}

impl CatalogService {
    pub fn new(repository: Repository, clock: Arc<dyn Clock>) -> Self {
        Self { repository, clock }
    }

    // =========================================================================
    // BOOKS
    // =========================================================================

    /// Search books with filters
    pub async fn search_books(&self, query: &BookQuery) -> AppResult<(Vec<Book>, i64)> {
        self.repository.books.search(query).await
    }

    /// Get book with category, publisher and authors
    pub async fn get_book(&self, id: i32) -> AppResult<BookDetails> {
        let book = self.repository.books.get_by_id(id).await?;
        self.details(book).await
    }

    pub async fn create_book(&self, input: BookInput) -> AppResult<BookDetails> {
        let input = self.check_book(input).await?;
        let book = self.repository.books.create(&input, self.clock.now()).await?;
        tracing::info!(book_id = book.id, isbn = %book.isbn, "Book created");
        self.details(book).await
    }

    pub async fn update_book(&self, id: i32, input: BookInput) -> AppResult<BookDetails> {
        let input = self.check_book(input).await?;
        let book = self.repository.books.update(id, &input, self.clock.now()).await?;
        self.details(book).await
    }

    pub async fn delete_book(&self, id: i32) -> AppResult<()> {
        self.repository.books.delete(id).await?;
        tracing::info!(book_id = id, "Book deleted");
        Ok(())
    }

    pub async fn check_availability(&self, id: i32) -> AppResult<BookAvailability> {
        let book = self.repository.books.get_by_id(id).await?;
        Ok(BookAvailability::from(&book))
    }

    async fn details(&self, book: Book) -> AppResult<BookDetails> {
        let category = self.repository.categories.get_by_id(book.category_id).await?;
        let publisher = self.repository.publishers.get_by_id(book.publisher_id).await?;
        let authors = self.repository.books.get_authors(book.id).await?;
        Ok(BookDetails {
            book,
            category,
            publisher,
            authors,
        })
    }

    /// Field rules plus references that must exist; returns the input with a
    /// normalized ISBN and deduplicated author list
    async fn check_book(&self, mut input: BookInput) -> AppResult<BookInput> {
        input.validate()?;
        check_published_year(input.published_year, self.clock.today().year())?;

        if !self.repository.categories.exists(input.category_id).await? {
            return Err(AppError::Validation(format!(
                "Category {} does not exist",
                input.category_id
            )));
        }
        if !self.repository.publishers.exists(input.publisher_id).await? {
            return Err(AppError::Validation(format!(
                "Publisher {} does not exist",
                input.publisher_id
            )));
        }

        input.author_ids.sort_unstable();
        input.author_ids.dedup();
        if !input.author_ids.is_empty() {
            let found = self.repository.authors.count_existing(&input.author_ids).await?;
            if found != input.author_ids.len() as i64 {
                return Err(AppError::Validation("Unknown author in author_ids".to_string()));
            }
        }

        input.isbn = normalize_isbn(&input.isbn);
        if input.isbn.is_empty() {
            return Err(AppError::Validation("ISBN is required".to_string()));
        }
        Ok(input)
    }

    // =========================================================================
    // AUTHORS
    // =========================================================================

    pub async fn list_authors(&self, search: Option<&str>) -> AppResult<Vec<Author>> {
        self.repository.authors.list(search).await
    }

    pub async fn get_author(&self, id: i32) -> AppResult<Author> {
        self.repository.authors.get_by_id(id).await
    }

    pub async fn create_author(&self, input: AuthorInput) -> AppResult<Author> {
        self.check_author(&input)?;
        self.repository.authors.create(&input, self.clock.now()).await
    }

    pub async fn update_author(&self, id: i32, input: AuthorInput) -> AppResult<Author> {
        self.check_author(&input)?;
        self.repository.authors.update(id, &input).await
    }

    pub async fn delete_author(&self, id: i32) -> AppResult<()> {
        self.repository.authors.delete(id).await
    }

    fn check_author(&self, input: &AuthorInput) -> AppResult<()> {
        input.validate()?;
        match input.date_of_birth {
            Some(born) if !is_not_in_future(born, self.clock.today()) => Err(
                AppError::Validation("Date of birth cannot be in the future".to_string()),
            ),
            _ => Ok(()),
        }
    }

    // =========================================================================
    // PUBLISHERS
    // =========================================================================

    pub async fn list_publishers(&self) -> AppResult<Vec<Publisher>> {
        self.repository.publishers.list().await
    }

    pub async fn get_publisher(&self, id: i32) -> AppResult<Publisher> {
        self.repository.publishers.get_by_id(id).await
    }

    pub async fn create_publisher(&self, input: PublisherInput) -> AppResult<Publisher> {
        input.validate()?;
        self.repository.publishers.create(&input, self.clock.now()).await
    }

    pub async fn update_publisher(&self, id: i32, input: PublisherInput) -> AppResult<Publisher> {
        input.validate()?;
        self.repository.publishers.update(id, &input).await
    }

    pub async fn delete_publisher(&self, id: i32) -> AppResult<()> {
        self.repository.publishers.delete(id).await
    }

    // =========================================================================
    // CATEGORIES
    // =========================================================================

    pub async fn list_categories(&self) -> AppResult<Vec<Category>> {
        self.repository.categories.list().await
    }

    pub async fn get_category(&self, id: i32) -> AppResult<Category> {
        self.repository.categories.get_by_id(id).await
    }

    pub async fn create_category(&self, input: CategoryInput) -> AppResult<Category> {
        input.validate()?;
        self.repository.categories.create(&input, self.clock.now()).await
    }

    pub async fn update_category(&self, id: i32, input: CategoryInput) -> AppResult<Category> {
        input.validate()?;
        self.repository.categories.update(id, &input).await
    }

    pub async fn delete_category(&self, id: i32) -> AppResult<()> {
        self.repository.categories.delete(id).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_published_year_bounds() {
        assert!(check_published_year(1450, 2024).is_ok());
        assert!(check_published_year(2025, 2024).is_ok());
        assert!(matches!(
            check_published_year(1449, 2024),
            Err(AppError::Validation(_))
        ));
        assert!(check_published_year(2026, 2024).is_err());
    }
}
