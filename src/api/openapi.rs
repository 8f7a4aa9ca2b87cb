//! OpenAPI documentation

use axum::Router;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use crate::api::{
    authors, books, categories, health, loans, me, publishers, reservations, stats, users,
};

#[derive(OpenApi)]
#[openapi(
    info(
        title = "Bibliotheca API",
        version = "1.0.0",
        description = "Library management REST API: catalog, members, loans and reservations",
        license(name = "AGPL-3.0", url = "https://www.gnu.org/licenses/agpl-3.0.html")
    ),
    servers(
        (url = "/api/v1", description = "API v1")
    ),
    paths(
        // Health
        health::health_check,
        health::readiness_check,
        // Books
        books::list_books,
        books::get_book,
        books::create_book,
        books::update_book,
        books::delete_book,
        books::check_availability,
        books::borrow_book,
        books::reserve_book,
        // Authors
        authors::list_authors,
        authors::get_author,
        authors::create_author,
        authors::update_author,
        authors::delete_author,
        // Publishers
        publishers::list_publishers,
        publishers::get_publisher,
        publishers::create_publisher,
        publishers::update_publisher,
        publishers::delete_publisher,
        // Categories
        categories::list_categories,
        categories::get_category,
        categories::create_category,
        categories::update_category,
        categories::delete_category,
        // Users
        users::list_users,
        users::get_user,
        users::create_user,
        users::update_user,
        users::update_role,
        users::delete_user,
        users::get_user_loans,
        users::get_user_reservations,
        // Current user
        me::get_me,
        me::update_me,
        me::my_loans,
        me::my_reservations,
        // Loans
        loans::list_loans,
        loans::overdue_loans,
        loans::get_loan,
        loans::return_loan,
        // Reservations
        reservations::pending_reservations,
        reservations::get_reservation,
        reservations::cancel_reservation,
        // Stats
        stats::get_stats,
    ),
    components(
        schemas(
            // Catalog
            crate::models::book::Book,
            crate::models::book::BookDetails,
            crate::models::book::BookInput,
            crate::models::book::BookAvailability,
            crate::models::book::BookSort,
            crate::models::author::Author,
            crate::models::author::AuthorShort,
            crate::models::author::AuthorInput,
            crate::models::publisher::Publisher,
            crate::models::publisher::PublisherInput,
            crate::models::category::Category,
            crate::models::category::CategoryInput,
            super::BookPage,
            // Users
            crate::models::user::User,
            crate::models::user::CreateUser,
            crate::models::user::UpdateProfile,
            crate::models::user::UpdateRole,
            crate::models::enums::Role,
            super::UserPage,
            // Circulation
            crate::models::loan::Loan,
            crate::models::loan::LoanDetails,
            crate::models::reservation::Reservation,
            crate::models::reservation::ReservationDetails,
            crate::models::enums::LoanStatus,
            crate::models::enums::ReservationStatus,
            crate::services::circulation::ReturnReceipt,
            loans::LoanQuery,
            // Stats
            crate::services::stats::LibraryStats,
            // Health
            health::HealthResponse,
            // Errors
            crate::error::ErrorResponse,
        )
    ),
    tags(
        (name = "health", description = "Health check endpoints"),
        (name = "books", description = "Book catalog"),
        (name = "catalog", description = "Authors, publishers and categories"),
        (name = "users", description = "User management"),
        (name = "me", description = "Current user"),
        (name = "loans", description = "Loan management"),
        (name = "reservations", description = "Reservation queue"),
        (name = "stats", description = "Statistics")
    )
)]
pub struct ApiDoc;

/// Create the OpenAPI documentation router
pub fn create_openapi_router() -> Router {
    Router::new()
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_document_lists_circulation_paths() {
        let doc = ApiDoc::openapi();
        for path in ["/books/{id}/borrow", "/loans/{id}/return", "/reservations/{id}/cancel"] {
            assert!(doc.paths.paths.contains_key(path), "missing {}", path);
        }
    }
}
