//! Data models for Bibliotheca

pub mod author;
pub mod book;
pub mod category;
pub mod enums;
pub mod loan;
pub mod publisher;
pub mod reservation;
pub mod user;

/// Highest page number a listing accepts
pub const MAX_PAGE: i64 = 1_000_000;

// Re-export commonly used types
pub use author::{Author, AuthorShort};
pub use book::{Book, BookDetails, BookStock};
pub use category::Category;
pub use enums::{LoanStatus, ReservationStatus, Role};
pub use loan::{Loan, LoanDetails};
pub use publisher::Publisher;
pub use reservation::{Reservation, ReservationDetails};
pub use user::{User, UserClaims};
