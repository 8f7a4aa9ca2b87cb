//! Repository layer for database operations

pub mod authors;
pub mod books;
pub mod categories;
pub mod circulation;
pub mod memory;
pub mod publishers;
pub mod users;

use sqlx::{Pool, Postgres};

pub use circulation::{CirculationStore, CirculationTx, PgCirculationStore};
pub use memory::MemoryCirculationStore;

/// Main repository struct holding database connection pool
#[derive(Clone)]
pub struct Repository {
    pub pool: Pool<Postgres>,
    pub books: books::BooksRepository,
    pub authors: authors::AuthorsRepository,
    pub publishers: publishers::PublishersRepository,
    pub categories: categories::CategoriesRepository,
    pub users: users::UsersRepository,
    pub circulation: PgCirculationStore,
}

impl Repository {
    /// Create a new repository with the given database pool
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self {
            books: books::BooksRepository::new(pool.clone()),
            authors: authors::AuthorsRepository::new(pool.clone()),
            publishers: publishers::PublishersRepository::new(pool.clone()),
            categories: categories::CategoriesRepository::new(pool.clone()),
            users: users::UsersRepository::new(pool.clone()),
            circulation: PgCirculationStore::new(pool.clone()),
            pool,
        }
    }
}

/// Restricted delete hit a referencing row
pub(crate) fn is_foreign_key_violation(err: &sqlx::Error) -> bool {
    matches!(err, sqlx::Error::Database(db) if db.is_foreign_key_violation())
}
