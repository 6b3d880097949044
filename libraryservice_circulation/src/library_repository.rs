pub use in_memory_library_repository::InMemoryLibraryRepository;
pub use postgres_library_repository::{
    PostgresLibraryRepository, PostgresLibraryRepositoryConfig,
};

use crate::api::{Book, BookStatus, BookTitleAndId, Member, Transaction, TransactionId};

mod in_memory_library_repository;
mod postgres_library_repository;

#[derive(Debug, thiserror::Error)]
pub enum RepositoryError {
    #[error("Book {0} already stored")]
    DuplicateBook(String),

    #[error("Member {0} already stored")]
    DuplicateMember(String),

    #[error("Stored value is invalid: {0}")]
    InvalidStoredValue(#[from] crate::api::UnknownBookStatus),

    #[error("DatabaseFailure failure {0}")]
    DatabaseFailure(#[from] tokio_postgres::Error),

    #[error("Other error {0}")]
    Other(String),
}

#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub enum BookFilter {
    /// Books that are not soft-deleted
    Active,
    /// Active books with status Available
    Available,
    /// Soft-deleted books only
    Deleted,
}

impl BookFilter {
    pub fn matches(&self, book: &Book) -> bool {
        match self {
            BookFilter::Active => !book.is_deleted,
            BookFilter::Available => book.is_available(),
            BookFilter::Deleted => book.is_deleted,
        }
    }
}

/// Row level access to the `books`, `users` and `transactions` tables.
/// Each call maps to one statement; callers do their own checks before mutating.
#[async_trait::async_trait]
pub trait LibraryRepository: Send + Sync {
    /// Inserts a new book row, fails with `DuplicateBook` if the id is taken (deleted rows included)
    async fn insert_book(&self, book: Book) -> Result<(), RepositoryError>;

    /// Retrieves a book by id, soft-deleted rows included
    async fn get_book(&self, book_id: &str) -> Result<Option<Book>, RepositoryError>;

    /// Lists books matching the filter ordered by id
    async fn list_books(&self, filter: BookFilter) -> Result<Vec<Book>, RepositoryError>;

    /// Updates title and author, returns false if the book was not found
    async fn update_book_details(
        &self,
        book_id: &str,
        title: &str,
        author: &str,
    ) -> Result<bool, RepositoryError>;

    /// Overwrites every column of an existing row, returns false if the book was not found
    async fn replace_book(&self, book: Book) -> Result<bool, RepositoryError>;

    async fn set_book_deleted(&self, book_id: &str, is_deleted: bool)
        -> Result<bool, RepositoryError>;

    async fn set_book_status(&self, book_id: &str, status: BookStatus)
        -> Result<bool, RepositoryError>;

    /// Removes the row permanently, returns false if the book was not found
    async fn delete_book(&self, book_id: &str) -> Result<bool, RepositoryError>;

    /// Inserts a member, fails with `DuplicateMember` if the store already holds the id
    async fn insert_member(&self, member: Member) -> Result<(), RepositoryError>;

    async fn get_member(&self, member_id: &str) -> Result<Option<Member>, RepositoryError>;

    /// Lists members ordered by id
    async fn list_members(&self) -> Result<Vec<Member>, RepositoryError>;

    /// Number of transactions of the book without return time
    async fn count_open_transactions(&self, book_id: &str) -> Result<i64, RepositoryError>;

    /// Records a borrow with empty return time
    async fn open_transaction(
        &self,
        book_id: &str,
        member_id: &str,
        borrow_time: i64,
    ) -> Result<TransactionId, RepositoryError>;

    /// Sets return time on the open transactions of the book held by the member,
    /// returns false if there was none
    async fn close_transaction(
        &self,
        book_id: &str,
        member_id: &str,
        return_time: i64,
    ) -> Result<bool, RepositoryError>;

    /// Books with an open transaction of the member, in borrow order
    async fn list_open_loans(&self, member_id: &str)
        -> Result<Vec<BookTitleAndId>, RepositoryError>;

    /// All transactions of the member, in borrow order
    async fn list_transactions(&self, member_id: &str)
        -> Result<Vec<Transaction>, RepositoryError>;
}
