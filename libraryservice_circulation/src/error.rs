use crate::api::{BookId, MemberId};
use crate::library_repository::RepositoryError;

#[derive(Debug, thiserror::Error)]
pub enum LibraryError {
    #[error("Please fill in the {0} field")]
    MissingField(&'static str),

    #[error("A book with id {0} already exists and is active, please use a different id")]
    BookAlreadyExists(BookId),

    #[error("Book {0} not found")]
    BookNotFound(BookId),

    #[error("Book {0} is not deleted")]
    NotDeleted(BookId),

    #[error("Book {0} is currently borrowed")]
    CurrentlyBorrowed(BookId),

    #[error("Book {0} is no longer available")]
    BookUnavailable(BookId),

    #[error("Book {0} cannot be marked as borrowed without a loan, please use the borrow page")]
    BorrowedWithoutLoan(BookId),

    #[error("Member {0} not found")]
    MemberNotFound(MemberId),

    #[error("Member {0} already exists")]
    MemberAlreadyExists(MemberId),

    #[error("Book {book_id} is not borrowed by member {member_id}")]
    NotBorrowedByMember { book_id: BookId, member_id: MemberId },

    #[error("No books selected")]
    EmptySelection,

    #[error("Cart of member {0} is empty")]
    CartEmpty(MemberId),

    #[error("Storage failure {0}")]
    Storage(#[from] RepositoryError),
}

impl LibraryError {
    /// Validation failures caught before any mutation, as opposed to storage failures
    pub fn is_warning(&self) -> bool {
        !matches!(self, LibraryError::Storage(_))
    }
}

/// Trims a submitted form value, rejecting blank input
pub(crate) fn required(field: &'static str, value: &str) -> Result<String, LibraryError> {
    let value = value.trim();
    if value.is_empty() {
        Err(LibraryError::MissingField(field))
    } else {
        Ok(value.to_string())
    }
}

#[cfg(test)]
mod tests_error {
    use super::*;

    #[test]
    fn test_required_trims_and_rejects_blank() {
        assert_eq!(required("title", "  Dune ").unwrap(), "Dune");
        assert!(matches!(
            required("title", "   "),
            Err(LibraryError::MissingField("title"))
        ));
        assert!(LibraryError::EmptySelection.is_warning());
        assert!(!LibraryError::Storage(RepositoryError::Other("x".to_string())).is_warning());
    }
}
