use std::sync::Arc;
use std::time::UNIX_EPOCH;

use itertools::Itertools;

use crate::api::{Book, BookId, BookStatus, BookTitleAndId, Member, Transaction};
use crate::error::LibraryError;
use crate::library_repository::LibraryRepository;

fn unix_now() -> i64 {
    std::time::SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|elapsed| elapsed.as_secs() as i64)
        .unwrap_or_default()
}

/// Trimmed, de-duplicated selection in submission order
fn selection(book_ids: &[BookId]) -> Result<Vec<BookId>, LibraryError> {
    let book_ids: Vec<BookId> = book_ids
        .iter()
        .map(|book_id| book_id.trim().to_string())
        .filter(|book_id| !book_id.is_empty())
        .unique()
        .collect();
    if book_ids.is_empty() {
        Err(LibraryError::EmptySelection)
    } else {
        Ok(book_ids)
    }
}

/// Borrow and return bookkeeping over the `transactions` table
#[derive(Clone)]
pub struct CirculationLedger {
    repository: Arc<dyn LibraryRepository>,
}

impl CirculationLedger {
    pub fn new(repository: Arc<dyn LibraryRepository>) -> Self {
        Self { repository }
    }

    /// Opens a transaction per book and marks it Borrowed.
    /// The whole selection is checked first, nothing is written if any book cannot be lent.
    pub async fn borrow_books(
        &self,
        member_id: &str,
        book_ids: &[BookId],
    ) -> Result<Vec<BookTitleAndId>, LibraryError> {
        let member = self.member(member_id).await?;
        let book_ids = selection(book_ids)?;

        let mut books: Vec<Book> = Vec::with_capacity(book_ids.len());
        for book_id in book_ids {
            let book = match self.repository.get_book(&book_id).await? {
                Some(book) if !book.is_deleted => book,
                _ => return Err(LibraryError::BookNotFound(book_id)),
            };
            if book.status != BookStatus::Available {
                return Err(LibraryError::BookUnavailable(book.id));
            }
            books.push(book);
        }

        let borrow_time = unix_now();
        for book in &books {
            self.repository
                .open_transaction(&book.id, &member.id, borrow_time)
                .await?;
            self.repository
                .set_book_status(&book.id, BookStatus::Borrowed)
                .await?;
        }

        let borrowed: Vec<BookTitleAndId> = books.iter().map(Book::title_and_id).collect();
        tracing::info!(
            "Member {} borrowed {}",
            member.id,
            borrowed.iter().map(|book| &book.title).join(", ")
        );
        Ok(borrowed)
    }

    /// Closes the open transactions of the member for the given books and marks them Available
    pub async fn return_books(
        &self,
        member_id: &str,
        book_ids: &[BookId],
    ) -> Result<Vec<BookTitleAndId>, LibraryError> {
        let member = self.member(member_id).await?;
        let book_ids = selection(book_ids)?;

        let open_loans = self.repository.list_open_loans(&member.id).await?;
        let mut returned = Vec::with_capacity(book_ids.len());
        for book_id in book_ids {
            match open_loans.iter().find(|loan| loan.book_id == book_id) {
                Some(loan) => returned.push(loan.clone()),
                None => {
                    return Err(LibraryError::NotBorrowedByMember {
                        book_id,
                        member_id: member.id,
                    })
                }
            }
        }

        let return_time = unix_now();
        for book in &returned {
            self.repository
                .close_transaction(&book.book_id, &member.id, return_time)
                .await?;
            self.repository
                .set_book_status(&book.book_id, BookStatus::Available)
                .await?;
        }

        tracing::info!("Member {} returned {} book(s)", member.id, returned.len());
        Ok(returned)
    }

    /// Books the member currently holds
    pub async fn open_loans(&self, member_id: &str) -> Result<Vec<BookTitleAndId>, LibraryError> {
        let member = self.member(member_id).await?;
        Ok(self.repository.list_open_loans(&member.id).await?)
    }

    pub async fn history(&self, member_id: &str) -> Result<Vec<Transaction>, LibraryError> {
        let member = self.member(member_id).await?;
        Ok(self.repository.list_transactions(&member.id).await?)
    }

    async fn member(&self, member_id: &str) -> Result<Member, LibraryError> {
        self.repository
            .get_member(member_id)
            .await?
            .ok_or_else(|| LibraryError::MemberNotFound(member_id.to_string()))
    }
}
