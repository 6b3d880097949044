use std::collections::btree_map::Entry;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicI32, Ordering};

use crate::api::{
    Book, BookId, BookStatus, BookTitleAndId, Member, MemberId, Transaction, TransactionId,
};
use crate::library_repository::{BookFilter, LibraryRepository, RepositoryError};

#[derive(Default)]
pub struct InMemoryLibraryRepository {
    books: parking_lot::RwLock<BTreeMap<BookId, Book>>,
    members: parking_lot::RwLock<BTreeMap<MemberId, Member>>,
    transactions: parking_lot::RwLock<Vec<Transaction>>,
    transaction_sequence_generator: AtomicI32,
}

impl InMemoryLibraryRepository {
    fn modify_book(&self, book_id: &str, modify: impl FnOnce(&mut Book)) -> bool {
        match self.books.write().get_mut(book_id) {
            Some(book) => {
                modify(book);
                true
            }
            None => false,
        }
    }
}

#[async_trait::async_trait]
impl LibraryRepository for InMemoryLibraryRepository {
    async fn insert_book(&self, book: Book) -> Result<(), RepositoryError> {
        match self.books.write().entry(book.id.clone()) {
            Entry::Occupied(_) => Err(RepositoryError::DuplicateBook(book.id)),
            Entry::Vacant(entry) => {
                entry.insert(book);
                Ok(())
            }
        }
    }

    async fn get_book(&self, book_id: &str) -> Result<Option<Book>, RepositoryError> {
        Ok(self.books.read().get(book_id).cloned())
    }

    async fn list_books(&self, filter: BookFilter) -> Result<Vec<Book>, RepositoryError> {
        Ok(self
            .books
            .read()
            .values()
            .filter(|book| filter.matches(book))
            .cloned()
            .collect())
    }

    async fn update_book_details(
        &self,
        book_id: &str,
        title: &str,
        author: &str,
    ) -> Result<bool, RepositoryError> {
        Ok(self.modify_book(book_id, |book| {
            book.title = title.to_string();
            book.author = author.to_string();
        }))
    }

    async fn replace_book(&self, book: Book) -> Result<bool, RepositoryError> {
        let book_id = book.id.clone();
        Ok(self.modify_book(&book_id, |stored| *stored = book))
    }

    async fn set_book_deleted(
        &self,
        book_id: &str,
        is_deleted: bool,
    ) -> Result<bool, RepositoryError> {
        Ok(self.modify_book(book_id, |book| book.is_deleted = is_deleted))
    }

    async fn set_book_status(
        &self,
        book_id: &str,
        status: BookStatus,
    ) -> Result<bool, RepositoryError> {
        Ok(self.modify_book(book_id, |book| book.status = status))
    }

    async fn delete_book(&self, book_id: &str) -> Result<bool, RepositoryError> {
        Ok(self.books.write().remove(book_id).is_some())
    }

    async fn insert_member(&self, member: Member) -> Result<(), RepositoryError> {
        match self.members.write().entry(member.id.clone()) {
            Entry::Occupied(_) => Err(RepositoryError::DuplicateMember(member.id)),
            Entry::Vacant(entry) => {
                entry.insert(member);
                Ok(())
            }
        }
    }

    async fn get_member(&self, member_id: &str) -> Result<Option<Member>, RepositoryError> {
        Ok(self.members.read().get(member_id).cloned())
    }

    async fn list_members(&self) -> Result<Vec<Member>, RepositoryError> {
        Ok(self.members.read().values().cloned().collect())
    }

    async fn count_open_transactions(&self, book_id: &str) -> Result<i64, RepositoryError> {
        Ok(self
            .transactions
            .read()
            .iter()
            .filter(|transaction| transaction.book_id == book_id && transaction.is_open())
            .count() as i64)
    }

    async fn open_transaction(
        &self,
        book_id: &str,
        member_id: &str,
        borrow_time: i64,
    ) -> Result<TransactionId, RepositoryError> {
        let transaction_id = self
            .transaction_sequence_generator
            .fetch_add(1, Ordering::Relaxed)
            + 1;
        self.transactions.write().push(Transaction {
            transaction_id,
            book_id: book_id.to_string(),
            member_id: member_id.to_string(),
            borrow_time,
            return_time: None,
        });
        Ok(transaction_id)
    }

    async fn close_transaction(
        &self,
        book_id: &str,
        member_id: &str,
        return_time: i64,
    ) -> Result<bool, RepositoryError> {
        let mut closed_any = false;
        for transaction in self.transactions.write().iter_mut().filter(|transaction| {
            transaction.book_id == book_id
                && transaction.member_id == member_id
                && transaction.is_open()
        }) {
            transaction.return_time = Some(return_time);
            closed_any = true;
        }
        Ok(closed_any)
    }

    async fn list_open_loans(
        &self,
        member_id: &str,
    ) -> Result<Vec<BookTitleAndId>, RepositoryError> {
        let books = self.books.read();
        Ok(self
            .transactions
            .read()
            .iter()
            .filter(|transaction| transaction.member_id == member_id && transaction.is_open())
            .filter_map(|transaction| books.get(&transaction.book_id))
            .map(Book::title_and_id)
            .collect())
    }

    async fn list_transactions(
        &self,
        member_id: &str,
    ) -> Result<Vec<Transaction>, RepositoryError> {
        Ok(self
            .transactions
            .read()
            .iter()
            .filter(|transaction| transaction.member_id == member_id)
            .cloned()
            .collect())
    }
}
