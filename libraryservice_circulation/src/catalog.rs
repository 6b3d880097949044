use std::sync::Arc;

use crate::api::{Book, BookEdit, BookStatus, NewBook, RestoreChoice, RestoreRequest};
use crate::error::{required, LibraryError};
use crate::library_repository::{BookFilter, LibraryRepository, RepositoryError};

#[derive(Debug, Clone, Eq, PartialEq)]
pub enum AddBookOutcome {
    Added(Book),
    /// The id belongs to a soft-deleted book, nothing was stored
    RestorePending(Book),
}

/// Create, edit, soft-delete, restore and purge books
#[derive(Clone)]
pub struct BookCatalog {
    repository: Arc<dyn LibraryRepository>,
}

impl BookCatalog {
    pub fn new(repository: Arc<dyn LibraryRepository>) -> Self {
        Self { repository }
    }

    pub async fn add_book(&self, new_book: NewBook) -> Result<AddBookOutcome, LibraryError> {
        let book = Book {
            id: required("id", &new_book.id)?,
            title: required("title", &new_book.title)?,
            author: required("author", &new_book.author)?,
            status: new_book.status,
            is_deleted: false,
        };
        ensure_no_loan_needed(&book)?;

        match self.repository.get_book(&book.id).await? {
            Some(existing) if existing.is_deleted => {
                tracing::info!("Book {} exists but was deleted, awaiting restore choice", book.id);
                Ok(AddBookOutcome::RestorePending(existing))
            }
            Some(_) => Err(LibraryError::BookAlreadyExists(book.id)),
            None => match self.repository.insert_book(book.clone()).await {
                Ok(()) => {
                    tracing::info!("Book {} added", book.id);
                    Ok(AddBookOutcome::Added(book))
                }
                Err(RepositoryError::DuplicateBook(book_id)) => {
                    Err(LibraryError::BookAlreadyExists(book_id))
                }
                Err(err) => Err(err.into()),
            },
        }
    }

    /// Un-deletes a soft-deleted book, either as stored or overwritten with new details
    pub async fn restore_book(
        &self,
        book_id: &str,
        request: RestoreRequest,
    ) -> Result<Book, LibraryError> {
        let existing = self
            .repository
            .get_book(book_id)
            .await?
            .ok_or_else(|| LibraryError::BookNotFound(book_id.to_string()))?;
        if !existing.is_deleted {
            return Err(LibraryError::NotDeleted(existing.id));
        }

        let restored = match request.choice {
            RestoreChoice::KeepOld => Book {
                is_deleted: false,
                ..existing
            },
            RestoreChoice::UseNew => {
                let details = request
                    .new_details
                    .ok_or(LibraryError::MissingField("new_details"))?;
                let book = Book {
                    title: required("title", &details.title)?,
                    author: required("author", &details.author)?,
                    status: details.status,
                    is_deleted: false,
                    ..existing
                };
                ensure_no_loan_needed(&book)?;
                book
            }
        };

        if !self.repository.replace_book(restored.clone()).await? {
            return Err(LibraryError::BookNotFound(restored.id));
        }
        tracing::info!("Book {} restored with {:?}", restored.id, request.choice);
        Ok(restored)
    }

    pub async fn edit_book(&self, book_id: &str, edit: BookEdit) -> Result<Book, LibraryError> {
        let title = required("title", &edit.title)?;
        let author = required("author", &edit.author)?;
        let book = self.active_book(book_id).await?;
        self.ensure_not_borrowed(&book).await?;

        if !self
            .repository
            .update_book_details(&book.id, &title, &author)
            .await?
        {
            return Err(LibraryError::BookNotFound(book.id));
        }
        Ok(Book {
            title,
            author,
            ..book
        })
    }

    /// Hides the book from listings while preserving its row
    pub async fn soft_delete_book(&self, book_id: &str) -> Result<(), LibraryError> {
        let book = self.active_book(book_id).await?;
        self.ensure_not_borrowed(&book).await?;

        if !self.repository.set_book_deleted(&book.id, true).await? {
            return Err(LibraryError::BookNotFound(book.id));
        }
        tracing::info!("Book {} marked as deleted", book.id);
        Ok(())
    }

    /// Removes the row permanently, closed transactions of the book are kept
    pub async fn purge_book(&self, book_id: &str) -> Result<(), LibraryError> {
        let book = self.get_book(book_id).await?;
        self.ensure_not_borrowed(&book).await?;

        if !self.repository.delete_book(&book.id).await? {
            return Err(LibraryError::BookNotFound(book.id));
        }
        tracing::info!("Book {} purged", book.id);
        Ok(())
    }

    /// Returns the stored row, soft-deleted books included
    pub async fn get_book(&self, book_id: &str) -> Result<Book, LibraryError> {
        self.repository
            .get_book(book_id)
            .await?
            .ok_or_else(|| LibraryError::BookNotFound(book_id.to_string()))
    }

    pub async fn list_books(&self) -> Result<Vec<Book>, LibraryError> {
        Ok(self.repository.list_books(BookFilter::Active).await?)
    }

    pub async fn list_available_books(&self) -> Result<Vec<Book>, LibraryError> {
        Ok(self.repository.list_books(BookFilter::Available).await?)
    }

    pub async fn list_deleted_books(&self) -> Result<Vec<Book>, LibraryError> {
        Ok(self.repository.list_books(BookFilter::Deleted).await?)
    }

    async fn active_book(&self, book_id: &str) -> Result<Book, LibraryError> {
        match self.repository.get_book(book_id).await? {
            Some(book) if !book.is_deleted => Ok(book),
            _ => Err(LibraryError::BookNotFound(book_id.to_string())),
        }
    }

    async fn ensure_not_borrowed(&self, book: &Book) -> Result<(), LibraryError> {
        if self.repository.count_open_transactions(&book.id).await? > 0 {
            tracing::warn!("Book {} has an open transaction", book.id);
            Err(LibraryError::CurrentlyBorrowed(book.id.clone()))
        } else {
            Ok(())
        }
    }
}

/// Borrowed is only ever set by the ledger together with an open transaction
fn ensure_no_loan_needed(book: &Book) -> Result<(), LibraryError> {
    if book.status == BookStatus::Borrowed {
        Err(LibraryError::BorrowedWithoutLoan(book.id.clone()))
    } else {
        Ok(())
    }
}

#[cfg(test)]
mod tests_book_catalog {
    use crate::api::{BookDetails, BookStatus};
    use crate::library_repository::InMemoryLibraryRepository;

    use super::*;

    fn setup() -> (Arc<InMemoryLibraryRepository>, BookCatalog) {
        let repository = Arc::new(InMemoryLibraryRepository::default());
        let catalog = BookCatalog::new(repository.clone());
        (repository, catalog)
    }

    fn new_book(id: &str, title: &str, author: &str) -> NewBook {
        NewBook {
            id: id.to_string(),
            title: title.to_string(),
            author: author.to_string(),
            status: BookStatus::Available,
        }
    }

    #[tokio::test]
    /// Fresh id is stored as Available and not deleted
    /// A second add under the same active id is rejected
    async fn test_add_book_and_get_it() {
        let (_, catalog) = setup();

        let outcome = catalog
            .add_book(new_book(" b1 ", "Dune", "Herbert"))
            .await
            .unwrap();
        let expected = Book {
            id: "b1".to_string(),
            title: "Dune".to_string(),
            author: "Herbert".to_string(),
            status: BookStatus::Available,
            is_deleted: false,
        };
        assert_eq!(outcome, AddBookOutcome::Added(expected.clone()));
        assert_eq!(catalog.get_book("b1").await.unwrap(), expected);

        let duplicate = catalog.add_book(new_book("b1", "Other", "Someone")).await;
        assert!(matches!(
            duplicate,
            Err(LibraryError::BookAlreadyExists(..))
        ));

        let missing_title = catalog.add_book(new_book("b2", " ", "Someone")).await;
        assert!(matches!(
            missing_title,
            Err(LibraryError::MissingField("title"))
        ));
        assert!(matches!(
            catalog.get_book("b2").await,
            Err(LibraryError::BookNotFound(..))
        ));
    }

    #[tokio::test]
    /// Soft delete hides the book from listings but keeps the row
    async fn test_soft_delete_keeps_row() {
        let (_, catalog) = setup();
        catalog
            .add_book(new_book("b1", "Dune", "Herbert"))
            .await
            .unwrap();
        catalog
            .add_book(new_book("b2", "Emma", "Austen"))
            .await
            .unwrap();

        catalog.soft_delete_book("b1").await.unwrap();

        let listed: Vec<_> = catalog
            .list_books()
            .await
            .unwrap()
            .into_iter()
            .map(|book| book.id)
            .collect();
        assert_eq!(listed, vec!["b2".to_string()]);
        assert_eq!(catalog.list_available_books().await.unwrap().len(), 1);

        let preserved = catalog.get_book("b1").await.unwrap();
        assert!(preserved.is_deleted);
        assert_eq!(preserved.title, "Dune");
        assert_eq!(catalog.list_deleted_books().await.unwrap(), vec![preserved]);

        // deleting twice reports the book as gone
        assert!(matches!(
            catalog.soft_delete_book("b1").await,
            Err(LibraryError::BookNotFound(..))
        ));
    }

    #[tokio::test]
    /// Adding a soft-deleted id defers to a restore choice
    /// 1. Keep old data restores the original title and author
    /// 2. Use new data overwrites them
    async fn test_restore_choices() {
        let (_, catalog) = setup();
        catalog
            .add_book(new_book("b1", "Dune", "Herbert"))
            .await
            .unwrap();
        catalog.soft_delete_book("b1").await.unwrap();

        let outcome = catalog
            .add_book(new_book("b1", "Dune Messiah", "F. Herbert"))
            .await
            .unwrap();
        assert!(matches!(outcome, AddBookOutcome::RestorePending(ref existing) if existing.title == "Dune"));
        // nothing stored while the choice is pending
        assert!(catalog.get_book("b1").await.unwrap().is_deleted);

        let restored = catalog
            .restore_book(
                "b1",
                RestoreRequest {
                    choice: RestoreChoice::KeepOld,
                    new_details: None,
                },
            )
            .await
            .unwrap();
        assert_eq!(restored.title, "Dune");
        assert_eq!(restored.author, "Herbert");
        assert!(!restored.is_deleted);
        assert_eq!(catalog.get_book("b1").await.unwrap(), restored);

        assert!(matches!(
            catalog
                .restore_book(
                    "b1",
                    RestoreRequest {
                        choice: RestoreChoice::KeepOld,
                        new_details: None,
                    },
                )
                .await,
            Err(LibraryError::NotDeleted(..))
        ));

        catalog.soft_delete_book("b1").await.unwrap();
        let missing_details = catalog
            .restore_book(
                "b1",
                RestoreRequest {
                    choice: RestoreChoice::UseNew,
                    new_details: None,
                },
            )
            .await;
        assert!(matches!(
            missing_details,
            Err(LibraryError::MissingField("new_details"))
        ));

        let restored = catalog
            .restore_book(
                "b1",
                RestoreRequest {
                    choice: RestoreChoice::UseNew,
                    new_details: Some(BookDetails {
                        title: "Dune Messiah".to_string(),
                        author: "F. Herbert".to_string(),
                        status: BookStatus::Available,
                    }),
                },
            )
            .await
            .unwrap();
        assert_eq!(
            catalog.get_book("b1").await.unwrap(),
            Book {
                id: "b1".to_string(),
                title: "Dune Messiah".to_string(),
                author: "F. Herbert".to_string(),
                status: BookStatus::Available,
                is_deleted: false,
            }
        );
        assert_eq!(restored.title, "Dune Messiah");

        assert!(matches!(
            catalog
                .restore_book(
                    "unknown",
                    RestoreRequest {
                        choice: RestoreChoice::KeepOld,
                        new_details: None,
                    },
                )
                .await,
            Err(LibraryError::BookNotFound(..))
        ));
    }

    #[tokio::test]
    /// Edit, soft delete and purge are rejected while a transaction is open
    async fn test_borrowed_book_is_locked() {
        let (repository, catalog) = setup();
        catalog
            .add_book(new_book("b1", "Dune", "Herbert"))
            .await
            .unwrap();
        repository.open_transaction("b1", "m1", 10).await.unwrap();

        let edit = BookEdit {
            title: "New".to_string(),
            author: "New".to_string(),
        };
        assert!(matches!(
            catalog.edit_book("b1", edit.clone()).await,
            Err(LibraryError::CurrentlyBorrowed(..))
        ));
        assert!(matches!(
            catalog.soft_delete_book("b1").await,
            Err(LibraryError::CurrentlyBorrowed(..))
        ));
        assert!(matches!(
            catalog.purge_book("b1").await,
            Err(LibraryError::CurrentlyBorrowed(..))
        ));
        assert_eq!(catalog.get_book("b1").await.unwrap().title, "Dune");

        repository.close_transaction("b1", "m1", 20).await.unwrap();

        let edited = catalog.edit_book("b1", edit).await.unwrap();
        assert_eq!(edited.title, "New");
        assert_eq!(catalog.get_book("b1").await.unwrap(), edited);

        catalog.purge_book("b1").await.unwrap();
        assert!(matches!(
            catalog.get_book("b1").await,
            Err(LibraryError::BookNotFound(..))
        ));
    }

    #[tokio::test]
    async fn test_edit_rejects_deleted_and_blank() {
        let (_, catalog) = setup();
        catalog
            .add_book(new_book("b1", "Dune", "Herbert"))
            .await
            .unwrap();

        let blank = BookEdit {
            title: "Dune".to_string(),
            author: "".to_string(),
        };
        assert!(matches!(
            catalog.edit_book("b1", blank).await,
            Err(LibraryError::MissingField("author"))
        ));

        catalog.soft_delete_book("b1").await.unwrap();
        let edit = BookEdit {
            title: "New".to_string(),
            author: "New".to_string(),
        };
        assert!(matches!(
            catalog.edit_book("b1", edit).await,
            Err(LibraryError::BookNotFound(..))
        ));
    }

    #[tokio::test]
    /// 1. A new book cannot start out as borrowed
    /// 2. Restoring with new data cannot mark the book as borrowed either
    /// 3. The rejected restore leaves the row deleted and borrowable after a plain restore
    async fn test_borrowed_status_requires_loan() {
        let (repository, catalog) = setup();

        let mut borrowed = new_book("b1", "Dune", "Herbert");
        borrowed.status = BookStatus::Borrowed;
        assert!(matches!(
            catalog.add_book(borrowed).await,
            Err(LibraryError::BorrowedWithoutLoan(..))
        ));
        assert!(matches!(
            catalog.get_book("b1").await,
            Err(LibraryError::BookNotFound(..))
        ));

        catalog
            .add_book(new_book("b1", "Dune", "Herbert"))
            .await
            .unwrap();
        catalog.soft_delete_book("b1").await.unwrap();
        assert!(matches!(
            catalog
                .restore_book(
                    "b1",
                    RestoreRequest {
                        choice: RestoreChoice::UseNew,
                        new_details: Some(BookDetails {
                            title: "Dune".to_string(),
                            author: "Herbert".to_string(),
                            status: BookStatus::Borrowed,
                        }),
                    },
                )
                .await,
            Err(LibraryError::BorrowedWithoutLoan(..))
        ));
        assert!(catalog.get_book("b1").await.unwrap().is_deleted);

        let restored = catalog
            .restore_book(
                "b1",
                RestoreRequest {
                    choice: RestoreChoice::KeepOld,
                    new_details: None,
                },
            )
            .await
            .unwrap();
        assert_eq!(restored.status, BookStatus::Available);
        assert_eq!(repository.count_open_transactions("b1").await.unwrap(), 0);
    }
}
