use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;

use crate::api::{Book, BookTitleAndId, CartView, CheckoutReceipt, MemberId};
use crate::circulation::CirculationLedger;
use crate::error::LibraryError;
use crate::library_repository::{BookFilter, LibraryRepository};

/// Per member selection of books collected before a borrow.
/// Carts live in process memory only and are revalidated whenever they are read.
#[derive(Clone)]
pub struct CartStore {
    carts: Arc<RwLock<HashMap<MemberId, Vec<BookTitleAndId>>>>,
    repository: Arc<dyn LibraryRepository>,
    ledger: CirculationLedger,
}

impl CartStore {
    pub fn new(repository: Arc<dyn LibraryRepository>, ledger: CirculationLedger) -> Self {
        Self {
            carts: Default::default(),
            repository,
            ledger,
        }
    }

    /// Drops entries that are no longer available and reports their titles
    pub async fn view(&self, member_id: &str) -> Result<CartView, LibraryError> {
        self.ensure_member(member_id).await?;
        let snapshot = self.items(member_id);

        let mut removed = Vec::new();
        for item in snapshot {
            let still_available = self
                .repository
                .get_book(&item.book_id)
                .await?
                .map(|book| book.is_available())
                .unwrap_or_default();
            if !still_available {
                tracing::info!(
                    "Book {} removed from cart of member {}",
                    item.book_id,
                    member_id
                );
                removed.push(item);
            }
        }

        let mut carts = self.carts.write();
        let items = match carts.get_mut(member_id) {
            Some(items) => {
                items.retain(|item| !contains_book(&removed, &item.book_id));
                items.clone()
            }
            None => vec![],
        };

        Ok(CartView {
            items,
            removed: removed.into_iter().map(|item| item.title).collect(),
        })
    }

    pub async fn add(&self, member_id: &str, book_id: &str) -> Result<CartView, LibraryError> {
        self.ensure_member(member_id).await?;
        let book = match self.repository.get_book(book_id).await? {
            Some(book) if !book.is_deleted => book,
            _ => return Err(LibraryError::BookNotFound(book_id.to_string())),
        };
        if !book.is_available() {
            return Err(LibraryError::BookUnavailable(book.id));
        }

        let mut carts = self.carts.write();
        let items = carts.entry(member_id.to_string()).or_default();
        if !contains_book(items, &book.id) {
            items.push(book.title_and_id());
        }
        Ok(CartView {
            items: items.clone(),
            removed: vec![],
        })
    }

    pub async fn remove(&self, member_id: &str, book_id: &str) -> Result<CartView, LibraryError> {
        self.ensure_member(member_id).await?;
        let mut carts = self.carts.write();
        let items = match carts.get_mut(member_id) {
            Some(items) => {
                items.retain(|item| item.book_id != book_id);
                items.clone()
            }
            None => vec![],
        };
        Ok(CartView {
            items,
            removed: vec![],
        })
    }

    /// Available books the member has not put in the cart yet
    pub async fn borrowable(&self, member_id: &str) -> Result<Vec<Book>, LibraryError> {
        self.ensure_member(member_id).await?;
        let in_cart = self.items(member_id);
        Ok(self
            .repository
            .list_books(BookFilter::Available)
            .await?
            .into_iter()
            .filter(|book| !contains_book(&in_cart, &book.id))
            .collect())
    }

    /// Borrows every entry still available and empties the cart
    pub async fn checkout(&self, member_id: &str) -> Result<CheckoutReceipt, LibraryError> {
        let view = self.view(member_id).await?;
        if view.items.is_empty() {
            return Err(LibraryError::CartEmpty(member_id.to_string()));
        }

        let book_ids: Vec<_> = view.items.iter().map(|item| item.book_id.clone()).collect();
        let borrowed = self.ledger.borrow_books(member_id, &book_ids).await?;

        // titles in the cart may predate an edit, entries are matched by id
        if let Some(items) = self.carts.write().get_mut(member_id) {
            items.retain(|item| !contains_book(&borrowed, &item.book_id));
        }
        Ok(CheckoutReceipt {
            borrowed,
            removed: view.removed,
        })
    }

    fn items(&self, member_id: &str) -> Vec<BookTitleAndId> {
        self.carts
            .read()
            .get(member_id)
            .cloned()
            .unwrap_or_default()
    }

    async fn ensure_member(&self, member_id: &str) -> Result<(), LibraryError> {
        match self.repository.get_member(member_id).await? {
            Some(_) => Ok(()),
            None => Err(LibraryError::MemberNotFound(member_id.to_string())),
        }
    }
}

fn contains_book(items: &[BookTitleAndId], book_id: &str) -> bool {
    items.iter().any(|item| item.book_id == book_id)
}
