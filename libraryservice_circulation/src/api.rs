use std::fmt;
use std::str::FromStr;

use paperclip::actix::Apiv2Schema;
use serde::{Deserialize, Serialize};

pub type BookId = String;
pub type MemberId = String;
pub type TransactionId = i32;

#[derive(Debug, Default, Clone, Copy, Serialize, Deserialize, Eq, PartialEq, Hash, Apiv2Schema)]
/// Circulation status of a book, independent of its soft-delete flag
pub enum BookStatus {
    #[default]
    Available,
    Borrowed,
}

impl BookStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            BookStatus::Available => "Available",
            BookStatus::Borrowed => "Borrowed",
        }
    }
}

impl fmt::Display for BookStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, thiserror::Error)]
#[error("Unknown book status {0}")]
pub struct UnknownBookStatus(pub String);

impl FromStr for BookStatus {
    type Err = UnknownBookStatus;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "Available" => Ok(BookStatus::Available),
            "Borrowed" => Ok(BookStatus::Borrowed),
            other => Err(UnknownBookStatus(other.to_string())),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Eq, PartialEq, Apiv2Schema)]
/// Book row as stored in the catalog, soft-deleted rows included
pub struct Book {
    pub id: BookId,
    pub title: String,
    pub author: String,
    pub status: BookStatus,
    pub is_deleted: bool,
}

impl Book {
    /// Book is visible and can be lent out
    pub fn is_available(&self) -> bool {
        !self.is_deleted && self.status == BookStatus::Available
    }

    pub fn title_and_id(&self) -> BookTitleAndId {
        BookTitleAndId {
            book_id: self.id.clone(),
            title: self.title.clone(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Eq, PartialEq, Apiv2Schema)]
/// Submitted when registering a book, the id is chosen by staff
pub struct NewBook {
    pub id: BookId,
    pub title: String,
    pub author: String,
    #[serde(default)]
    pub status: BookStatus,
}

#[derive(Debug, Clone, Serialize, Deserialize, Eq, PartialEq, Apiv2Schema)]
/// Fields that overwrite a soft-deleted book when it is restored with new data
pub struct BookDetails {
    pub title: String,
    pub author: String,
    #[serde(default)]
    pub status: BookStatus,
}

#[derive(Debug, Clone, Serialize, Deserialize, Eq, PartialEq, Apiv2Schema)]
pub struct BookEdit {
    pub title: String,
    pub author: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, Eq, PartialEq, Hash, Apiv2Schema)]
/// Struct containing book id and title
pub struct BookTitleAndId {
    pub book_id: BookId,
    pub title: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, Eq, PartialEq, Apiv2Schema)]
pub struct GetAllBooksResponse {
    pub books: Vec<Book>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, Eq, PartialEq, Apiv2Schema)]
#[serde(rename_all = "snake_case")]
pub enum RestoreChoice {
    /// Un-delete the stored row as it is
    KeepOld,
    /// Overwrite the stored row with `new_details` and un-delete it
    UseNew,
}

#[derive(Debug, Clone, Serialize, Deserialize, Eq, PartialEq, Apiv2Schema)]
pub struct RestoreRequest {
    pub choice: RestoreChoice,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub new_details: Option<BookDetails>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Eq, PartialEq, Apiv2Schema)]
/// Returned when a book is added under the id of a soft-deleted book.
/// Nothing is stored until a restore choice is submitted.
pub struct RestorePending {
    pub existing: Book,
}

#[derive(Debug, Clone, Serialize, Deserialize, Eq, PartialEq, Apiv2Schema)]
pub struct Member {
    pub id: MemberId,
    pub name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, Eq, PartialEq, Apiv2Schema)]
/// Borrow record, `return_time` stays empty while the loan is open.
/// Times are unix seconds.
pub struct Transaction {
    pub transaction_id: TransactionId,
    pub book_id: BookId,
    pub member_id: MemberId,
    pub borrow_time: i64,
    pub return_time: Option<i64>,
}

impl Transaction {
    pub fn is_open(&self) -> bool {
        self.return_time.is_none()
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, Eq, PartialEq, Apiv2Schema)]
pub struct BookIdsRequest {
    pub book_ids: Vec<BookId>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, Eq, PartialEq, Apiv2Schema)]
/// Books affected by a borrow or return
pub struct CirculationReceipt {
    pub books: Vec<BookTitleAndId>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, Eq, PartialEq, Apiv2Schema)]
/// Cart contents after revalidation against current availability
pub struct CartView {
    pub items: Vec<BookTitleAndId>,
    /// Titles dropped from the cart because they are no longer available
    pub removed: Vec<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, Eq, PartialEq, Apiv2Schema)]
pub struct CheckoutReceipt {
    pub borrowed: Vec<BookTitleAndId>,
    pub removed: Vec<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, Eq, PartialEq, Apiv2Schema)]
pub struct ErrorMessage {
    pub message: String,
}
