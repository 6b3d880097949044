use anyhow::{bail, Context};
use reqwest::header::LOCATION;
use reqwest::{Response, StatusCode};
use reqwest_middleware::{ClientBuilder, ClientWithMiddleware};
use reqwest_retry::policies::ExponentialBackoff;
use reqwest_retry::RetryTransientMiddleware;
use reqwest_tracing::TracingMiddleware;

use crate::api::{
    Book, BookEdit, BookId, BookIdsRequest, BookTitleAndId, CartView, CheckoutReceipt,
    CirculationReceipt, ErrorMessage, GetAllBooksResponse, Member, NewBook, RestorePending,
    RestoreRequest, Transaction,
};

/// Result of POST /api/book
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AddBookResponse {
    Added(BookId),
    /// A soft deleted book already uses the id, it has to be restored instead
    RestorePending(Book),
    /// An active book already uses the id
    AlreadyExists(String),
}

pub struct LibraryServiceClient {
    url: String,
    client: ClientWithMiddleware,
    /// Used for reads only, writes are never replayed
    retrying_client: ClientWithMiddleware,
}

impl LibraryServiceClient {
    pub fn new(url: &str) -> anyhow::Result<Self> {
        let reqwest_client = reqwest::Client::builder()
            .build()
            .context("Failed to build reqwest client")?;
        let client = ClientBuilder::new(reqwest_client.clone())
            .with(TracingMiddleware::default())
            .build();
        let retry_policy = ExponentialBackoff::builder().build_with_max_retries(3);
        let retrying_client = ClientBuilder::new(reqwest_client)
            .with(TracingMiddleware::default())
            .with(RetryTransientMiddleware::new_with_policy(retry_policy))
            .build();

        Ok(Self {
            url: url.to_string(),
            client,
            retrying_client,
        })
    }

    /// Calls GET /health endpoint
    pub async fn health(&self) -> anyhow::Result<bool> {
        let response = self
            .retrying_client
            .get(format!("{}/health", self.url))
            .send()
            .await?;
        Ok(response.status().is_success())
    }

    /// Calls POST /api/book endpoint
    pub async fn add_book(&self, new_book: NewBook) -> anyhow::Result<AddBookResponse> {
        let response = self
            .client
            .post(format!("{}/api/book", self.url))
            .json(&new_book)
            .send()
            .await?;

        match response.status() {
            StatusCode::ACCEPTED => {
                let pending: RestorePending = response.json().await?;
                Ok(AddBookResponse::RestorePending(pending.existing))
            }
            StatusCode::CONFLICT => Ok(AddBookResponse::AlreadyExists(
                error_message(response).await,
            )),
            status if status.is_success() => {
                let book_id = response
                    .headers()
                    .get(LOCATION)
                    .context("No location header")?
                    .to_str()
                    .context("Failed to convert header to str")?
                    .strip_prefix("/api/book/")
                    .context("Invalid location header")?
                    .to_string();
                Ok(AddBookResponse::Added(book_id))
            }
            _ => bail!("Failed to add book {}", error_message(response).await),
        }
    }

    /// Calls GET /api/book/{book_id} endpoint
    /// Returns None if the book is not in the repository, soft deleted books included
    pub async fn get_book(&self, book_id: &str) -> anyhow::Result<Option<Book>> {
        let response = self
            .retrying_client
            .get(format!("{}/api/book/{}", self.url, book_id))
            .send()
            .await?;
        if response.status() == StatusCode::NOT_FOUND {
            Ok(None)
        } else if response.status().is_success() {
            Ok(Some(response.json().await?))
        } else {
            bail!("Failed to get book {}", error_message(response).await)
        }
    }

    /// Calls GET /api/books endpoint
    pub async fn list_books(&self) -> anyhow::Result<Vec<Book>> {
        self.list::<GetAllBooksResponse>("/api/books").await
    }

    /// Calls GET /api/books/available endpoint
    pub async fn list_available_books(&self) -> anyhow::Result<Vec<Book>> {
        self.list::<GetAllBooksResponse>("/api/books/available")
            .await
    }

    /// Calls GET /api/books/deleted endpoint
    pub async fn list_deleted_books(&self) -> anyhow::Result<Vec<Book>> {
        self.list::<GetAllBooksResponse>("/api/books/deleted")
            .await
    }

    /// Calls PATCH /api/book/{book_id} endpoint
    /// Returns false if the book is currently borrowed
    pub async fn edit_book(&self, book_id: &str, edit: BookEdit) -> anyhow::Result<bool> {
        let response = self
            .client
            .patch(format!("{}/api/book/{}", self.url, book_id))
            .json(&edit)
            .send()
            .await?;
        conflict_as_false(response, "edit book").await
    }

    /// Calls DELETE /api/book/{book_id} endpoint
    /// Returns false if the book is currently borrowed
    pub async fn delete_book(&self, book_id: &str) -> anyhow::Result<bool> {
        let response = self
            .client
            .delete(format!("{}/api/book/{}", self.url, book_id))
            .send()
            .await?;
        conflict_as_false(response, "delete book").await
    }

    /// Calls DELETE /api/book/{book_id}/purge endpoint
    /// Returns false if the book is currently borrowed
    pub async fn purge_book(&self, book_id: &str) -> anyhow::Result<bool> {
        let response = self
            .client
            .delete(format!("{}/api/book/{}/purge", self.url, book_id))
            .send()
            .await?;
        conflict_as_false(response, "purge book").await
    }

    /// Calls POST /api/book/{book_id}/restore endpoint
    pub async fn restore_book(
        &self,
        book_id: &str,
        request: RestoreRequest,
    ) -> anyhow::Result<Book> {
        let response = self
            .client
            .post(format!("{}/api/book/{}/restore", self.url, book_id))
            .json(&request)
            .send()
            .await?;
        if response.status().is_success() {
            Ok(response.json().await?)
        } else {
            bail!("Failed to restore book {}", error_message(response).await)
        }
    }

    /// Calls POST /api/member endpoint
    /// Returns false if the member id is already taken
    pub async fn add_member(&self, member: Member) -> anyhow::Result<bool> {
        let response = self
            .client
            .post(format!("{}/api/member", self.url))
            .json(&member)
            .send()
            .await?;
        conflict_as_false(response, "add member").await
    }

    /// Calls GET /api/member/{member_id} endpoint
    pub async fn get_member(&self, member_id: &str) -> anyhow::Result<Option<Member>> {
        let response = self
            .retrying_client
            .get(format!("{}/api/member/{}", self.url, member_id))
            .send()
            .await?;
        if response.status() == StatusCode::NOT_FOUND {
            Ok(None)
        } else if response.status().is_success() {
            Ok(Some(response.json().await?))
        } else {
            bail!("Failed to get member {}", error_message(response).await)
        }
    }

    /// Calls GET /api/members endpoint
    pub async fn list_members(&self) -> anyhow::Result<Vec<Member>> {
        self.list::<Vec<Member>>("/api/members").await
    }

    /// Calls POST /api/member/{member_id}/borrow endpoint
    /// Returns None if any of the selected books could not be borrowed
    pub async fn borrow_books(
        &self,
        member_id: &str,
        book_ids: Vec<BookId>,
    ) -> anyhow::Result<Option<Vec<BookTitleAndId>>> {
        self.circulate(member_id, "borrow", book_ids).await
    }

    /// Calls POST /api/member/{member_id}/return endpoint
    /// Returns None if any of the selected books is not borrowed by the member
    pub async fn return_books(
        &self,
        member_id: &str,
        book_ids: Vec<BookId>,
    ) -> anyhow::Result<Option<Vec<BookTitleAndId>>> {
        self.circulate(member_id, "return", book_ids).await
    }

    /// Calls GET /api/member/{member_id}/loans endpoint
    pub async fn open_loans(&self, member_id: &str) -> anyhow::Result<Vec<BookTitleAndId>> {
        self.list::<Vec<BookTitleAndId>>(&format!("/api/member/{}/loans", member_id))
            .await
    }

    /// Calls GET /api/member/{member_id}/history endpoint
    pub async fn history(&self, member_id: &str) -> anyhow::Result<Vec<Transaction>> {
        self.list::<Vec<Transaction>>(&format!("/api/member/{}/history", member_id))
            .await
    }

    /// Calls GET /api/member/{member_id}/cart endpoint
    pub async fn view_cart(&self, member_id: &str) -> anyhow::Result<CartView> {
        self.list::<CartView>(&format!("/api/member/{}/cart", member_id))
            .await
    }

    /// Calls POST /api/member/{member_id}/cart/{book_id} endpoint
    /// Returns None if the book cannot be borrowed right now
    pub async fn add_to_cart(
        &self,
        member_id: &str,
        book_id: &str,
    ) -> anyhow::Result<Option<CartView>> {
        let response = self
            .client
            .post(format!(
                "{}/api/member/{}/cart/{}",
                self.url, member_id, book_id
            ))
            .send()
            .await?;
        if response.status() == StatusCode::CONFLICT {
            Ok(None)
        } else if response.status().is_success() {
            Ok(Some(response.json().await?))
        } else {
            bail!("Failed to add to cart {}", error_message(response).await)
        }
    }

    /// Calls DELETE /api/member/{member_id}/cart/{book_id} endpoint
    /// Returns None if the member does not exist
    pub async fn remove_from_cart(
        &self,
        member_id: &str,
        book_id: &str,
    ) -> anyhow::Result<Option<CartView>> {
        let response = self
            .client
            .delete(format!(
                "{}/api/member/{}/cart/{}",
                self.url, member_id, book_id
            ))
            .send()
            .await?;
        if response.status() == StatusCode::NOT_FOUND {
            Ok(None)
        } else if response.status().is_success() {
            Ok(Some(response.json().await?))
        } else {
            bail!("Failed to remove from cart {}", error_message(response).await)
        }
    }

    /// Calls GET /api/member/{member_id}/borrowable endpoint
    pub async fn borrowable_books(&self, member_id: &str) -> anyhow::Result<Vec<Book>> {
        self.list::<GetAllBooksResponse>(&format!("/api/member/{}/borrowable", member_id))
            .await
    }

    /// Calls POST /api/member/{member_id}/checkout endpoint
    /// Returns None if nothing in the cart could be borrowed
    pub async fn checkout(&self, member_id: &str) -> anyhow::Result<Option<CheckoutReceipt>> {
        let response = self
            .client
            .post(format!("{}/api/member/{}/checkout", self.url, member_id))
            .send()
            .await?;
        match response.status() {
            StatusCode::BAD_REQUEST | StatusCode::CONFLICT => Ok(None),
            status if status.is_success() => Ok(Some(response.json().await?)),
            _ => bail!("Failed to checkout {}", error_message(response).await),
        }
    }

    async fn circulate(
        &self,
        member_id: &str,
        action: &str,
        book_ids: Vec<BookId>,
    ) -> anyhow::Result<Option<Vec<BookTitleAndId>>> {
        let response = self
            .client
            .post(format!("{}/api/member/{}/{}", self.url, member_id, action))
            .json(&BookIdsRequest { book_ids })
            .send()
            .await?;
        if response.status() == StatusCode::CONFLICT {
            Ok(None)
        } else if response.status().is_success() {
            let receipt: CirculationReceipt = response.json().await?;
            Ok(Some(receipt.books))
        } else {
            bail!("Failed to {} books {}", action, error_message(response).await)
        }
    }

    async fn list<T: serde::de::DeserializeOwned + ListResponse>(
        &self,
        path: &str,
    ) -> anyhow::Result<T::Items> {
        let response = self
            .retrying_client
            .get(format!("{}{}", self.url, path))
            .send()
            .await?;
        if response.status().is_success() {
            let body: T = response.json().await?;
            Ok(body.into_items())
        } else {
            bail!("Failed to get {} {}", path, error_message(response).await)
        }
    }
}

/// Unwraps list endpoints that wrap their payload in an envelope
trait ListResponse {
    type Items;
    fn into_items(self) -> Self::Items;
}

impl ListResponse for GetAllBooksResponse {
    type Items = Vec<Book>;
    fn into_items(self) -> Self::Items {
        self.books
    }
}

impl<T> ListResponse for Vec<T> {
    type Items = Vec<T>;
    fn into_items(self) -> Self::Items {
        self
    }
}

impl ListResponse for CartView {
    type Items = CartView;
    fn into_items(self) -> Self::Items {
        self
    }
}

async fn conflict_as_false(response: Response, operation: &str) -> anyhow::Result<bool> {
    if response.status() == StatusCode::CONFLICT {
        Ok(false)
    } else if response.status().is_success() {
        Ok(true)
    } else {
        bail!("Failed to {} {}", operation, error_message(response).await)
    }
}

async fn error_message(response: Response) -> String {
    response
        .json::<ErrorMessage>()
        .await
        .map(|error| error.message)
        .unwrap_or_default()
}
