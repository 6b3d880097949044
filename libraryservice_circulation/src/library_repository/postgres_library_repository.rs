use anyhow::Context;
use tokio_postgres::error::SqlState;
use tokio_postgres::{Client, NoTls, Row, Statement};

use crate::api::{Book, BookStatus, BookTitleAndId, Member, Transaction, TransactionId};
use crate::library_repository::{BookFilter, LibraryRepository, RepositoryError};

pub struct PostgresLibraryRepositoryConfig {
    pub hostname: String,
    pub username: String,
    pub password: String,
}

pub struct PostgresLibraryRepository {
    client: Client,
}

impl PostgresLibraryRepository {
    pub async fn init(config: PostgresLibraryRepositoryConfig) -> anyhow::Result<Self> {
        let connection_str = format!(
            "postgresql://{}:{}@{}",
            config.username, config.password, config.hostname
        );
        tracing::info!("Postgres host: {}", config.hostname);
        let (client, connection) = tokio_postgres::connect(&connection_str, NoTls)
            .await
            .context("Failed to start postgres")?;

        tokio::spawn(async move {
            if let Err(e) = connection.await {
                tracing::error!("connection error: {}", e);
            }
        });

        client
            .batch_execute(
                "
        CREATE TABLE IF NOT EXISTS books (
            id              TEXT PRIMARY KEY,
            title           TEXT NOT NULL,
            author          TEXT NOT NULL,
            status          TEXT NOT NULL,
            is_deleted      BOOLEAN NOT NULL DEFAULT FALSE
            )
        ",
            )
            .await
            .context("Failed to setup books table")?;

        client
            .batch_execute(
                "
        CREATE TABLE IF NOT EXISTS users (
            id              TEXT PRIMARY KEY,
            name            TEXT NOT NULL
            )
        ",
            )
            .await
            .context("Failed to setup users table")?;

        client
            .batch_execute(
                "
        CREATE TABLE IF NOT EXISTS transactions (
            id                   SERIAL PRIMARY KEY,
            book_id              TEXT NOT NULL,
            user_id              TEXT NOT NULL,
            borrow_time          BIGINT NOT NULL,
            return_time          BIGINT
            )
        ",
            )
            .await
            .context("Failed to setup transactions table")?;

        Ok(Self { client })
    }

    async fn execute_counting_rows(
        &self,
        query: &str,
        params: &[&(dyn tokio_postgres::types::ToSql + Sync)],
    ) -> Result<bool, RepositoryError> {
        let stmt: Statement = self.client.prepare(query).await?;
        let updated = self.client.execute(&stmt, params).await?;
        Ok(updated > 0)
    }
}

fn is_unique_violation(err: &tokio_postgres::Error) -> bool {
    err.as_db_error()
        .map(|db_err| db_err.code() == &SqlState::UNIQUE_VIOLATION)
        .unwrap_or_default()
}

fn book_from_row(row: &Row) -> Result<Book, RepositoryError> {
    let status: String = row.try_get(3)?;
    Ok(Book {
        id: row.try_get(0)?,
        title: row.try_get(1)?,
        author: row.try_get(2)?,
        status: status.parse()?,
        is_deleted: row.try_get(4)?,
    })
}

fn member_from_row(row: &Row) -> Result<Member, RepositoryError> {
    Ok(Member {
        id: row.try_get(0)?,
        name: row.try_get(1)?,
    })
}

#[async_trait::async_trait]
impl LibraryRepository for PostgresLibraryRepository {
    async fn insert_book(&self, book: Book) -> Result<(), RepositoryError> {
        let stmt: Statement = self
            .client
            .prepare(
                "INSERT INTO books (id, title, author, status, is_deleted) VALUES ($1, $2, $3, $4, $5)",
            )
            .await?;

        let result = self
            .client
            .execute(
                &stmt,
                &[
                    &book.id,
                    &book.title,
                    &book.author,
                    &book.status.as_str(),
                    &book.is_deleted,
                ],
            )
            .await;

        match result {
            Ok(_) => Ok(()),
            Err(err) if is_unique_violation(&err) => Err(RepositoryError::DuplicateBook(book.id)),
            Err(other_err) => Err(other_err.into()),
        }
    }

    async fn get_book(&self, book_id: &str) -> Result<Option<Book>, RepositoryError> {
        let stmt: Statement = self
            .client
            .prepare("SELECT id, title, author, status, is_deleted FROM books WHERE id = $1")
            .await?;

        let rows = self.client.query(&stmt, &[&book_id]).await?;
        rows.first().map(book_from_row).transpose()
    }

    async fn list_books(&self, filter: BookFilter) -> Result<Vec<Book>, RepositoryError> {
        let query = match filter {
            BookFilter::Active => {
                "SELECT id, title, author, status, is_deleted FROM books WHERE is_deleted = FALSE ORDER BY id"
            }
            BookFilter::Available => {
                "SELECT id, title, author, status, is_deleted FROM books WHERE is_deleted = FALSE AND status = 'Available' ORDER BY id"
            }
            BookFilter::Deleted => {
                "SELECT id, title, author, status, is_deleted FROM books WHERE is_deleted = TRUE ORDER BY id"
            }
        };
        let stmt: Statement = self.client.prepare(query).await?;
        let rows = self.client.query(&stmt, &[]).await?;
        rows.iter().map(book_from_row).collect()
    }

    async fn update_book_details(
        &self,
        book_id: &str,
        title: &str,
        author: &str,
    ) -> Result<bool, RepositoryError> {
        self.execute_counting_rows(
            "UPDATE books SET title = $1, author = $2 WHERE id = $3",
            &[&title, &author, &book_id],
        )
        .await
    }

    async fn replace_book(&self, book: Book) -> Result<bool, RepositoryError> {
        self.execute_counting_rows(
            "UPDATE books SET title = $1, author = $2, status = $3, is_deleted = $4 WHERE id = $5",
            &[
                &book.title,
                &book.author,
                &book.status.as_str(),
                &book.is_deleted,
                &book.id,
            ],
        )
        .await
    }

    async fn set_book_deleted(
        &self,
        book_id: &str,
        is_deleted: bool,
    ) -> Result<bool, RepositoryError> {
        self.execute_counting_rows(
            "UPDATE books SET is_deleted = $1 WHERE id = $2",
            &[&is_deleted, &book_id],
        )
        .await
    }

    async fn set_book_status(
        &self,
        book_id: &str,
        status: BookStatus,
    ) -> Result<bool, RepositoryError> {
        self.execute_counting_rows(
            "UPDATE books SET status = $1 WHERE id = $2",
            &[&status.as_str(), &book_id],
        )
        .await
    }

    async fn delete_book(&self, book_id: &str) -> Result<bool, RepositoryError> {
        self.execute_counting_rows("DELETE FROM books WHERE id = $1", &[&book_id])
            .await
    }

    async fn insert_member(&self, member: Member) -> Result<(), RepositoryError> {
        let stmt: Statement = self
            .client
            .prepare("INSERT INTO users (id, name) VALUES ($1, $2)")
            .await?;

        match self.client.execute(&stmt, &[&member.id, &member.name]).await {
            Ok(_) => Ok(()),
            Err(err) if is_unique_violation(&err) => {
                Err(RepositoryError::DuplicateMember(member.id))
            }
            Err(other_err) => Err(other_err.into()),
        }
    }

    async fn get_member(&self, member_id: &str) -> Result<Option<Member>, RepositoryError> {
        let stmt: Statement = self
            .client
            .prepare("SELECT id, name FROM users WHERE id = $1")
            .await?;

        let rows = self.client.query(&stmt, &[&member_id]).await?;
        rows.first().map(member_from_row).transpose()
    }

    async fn list_members(&self) -> Result<Vec<Member>, RepositoryError> {
        let stmt: Statement = self
            .client
            .prepare("SELECT id, name FROM users ORDER BY id")
            .await?;
        let rows = self.client.query(&stmt, &[]).await?;
        rows.iter().map(member_from_row).collect()
    }

    async fn count_open_transactions(&self, book_id: &str) -> Result<i64, RepositoryError> {
        let stmt: Statement = self
            .client
            .prepare("SELECT COUNT(*) FROM transactions WHERE book_id = $1 AND return_time IS NULL")
            .await?;

        let row = self.client.query_one(&stmt, &[&book_id]).await?;
        Ok(row.try_get(0)?)
    }

    async fn open_transaction(
        &self,
        book_id: &str,
        member_id: &str,
        borrow_time: i64,
    ) -> Result<TransactionId, RepositoryError> {
        let stmt: Statement = self
            .client
            .prepare(
                "INSERT INTO transactions (book_id, user_id, borrow_time) VALUES ($1, $2, $3) RETURNING id",
            )
            .await?;

        let rows = self
            .client
            .query(&stmt, &[&book_id, &member_id, &borrow_time])
            .await?;

        let transaction_id: TransactionId = rows
            .first()
            .ok_or_else(|| RepositoryError::Other("Id not returned".to_string()))?
            .try_get(0)?;

        Ok(transaction_id)
    }

    async fn close_transaction(
        &self,
        book_id: &str,
        member_id: &str,
        return_time: i64,
    ) -> Result<bool, RepositoryError> {
        self.execute_counting_rows(
            "UPDATE transactions SET return_time = $1 WHERE book_id = $2 AND user_id = $3 AND return_time IS NULL",
            &[&return_time, &book_id, &member_id],
        )
        .await
    }

    async fn list_open_loans(
        &self,
        member_id: &str,
    ) -> Result<Vec<BookTitleAndId>, RepositoryError> {
        let stmt: Statement = self
            .client
            .prepare(
                "SELECT b.id, b.title FROM books b JOIN transactions t ON b.id = t.book_id WHERE t.user_id = $1 AND t.return_time IS NULL ORDER BY t.id",
            )
            .await?;

        let rows = self.client.query(&stmt, &[&member_id]).await?;
        rows.iter()
            .map(|row| {
                Ok(BookTitleAndId {
                    book_id: row.try_get(0)?,
                    title: row.try_get(1)?,
                })
            })
            .collect()
    }

    async fn list_transactions(
        &self,
        member_id: &str,
    ) -> Result<Vec<Transaction>, RepositoryError> {
        let stmt: Statement = self
            .client
            .prepare(
                "SELECT id, book_id, user_id, borrow_time, return_time FROM transactions WHERE user_id = $1 ORDER BY id",
            )
            .await?;

        let rows = self.client.query(&stmt, &[&member_id]).await?;
        rows.iter()
            .map(|row| {
                Ok(Transaction {
                    transaction_id: row.try_get(0)?,
                    book_id: row.try_get(1)?,
                    member_id: row.try_get(2)?,
                    borrow_time: row.try_get(3)?,
                    return_time: row.try_get(4)?,
                })
            })
            .collect()
    }
}
