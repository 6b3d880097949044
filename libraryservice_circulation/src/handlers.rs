use actix_web::http::header::LOCATION;
use actix_web::http::StatusCode;
use actix_web::web::Data;
use actix_web::{Error, HttpResponse};
use paperclip::actix::{
    api_v2_operation,
    web::{self},
    Apiv2Schema,
};
use serde::Deserialize;

use crate::api::{
    BookEdit, BookId, BookIdsRequest, CirculationReceipt, ErrorMessage, GetAllBooksResponse,
    Member, MemberId, NewBook, RestorePending, RestoreRequest,
};
use crate::app_config::LibraryServices;
use crate::catalog::AddBookOutcome;
use crate::error::LibraryError;

#[derive(Debug, Deserialize, Apiv2Schema)]
pub struct MemberBookPath {
    pub member_id: MemberId,
    pub book_id: BookId,
}

fn status_code(err: &LibraryError) -> StatusCode {
    match err {
        LibraryError::MissingField(_)
        | LibraryError::EmptySelection
        | LibraryError::CartEmpty(_) => StatusCode::BAD_REQUEST,
        LibraryError::BookNotFound(_) | LibraryError::MemberNotFound(_) => StatusCode::NOT_FOUND,
        LibraryError::BookAlreadyExists(_)
        | LibraryError::MemberAlreadyExists(_)
        | LibraryError::NotDeleted(_)
        | LibraryError::CurrentlyBorrowed(_)
        | LibraryError::BookUnavailable(_)
        | LibraryError::BorrowedWithoutLoan(_)
        | LibraryError::NotBorrowedByMember { .. } => StatusCode::CONFLICT,
        LibraryError::Storage(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

/// Warnings go back to the caller as they are, storage failures are logged
fn error_response(operation: &str, err: LibraryError) -> HttpResponse {
    if err.is_warning() {
        tracing::warn!("{} rejected: {}", operation, err);
    } else {
        tracing::error!("{} failed {}", operation, err);
    }
    HttpResponse::build(status_code(&err)).json(ErrorMessage {
        message: err.to_string(),
    })
}

#[api_v2_operation]
pub async fn health() -> Result<HttpResponse, Error> {
    Ok(HttpResponse::Ok().finish())
}

#[api_v2_operation]
pub async fn get_all_books(services: Data<LibraryServices>) -> Result<HttpResponse, Error> {
    Ok(match services.catalog.list_books().await {
        Ok(books) => HttpResponse::Ok().json(GetAllBooksResponse { books }),
        Err(err) => error_response("Get all books", err),
    })
}

#[api_v2_operation]
pub async fn get_available_books(services: Data<LibraryServices>) -> Result<HttpResponse, Error> {
    Ok(match services.catalog.list_available_books().await {
        Ok(books) => HttpResponse::Ok().json(GetAllBooksResponse { books }),
        Err(err) => error_response("Get available books", err),
    })
}

#[api_v2_operation]
pub async fn get_deleted_books(services: Data<LibraryServices>) -> Result<HttpResponse, Error> {
    Ok(match services.catalog.list_deleted_books().await {
        Ok(books) => HttpResponse::Ok().json(GetAllBooksResponse { books }),
        Err(err) => error_response("Get deleted books", err),
    })
}

#[api_v2_operation]
pub async fn add_book(
    services: Data<LibraryServices>,
    new_book: web::Json<NewBook>,
) -> Result<HttpResponse, Error> {
    Ok(match services.catalog.add_book(new_book.into_inner()).await {
        Ok(AddBookOutcome::Added(book)) => HttpResponse::Created()
            .append_header((LOCATION, format!("/api/book/{}", book.id)))
            .json(book),
        Ok(AddBookOutcome::RestorePending(existing)) => {
            HttpResponse::Accepted().json(RestorePending { existing })
        }
        Err(err) => error_response("Add book", err),
    })
}

#[api_v2_operation]
pub async fn get_book(
    services: Data<LibraryServices>,
    book_id: web::Path<BookId>,
) -> Result<HttpResponse, Error> {
    Ok(match services.catalog.get_book(&book_id.into_inner()).await {
        Ok(book) => HttpResponse::Ok().json(book),
        Err(err) => error_response("Get book", err),
    })
}

#[api_v2_operation]
pub async fn edit_book(
    services: Data<LibraryServices>,
    book_id: web::Path<BookId>,
    edit: web::Json<BookEdit>,
) -> Result<HttpResponse, Error> {
    Ok(
        match services
            .catalog
            .edit_book(&book_id.into_inner(), edit.into_inner())
            .await
        {
            Ok(book) => HttpResponse::Ok().json(book),
            Err(err) => error_response("Edit book", err),
        },
    )
}

#[api_v2_operation]
pub async fn soft_delete_book(
    services: Data<LibraryServices>,
    book_id: web::Path<BookId>,
) -> Result<HttpResponse, Error> {
    Ok(
        match services.catalog.soft_delete_book(&book_id.into_inner()).await {
            Ok(()) => HttpResponse::NoContent().finish(),
            Err(err) => error_response("Delete book", err),
        },
    )
}

#[api_v2_operation]
pub async fn purge_book(
    services: Data<LibraryServices>,
    book_id: web::Path<BookId>,
) -> Result<HttpResponse, Error> {
    Ok(match services.catalog.purge_book(&book_id.into_inner()).await {
        Ok(()) => HttpResponse::NoContent().finish(),
        Err(err) => error_response("Purge book", err),
    })
}

#[api_v2_operation]
pub async fn restore_book(
    services: Data<LibraryServices>,
    book_id: web::Path<BookId>,
    request: web::Json<RestoreRequest>,
) -> Result<HttpResponse, Error> {
    Ok(
        match services
            .catalog
            .restore_book(&book_id.into_inner(), request.into_inner())
            .await
        {
            Ok(book) => HttpResponse::Ok().json(book),
            Err(err) => error_response("Restore book", err),
        },
    )
}

#[api_v2_operation]
pub async fn get_all_members(services: Data<LibraryServices>) -> Result<HttpResponse, Error> {
    Ok(match services.members.list_members().await {
        Ok(members) => HttpResponse::Ok().json(members),
        Err(err) => error_response("Get all members", err),
    })
}

#[api_v2_operation]
pub async fn add_member(
    services: Data<LibraryServices>,
    member: web::Json<Member>,
) -> Result<HttpResponse, Error> {
    Ok(match services.members.add_member(member.into_inner()).await {
        Ok(member) => HttpResponse::Created()
            .append_header((LOCATION, format!("/api/member/{}", member.id)))
            .json(member),
        Err(err) => error_response("Add member", err),
    })
}

#[api_v2_operation]
pub async fn get_member(
    services: Data<LibraryServices>,
    member_id: web::Path<MemberId>,
) -> Result<HttpResponse, Error> {
    Ok(match services.members.get_member(&member_id.into_inner()).await {
        Ok(member) => HttpResponse::Ok().json(member),
        Err(err) => error_response("Get member", err),
    })
}

#[api_v2_operation]
pub async fn get_open_loans(
    services: Data<LibraryServices>,
    member_id: web::Path<MemberId>,
) -> Result<HttpResponse, Error> {
    Ok(match services.ledger.open_loans(&member_id.into_inner()).await {
        Ok(books) => HttpResponse::Ok().json(books),
        Err(err) => error_response("Get open loans", err),
    })
}

#[api_v2_operation]
pub async fn get_history(
    services: Data<LibraryServices>,
    member_id: web::Path<MemberId>,
) -> Result<HttpResponse, Error> {
    Ok(match services.ledger.history(&member_id.into_inner()).await {
        Ok(transactions) => HttpResponse::Ok().json(transactions),
        Err(err) => error_response("Get history", err),
    })
}

#[api_v2_operation]
pub async fn borrow_books(
    services: Data<LibraryServices>,
    member_id: web::Path<MemberId>,
    request: web::Json<BookIdsRequest>,
) -> Result<HttpResponse, Error> {
    Ok(
        match services
            .ledger
            .borrow_books(&member_id.into_inner(), &request.book_ids)
            .await
        {
            Ok(books) => HttpResponse::Ok().json(CirculationReceipt { books }),
            Err(err) => error_response("Borrow books", err),
        },
    )
}

#[api_v2_operation]
pub async fn return_books(
    services: Data<LibraryServices>,
    member_id: web::Path<MemberId>,
    request: web::Json<BookIdsRequest>,
) -> Result<HttpResponse, Error> {
    Ok(
        match services
            .ledger
            .return_books(&member_id.into_inner(), &request.book_ids)
            .await
        {
            Ok(books) => HttpResponse::Ok().json(CirculationReceipt { books }),
            Err(err) => error_response("Return books", err),
        },
    )
}

#[api_v2_operation]
pub async fn get_cart(
    services: Data<LibraryServices>,
    member_id: web::Path<MemberId>,
) -> Result<HttpResponse, Error> {
    Ok(match services.carts.view(&member_id.into_inner()).await {
        Ok(cart) => HttpResponse::Ok().json(cart),
        Err(err) => error_response("Get cart", err),
    })
}

#[api_v2_operation]
pub async fn add_to_cart(
    services: Data<LibraryServices>,
    path: web::Path<MemberBookPath>,
) -> Result<HttpResponse, Error> {
    Ok(
        match services.carts.add(&path.member_id, &path.book_id).await {
            Ok(cart) => HttpResponse::Ok().json(cart),
            Err(err) => error_response("Add to cart", err),
        },
    )
}

#[api_v2_operation]
pub async fn remove_from_cart(
    services: Data<LibraryServices>,
    path: web::Path<MemberBookPath>,
) -> Result<HttpResponse, Error> {
    Ok(
        match services.carts.remove(&path.member_id, &path.book_id).await {
            Ok(cart) => HttpResponse::Ok().json(cart),
            Err(err) => error_response("Remove from cart", err),
        },
    )
}

#[api_v2_operation]
pub async fn get_borrowable_books(
    services: Data<LibraryServices>,
    member_id: web::Path<MemberId>,
) -> Result<HttpResponse, Error> {
    Ok(match services.carts.borrowable(&member_id.into_inner()).await {
        Ok(books) => HttpResponse::Ok().json(GetAllBooksResponse { books }),
        Err(err) => error_response("Get borrowable books", err),
    })
}

#[api_v2_operation]
pub async fn checkout_cart(
    services: Data<LibraryServices>,
    member_id: web::Path<MemberId>,
) -> Result<HttpResponse, Error> {
    Ok(match services.carts.checkout(&member_id.into_inner()).await {
        Ok(receipt) => HttpResponse::Ok().json(receipt),
        Err(err) => error_response("Checkout cart", err),
    })
}

#[cfg(test)]
mod handler_tests {
    use std::sync::Arc;

    use actix_web::test;
    use paperclip::actix::OpenApiExt;

    use crate::api::{Book, BookStatus, CartView, CheckoutReceipt, Transaction};
    use crate::app_config::config_app;
    use crate::library_repository::InMemoryLibraryRepository;

    use super::*;

    macro_rules! init_app {
        () => {
            test::init_service(
                actix_web::App::new()
                    .wrap_api()
                    .app_data(Data::new(LibraryServices::new(Arc::new(
                        InMemoryLibraryRepository::default(),
                    ))))
                    .configure(config_app)
                    .build(),
            )
            .await
        };
    }

    fn new_book(id: &str, title: &str) -> NewBook {
        NewBook {
            id: id.to_string(),
            title: title.to_string(),
            author: "Author".to_string(),
            status: BookStatus::Available,
        }
    }

    #[actix_web::test]
    /// 1. Adds a book - expects 201 with location
    /// 2. Adds it again - expects 409
    /// 3. Deletes it and adds it again - expects 202 with the stored row
    /// 4. Restores with new data
    async fn test_book_lifecycle() {
        let app = init_app!();

        let response = test::call_service(
            &app,
            test::TestRequest::post()
                .uri("/api/book")
                .set_json(new_book("b1", "Dune"))
                .to_request(),
        )
        .await;
        assert_eq!(response.status(), StatusCode::CREATED);
        assert_eq!(
            response.headers().get(LOCATION).unwrap().to_str().unwrap(),
            "/api/book/b1"
        );

        let response = test::call_service(
            &app,
            test::TestRequest::post()
                .uri("/api/book")
                .set_json(new_book("b1", "Dune"))
                .to_request(),
        )
        .await;
        assert_eq!(response.status(), StatusCode::CONFLICT);
        let error: ErrorMessage = test::read_body_json(response).await;
        assert!(error.message.contains("b1"));

        let response = test::call_service(
            &app,
            test::TestRequest::delete().uri("/api/book/b1").to_request(),
        )
        .await;
        assert_eq!(response.status(), StatusCode::NO_CONTENT);

        let books: GetAllBooksResponse = test::call_and_read_body_json(
            &app,
            test::TestRequest::get().uri("/api/books").to_request(),
        )
        .await;
        assert_eq!(books.books, Vec::<Book>::new());

        let deleted: Book = test::call_and_read_body_json(
            &app,
            test::TestRequest::get().uri("/api/book/b1").to_request(),
        )
        .await;
        assert!(deleted.is_deleted);

        let response = test::call_service(
            &app,
            test::TestRequest::post()
                .uri("/api/book")
                .set_json(new_book("b1", "Dune Messiah"))
                .to_request(),
        )
        .await;
        assert_eq!(response.status(), StatusCode::ACCEPTED);
        let pending: RestorePending = test::read_body_json(response).await;
        assert_eq!(pending.existing.title, "Dune");
        assert!(pending.existing.is_deleted);

        let restored: Book = test::call_and_read_body_json(
            &app,
            test::TestRequest::post()
                .uri("/api/book/b1/restore")
                .set_json(serde_json::json!({
                    "choice": "use_new",
                    "new_details": {"title": "Dune Messiah", "author": "Herbert"}
                }))
                .to_request(),
        )
        .await;
        assert_eq!(restored.title, "Dune Messiah");
        assert_eq!(restored.status, BookStatus::Available);
        assert!(!restored.is_deleted);

        let fetched: Book = test::call_and_read_body_json(
            &app,
            test::TestRequest::get().uri("/api/book/b1").to_request(),
        )
        .await;
        assert_eq!(fetched, restored);

        let response = test::call_service(
            &app,
            test::TestRequest::get().uri("/api/book/unknown").to_request(),
        )
        .await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[actix_web::test]
    /// Borrow through the cart, edit is locked while borrowed, return unlocks it
    async fn test_cart_borrow_and_return() {
        let app = init_app!();

        for book in [new_book("b1", "Dune"), new_book("b2", "Emma")] {
            let response = test::call_service(
                &app,
                test::TestRequest::post()
                    .uri("/api/book")
                    .set_json(book)
                    .to_request(),
            )
            .await;
            assert_eq!(response.status(), StatusCode::CREATED);
        }
        let response = test::call_service(
            &app,
            test::TestRequest::post()
                .uri("/api/member")
                .set_json(Member {
                    id: "m1".to_string(),
                    name: "Ada".to_string(),
                })
                .to_request(),
        )
        .await;
        assert_eq!(response.status(), StatusCode::CREATED);

        let cart: CartView = test::call_and_read_body_json(
            &app,
            test::TestRequest::post().uri("/api/member/m1/cart/b1").to_request(),
        )
        .await;
        assert_eq!(cart.items.len(), 1);

        let borrowable: GetAllBooksResponse = test::call_and_read_body_json(
            &app,
            test::TestRequest::get()
                .uri("/api/member/m1/borrowable")
                .to_request(),
        )
        .await;
        assert_eq!(borrowable.books.len(), 1);
        assert_eq!(borrowable.books[0].id, "b2");

        let response = test::call_service(
            &app,
            test::TestRequest::delete()
                .uri("/api/member/ghost/cart/b1")
                .to_request(),
        )
        .await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);

        let receipt: CheckoutReceipt = test::call_and_read_body_json(
            &app,
            test::TestRequest::post().uri("/api/member/m1/checkout").to_request(),
        )
        .await;
        assert_eq!(receipt.borrowed[0].book_id, "b1");

        let response = test::call_service(
            &app,
            test::TestRequest::patch()
                .uri("/api/book/b1")
                .set_json(BookEdit {
                    title: "New".to_string(),
                    author: "New".to_string(),
                })
                .to_request(),
        )
        .await;
        assert_eq!(response.status(), StatusCode::CONFLICT);

        let response = test::call_service(
            &app,
            test::TestRequest::post()
                .uri("/api/member/m1/return")
                .set_json(BookIdsRequest {
                    book_ids: vec!["b2".to_string()],
                })
                .to_request(),
        )
        .await;
        assert_eq!(response.status(), StatusCode::CONFLICT);

        let returned: CirculationReceipt = test::call_and_read_body_json(
            &app,
            test::TestRequest::post()
                .uri("/api/member/m1/return")
                .set_json(BookIdsRequest {
                    book_ids: vec!["b1".to_string()],
                })
                .to_request(),
        )
        .await;
        assert_eq!(returned.books.len(), 1);

        let history: Vec<Transaction> = test::call_and_read_body_json(
            &app,
            test::TestRequest::get().uri("/api/member/m1/history").to_request(),
        )
        .await;
        assert_eq!(history.len(), 1);
        assert!(history[0].return_time.is_some());

        let available: GetAllBooksResponse = test::call_and_read_body_json(
            &app,
            test::TestRequest::get().uri("/api/books/available").to_request(),
        )
        .await;
        assert_eq!(available.books.len(), 2);

        let response = test::call_service(
            &app,
            test::TestRequest::post().uri("/api/member/m1/checkout").to_request(),
        )
        .await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }
}
