use std::sync::Arc;

use paperclip::actix::web;

use crate::cart::CartStore;
use crate::catalog::BookCatalog;
use crate::circulation::CirculationLedger;
use crate::handlers;
use crate::library_repository::LibraryRepository;
use crate::members::MemberRegistry;

/// Everything the handlers need, shared across workers as app data
#[derive(Clone)]
pub struct LibraryServices {
    pub catalog: BookCatalog,
    pub members: MemberRegistry,
    pub ledger: CirculationLedger,
    pub carts: CartStore,
}

impl LibraryServices {
    pub fn new(repository: Arc<dyn LibraryRepository>) -> Self {
        let ledger = CirculationLedger::new(repository.clone());
        Self {
            catalog: BookCatalog::new(repository.clone()),
            members: MemberRegistry::new(repository.clone()),
            carts: CartStore::new(repository, ledger.clone()),
            ledger,
        }
    }
}

pub fn config_app(cfg: &mut web::ServiceConfig) {
    cfg.service(web::resource("/health").route(web::get().to(handlers::health)))
        .service(
            web::scope("/api")
                .service(web::resource("/books").route(web::get().to(handlers::get_all_books)))
                .service(
                    web::resource("/books/available")
                        .route(web::get().to(handlers::get_available_books)),
                )
                .service(
                    web::resource("/books/deleted")
                        .route(web::get().to(handlers::get_deleted_books)),
                )
                .service(
                    web::scope("/book")
                        .service(web::resource("").route(web::post().to(handlers::add_book)))
                        .service(
                            web::scope("/{book_id}")
                                .service(
                                    web::resource("")
                                        .route(web::get().to(handlers::get_book))
                                        .route(web::patch().to(handlers::edit_book))
                                        .route(web::delete().to(handlers::soft_delete_book)),
                                )
                                .service(
                                    web::resource("/purge")
                                        .route(web::delete().to(handlers::purge_book)),
                                )
                                .service(
                                    web::resource("/restore")
                                        .route(web::post().to(handlers::restore_book)),
                                ),
                        ),
                )
                .service(
                    web::resource("/members").route(web::get().to(handlers::get_all_members)),
                )
                .service(
                    web::scope("/member")
                        .service(web::resource("").route(web::post().to(handlers::add_member)))
                        .service(
                            web::scope("/{member_id}")
                                .service(
                                    web::resource("").route(web::get().to(handlers::get_member)),
                                )
                                .service(
                                    web::resource("/loans")
                                        .route(web::get().to(handlers::get_open_loans)),
                                )
                                .service(
                                    web::resource("/history")
                                        .route(web::get().to(handlers::get_history)),
                                )
                                .service(
                                    web::resource("/borrow")
                                        .route(web::post().to(handlers::borrow_books)),
                                )
                                .service(
                                    web::resource("/return")
                                        .route(web::post().to(handlers::return_books)),
                                )
                                .service(
                                    web::resource("/checkout")
                                        .route(web::post().to(handlers::checkout_cart)),
                                )
                                .service(
                                    web::resource("/cart").route(web::get().to(handlers::get_cart)),
                                )
                                .service(
                                    web::resource("/borrowable")
                                        .route(web::get().to(handlers::get_borrowable_books)),
                                )
                                .service(
                                    web::resource("/cart/{book_id}")
                                        .route(web::post().to(handlers::add_to_cart))
                                        .route(web::delete().to(handlers::remove_from_cart)),
                                ),
                        ),
                ),
        );
}
