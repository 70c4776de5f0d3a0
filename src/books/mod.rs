//! Book catalogue: read-only listing, lookup, categories and count.
//!
//! | Method | Path | Handler |
//! |---|---|---|
//! | GET | `/` | [`handlers::list_books`] |
//! | GET | `/categories` | [`handlers::list_categories`] |
//! | GET | `/number` | [`handlers::count_books`] |
//! | GET | `/:id` | [`handlers::get_book`] |
//!
//! None of these routes require authentication.

pub mod handlers;
mod store;

pub use store::{Book, BookQuery, BookStore, MemoryBookStore, Page};

use crate::router::{Route, RouteTable};

/// The book route table. `/:id` stays last so the literal paths above it
/// are never read as ids.
pub fn routes() -> RouteTable {
    RouteTable::new()
        .route(Route::get("/", handlers::list_books))
        .route(Route::get("/categories", handlers::list_categories))
        .route(Route::get("/number", handlers::count_books))
        .route(Route::get("/:id", handlers::get_book))
}
