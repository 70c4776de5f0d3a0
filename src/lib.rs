//! # bookstore
//!
//! A small book-shop HTTP service: a public book catalogue and user
//! accounts with token authentication, served by a minimal hyper + matchit
//! core.
//!
//! ## Routes
//!
//! | Method | Path | Access |
//! |---|---|---|
//! | GET | `/books/` | public |
//! | GET | `/books/categories` | public |
//! | GET | `/books/number` | public |
//! | GET | `/books/:id` | public |
//! | POST | `/users/register` | public |
//! | POST | `/users/login` | public |
//! | GET | `/users/profile` | bearer token |
//! | GET | `/users/number` | bearer token + `select.user` |
//!
//! ## Route tables are data
//!
//! Each resource exposes a [`RouteTable`]: an ordered list of [`Route`]
//! entries, each with its own middleware chain. [`Router::builder`] mounts
//! the tables, validates them (duplicates, literal paths shadowed by an
//! earlier `:param`) and freezes the result. The frozen [`Router`] is handed
//! to the [`Server`]; nothing mutates it afterwards.
//!
//! ```rust,no_run
//! use bookstore::{Config, Server, app};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), bookstore::Error> {
//!     let config = Config::load(None)?;
//!     let router = app::build(app::AppState::from_config(&config)?)?;
//!     Server::bind(config.bind_addr()?).serve(router).await
//! }
//! ```

mod error;
mod handler;
mod method;
mod request;
mod response;
mod router;
mod server;

pub mod app;
pub mod auth;
pub mod books;
pub mod config;
pub mod health;
pub mod middleware;
pub mod users;

pub use config::Config;
pub use error::{ApiError, Error, StoreError};
pub use handler::{BoxFuture, Handler};
pub use method::{Method, UnknownMethod};
pub use request::Request;
pub use response::{IntoResponse, Json, Response, ResponseBuilder};
pub use router::{Route, RouteError, RouteTable, Router, RouterBuilder};
pub use server::Server;
