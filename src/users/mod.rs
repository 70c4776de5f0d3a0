//! User accounts: registration, login, profile and the customer count.
//!
//! | Method | Path | Chain |
//! |---|---|---|
//! | POST | `/register` | public |
//! | POST | `/login` | public |
//! | GET | `/profile` | [`AuthUser`] |
//! | GET | `/number` | [`AuthUser`] → [`Authorize`]`("select.user")` |

pub mod handlers;
mod store;

pub use store::{MemoryUserStore, NewUser, Profile, User, UserStore};

use crate::auth::{AuthUser, Authorize, SELECT_USER};
use crate::router::{Route, RouteTable};

/// The user route table. `auth` is the authentication step shared by the
/// protected routes.
pub fn routes(auth: AuthUser) -> RouteTable {
    RouteTable::new()
        .route(Route::post("/register", handlers::register))
        .route(Route::post("/login", handlers::login))
        .route(Route::get("/profile", handlers::profile).with(auth.clone()))
        .route(
            Route::get("/number", handlers::count_customers)
                .with(auth)
                .with(Authorize::new(SELECT_USER)),
        )
}
