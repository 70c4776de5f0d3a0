//! bookstore server binary.
//!
//! Run with:
//!   BOOKSTORE_JWT_SECRET=change-me-change-me cargo run -- --config bookstore.toml
//!
//! Try:
//!   curl http://localhost:3000/books/
//!   curl -X POST http://localhost:3000/users/register \
//!        -d '{"name":"Ada","email":"ada@example.com","password":"correct horse"}'
//!   curl -X POST http://localhost:3000/users/login \
//!        -d '{"email":"ada@example.com","password":"correct horse"}'
//!   curl -H "authorization: Bearer <token>" http://localhost:3000/users/profile

use std::path::PathBuf;

use bookstore::{Config, Server, app};
use clap::Parser;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Debug, Parser)]
#[command(name = "bookstore", version, about = "Book catalogue and user accounts over HTTP")]
struct Cli {
    /// Path to the TOML configuration file.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Overrides `server.bind_address`.
    #[arg(short, long)]
    bind: Option<String>,
}

#[tokio::main]
async fn main() -> Result<(), bookstore::Error> {
    let cli = Cli::parse();

    let mut config = Config::load(cli.config.as_deref())?;
    if let Some(bind) = cli.bind {
        config.server.bind_address = bind;
    }

    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| config.logging.filter.as_str().into()))
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!(version = env!("CARGO_PKG_VERSION"), "bookstore starting");

    let state = app::AppState::from_config(&config)?;
    let router = app::build(state)?;
    tracing::info!(routes = router.routes().len(), "routes registered");

    Server::bind(config.bind_addr()?).serve(router).await
}
