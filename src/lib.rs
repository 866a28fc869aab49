use anyhow::Context;
use axum::Router;
use deadpool::managed::Pool;
use diesel_async::{pooled_connection::AsyncDieselConnectionManager, AsyncPgConnection};
use tower_http::trace::TraceLayer;

pub mod api;
pub mod auth;
pub mod codes;
pub mod config;
pub mod email;
pub mod error;
pub mod filter;
pub mod models;
pub mod requests;
pub mod schema;

pub type DbPool = Pool<AsyncDieselConnectionManager<AsyncPgConnection>>;

/// Builds the connection pool. Connections are opened lazily on first use.
pub fn connect_to_db(db_url: &str) -> anyhow::Result<DbPool> {
    let db_config = AsyncDieselConnectionManager::<AsyncPgConnection>::new(db_url);
    Pool::builder(db_config)
        .build()
        .context("failed to build database pool")
}

/// The full route tree. Callers layer in the pool, the [`auth::AuthKeys`] and
/// the [`email::Notifier`] as extensions.
pub fn app() -> Router {
    Router::new()
        .nest("/api", api::app())
        .layer(TraceLayer::new_for_http())
}
