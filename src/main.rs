use anyhow::Context;
use axum::{http::Method, Extension};
use club_recruit_hub::{
    config::Config,
    connect_to_db,
    email::{EmailNotifier, Notifier},
};
use envconfig::Envconfig;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv::dotenv().ok();

    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::init_from_env().context("failed to read configuration")?;
    let keys = Arc::new(config.auth_keys()?);

    let notifier = EmailNotifier::new(config.notification()?)?;
    if let Err(e) = notifier.sanity_check().await {
        tracing::warn!("email sanity check failed, admin request notifications will not work: {e}");
    }
    let notifier: Arc<dyn Notifier> = Arc::new(notifier);

    let pool = connect_to_db(&config.db_url)?;
    let cors = CorsLayer::new()
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers(Any)
        .allow_origin(Any);
    let app = club_recruit_hub::app()
        .layer(Extension(pool))
        .layer(Extension(keys))
        .layer(Extension(notifier))
        .layer(cors);

    let addr = ([0, 0, 0, 0], config.port).into();
    tracing::info!("listening on {addr}");
    axum::Server::bind(&addr)
        .serve(app.into_make_service())
        .await
        .context("server error")
}
