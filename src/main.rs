use std::sync::{Arc, Mutex};

use axum::routing::{get, post};
use axum::Router;
use tokio::sync::Notify;
use tower_http::trace::TraceLayer;
use tracing_subscriber::EnvFilter;

use talentbook::config::AppConfig;
use talentbook::db;
use talentbook::handlers;
use talentbook::services::delivery::log::LogOnly;
use talentbook::services::delivery::webhook::{HttpDirectory, WebhookMailer, WebhookNotifier};
use talentbook::services::delivery::{ActorDirectory, EmailSink, NotificationSink};
use talentbook::services::outbox;
use talentbook::state::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let config = AppConfig::from_env();

    anyhow::ensure!(
        config.gateway_token != "changeme" || cfg!(debug_assertions),
        "GATEWAY_TOKEN must be set for release builds"
    );

    let conn = db::init_db(&config.database_url)?;

    let notifier: Box<dyn NotificationSink> = if config.notify_webhook_url.is_empty() {
        tracing::warn!("NOTIFY_WEBHOOK_URL not set, notifications will only be logged");
        Box::new(LogOnly)
    } else {
        tracing::info!("delivering notifications to {}", config.notify_webhook_url);
        Box::new(WebhookNotifier::new(
            config.notify_webhook_url.clone(),
            config.signing_secret(),
        ))
    };
    let mailer: Box<dyn EmailSink> = if config.email_webhook_url.is_empty() {
        tracing::warn!("EMAIL_WEBHOOK_URL not set, emails will only be logged");
        Box::new(LogOnly)
    } else {
        Box::new(WebhookMailer::new(
            config.email_webhook_url.clone(),
            config.signing_secret(),
        ))
    };
    let directory: Box<dyn ActorDirectory> = if config.directory_url.is_empty() {
        tracing::warn!("DIRECTORY_URL not set, booking emails cannot be addressed");
        Box::new(LogOnly)
    } else {
        Box::new(HttpDirectory::new(config.directory_url.clone()))
    };

    let state = Arc::new(AppState {
        db: Arc::new(Mutex::new(conn)),
        config: config.clone(),
        notifier,
        mailer,
        directory,
        outbox_signal: Notify::new(),
    });

    tokio::spawn(outbox::run_dispatcher(state.clone()));

    let app = Router::new()
        .route("/health", get(handlers::health::health))
        .route(
            "/api/bookings/:id",
            get(handlers::bookings::get_booking).delete(handlers::bookings::delete_booking),
        )
        .route(
            "/api/bookings/:id/actions",
            post(handlers::bookings::perform_action),
        )
        .route(
            "/api/balances/:actor_id",
            get(handlers::balances::get_balance),
        )
        .route(
            "/api/balances/:actor_id/deposit",
            post(handlers::balances::deposit),
        )
        .route("/api/admin/ledger/drift", get(handlers::balances::get_drift))
        .layer(TraceLayer::new_for_http())
        .with_state(state);

    let addr = format!("0.0.0.0:{}", config.port);
    tracing::info!("starting server on {addr}");

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
