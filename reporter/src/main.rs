use std::sync::Arc;

use reporter::notify::{LogDispatcher, NotificationDispatcher, WebhookDispatcher};
use reporter::session_store::{run_expired_session_cleanup, SqliteSessionStore};
use reporter::store::{ReportStore, SqliteLessonLookup, SqliteReportStore};
use reporter::{api, config, db, AppState, Engine};
use tower_http::trace::TraceLayer;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "reporter=debug,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = config::Config::from_env()?;
    info!(port = config.port, "reporter starting");

    // Database
    let db = db::connect(&config.database_url).await?;

    // Session store is SQLite-backed so interviews survive restarts.
    let session_store = SqliteSessionStore::new(db.clone(), config.session_ttl);
    tokio::spawn(run_expired_session_cleanup(
        session_store.clone(),
        config.session_cleanup_period,
    ));

    let reports: Arc<dyn ReportStore> = Arc::new(SqliteReportStore::new(db.clone()));

    let dispatcher: Arc<dyn NotificationDispatcher> = match &config.notify_url {
        Some(url) => {
            info!(url = %url, "delivering reports to webhook");
            Arc::new(
                WebhookDispatcher::new(url.clone(), config.notify_timeout, Arc::clone(&reports))
                    .map_err(|e| anyhow::anyhow!("notification client setup failed: {e}"))?,
            )
        }
        None => {
            info!("REPORTER_NOTIFY_URL not set; finished reports are only logged");
            Arc::new(LogDispatcher)
        }
    };

    let engine = Engine::new(
        reports,
        Arc::new(SqliteLessonLookup::new(db.clone())),
        dispatcher,
        Arc::new(session_store),
    );

    let state = Arc::new(AppState::new(engine));

    let app = api::router()
        .layer(TraceLayer::new_for_http())
        .with_state(state);

    let addr = format!("0.0.0.0:{}", config.port);
    info!("listening on {addr}");
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;
    Ok(())
}
