use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use dotenv::dotenv;
use tokio::net::TcpListener;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::{self, TraceLayer};
use tracing::{error, info, Level};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod router;

use calendar_cell::GoogleCalendarClient;
use conversation_cell::handlers::ConversationState;
use conversation_cell::{ConversationEngine, ConversationStore, OpenAiResponder};
use messaging_cell::WhatsAppClient;
use reminder_cell::{FileLedger, ReminderDispatcher, ReminderState};
use shared_config::AppConfig;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Loading Env Vars
    dotenv().ok();

    // Initialize tracing
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info,tower_http=debug".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting scheduling engine API server");

    // Load configuration
    let config = AppConfig::from_env();

    let calendar = Arc::new(GoogleCalendarClient::new(&config));
    let gateway = Arc::new(WhatsAppClient::new(&config));
    let responder = Arc::new(OpenAiResponder::new(&config));
    let ledger = Arc::new(FileLedger::new(&config.reminder_ledger_path));

    let store = Arc::new(ConversationStore::new(&config));
    let engine = ConversationEngine::new(
        &config,
        Arc::clone(&store),
        calendar.clone(),
        responder,
    )?;
    let dispatcher = Arc::new(ReminderDispatcher::new(
        &config,
        calendar,
        gateway.clone(),
        ledger,
    ));

    // One-shot mode for cron-style deployments: run today's reminder batch
    // and exit without serving HTTP.
    if std::env::args().any(|arg| arg == "--run-reminders") {
        let summary = dispatcher
            .run_once(
                &config.reminder_template_key(),
                config.reminder_days_before,
                config.reminder_batch_limit,
            )
            .await?;
        info!(
            "Reminder batch done: {} sent, {} failed, {} skipped",
            summary.sent,
            summary.failed,
            summary.skipped_already_sent + summary.skipped_no_phone
        );
        return Ok(());
    }

    // Background jobs
    {
        let store = Arc::clone(&store);
        let sweep_minutes = config.session_sweep_minutes;
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(Duration::from_secs(sweep_minutes * 60));
            ticker.tick().await;
            loop {
                ticker.tick().await;
                let evicted = store.sweep(Utc::now()).await;
                if evicted > 0 {
                    info!("Evicted {} expired conversation sessions", evicted);
                }
            }
        });
    }
    tokio::spawn(reminder_cell::run_schedule(
        Arc::clone(&dispatcher),
        config.clone(),
    ));

    let conversation_state = Arc::new(ConversationState { engine, gateway });
    let reminder_state = Arc::new(ReminderState {
        dispatcher,
        config: config.clone(),
    });

    // Set up CORS
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    // Build the application router
    let app = router::create_router(Arc::new(config), conversation_state, reminder_state).layer(
        TraceLayer::new_for_http()
            .make_span_with(trace::DefaultMakeSpan::new().level(Level::INFO))
            .on_response(trace::DefaultOnResponse::new().level(Level::INFO)),
    )
    .layer(cors);

    // Run the server
    let addr = SocketAddr::from(([0, 0, 0, 0], 3000));
    info!("Listening on {}", addr);

    let listener = TcpListener::bind(addr).await?;
    if let Err(e) = axum::serve(listener, app).await {
        error!("Server error: {}", e);
    }
    Ok(())
}
