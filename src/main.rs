use actix_cors::Cors;
use actix_web::{App, HttpResponse, HttpServer, Responder, get, middleware::Logger, web};
use anyhow::Result;
use std::sync::Arc;
use std::time::Duration;

use gymflow_be::database::{
    init_database,
    repositories::{RescheduleRepository, SqliteScheduleService, SqliteStaffDirectory},
};
use gymflow_be::services::NotificationHub;
use gymflow_be::{AppState, Config, RescheduleEngine, routes};

const NOTIFICATION_CAPACITY: usize = 256;

#[get("/")]
async fn hello() -> impl Responder {
    HttpResponse::Ok().body("GymFlow API v1.0")
}

#[get("/health")]
async fn health() -> impl Responder {
    HttpResponse::Ok().json(serde_json::json!({
        "status": "ok",
        "timestamp": chrono::Utc::now()
    }))
}

#[actix_web::main]
async fn main() -> Result<()> {
    // Load environment variables
    dotenvy::dotenv().ok();

    // Initialize logger
    env_logger::init();

    log::info!("Starting GymFlow API server...");

    // Load configuration
    let config = Config::from_env()?;
    log::info!("Configuration loaded (environment: {})", config.environment);

    // Initialize database
    let pool = init_database(&config.database_url).await?;
    log::info!("Database initialized");

    // Wire the engine: store, collaborators, and the notification hub
    let repo = RescheduleRepository::new(pool.clone());
    let directory = Arc::new(SqliteStaffDirectory::new(pool.clone()));
    let schedule = Arc::new(SqliteScheduleService::new(pool.clone()));
    let hub = NotificationHub::new(NOTIFICATION_CAPACITY);
    let engine = RescheduleEngine::new(
        repo,
        directory,
        schedule,
        hub.clone(),
        config.min_advance_notice_hours,
    );

    // Periodic sweep so stale requests read EXPIRED without an access attempt
    let sweeper = engine.clone();
    let sweep_interval = Duration::from_secs(config.expiry_sweep_interval_secs);
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(sweep_interval);
        loop {
            ticker.tick().await;
            match sweeper.sweep_expired().await {
                Ok(0) => {}
                Ok(count) => log::info!("expiry sweep converted {} stale requests", count),
                Err(err) => log::error!("expiry sweep failed: {}", err),
            }
        }
    });

    // Log every committed transition through an explicit subscription handle
    let mut event_log = hub.subscribe();
    tokio::spawn(async move {
        while let Some(event) = event_log.recv().await {
            log::info!(
                "reschedule {} -> {} (notify {})",
                event.request_id,
                event.new_status,
                event.recipient
            );
        }
    });

    let state = web::Data::new(AppState {
        engine: engine.clone(),
    });
    let config_data = web::Data::new(config.clone());
    let address = config.server_address();
    log::info!("Listening on {}", address);

    HttpServer::new(move || {
        let cors = Cors::default()
            .allow_any_origin()
            .allow_any_method()
            .allow_any_header()
            .max_age(3600);

        App::new()
            .wrap(Logger::default())
            .wrap(cors)
            .app_data(state.clone())
            .app_data(config_data.clone())
            .service(hello)
            .service(health)
            .configure(routes::configure)
    })
    .bind(&address)?
    .run()
    .await?;

    Ok(())
}
