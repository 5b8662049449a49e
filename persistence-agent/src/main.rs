use actix_cors::Cors;
use actix_web::{middleware::Logger, web, App, HttpServer};
use dotenv::dotenv;
use std::sync::Arc;
use tokio::sync::oneshot;

mod agent;
mod config;
mod controllers;
mod db;
mod error;
mod heartbeat;
mod models;
mod router;
mod store;
mod sync;

use agent::{Agent, AgentStatus};
use config::Config;
use db::Database;
use heartbeat::DiscoveryHeartbeat;
use router::CommandRouter;
use store::RecordStore;
use sync::SyncLog;

#[derive(Clone)]
pub struct AppState {
    pub config: Config,
    pub agent: Arc<Agent>,
    pub db: Arc<Database>,
    pub records: Arc<RecordStore>,
    pub router: Arc<CommandRouter>,
    pub sync_log: Arc<SyncLog>,
}

impl AppState {
    pub fn new(config: Config, db: Arc<Database>) -> Self {
        let agent = Arc::new(Agent::new(&config.agent_id, &config.agent_name, config.port));
        let records = Arc::new(RecordStore::new(Arc::clone(&db), config.default_ttl_secs));
        let router = Arc::new(CommandRouter::new(Arc::clone(&records)));
        let sync_log = Arc::new(SyncLog::new(Arc::clone(&db), config.sync_forward_target()));
        Self {
            config,
            agent,
            db,
            records,
            router,
            sync_log,
        }
    }
}

fn build_cors(origins: &[String]) -> Cors {
    let cors = if origins.is_empty() {
        Cors::default().allow_any_origin()
    } else {
        origins
            .iter()
            .fold(Cors::default(), |cors, origin| cors.allowed_origin(origin))
    };
    cors.allow_any_method().allow_any_header().max_age(3600)
}

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    dotenv().ok();

    let config = Config::from_env();

    // RUST_LOG wins over LOG_LEVEL when both are set
    env_logger::Builder::from_env(
        env_logger::Env::default().default_filter_or(config.log_level.as_str()),
    )
    .init();

    log::info!("Opening database {}", config.database_url);
    let db = match Database::from_config(&config) {
        Ok(db) => Arc::new(db),
        Err(e) => {
            log::error!("Failed to initialize database: {}", e);
            return Err(std::io::Error::other(e.to_string()));
        }
    };

    let state = AppState::new(config.clone(), db);
    state.agent.set_status(AgentStatus::Active);

    // Discovery heartbeat, stopped after the server exits
    let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();
    match &config.discovery_url {
        Some(registry) => {
            let heartbeat = DiscoveryHeartbeat::new(
                registry,
                config.discovery_interval_secs,
                &config.public_url(),
                Arc::clone(&state.agent),
            );
            tokio::spawn(heartbeat.start(shutdown_rx));
        }
        None => log::warn!("A2A_DISCOVERY_URL not set, discovery registration disabled"),
    }

    log::info!(
        "Starting {} ({}) on {}:{}",
        config.agent_name,
        config.agent_id,
        config.host,
        config.port
    );
    log::info!("Capabilities: {}", agent::CAPABILITIES.join(", "));
    log::info!("Discovery endpoint: {}/discovery", config.public_url());

    let max_body_bytes = config.max_body_bytes;
    let cors_origins = config.cors_origins.clone();
    let server_state = state.clone();

    let result = HttpServer::new(move || {
        App::new()
            .app_data(web::Data::new(server_state.clone()))
            .app_data(controllers::json_config(max_body_bytes))
            .app_data(web::PayloadConfig::new(max_body_bytes))
            .wrap(Logger::default())
            .wrap(build_cors(&cors_origins))
            .configure(controllers::configure)
    })
    .bind((config.host.as_str(), config.port))?
    .run()
    .await;

    let _ = shutdown_tx.send(());
    log::info!("Server stopped, closing database");
    drop(state);

    result
}
