//! Main entry point for the race server.
//!
//! Initializes the actor system (connection registry and matchmaking server), loads
//! the course catalog and launches the HTTP server with the live channel endpoint.

use actix::Actor;
use actix_web::{web, App, HttpServer};
use log::{info, warn};
use std::sync::Arc;

use config::{EngineConfig, ServerConfig};
use race::catalog::CourseCatalog;
use server::leaderboard::Leaderboard;
use server::matchmaking::MatchmakingServer;
use server::registry::ConnectionRegistry;
use server::results::LogResultSink;

pub mod config;
mod error;
mod race;
mod server;


fn load_catalog(server_config: &ServerConfig) -> CourseCatalog {
    let Some(path) = &server_config.courses_path else {
        return CourseCatalog::builtin();
    };
    match CourseCatalog::from_json_file(path) {
        Ok(catalog) => {
            info!("[Main] Loaded {} courses from {}", catalog.len(), path);
            catalog
        }
        Err(e) => {
            warn!("[Main] Cannot load courses from {}: {}; using built-in courses", path, e);
            CourseCatalog::builtin()
        }
    }
}

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    // Initialize logger from environment variable (default to info level).
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let engine_config = EngineConfig::from_env();
    let server_config = ServerConfig::from_env();
    let catalog = Arc::new(load_catalog(&server_config));
    let leaderboard = Arc::new(Leaderboard::new());

    let registry = ConnectionRegistry::new().start();
    let matchmaking = MatchmakingServer::new(
        engine_config,
        registry.clone(),
        catalog,
        Box::new(LogResultSink),
        leaderboard.clone(),
    )
    .start();

    // Shared application state for HTTP/WebSocket handlers.
    let state = web::Data::new(server::state::AppState::new(matchmaking, registry, leaderboard));

    info!("[Main] Listening on {}:{}", server_config.host, server_config.port);
    HttpServer::new(move || {
        App::new()
            .wrap(
                actix_web::middleware::DefaultHeaders::new()
                    .add(("Access-Control-Allow-Origin", "*"))
                    .add(("Access-Control-Allow-Headers", "*")),
            )
            .app_data(state.clone())
            .configure(server::router::config)
    })
    .bind((server_config.host.as_str(), server_config.port))?
    .run()
    .await
}
