mod config;
mod error;
mod inference;
mod pages;
mod routes;
mod session;
mod storage;

use actix_cors::Cors;
use actix_web::middleware::Logger;
use actix_web::{App, HttpServer};
use config::AppConfig;
use inference::model::TorchClassifier;
use pages::Pages;
use routes::AppState;
use session::SessionStore;
use std::env;
use std::sync::Arc;
use std::time::Duration;
use storage::upload_store::UploadStore;

const SESSION_SWEEP_INTERVAL: Duration = Duration::from_secs(300);

fn startup_error(what: &str, err: impl std::fmt::Display) -> std::io::Error {
    log::error!("{} failed: {}", what, err);
    std::io::Error::other(format!("{} failed: {}", what, err))
}

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    dotenv::dotenv().ok();
    env_logger::init_from_env(env_logger::Env::new().default_filter_or("info"));

    if let Ok(current_dir) = env::current_dir() {
        log::info!("Current working directory: {}", current_dir.display());
    } else {
        log::error!("Failed to get the current working directory.");
    }

    let config = AppConfig::load().map_err(|e| startup_error("Loading configuration", e))?;

    let body_limit = config
        .body_limit_bytes()
        .map_err(|e| startup_error("Loading configuration", e))?;
    let session_ttl = config
        .session_ttl()
        .map_err(|e| startup_error("Loading configuration", e))?;

    let uploads = UploadStore::new(&config.upload_dir, body_limit)
        .map_err(|e| startup_error("Preparing upload directory", e))?;
    log::info!("Storing uploads in {}", uploads.dir().display());

    let classifier = TorchClassifier::load(&config.model_path)
        .map_err(|e| startup_error("Model loading", e))?;

    let sessions = SessionStore::new(session_ttl);
    let pages = Pages::new().map_err(|e| startup_error("Loading templates", e))?;
    let state = AppState::new(Arc::new(classifier), uploads, sessions.clone(), pages);

    actix_web::rt::spawn(async move {
        let mut interval = actix_web::rt::time::interval(SESSION_SWEEP_INTERVAL);
        loop {
            interval.tick().await;
            sessions.evict_expired();
        }
    });

    let bind_address = config.bind_address();
    log::info!("Starting server on {}", bind_address);

    HttpServer::new(move || {
        App::new()
            .wrap(Logger::default())
            .wrap(
                Cors::default()
                    .allow_any_origin()
                    .allowed_methods(vec!["GET", "POST", "OPTIONS"])
                    .allowed_headers(vec![
                        actix_web::http::header::ACCEPT,
                        actix_web::http::header::CONTENT_TYPE,
                    ])
                    .max_age(3600),
            )
            .configure(|cfg| state.configure(cfg))
    })
    .bind(&bind_address)?
    .run()
    .await
}
