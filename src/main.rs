use std::sync::Arc;

use actix_web::middleware::NormalizePath;
use actix_web::web::Data;
use actix_web::{App, HttpServer, Responder, get};

mod api;
mod auth;
mod config;
mod db;
mod docs;
mod error;
mod model;
mod models;
mod repository;
mod routes;
mod services;
mod storage;
mod utils;

use config::Config;
use db::{bootstrap_admin, init_db, run_migrations};

use crate::docs::ApiDoc;
use crate::repository::attendance::MySqlAttendanceRepository;
use crate::repository::employee::MySqlEmployeeRepository;
use crate::routes::Limiters;
use crate::services::attendance::AttendanceService;
use crate::storage::LocalDiskStore;
use crate::utils::employee_cache::EmployeeCache;
use tracing::info;
use tracing_appender::rolling;
use utoipa::OpenApi; // ← needed for ApiDoc::openapi()
use utoipa_swagger_ui::SwaggerUi;

#[get("/")]
async fn index() -> impl Responder {
    "HR attendance service"
}

#[actix_web::main]
async fn main() -> anyhow::Result<()> {
    let config = Config::from_env()?;

    // Rolling daily log
    let file_appender = rolling::daily(&config.log_dir, "app.log");
    let (non_blocking, _guard) = tracing_appender::non_blocking(file_appender);

    tracing_subscriber::fmt()
        .with_writer(non_blocking)
        .with_max_level(tracing::Level::DEBUG)
        .with_ansi(false)
        .with_target(false) // removes module path
        .with_level(true)
        .with_thread_ids(false)
        .with_thread_names(false)
        .pretty()
        .init();

    info!(addr = %config.server_addr, "Server starting...");

    let pool = init_db(&config.database_url).await?;
    if config.run_migrations {
        run_migrations(&pool).await?;
    }
    if let Some((username, password)) = &config.bootstrap_admin {
        bootstrap_admin(&pool, username, password).await?;
    }

    let cache = EmployeeCache::default();
    let service = Data::new(AttendanceService::new(
        Arc::new(MySqlAttendanceRepository::new(pool.clone())),
        Arc::new(MySqlEmployeeRepository::new(pool.clone(), cache.clone())),
        Arc::new(LocalDiskStore::new(&config.upload_dir)),
        config.schedule(),
    ));
    let limiters = Data::new(Limiters::from_config(&config)?);

    let server_addr = config.server_addr.clone();

    HttpServer::new(move || {
        let limiters = limiters.clone();
        let config_data = config.clone();
        App::new()
            .wrap(actix_web::middleware::Logger::default())
            .wrap(NormalizePath::trim())
            .service(
                SwaggerUi::new("/swagger-ui/{_:.*}") // ← important: wildcard {_:.*} to match JS/CSS files
                    .url("/api-doc/openapi.json", ApiDoc::openapi()),
            )
            .app_data(Data::new(pool.clone()))
            .app_data(Data::new(config.clone()))
            .app_data(Data::new(cache.clone()))
            .app_data(service.clone())
            .service(index)
            // Configure auth + protected routes with rate limiting
            .configure(move |cfg| routes::configure(cfg, &config_data, &limiters))
    })
    .bind(server_addr)?
    .run()
    .await?;

    Ok(())
}
