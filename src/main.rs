use std::sync::Arc;

use actix_cors::Cors;
use actix_web::{middleware::Logger, web, App, HttpResponse, HttpServer};
use redis::aio::ConnectionManager;
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use tracing::info;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use matching_service::concurrency::{RefreshLock, RefreshRateLimiter};
use matching_service::db::{PgCandidateRepository, PgSuggestionStore};
use matching_service::handlers::{self, AppState};
use matching_service::services::{HttpVectorEnsurer, SuggestionOrchestrator};
use matching_service::Config;

async fn health_check(pool: web::Data<PgPool>) -> HttpResponse {
    match sqlx::query("SELECT 1").fetch_one(pool.get_ref()).await {
        Ok(_) => HttpResponse::Ok().json(serde_json::json!({
            "status": "ok",
            "service": "matching-service",
            "version": env!("CARGO_PKG_VERSION")
        })),
        Err(e) => HttpResponse::ServiceUnavailable().json(serde_json::json!({
            "status": "unhealthy",
            "error": format!("PostgreSQL connection failed: {}", e)
        })),
    }
}

#[actix_web::main]
async fn main() -> anyhow::Result<()> {
    dotenv::dotenv().ok();

    // Initialize tracing
    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(EnvFilter::from_default_env())
        .init();

    let config = Config::from_env()?;
    info!(
        "Starting matching-service on {}:{}",
        config.app.host, config.app.port
    );

    let pool = PgPoolOptions::new()
        .max_connections(config.database.max_connections)
        .connect(&config.database.url)
        .await?;

    sqlx::migrate!("./migrations").run(&pool).await?;

    let redis_client = redis::Client::open(config.redis.url.clone())?;
    let redis_manager = ConnectionManager::new(redis_client).await?;

    let candidates = Arc::new(PgCandidateRepository::new(pool.clone()));
    let suggestions = Arc::new(PgSuggestionStore::new(pool.clone()));
    let vectors = Arc::new(HttpVectorEnsurer::new(&config.vector_service));

    let orchestrator = Arc::new(SuggestionOrchestrator::new(
        candidates,
        suggestions.clone(),
        vectors,
        config.scoring.clone(),
        config.orchestrator.clone(),
    ));

    let state = web::Data::new(AppState {
        orchestrator,
        suggestions,
        lock: RefreshLock::new(redis_manager.clone(), config.guardrails.lock_ttl_seconds),
        rate_limiter: RefreshRateLimiter::new(
            redis_manager,
            config.guardrails.rate_limit_window_seconds,
            config.guardrails.rate_limit_max_requests,
        ),
    });

    let jwt_config = web::Data::new(config.jwt.clone());
    let pool_data = web::Data::new(pool);
    let bind_addr = (config.app.host.clone(), config.app.port);

    HttpServer::new(move || {
        App::new()
            .wrap(Logger::default())
            .wrap(Cors::permissive())
            .app_data(state.clone())
            .app_data(jwt_config.clone())
            .app_data(pool_data.clone())
            .route("/health", web::get().to(health_check))
            .configure(handlers::configure)
    })
    .bind(bind_addr)?
    .run()
    .await?;

    Ok(())
}
