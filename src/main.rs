use actix_cors::Cors;
use actix_web::{middleware::Compress, web, App, HttpResponse, HttpServer};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use std::sync::Arc;
use tracing::{info, Level};
use tracing_actix_web::TracingLogger;
use tracing_subscriber::EnvFilter;
use utoipa::OpenApi; // bring trait into scope for ApiDoc::openapi()
use utoipa_swagger_ui::SwaggerUi;

use rib_live::config::ServerConfig;
use rib_live::hub::ReplyHub;
use rib_live::openapi::ApiDoc;
use rib_live::rate_limit::ReplyRateLimiter;
use rib_live::repo::ReplyRepo;
use rib_live::service::ThreadService;
use rib_live::{config, AppState};

async fn render_metrics(handle: web::Data<PrometheusHandle>) -> HttpResponse {
    HttpResponse::Ok().content_type("text/plain; version=0.0.4").body(handle.render())
}

#[cfg(feature = "postgres-store")]
fn build_repo() -> anyhow::Result<Arc<dyn ReplyRepo>> {
    use sqlx::postgres::PgPoolOptions;
    let db_url = std::env::var("DATABASE_URL").map_err(|_| anyhow::anyhow!("DATABASE_URL must be set for postgres-store"))?;
    let pool = PgPoolOptions::new().max_connections(5).connect_lazy(&db_url)?;
    info!("Using Postgres repository backend");
    Ok(Arc::new(rib_live::repo::pg::PgRepo::new(pool)))
}

#[cfg(all(feature = "inmem-store", not(feature = "postgres-store")))]
fn build_repo() -> anyhow::Result<Arc<dyn ReplyRepo>> {
    info!("Using in-memory repository backend");
    Ok(Arc::new(rib_live::repo::inmem::InMemRepo::new()))
}

#[actix_web::main]
async fn main() -> anyhow::Result<()> {
    // Load .env automatically only in debug builds.
    if cfg!(debug_assertions) {
        let _ = dotenv::dotenv();
    }

    validate_env_vars()?;

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive(Level::INFO.into()))
        .init();

    info!("Bootstrapping rib-live server");

    let cfg = ServerConfig::from_env();
    info!("Frontend URL: {}", cfg.frontend_url);

    let metrics = PrometheusBuilder::new().install_recorder()?;
    let service = ThreadService::new(build_repo()?, ReplyHub::default());
    let rate_limiter = ReplyRateLimiter::from_env();
    let openapi = ApiDoc::openapi();

    let frontend_url = cfg.frontend_url.clone();
    let server = HttpServer::new(move || {
        let cors = Cors::default()
            // local dev frontends
            .allowed_origin("http://localhost:5173")
            .allowed_origin("http://127.0.0.1:5173")
            .allowed_origin(&frontend_url)
            .allow_any_header()
            .allowed_methods(["GET", "POST", "DELETE", "OPTIONS"])
            .supports_credentials()
            .max_age(3600);

        App::new()
            .wrap(TracingLogger::default())
            .wrap(Compress::default())
            .wrap(cors)
            .app_data(web::Data::new(AppState {
                service: service.clone(),
                rate_limiter: Some(rate_limiter.clone()),
            }))
            .app_data(web::Data::new(metrics.clone()))
            .configure(config)
            .service(SwaggerUi::new("/docs/{_:.*}").url("/docs/openapi.json", openapi.clone()))
            .route("/metrics", web::get().to(render_metrics))
    })
    .bind(cfg.bind.as_str())?;

    info!("Listening on http://{}", cfg.bind);

    server.run().await?;
    Ok(())
}

/// Fail fast when required environment variables are missing.
fn validate_env_vars() -> anyhow::Result<()> {
    let secret = std::env::var("JWT_SECRET")
        .map_err(|_| anyhow::anyhow!("JWT_SECRET must be set (copy .env.example to .env and configure it)"))?;
    if secret.len() < 32 {
        anyhow::bail!("JWT_SECRET must be at least 32 characters long for security");
    }
    Ok(())
}
