use actix_web::{middleware::Compress, App, HttpServer};
use actix_cors::Cors;
use utoipa_swagger_ui::SwaggerUi;

mod error;
mod models;
mod openapi;
mod repo;
mod routes;
mod storage;

use openapi::ApiDoc;
use routes::{config, AppState};
use storage::build_media_store;
use utoipa::OpenApi; // bring trait into scope for ApiDoc::openapi()

use std::sync::Arc;
use tracing::{info, Level};
use tracing_actix_web::TracingLogger;
use tracing_subscriber::EnvFilter;

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    // Environment variables must be set externally (shell, systemd, Docker, etc.)
    // Load .env automatically only in debug builds to reduce manual setup overhead.
    if cfg!(debug_assertions) {
        let _ = dotenv::dotenv();
    }

    validate_env_vars();

    // Structured logging initialisation
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive(Level::INFO.into()))
        .init();

    info!("Bootstrapping adwall server");

    #[cfg(all(feature = "inmem-store", not(feature = "postgres-store")))]
    let repo = repo::inmem::InMemRepo::new();
    #[cfg(all(feature = "inmem-store", not(feature = "postgres-store")))]
    info!("Using in-memory repository backend");

    #[cfg(feature = "postgres-store")]
    let repo = {
        use sqlx::postgres::PgPoolOptions;
        let db_url =
            std::env::var("DATABASE_URL").expect("DATABASE_URL must be set for postgres-store");
        let pool = PgPoolOptions::new()
            .max_connections(5)
            .connect_lazy(&db_url)
            .expect("Failed to create Pg pool");
        sqlx::migrate!("./migrations")
            .run(&pool)
            .await
            .expect("Failed to run database migrations");
        info!("Using Postgres repository backend");
        repo::pg::PgRepo::new(pool)
    };

    let media_store = build_media_store().await;
    let openapi = ApiDoc::openapi();
    info!("OpenAPI spec generated");

    let server = HttpServer::new(move || {
        // The endpoint is public: any origin, wildcard echoed back, the
        // identity header allowed alongside Content-Type.
        let cors = Cors::default()
            .allow_any_origin()
            .send_wildcard()
            .allowed_methods(["GET", "POST", "PUT", "DELETE", "OPTIONS"])
            .allowed_headers(["content-type", "x-user-id"])
            .max_age(3600);

        App::new()
            .wrap(TracingLogger::default())
            .wrap(Compress::default())
            .wrap(cors)
            .configure(config)
            .service(SwaggerUi::new("/docs").url("/docs/openapi.json", openapi.clone()))
            .app_data(actix_web::web::Data::new(AppState {
                repo: Arc::new(repo.clone()),
                media: media_store.clone(),
            }))
    })
    .bind(("0.0.0.0", 8080))?;

    info!("Listening on http://0.0.0.0:8080 (all interfaces)");

    server.run().await
}

/// Validate that required environment variables are set
fn validate_env_vars() {
    use std::env;

    let mut required = vec!["S3_ENDPOINT", "CDN_BASE_URL"];
    if cfg!(feature = "postgres-store") {
        required.push("DATABASE_URL");
    }

    let mut missing = Vec::new();
    for var in required {
        if env::var(var).is_err() {
            missing.push(var);
        }
    }

    if !missing.is_empty() {
        eprintln!("Missing required environment variables: {:?}", missing);
        eprintln!("Please copy .env.example to .env and configure it");
        std::process::exit(1);
    }

    if env::var("S3_ACCESS_KEY").is_err() || env::var("S3_SECRET_KEY").is_err() {
        eprintln!("Warning: S3 credentials not configured (S3_ACCESS_KEY/S3_SECRET_KEY missing)");
        eprintln!("Uploads will rely on the endpoint accepting anonymous writes");
    }
}
