// Weather Mailer v0.1
use axum::{
    routing::{get, post},
    Router,
};
use sqlx::postgres::PgPoolOptions;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

mod config;
mod db;
mod errors;
mod helpers;
mod routes;
mod services;

use config::AppConfig;
use routes::AppState;
use services::disposition::{Classifier, SubjectLines};
use services::newsletter::{LogMailer, Mailer};
use services::newsletter_job::{NewsletterSettings, NewsletterState, SharedNewsletterState};
use services::weather_cache::WeatherCache;
use services::wunderground::WundergroundClient;

/// Maximum number of connections in the database pool.
const DB_POOL_MAX_CONNECTIONS: u32 = 5;
/// Minimum number of connections kept alive in the database pool.
const DB_POOL_MIN_CONNECTIONS: u32 = 1;

/// Weather Mailer API, OpenAPI specification.
#[derive(OpenApi)]
#[openapi(
    info(
        title = "Weather Mailer API",
        version = "0.1.0",
        description = "Weather-conditioned marketing newsletter. Subscribers pick a city; \
            a scheduled job fetches current conditions from Weather Underground, \
            classifies the weather as good, average or bad, and sends each \
            subscriber a newsletter whose subject line matches the mood.",
        license(name = "MIT"),
    ),
    tags(
        (name = "Health", description = "Service health check"),
        (name = "Locations", description = "Cities available for subscription"),
        (name = "Subscribers", description = "Subscription management and newsletter preview"),
        (name = "Newsletter", description = "Scheduled newsletter job"),
    ),
    paths(
        routes::health::health_check,
        routes::locations::list_locations,
        routes::subscribers::subscribe,
        routes::subscribers::get_subscriber,
        routes::subscribers::opt_out,
        routes::subscribers::preview_email,
        routes::newsletter::get_newsletter_status,
        routes::newsletter::run_newsletter_now,
    ),
    components(
        schemas(
            routes::health::HealthResponse,
            routes::locations::LocationResponse,
            routes::locations::LocationGroup,
            routes::subscribers::SubscribeRequest,
            routes::subscribers::SubscriberResponse,
            services::newsletter_job::NewsletterState,
            services::newsletter_job::NewsletterReport,
            errors::ErrorResponse,
        )
    )
)]
struct ApiDoc;

#[tokio::main]
async fn main() {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "weather_mailer=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = AppConfig::from_env();

    if config.wunderground_api_key.is_empty() {
        tracing::warn!("WUNDERGROUND_API_KEY is not set; weather lookups will fail");
    }

    // Set up database connection pool
    let pool = PgPoolOptions::new()
        .max_connections(DB_POOL_MAX_CONNECTIONS)
        .min_connections(DB_POOL_MIN_CONNECTIONS)
        .connect(&config.database_url)
        .await
        .expect("Failed to connect to database");

    // Run migrations
    sqlx::migrate!()
        .run(&pool)
        .await
        .expect("Failed to run database migrations");

    tracing::info!("Database migrations completed");

    // Weather source, classifier and the read-through cache in front of them
    let client = WundergroundClient::new(
        &config.wunderground_base_url,
        &config.wunderground_api_key,
        Duration::from_secs(config.weather_http_timeout_secs),
    )
    .expect("Failed to build HTTP client");
    let classifier = Classifier::new(config.disposition_variance_f, SubjectLines::default());
    let cache = Arc::new(WeatherCache::new(
        Arc::new(client),
        classifier,
        Duration::from_secs(config.weather_cache_ttl_secs),
    ));
    tracing::info!("Weather cache TTL is {}s", cache.ttl().as_secs());

    let mailer: Arc<dyn Mailer> = Arc::new(LogMailer);
    let settings = NewsletterSettings {
        from_address: config.newsletter_from.clone(),
        public_base_url: config.public_base_url.clone(),
    };

    // Create shared job state and spawn the newsletter scheduler
    let newsletter_state: SharedNewsletterState = Arc::new(RwLock::new(NewsletterState::new()));
    tokio::spawn(services::newsletter_job::run_scheduler(
        pool.clone(),
        cache.clone(),
        mailer.clone(),
        settings.clone(),
        newsletter_state.clone(),
        config.newsletter_interval_secs,
    ));

    let app_state = AppState {
        pool,
        cache,
        mailer,
        settings,
        newsletter_state,
    };

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([axum::http::Method::GET, axum::http::Method::POST])
        .allow_headers(Any);

    // Opt-out links are clicked from emails, so the route also answers GET.
    let app = Router::new()
        .route("/api/v1/health", get(routes::health::health_check))
        .route("/api/v1/locations", get(routes::locations::list_locations))
        .route("/api/v1/subscribe", post(routes::subscribers::subscribe))
        .route(
            "/api/v1/subscribers/:token",
            get(routes::subscribers::get_subscriber),
        )
        .route(
            "/api/v1/subscribers/:token/optout",
            post(routes::subscribers::opt_out).get(routes::subscribers::opt_out),
        )
        .route(
            "/api/v1/subscribers/:token/email",
            get(routes::subscribers::preview_email),
        )
        .route(
            "/api/v1/newsletter/status",
            get(routes::newsletter::get_newsletter_status),
        )
        .route(
            "/api/v1/newsletter/run",
            post(routes::newsletter::run_newsletter_now),
        )
        .with_state(app_state)
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .layer(TraceLayer::new_for_http())
        .layer(cors);

    // Start server
    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    tracing::info!("API server listening on {}", addr);
    tracing::info!(
        "Swagger UI available at http://localhost:{}/swagger-ui/",
        config.port
    );

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .expect("Failed to bind TCP listener");
    axum::serve(listener, app)
        .await
        .expect("Server terminated unexpectedly");
}
