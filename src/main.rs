// F1 Rain Dashboard API v0.1
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

mod config;
mod errors;
mod helpers;
mod models;
mod routes;
mod services;

use config::AppConfig;
use routes::sessions::AppState;
use services::openf1::OpenF1Client;
use services::session::{SessionCache, SessionLoader};

/// F1 Rain Dashboard API OpenAPI document.
#[derive(OpenApi)]
#[openapi(
    info(
        title = "F1 Rain Dashboard API",
        version = "0.1.0",
        description = "Lap time and weather dashboard for Formula 1 sessions. \
            Loads lap and weather data from OpenF1 once per session, aligns every \
            lap with the nearest weather sample, and summarises lap times per driver \
            so wet and dry running can be compared.",
        license(name = "MIT"),
    ),
    tags(
        (name = "Health", description = "Service health check"),
        (name = "Sessions", description = "Session loading and chart data"),
    ),
    paths(
        routes::health::health_check,
        routes::sessions::get_session,
        routes::sessions::get_session_views,
    ),
    components(
        schemas(
            routes::health::HealthResponse,
            routes::sessions::SessionResponse,
            routes::sessions::ChartTitles,
            routes::sessions::ViewsResponse,
            models::SessionType,
            services::trend::TrendLine,
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
                .unwrap_or_else(|_| "f1_rain_dashboard=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = AppConfig::from_env();
    tracing::info!(
        "Using OpenF1 at {} (quick laps: {:?})",
        config.openf1_base_url,
        config.quick_laps
    );

    let client = OpenF1Client::new(
        &config.openf1_base_url,
        &config.provider_user_agent,
        config.provider_timeout_secs,
    )
    .expect("Failed to build OpenF1 HTTP client");

    // One cache for the process lifetime; sessions are never evicted
    let loader = SessionLoader::new(Arc::new(client), Arc::new(SessionCache::new()));

    let app_state = AppState {
        loader,
        quick_laps: config.quick_laps,
    };

    // CORS: read-only API, restrict methods to GET
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([axum::http::Method::GET])
        .allow_headers(Any);

    let app = routes::router(app_state)
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
