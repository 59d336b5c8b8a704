//! Route definitions and server setup

use axum::{
    Router,
    http::{HeaderValue, Method, header},
    middleware,
    response::Json,
    routing::{get, post},
};
use std::time::Duration;
use tower::ServiceBuilder;
use tower_http::{
    cors::{AllowOrigin, Any, CorsLayer},
    timeout::TimeoutLayer,
    trace::TraceLayer,
};
use utoipa::OpenApi;

use crate::Config;
use crate::presentation::{
    controllers::{
        analysis::{AppState, analyze_bulk, get_cve, threat_summary, validate_cve},
        health::health_check,
    },
    middleware::logging_middleware,
    models::*,
};

/// OpenAPI documentation
#[derive(OpenApi)]
#[openapi(
    paths(
        crate::presentation::controllers::analysis::get_cve,
        crate::presentation::controllers::analysis::analyze_bulk,
        crate::presentation::controllers::analysis::threat_summary,
        crate::presentation::controllers::analysis::validate_cve,
        crate::presentation::controllers::health::health_check
    ),
    components(
        schemas(
            VulnerabilityDto,
            CvssDto,
            WeaknessDto,
            AffectedProductDto,
            EpssDto,
            ExploitationDto,
            KevDto,
            RiskDto,
            BulkAnalysisRequest,
            BulkAnalysisResponse,
            BulkEntryDto,
            ThreatSummaryResponse,
            CveSummaryDto,
            WeaknessFrequencyDto,
            ValidationResponse,
            ErrorResponse,
            HealthResponse
        )
    ),
    tags(
        (name = "cves", description = "Single and bulk CVE analysis"),
        (name = "threats", description = "Keyword threat summaries over NVD publications"),
        (name = "health", description = "Service health")
    ),
    info(
        title = "cve-radar API",
        version = "0.1.0",
        description = "Merges NIST NVD records, FIRST EPSS exploit probabilities and the CISA KEV catalog into a single risk-scored view of a CVE.",
        license(
            name = "MIT",
            url = "https://opensource.org/licenses/MIT"
        )
    )
)]
pub struct ApiDoc;

/// Create the application router with its middleware stack
pub fn create_router(app_state: AppState, config: &Config) -> Router {
    let api_routes = Router::new()
        .route("/cves/bulk", post(analyze_bulk))
        .route("/cves/validate/{id}", get(validate_cve))
        .route("/cves/{id}", get(get_cve))
        .route("/threats", get(threat_summary));

    let mut router = Router::new()
        .nest("/api/v1", api_routes)
        .route("/health", get(health_check));

    if config.server.enable_docs {
        router = router.route("/api-docs/openapi.json", get(openapi_document));
    }

    router
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(cors_layer(&config.server.allowed_origins))
                .layer(TimeoutLayer::new(Duration::from_secs(
                    config.server.request_timeout_seconds,
                )))
                .layer(middleware::from_fn(logging_middleware)),
        )
        .with_state(app_state)
}

fn cors_layer(allowed_origins: &[String]) -> CorsLayer {
    let origin = if allowed_origins.iter().any(|o| o == "*") {
        AllowOrigin::from(Any)
    } else {
        let origins: Vec<HeaderValue> = allowed_origins
            .iter()
            .filter_map(|o| match HeaderValue::from_str(o) {
                Ok(value) => Some(value),
                Err(_) => {
                    tracing::warn!(origin = %o, "Ignoring invalid CORS origin");
                    None
                }
            })
            .collect();
        AllowOrigin::list(origins)
    };

    CorsLayer::new()
        .allow_origin(origin)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE, header::ACCEPT])
        .max_age(Duration::from_secs(3600))
}

async fn openapi_document() -> Json<utoipa::openapi::OpenApi> {
    Json(ApiDoc::openapi())
}
