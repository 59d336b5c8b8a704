//! Liveness endpoint

use axum::{extract::State, response::Json};
use chrono::Utc;
use serde_json::json;

use crate::presentation::controllers::AppState;
use crate::presentation::models::HealthResponse;

/// Liveness check with build and cache details
#[utoipa::path(
    get,
    path = "/health",
    tag = "health",
    responses(
        (status = 200, description = "Service is healthy", body = HealthResponse)
    )
)]
pub async fn health_check(State(app_state): State<AppState>) -> Json<HealthResponse> {
    let cache = match &app_state.cache {
        Some(cache) => {
            let stats = cache.get_stats().await;
            json!({
                "enabled": true,
                "hits": stats.hits,
                "misses": stats.misses,
                "writes": stats.writes,
                "expired_entries": stats.expired_entries,
                "cleanup_runs": stats.cleanup_runs,
            })
        }
        None => json!({ "enabled": false }),
    };

    Json(HealthResponse {
        status: "healthy".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        timestamp: Utc::now(),
        details: Some(json!({
            "cache": cache,
            "build_info": {
                "version": env!("CARGO_PKG_VERSION"),
                "build_date": option_env!("VERGEN_BUILD_DATE").unwrap_or("unknown"),
            }
        })),
    })
}
