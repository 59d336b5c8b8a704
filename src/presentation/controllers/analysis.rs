//! Analysis controller for CVE lookup, bulk and keyword endpoints

use axum::{
    extract::{Path, Query, State},
    response::Json,
};
use chrono::{DateTime, Duration, NaiveDate, Utc};
use std::sync::Arc;

use crate::application::{
    BulkAnalysisService, CveAnalysisService, ThreatAnalysisService, errors::ApplicationError,
    parse_identifier_list,
};
use crate::domain::{CveId, DomainError};
use crate::infrastructure::FileCacheRepository;
use crate::presentation::models::{
    BulkAnalysisRequest, BulkAnalysisResponse, ErrorResponse, ThreatQuery, ThreatSummaryResponse,
    ValidationResponse, VulnerabilityDto,
};

/// Application state containing services
#[derive(Clone)]
pub struct AppState {
    pub analysis_service: Arc<dyn CveAnalysisService>,
    pub bulk_service: Arc<BulkAnalysisService>,
    pub threat_service: Arc<ThreatAnalysisService>,
    /// Present when the file cache is enabled; surfaced by the health endpoint
    pub cache: Option<Arc<FileCacheRepository>>,
    pub keyword_default_days: i64,
}

/// Analyze a single CVE
#[utoipa::path(
    get,
    path = "/api/v1/cves/{id}",
    tag = "cves",
    params(
        ("id" = String, Path, description = "CVE identifier, case-insensitive", example = "CVE-2021-44228")
    ),
    responses(
        (status = 200, description = "Merged NVD, EPSS and KEV view with risk score", body = VulnerabilityDto),
        (status = 400, description = "Malformed identifier", body = ErrorResponse),
        (status = 404, description = "Unknown to NVD or NVD unavailable", body = ErrorResponse),
        (status = 500, description = "Internal server error", body = ErrorResponse)
    )
)]
pub async fn get_cve(
    State(app_state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<VulnerabilityDto>, ApplicationError> {
    let record = app_state.analysis_service.analyze(&id).await?;
    Ok(Json(VulnerabilityDto::from(&record)))
}

/// Analyze many CVEs with bounded concurrency
#[utoipa::path(
    post,
    path = "/api/v1/cves/bulk",
    tag = "cves",
    request_body = BulkAnalysisRequest,
    responses(
        (status = 200, description = "One entry per identifier, in request order", body = BulkAnalysisResponse),
        (status = 400, description = "Neither identifiers nor input given", body = ErrorResponse)
    )
)]
pub async fn analyze_bulk(
    State(app_state): State<AppState>,
    Json(request): Json<BulkAnalysisRequest>,
) -> Result<Json<BulkAnalysisResponse>, ApplicationError> {
    let identifiers = match (request.identifiers, request.input) {
        (Some(identifiers), _) => identifiers,
        (None, Some(input)) => parse_identifier_list(&input),
        (None, None) => {
            return Err(DomainError::InvalidInput {
                field: "identifiers".to_string(),
                message: "provide either 'identifiers' or 'input'".to_string(),
            }
            .into());
        }
    };

    if request.concurrency == Some(0) {
        return Err(DomainError::InvalidInput {
            field: "concurrency".to_string(),
            message: "concurrency must be at least 1".to_string(),
        }
        .into());
    }

    tracing::info!(count = identifiers.len(), "Starting bulk analysis");
    let result = app_state
        .bulk_service
        .analyze_bulk(&identifiers, request.concurrency)
        .await;

    Ok(Json(BulkAnalysisResponse::from(&result)))
}

/// Summarise CVEs published for a keyword
#[utoipa::path(
    get,
    path = "/api/v1/threats",
    tag = "threats",
    params(ThreatQuery),
    responses(
        (status = 200, description = "Keyword threat summary", body = ThreatSummaryResponse),
        (status = 400, description = "Empty keyword, bad date or reversed window", body = ErrorResponse),
        (status = 404, description = "No CVEs matched the keyword, or NVD could not be searched", body = ErrorResponse)
    )
)]
pub async fn threat_summary(
    State(app_state): State<AppState>,
    Query(query): Query<ThreatQuery>,
) -> Result<Json<ThreatSummaryResponse>, ApplicationError> {
    let end = match query.end.as_deref() {
        Some(value) => parse_date_param("end", value, true)?,
        None => Utc::now(),
    };
    let start = match query.start.as_deref() {
        Some(value) => parse_date_param("start", value, false)?,
        None => end - Duration::days(app_state.keyword_default_days.max(1)),
    };

    let summary = app_state
        .threat_service
        .analyze_keyword(&query.keyword, start, end)
        .await?;

    Ok(Json(ThreatSummaryResponse::from(&summary)))
}

/// Check identifier syntax without contacting any source
#[utoipa::path(
    get,
    path = "/api/v1/cves/validate/{id}",
    tag = "cves",
    params(
        ("id" = String, Path, description = "Identifier to check", example = "cve-2021-44228")
    ),
    responses(
        (status = 200, description = "Validation result", body = ValidationResponse)
    )
)]
pub async fn validate_cve(Path(id): Path<String>) -> Json<ValidationResponse> {
    let normalized = CveId::parse(&id).ok().map(String::from);
    Json(ValidationResponse {
        identifier: id,
        valid: normalized.is_some(),
        normalized,
    })
}

/// Accept RFC 3339 or a bare `YYYY-MM-DD`; a bare end date covers the whole day
fn parse_date_param(
    field: &str,
    value: &str,
    end_of_day: bool,
) -> Result<DateTime<Utc>, ApplicationError> {
    let value = value.trim();
    if let Ok(parsed) = DateTime::parse_from_rfc3339(value) {
        return Ok(parsed.with_timezone(&Utc));
    }

    let invalid = || {
        ApplicationError::from(DomainError::InvalidInput {
            field: field.to_string(),
            message: format!("'{}' is not an RFC 3339 timestamp or YYYY-MM-DD date", value),
        })
    };

    let date = NaiveDate::parse_from_str(value, "%Y-%m-%d").map_err(|_| invalid())?;
    let time = if end_of_day {
        date.and_hms_opt(23, 59, 59)
    } else {
        date.and_hms_opt(0, 0, 0)
    };
    time.map(|t| t.and_utc()).ok_or_else(invalid)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Datelike, Timelike};

    #[test]
    fn test_parse_date_param_formats() {
        let start = parse_date_param("start", "2024-01-15", false).unwrap();
        assert_eq!((start.day(), start.hour()), (15, 0));

        let end = parse_date_param("end", "2024-01-15", true).unwrap();
        assert_eq!((end.hour(), end.minute(), end.second()), (23, 59, 59));

        let exact = parse_date_param("end", "2024-01-15T08:30:00+02:00", true).unwrap();
        assert_eq!(exact.hour(), 6);
    }

    #[test]
    fn test_parse_date_param_rejects_garbage() {
        match parse_date_param("start", "last tuesday", false) {
            Err(ApplicationError::Domain(DomainError::InvalidInput { field, .. })) => {
                assert_eq!(field, "start")
            }
            other => panic!("expected InvalidInput, got {:?}", other),
        }
    }
}
