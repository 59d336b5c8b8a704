//! Application services orchestrating gateways, normalizers and scoring

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures::future::join_all;
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

use super::errors::{ApplicationError, CacheError};
use super::normalizers::normalize_nvd;
use crate::domain::{
    BulkAnalysisEntry, BulkAnalysisResult, CveId, CveSummaryRow, DomainError,
    ExploitationStatus, KeywordSummary, PublicationWindow, RiskCalculator, ThreatStatistics,
    VulnerabilityRecord,
};
use crate::infrastructure::api_clients::{EpssGateway, KevGateway, NvdGateway, RawNvdCve};

/// Default number of bulk workers
pub const DEFAULT_BULK_CONCURRENCY: usize = 5;
/// Results requested from NVD for a keyword search
pub const DEFAULT_KEYWORD_PAGE_SIZE: u32 = 200;
/// Rows enriched with EPSS in a keyword summary
pub const TOP_CVSS_LIMIT: usize = 10;
pub const TOP_WEAKNESS_LIMIT: usize = 5;

/// Short-lived JSON store used to avoid repeating identical upstream queries.
///
/// Object safe so services can hold it as `Arc<dyn AnalysisCache>`.
#[async_trait]
pub trait AnalysisCache: Send + Sync {
    async fn get_json(&self, key: &str) -> Result<Option<serde_json::Value>, CacheError>;

    async fn set_json(
        &self,
        key: &str,
        value: serde_json::Value,
        ttl: Duration,
    ) -> Result<(), CacheError>;

    async fn invalidate(&self, key: &str) -> Result<(), CacheError>;
}

/// Optional cache plus its TTL. Cache failures are logged and never surface.
#[derive(Clone)]
struct CacheSlot {
    cache: Option<Arc<dyn AnalysisCache>>,
    ttl: Duration,
}

impl CacheSlot {
    fn none() -> Self {
        Self {
            cache: None,
            ttl: Duration::ZERO,
        }
    }

    async fn get<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        let cache = self.cache.as_ref()?;
        match cache.get_json(key).await {
            Ok(Some(value)) => match serde_json::from_value(value) {
                Ok(decoded) => {
                    debug!("Cache hit for {}", key);
                    Some(decoded)
                }
                Err(e) => {
                    warn!("Discarding undecodable cache entry {}: {}", key, e);
                    let _ = cache.invalidate(key).await;
                    None
                }
            },
            Ok(None) => None,
            Err(e) => {
                warn!("Cache read failed for {}: {}", key, e);
                None
            }
        }
    }

    async fn put<T: Serialize>(&self, key: &str, value: &T) {
        let Some(cache) = self.cache.as_ref() else {
            return;
        };
        let result = match serde_json::to_value(value) {
            Ok(json) => cache.set_json(key, json, self.ttl).await,
            Err(e) => Err(CacheError::Json(e)),
        };
        if let Err(e) = result {
            warn!("Failed to cache {}: {}", key, e);
        }
    }
}

/// True when `input` is a well formed CVE identifier (surrounding whitespace and case ignored)
pub fn is_valid_identifier(input: &str) -> bool {
    CveId::is_valid(input)
}

/// Split free-form input on commas and whitespace into canonical identifiers.
///
/// Malformed tokens are dropped silently; order and duplicates are preserved.
pub fn parse_identifier_list(input: &str) -> Vec<String> {
    input
        .split(|c: char| c == ',' || c == ';' || c.is_whitespace())
        .filter_map(|token| CveId::parse(token).ok())
        .map(String::from)
        .collect()
}

/// Full analysis of a single CVE
#[async_trait]
pub trait CveAnalysisService: Send + Sync {
    async fn analyze(&self, input: &str) -> Result<VulnerabilityRecord, ApplicationError>;
}

/// Queries NVD, EPSS and KEV concurrently and merges them into one record
pub struct CveAnalysisServiceImpl {
    nvd: Arc<dyn NvdGateway>,
    epss: Arc<dyn EpssGateway>,
    kev: Arc<dyn KevGateway>,
    cache: CacheSlot,
    risk: RiskCalculator,
}

impl CveAnalysisServiceImpl {
    pub fn new(
        nvd: Arc<dyn NvdGateway>,
        epss: Arc<dyn EpssGateway>,
        kev: Arc<dyn KevGateway>,
    ) -> Self {
        Self {
            nvd,
            epss,
            kev,
            cache: CacheSlot::none(),
            risk: RiskCalculator::new(),
        }
    }

    pub fn with_cache(mut self, cache: Arc<dyn AnalysisCache>, ttl: Duration) -> Self {
        self.cache = CacheSlot {
            cache: Some(cache),
            ttl,
        };
        self
    }

    fn cache_key(id: &CveId) -> String {
        format!("cve:{}", id)
    }
}

#[async_trait]
impl CveAnalysisService for CveAnalysisServiceImpl {
    #[tracing::instrument(skip(self))]
    async fn analyze(&self, input: &str) -> Result<VulnerabilityRecord, ApplicationError> {
        let id = CveId::parse(input)?;
        let cache_key = Self::cache_key(&id);

        if let Some(record) = self.cache.get::<VulnerabilityRecord>(&cache_key).await {
            return Ok(record);
        }

        let (nvd, epss, kev) = tokio::join!(
            self.nvd.get_raw_data(&id),
            self.epss.get_score(&id),
            self.kev.get_status(&id),
        );

        let nvd = nvd.unwrap_or_else(|e| {
            warn!(cve = %id, error = %e, "NVD lookup failed");
            None
        });
        let epss = epss.unwrap_or_else(|e| {
            warn!(cve = %id, error = %e, "EPSS lookup failed");
            None
        });
        let kev = kev.unwrap_or_else(|e| {
            warn!(cve = %id, error = %e, "KEV lookup failed");
            None
        });

        let normalized =
            normalize_nvd(nvd.as_ref()).ok_or_else(|| ApplicationError::NotFound {
                resource: "CVE".to_string(),
                id: id.to_string(),
            })?;

        let exploitation = ExploitationStatus::from_catalog(kev);
        let base_score = normalized.cvss.as_ref().and_then(|c| c.base_score);
        let risk = self
            .risk
            .calculate(base_score, epss.as_ref(), exploitation.exploited);

        let record = VulnerabilityRecord {
            nvd_url: id.nvd_url(),
            id,
            description: normalized.description,
            published: normalized.published,
            last_modified: normalized.last_modified,
            cvss: normalized.cvss,
            weaknesses: normalized.weaknesses,
            affected_products: normalized.affected_products,
            references: normalized.references,
            epss,
            exploitation,
            risk,
        };

        info!(
            cve = %record.id,
            risk_score = record.risk.score,
            risk_level = %record.risk.level,
            exploited = record.exploitation.exploited,
            "CVE analysis complete"
        );

        self.cache.put(&cache_key, &record).await;
        Ok(record)
    }
}

/// Runs single analyses over many identifiers with a bounded worker pool
pub struct BulkAnalysisService {
    analyzer: Arc<dyn CveAnalysisService>,
    default_concurrency: usize,
}

impl BulkAnalysisService {
    pub fn new(analyzer: Arc<dyn CveAnalysisService>) -> Self {
        Self {
            analyzer,
            default_concurrency: DEFAULT_BULK_CONCURRENCY,
        }
    }

    pub fn with_default_concurrency(mut self, concurrency: usize) -> Self {
        self.default_concurrency = concurrency.max(1);
        self
    }

    /// Analyse every identifier, returning one entry per input in input order.
    ///
    /// At most `concurrency` analyses are in flight. Each worker claims the
    /// next unprocessed index from a shared cursor; a failing item becomes an
    /// entry carrying the error message and never aborts the batch.
    #[tracing::instrument(skip(self, identifiers), fields(count = identifiers.len()))]
    pub async fn analyze_bulk(
        &self,
        identifiers: &[String],
        concurrency: Option<usize>,
    ) -> BulkAnalysisResult {
        if identifiers.is_empty() {
            return BulkAnalysisResult::default();
        }

        let workers = concurrency
            .unwrap_or(self.default_concurrency)
            .clamp(1, identifiers.len());
        let cursor = AtomicUsize::new(0);
        let started = Instant::now();

        let cursor = &cursor;
        let analyzer = &self.analyzer;
        let worker = move || async move {
            let mut completed = Vec::new();
            loop {
                let index = cursor.fetch_add(1, Ordering::SeqCst);
                let Some(identifier) = identifiers.get(index) else {
                    break;
                };
                let entry = match analyzer.analyze(identifier).await {
                    Ok(record) => BulkAnalysisEntry::success(identifier.clone(), record),
                    Err(e) => {
                        debug!(identifier = %identifier, error = %e, "Bulk item failed");
                        BulkAnalysisEntry::failure(identifier.clone(), e.to_string())
                    }
                };
                completed.push((index, entry));
            }
            completed
        };

        let mut slots: Vec<Option<BulkAnalysisEntry>> = vec![None; identifiers.len()];
        for (index, entry) in join_all((0..workers).map(|_| worker())).await.into_iter().flatten() {
            slots[index] = Some(entry);
        }

        let entries: Vec<BulkAnalysisEntry> = slots
            .into_iter()
            .zip(identifiers)
            .map(|(slot, identifier)| {
                slot.unwrap_or_else(|| BulkAnalysisEntry::failure(identifier.clone(), "not processed"))
            })
            .collect();
        let result = BulkAnalysisResult { entries };

        info!(
            total = result.len(),
            succeeded = result.succeeded(),
            failed = result.failed(),
            workers,
            duration_ms = started.elapsed().as_millis() as u64,
            "Bulk analysis complete"
        );
        result
    }
}

/// Keyword threat overview over a publication window
pub struct ThreatAnalysisService {
    nvd: Arc<dyn NvdGateway>,
    epss: Arc<dyn EpssGateway>,
    cache: CacheSlot,
    page_size: u32,
    statistics: ThreatStatistics,
}

impl ThreatAnalysisService {
    pub fn new(nvd: Arc<dyn NvdGateway>, epss: Arc<dyn EpssGateway>) -> Self {
        Self {
            nvd,
            epss,
            cache: CacheSlot::none(),
            page_size: DEFAULT_KEYWORD_PAGE_SIZE,
            statistics: ThreatStatistics::new(),
        }
    }

    pub fn with_cache(mut self, cache: Arc<dyn AnalysisCache>, ttl: Duration) -> Self {
        self.cache = CacheSlot {
            cache: Some(cache),
            ttl,
        };
        self
    }

    pub fn with_page_size(mut self, page_size: u32) -> Self {
        self.page_size = page_size.max(1);
        self
    }

    fn cache_key(keyword: &str, window: &PublicationWindow) -> String {
        format!(
            "threat:{}:{}:{}",
            keyword.to_lowercase(),
            window.start.format("%Y-%m-%d"),
            window.end.format("%Y-%m-%d")
        )
    }

    fn summary_row(raw: &RawNvdCve) -> CveSummaryRow {
        let normalized = normalize_nvd(Some(raw));
        CveSummaryRow {
            id: raw.id.clone(),
            cvss: normalized
                .as_ref()
                .and_then(|n| n.cvss.as_ref())
                .and_then(|c| c.base_score)
                .unwrap_or(0.0),
            description: normalized
                .as_ref()
                .map(|n| n.description.clone())
                .unwrap_or_default(),
            published: normalized.as_ref().and_then(|n| n.published),
            cwe: normalized
                .as_ref()
                .and_then(|n| n.weaknesses.first())
                .map(|w| w.id.clone()),
            epss: None,
        }
    }

    async fn epss_for(&self, row: &CveSummaryRow) -> Option<f64> {
        let id = CveId::parse(&row.id).ok()?;
        match self.epss.get_score(&id).await {
            Ok(score) => score.map(|s| s.score),
            Err(e) => {
                warn!(cve = %id, error = %e, "EPSS enrichment failed");
                None
            }
        }
    }

    /// Summarise NVD activity for `keyword` published between `start` and `end`.
    ///
    /// An empty search is reported as [`ApplicationError::NoResults`]. Only the
    /// ten highest CVSS rows are enriched with EPSS.
    #[tracing::instrument(skip(self))]
    pub async fn analyze_keyword(
        &self,
        keyword: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<KeywordSummary, ApplicationError> {
        let keyword = keyword.trim();
        if keyword.is_empty() {
            return Err(DomainError::InvalidInput {
                field: "keyword".to_string(),
                message: "keyword must not be empty".to_string(),
            }
            .into());
        }
        let window = PublicationWindow::new(start, end)?;

        let cache_key = Self::cache_key(keyword, &window);
        if let Some(summary) = self.cache.get::<KeywordSummary>(&cache_key).await {
            return Ok(summary);
        }

        let raw = match self
            .nvd
            .search_by_keyword(keyword, Some(window.start), Some(window.end), self.page_size)
            .await
        {
            Ok(raw) => raw,
            Err(e) => {
                warn!(keyword, error = %e, "NVD keyword search failed, reporting no results");
                Vec::new()
            }
        };

        if raw.is_empty() {
            return Err(ApplicationError::NoResults {
                keyword: keyword.to_string(),
            });
        }

        let all_cves: Vec<CveSummaryRow> = raw.iter().map(Self::summary_row).collect();

        let mut top_by_cvss = self.statistics.sort_by_cvss(&all_cves, Some(TOP_CVSS_LIMIT));
        let scores = join_all(top_by_cvss.iter().map(|row| self.epss_for(row))).await;
        for (row, score) in top_by_cvss.iter_mut().zip(scores) {
            row.epss = score;
        }

        let (average_cvss, average_epss) = self.statistics.averages(&top_by_cvss);
        let summary = KeywordSummary {
            keyword: keyword.to_string(),
            window,
            total_cves: raw.len(),
            top_by_epss: self.statistics.sort_by_epss(&top_by_cvss),
            average_cvss,
            average_epss,
            top_weaknesses: self.statistics.top_weaknesses(&all_cves, TOP_WEAKNESS_LIMIT),
            kev_count: 0,
            top_by_cvss,
            all_cves,
        };

        info!(
            keyword,
            total = summary.total_cves,
            average_cvss = summary.average_cvss,
            "Keyword analysis complete"
        );

        self.cache.put(&cache_key, &summary).await;
        Ok(summary)
    }
}
