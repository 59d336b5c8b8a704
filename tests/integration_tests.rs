//! End-to-end tests: real HTTP gateways against a mock upstream, wired
//! through the services and the router exactly as `main` does it

use axum::{
    body::Body,
    http::{Request, StatusCode},
};
use chrono::{Duration as ChronoDuration, TimeZone, Utc};
use http_body_util::BodyExt;
use mockito::{Matcher, Mock, Server, ServerGuard};
use serde_json::{Value, json};
use std::sync::Arc;
use std::time::Duration;
use tower::ServiceExt;

use cve_radar::{
    Config,
    application::{
        ApplicationError, BulkAnalysisService, CveAnalysisService, CveAnalysisServiceImpl,
        ThreatAnalysisService,
    },
    domain::PublicationWindow,
    infrastructure::{EpssClient, KevClient, NvdClient, RetryConfig},
    presentation::{AppState, create_router},
};

mod fixtures {
    use serde_json::{Value, json};

    pub fn nvd_envelope(cves: Vec<Value>) -> Value {
        json!({
            "resultsPerPage": cves.len(),
            "startIndex": 0,
            "totalResults": cves.len(),
            "format": "NVD_CVE",
            "version": "2.0",
            "vulnerabilities": cves.into_iter().map(|cve| json!({ "cve": cve })).collect::<Vec<_>>()
        })
    }

    pub fn log4shell() -> Value {
        json!({
            "id": "CVE-2021-44228",
            "sourceIdentifier": "security@apache.org",
            "published": "2021-12-10T10:15:09.143",
            "lastModified": "2024-04-03T17:15:10.450",
            "vulnStatus": "Modified",
            "descriptions": [
                { "lang": "en", "value": "Apache Log4j2 JNDI features do not protect against attacker controlled LDAP and other JNDI related endpoints." },
                { "lang": "es", "value": "Las funciones JNDI de Apache Log4j2 no protegen contra LDAP controlado por un atacante." }
            ],
            "metrics": {
                "cvssMetricV31": [{
                    "source": "nvd@nist.gov",
                    "type": "Primary",
                    "cvssData": {
                        "version": "3.1",
                        "vectorString": "CVSS:3.1/AV:N/AC:L/PR:N/UI:N/S:C/C:H/I:H/A:H",
                        "baseScore": 10.0,
                        "baseSeverity": "CRITICAL"
                    },
                    "exploitabilityScore": 3.9,
                    "impactScore": 6.0
                }],
                "cvssMetricV2": [{
                    "cvssData": {
                        "version": "2.0",
                        "vectorString": "AV:N/AC:M/Au:N/C:C/I:C/A:C",
                        "baseScore": 9.3
                    },
                    "baseSeverity": "HIGH"
                }]
            },
            "weaknesses": [
                { "source": "nvd@nist.gov", "type": "Primary", "description": [{ "lang": "en", "value": "CWE-917" }] },
                { "source": "security@apache.org", "type": "Secondary", "description": [{ "lang": "en", "value": "NVD-CWE-noinfo" }] }
            ],
            "configurations": [{
                "nodes": [{
                    "operator": "OR",
                    "negate": false,
                    "cpeMatch": [
                        {
                            "vulnerable": true,
                            "criteria": "cpe:2.3:a:apache:log4j:*:*:*:*:*:*:*:*",
                            "versionStartIncluding": "2.0.1",
                            "versionEndExcluding": "2.3.1",
                            "matchCriteriaId": "03FA5E81-F9C0-403E-8A4B-E4284E4E7B72"
                        },
                        {
                            "vulnerable": true,
                            "criteria": "cpe:2.3:a:apache:log4j:2.0:-:*:*:*:*:*:*",
                            "matchCriteriaId": "17854E42-7063-4A55-BF2A-4C7074CC2D60"
                        }
                    ]
                }]
            }],
            "references": [
                { "url": "https://logging.apache.org/log4j/2.x/security.html", "source": "security@apache.org" },
                { "url": "https://www.kb.cert.org/vuls/id/930724", "source": "security@apache.org" }
            ]
        })
    }

    pub fn keyword_hit(id: &str, score: f64) -> Value {
        json!({
            "id": id,
            "published": "2024-02-01T00:00:00.000",
            "descriptions": [{ "lang": "en", "value": format!("Issue {}", id) }],
            "metrics": {
                "cvssMetricV30": [{
                    "cvssData": {
                        "version": "3.0",
                        "vectorString": "CVSS:3.0/AV:N/AC:L/PR:N/UI:N/S:U/C:H/I:N/A:N",
                        "baseScore": score,
                        "baseSeverity": "HIGH"
                    }
                }]
            },
            "weaknesses": [{ "description": [{ "lang": "en", "value": "CWE-295" }] }]
        })
    }

    pub fn epss(id: &str, score: &str) -> Value {
        json!({
            "status": "OK",
            "status-code": 200,
            "version": "1.0",
            "total": 1,
            "data": [{ "cve": id, "epss": score, "percentile": "0.999910000", "date": "2024-05-01" }]
        })
    }

    pub fn kev_catalog() -> Value {
        json!({
            "title": "CISA Catalog of Known Exploited Vulnerabilities",
            "catalogVersion": "2024.05.01",
            "count": 1,
            "vulnerabilities": [{
                "cveID": "CVE-2021-44228",
                "vendorProject": "Apache",
                "product": "Log4j2",
                "vulnerabilityName": "Apache Log4j2 Remote Code Execution Vulnerability",
                "dateAdded": "2021-12-10",
                "shortDescription": "Apache Log4j2 contains a vulnerability where JNDI features do not protect against attacker-controlled JNDI-related endpoints.",
                "requiredAction": "For all affected software assets for which updates exist, the only acceptable remediation actions are: 1) Apply updates; OR 2) remove affected assets from agency networks.",
                "dueDate": "2021-12-24",
                "knownRansomwareCampaignUse": "Known",
                "notes": ""
            }]
        })
    }
}

fn fast_retry(max_attempts: u32) -> RetryConfig {
    RetryConfig {
        max_attempts,
        attempt_timeout: Duration::from_secs(5),
        initial_delay: Duration::from_millis(1),
    }
}

struct Upstream {
    server: ServerGuard,
}

impl Upstream {
    async fn start() -> Self {
        Self {
            server: Server::new_async().await,
        }
    }

    fn nvd(&self, max_attempts: u32) -> Arc<NvdClient> {
        Arc::new(
            NvdClient::new(format!("{}/rest/json", self.server.url()), None)
                .with_retry(fast_retry(max_attempts)),
        )
    }

    fn epss(&self) -> Arc<EpssClient> {
        Arc::new(
            EpssClient::new(format!("{}/data/v1/epss", self.server.url()))
                .with_retry(fast_retry(2)),
        )
    }

    fn kev(&self) -> Arc<KevClient> {
        Arc::new(
            KevClient::new(format!("{}/feeds/kev.json", self.server.url()))
                .with_retry(fast_retry(2)),
        )
    }

    fn analyzer(&self, max_attempts: u32) -> Arc<CveAnalysisServiceImpl> {
        Arc::new(CveAnalysisServiceImpl::new(
            self.nvd(max_attempts),
            self.epss(),
            self.kev(),
        ))
    }

    async fn mock_nvd_cve(&mut self, id: &str, status: usize, body: Value, hits: usize) -> Mock {
        self.server
            .mock("GET", "/rest/json/cves/2.0")
            .match_query(Matcher::UrlEncoded("cveId".into(), id.into()))
            .with_status(status)
            .with_header("content-type", "application/json")
            .with_body(body.to_string())
            .expect(hits)
            .create_async()
            .await
    }

    async fn mock_epss(&mut self, id: &str, status: usize, body: Value) -> Mock {
        self.server
            .mock("GET", "/data/v1/epss")
            .match_query(Matcher::UrlEncoded("cve".into(), id.into()))
            .with_status(status)
            .with_header("content-type", "application/json")
            .with_body(body.to_string())
            .create_async()
            .await
    }

    async fn mock_kev(&mut self, status: usize) -> Mock {
        self.server
            .mock("GET", "/feeds/kev.json")
            .with_status(status)
            .with_header("content-type", "application/json")
            .with_body(fixtures::kev_catalog().to_string())
            .create_async()
            .await
    }
}

async fn get_json(app: axum::Router, uri: &str) -> (StatusCode, Value) {
    let response = app
        .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
        .await
        .unwrap();
    let status = response.status();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    (status, serde_json::from_slice(&bytes).unwrap_or(Value::Null))
}

#[tokio::test]
async fn test_cve_lookup_through_router() {
    let mut upstream = Upstream::start().await;
    let nvd = upstream
        .mock_nvd_cve(
            "CVE-2021-44228",
            200,
            fixtures::nvd_envelope(vec![fixtures::log4shell()]),
            1,
        )
        .await;
    let _epss = upstream
        .mock_epss("CVE-2021-44228", 200, fixtures::epss("CVE-2021-44228", "0.975580000"))
        .await;
    let _kev = upstream.mock_kev(200).await;

    let analyzer = upstream.analyzer(3);
    let state = AppState {
        analysis_service: analyzer.clone(),
        bulk_service: Arc::new(BulkAnalysisService::new(analyzer)),
        threat_service: Arc::new(ThreatAnalysisService::new(
            upstream.nvd(3),
            upstream.epss(),
        )),
        cache: None,
        keyword_default_days: 30,
    };
    let app = create_router(state, &Config::default());

    let (status, body) = get_json(app, "/api/v1/cves/cve-2021-44228").await;

    nvd.assert_async().await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["id"], "CVE-2021-44228");
    assert!(body["description"].as_str().unwrap().starts_with("Apache Log4j2"));
    assert_eq!(body["cvss"]["version"], "3.1");
    assert_eq!(body["cvss"]["severity"], "CRITICAL");
    assert_eq!(body["cvss"]["impact"], "High");
    assert_eq!(body["weaknesses"].as_array().unwrap().len(), 1);
    assert_eq!(body["affected_products"][0]["display_name"], "apache:log4j (up to 2.3.1)");
    assert_eq!(body["affected_products"][1]["version"], "2.0");
    assert_eq!(body["epss"]["score"], 0.97558);
    assert_eq!(body["exploitation"]["exploited"], true);
    assert_eq!(body["exploitation"]["details"]["known_ransomware_use"], "Known");
    assert!(body["exploitation"]["details"]["notes"].is_null());
    assert_eq!(body["risk"]["score"], 10);
    assert_eq!(body["risk"]["level"], "Critical");
    assert_eq!(body["nvd_url"], "https://nvd.nist.gov/vuln/detail/CVE-2021-44228");
}

#[tokio::test]
async fn test_secondary_sources_degrade_gracefully() {
    let mut upstream = Upstream::start().await;
    let _nvd = upstream
        .mock_nvd_cve(
            "CVE-2021-44228",
            200,
            fixtures::nvd_envelope(vec![fixtures::log4shell()]),
            1,
        )
        .await;
    let _epss = upstream
        .mock_epss("CVE-2021-44228", 500, json!({ "error": "boom" }))
        .await;
    let _kev = upstream.mock_kev(502).await;

    let record = upstream.analyzer(3).analyze("CVE-2021-44228").await.unwrap();

    assert!(record.epss.is_none());
    assert!(!record.exploitation.exploited);
    // 10.0 / 12 * 10 rounds to 8
    assert_eq!(record.risk.score, 8);
}

#[tokio::test]
async fn test_nvd_outage_reports_not_found_after_retries() {
    let mut upstream = Upstream::start().await;
    let nvd = upstream
        .mock_nvd_cve("CVE-2021-44228", 503, json!({ "message": "busy" }), 2)
        .await;
    let _epss = upstream
        .mock_epss("CVE-2021-44228", 200, fixtures::epss("CVE-2021-44228", "0.5"))
        .await;
    let _kev = upstream.mock_kev(200).await;

    let result = upstream.analyzer(2).analyze("CVE-2021-44228").await;

    nvd.assert_async().await;
    match result {
        Err(ApplicationError::NotFound { id, .. }) => assert_eq!(id, "CVE-2021-44228"),
        other => panic!("expected NotFound, got {:?}", other),
    }
}

#[tokio::test]
async fn test_long_keyword_window_is_split_and_summed() {
    let mut upstream = Upstream::start().await;
    let search = upstream
        .server
        .mock("GET", "/rest/json/cves/2.0")
        .match_query(Matcher::AllOf(vec![
            Matcher::UrlEncoded("keywordSearch".into(), "openssl".into()),
            Matcher::UrlEncoded("resultsPerPage".into(), "200".into()),
        ]))
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(
            fixtures::nvd_envelope(vec![
                fixtures::keyword_hit("CVE-2024-0727", 5.5),
                fixtures::keyword_hit("CVE-2024-2511", 7.5),
            ])
            .to_string(),
        )
        .expect(4)
        .create_async()
        .await;
    let _epss = upstream
        .server
        .mock("GET", "/data/v1/epss")
        .match_query(Matcher::Any)
        .with_status(200)
        .with_body(fixtures::epss("CVE-2024-2511", "0.01").to_string())
        .create_async()
        .await;

    let service = ThreatAnalysisService::new(upstream.nvd(1), upstream.epss());
    let start = Utc.with_ymd_and_hms(2023, 1, 1, 0, 0, 0).unwrap();
    let end = start + ChronoDuration::days(400);

    let summary = service.analyze_keyword("openssl", start, end).await.unwrap();

    search.assert_async().await;
    assert_eq!(summary.total_cves, 8);
    assert_eq!(summary.all_cves.len(), 8);
    assert_eq!(summary.top_by_cvss.len(), 8);
    assert_eq!(summary.top_by_cvss[0].id, "CVE-2024-2511");
    assert_eq!(summary.top_by_cvss[0].epss, Some(0.01));
    assert_eq!(summary.average_cvss, 6.5);
    assert_eq!(summary.top_weaknesses[0].cwe, "CWE-295");
    assert_eq!(summary.top_weaknesses[0].count, 8);
    assert_eq!(summary.window.start, start);
    assert_eq!(summary.window.end, end);
}

#[tokio::test]
async fn test_failed_window_does_not_discard_the_others() {
    let mut upstream = Upstream::start().await;
    let start = Utc.with_ymd_and_hms(2023, 1, 1, 0, 0, 0).unwrap();
    let end = start + ChronoDuration::days(400);
    let windows = PublicationWindow::new(start, end).unwrap().split(120);
    assert_eq!(windows.len(), 4);

    let mut mocks = Vec::new();
    for (index, window) in windows.iter().enumerate() {
        let matcher = Matcher::AllOf(vec![
            Matcher::UrlEncoded("keywordSearch".into(), "openssl".into()),
            Matcher::UrlEncoded(
                "pubStartDate".into(),
                window.start.format("%Y-%m-%dT%H:%M:%S%.3f").to_string(),
            ),
        ]);
        let mock = upstream
            .server
            .mock("GET", "/rest/json/cves/2.0")
            .match_query(matcher);
        let mock = if index == 2 {
            mock.with_status(503).expect(2)
        } else {
            let id = format!("CVE-2023-{:04}", 1000 + index);
            mock.with_status(200)
                .with_header("content-type", "application/json")
                .with_body(
                    fixtures::nvd_envelope(vec![fixtures::keyword_hit(&id, 5.0 + index as f64)])
                        .to_string(),
                )
                .expect(1)
        };
        mocks.push(mock.create_async().await);
    }
    let _epss = upstream
        .server
        .mock("GET", "/data/v1/epss")
        .match_query(Matcher::Any)
        .with_status(200)
        .with_body(json!({ "data": [] }).to_string())
        .create_async()
        .await;

    let service = ThreatAnalysisService::new(upstream.nvd(2), upstream.epss());
    let summary = service.analyze_keyword("openssl", start, end).await.unwrap();

    for mock in &mocks {
        mock.assert_async().await;
    }
    assert_eq!(summary.total_cves, 3);
    let ids: Vec<&str> = summary.all_cves.iter().map(|row| row.id.as_str()).collect();
    assert_eq!(ids, vec!["CVE-2023-1000", "CVE-2023-1001", "CVE-2023-1003"]);
    assert_eq!(summary.top_by_cvss[0].id, "CVE-2023-1003");
}

#[tokio::test]
async fn test_keyword_without_matches_over_http() {
    let mut upstream = Upstream::start().await;
    let _search = upstream
        .server
        .mock("GET", "/rest/json/cves/2.0")
        .match_query(Matcher::Any)
        .with_status(200)
        .with_body(fixtures::nvd_envelope(vec![]).to_string())
        .create_async()
        .await;

    let analyzer = upstream.analyzer(1);
    let state = AppState {
        analysis_service: analyzer.clone(),
        bulk_service: Arc::new(BulkAnalysisService::new(analyzer)),
        threat_service: Arc::new(ThreatAnalysisService::new(
            upstream.nvd(1),
            upstream.epss(),
        )),
        cache: None,
        keyword_default_days: 30,
    };
    let app = create_router(state, &Config::default());

    let (status, body) = get_json(app, "/api/v1/threats?keyword=zzzz-no-such-product").await;

    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["code"], "NO_RESULTS");
    assert!(body["message"].as_str().unwrap().contains("zzzz-no-such-product"));
}

#[tokio::test]
async fn test_bulk_mixes_successes_and_failures() {
    let mut upstream = Upstream::start().await;
    let _known = upstream
        .mock_nvd_cve(
            "CVE-2021-44228",
            200,
            fixtures::nvd_envelope(vec![fixtures::log4shell()]),
            1,
        )
        .await;
    let _unknown = upstream
        .mock_nvd_cve("CVE-2099-00001", 200, fixtures::nvd_envelope(vec![]), 1)
        .await;
    let _epss = upstream
        .server
        .mock("GET", "/data/v1/epss")
        .match_query(Matcher::Any)
        .with_status(200)
        .with_body(json!({ "data": [] }).to_string())
        .create_async()
        .await;
    let _kev = upstream.mock_kev(200).await;

    let bulk = BulkAnalysisService::new(upstream.analyzer(1));
    let input = vec![
        "CVE-2099-00001".to_string(),
        "CVE-2021-44228".to_string(),
        "CVE-XXXX-1".to_string(),
    ];

    let result = bulk.analyze_bulk(&input, Some(3)).await;

    assert_eq!(result.len(), 3);
    assert!(!result.entries[0].is_success());
    assert_eq!(
        result.entries[1].record.as_ref().unwrap().id.as_str(),
        "CVE-2021-44228"
    );
    assert!(result.entries[2].error.is_some());
    assert_eq!(result.exploited(), 1);
}
