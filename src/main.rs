//! cve-radar - Main application entry point

use std::{net::SocketAddr, sync::Arc, time::Duration};
use tokio::{net::TcpListener, signal};
use tokio_util::sync::CancellationToken;

use cve_radar::{
    Config,
    application::{
        AnalysisCache, ApplicationError, BulkAnalysisService, CveAnalysisServiceImpl,
        ThreatAnalysisService,
    },
    infrastructure::{EpssClient, FileCacheRepository, KevClient, NvdClient, RetryConfig},
    init_tracing,
    presentation::{AppState, create_router},
};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config = Config::load().unwrap_or_else(|e| {
        eprintln!("Failed to load configuration ({}), using defaults", e);
        Config::default()
    });

    init_tracing(&config.logging)?;

    tracing::info!("Starting cve-radar server...");
    tracing::info!(
        "Configuration loaded: server={}:{}",
        config.server.host,
        config.server.port
    );

    // Cancelled on shutdown: stops in-flight upstream retries and the cache sweeper
    let shutdown = CancellationToken::new();

    let api_key = config.apis.nvd.api_key.clone().filter(|k| !k.is_empty());
    if api_key.is_none() {
        tracing::info!("NVD API key not provided; requests use the public rate limit");
    }
    let nvd_client = Arc::new(
        NvdClient::new(config.apis.nvd.base_url.clone(), api_key)
            .with_retry(RetryConfig::from(&config.apis.nvd.retry))
            .with_window_days(config.apis.nvd.window_days)
            .with_cancellation(shutdown.clone()),
    );
    let epss_client = Arc::new(
        EpssClient::new(config.apis.epss.base_url.clone())
            .with_retry(RetryConfig::from(&config.apis.epss.retry))
            .with_cancellation(shutdown.clone()),
    );
    let kev_client = Arc::new(
        KevClient::new(config.apis.kev.catalog_url.clone())
            .with_retry(RetryConfig::from(&config.apis.kev.retry))
            .with_cancellation(shutdown.clone()),
    );

    let mut analysis_service =
        CveAnalysisServiceImpl::new(nvd_client.clone(), epss_client.clone(), kev_client);
    let mut threat_service = ThreatAnalysisService::new(nvd_client, epss_client)
        .with_page_size(config.analysis.keyword_page_size);

    let cache = if config.cache.enabled {
        let repository = Arc::new(FileCacheRepository::new(config.cache.directory.clone()));
        repository.clone().start_background_cleanup(
            Duration::from_secs(config.cache.cleanup_interval_seconds.max(1)),
            shutdown.clone(),
        );
        let shared: Arc<dyn AnalysisCache> = repository.clone();
        analysis_service = analysis_service
            .with_cache(shared.clone(), Duration::from_secs(config.cache.ttl_seconds));
        threat_service = threat_service.with_cache(
            shared,
            Duration::from_secs(config.analysis.threat_cache_ttl_seconds),
        );
        tracing::info!(directory = %config.cache.directory.display(), "File cache enabled");
        Some(repository)
    } else {
        None
    };

    let analysis_service = Arc::new(analysis_service);
    let bulk_service = Arc::new(
        BulkAnalysisService::new(analysis_service.clone())
            .with_default_concurrency(config.analysis.bulk_concurrency),
    );

    let app_state = AppState {
        analysis_service,
        bulk_service,
        threat_service: Arc::new(threat_service),
        cache,
        keyword_default_days: config.analysis.keyword_default_days,
    };

    let app = create_router(app_state, &config);

    let host = config
        .server
        .host
        .parse()
        .map_err(|e| ApplicationError::Configuration {
            message: format!("invalid server.host '{}': {}", config.server.host, e),
        })?;
    let addr = SocketAddr::new(host, config.server.port);

    tracing::info!("Server listening on {}", addr);
    if config.server.enable_docs {
        tracing::info!("OpenAPI document available at http://{}/api-docs/openapi.json", addr);
    }

    let listener = TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal(shutdown))
        .await?;

    tracing::info!("Server shutdown complete");
    Ok(())
}

/// Wait for Ctrl+C or SIGTERM, then cancel background work
async fn shutdown_signal(shutdown: CancellationToken) {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::info!("Received Ctrl+C, initiating graceful shutdown");
        },
        _ = terminate => {
            tracing::info!("Received SIGTERM, initiating graceful shutdown");
        },
    }

    shutdown.cancel();
}
