//! Wiring: builds the clients and the job from the configuration and runs
//! the collector next to its metrics endpoint.

use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::info;

use cloud_billing_core::{Product, ResourceKind};
use cloud_billing_odoo::{ClientOptions, OdooClient, OdooCredentials};

use crate::aggregate::Aggregator;
use crate::billing_party::BillingPartySource;
use crate::config::{
    BillingPartyConfig, BillingSettings, CollectorConfig, ExoscaleSettings, JobConfig,
    KubernetesSettings,
};
use crate::error::CollectorError;
use crate::jobs::{BillingJob, ManagedResourceJob, ProductLine, SpksJob};
use crate::metrics::CollectorMetrics;
use crate::routes::create_router;
use crate::runner::Runner;
use crate::sink::BillingSink;
use crate::sources::{
    BucketMeter, CloudscaleClient, CloudscaleUsage, ExoscaleClient, ExoscaleCredentials,
    ExoscaleDbaasUsage, ExoscaleSosUsage, KubernetesClient, PrometheusClient, SharedBucketMetrics,
};
use crate::state::AppState;

/// Build the job selected by `config`.
///
/// # Errors
///
/// Returns an error if a client cannot be constructed.
pub fn build_job(
    config: &CollectorConfig,
    metrics: Arc<CollectorMetrics>,
) -> Result<Arc<dyn BillingJob>, CollectorError> {
    let timeout = config.http_timeout;
    let sink: Arc<dyn BillingSink> = Arc::new(OdooClient::with_options(
        config.odoo.url.clone(),
        OdooCredentials {
            token_url: config.odoo.token_url.clone(),
            client_id: config.odoo.client_id.clone(),
            client_secret: config.odoo.client_secret.clone(),
        },
        ClientOptions {
            timeout_seconds: timeout.as_secs(),
        },
    )?);

    let name = config.job.name();
    let job: Arc<dyn BillingJob> = match &config.job {
        JobConfig::ExoscaleObjectStorage {
            exoscale,
            kubernetes,
            billing,
        } => {
            let client = Arc::new(exoscale_client(exoscale, config)?);
            let line = ProductLine::new(
                aggregator(Product::ExoscaleObjectStorage, billing),
                Arc::new(ExoscaleSosUsage::new(client)),
            );
            Arc::new(
                ManagedResourceJob::new(
                    name,
                    kubernetes_client(kubernetes, config)?,
                    vec![ResourceKind::ExoscaleBucket],
                    billing_party_source(billing, config)?,
                    sink,
                    metrics,
                )
                .with_line(line),
            )
        }
        JobConfig::ExoscaleDbaas {
            exoscale,
            kubernetes,
            billing,
            zones,
        } => {
            let client = Arc::new(exoscale_client(exoscale, config)?);
            let line = ProductLine::new(
                aggregator(Product::ExoscaleDbaas, billing),
                Arc::new(ExoscaleDbaasUsage::new(client)),
            )
            .with_zones(zones.clone());
            Arc::new(
                ManagedResourceJob::new(
                    name,
                    kubernetes_client(kubernetes, config)?,
                    ResourceKind::EXOSCALE_DBAAS.to_vec(),
                    billing_party_source(billing, config)?,
                    sink,
                    metrics,
                )
                .with_line(line),
            )
        }
        JobConfig::CloudscaleObjectStorage {
            api_url,
            token,
            kubernetes,
            billing,
        } => {
            let bucket_metrics = Arc::new(SharedBucketMetrics::new(CloudscaleClient::new(
                api_url.clone(),
                token.clone(),
                timeout,
            )?));
            let job = ManagedResourceJob::new(
                name,
                kubernetes_client(kubernetes, config)?,
                vec![ResourceKind::CloudscaleBucket],
                billing_party_source(billing, config)?,
                sink,
                metrics,
            );
            let job = BucketMeter::ALL.into_iter().fold(job, |job, meter| {
                job.with_line(ProductLine::new(
                    aggregator(meter.product(), billing),
                    Arc::new(CloudscaleUsage::new(Arc::clone(&bucket_metrics), meter)),
                ))
            });
            Arc::new(job)
        }
        JobConfig::Spks {
            prometheus_url,
            settings,
        } => Arc::new(SpksJob::new(
            Arc::new(PrometheusClient::new(prometheus_url.clone(), timeout)?),
            settings.clone(),
            sink,
            metrics,
        )),
    };

    Ok(job)
}

fn aggregator(product: Product, billing: &BillingSettings) -> Aggregator {
    let unit = product.default_unit();
    Aggregator::new(product, unit, billing.units.unit_id(unit), billing.cluster_id.clone())
}

fn exoscale_client(
    settings: &ExoscaleSettings,
    config: &CollectorConfig,
) -> Result<ExoscaleClient, CollectorError> {
    Ok(ExoscaleClient::new(
        settings.api_url.clone(),
        ExoscaleCredentials {
            key: settings.key.clone(),
            secret: settings.secret.clone(),
        },
        config.http_timeout,
    )?)
}

fn kubernetes_client(
    settings: &KubernetesSettings,
    config: &CollectorConfig,
) -> Result<Arc<KubernetesClient>, CollectorError> {
    Ok(Arc::new(KubernetesClient::new(
        settings.server_url.clone(),
        settings.token.clone(),
        settings.ca_pem.as_deref(),
        config.http_timeout,
    )?))
}

fn billing_party_source(
    billing: &BillingSettings,
    config: &CollectorConfig,
) -> Result<BillingPartySource, CollectorError> {
    Ok(match &billing.party {
        BillingPartyConfig::Static(order) => BillingPartySource::Static(order.clone()),
        BillingPartyConfig::Prometheus { url } => BillingPartySource::Lookup(Arc::new(
            PrometheusClient::new(url.clone(), config.http_timeout)?,
        )),
    })
}

/// Run the collector until `cancel` fires.
///
/// The metrics endpoint is served for as long as the runner is alive.
///
/// # Errors
///
/// Returns an error if a client cannot be built or the listener cannot be
/// bound. Failed runs are not errors.
pub async fn run(config: CollectorConfig, cancel: CancellationToken) -> Result<(), CollectorError> {
    let metrics = Arc::new(CollectorMetrics::new());
    let job = build_job(&config, metrics.clone())?;

    let router = create_router(AppState::new(metrics.clone(), config.job.name()));
    let listener = tokio::net::TcpListener::bind(config.bind).await?;
    info!(bind = %config.bind, "Serving metrics");

    let server_cancel = cancel.clone();
    let server = tokio::spawn(async move {
        axum::serve(listener, router)
            .with_graceful_shutdown(async move { server_cancel.cancelled().await })
            .await
    });

    Runner::new(job, config.schedule, metrics)
        .with_catch_up(config.catch_up_days)
        .run(cancel.clone())
        .await;

    cancel.cancel();
    match server.await {
        Ok(result) => result?,
        Err(e) => tracing::warn!(error = %e, "Metrics server task failed"),
    }
    Ok(())
}

/// Resolve when the process is asked to stop.
pub async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {}
        () = terminate => {}
    }
}
