//! Command line interface.
//!
//! Every flag has an environment variable equivalent, which is how the
//! collector is normally configured in a cluster.

use std::net::SocketAddr;
use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};

use crate::config::UnitMapping;
use crate::sources::{cloudscale, exoscale};

/// In-cluster Prometheus the SPKS counts are read from by default.
pub const SPKS_PROMETHEUS_URL: &str =
    "http://prometheus-monitoring-application.monitoring-application.svc.cluster.local:9090";

/// Cloud services billing collector.
#[derive(Debug, Parser)]
#[command(name = "billing-collector", version, about)]
pub struct Cli {
    /// Logging options.
    #[command(flatten)]
    pub logging: LoggingArgs,

    /// Address the metrics endpoint listens on.
    #[arg(long, env = "BIND", default_value = "0.0.0.0:9123")]
    pub bind: SocketAddr,

    /// What to collect.
    #[command(subcommand)]
    pub command: Command,
}

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum LogFormat {
    /// Human readable.
    Console,
    /// One JSON object per line.
    Json,
}

/// Logging options.
#[derive(Debug, Args)]
pub struct LoggingArgs {
    /// Verbosity: 0 is info, 1 debug, 2 and above trace.
    #[arg(long, env = "LOG_LEVEL", default_value_t = 0)]
    pub log_level: u8,

    /// Log format.
    #[arg(long, env = "LOG_FORMAT", value_enum, default_value_t = LogFormat::Console)]
    pub log_format: LogFormat,
}

/// Collector subcommands.
#[derive(Debug, Subcommand)]
pub enum Command {
    /// Collect usage of Exoscale services.
    Exoscale {
        /// Exoscale product.
        #[command(subcommand)]
        product: ExoscaleCommand,
    },
    /// Collect usage of cloudscale services.
    Cloudscale {
        /// cloudscale product.
        #[command(subcommand)]
        product: CloudscaleCommand,
    },
    /// Count SPKS instances from Prometheus.
    Spks(SpksArgs),
}

/// Exoscale products.
#[derive(Debug, Subcommand)]
pub enum ExoscaleCommand {
    /// Bill SOS bucket storage, daily.
    Objectstorage(ExoscaleObjectStorageArgs),
    /// Bill DBaaS instances, hourly.
    Dbaas(ExoscaleDbaasArgs),
}

/// cloudscale products.
#[derive(Debug, Subcommand)]
pub enum CloudscaleCommand {
    /// Bill bucket storage, traffic and requests, daily.
    Objectstorage(CloudscaleObjectStorageArgs),
}

/// Exoscale API access.
#[derive(Debug, Args)]
pub struct ExoscaleArgs {
    /// Exoscale API key.
    #[arg(long, env = "EXOSCALE_API_KEY")]
    pub exoscale_access_key: String,

    /// Exoscale API secret.
    #[arg(long, env = "EXOSCALE_API_SECRET", hide_env_values = true)]
    pub exoscale_secret: String,

    /// Exoscale API URL; `{zone}` is replaced per request.
    #[arg(long, env = "EXOSCALE_API_URL", default_value = exoscale::DEFAULT_API_URL)]
    pub exoscale_api_url: String,
}

/// Kubernetes API access.
#[derive(Debug, Args)]
pub struct KubernetesArgs {
    /// Kubernetes API server URL.
    #[arg(
        long,
        env = "KUBERNETES_SERVER_URL",
        default_value = "https://kubernetes.default.svc"
    )]
    pub kubernetes_server_url: String,

    /// Bearer token; takes precedence over the token file.
    #[arg(long, env = "KUBERNETES_SERVER_TOKEN", hide_env_values = true)]
    pub kubernetes_server_token: Option<String>,

    /// File containing the bearer token.
    #[arg(long, env = "KUBERNETES_TOKEN_FILE")]
    pub kubernetes_token_file: Option<PathBuf>,

    /// PEM bundle trusted for the API server.
    #[arg(long, env = "KUBERNETES_CA_FILE")]
    pub kubernetes_ca_file: Option<PathBuf>,
}

/// Billing API access.
#[derive(Debug, Args)]
pub struct OdooArgs {
    /// Metered billing endpoint.
    #[arg(long, env = "ODOO_URL")]
    pub odoo_url: String,

    /// OAuth2 token endpoint.
    #[arg(long, env = "ODOO_OAUTH_TOKEN_URL")]
    pub odoo_oauth_token_url: String,

    /// OAuth2 client id.
    #[arg(long, env = "ODOO_OAUTH_CLIENT_ID")]
    pub odoo_oauth_client_id: String,

    /// OAuth2 client secret.
    #[arg(long, env = "ODOO_OAUTH_CLIENT_SECRET", hide_env_values = true)]
    pub odoo_oauth_client_secret: String,
}

/// Record attribution.
#[derive(Debug, Args)]
pub struct BillingArgs {
    /// Bill every record against this sales order instead of looking it up.
    #[arg(long, env = "SALES_ORDER_ID")]
    pub sales_order_id: Option<String>,

    /// Prometheus queried for the sales order of each organization.
    #[arg(long, env = "PROMETHEUS_URL")]
    pub prometheus_url: Option<String>,

    /// Cluster named in the item group description.
    #[arg(long, env = "CLUSTER_ID")]
    pub cluster_id: String,

    /// Billing system unit ids, as `GBDay=uom_1,InstanceHour=uom_2`.
    #[arg(long, env = "UNIT_MAPPING", default_value = "")]
    pub unit_mapping: UnitMapping,
}

/// Daily schedule and catch-up.
#[derive(Debug, Args)]
pub struct DailyArgs {
    /// Hour of day (Europe/Zurich) at which the daily run happens.
    #[arg(long, env = "BILLING_HOUR", default_value_t = 6)]
    pub billing_hour: u32,

    /// Past days to collect on startup before following the schedule.
    #[arg(long, env = "DAYS", default_value_t = 0)]
    pub days: u32,
}

/// Shared options.
#[derive(Debug, Args)]
pub struct CommonArgs {
    /// Timeout for every outgoing HTTP request, in seconds.
    #[arg(long, env = "HTTP_TIMEOUT_SECONDS", default_value_t = 30)]
    pub http_timeout_seconds: u64,

    /// Billing API access.
    #[command(flatten)]
    pub odoo: OdooArgs,
}

/// `exoscale objectstorage`
#[derive(Debug, Args)]
pub struct ExoscaleObjectStorageArgs {
    /// Exoscale API access.
    #[command(flatten)]
    pub exoscale: ExoscaleArgs,
    /// Kubernetes API access.
    #[command(flatten)]
    pub kubernetes: KubernetesArgs,
    /// Record attribution.
    #[command(flatten)]
    pub billing: BillingArgs,
    /// Schedule.
    #[command(flatten)]
    pub daily: DailyArgs,
    /// Shared options.
    #[command(flatten)]
    pub common: CommonArgs,
}

/// `exoscale dbaas`
#[derive(Debug, Args)]
pub struct ExoscaleDbaasArgs {
    /// Exoscale API access.
    #[command(flatten)]
    pub exoscale: ExoscaleArgs,
    /// Kubernetes API access.
    #[command(flatten)]
    pub kubernetes: KubernetesArgs,
    /// Record attribution.
    #[command(flatten)]
    pub billing: BillingArgs,
    /// Zones DBaaS services are listed in.
    #[arg(
        long,
        env = "EXOSCALE_ZONES",
        value_delimiter = ',',
        default_values_t = exoscale::EXOSCALE_ZONES.map(String::from)
    )]
    pub zones: Vec<String>,
    /// Hours between runs.
    #[arg(long, env = "COLLECT_INTERVAL", default_value_t = 1)]
    pub collect_interval: u64,
    /// Shared options.
    #[command(flatten)]
    pub common: CommonArgs,
}

/// `cloudscale objectstorage`
#[derive(Debug, Args)]
pub struct CloudscaleObjectStorageArgs {
    /// cloudscale API token.
    #[arg(long, env = "CLOUDSCALE_API_TOKEN", hide_env_values = true)]
    pub cloudscale_api_token: String,
    /// cloudscale API URL.
    #[arg(long, env = "CLOUDSCALE_API_URL", default_value = cloudscale::DEFAULT_API_URL)]
    pub cloudscale_api_url: String,
    /// Kubernetes API access.
    #[command(flatten)]
    pub kubernetes: KubernetesArgs,
    /// Record attribution.
    #[command(flatten)]
    pub billing: BillingArgs,
    /// Schedule.
    #[command(flatten)]
    pub daily: DailyArgs,
    /// Shared options.
    #[command(flatten)]
    pub common: CommonArgs,
}

/// `spks`
#[derive(Debug, Args)]
pub struct SpksArgs {
    /// Prometheus holding the Crossplane resource metrics.
    #[arg(long, env = "PROMETHEUS_URL", default_value = SPKS_PROMETHEUS_URL)]
    pub prometheus_url: String,
    /// Sales order the instances are billed against.
    #[arg(long = "sales-order", env = "SALES_ORDER", default_value = "S10121")]
    pub sales_order: String,
    /// Environment of the instances (`nonprod`, `prod`), part of the instance id.
    #[arg(long, env = "ENVIRONMENT")]
    pub environment: String,
    /// Service level to count and bill (`standard` or `premium`).
    #[arg(long, env = "SERVICE_SLA", default_value = "standard")]
    pub service_sla: String,
    /// Billing system unit id of the counted instances.
    #[arg(long, env = "UNIT_ID", default_value = "uom_uom_68_b1811ca1")]
    pub unit_id: String,
    /// Schedule.
    #[command(flatten)]
    pub daily: DailyArgs,
    /// Shared options.
    #[command(flatten)]
    pub common: CommonArgs,
}
