//! Collector configuration.
//!
//! The command line is turned into a [`CollectorConfig`] once at startup;
//! everything downstream receives the parts it needs by value.

use std::collections::HashMap;
use std::fmt;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use cloud_billing_core::{BillingError, UnitOfMeasure};

use crate::cli::{
    BillingArgs, Cli, CloudscaleCommand, Command, CommonArgs, DailyArgs, ExoscaleArgs,
    ExoscaleCommand, KubernetesArgs,
};
use crate::error::CollectorError;
use crate::jobs::SpksSettings;
use crate::runner::Schedule;

/// Service account token mounted into pods.
pub const IN_CLUSTER_TOKEN_FILE: &str = "/var/run/secrets/kubernetes.io/serviceaccount/token";

/// Service account CA bundle mounted into pods.
pub const IN_CLUSTER_CA_FILE: &str = "/var/run/secrets/kubernetes.io/serviceaccount/ca.crt";

/// Unit of measure to billing system unit id.
///
/// Units without an entry are sent by name.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UnitMapping(HashMap<UnitOfMeasure, String>);

impl UnitMapping {
    /// Billing system id of `unit`.
    #[must_use]
    pub fn unit_id(&self, unit: UnitOfMeasure) -> String {
        self.0
            .get(&unit)
            .cloned()
            .unwrap_or_else(|| unit.as_str().to_string())
    }
}

impl FromStr for UnitMapping {
    type Err = BillingError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.split(',')
            .map(str::trim)
            .filter(|pair| !pair.is_empty())
            .map(|pair| {
                let (unit, id) = pair.split_once('=').ok_or_else(|| {
                    BillingError::Configuration(format!("expected <unit>=<id>, got {pair:?}"))
                })?;
                let id = id.trim();
                if id.is_empty() {
                    return Err(BillingError::Configuration(format!("empty unit id for {unit}")));
                }
                Ok((unit.trim().parse::<UnitOfMeasure>()?, id.to_string()))
            })
            .collect::<Result<HashMap<_, _>, _>>()
            .map(Self)
    }
}

/// Billing API settings.
#[derive(Clone)]
pub struct OdooSettings {
    /// Metered billing endpoint.
    pub url: String,
    /// OAuth2 token endpoint.
    pub token_url: String,
    /// OAuth2 client id.
    pub client_id: String,
    /// OAuth2 client secret.
    pub client_secret: String,
}

impl fmt::Debug for OdooSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OdooSettings")
            .field("url", &self.url)
            .field("token_url", &self.token_url)
            .field("client_id", &self.client_id)
            .field("client_secret", &"<redacted>")
            .finish()
    }
}

/// Kubernetes API settings.
#[derive(Clone)]
pub struct KubernetesSettings {
    /// API server URL.
    pub server_url: String,
    /// Bearer token.
    pub token: String,
    /// PEM bundle trusted for the API server.
    pub ca_pem: Option<Vec<u8>>,
}

impl fmt::Debug for KubernetesSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KubernetesSettings")
            .field("server_url", &self.server_url)
            .field("token", &"<redacted>")
            .field("ca_pem", &self.ca_pem.as_ref().map(Vec::len))
            .finish()
    }
}

/// Exoscale API settings.
#[derive(Clone)]
pub struct ExoscaleSettings {
    /// API URL template.
    pub api_url: String,
    /// API key.
    pub key: String,
    /// API secret.
    pub secret: String,
}

impl fmt::Debug for ExoscaleSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExoscaleSettings")
            .field("api_url", &self.api_url)
            .field("key", &self.key)
            .field("secret", &"<redacted>")
            .finish()
    }
}

/// Where billing parties come from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BillingPartyConfig {
    /// One sales order for every record.
    Static(String),
    /// Looked up per organization in Prometheus.
    Prometheus {
        /// Prometheus base URL.
        url: String,
    },
}

/// Record attribution for managed-resource jobs.
#[derive(Debug, Clone)]
pub struct BillingSettings {
    /// Billing party source.
    pub party: BillingPartyConfig,
    /// Cluster named in the item group description.
    pub cluster_id: String,
    /// Unit ids.
    pub units: UnitMapping,
}

/// The job selected on the command line.
#[derive(Debug, Clone)]
pub enum JobConfig {
    /// Exoscale SOS bucket storage.
    ExoscaleObjectStorage {
        /// Exoscale API.
        exoscale: ExoscaleSettings,
        /// Kubernetes API.
        kubernetes: KubernetesSettings,
        /// Attribution.
        billing: BillingSettings,
    },
    /// Exoscale DBaaS instances.
    ExoscaleDbaas {
        /// Exoscale API.
        exoscale: ExoscaleSettings,
        /// Kubernetes API.
        kubernetes: KubernetesSettings,
        /// Attribution.
        billing: BillingSettings,
        /// Zones to list.
        zones: Vec<String>,
    },
    /// cloudscale bucket storage, traffic and requests.
    CloudscaleObjectStorage {
        /// cloudscale API URL.
        api_url: String,
        /// cloudscale API token.
        token: String,
        /// Kubernetes API.
        kubernetes: KubernetesSettings,
        /// Attribution.
        billing: BillingSettings,
    },
    /// SPKS instance counts.
    Spks {
        /// Prometheus base URL.
        prometheus_url: String,
        /// Job settings.
        settings: SpksSettings,
    },
}

impl JobConfig {
    /// Name used in logs.
    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            Self::ExoscaleObjectStorage { .. } => "exoscale-objectstorage",
            Self::ExoscaleDbaas { .. } => "exoscale-dbaas",
            Self::CloudscaleObjectStorage { .. } => "cloudscale-objectstorage",
            Self::Spks { .. } => "spks",
        }
    }
}

/// Complete, validated collector configuration.
#[derive(Debug, Clone)]
pub struct CollectorConfig {
    /// Metrics endpoint address.
    pub bind: SocketAddr,
    /// Timeout for outgoing HTTP requests.
    pub http_timeout: Duration,
    /// Billing API.
    pub odoo: OdooSettings,
    /// Selected job.
    pub job: JobConfig,
    /// Run schedule.
    pub schedule: Schedule,
    /// Past days collected on startup.
    pub catch_up_days: u32,
}

impl CollectorConfig {
    /// Build the configuration from parsed arguments.
    ///
    /// Reads the Kubernetes token and CA files.
    ///
    /// # Errors
    ///
    /// Returns an error if a value is invalid or a referenced file cannot
    /// be read.
    pub fn from_cli(cli: &Cli) -> Result<Self, CollectorError> {
        match &cli.command {
            Command::Exoscale {
                product: ExoscaleCommand::Objectstorage(args),
            } => Self::build(
                cli,
                &args.common,
                JobConfig::ExoscaleObjectStorage {
                    exoscale: exoscale_settings(&args.exoscale),
                    kubernetes: kubernetes_settings(&args.kubernetes)?,
                    billing: billing_settings(&args.billing)?,
                },
                daily_schedule(&args.daily)?,
            ),
            Command::Exoscale {
                product: ExoscaleCommand::Dbaas(args),
            } => {
                if args.collect_interval == 0 {
                    return Err(CollectorError::Configuration(
                        "collect interval must be at least one hour".into(),
                    ));
                }
                if args.zones.is_empty() {
                    return Err(CollectorError::Configuration("no zones configured".into()));
                }
                let seconds = args.collect_interval.checked_mul(3600).ok_or_else(|| {
                    CollectorError::Configuration(format!(
                        "collect interval of {} hours is too large",
                        args.collect_interval
                    ))
                })?;
                let schedule = Schedule::Interval(Duration::from_secs(seconds));
                Self::build(
                    cli,
                    &args.common,
                    JobConfig::ExoscaleDbaas {
                        exoscale: exoscale_settings(&args.exoscale),
                        kubernetes: kubernetes_settings(&args.kubernetes)?,
                        billing: billing_settings(&args.billing)?,
                        zones: args.zones.clone(),
                    },
                    (schedule, 0),
                )
            }
            Command::Cloudscale {
                product: CloudscaleCommand::Objectstorage(args),
            } => Self::build(
                cli,
                &args.common,
                JobConfig::CloudscaleObjectStorage {
                    api_url: args.cloudscale_api_url.clone(),
                    token: required("cloudscale API token", &args.cloudscale_api_token)?,
                    kubernetes: kubernetes_settings(&args.kubernetes)?,
                    billing: billing_settings(&args.billing)?,
                },
                daily_schedule(&args.daily)?,
            ),
            Command::Spks(args) => Self::build(
                cli,
                &args.common,
                JobConfig::Spks {
                    prometheus_url: required("Prometheus URL", &args.prometheus_url)?,
                    settings: SpksSettings {
                        environment: required("environment", &args.environment)?,
                        service_sla: required("service SLA", &args.service_sla)?,
                        billing_party: required("sales order", &args.sales_order)?,
                        unit: UnitOfMeasure::Instances,
                        unit_id: required("unit id", &args.unit_id)?,
                    },
                },
                daily_schedule(&args.daily)?,
            ),
        }
    }

    fn build(
        cli: &Cli,
        common: &CommonArgs,
        job: JobConfig,
        (schedule, catch_up_days): (Schedule, u32),
    ) -> Result<Self, CollectorError> {
        if common.http_timeout_seconds == 0 {
            return Err(CollectorError::Configuration(
                "HTTP timeout must be at least one second".into(),
            ));
        }

        let odoo = &common.odoo;
        Ok(Self {
            bind: cli.bind,
            http_timeout: Duration::from_secs(common.http_timeout_seconds),
            odoo: OdooSettings {
                url: required("billing API URL", &odoo.odoo_url)?,
                token_url: required("OAuth token URL", &odoo.odoo_oauth_token_url)?,
                client_id: required("OAuth client id", &odoo.odoo_oauth_client_id)?,
                client_secret: odoo.odoo_oauth_client_secret.clone(),
            },
            job,
            schedule,
            catch_up_days,
        })
    }
}

fn required(what: &str, value: &str) -> Result<String, CollectorError> {
    let value = value.trim();
    if value.is_empty() {
        return Err(CollectorError::Configuration(format!("{what} is required")));
    }
    Ok(value.to_string())
}

fn daily_schedule(args: &DailyArgs) -> Result<(Schedule, u32), CollectorError> {
    Ok((Schedule::daily_at(args.billing_hour)?, args.days))
}

fn exoscale_settings(args: &ExoscaleArgs) -> ExoscaleSettings {
    ExoscaleSettings {
        api_url: args.exoscale_api_url.clone(),
        key: args.exoscale_access_key.clone(),
        secret: args.exoscale_secret.clone(),
    }
}

fn billing_settings(args: &BillingArgs) -> Result<BillingSettings, CollectorError> {
    let party = match (&args.sales_order_id, &args.prometheus_url) {
        (Some(order), _) if !order.trim().is_empty() => {
            BillingPartyConfig::Static(order.trim().to_string())
        }
        (_, Some(url)) if !url.trim().is_empty() => BillingPartyConfig::Prometheus {
            url: url.trim().to_string(),
        },
        _ => {
            return Err(CollectorError::Configuration(
                "either a sales order id or a Prometheus URL is required".into(),
            ))
        }
    };

    Ok(BillingSettings {
        party,
        cluster_id: required("cluster id", &args.cluster_id)?,
        units: args.unit_mapping.clone(),
    })
}

fn kubernetes_settings(args: &KubernetesArgs) -> Result<KubernetesSettings, CollectorError> {
    let token = load_token(
        args.kubernetes_server_token.as_deref(),
        args.kubernetes_token_file.as_deref(),
        Path::new(IN_CLUSTER_TOKEN_FILE),
    )?;

    let ca_file = args
        .kubernetes_ca_file
        .clone()
        .or_else(|| Some(PathBuf::from(IN_CLUSTER_CA_FILE)).filter(|path| path.exists()));
    let ca_pem = ca_file.map(std::fs::read).transpose()?;

    Ok(KubernetesSettings {
        server_url: required("Kubernetes server URL", &args.kubernetes_server_url)?,
        token,
        ca_pem,
    })
}

/// Resolve the Kubernetes bearer token.
///
/// An inline token wins over a token file; without either, the in-cluster
/// service account token is used if present.
///
/// # Errors
///
/// Returns an error if no token is available or the file cannot be read.
pub fn load_token(
    inline: Option<&str>,
    file: Option<&Path>,
    in_cluster: &Path,
) -> Result<String, CollectorError> {
    if let Some(token) = inline.map(str::trim).filter(|t| !t.is_empty()) {
        return Ok(token.to_string());
    }

    let path = match file {
        Some(path) => path,
        None if in_cluster.exists() => in_cluster,
        None => {
            return Err(CollectorError::Configuration(
                "no Kubernetes token: set a token or a token file".into(),
            ))
        }
    };

    let token = std::fs::read_to_string(path)?;
    required("Kubernetes token", &token)
}
