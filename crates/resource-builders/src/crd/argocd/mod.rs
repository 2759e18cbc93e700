//! Settings shared with ArgoCD for clients talking to managed clusters.
//!
//! ArgoCD reads a set of environment variables to tune its Kubernetes clients. The same variables
//! can be used to tune the [`Client`](crate::client::Client)s created by this crate.
use std::{env, str::FromStr, time::Duration};

use snafu::{ResultExt, Snafu, ensure};

use crate::client::ClientTuning;

pub mod v1alpha1 {
    /// Makes ArgoCD use a fake in-cluster configuration. Only used for development.
    pub const ENV_VAR_FAKE_IN_CLUSTER_CONFIG: &str = "ARGOCD_FAKE_IN_CLUSTER";

    /// Sustained number of requests per second sent to the API server.
    pub const ENV_K8S_CLIENT_QPS: &str = "ARGOCD_K8S_CLIENT_QPS";

    /// Number of requests which can be sent at once. Defaults to twice the QPS.
    pub const ENV_K8S_CLIENT_BURST: &str = "ARGOCD_K8S_CLIENT_BURST";

    /// Maximum number of idle connections kept open to the API server.
    pub const ENV_K8S_CLIENT_MAX_IDLE_CONNECTIONS: &str = "ARGOCD_K8S_CLIENT_MAX_IDLE_CONNECTIONS";

    /// Timeout for establishing a TCP connection to the API server.
    pub const ENV_K8S_TCP_TIMEOUT: &str = "ARGOCD_K8S_TCP_TIMEOUT";

    /// Interval between TCP keep-alive packets.
    pub const ENV_K8S_TCP_KEEP_ALIVE: &str = "ARGOCD_K8S_TCP_KEEPALIVE";

    pub const ENV_K8S_TLS_HANDSHAKE_TIMEOUT: &str = "ARGOCD_K8S_TLS_HANDSHAKE_TIMEOUT";

    /// Time after which idle connections are closed.
    pub const ENV_K8S_TCP_IDLE_CONN_TIMEOUT: &str = "ARGOCD_K8S_TCP_IDLE_TIMEOUT";
}

const DEFAULT_QPS: f32 = 50.0;
const DEFAULT_MAX_IDLE_CONNECTIONS: u32 = 500;
const DEFAULT_TCP_TIMEOUT: Duration = Duration::from_secs(30);
const DEFAULT_TCP_KEEP_ALIVE: Duration = Duration::from_secs(30);
const DEFAULT_TLS_HANDSHAKE_TIMEOUT: Duration = Duration::from_secs(10);
const DEFAULT_TCP_IDLE_CONN_TIMEOUT: Duration = Duration::from_secs(90);

#[derive(Debug, Snafu)]
pub enum Error {
    #[snafu(display("failed to parse {value:?} from environment variable {name:?}"))]
    ParseNumber {
        source: std::num::ParseIntError,
        name: &'static str,
        value: String,
    },

    #[snafu(display("failed to parse {value:?} from environment variable {name:?}"))]
    ParseFloat {
        source: std::num::ParseFloatError,
        name: &'static str,
        value: String,
    },

    #[snafu(display("environment variable {name:?} must be a finite number, got {value:?}"))]
    NonFiniteQps { name: &'static str, value: String },

    #[snafu(display("failed to parse duration {value:?} from environment variable {name:?}"))]
    ParseDuration {
        source: humantime::DurationError,
        name: &'static str,
        value: String,
    },
}

/// Client settings for managed clusters as configured through the ArgoCD environment variables.
#[derive(Clone, Debug, PartialEq)]
pub struct ClusterClientSettings {
    pub fake_in_cluster_config: bool,
    pub qps: f32,
    pub burst: u32,
    pub max_idle_connections: u32,
    pub tcp_timeout: Duration,
    pub tcp_keep_alive: Duration,
    pub tls_handshake_timeout: Duration,
    pub tcp_idle_conn_timeout: Duration,
}

impl Default for ClusterClientSettings {
    fn default() -> Self {
        Self {
            fake_in_cluster_config: false,
            qps: DEFAULT_QPS,
            burst: default_burst(DEFAULT_QPS),
            max_idle_connections: DEFAULT_MAX_IDLE_CONNECTIONS,
            tcp_timeout: DEFAULT_TCP_TIMEOUT,
            tcp_keep_alive: DEFAULT_TCP_KEEP_ALIVE,
            tls_handshake_timeout: DEFAULT_TLS_HANDSHAKE_TIMEOUT,
            tcp_idle_conn_timeout: DEFAULT_TCP_IDLE_CONN_TIMEOUT,
        }
    }
}

impl ClusterClientSettings {
    /// Reads the settings from the environment of the current process.
    pub fn from_env() -> Result<Self, Error> {
        Self::from_lookup(|name| env::var(name).ok())
    }

    /// Reads the settings using `lookup` to resolve environment variables. Unset and empty
    /// variables fall back to the ArgoCD defaults.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, Error> {
        let lookup = |name: &str| lookup(name).filter(|value| !value.trim().is_empty());
        let defaults = Self::default();

        let qps = match lookup(v1alpha1::ENV_K8S_CLIENT_QPS) {
            Some(value) => {
                let qps = value.trim().parse::<f32>().context(ParseFloatSnafu {
                    name: v1alpha1::ENV_K8S_CLIENT_QPS,
                    value: value.clone(),
                })?;

                ensure!(qps.is_finite(), NonFiniteQpsSnafu {
                    name: v1alpha1::ENV_K8S_CLIENT_QPS,
                    value,
                });
                qps
            }
            None => defaults.qps,
        };

        let settings = Self {
            fake_in_cluster_config: lookup(v1alpha1::ENV_VAR_FAKE_IN_CLUSTER_CONFIG)
                .is_some_and(|value| value.trim().eq_ignore_ascii_case("true")),
            qps,
            burst: parse_number(&lookup, v1alpha1::ENV_K8S_CLIENT_BURST)?
                .unwrap_or_else(|| default_burst(qps)),
            max_idle_connections: parse_number(
                &lookup,
                v1alpha1::ENV_K8S_CLIENT_MAX_IDLE_CONNECTIONS,
            )?
            .unwrap_or(defaults.max_idle_connections),
            tcp_timeout: parse_duration(&lookup, v1alpha1::ENV_K8S_TCP_TIMEOUT)?
                .unwrap_or(defaults.tcp_timeout),
            tcp_keep_alive: parse_duration(&lookup, v1alpha1::ENV_K8S_TCP_KEEP_ALIVE)?
                .unwrap_or(defaults.tcp_keep_alive),
            tls_handshake_timeout: parse_duration(
                &lookup,
                v1alpha1::ENV_K8S_TLS_HANDSHAKE_TIMEOUT,
            )?
            .unwrap_or(defaults.tls_handshake_timeout),
            tcp_idle_conn_timeout: parse_duration(
                &lookup,
                v1alpha1::ENV_K8S_TCP_IDLE_CONN_TIMEOUT,
            )?
            .unwrap_or(defaults.tcp_idle_conn_timeout),
        };

        tracing::debug!(?settings, "read ArgoCD cluster client settings");
        Ok(settings)
    }

    /// The subset of the settings understood by [`create_client_from_config`].
    ///
    /// [`create_client_from_config`]: crate::client::create_client_from_config
    pub fn tuning(&self) -> ClientTuning {
        ClientTuning {
            qps: self.qps,
            burst: Some(self.burst),
            connect_timeout: Some(self.tcp_timeout),
            read_timeout: None,
        }
    }
}

impl ClientTuning {
    /// Reads the client tuning from the ArgoCD environment variables, see [`ClusterClientSettings`].
    pub fn from_argocd_env() -> Result<Self, Error> {
        ClusterClientSettings::from_env().map(|settings| settings.tuning())
    }
}

fn default_burst(qps: f32) -> u32 {
    (qps * 2.0).max(0.0) as u32
}

fn parse_number<T>(
    lookup: impl Fn(&str) -> Option<String>,
    name: &'static str,
) -> Result<Option<T>, Error>
where
    T: FromStr<Err = std::num::ParseIntError>,
{
    lookup(name)
        .map(|value| value.trim().parse().context(ParseNumberSnafu { name, value }))
        .transpose()
}

fn parse_duration(
    lookup: impl Fn(&str) -> Option<String>,
    name: &'static str,
) -> Result<Option<Duration>, Error> {
    lookup(name)
        .map(|value| {
            humantime::parse_duration(value.trim()).context(ParseDurationSnafu { name, value })
        })
        .transpose()
}
