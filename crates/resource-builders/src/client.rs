use std::{
    fmt::Debug,
    path::PathBuf,
    time::{Duration, TryFromFloatSecsError},
};

use either::Either;
use k8s_openapi::NamespaceResourceScope;
use kube::{
    Api, Config, Resource, ResourceExt,
    api::{DeleteParams, ListParams, PostParams},
    client::ClientBuilder,
    config::{InferConfigError, KubeConfigOptions, Kubeconfig, KubeconfigError},
    core::response::Status,
};
use serde::{Serialize, de::DeserializeOwned};
use snafu::{OptionExt, ResultExt, Snafu};
use tower::limit::RateLimitLayer;

pub type Result<T, E = Error> = std::result::Result<T, E>;

/// The field manager recorded on objects created or replaced through [`Client`] when the caller
/// does not choose one.
pub const DEFAULT_FIELD_MANAGER: &str = "resource-builders";

const DEFAULT_QPS: f32 = 50.0;

#[derive(Debug, Snafu)]
pub enum Error {
    #[snafu(display("unable to get resource {name:?} in namespace {namespace:?}"))]
    GetResource {
        source: kube::Error,
        name: String,
        namespace: String,
    },

    #[snafu(display("unable to list resources"))]
    ListResources { source: kube::Error },

    #[snafu(display("unable to create resource {name:?}"))]
    CreateResource { source: kube::Error, name: String },

    #[snafu(display("unable to replace resource {name:?}"))]
    ReplaceResource { source: kube::Error, name: String },

    #[snafu(display("unable to delete resource {name:?}"))]
    DeleteResource { source: kube::Error, name: String },

    #[snafu(display("resource {name:?} has no namespace"))]
    ObjectHasNoNamespace { name: String },

    #[snafu(display("unable to infer Kubernetes configuration"))]
    InferKubeConfig { source: InferConfigError },

    #[snafu(display("unable to read kubeconfig from {path:?}"))]
    ReadKubeconfig {
        source: KubeconfigError,
        path: PathBuf,
    },

    #[snafu(display("unable to load kubeconfig from {path:?}"))]
    LoadKubeconfig {
        source: KubeconfigError,
        path: PathBuf,
    },

    #[snafu(display("unable to create Kubernetes client"))]
    CreateKubeClient { source: kube::Error },

    #[snafu(display("client QPS must be a finite number, got {qps}"))]
    NonFiniteQps { qps: f32 },

    #[snafu(display("a burst of {burst} requests at {qps} QPS gives a rate limit window which is too long"))]
    RateLimitWindowTooLong {
        source: TryFromFloatSecsError,
        qps: f32,
        burst: u64,
    },
}

/// This `Client` can be used to access Kubernetes.
/// It wraps an underlying [`kube::Client`] and provides some common functionality.
#[derive(Clone)]
pub struct Client {
    client: kube::Client,
    post_params: PostParams,
    delete_params: DeleteParams,
}

impl Client {
    pub fn new(client: kube::Client, field_manager: Option<String>) -> Self {
        Self {
            client,
            post_params: PostParams {
                field_manager,
                ..PostParams::default()
            },
            delete_params: DeleteParams::default(),
        }
    }

    /// Creates a client from the inferred configuration: the in-cluster service account when
    /// running inside a Pod, the local kubeconfig otherwise.
    pub async fn try_default() -> Result<Self> {
        create_client(&ClientOptions::default()).await
    }

    /// Returns a [`kube::Client`] that can be freely used.
    /// It does not need to be cloned before first use.
    pub fn as_kube_client(&self) -> kube::Client {
        self.client.clone()
    }

    /// Retrieves a single instance of the requested resource type with the given name.
    pub async fn get<K>(&self, resource_name: &str, namespace: &str) -> Result<K>
    where
        K: Resource<DynamicType = (), Scope = NamespaceResourceScope>
            + Clone
            + Debug
            + DeserializeOwned,
    {
        self.get_api::<K>(namespace)
            .get(resource_name)
            .await
            .context(GetResourceSnafu {
                name: resource_name,
                namespace,
            })
    }

    /// Retrieves a single instance of the requested resource type with the given name.
    ///
    /// Returns `None` if the object does not exist instead of failing.
    pub async fn get_opt<K>(&self, resource_name: &str, namespace: &str) -> Result<Option<K>>
    where
        K: Resource<DynamicType = (), Scope = NamespaceResourceScope>
            + Clone
            + Debug
            + DeserializeOwned,
    {
        self.get_api::<K>(namespace)
            .get_opt(resource_name)
            .await
            .context(GetResourceSnafu {
                name: resource_name,
                namespace,
            })
    }

    /// Retrieves all instances of the requested resource type matching `list_params`.
    ///
    /// Objects of all namespaces are returned when `namespace` is `None`.
    pub async fn list<K>(&self, namespace: Option<&str>, list_params: &ListParams) -> Result<Vec<K>>
    where
        K: Resource<DynamicType = (), Scope = NamespaceResourceScope>
            + Clone
            + Debug
            + DeserializeOwned,
    {
        let api = match namespace {
            Some(namespace) => self.get_api::<K>(namespace),
            None => self.get_all_api::<K>(),
        };

        Ok(api
            .list(list_params)
            .await
            .context(ListResourcesSnafu)?
            .items)
    }

    /// Creates a new resource in the namespace recorded in its metadata.
    pub async fn create<K>(&self, resource: &K) -> Result<K>
    where
        K: Resource<DynamicType = (), Scope = NamespaceResourceScope>
            + Clone
            + Debug
            + DeserializeOwned
            + Serialize,
    {
        let name = resource.name_any();
        let namespace = resource
            .namespace()
            .context(ObjectHasNoNamespaceSnafu { name: &name })?;

        self.get_api::<K>(&namespace)
            .create(&self.post_params, resource)
            .await
            .context(CreateResourceSnafu { name })
    }

    /// Replaces a resource.
    ///
    /// The resource version in the metadata of `resource` has to match the live object, otherwise
    /// the API server rejects the request.
    pub async fn replace<K>(&self, resource: &K) -> Result<K>
    where
        K: Resource<DynamicType = (), Scope = NamespaceResourceScope>
            + Clone
            + Debug
            + DeserializeOwned
            + Serialize,
    {
        let name = resource.name_any();
        let namespace = resource
            .namespace()
            .context(ObjectHasNoNamespaceSnafu { name: &name })?;

        self.get_api::<K>(&namespace)
            .replace(&name, &self.post_params, resource)
            .await
            .context(ReplaceResourceSnafu { name })
    }

    /// Which of the two results this returns depends on the API.
    /// Take a look at the Kubernetes API reference.
    /// Some `delete` endpoints return the object and others return a `Status` object.
    pub async fn delete<K>(&self, resource: &K) -> Result<Either<K, Status>>
    where
        K: Resource<DynamicType = (), Scope = NamespaceResourceScope>
            + Clone
            + Debug
            + DeserializeOwned,
    {
        let name = resource.name_any();
        let namespace = resource
            .namespace()
            .context(ObjectHasNoNamespaceSnafu { name: &name })?;

        self.get_api::<K>(&namespace)
            .delete(&name, &self.delete_params)
            .await
            .context(DeleteResourceSnafu { name })
    }

    /// Returns a namespaced [`kube::Api`] object.
    pub fn get_api<K>(&self, namespace: &str) -> Api<K>
    where
        K: Resource<DynamicType = (), Scope = NamespaceResourceScope>,
    {
        Api::namespaced(self.client.clone(), namespace)
    }

    /// Returns a [`kube::Api`] object spanning all namespaces.
    pub fn get_all_api<K>(&self) -> Api<K>
    where
        K: Resource<DynamicType = ()>,
    {
        Api::all(self.client.clone())
    }
}

/// Connection tuning applied to the [`kube::Client`] built by [`create_client`].
#[derive(Clone, Debug, PartialEq)]
pub struct ClientTuning {
    /// Sustained number of requests per second sent to the API server.
    /// Zero or a negative value disables client-side rate limiting.
    pub qps: f32,

    /// Number of requests that can be sent in one go before the rate limit kicks in.
    /// Defaults to twice the QPS.
    pub burst: Option<u32>,

    pub connect_timeout: Option<Duration>,
    pub read_timeout: Option<Duration>,
}

impl Default for ClientTuning {
    fn default() -> Self {
        Self {
            qps: DEFAULT_QPS,
            burst: None,
            connect_timeout: None,
            read_timeout: None,
        }
    }
}

impl ClientTuning {
    /// Returns the number of requests allowed per window and the window length, or `None` if
    /// rate limiting is disabled.
    pub fn rate_limit(&self) -> Result<Option<(u64, Duration)>> {
        if !self.qps.is_finite() {
            return NonFiniteQpsSnafu { qps: self.qps }.fail();
        }

        if self.qps <= 0.0 {
            return Ok(None);
        }

        let burst = self
            .burst
            .unwrap_or_else(|| (self.qps * 2.0).ceil() as u32)
            .max(1);
        let burst = u64::from(burst);

        let per = Duration::try_from_secs_f32(burst as f32 / self.qps).context(
            RateLimitWindowTooLongSnafu {
                qps: self.qps,
                burst,
            },
        )?;

        Ok(Some((burst, per)))
    }

    fn apply_to_config(&self, config: &mut Config) {
        if let Some(connect_timeout) = self.connect_timeout {
            config.connect_timeout = Some(connect_timeout);
        }

        if let Some(read_timeout) = self.read_timeout {
            config.read_timeout = Some(read_timeout);
        }
    }
}

/// Options controlling how the Kubernetes client is created.
#[derive(Clone, Debug, PartialEq, clap::Args)]
#[command(next_help_heading = "Kubernetes Client Options")]
pub struct ClientOptions {
    /// Path to the kubeconfig file to use. The configuration is inferred (in-cluster service
    /// account or the default kubeconfig) if not set.
    #[arg(long, env = "KUBECONFIG")]
    pub kubeconfig: Option<PathBuf>,

    /// Field manager recorded on objects created or replaced by this client.
    #[arg(long, env, default_value = DEFAULT_FIELD_MANAGER)]
    pub field_manager: String,

    /// Sustained number of requests per second sent to the API server. Set to 0 to disable
    /// client-side rate limiting.
    #[arg(long, env, default_value_t = DEFAULT_QPS, value_parser = parse_qps)]
    pub client_qps: f32,

    /// Number of requests that can be sent at once. Defaults to twice the QPS.
    #[arg(long, env)]
    pub client_burst: Option<u32>,

    /// Timeout for establishing connections to the API server, for example `30s`.
    #[arg(long, env, value_parser = humantime::parse_duration)]
    pub client_connect_timeout: Option<Duration>,

    /// Timeout for reading responses from the API server, for example `5m`.
    #[arg(long, env, value_parser = humantime::parse_duration)]
    pub client_read_timeout: Option<Duration>,
}

impl Default for ClientOptions {
    fn default() -> Self {
        Self {
            kubeconfig: None,
            field_manager: DEFAULT_FIELD_MANAGER.to_owned(),
            client_qps: DEFAULT_QPS,
            client_burst: None,
            client_connect_timeout: None,
            client_read_timeout: None,
        }
    }
}

impl ClientOptions {
    pub fn tuning(&self) -> ClientTuning {
        ClientTuning {
            qps: self.client_qps,
            burst: self.client_burst,
            connect_timeout: self.client_connect_timeout,
            read_timeout: self.client_read_timeout,
        }
    }
}

fn parse_qps(value: &str) -> Result<f32, String> {
    let qps: f32 = value.parse().map_err(|error| format!("{error}: {value:?}"))?;

    if qps.is_finite() {
        Ok(qps)
    } else {
        Err(format!("expected a finite number, got {value:?}"))
    }
}

pub async fn create_client(options: &ClientOptions) -> Result<Client> {
    let config = match &options.kubeconfig {
        Some(path) => {
            let kubeconfig =
                Kubeconfig::read_from(path).context(ReadKubeconfigSnafu { path })?;

            Config::from_custom_kubeconfig(kubeconfig, &KubeConfigOptions::default())
                .await
                .context(LoadKubeconfigSnafu { path })?
        }
        None => Config::infer().await.context(InferKubeConfigSnafu)?,
    };

    create_client_from_config(config, &options.tuning(), Some(options.field_manager.clone()))
}

/// Builds a [`Client`] from an already loaded [`Config`], applying `tuning` on the way.
pub fn create_client_from_config(
    mut config: Config,
    tuning: &ClientTuning,
    field_manager: Option<String>,
) -> Result<Client> {
    tuning.apply_to_config(&mut config);

    let builder = ClientBuilder::try_from(config).context(CreateKubeClientSnafu)?;
    let client = match tuning.rate_limit()? {
        Some((requests, per)) => {
            tracing::debug!(requests, ?per, "enabling client-side rate limiting");
            builder.with_layer(&RateLimitLayer::new(requests, per)).build()
        }
        None => builder.build(),
    };

    Ok(Client::new(client, field_manager))
}
