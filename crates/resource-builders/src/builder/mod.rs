//! This module provides builders for various (Kubernetes) objects.
//!
//! Every builder is a [`Builder`] over one resource kind. It holds the desired state (the
//! *definition*), the last state fetched from the cluster (the *object*) and the first problem
//! recorded while the definition was put together. Mutators are no-ops once a problem has been
//! recorded, and every operation talking to the cluster fails with that problem instead.
//!
//! ```no_run
//! use std::collections::BTreeMap;
//!
//! use resource_builders::{
//!     builder::service::{ServiceBuilder, define_service_port},
//!     client::Client,
//! };
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let client = Client::try_default().await?;
//! let port = define_service_port(8080, 8080, "TCP")?;
//! let selector = BTreeMap::from([("app".to_owned(), "web".to_owned())]);
//!
//! let mut service = ServiceBuilder::new(client, "web", "default", selector, port);
//! service.with_node_port();
//! service.create().await?;
//! # Ok(())
//! # }
//! ```
use std::{fmt::Debug, time::Duration};

use k8s_openapi::NamespaceResourceScope;
use kube::{Resource, api::ListParams, core::gvk::GroupVersionResource};
use serde::{Serialize, de::DeserializeOwned};
use snafu::{OptionExt, ResultExt, Snafu};

use crate::client::{self, Client};

pub mod ibgu;
pub mod service;

type Result<T, E = Error> = std::result::Result<T, E>;

const DELETE_POLL_INTERVAL: Duration = Duration::from_millis(500);

/// A problem with the definition held by a [`Builder`].
///
/// The first one encountered is kept and reported by every following operation.
#[derive(Clone, Debug, PartialEq, Eq, Snafu)]
pub enum DefinitionError {
    /// Reported as `<kind> 'name' cannot be empty` for every kind and entry point, including
    /// [`Builder::pull`].
    #[snafu(display("{kind} 'name' cannot be empty"))]
    EmptyName { kind: &'static str },

    /// Reported as `<kind> 'nsname' cannot be empty`, whether the namespace is missing from a
    /// definition or passed empty to [`Builder::pull`].
    #[snafu(display("{kind} 'nsname' cannot be empty"))]
    EmptyNamespace { kind: &'static str },

    #[snafu(display("service does not have the available ports"))]
    MissingServicePorts,

    #[snafu(display("invalid port number"))]
    InvalidPort { port: i32 },

    #[snafu(display("invalid target port number"))]
    InvalidTargetPort { port: i32 },

    #[snafu(display("ExternalTrafficPolicy can not be empty"))]
    EmptyExternalTrafficPolicy,

    #[snafu(display("Annotation can not be empty map"))]
    EmptyAnnotations,

    #[snafu(display("failed to set empty ipFamily"))]
    EmptyIpFamilies,

    #[snafu(display("failed to set empty ipStackPolicy"))]
    EmptyIpFamilyPolicy,

    #[snafu(display("can not apply empty cluster label selectors to the IBGU"))]
    EmptyClusterLabelSelectors,

    #[snafu(display("seedImage cannot be empty"))]
    EmptySeedImage,

    #[snafu(display("seedVersion cannot be empty"))]
    EmptySeedVersion,

    #[snafu(display("{field} name cannot be empty"))]
    EmptyConfigMapName { field: &'static str },

    #[snafu(display("{field} namespace cannot be empty"))]
    EmptyConfigMapNamespace { field: &'static str },

    #[snafu(display("plan actions cannot be empty"))]
    EmptyPlanActions,

    #[snafu(display("maxConcurrency must be greater than 0"))]
    ZeroMaxConcurrency,

    #[snafu(display("timeout must be greater than 0"))]
    ZeroPlanTimeout,

    #[snafu(display("initMonitorTimeoutSeconds must be greater than 0"))]
    ZeroInitMonitorTimeout,

    /// Raised by caller-provided options passed to [`Builder::with_options`].
    #[snafu(display("{message}"))]
    Custom { message: String },
}

#[derive(Debug, Snafu)]
pub enum Error {
    #[snafu(display("the {kind} definition is invalid"))]
    InvalidDefinition {
        source: DefinitionError,
        kind: &'static str,
    },

    #[snafu(display("{kind} object {name:?} does not exist in namespace {namespace:?}"))]
    ObjectNotFound {
        kind: &'static str,
        name: String,
        namespace: String,
    },

    #[snafu(display("failed to get {kind} {name:?} in namespace {namespace:?}"))]
    GetObject {
        source: client::Error,
        kind: &'static str,
        name: String,
        namespace: String,
    },

    #[snafu(display("failed to list {kind} objects in namespace {namespace:?}"))]
    ListObjects {
        source: client::Error,
        kind: &'static str,
        namespace: String,
    },

    #[snafu(display("failed to create {kind} {name:?} in namespace {namespace:?}"))]
    CreateObject {
        source: client::Error,
        kind: &'static str,
        name: String,
        namespace: String,
    },

    #[snafu(display("failed to update {kind} {name:?} in namespace {namespace:?}"))]
    UpdateObject {
        source: client::Error,
        kind: &'static str,
        name: String,
        namespace: String,
    },

    #[snafu(display("failed to delete {kind} {name:?} in namespace {namespace:?}"))]
    DeleteObject {
        source: client::Error,
        kind: &'static str,
        name: String,
        namespace: String,
    },

    #[snafu(display(
        "timed out after {timeout:?} waiting for {kind} {name:?} in namespace {namespace:?} to be deleted"
    ))]
    DeleteTimeout {
        source: tokio::time::error::Elapsed,
        kind: &'static str,
        name: String,
        namespace: String,
        timeout: Duration,
    },
}

/// A namespaced resource kind which can be managed by a [`Builder`].
pub trait BuildableResource:
    Resource<DynamicType = (), Scope = NamespaceResourceScope>
    + Clone
    + Debug
    + DeserializeOwned
    + Serialize
    + Send
    + Sync
    + 'static
{
    /// Short name of the kind used in log and error messages, such as `service`.
    const KIND: &'static str;
}

/// A mutation of the definition of a `K`, see [`Builder::with_options`].
pub type AdditionalOption<K> = Box<dyn FnOnce(&mut K) -> Result<(), DefinitionError> + Send>;

/// Pairs the desired definition of a `K` with the object last fetched from the cluster.
#[derive(Clone)]
pub struct Builder<K> {
    definition: K,
    object: Option<K>,
    error: Option<DefinitionError>,
    client: Client,
}

impl<K> Debug for Builder<K>
where
    K: Debug,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Builder")
            .field("definition", &self.definition)
            .field("object", &self.object)
            .field("error", &self.error)
            .finish_non_exhaustive()
    }
}

impl<K> Builder<K>
where
    K: BuildableResource,
{
    /// Wraps `definition`, recording an error if it lacks a name or a namespace.
    pub fn from_definition(client: Client, definition: K) -> Self {
        let mut builder = Self {
            definition,
            object: None,
            error: None,
            client,
        };

        if builder.name().is_empty() {
            tracing::debug!(kind = K::KIND, "the name of the object is empty");
            builder.error = Some(DefinitionError::EmptyName { kind: K::KIND });
        } else if builder.namespace().is_empty() {
            tracing::debug!(kind = K::KIND, "the namespace of the object is empty");
            builder.error = Some(DefinitionError::EmptyNamespace { kind: K::KIND });
        }

        builder
    }

    /// Loads an existing object from the cluster. The live object also becomes the definition.
    pub async fn pull(client: Client, name: &str, namespace: &str) -> Result<Self> {
        tracing::debug!(kind = K::KIND, name, namespace, "pulling existing object");

        if name.is_empty() {
            return Err(DefinitionError::EmptyName { kind: K::KIND })
                .context(InvalidDefinitionSnafu { kind: K::KIND });
        }

        if namespace.is_empty() {
            return Err(DefinitionError::EmptyNamespace { kind: K::KIND })
                .context(InvalidDefinitionSnafu { kind: K::KIND });
        }

        let object = client
            .get_opt::<K>(name, namespace)
            .await
            .context(GetObjectSnafu {
                kind: K::KIND,
                name,
                namespace,
            })?
            .context(ObjectNotFoundSnafu {
                kind: K::KIND,
                name,
                namespace,
            })?;

        Ok(Self {
            definition: object.clone(),
            object: Some(object),
            error: None,
            client,
        })
    }

    /// Lists the objects in `namespace`, each wrapped in its own builder.
    pub async fn list(
        client: &Client,
        namespace: &str,
        list_params: &ListParams,
    ) -> Result<Vec<Self>> {
        tracing::debug!(kind = K::KIND, namespace, "listing objects");

        if namespace.is_empty() {
            return Err(DefinitionError::EmptyNamespace { kind: K::KIND })
                .context(InvalidDefinitionSnafu { kind: K::KIND });
        }

        let objects = client
            .list::<K>(Some(namespace), list_params)
            .await
            .context(ListObjectsSnafu {
                kind: K::KIND,
                namespace,
            })?;

        Ok(objects
            .into_iter()
            .map(|object| Self {
                definition: object.clone(),
                object: Some(object),
                error: None,
                client: client.clone(),
            })
            .collect())
    }

    /// Returns the [`GroupVersionResource`] of `K`.
    pub fn gvr() -> GroupVersionResource {
        GroupVersionResource::gvr(&K::group(&()), &K::version(&()), &K::plural(&()))
    }

    pub fn definition(&self) -> &K {
        &self.definition
    }

    pub fn definition_mut(&mut self) -> &mut K {
        &mut self.definition
    }

    /// The object as it was last seen in the cluster, if it has been fetched.
    pub fn object(&self) -> Option<&K> {
        self.object.as_ref()
    }

    pub fn error(&self) -> Option<&DefinitionError> {
        self.error.as_ref()
    }

    pub fn client(&self) -> &Client {
        &self.client
    }

    pub fn name(&self) -> &str {
        self.definition.meta().name.as_deref().unwrap_or_default()
    }

    pub fn namespace(&self) -> &str {
        self.definition.meta().namespace.as_deref().unwrap_or_default()
    }

    /// Returns the first problem recorded while defining the object.
    pub fn validate(&self) -> Result<(), DefinitionError> {
        match &self.error {
            Some(error) => {
                tracing::debug!(kind = K::KIND, %error, "the builder has an error");
                Err(error.clone())
            }
            None => Ok(()),
        }
    }

    /// Applies caller-provided mutations to the definition. The first failing option is recorded
    /// and the remaining ones are skipped.
    pub fn with_options<I, F>(&mut self, options: I) -> &mut Self
    where
        I: IntoIterator<Item = F>,
        F: FnOnce(&mut K) -> Result<(), DefinitionError>,
    {
        tracing::debug!(kind = K::KIND, "applying additional options");

        for option in options {
            self.try_mutate(option);
        }

        self
    }

    /// Runs `mutate` against the definition unless an error has already been recorded.
    /// An error returned by `mutate` is recorded.
    pub(crate) fn try_mutate(
        &mut self,
        mutate: impl FnOnce(&mut K) -> Result<(), DefinitionError>,
    ) -> &mut Self {
        if self.error.is_some() {
            return self;
        }

        if let Err(error) = mutate(&mut self.definition) {
            tracing::debug!(
                kind = K::KIND,
                name = self.name(),
                namespace = self.namespace(),
                %error,
                "failed to mutate the definition"
            );
            self.error = Some(error);
        }

        self
    }

    /// Fetches the live object from the cluster without caching it.
    pub async fn get(&self) -> Result<K> {
        self.validate()
            .context(InvalidDefinitionSnafu { kind: K::KIND })?;

        tracing::debug!(
            kind = K::KIND,
            name = self.name(),
            namespace = self.namespace(),
            "getting object"
        );

        self.client
            .get::<K>(self.name(), self.namespace())
            .await
            .context(GetObjectSnafu {
                kind: K::KIND,
                name: self.name(),
                namespace: self.namespace(),
            })
    }

    /// Checks whether the object exists in the cluster, caching it if it does.
    pub async fn exists(&mut self) -> Result<bool> {
        self.validate()
            .context(InvalidDefinitionSnafu { kind: K::KIND })?;

        tracing::debug!(
            kind = K::KIND,
            name = self.name(),
            namespace = self.namespace(),
            "checking if object exists"
        );

        Ok(self.fetch().await?.is_some())
    }

    /// Creates the object unless it already exists. Returns the live object either way.
    pub async fn create(&mut self) -> Result<&K> {
        self.validate()
            .context(InvalidDefinitionSnafu { kind: K::KIND })?;

        tracing::debug!(
            kind = K::KIND,
            name = self.name(),
            namespace = self.namespace(),
            "creating object"
        );

        let object = match self.fetch().await? {
            Some(object) => object,
            None => self
                .client
                .create(&self.definition)
                .await
                .context(CreateObjectSnafu {
                    kind: K::KIND,
                    name: self.name(),
                    namespace: self.namespace(),
                })?,
        };

        Ok(self.object.insert(object))
    }

    /// Replaces the live object with the definition.
    pub async fn update(&mut self) -> Result<&K> {
        self.validate()
            .context(InvalidDefinitionSnafu { kind: K::KIND })?;

        tracing::debug!(
            kind = K::KIND,
            name = self.name(),
            namespace = self.namespace(),
            "updating object"
        );

        let live = self.fetch().await?.context(ObjectNotFoundSnafu {
            kind: K::KIND,
            name: self.name(),
            namespace: self.namespace(),
        })?;

        self.definition.meta_mut().resource_version = live.meta().resource_version.clone();

        let updated = self
            .client
            .replace(&self.definition)
            .await
            .context(UpdateObjectSnafu {
                kind: K::KIND,
                name: self.name(),
                namespace: self.namespace(),
            })?;

        Ok(self.object.insert(updated))
    }

    /// Deletes the object. An object which does not exist counts as deleted.
    pub async fn delete(&mut self) -> Result<()> {
        self.validate()
            .context(InvalidDefinitionSnafu { kind: K::KIND })?;

        tracing::debug!(
            kind = K::KIND,
            name = self.name(),
            namespace = self.namespace(),
            "deleting object"
        );

        if self.fetch().await?.is_none() {
            tracing::debug!(
                kind = K::KIND,
                name = self.name(),
                namespace = self.namespace(),
                "object does not exist, nothing to delete"
            );
            return Ok(());
        }

        self.client
            .delete(&self.definition)
            .await
            .context(DeleteObjectSnafu {
                kind: K::KIND,
                name: self.name(),
                namespace: self.namespace(),
            })?;
        self.object = None;

        Ok(())
    }

    /// Deletes the object and waits until the cluster no longer returns it.
    pub async fn delete_and_wait(&mut self, timeout: Duration) -> Result<()> {
        self.delete().await?;

        tokio::time::timeout(timeout, self.wait_until_absent())
            .await
            .context(DeleteTimeoutSnafu {
                kind: K::KIND,
                name: self.name(),
                namespace: self.namespace(),
                timeout,
            })?
    }

    async fn wait_until_absent(&self) -> Result<()> {
        while self
            .client
            .get_opt::<K>(self.name(), self.namespace())
            .await
            .context(GetObjectSnafu {
                kind: K::KIND,
                name: self.name(),
                namespace: self.namespace(),
            })?
            .is_some()
        {
            tokio::time::sleep(DELETE_POLL_INTERVAL).await;
        }

        Ok(())
    }

    /// Fetches the live object and caches it. Not-found clears the cache.
    async fn fetch(&mut self) -> Result<Option<K>> {
        let object = self
            .client
            .get_opt::<K>(self.name(), self.namespace())
            .await
            .context(GetObjectSnafu {
                kind: K::KIND,
                name: self.name(),
                namespace: self.namespace(),
            })?;

        self.object.clone_from(&object);

        Ok(object)
    }
}

#[cfg(test)]
mod tests {
    use http::StatusCode;
    use k8s_openapi::api::core::v1::Service;
    use rstest::rstest;

    use super::*;
    use crate::testing::FakeApiServer;

    const NAME: &str = "web";
    const NAMESPACE: &str = "default";

    fn service(name: &str, namespace: &str) -> Service {
        let mut service = Service::default();
        service.metadata.name = Some(name.to_owned());
        service.metadata.namespace = Some(namespace.to_owned());
        service
    }

    fn builder(server: &FakeApiServer) -> Builder<Service> {
        Builder::from_definition(server.client(), service(NAME, NAMESPACE))
    }

    #[rstest]
    #[case(NAME, NAMESPACE, None)]
    #[case("", NAMESPACE, Some("service 'name' cannot be empty"))]
    #[case(NAME, "", Some("service 'nsname' cannot be empty"))]
    #[case("", "", Some("service 'name' cannot be empty"))]
    #[tokio::test]
    async fn from_definition_records_missing_identity(
        #[case] name: &str,
        #[case] namespace: &str,
        #[case] expected_error: Option<&str>,
    ) {
        let server = FakeApiServer::new();
        let builder = Builder::from_definition(server.client(), service(name, namespace));

        assert_eq!(
            builder.validate().err().map(|error| error.to_string()),
            expected_error.map(ToOwned::to_owned)
        );
    }

    #[tokio::test]
    async fn first_error_is_kept() {
        let server = FakeApiServer::new();
        let mut builder = builder(&server);

        let options: [fn(&mut Service) -> Result<(), DefinitionError>; 2] = [
            |_| Err(DefinitionError::EmptyAnnotations),
            |_| Err(DefinitionError::EmptySeedImage),
        ];

        builder.with_options(options).try_mutate(|service| {
            service.metadata.labels = Some([("a".to_owned(), "b".to_owned())].into());
            Ok(())
        });

        assert_eq!(builder.error(), Some(&DefinitionError::EmptyAnnotations));
        assert_eq!(builder.definition().metadata.labels, None);
    }

    #[tokio::test]
    async fn custom_option_error_is_reported() {
        let server = FakeApiServer::new();
        let mut builder = builder(&server);

        builder.with_options([|_: &mut Service| -> Result<(), DefinitionError> {
            Err(DefinitionError::Custom {
                message: "selector must not be set".to_owned(),
            })
        }]);

        let error = builder.validate().unwrap_err();
        assert_eq!(error.to_string(), "selector must not be set");

        let error = builder.create().await.unwrap_err();
        assert!(matches!(error, Error::InvalidDefinition {
            source: DefinitionError::Custom { .. },
            ..
        }));
        assert!(server.is_empty());
    }

    #[tokio::test]
    async fn boxed_options_are_applied_in_order() {
        let server = FakeApiServer::new();
        let mut builder = builder(&server);

        let options: Vec<AdditionalOption<Service>> = vec![
            Box::new(|service| {
                service.metadata.labels = Some([("app".to_owned(), "web".to_owned())].into());
                Ok(())
            }),
            Box::new(|service| {
                service
                    .metadata
                    .labels
                    .get_or_insert_with(Default::default)
                    .insert("tier".to_owned(), "frontend".to_owned());
                Ok(())
            }),
        ];
        builder.with_options(options);

        assert_eq!(builder.error(), None);
        assert_eq!(
            builder.definition().metadata.labels.as_ref().map(|l| l.len()),
            Some(2)
        );
    }

    #[test]
    fn gvr_of_service() {
        let gvr = Builder::<Service>::gvr();

        assert_eq!(gvr.group, "");
        assert_eq!(gvr.version, "v1");
        assert_eq!(gvr.resource, "services");
    }

    #[rstest]
    #[case(true)]
    #[case(false)]
    #[tokio::test]
    async fn exists_reports_cluster_state(#[case] exists: bool) {
        let server = FakeApiServer::new();
        if exists {
            server.insert(&service(NAME, NAMESPACE));
        }

        let mut builder = builder(&server);

        assert_eq!(builder.exists().await.unwrap(), exists);
        assert_eq!(builder.object().is_some(), exists);
    }

    #[tokio::test]
    async fn exists_propagates_server_errors() {
        let server = FakeApiServer::new();
        server.insert(&service(NAME, NAMESPACE));
        server.fail_requests(StatusCode::INTERNAL_SERVER_ERROR);

        let mut builder = builder(&server);
        let result = builder.exists().await;

        assert!(matches!(result, Err(Error::GetObject { .. })), "{result:?}");
        assert!(builder.object().is_none());
    }

    #[rstest]
    #[case(true)]
    #[case(false)]
    #[tokio::test]
    async fn get_fails_for_missing_object(#[case] exists: bool) {
        let server = FakeApiServer::new();
        if exists {
            server.insert(&service(NAME, NAMESPACE));
        }

        let result = builder(&server).get().await;

        assert_eq!(result.is_ok(), exists);
    }

    #[rstest]
    #[case(true)]
    #[case(false)]
    #[tokio::test]
    async fn create_is_idempotent(#[case] exists: bool) {
        let server = FakeApiServer::new();
        if exists {
            server.insert(&service(NAME, NAMESPACE));
        }

        let mut builder = builder(&server);
        let created = builder.create().await.unwrap();

        assert_eq!(created.metadata.name.as_deref(), Some(NAME));
        assert_eq!(created.metadata.namespace.as_deref(), Some(NAMESPACE));
        assert_eq!(server.len(), 1);
    }

    #[tokio::test]
    async fn operations_fail_on_invalid_definition() {
        let server = FakeApiServer::new();
        let mut builder = Builder::from_definition(server.client(), service(NAME, ""));

        let error = builder.create().await.unwrap_err();

        assert!(matches!(
            error,
            Error::InvalidDefinition {
                source: DefinitionError::EmptyNamespace { kind: "service" },
                ..
            }
        ));
        assert!(server.is_empty());
    }

    #[rstest]
    #[case(true)]
    #[case(false)]
    #[tokio::test]
    async fn delete_removes_object(#[case] exists: bool) {
        let server = FakeApiServer::new();
        if exists {
            server.insert(&service(NAME, NAMESPACE));
        }

        let mut builder = builder(&server);
        builder.delete().await.unwrap();

        assert!(builder.object().is_none());
        assert!(!builder.exists().await.unwrap());
    }

    #[tokio::test]
    async fn delete_and_wait_returns_once_absent() {
        let server = FakeApiServer::new();
        server.insert(&service(NAME, NAMESPACE));

        let mut builder = builder(&server);
        builder
            .delete_and_wait(Duration::from_secs(5))
            .await
            .unwrap();

        assert!(server.is_empty());
    }

    #[tokio::test]
    async fn delete_and_wait_times_out() {
        let server = FakeApiServer::new();
        server.insert(&service(NAME, NAMESPACE));
        server.keep_deleted_objects(true);

        let mut builder = builder(&server);
        let error = builder
            .delete_and_wait(Duration::from_millis(100))
            .await
            .unwrap_err();

        assert!(
            matches!(error, Error::DeleteTimeout { timeout, .. } if timeout == Duration::from_millis(100)),
            "{error}"
        );
        assert_eq!(server.len(), 1);
    }

    #[tokio::test]
    async fn update_requires_existing_object() {
        let server = FakeApiServer::new();
        let mut builder = builder(&server);

        let error = builder.update().await.unwrap_err();
        assert!(matches!(error, Error::ObjectNotFound { .. }));
    }

    #[tokio::test]
    async fn update_replaces_live_object() {
        let server = FakeApiServer::new();
        server.insert(&service(NAME, NAMESPACE));

        let mut builder = builder(&server);
        builder.definition_mut().metadata.labels =
            Some([("app".to_owned(), "web".to_owned())].into());

        let updated = builder.update().await.unwrap().clone();
        let fetched = builder.get().await.unwrap();

        assert_eq!(updated.metadata.labels, fetched.metadata.labels);
        assert_ne!(
            updated.metadata.resource_version,
            builder.definition().metadata.resource_version
        );
    }

    #[rstest]
    #[case(true)]
    #[case(false)]
    #[tokio::test]
    async fn pull_loads_existing_object(#[case] exists: bool) {
        let server = FakeApiServer::new();
        if exists {
            server.insert(&service(NAME, NAMESPACE));
        }

        let result = Builder::<Service>::pull(server.client(), NAME, NAMESPACE).await;

        match result {
            Ok(builder) => {
                assert!(exists);
                assert_eq!(builder.name(), NAME);
                assert!(builder.object().is_some());
            }
            Err(error) => {
                assert!(!exists);
                assert!(matches!(error, Error::ObjectNotFound { .. }));
            }
        }
    }

    #[rstest]
    #[case("", NAMESPACE, "service 'name' cannot be empty")]
    #[case(NAME, "", "service 'nsname' cannot be empty")]
    #[tokio::test]
    async fn pull_rejects_empty_identity(
        #[case] name: &str,
        #[case] namespace: &str,
        #[case] expected_error: &str,
    ) {
        let server = FakeApiServer::new();

        let error = Builder::<Service>::pull(server.client(), name, namespace)
            .await
            .unwrap_err();

        match error {
            Error::InvalidDefinition { source, .. } => {
                assert_eq!(source.to_string(), expected_error);
            }
            error => panic!("unexpected error: {error}"),
        }
    }

    #[tokio::test]
    async fn list_wraps_every_object() {
        let server = FakeApiServer::new();
        server.insert(&service("a", NAMESPACE));
        server.insert(&service("b", NAMESPACE));
        server.insert(&service("c", "other"));

        let builders = Builder::<Service>::list(&server.client(), NAMESPACE, &ListParams::default())
            .await
            .unwrap();

        let mut names: Vec<_> = builders.iter().map(Builder::name).collect();
        names.sort_unstable();
        assert_eq!(names, ["a", "b"]);
    }
}
