//! Builder for [`ImageBasedGroupUpgrade`] objects.
use std::collections::BTreeMap;

use k8s_openapi::apimachinery::pkg::apis::meta::v1::{LabelSelector, ObjectMeta};
use kube::core::gvk::GroupVersionResource;

use crate::{
    builder::{BuildableResource, Builder, DefinitionError},
    client::Client,
    crd::ibgu::v1alpha1::{
        AutoRollbackOnFailure, ConfigMapRef, ImageBasedGroupUpgrade, ImageBasedGroupUpgradeSpec,
        PlanItem, RolloutStrategy,
    },
};

pub type ImageBasedGroupUpgradeBuilder = Builder<ImageBasedGroupUpgrade>;

impl BuildableResource for ImageBasedGroupUpgrade {
    const KIND: &'static str = "ibgu";
}

impl Builder<ImageBasedGroupUpgrade> {
    /// Defines an empty IBGU. Use the `with_*` methods to select clusters and describe the upgrade.
    pub fn new(client: Client, name: impl Into<String>, namespace: impl Into<String>) -> Self {
        let name = name.into();
        let namespace = namespace.into();
        tracing::debug!(%name, %namespace, "initializing new ibgu");

        let definition = ImageBasedGroupUpgrade {
            metadata: ObjectMeta {
                name: Some(name),
                namespace: Some(namespace),
                ..ObjectMeta::default()
            },
            spec: ImageBasedGroupUpgradeSpec::default(),
            status: None,
        };

        Self::from_definition(client, definition)
    }

    /// Adds a selector matching the managed clusters which carry all of `labels`.
    pub fn with_cluster_label_selectors(&mut self, labels: BTreeMap<String, String>) -> &mut Self {
        tracing::debug!(?labels, "adding cluster label selector to the ibgu");

        self.try_mutate(|ibgu| {
            if labels.is_empty() {
                return Err(DefinitionError::EmptyClusterLabelSelectors);
            }

            ibgu.spec.cluster_label_selectors.push(LabelSelector {
                match_labels: Some(labels),
                ..LabelSelector::default()
            });

            Ok(())
        })
    }

    /// Sets the seed image the clusters are upgraded to. An already configured pull secret is kept.
    pub fn with_seed_image_ref(
        &mut self,
        image: impl Into<String>,
        version: impl Into<String>,
    ) -> &mut Self {
        let image = image.into();
        let version = version.into();
        tracing::debug!(%image, %version, "setting seed image of the ibgu");

        self.try_mutate(|ibgu| {
            if image.is_empty() {
                return Err(DefinitionError::EmptySeedImage);
            }

            if version.is_empty() {
                return Err(DefinitionError::EmptySeedVersion);
            }

            let seed_image_ref = &mut ibgu.spec.ibu_spec.seed_image_ref;
            seed_image_ref.image = image;
            seed_image_ref.version = version;

            Ok(())
        })
    }

    /// Adds a ConfigMap holding OADP backup and restore resources.
    pub fn with_oadp_content(
        &mut self,
        name: impl Into<String>,
        namespace: impl Into<String>,
    ) -> &mut Self {
        let config_map = config_map_ref("oadp content", name.into(), namespace.into());

        self.try_mutate(|ibgu| {
            ibgu.spec.ibu_spec.oadp_content.push(config_map?);
            Ok(())
        })
    }

    /// Adds a ConfigMap holding manifests applied to the clusters after the upgrade.
    pub fn with_extra_manifests(
        &mut self,
        name: impl Into<String>,
        namespace: impl Into<String>,
    ) -> &mut Self {
        let config_map = config_map_ref("extra manifests", name.into(), namespace.into());

        self.try_mutate(|ibgu| {
            ibgu.spec.ibu_spec.extra_manifests.push(config_map?);
            Ok(())
        })
    }

    /// Sets the ConfigMap listing images to pull before the upgrade.
    pub fn with_additional_images(
        &mut self,
        name: impl Into<String>,
        namespace: impl Into<String>,
    ) -> &mut Self {
        let config_map = config_map_ref("additional images", name.into(), namespace.into());

        self.try_mutate(|ibgu| {
            ibgu.spec.ibu_spec.additional_images = Some(config_map?);
            Ok(())
        })
    }

    /// Rolls the clusters back when they are not healthy `init_monitor_timeout_seconds` after the
    /// upgrade.
    pub fn with_auto_rollback_on_failure(&mut self, init_monitor_timeout_seconds: u32) -> &mut Self {
        tracing::debug!(
            init_monitor_timeout_seconds,
            "enabling automatic rollback of the ibgu"
        );

        self.try_mutate(|ibgu| {
            if init_monitor_timeout_seconds == 0 {
                return Err(DefinitionError::ZeroInitMonitorTimeout);
            }

            ibgu.spec.ibu_spec.auto_rollback_on_failure = Some(AutoRollbackOnFailure {
                init_monitor_timeout_seconds: Some(init_monitor_timeout_seconds),
            });

            Ok(())
        })
    }

    /// Appends a plan item running `actions` on batches of `max_concurrency` clusters, timing out
    /// after `timeout` minutes.
    pub fn with_plan(
        &mut self,
        actions: Vec<String>,
        max_concurrency: u32,
        timeout: u32,
    ) -> &mut Self {
        tracing::debug!(?actions, max_concurrency, timeout, "adding plan item to the ibgu");

        self.try_mutate(|ibgu| {
            if actions.is_empty() {
                return Err(DefinitionError::EmptyPlanActions);
            }

            if max_concurrency == 0 {
                return Err(DefinitionError::ZeroMaxConcurrency);
            }

            if timeout == 0 {
                return Err(DefinitionError::ZeroPlanTimeout);
            }

            ibgu.spec.plan.push(PlanItem {
                actions,
                rollout_strategy: RolloutStrategy {
                    max_concurrency,
                    timeout,
                },
            });

            Ok(())
        })
    }
}

/// Returns the [`GroupVersionResource`] of IBGUs, usable for generic cleanup.
pub fn ibgu_gvr() -> GroupVersionResource {
    ImageBasedGroupUpgradeBuilder::gvr()
}

fn config_map_ref(
    field: &'static str,
    name: String,
    namespace: String,
) -> Result<ConfigMapRef, DefinitionError> {
    tracing::debug!(field, %name, %namespace, "defining config map reference");

    if name.is_empty() {
        return Err(DefinitionError::EmptyConfigMapName { field });
    }

    if namespace.is_empty() {
        return Err(DefinitionError::EmptyConfigMapNamespace { field });
    }

    Ok(ConfigMapRef { name, namespace })
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use rstest::rstest;

    use super::*;
    use crate::{
        builder::Error,
        crd::ibgu::{action, v1alpha1::PullSecretRef},
        testing::FakeApiServer,
    };

    const NAME: &str = "test-ibgu";
    const NAMESPACE: &str = "test-namespace";

    fn builder(server: &FakeApiServer) -> ImageBasedGroupUpgradeBuilder {
        ImageBasedGroupUpgradeBuilder::new(server.client(), NAME, NAMESPACE)
    }

    fn ibgu() -> ImageBasedGroupUpgrade {
        ImageBasedGroupUpgrade {
            metadata: ObjectMeta {
                name: Some(NAME.to_owned()),
                namespace: Some(NAMESPACE.to_owned()),
                ..ObjectMeta::default()
            },
            ..ImageBasedGroupUpgrade::default()
        }
    }

    fn error(builder: &ImageBasedGroupUpgradeBuilder) -> Option<String> {
        builder.error().map(ToString::to_string)
    }

    #[rstest]
    #[case(NAME, NAMESPACE, None)]
    #[case("", NAMESPACE, Some("ibgu 'name' cannot be empty"))]
    #[case(NAME, "", Some("ibgu 'nsname' cannot be empty"))]
    #[tokio::test]
    async fn new_ibgu(
        #[case] name: &str,
        #[case] namespace: &str,
        #[case] expected_error: Option<&str>,
    ) {
        let server = FakeApiServer::new();
        let builder = ImageBasedGroupUpgradeBuilder::new(server.client(), name, namespace);

        assert_eq!(error(&builder).as_deref(), expected_error);
        assert_eq!(builder.name(), name);
        assert_eq!(builder.namespace(), namespace);
    }

    #[rstest]
    #[case(BTreeMap::from([("key".to_owned(), "value".to_owned())]), None)]
    #[case(
        BTreeMap::new(),
        Some("can not apply empty cluster label selectors to the IBGU")
    )]
    #[tokio::test]
    async fn with_cluster_label_selectors(
        #[case] labels: BTreeMap<String, String>,
        #[case] expected_error: Option<&str>,
    ) {
        let server = FakeApiServer::new();
        let mut builder = builder(&server);
        builder.with_cluster_label_selectors(labels.clone());

        assert_eq!(error(&builder).as_deref(), expected_error);

        if expected_error.is_none() {
            assert_eq!(
                builder.definition().spec.cluster_label_selectors[0].match_labels,
                Some(labels)
            );
        }
    }

    #[rstest]
    #[case("test-image", "v1.0", None)]
    #[case("", "v1.0", Some("seedImage cannot be empty"))]
    #[case("test-image", "", Some("seedVersion cannot be empty"))]
    #[tokio::test]
    async fn with_seed_image_ref(
        #[case] image: &str,
        #[case] version: &str,
        #[case] expected_error: Option<&str>,
    ) {
        let server = FakeApiServer::new();
        let mut builder = builder(&server);
        builder.with_seed_image_ref(image, version);

        assert_eq!(error(&builder).as_deref(), expected_error);

        if expected_error.is_none() {
            let seed_image_ref = &builder.definition().spec.ibu_spec.seed_image_ref;
            assert_eq!(seed_image_ref.image, image);
            assert_eq!(seed_image_ref.version, version);
        }
    }

    #[tokio::test]
    async fn with_seed_image_ref_keeps_pull_secret() {
        let server = FakeApiServer::new();
        let mut builder = builder(&server);
        builder.definition_mut().spec.ibu_spec.seed_image_ref.pull_secret_ref = Some(PullSecretRef {
            name: "pull-secret".to_owned(),
        });

        builder.with_seed_image_ref("test-image", "v1.0");

        assert_eq!(
            builder
                .definition()
                .spec
                .ibu_spec
                .seed_image_ref
                .pull_secret_ref
                .as_ref()
                .map(|secret| secret.name.as_str()),
            Some("pull-secret")
        );
    }

    #[rstest]
    #[case("test-oadp", "test-ns", None)]
    #[case("", "test-ns", Some("oadp content name cannot be empty"))]
    #[case("test-oadp", "", Some("oadp content namespace cannot be empty"))]
    #[tokio::test]
    async fn with_oadp_content(
        #[case] name: &str,
        #[case] namespace: &str,
        #[case] expected_error: Option<&str>,
    ) {
        let server = FakeApiServer::new();
        let mut builder = builder(&server);
        builder.with_oadp_content(name, namespace);

        assert_eq!(error(&builder).as_deref(), expected_error);

        if expected_error.is_none() {
            assert_eq!(
                builder.definition().spec.ibu_spec.oadp_content,
                vec![ConfigMapRef {
                    name: name.to_owned(),
                    namespace: namespace.to_owned(),
                }]
            );
        }
    }

    #[rstest]
    #[case("manifests", "test-ns", None)]
    #[case("", "test-ns", Some("extra manifests name cannot be empty"))]
    #[case("manifests", "", Some("extra manifests namespace cannot be empty"))]
    #[tokio::test]
    async fn with_extra_manifests(
        #[case] name: &str,
        #[case] namespace: &str,
        #[case] expected_error: Option<&str>,
    ) {
        let server = FakeApiServer::new();
        let mut builder = builder(&server);
        builder
            .with_extra_manifests(name, namespace)
            .with_extra_manifests("more-manifests", "test-ns");

        assert_eq!(error(&builder).as_deref(), expected_error);

        if expected_error.is_none() {
            assert_eq!(builder.definition().spec.ibu_spec.extra_manifests.len(), 2);
        }
    }

    #[rstest]
    #[case("images", "test-ns", None)]
    #[case("", "test-ns", Some("additional images name cannot be empty"))]
    #[case("images", "", Some("additional images namespace cannot be empty"))]
    #[tokio::test]
    async fn with_additional_images(
        #[case] name: &str,
        #[case] namespace: &str,
        #[case] expected_error: Option<&str>,
    ) {
        let server = FakeApiServer::new();
        let mut builder = builder(&server);
        builder.with_additional_images(name, namespace);

        assert_eq!(error(&builder).as_deref(), expected_error);
        assert_eq!(
            builder.definition().spec.ibu_spec.additional_images.is_some(),
            expected_error.is_none()
        );
    }

    #[rstest]
    #[case(300, None)]
    #[case(0, Some("initMonitorTimeoutSeconds must be greater than 0"))]
    #[tokio::test]
    async fn with_auto_rollback_on_failure(
        #[case] timeout: u32,
        #[case] expected_error: Option<&str>,
    ) {
        let server = FakeApiServer::new();
        let mut builder = builder(&server);
        builder.with_auto_rollback_on_failure(timeout);

        assert_eq!(error(&builder).as_deref(), expected_error);

        if expected_error.is_none() {
            assert_eq!(
                builder.definition().spec.ibu_spec.auto_rollback_on_failure,
                Some(AutoRollbackOnFailure {
                    init_monitor_timeout_seconds: Some(timeout),
                })
            );
        }
    }

    #[rstest]
    #[case(&["action1", "action2"], 2, 300, None)]
    #[case(&[], 2, 300, Some("plan actions cannot be empty"))]
    #[case(&["action1"], 0, 300, Some("maxConcurrency must be greater than 0"))]
    #[case(&["action1"], 2, 0, Some("timeout must be greater than 0"))]
    #[tokio::test]
    async fn with_plan(
        #[case] actions: &[&str],
        #[case] max_concurrency: u32,
        #[case] timeout: u32,
        #[case] expected_error: Option<&str>,
    ) {
        let server = FakeApiServer::new();
        let mut builder = builder(&server);
        let actions: Vec<String> = actions.iter().map(|action| (*action).to_owned()).collect();
        builder.with_plan(actions.clone(), max_concurrency, timeout);

        assert_eq!(error(&builder).as_deref(), expected_error);

        if expected_error.is_none() {
            let plan = &builder.definition().spec.plan[0];
            assert_eq!(plan.actions, actions);
            assert_eq!(plan.rollout_strategy.max_concurrency, max_concurrency);
            assert_eq!(plan.rollout_strategy.timeout, timeout);
        }
    }

    #[rstest]
    #[case(true)]
    #[case(false)]
    #[tokio::test]
    async fn get(#[case] exists: bool) {
        let server = FakeApiServer::new();
        if exists {
            server.insert(&ibgu());
        }

        let result = builder(&server).get().await;

        assert_eq!(result.is_ok(), exists);
    }

    #[rstest]
    #[case(true)]
    #[case(false)]
    #[tokio::test]
    async fn exists(#[case] object_exists: bool) {
        let server = FakeApiServer::new();
        if object_exists {
            server.insert(&ibgu());
        }

        assert_eq!(builder(&server).exists().await.unwrap(), object_exists);
    }

    #[rstest]
    #[case(true)]
    #[case(false)]
    #[tokio::test]
    async fn create(#[case] exists: bool) {
        let server = FakeApiServer::new();
        if exists {
            server.insert(&ibgu());
        }

        let mut builder = builder(&server);
        builder
            .with_cluster_label_selectors(BTreeMap::from([(
                "common".to_owned(),
                "true".to_owned(),
            )]))
            .with_seed_image_ref("quay.io/seed/image:4.16.0", "4.16.0")
            .with_plan(
                vec![action::PREP.to_owned(), action::UPGRADE.to_owned()],
                2,
                30,
            );

        let created = builder.create().await.unwrap();

        assert_eq!(created.metadata.name.as_deref(), Some(NAME));
        assert_eq!(created.metadata.namespace.as_deref(), Some(NAMESPACE));
        assert_eq!(server.len(), 1);
    }

    #[rstest]
    #[case(true)]
    #[case(false)]
    #[tokio::test]
    async fn delete(#[case] exists: bool) {
        let server = FakeApiServer::new();
        if exists {
            server.insert(&ibgu());
        }

        let mut builder = builder(&server);
        builder.delete().await.unwrap();

        assert!(builder.object().is_none());
        assert!(server.is_empty());
    }

    #[tokio::test]
    async fn delete_and_wait() {
        let server = FakeApiServer::new();
        server.insert(&ibgu());

        builder(&server)
            .delete_and_wait(Duration::from_secs(5))
            .await
            .unwrap();

        assert!(server.is_empty());
    }

    #[tokio::test]
    async fn update() {
        let server = FakeApiServer::new();
        server.insert(&ibgu());

        let mut builder = ImageBasedGroupUpgradeBuilder::pull(server.client(), NAME, NAMESPACE)
            .await
            .unwrap();
        builder.with_plan(vec![action::ABORT.to_owned()], 1, 10);

        let updated = builder.update().await.unwrap();

        assert_eq!(updated.spec.plan.len(), 1);
        assert_eq!(updated.spec.plan[0].actions, [action::ABORT]);
    }

    #[tokio::test]
    async fn pull_missing_ibgu() {
        let server = FakeApiServer::new();

        let error = ImageBasedGroupUpgradeBuilder::pull(server.client(), NAME, NAMESPACE)
            .await
            .unwrap_err();

        assert!(matches!(error, Error::ObjectNotFound { kind: "ibgu", .. }));
    }

    #[test]
    fn gvr() {
        let gvr = ibgu_gvr();

        assert_eq!(gvr.group, "lcm.openshift.io");
        assert_eq!(gvr.version, "v1alpha1");
        assert_eq!(gvr.resource, "imagebasedgroupupgrades");
    }
}
