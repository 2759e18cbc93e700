//! This module contains resource types to interact with [`v1alpha1::ImageBasedGroupUpgrade`]s.
//!
//! An ImageBasedGroupUpgrade (IBGU) drives image based upgrades of a group of managed clusters,
//! selected by labels, through a plan of actions rolled out in batches.

/// Actions which can be part of a [`v1alpha1::PlanItem`], in the order they are usually run.
pub mod action {
    pub const PREP: &str = "Prep";
    pub const UPGRADE: &str = "Upgrade";
    pub const FINALIZE_UPGRADE: &str = "FinalizeUpgrade";
    pub const ROLLBACK: &str = "Rollback";
    pub const FINALIZE_ROLLBACK: &str = "FinalizeRollback";
    pub const ABORT: &str = "Abort";
    pub const ABORT_ON_FAILURE: &str = "AbortOnFailure";
}

pub mod v1alpha1 {
    use k8s_openapi::apimachinery::pkg::apis::meta::v1::{Condition, LabelSelector, Time};
    use kube::CustomResource;
    use schemars::JsonSchema;
    use serde::{Deserialize, Serialize};

    /// Upgrades a group of managed clusters to a new seed image.
    #[derive(CustomResource, Serialize, Deserialize, Clone, Debug, Default, JsonSchema, PartialEq)]
    #[kube(
        group = "lcm.openshift.io",
        version = "v1alpha1",
        kind = "ImageBasedGroupUpgrade",
        plural = "imagebasedgroupupgrades",
        shortname = "ibgu",
        namespaced,
        status = "ImageBasedGroupUpgradeStatus",
        derive = "Default",
        derive = "PartialEq"
    )]
    #[serde(rename_all = "camelCase")]
    pub struct ImageBasedGroupUpgradeSpec {
        /// Image based upgrade settings applied to every selected cluster.
        #[serde(default)]
        pub ibu_spec: ImageBasedUpgradeSpec,

        /// The steps of the upgrade. Every item runs its actions on batches of clusters.
        #[serde(default)]
        pub plan: Vec<PlanItem>,

        /// Selects the managed clusters to upgrade. A cluster matching any selector is included.
        #[serde(default)]
        pub cluster_label_selectors: Vec<LabelSelector>,
    }

    #[derive(Serialize, Deserialize, Clone, Debug, Default, JsonSchema, PartialEq, Eq)]
    #[serde(rename_all = "camelCase")]
    pub struct ImageBasedUpgradeSpec {
        #[serde(default)]
        pub seed_image_ref: SeedImageRef,

        /// ConfigMap listing images which are pulled ahead of the upgrade.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        pub additional_images: Option<ConfigMapRef>,

        /// ConfigMaps holding OADP backup and restore resources.
        #[serde(default, skip_serializing_if = "Vec::is_empty")]
        pub oadp_content: Vec<ConfigMapRef>,

        /// ConfigMaps holding manifests which are applied after the upgrade.
        #[serde(default, skip_serializing_if = "Vec::is_empty")]
        pub extra_manifests: Vec<ConfigMapRef>,

        #[serde(default, skip_serializing_if = "Option::is_none")]
        pub auto_rollback_on_failure: Option<AutoRollbackOnFailure>,
    }

    #[derive(Serialize, Deserialize, Clone, Debug, Default, JsonSchema, PartialEq, Eq)]
    #[serde(rename_all = "camelCase")]
    pub struct SeedImageRef {
        /// Version of the seed image, such as `4.16.0`.
        #[serde(default)]
        pub version: String,

        /// Pull spec of the seed image.
        #[serde(default)]
        pub image: String,

        #[serde(default, skip_serializing_if = "Option::is_none")]
        pub pull_secret_ref: Option<PullSecretRef>,
    }

    #[derive(Serialize, Deserialize, Clone, Debug, Default, JsonSchema, PartialEq, Eq)]
    #[serde(rename_all = "camelCase")]
    pub struct PullSecretRef {
        pub name: String,
    }

    #[derive(Serialize, Deserialize, Clone, Debug, Default, JsonSchema, PartialEq, Eq)]
    #[serde(rename_all = "camelCase")]
    pub struct ConfigMapRef {
        pub name: String,
        pub namespace: String,
    }

    #[derive(Serialize, Deserialize, Clone, Debug, Default, JsonSchema, PartialEq, Eq)]
    #[serde(rename_all = "camelCase")]
    pub struct AutoRollbackOnFailure {
        /// Time after which the upgrade is rolled back if the cluster did not become healthy.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        pub init_monitor_timeout_seconds: Option<u32>,
    }

    #[derive(Serialize, Deserialize, Clone, Debug, Default, JsonSchema, PartialEq, Eq)]
    #[serde(rename_all = "camelCase")]
    pub struct PlanItem {
        /// Actions run in order, see [`crate::crd::ibgu::action`].
        pub actions: Vec<String>,

        pub rollout_strategy: RolloutStrategy,
    }

    #[derive(Serialize, Deserialize, Clone, Debug, JsonSchema, PartialEq, Eq)]
    #[serde(rename_all = "camelCase")]
    pub struct RolloutStrategy {
        /// Number of clusters upgraded at the same time.
        pub max_concurrency: u32,

        /// Minutes after which the plan item times out.
        #[serde(default = "RolloutStrategy::default_timeout")]
        pub timeout: u32,
    }

    impl RolloutStrategy {
        const fn default_timeout() -> u32 {
            240
        }
    }

    impl Default for RolloutStrategy {
        fn default() -> Self {
            Self {
                max_concurrency: 1,
                timeout: Self::default_timeout(),
            }
        }
    }

    #[derive(Serialize, Deserialize, Clone, Debug, Default, JsonSchema, PartialEq)]
    #[serde(rename_all = "camelCase")]
    pub struct ImageBasedGroupUpgradeStatus {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        pub observed_generation: Option<i64>,

        #[serde(default, skip_serializing_if = "Option::is_none")]
        pub started_at: Option<Time>,

        #[serde(default, skip_serializing_if = "Option::is_none")]
        pub completed_at: Option<Time>,

        #[serde(default)]
        pub conditions: Vec<Condition>,

        /// Progress of every selected cluster.
        #[serde(default)]
        pub clusters: Vec<ClusterState>,
    }

    #[derive(Serialize, Deserialize, Clone, Debug, Default, JsonSchema, PartialEq, Eq)]
    #[serde(rename_all = "camelCase")]
    pub struct ClusterState {
        pub name: String,

        #[serde(default)]
        pub completed_actions: Vec<ActionMessage>,

        #[serde(default)]
        pub failed_actions: Vec<ActionMessage>,

        #[serde(default, skip_serializing_if = "Option::is_none")]
        pub current_action: Option<ActionMessage>,
    }

    #[derive(Serialize, Deserialize, Clone, Debug, Default, JsonSchema, PartialEq, Eq)]
    #[serde(rename_all = "camelCase")]
    pub struct ActionMessage {
        pub action: String,

        #[serde(default, skip_serializing_if = "String::is_empty")]
        pub message: String,
    }
}
