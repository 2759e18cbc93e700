//! Builder for core `v1` [`Service`] objects.
use std::collections::BTreeMap;

use k8s_openapi::{
    api::core::v1::{Service, ServicePort, ServiceSpec},
    apimachinery::pkg::{apis::meta::v1::ObjectMeta, util::intstr::IntOrString},
};
use kube::core::gvk::GroupVersionResource;
use strum::{AsRefStr, Display, EnumString};

use crate::{
    builder::{BuildableResource, Builder, DefinitionError},
    client::Client,
};

pub type ServiceBuilder = Builder<Service>;

impl BuildableResource for Service {
    const KIND: &'static str = "service";
}

/// The `spec.type` values a [`ServiceBuilder`] sets.
#[derive(AsRefStr, Clone, Copy, Debug, Display, EnumString, Eq, PartialEq)]
pub enum ServiceType {
    ClusterIP,
    NodePort,
    LoadBalancer,
}

impl Builder<Service> {
    /// Defines a `ClusterIP` service selecting the Pods labeled with `selector` and exposing a
    /// single `port`. Use [`Self::with_node_port`] to turn it into a `NodePort` service.
    pub fn new(
        client: Client,
        name: impl Into<String>,
        namespace: impl Into<String>,
        selector: BTreeMap<String, String>,
        port: ServicePort,
    ) -> Self {
        let name = name.into();
        let namespace = namespace.into();
        tracing::debug!(%name, %namespace, "initializing new service");

        let definition = Service {
            metadata: ObjectMeta {
                name: Some(name),
                namespace: Some(namespace),
                ..ObjectMeta::default()
            },
            spec: Some(ServiceSpec {
                type_: Some(ServiceType::ClusterIP.to_string()),
                selector: Some(selector),
                ports: Some(vec![port]),
                ..ServiceSpec::default()
            }),
            ..Service::default()
        };

        Self::from_definition(client, definition)
    }

    /// Switches the service to `NodePort` and exposes the first port on the same node port.
    pub fn with_node_port(&mut self) -> &mut Self {
        self.try_mutate(|service| {
            let spec = service.spec.get_or_insert_with(ServiceSpec::default);
            spec.type_ = Some(ServiceType::NodePort.to_string());

            let port = spec
                .ports
                .as_mut()
                .and_then(|ports| ports.first_mut())
                .ok_or(DefinitionError::MissingServicePorts)?;
            port.node_port = Some(port.port);

            Ok(())
        })
    }

    /// Switches the service to `LoadBalancer` with the given external traffic policy, such as
    /// `Local` or `Cluster`.
    pub fn with_external_traffic_policy(&mut self, policy: impl Into<String>) -> &mut Self {
        let policy = policy.into();
        tracing::debug!(%policy, "defining external traffic policy");

        self.try_mutate(|service| {
            if policy.is_empty() {
                return Err(DefinitionError::EmptyExternalTrafficPolicy);
            }

            let spec = service.spec.get_or_insert_with(ServiceSpec::default);
            spec.type_ = Some(ServiceType::LoadBalancer.to_string());
            spec.external_traffic_policy = Some(policy);

            Ok(())
        })
    }

    /// Replaces the annotations of the service.
    pub fn with_annotation(&mut self, annotations: BTreeMap<String, String>) -> &mut Self {
        tracing::debug!(?annotations, "defining service annotations");

        self.try_mutate(|service| {
            if annotations.is_empty() {
                return Err(DefinitionError::EmptyAnnotations);
            }

            service.metadata.annotations = Some(annotations);
            Ok(())
        })
    }

    /// Sets the IP families (`IPv4`, `IPv6`) and the IP family policy (`SingleStack`,
    /// `PreferDualStack`, `RequireDualStack`) of the service.
    pub fn with_ip_family(
        &mut self,
        ip_families: Vec<String>,
        ip_family_policy: impl Into<String>,
    ) -> &mut Self {
        let ip_family_policy = ip_family_policy.into();
        tracing::debug!(?ip_families, %ip_family_policy, "defining service IP family");

        self.try_mutate(|service| {
            if ip_family_policy.is_empty() {
                return Err(DefinitionError::EmptyIpFamilyPolicy);
            }

            if ip_families.is_empty() {
                return Err(DefinitionError::EmptyIpFamilies);
            }

            let spec = service.spec.get_or_insert_with(ServiceSpec::default);
            spec.ip_families = Some(ip_families);
            spec.ip_family_policy = Some(ip_family_policy);

            Ok(())
        })
    }
}

/// Builds a [`ServicePort`] forwarding `port` to the numeric `target_port` of the selected Pods.
pub fn define_service_port(
    port: i32,
    target_port: i32,
    protocol: &str,
) -> Result<ServicePort, DefinitionError> {
    tracing::debug!(port, target_port, protocol, "defining service port");

    if !is_valid_port(port) {
        return Err(DefinitionError::InvalidPort { port });
    }

    if !is_valid_port(target_port) {
        return Err(DefinitionError::InvalidTargetPort { port: target_port });
    }

    Ok(ServicePort {
        port,
        target_port: Some(IntOrString::Int(target_port)),
        protocol: (!protocol.is_empty()).then(|| protocol.to_owned()),
        ..ServicePort::default()
    })
}

/// Returns the [`GroupVersionResource`] of services, usable for generic cleanup.
pub fn service_gvr() -> GroupVersionResource {
    ServiceBuilder::gvr()
}

fn is_valid_port(port: i32) -> bool {
    (1..=65535).contains(&port)
}
