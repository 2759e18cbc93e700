//! Resource types of custom resources which are not part of [`k8s_openapi`].
pub mod argocd;
pub mod ibgu;
