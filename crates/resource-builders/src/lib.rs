//! Builders for Kubernetes objects that pair a desired definition with the live object fetched
//! from the cluster.
//!
//! All cluster access goes through [`client::Client`], a thin wrapper around [`kube::Client`].
//! The builders in [`builder`] record the first problem found while defining an object and report
//! it from the next operation that would talk to the cluster.
//!
//! ## Crate Features
//!
//! - `testing` exposes [`testing::FakeApiServer`], an in-memory stand-in for the Kubernetes API
//!   server.

pub mod builder;
pub mod client;
pub mod crd;
pub mod logging;
#[cfg(any(test, feature = "testing"))]
pub mod testing;
pub mod yaml;

// External re-exports
pub use k8s_openapi;
pub use kube;
pub use schemars;
// Internal re-exports
pub use crate::yaml::CustomResourceExt;
