//! An in-memory stand-in for the Kubernetes API server.
//!
//! [`FakeApiServer`] implements the handful of REST calls the builders issue (get, list, create,
//! replace and delete of namespaced objects) on top of a map of JSON documents. It is plugged into
//! [`kube::Client::new`] as a [`tower::Service`], so everything above the HTTP layer runs exactly
//! as it would against a real cluster.
use std::{
    collections::BTreeMap,
    convert::Infallible,
    sync::{
        Arc, Mutex, MutexGuard, PoisonError,
        atomic::{AtomicBool, AtomicU16, AtomicU64, Ordering},
    },
    task::{Context, Poll},
};

use futures::future::BoxFuture;
use http::{HeaderValue, Method, Request, Response, StatusCode, header::CONTENT_TYPE};
use http_body_util::BodyExt;
use kube::{Resource, ResourceExt, client::Body};
use serde::Serialize;
use serde_json::{Value, json};
use tower::Service;

use crate::client::{Client, DEFAULT_FIELD_MANAGER};

/// Identifies one stored object: API prefix plus plural (`api/v1/services`), namespace and name.
type ObjectKey = (String, String, String);

/// An in-memory Kubernetes API server for namespaced resources.
///
/// Clones share the same set of objects.
#[derive(Clone, Debug, Default)]
pub struct FakeApiServer {
    objects: Arc<Mutex<BTreeMap<ObjectKey, Value>>>,
    revision: Arc<AtomicU64>,

    /// Status code every request is answered with, `0` when requests are served normally.
    forced_status: Arc<AtomicU16>,
    keep_deleted: Arc<AtomicBool>,
}

/// The part of a request path the fake server cares about.
#[derive(Debug, PartialEq, Eq)]
struct Target {
    collection: String,
    namespace: Option<String>,
    name: Option<String>,
}

impl Target {
    /// Parses `/api/v1/namespaces/{ns}/{plural}[/{name}]`,
    /// `/apis/{group}/{version}/namespaces/{ns}/{plural}[/{name}]` and the cluster-wide
    /// collections `/api/v1/{plural}` and `/apis/{group}/{version}/{plural}`.
    fn parse(path: &str) -> Option<Self> {
        let segments: Vec<&str> = path.trim_matches('/').split('/').collect();
        let prefix_len = match segments.first() {
            Some(&"api") => 2,
            Some(&"apis") => 3,
            _ => return None,
        };

        if segments.len() <= prefix_len {
            return None;
        }

        let prefix = segments[..prefix_len].join("/");
        let target = match &segments[prefix_len..] {
            ["namespaces", namespace, plural] => Self {
                collection: format!("{prefix}/{plural}"),
                namespace: Some((*namespace).to_owned()),
                name: None,
            },
            ["namespaces", namespace, plural, name] => Self {
                collection: format!("{prefix}/{plural}"),
                namespace: Some((*namespace).to_owned()),
                name: Some((*name).to_owned()),
            },
            [plural] => Self {
                collection: format!("{prefix}/{plural}"),
                namespace: None,
                name: None,
            },
            _ => return None,
        };

        Some(target)
    }
}

impl FakeApiServer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a [`Client`] talking to this server.
    ///
    /// Like every [`kube::Client`], it has to be created within a Tokio runtime.
    pub fn client(&self) -> Client {
        self.clone().into_client()
    }

    pub fn into_client(self) -> Client {
        Client::new(
            kube::Client::new(self, "default"),
            Some(DEFAULT_FIELD_MANAGER.to_owned()),
        )
    }

    /// Stores `object` as if it had been created through the API.
    pub fn insert<K>(&self, object: &K)
    where
        K: Resource<DynamicType = ()> + Serialize,
    {
        let collection = collection_path::<K>();
        let namespace = object.namespace().unwrap_or_default();
        let name = object.name_any();

        let value = match serde_json::to_value(object) {
            Ok(value) => value,
            Err(error) => {
                tracing::warn!(%error, "failed to serialize object for the fake API server");
                return;
            }
        };

        let value = self.stamp(value, &namespace);
        self.lock().insert((collection, namespace, name), value);
    }

    /// Number of stored objects across all kinds.
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    /// Answers every following request with `status` instead of serving it. Passing
    /// [`StatusCode::OK`] restores normal operation.
    pub fn fail_requests(&self, status: StatusCode) {
        let status = if status == StatusCode::OK {
            0
        } else {
            status.as_u16()
        };

        self.forced_status.store(status, Ordering::SeqCst);
    }

    /// When enabled, DELETE requests are acknowledged but the objects stay in place, like objects
    /// held back by a finalizer.
    pub fn keep_deleted_objects(&self, keep: bool) {
        self.keep_deleted.store(keep, Ordering::SeqCst);
    }

    fn forced_status(&self) -> Option<StatusCode> {
        match self.forced_status.load(Ordering::SeqCst) {
            0 => None,
            status => StatusCode::from_u16(status).ok(),
        }
    }

    fn lock(&self) -> MutexGuard<'_, BTreeMap<ObjectKey, Value>> {
        self.objects.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Sets the server-owned metadata fields: namespace, uid and a fresh resource version.
    fn stamp(&self, mut value: Value, namespace: &str) -> Value {
        let revision = self.revision.fetch_add(1, Ordering::SeqCst) + 1;

        if let Some(object) = value.as_object_mut() {
            let metadata = object
                .entry("metadata")
                .or_insert_with(|| Value::Object(serde_json::Map::new()));

            if let Some(metadata) = metadata.as_object_mut() {
                metadata.insert("namespace".to_owned(), json!(namespace));
                metadata.insert("resourceVersion".to_owned(), json!(revision.to_string()));
                metadata
                    .entry("uid")
                    .or_insert_with(|| json!(format!("uid-{revision}")));
            }
        }

        value
    }

    fn handle(&self, method: &Method, path: &str, body: &[u8]) -> Response<Body> {
        if let Some(status) = self.forced_status() {
            return status_response(status, "InternalError", "injected failure");
        }

        let Some(target) = Target::parse(path) else {
            return status_response(StatusCode::NOT_FOUND, "NotFound", "unknown path");
        };

        match (method.as_str(), target) {
            (
                "GET",
                Target {
                    collection,
                    namespace: Some(namespace),
                    name: Some(name),
                },
            ) => match self.lock().get(&(collection, namespace, name.clone())) {
                Some(object) => json_response(StatusCode::OK, object),
                None => not_found(&name),
            },
            (
                "GET",
                Target {
                    collection,
                    namespace,
                    name: None,
                },
            ) => {
                let items: Vec<Value> = self
                    .lock()
                    .iter()
                    .filter(|((c, ns, _), _)| {
                        c == &collection && namespace.as_ref().is_none_or(|namespace| ns == namespace)
                    })
                    .map(|(_, object)| object.clone())
                    .collect();

                json_response(
                    StatusCode::OK,
                    &json!({
                        "apiVersion": "v1",
                        "kind": "List",
                        "metadata": { "resourceVersion": self.revision.load(Ordering::SeqCst).to_string() },
                        "items": items,
                    }),
                )
            }
            (
                "POST",
                Target {
                    collection,
                    namespace: Some(namespace),
                    name: None,
                },
            ) => {
                let Some((name, object)) = parse_object(body) else {
                    return status_response(
                        StatusCode::BAD_REQUEST,
                        "BadRequest",
                        "request body is not a named object",
                    );
                };

                let key = (collection, namespace, name);
                if self.lock().contains_key(&key) {
                    return status_response(
                        StatusCode::CONFLICT,
                        "AlreadyExists",
                        &format!("{name:?} already exists", name = key.2),
                    );
                }

                let object = self.stamp(object, &key.1);
                self.lock().insert(key, object.clone());
                json_response(StatusCode::CREATED, &object)
            }
            (
                "PUT",
                Target {
                    collection,
                    namespace: Some(namespace),
                    name: Some(name),
                },
            ) => {
                let Some((_, object)) = parse_object(body) else {
                    return status_response(
                        StatusCode::BAD_REQUEST,
                        "BadRequest",
                        "request body is not a named object",
                    );
                };

                let key = (collection, namespace, name);
                if !self.lock().contains_key(&key) {
                    return not_found(&key.2);
                }

                let object = self.stamp(object, &key.1);
                self.lock().insert(key, object.clone());
                json_response(StatusCode::OK, &object)
            }
            (
                "DELETE",
                Target {
                    collection,
                    namespace: Some(namespace),
                    name: Some(name),
                },
            ) => {
                let key = (collection, namespace, name.clone());
                let mut objects = self.lock();
                let deleted = if self.keep_deleted.load(Ordering::SeqCst) {
                    objects.get(&key).cloned()
                } else {
                    objects.remove(&key)
                };

                match deleted {
                    Some(object) => json_response(StatusCode::OK, &object),
                    None => not_found(&name),
                }
            }
            _ => status_response(
                StatusCode::METHOD_NOT_ALLOWED,
                "MethodNotAllowed",
                "the fake API server does not support this request",
            ),
        }
    }
}

impl Service<Request<Body>> for FakeApiServer {
    type Error = Infallible;
    type Future = BoxFuture<'static, Result<Self::Response, Self::Error>>;
    type Response = Response<Body>;

    fn poll_ready(&mut self, _cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        Poll::Ready(Ok(()))
    }

    fn call(&mut self, request: Request<Body>) -> Self::Future {
        let server = self.clone();

        Box::pin(async move {
            let (parts, body) = request.into_parts();
            let body = match body.collect().await {
                Ok(collected) => collected.to_bytes(),
                Err(_) => {
                    return Ok(status_response(
                        StatusCode::BAD_REQUEST,
                        "BadRequest",
                        "failed to read request body",
                    ));
                }
            };

            tracing::trace!(method = %parts.method, path = parts.uri.path(), "fake API request");
            Ok(server.handle(&parts.method, parts.uri.path(), &body))
        })
    }
}

fn collection_path<K>() -> String
where
    K: Resource<DynamicType = ()>,
{
    let group = K::group(&());
    let version = K::version(&());
    let plural = K::plural(&());

    if group.is_empty() {
        format!("api/{version}/{plural}")
    } else {
        format!("apis/{group}/{version}/{plural}")
    }
}

fn parse_object(body: &[u8]) -> Option<(String, Value)> {
    let object: Value = serde_json::from_slice(body).ok()?;
    let name = object.pointer("/metadata/name")?.as_str()?.to_owned();

    Some((name, object))
}

fn json_response(status: StatusCode, value: &Value) -> Response<Body> {
    let mut response = Response::new(Body::from(value.to_string().into_bytes()));
    *response.status_mut() = status;
    response
        .headers_mut()
        .insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
    response
}

fn not_found(name: &str) -> Response<Body> {
    status_response(
        StatusCode::NOT_FOUND,
        "NotFound",
        &format!("{name:?} not found"),
    )
}

fn status_response(status: StatusCode, reason: &str, message: &str) -> Response<Body> {
    json_response(
        status,
        &json!({
            "apiVersion": "v1",
            "kind": "Status",
            "metadata": {},
            "status": "Failure",
            "message": message,
            "reason": reason,
            "code": status.as_u16(),
        }),
    )
}
