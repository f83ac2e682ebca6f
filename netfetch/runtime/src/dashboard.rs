//! A report-only JSON API over scans.
//!
//! Scans served here never prompt. The only mutation is an explicit
//! `POST /api/add-policy`.
//!
//! Routes:
//!
//! - `GET /api/scan?namespace&dialect`
//! - `GET /api/namespaces`
//! - `GET /api/namespaces-with-policies?dialect`
//! - `GET /api/visualization?namespace&dialect`
//! - `GET /api/visualization/cluster?dialect`
//! - `GET /api/pod-info?namespace`
//! - `POST /api/add-policy`

use crate::core::{
    namespace, remediation, visualize, Cluster, DenyAll, Dialect, Error as CoreError,
    ProtectionCache, ScanResult, Scanner,
};
use anyhow::Result;
use bytes::Bytes;
use futures::future;
use http_body_util::BodyExt;
use hyper::{http, Request, Response};
use hyper_util::{rt::TokioIo, service::TowerToHyperService};
use serde::{Deserialize, Serialize};
use std::{future::Future, net::SocketAddr};
use thiserror::Error;
use tokio::net::TcpListener;
use tracing::{debug, info, info_span, trace, warn, Instrument};

type Body = http_body_util::Full<Bytes>;

#[derive(Clone)]
pub struct Dashboard<C> {
    cluster: C,
    cache: ProtectionCache,
}

#[derive(Debug, Error)]
pub enum Error {
    #[error("failed to read request body: {0}")]
    Request(#[source] Box<dyn std::error::Error + Send + Sync>),

    #[error("failed to encode json response: {0}")]
    Json(#[from] serde_json::Error),
}

#[derive(Debug, Deserialize)]
struct AddPolicy {
    namespace: String,
    #[serde(default = "default_dialect")]
    dialect: Dialect,
}

#[derive(Debug, Serialize)]
struct PolicyAdded {
    message: String,
    result: ScanResult,
}

#[derive(Debug, Serialize)]
struct Namespaces {
    namespaces: Vec<String>,
}

#[derive(Debug, Serialize)]
struct ErrorBody {
    error: String,
}

/// Accepts connections on `addr` until `shutdown` completes.
pub async fn serve<C>(
    addr: SocketAddr,
    dashboard: Dashboard<C>,
    shutdown: impl Future<Output = ()>,
) -> Result<()>
where
    C: Cluster + Clone + 'static,
{
    let listener = TcpListener::bind(addr).await?;
    info!(%addr, "Dashboard listening");

    tokio::pin!(shutdown);
    loop {
        let (socket, peer) = tokio::select! {
            accepted = listener.accept() => match accepted {
                Ok(conn) => conn,
                Err(error) => {
                    warn!(%error, "Failed to accept connection");
                    continue;
                }
            },
            () = &mut shutdown => {
                info!("Shutting down");
                return Ok(());
            }
        };

        let service = TowerToHyperService::new(dashboard.clone());
        tokio::spawn(
            async move {
                let conn = hyper::server::conn::http1::Builder::new()
                    .serve_connection(TokioIo::new(socket), service);
                if let Err(error) = conn.await {
                    debug!(%error, "Connection failed");
                }
            }
            .instrument(info_span!("conn", %peer)),
        );
    }
}

// === impl Dashboard ===

impl<C, B> tower::Service<Request<B>> for Dashboard<C>
where
    C: Cluster + Clone + 'static,
    B: hyper::body::Body + Send + 'static,
    B::Data: Send,
    B::Error: Into<Box<dyn std::error::Error + Send + Sync>>,
{
    type Response = Response<Body>;
    type Error = Error;
    type Future = future::BoxFuture<'static, Result<Response<Body>, Error>>;

    fn poll_ready(
        &mut self,
        _cx: &mut std::task::Context<'_>,
    ) -> std::task::Poll<std::result::Result<(), Self::Error>> {
        std::task::Poll::Ready(Ok(()))
    }

    fn call(&mut self, req: Request<B>) -> Self::Future {
        trace!(method = %req.method(), uri = %req.uri());
        let dashboard = self.clone();
        let method = req.method().clone();
        let path = req.uri().path().to_string();
        let query = req.uri().query().map(str::to_string);
        Box::pin(async move {
            match (&method, path.as_str()) {
                (&http::Method::GET, "/api/namespaces") => dashboard.namespaces().await,
                (
                    &http::Method::GET,
                    "/api/scan"
                    | "/api/namespaces-with-policies"
                    | "/api/visualization"
                    | "/api/visualization/cluster"
                    | "/api/pod-info",
                ) => {
                    let (namespace, dialect) = match parse_query(query.as_deref()) {
                        Ok(query) => query,
                        Err(error) => {
                            return error_response(http::StatusCode::BAD_REQUEST, error)
                        }
                    };
                    dashboard.query(&path, namespace, dialect).await
                }
                (&http::Method::POST, "/api/add-policy") => {
                    let bytes = req
                        .into_body()
                        .collect()
                        .await
                        .map_err(|e| Error::Request(e.into()))?
                        .to_bytes();
                    match serde_json::from_slice::<AddPolicy>(&bytes) {
                        Ok(body) => dashboard.add_policy(body).await,
                        Err(error) => {
                            warn!(%error, "Failed to parse request body");
                            error_response(http::StatusCode::BAD_REQUEST, error)
                        }
                    }
                }
                _ => Ok(not_found()),
            }
        })
    }
}

impl<C: Cluster + Clone> Dashboard<C> {
    pub fn new(cluster: C, cache: ProtectionCache) -> Self {
        Self { cluster, cache }
    }

    fn scanner(&self) -> Scanner<C> {
        Scanner::new(self.cluster.clone(), self.cache.clone())
    }

    /// Serves the read-only routes parameterized by `namespace` and
    /// `dialect`.
    async fn query(
        &self,
        path: &str,
        namespace: Option<String>,
        dialect: Dialect,
    ) -> Result<Response<Body>, Error> {
        match (path, namespace.as_deref()) {
            ("/api/scan", namespace) => {
                respond(self.scanner().scan(dialect, namespace).await, "Scan failed")
            }
            ("/api/namespaces-with-policies", _) => respond(
                visualize::namespaces_with_policies(&self.cluster, dialect)
                    .await
                    .map(|namespaces| Namespaces { namespaces }),
                "Failed to list namespaces with policies",
            ),
            ("/api/visualization/cluster", _) => respond(
                visualize::cluster(&self.cluster, dialect).await,
                "Failed to visualize cluster",
            ),
            ("/api/visualization", Some(ns)) => respond(
                visualize::namespace(&self.cluster, dialect, ns).await,
                "Failed to visualize namespace",
            ),
            ("/api/pod-info", Some(ns)) => respond(
                visualize::pod_info(&self.cluster, ns).await,
                "Failed to describe pods",
            ),
            ("/api/visualization" | "/api/pod-info", None) => error_response(
                http::StatusCode::BAD_REQUEST,
                "namespace parameter is required",
            ),
            _ => Ok(not_found()),
        }
    }

    async fn namespaces(&self) -> Result<Response<Body>, Error> {
        match namespace::select(&self.cluster, None).await {
            Ok(namespaces) => {
                json_response(http::StatusCode::OK, &Namespaces { namespaces })
            }
            Err(error) => {
                warn!(%error, "Failed to list namespaces");
                error_response(http::StatusCode::INTERNAL_SERVER_ERROR, error)
            }
        }
    }

    async fn add_policy(
        &self,
        AddPolicy { namespace, dialect }: AddPolicy,
    ) -> Result<Response<Body>, Error> {
        let policy = DenyAll::namespaced(dialect, namespace.clone());
        if let Err(error) = remediation::apply(&self.cluster, &policy).await {
            warn!(%error, "Failed to apply default deny-all policy");
            return error_response(http::StatusCode::INTERNAL_SERVER_ERROR, error);
        }

        let result = match self.scanner().scan(dialect, Some(&namespace)).await {
            Ok(result) => result,
            Err(error) if error.is_not_found() => {
                return error_response(http::StatusCode::NOT_FOUND, error)
            }
            Err(error) => {
                return error_response(http::StatusCode::INTERNAL_SERVER_ERROR, error)
            }
        };
        json_response(
            http::StatusCode::OK,
            &PolicyAdded {
                message: format!(
                    "Network policy {} applied to namespace {namespace}",
                    policy.name()
                ),
                result,
            },
        )
    }
}

fn default_dialect() -> Dialect {
    Dialect::Kubernetes
}

/// Parses `namespace` and `dialect` from a query string. Unknown parameters
/// are ignored.
fn parse_query(query: Option<&str>) -> Result<(Option<String>, Dialect), anyhow::Error> {
    let mut namespace = None;
    let mut dialect = default_dialect();
    for pair in query.unwrap_or_default().split('&').filter(|p| !p.is_empty()) {
        let (key, value) = pair.split_once('=').unwrap_or((pair, ""));
        match key {
            "namespace" if !value.is_empty() => namespace = Some(value.to_string()),
            "dialect" => dialect = value.parse()?,
            _ => {}
        }
    }
    Ok((namespace, dialect))
}

/// Maps a core result onto a response. Missing namespaces are reported as
/// not found.
fn respond<T: Serialize>(
    result: std::result::Result<T, CoreError>,
    failure: &'static str,
) -> Result<Response<Body>, Error> {
    match result {
        Ok(body) => json_response(http::StatusCode::OK, &body),
        Err(error) if error.is_not_found() => error_response(http::StatusCode::NOT_FOUND, error),
        Err(error) => {
            warn!(%error, "{failure}");
            error_response(http::StatusCode::INTERNAL_SERVER_ERROR, error)
        }
    }
}

fn not_found() -> Response<Body> {
    Response::builder()
        .status(http::StatusCode::NOT_FOUND)
        .body(Body::default())
        .expect("not found response must be valid")
}

fn json_response<T: Serialize>(
    status: http::StatusCode,
    body: &T,
) -> Result<Response<Body>, Error> {
    let bytes = serde_json::to_vec(body)?;
    Ok(Response::builder()
        .status(status)
        .header(http::header::CONTENT_TYPE, "application/json")
        .body(Body::new(Bytes::from(bytes)))
        .expect("json response must be valid"))
}

fn error_response(
    status: http::StatusCode,
    error: impl std::fmt::Display,
) -> Result<Response<Body>, Error> {
    json_response(
        status,
        &ErrorBody {
            error: error.to_string(),
        },
    )
}
