//! HTTP API for config updates, reloads, status, and metrics.

use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::Arc;

use http_body_util::{BodyExt, Full, LengthLimitError, Limited};
use hyper::body::{Body, Bytes, Incoming};
use hyper::header::{HeaderValue, CONTENT_TYPE};
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper::{Method, Request, Response, StatusCode};
use hyper_util::rt::TokioIo;
use serde_json::json;
use tokio::net::TcpListener;
use tracing::{error, info, warn};

use crate::config::SharedConfig;
use crate::error::{ServerError, SidecarError};
use crate::metrics::Metrics;
use crate::sidecar::{request_reload, ReloadSender, SidecarService};
use crate::validation::UpdateConfigCmd;

/// Largest accepted update body.
pub const MAX_BODY_BYTES: usize = 1024 * 1024;

pub const SIDECAR_CONFIG_PATH: &str = "/-/sidecar/config";
pub const SIDECAR_LAST_UPDATE_PATH: &str = "/-/sidecar/last-update-ts";
pub const RELOAD_PATH: &str = "/-/reload";
pub const CONFIG_PATH: &str = "/config";
pub const METRICS_PATH: &str = "/metrics";

/// Everything the handlers need.
pub struct ServerState {
    pub sidecar: Arc<SidecarService>,
    pub reload_tx: ReloadSender,
    pub config: SharedConfig,
    pub metrics: Arc<Metrics>,
}

/// HTTP server for the sidecar API.
pub struct SidecarServer {
    state: Arc<ServerState>,
    addr: SocketAddr,
}

impl SidecarServer {
    /// Creates a new server.
    pub fn new(state: Arc<ServerState>, addr: SocketAddr) -> Self {
        Self { state, addr }
    }

    /// Binds the listen address and serves until an accept error.
    pub async fn start(self) -> Result<(), ServerError> {
        let listener = TcpListener::bind(self.addr)
            .await
            .map_err(|source| ServerError::BindFailed {
                addr: self.addr,
                source,
            })?;

        self.serve(listener).await
    }

    /// Serves connections from an already bound listener.
    pub async fn serve(self, listener: TcpListener) -> Result<(), ServerError> {
        let local_addr = listener.local_addr().unwrap_or(self.addr);
        info!(addr = %local_addr, "Starting sidecar HTTP server");

        loop {
            let (stream, _) = listener.accept().await.map_err(ServerError::AcceptFailed)?;

            let io = TokioIo::new(stream);
            let state = self.state.clone();

            tokio::spawn(async move {
                let service = service_fn(|req: Request<Incoming>| handle(state.clone(), req));

                if let Err(e) = http1::Builder::new().serve_connection(io, service).await {
                    error!(error = %e, "Error serving connection");
                }
            });
        }
    }
}

/// Routes one request.
pub async fn handle<B>(
    state: Arc<ServerState>,
    req: Request<B>,
) -> Result<Response<Full<Bytes>>, Infallible>
where
    B: Body<Data = Bytes> + Send + 'static,
    B::Error: std::error::Error + Send + Sync + 'static,
{
    let response = match (req.method(), req.uri().path()) {
        (&Method::PUT | &Method::POST, SIDECAR_CONFIG_PATH) => update_config(state, req).await,
        (&Method::GET, SIDECAR_LAST_UPDATE_PATH) => last_update_ts(&state).await,
        (&Method::POST, RELOAD_PATH) => reload(&state).await,
        (&Method::GET, CONFIG_PATH) => show_config(&state).await,
        (&Method::GET, METRICS_PATH) => metrics(&state),
        (
            _,
            SIDECAR_CONFIG_PATH | SIDECAR_LAST_UPDATE_PATH | RELOAD_PATH | CONFIG_PATH
            | METRICS_PATH,
        ) => text_response(StatusCode::METHOD_NOT_ALLOWED, "Method Not Allowed"),
        _ => text_response(StatusCode::NOT_FOUND, "Not Found"),
    };

    Ok(response)
}

async fn update_config<B>(state: Arc<ServerState>, req: Request<B>) -> Response<Full<Bytes>>
where
    B: Body<Data = Bytes> + Send + 'static,
    B::Error: std::error::Error + Send + Sync + 'static,
{
    let body = match Limited::new(req.into_body(), MAX_BODY_BYTES).collect().await {
        Ok(collected) => collected.to_bytes(),
        Err(e) if e.downcast_ref::<LengthLimitError>().is_some() => {
            return json_response(
                StatusCode::PAYLOAD_TOO_LARGE,
                json!({ "error": format!("body exceeds {} bytes", MAX_BODY_BYTES) }),
            );
        }
        Err(e) => {
            return json_response(StatusCode::BAD_REQUEST, json!({ "error": e.to_string() }));
        }
    };

    let cmd: UpdateConfigCmd = match serde_json::from_slice(&body) {
        Ok(cmd) => cmd,
        Err(e) => {
            return json_response(
                StatusCode::BAD_REQUEST,
                json!({ "errors": [format!("Invalid request body: {}", e)] }),
            );
        }
    };

    // A dropped connection must not cancel the update it submitted.
    let task = tokio::spawn(async move {
        state
            .sidecar
            .update_config_reload(&cmd, &state.reload_tx)
            .await
    });

    match task.await {
        Ok(Ok(())) => json_response(StatusCode::OK, json!({ "status": "ok" })),
        Ok(Err(SidecarError::Validation(errors))) => {
            json_response(StatusCode::BAD_REQUEST, json!({ "errors": errors }))
        }
        Ok(Err(e)) => json_response(
            StatusCode::INTERNAL_SERVER_ERROR,
            json!({ "error": e.to_string() }),
        ),
        Err(e) => {
            error!(error = %e, "Config update task panicked");
            json_response(
                StatusCode::INTERNAL_SERVER_ERROR,
                json!({ "error": "config update aborted" }),
            )
        }
    }
}

async fn last_update_ts(state: &ServerState) -> Response<Full<Bytes>> {
    let ts = state.sidecar.last_update_ts().await;
    json_response(
        StatusCode::OK,
        json!({ "last_update_ts": ts.map(|t| t.to_rfc3339()) }),
    )
}

async fn reload(state: &ServerState) -> Response<Full<Bytes>> {
    match request_reload(&state.reload_tx).await {
        Ok(()) => text_response(StatusCode::OK, "OK"),
        Err(e) => {
            warn!(error = %e, "Reload via HTTP failed");
            text_response(
                StatusCode::INTERNAL_SERVER_ERROR,
                &format!("failed to reload config: {}", e),
            )
        }
    }
}

async fn show_config(state: &ServerState) -> Response<Full<Bytes>> {
    let rendered = serde_yaml::to_string(&*state.config.read().await);
    match rendered {
        Ok(yaml) => {
            let mut response = text_response(StatusCode::OK, &yaml);
            response.headers_mut().insert(
                CONTENT_TYPE,
                HeaderValue::from_static("text/plain; charset=utf-8"),
            );
            response
        }
        Err(e) => text_response(StatusCode::INTERNAL_SERVER_ERROR, &e.to_string()),
    }
}

fn metrics(state: &ServerState) -> Response<Full<Bytes>> {
    match state.metrics.gather() {
        Ok(body) => {
            let mut response = text_response(StatusCode::OK, &body);
            response.headers_mut().insert(
                CONTENT_TYPE,
                HeaderValue::from_static("text/plain; version=0.0.4"),
            );
            response
        }
        Err(e) => text_response(StatusCode::INTERNAL_SERVER_ERROR, &e.to_string()),
    }
}

fn text_response(status: StatusCode, body: &str) -> Response<Full<Bytes>> {
    let mut response = Response::new(Full::new(Bytes::from(body.to_string())));
    *response.status_mut() = status;
    response
}

fn json_response(status: StatusCode, body: serde_json::Value) -> Response<Full<Bytes>> {
    let mut response = Response::new(Full::new(Bytes::from(body.to_string())));
    *response.status_mut() = status;
    response
        .headers_mut()
        .insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
    response
}
