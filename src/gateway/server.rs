//! # HTTP Server Module
//!
//! Builds the axum application and runs it. Routes fall into two groups:
//!
//! - public: service banner and liveness, never behind the access guard
//! - gated: everything else, wrapped by [`access_guard_middleware`] as a route
//!   layer so the guard runs before any handler (and before the catch-all
//!   forwarder can touch the network)
//!
//! The IP discovery route sits in the gated group but is the guard's public
//! exemption path, so it is always served.

use axum::{
    body::Bytes,
    extract::{ConnectInfo, Query, Request, State},
    http::{HeaderMap, Method},
    middleware::from_fn_with_state,
    response::{IntoResponse, Response},
    routing::{any, get},
    Json, Router,
};
use serde::Deserialize;
use serde_json::json;
use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;
use tracing::{info, instrument, warn};

use crate::auth::{access_guard_middleware, AccessGuard};
use crate::core::config::GatewayConfig;
use crate::core::error::{GatewayError, GatewayResult};
use crate::core::types::ProxyRequest;
use crate::gateway::diagnostics::Diagnostics;
use crate::gateway::forwarder::ForwardingEngine;
use crate::reference::{LeagueCatalog, LeagueRecord};

const BANNER_MESSAGE: &str = "Football Proxy ativo 🚀";

/// Shared, immutable state handed to every handler
pub struct AppState {
    pub config: Arc<GatewayConfig>,
    pub engine: Arc<ForwardingEngine>,
    pub catalog: LeagueCatalog,
    pub diagnostics: Diagnostics,
    pub guard: Arc<AccessGuard>,
}

impl AppState {
    /// Wire every component from the configuration
    pub fn from_config(config: GatewayConfig) -> GatewayResult<Self> {
        let engine = Arc::new(ForwardingEngine::new(&config.upstream)?);
        Self::with_engine(config, engine)
    }

    /// Wire components around an existing forwarding engine
    pub fn with_engine(config: GatewayConfig, engine: Arc<ForwardingEngine>) -> GatewayResult<Self> {
        let guard = Arc::new(AccessGuard::new(&config.access)?);
        let catalog = LeagueCatalog::new(&config.reference);
        let diagnostics = Diagnostics::new(engine.clone(), &config.diagnostics);

        if !guard.has_token() {
            warn!(
                header = %config.access.header_name,
                "No access token configured (PROXY_TOKEN); every gated request will be rejected"
            );
        }
        if !engine.is_configured() {
            warn!("No upstream credential configured (APISPORTS_KEY); forwards will fail as misconfigured");
        }

        Ok(Self {
            config: Arc::new(config),
            engine,
            catalog,
            diagnostics,
            guard,
        })
    }
}

/// Main gateway server
pub struct GatewayServer {
    state: Arc<AppState>,
    bind_addr: SocketAddr,
}

impl GatewayServer {
    /// Create a server from a validated configuration
    pub fn new(config: GatewayConfig) -> GatewayResult<Self> {
        let bind_addr = config.socket_addr()?;
        let state = AppState::from_config(config)?;

        Ok(Self {
            state: Arc::new(state),
            bind_addr,
        })
    }

    /// Build the router for this server
    pub fn app(&self) -> Router {
        build_app(self.state.clone())
    }

    pub fn bind_addr(&self) -> SocketAddr {
        self.bind_addr
    }

    /// Serve until `shutdown` resolves, then drain in-flight requests
    #[instrument(skip_all, fields(bind_addr = %self.bind_addr))]
    pub async fn start<F>(self, shutdown: F) -> GatewayResult<()>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let listener = TcpListener::bind(self.bind_addr).await.map_err(|e| {
            GatewayError::internal(format!("Failed to bind gateway server to {}: {}", self.bind_addr, e))
        })?;

        info!("Gateway HTTP server listening on {}", self.bind_addr);

        axum::serve(
            listener,
            self.app().into_make_service_with_connect_info::<SocketAddr>(),
        )
        .with_graceful_shutdown(shutdown)
        .await
        .map_err(|e| GatewayError::internal(format!("Gateway server error: {}", e)))
    }
}

/// Assemble public and gated routes around the shared state
pub fn build_app(state: Arc<AppState>) -> Router {
    let config = state.config.clone();

    let mut public = Router::new()
        .route("/", get(banner))
        .route("/healthz", get(health_check));

    let mut gated = Router::new()
        .route(&config.access.public_path, get(discover_ip))
        .route("/myip", get(caller_ip))
        .route("/auth-check", get(auth_check));

    let leagues = Router::new()
        .route("/leagues", get(list_leagues))
        .route("/meta/leagues", get(list_leagues));

    if config.reference.require_auth {
        gated = gated.merge(leagues);
    } else {
        public = public.merge(leagues);
    }

    let gated = gated
        .route("/*path", any(forward_request))
        .route_layer(from_fn_with_state(state.guard.clone(), access_guard_middleware));

    public
        .merge(gated)
        .with_state(state)
        .layer(TraceLayer::new_for_http())
}

/// Service banner
async fn banner() -> impl IntoResponse {
    Json(json!({
        "status": "ok",
        "message": BANNER_MESSAGE,
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

/// Liveness check
async fn health_check() -> impl IntoResponse {
    Json(json!({
        "status": "healthy",
        "timestamp": chrono::Utc::now().to_rfc3339(),
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

async fn discover_ip(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    Json(state.diagnostics.discover_ip().await)
}

async fn auth_check(State(state): State<Arc<AppState>>) -> GatewayResult<impl IntoResponse> {
    Ok(Json(state.diagnostics.check_authorization().await?))
}

/// Echo the caller's address, preferring the first `x-forwarded-for` hop
async fn caller_ip(
    connect_info: Option<ConnectInfo<SocketAddr>>,
    headers: HeaderMap,
) -> impl IntoResponse {
    let forwarded = headers
        .get("x-forwarded-for")
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.split(',').next())
        .map(str::trim)
        .filter(|hop| !hop.is_empty())
        .map(str::to_string);

    let ip = forwarded.or_else(|| connect_info.map(|ConnectInfo(addr)| addr.ip().to_string()));

    Json(json!({ "ip": ip }))
}

#[derive(Debug, Deserialize)]
struct SeasonQuery {
    season: Option<String>,
}

async fn list_leagues(
    State(state): State<Arc<AppState>>,
    Query(query): Query<SeasonQuery>,
) -> GatewayResult<Json<Vec<LeagueRecord>>> {
    let season = query.season.unwrap_or_default();
    Ok(Json(state.catalog.list_leagues(&season).await?))
}

/// Catch-all: relay the request upstream
async fn forward_request(
    State(state): State<Arc<AppState>>,
    request: Request,
) -> GatewayResult<Response> {
    let (parts, body) = request.into_parts();

    if !ForwardingEngine::accepts(&parts.method) {
        return Err(GatewayError::MethodNotAllowed {
            method: parts.method.to_string(),
        });
    }

    let body = if parts.method == Method::POST {
        axum::body::to_bytes(body, state.config.server.max_body_size)
            .await
            .map_err(|e| {
                warn!(error = %e, "Failed to read request body");
                GatewayError::InvalidRequestBody {
                    message: e.to_string(),
                }
            })?
    } else {
        Bytes::new()
    };

    let request = ProxyRequest::new(
        parts.method,
        parts.uri.path(),
        parts.uri.query().map(str::to_string),
        parts.headers,
        body,
    );

    Ok(state.engine.forward(request).await?.into_axum())
}
