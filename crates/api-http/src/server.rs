// REST server over the Controller and Key-Value Store ports. Binds to
// localhost by default; every route gets the same burst-plus-rate
// limiter and request tracing span.

use crate::handler;
use crate::rate_limiter::RateLimiter;
use crate::state::{ControllerState, KvState};
use axum::extract::State;
use axum::http::{Request, StatusCode};
use axum::middleware::{self, Next};
use axum::response::{IntoResponse, Response};
use axum::routing::{delete, get, post, put};
use axum::Router;
use foreman_core::port::{Controller, KvStore};
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::trace::TraceLayer;
use tracing::info;

const DEFAULT_HOST: &str = "127.0.0.1";
const DEFAULT_PORT: u16 = 9527;

pub struct HttpServerConfig {
    pub host: String,
    pub port: u16,
}

impl Default for HttpServerConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_HOST.to_string(),
            port: DEFAULT_PORT,
        }
    }
}

/// Router for the controller routes: queue, lock, registry, and messages.
pub fn controller_router(controller: Arc<dyn Controller>) -> Router {
    Router::new()
        .route("/queue/push", post(handler::queue_push))
        .route("/queue/pop", post(handler::queue_pop))
        .route(
            "/lock",
            delete(handler::release_lock).put(handler::refresh_lock),
        )
        .route("/registry/token", get(handler::get_token))
        .route("/registry/info", get(handler::get_info))
        .route("/registry/status", get(handler::get_status))
        .route("/registry", put(handler::registry_push))
        .route(
            "/messages",
            post(handler::message_push).get(handler::message_get),
        )
        .with_state(ControllerState { controller })
}

/// Router for the Key-Value Store routes.
pub fn kv_router(kv: Arc<dyn KvStore>) -> Router {
    Router::new()
        .route(
            "/db/:key",
            get(handler::kv_get)
                .post(handler::kv_write)
                .delete(handler::kv_delete),
        )
        .route(
            "/db",
            get(handler::kv_next)
                .post(handler::kv_push)
                .options(handler::kv_keys),
        )
        .with_state(KvState { kv })
}

/// Both surfaces merged into one router, with rate limiting and
/// request tracing layered on top of every route.
pub fn build_router(controller: Arc<dyn Controller>, kv: Arc<dyn KvStore>) -> Router {
    let max_burst: u32 = std::env::var("FOREMAN_RATE_LIMIT_BURST")
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or(200);
    let rate_per_sec: u32 = std::env::var("FOREMAN_RATE_LIMIT_RATE")
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or(100);
    let limiter = Arc::new(RateLimiter::new(max_burst, rate_per_sec));

    controller_router(controller)
        .merge(kv_router(kv))
        .layer(middleware::from_fn_with_state(limiter, rate_limit_layer))
        .layer(TraceLayer::new_for_http())
}

async fn rate_limit_layer(
    State(limiter): State<Arc<RateLimiter>>,
    request: Request<axum::body::Body>,
    next: Next,
) -> Response {
    if limiter.check().await {
        next.run(request).await
    } else {
        (StatusCode::TOO_MANY_REQUESTS, "rate limit exceeded").into_response()
    }
}

pub struct HttpServer {
    config: HttpServerConfig,
    router: Router,
}

impl HttpServer {
    pub fn new(
        config: HttpServerConfig,
        controller: Arc<dyn Controller>,
        kv: Arc<dyn KvStore>,
    ) -> Self {
        Self {
            config,
            router: build_router(controller, kv),
        }
    }

    pub async fn serve(self) -> std::io::Result<()> {
        let addr: SocketAddr = format!("{}:{}", self.config.host, self.config.port)
            .parse()
            .expect("valid host:port");

        info!(%addr, "starting HTTP controller/key-value server");

        let listener = tokio::net::TcpListener::bind(addr).await?;
        axum::serve(listener, self.router).await
    }
}
