use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Result, anyhow};
use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::http::{HeaderName, HeaderValue, Method, header};
use axum::routing::{get, post};
use axum::{Json, Router, middleware};
use serde::Serialize;
use tokio::net::TcpListener;
use tower_http::cors::{AllowOrigin, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

use crate::brain::{Brain, ThreadDice};
use crate::config::Config;
use crate::error::AppError;
use crate::gate::{self, API_KEY_HEADER, Envelope, Gate, TokenData};
use crate::types::{ChatReply, ChatRequest};

pub struct AppState {
    pub brain: Brain,
    pub gate: Arc<Gate>,
    /// Inclusive bounds of the simulated processing delay.
    pub delay_ms: (u64, u64),
}

impl AppState {
    pub fn from_config(config: &Config) -> Result<Self> {
        let catalog = config.load_catalog()?;
        info!(products = catalog.len(), "Catalog ready");
        Ok(Self {
            brain: Brain::new(catalog, config.id_parsing),
            gate: Arc::new(Gate::from_config(config)?),
            delay_ms: (config.delay_min_ms, config.delay_max_ms),
        })
    }
}

#[derive(Serialize)]
struct Greeting {
    #[serde(rename = "initialContent")]
    initial_content: &'static str,
}

/// Build the full router. Chat routes sit behind the token middleware when
/// `require_token` is set; `/api/token` is always open.
pub fn router(state: Arc<AppState>, require_token: bool, allowed_origins: &[String]) -> Router {
    let mut chat = Router::new()
        .route("/api/chat/init", get(init_handler))
        .route("/api/chat/message", post(message_handler))
        .route("/api/chat/greeting", get(greeting_handler));
    if require_token {
        chat = chat.route_layer(middleware::from_fn_with_state(
            state.gate.clone(),
            gate::require_token,
        ));
    }

    Router::new()
        .route("/api/token", post(token_handler))
        .merge(chat)
        .fallback(|| async { AppError::NotFound })
        .with_state(state)
        .layer(cors(allowed_origins))
        .layer(TraceLayer::new_for_http())
}

fn cors(allowed_origins: &[String]) -> CorsLayer {
    let origins: Vec<HeaderValue> = allowed_origins
        .iter()
        .map(|origin| origin.trim())
        .filter_map(|origin| {
            // A wildcard is not allowed alongside credentials.
            if origin == "*" {
                warn!("Treating CORS origin `*` as mirror-request");
                return None;
            }
            match origin.parse() {
                Ok(value) => Some(value),
                Err(_) => {
                    warn!(%origin, "Ignoring unparseable CORS origin");
                    None
                }
            }
        })
        .collect();
    let allow_origin = if origins.is_empty() {
        AllowOrigin::mirror_request()
    } else {
        AllowOrigin::list(origins)
    };

    CorsLayer::new()
        .allow_origin(allow_origin)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([
            header::CONTENT_TYPE,
            header::AUTHORIZATION,
            HeaderName::from_static("x-api-key"),
        ])
        .allow_credentials(true)
}

/// Bind the configured port, moving up one port at a time while the
/// current one is taken.
pub async fn bind(config: &Config) -> Result<(TcpListener, SocketAddr)> {
    let first = config.port;
    let last = first.saturating_add(config.port_attempts.saturating_sub(1));
    for port in first..=last {
        match TcpListener::bind((config.host.as_str(), port)).await {
            Ok(listener) => {
                let addr = listener.local_addr()?;
                return Ok((listener, addr));
            }
            Err(e) => warn!(port, error = %e, "Port unavailable, trying next"),
        }
    }
    Err(anyhow!(
        "could not bind {} on any port {}-{}",
        config.host,
        first,
        last
    ))
}

pub async fn serve(config: Config) -> Result<()> {
    let state = Arc::new(AppState::from_config(&config)?);
    let app = router(state, config.require_token, &config.allowed_origins);
    let (listener, addr) = bind(&config).await?;

    info!(
        %addr,
        require_token = config.require_token,
        "Chat server running at http://{}",
        addr
    );
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    info!("Chat server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!(error = %e, "Could not listen for ctrl-c");
        std::future::pending::<()>().await;
    }
}

async fn init_handler(State(state): State<Arc<AppState>>) -> Json<ChatReply> {
    Json(ChatReply {
        messages: state.brain.welcome(),
    })
}

async fn greeting_handler(State(state): State<Arc<AppState>>) -> Json<Greeting> {
    Json(Greeting {
        initial_content: state.brain.greeting(&mut ThreadDice),
    })
}

async fn message_handler(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<ChatRequest>, JsonRejection>,
) -> Result<Json<ChatReply>, AppError> {
    let Json(request) = payload.map_err(|rejection| AppError::BadRequest {
        details: rejection.body_text(),
    })?;
    info!(action = ?request.action, message = ?request.message, "Received chat turn");

    simulate_latency(state.delay_ms).await;

    let messages = state.brain.respond(&request, &mut ThreadDice);
    Ok(Json(ChatReply { messages }))
}

async fn token_handler(
    State(state): State<Arc<AppState>>,
    headers: axum::http::HeaderMap,
) -> Result<Json<Envelope<TokenData>>, AppError> {
    let presented = headers
        .get(API_KEY_HEADER)
        .and_then(|value| value.to_str().ok());
    let api_key = state.gate.check_api_key(presented)?;
    let token = state.gate.issue(&api_key, chrono::Utc::now().timestamp());
    info!("Issued chat token");
    Ok(Json(Envelope::ok(TokenData { token })))
}

async fn simulate_latency((min, max): (u64, u64)) {
    if max == 0 {
        return;
    }
    let delay = rand::random_range(min..=max);
    tokio::time::sleep(Duration::from_millis(delay)).await;
}
