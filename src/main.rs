mod amazon;
mod config;
mod http;
mod jobs;
mod metrics;
mod models;
mod pipeline;
mod replies;
mod security;
mod shortener;
mod telegram;

use amazon::ProductScraper;
use axum::{
    Json, Router,
    body::Bytes,
    extract::{Path, State},
    http::StatusCode,
    middleware,
    response::{IntoResponse, Response},
    routing::{get, post},
};
use config::BotConfig;
use eyre::{WrapErr, eyre};
use jobs::{EnqueueError, UpdateQueue};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use models::{ApiError, InboundMessage, StatusBody, Update};
use once_cell::sync::OnceCell;
use pipeline::Responder;
use security::{WebhookGuard, require_webhook_secret};
use serde_json::json;
use shortener::UrlShortener;
use std::{net::SocketAddr, sync::Arc};
use telegram::{TelegramClient, TelegramError};
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};
use tracing::{debug, error, info, warn};
use tracing_subscriber::{EnvFilter, fmt};

static RESPONDER: OnceCell<Responder> = OnceCell::new();

#[tokio::main]
async fn main() {
    if let Err(err) = run().await {
        error!(target = "affilink.api", "server crashed: {err:?}");
        std::process::exit(1);
    }
}

async fn run() -> eyre::Result<()> {
    dotenvy::dotenv().ok();
    init_tracing();

    let config = Arc::new(BotConfig::from_env().wrap_err("loading configuration")?);
    let responder = bootstrap(&config);
    let (queue, _dispatcher) = UpdateQueue::spawn(responder.clone(), config.queue_capacity);
    let prometheus_handle = PrometheusBuilder::new()
        .install_recorder()
        .map_err(|err| eyre!("installing prometheus recorder: {err}"))?;

    register_webhook_at_startup(&config, responder.telegram()).await;

    let state = AppState {
        config: config.clone(),
        telegram: responder.telegram().clone(),
        queue,
        guard: WebhookGuard::new(config.webhook_secret.clone()),
        prometheus_handle,
    };

    let addr: SocketAddr = ([0, 0, 0, 0], config.port).into();
    info!(target = "affilink.api", "listening on {addr}");
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .wrap_err_with(|| format!("binding {addr}"))?;
    axum::serve(listener, app(state).into_make_service()).await?;
    Ok(())
}

/// Builds the shared network clients exactly once per process.
fn bootstrap(config: &BotConfig) -> Responder {
    RESPONDER
        .get_or_init(|| {
            info!(
                target = "affilink.api",
                affiliate_tag = %config.affiliate_tag,
                "bot clients initialised"
            );
            Responder::new(
                TelegramClient::new(
                    config.telegram_api_root.clone(),
                    config.bot_token.clone(),
                    config.request_timeout,
                ),
                ProductScraper::new(config.scrape_timeout),
                UrlShortener::new(config.tinyurl_endpoint.clone(), config.isgd_endpoint.clone()),
                config.affiliate_tag.clone(),
            )
        })
        .clone()
}

async fn register_webhook_at_startup(config: &BotConfig, telegram: &TelegramClient) {
    let Some(endpoint) = config.webhook_endpoint() else {
        warn!(
            target = "affilink.api",
            "WEBHOOK_URL not set; skipping webhook registration"
        );
        return;
    };
    match telegram
        .set_webhook(&endpoint, config.webhook_secret.as_deref())
        .await
    {
        Ok(()) => info!(target = "affilink.api", webhook = %endpoint, "webhook registered"),
        Err(err) => warn!(
            target = "affilink.api",
            webhook = %endpoint,
            error = %err,
            "webhook registration failed"
        ),
    }
}

#[derive(Clone)]
struct AppState {
    config: Arc<BotConfig>,
    telegram: TelegramClient,
    queue: UpdateQueue,
    guard: WebhookGuard,
    prometheus_handle: PrometheusHandle,
}

fn app(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_headers(Any)
        .allow_methods(Any)
        .allow_origin(Any);

    let inbound = Router::new()
        .route("/webhook", post(webhook))
        .route_layer(middleware::from_fn_with_state(
            state.guard.clone(),
            require_webhook_secret,
        ));

    Router::new()
        .route("/", get(index))
        .route("/health", get(health))
        .route("/set_webhook", get(set_webhook).post(set_webhook))
        .route("/metrics", get(metrics_endpoint))
        .route("/jobs/{update_id}", get(job_status))
        .merge(inbound)
        .with_state(state)
        .layer(cors)
        .layer(TraceLayer::new_for_http())
}

async fn index() -> Json<serde_json::Value> {
    Json(json!({
        "message": "Amazon Affiliate Telegram Bot is running! 🤖",
        "endpoints": {
            "webhook": "/webhook",
            "health": "/health",
            "set_webhook": "/set_webhook",
            "metrics": "/metrics",
        },
        "status": "active",
    }))
}

/// Liveness plus a view of the dispatch queue.
async fn health(State(state): State<AppState>) -> Json<serde_json::Value> {
    Json(json!({
        "status": "healthy",
        "bot_token_set": !state.config.bot_token.is_empty(),
        "webhook_url_set": state.config.webhook_url.is_some(),
        "worker_alive": state.queue.is_alive(),
        "queue_depth": state.queue.depth(),
    }))
}

/// Accepts one Telegram update and acknowledges it before any processing.
///
/// - Method: `POST`
/// - Path: `/webhook`
/// - Auth: `X-Telegram-Bot-Api-Secret-Token` when a secret is configured
async fn webhook(State(state): State<AppState>, body: Bytes) -> Result<Json<StatusBody>, AppError> {
    crate::metrics::inc_requests("/webhook");
    if body.is_empty() {
        return Err(AppError::BadRequest("No data received".into()));
    }
    let update: Update = serde_json::from_slice(&body)
        .map_err(|err| AppError::BadRequest(format!("invalid update: {err}")))?;

    let Some(message) = InboundMessage::from_update(&update) else {
        debug!(
            target = "affilink.api",
            update_id = update.update_id,
            "update without text ignored"
        );
        return Ok(Json(StatusBody::ok()));
    };

    match state.queue.enqueue(message).await {
        Ok(_) => Ok(Json(StatusBody::ok())),
        Err(EnqueueError::Duplicate(update_id)) => {
            info!(target = "affilink.api", update_id, "duplicate delivery acknowledged");
            Ok(Json(StatusBody::ok()))
        }
        Err(err) => Err(AppError::Enqueue(err)),
    }
}

async fn set_webhook(State(state): State<AppState>) -> Result<Json<serde_json::Value>, AppError> {
    crate::metrics::inc_requests("/set_webhook");
    let endpoint = state
        .config
        .webhook_endpoint()
        .ok_or(AppError::WebhookNotConfigured)?;
    state
        .telegram
        .set_webhook(&endpoint, state.config.webhook_secret.as_deref())
        .await?;
    info!(target = "affilink.api", webhook = %endpoint, "webhook registered on request");
    Ok(Json(json!({
        "status": "success",
        "webhook_url": endpoint,
    })))
}

async fn job_status(
    State(state): State<AppState>,
    Path(update_id): Path<i64>,
) -> Result<Json<jobs::JobInfo>, AppError> {
    state
        .queue
        .get(update_id)
        .await
        .map(Json)
        .ok_or(AppError::JobNotFound(update_id))
}

async fn metrics_endpoint(State(state): State<AppState>) -> Response {
    (
        [("Content-Type", "text/plain; version=0.0.4")],
        state.prometheus_handle.render(),
    )
        .into_response()
}

#[derive(Debug)]
enum AppError {
    BadRequest(String),
    Enqueue(EnqueueError),
    WebhookNotConfigured,
    Telegram(TelegramError),
    JobNotFound(i64),
}

impl From<TelegramError> for AppError {
    fn from(value: TelegramError) -> Self {
        Self::Telegram(value)
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        match self {
            AppError::BadRequest(message) => {
                warn!(target = "affilink.api", reason = %message, "rejected webhook body");
                (StatusCode::BAD_REQUEST, Json(StatusBody::error(message))).into_response()
            }
            AppError::Enqueue(err) => {
                error!(target = "affilink.api", error = %err, "update could not be queued");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    Json(StatusBody::error(err.to_string())),
                )
                    .into_response()
            }
            AppError::WebhookNotConfigured => (
                StatusCode::BAD_REQUEST,
                Json(ApiError {
                    error: "WEBHOOK_URL not configured".into(),
                    detail: None,
                }),
            )
                .into_response(),
            AppError::Telegram(err) => {
                error!(target = "affilink.api", error = %err, "webhook registration failed");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    Json(ApiError {
                        error: err.to_string(),
                        detail: None,
                    }),
                )
                    .into_response()
            }
            AppError::JobNotFound(update_id) => (
                StatusCode::NOT_FOUND,
                Json(ApiError {
                    error: "not_found".into(),
                    detail: Some(format!("no record for update {update_id}")),
                }),
            )
                .into_response(),
        }
    }
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,tower_http=debug"));
    let _ = fmt().with_env_filter(filter).try_init();
}
