//! HTTP surface of the relay: one route answering the subscription handshake
//! (GET) and webhook deliveries (POST). Every other method, HEAD included,
//! gets 405.

use std::sync::Arc;

use axum::{
    Router,
    body::Bytes,
    extract::{Query, State},
    response::{IntoResponse, Response},
    routing::get,
};
use http::{HeaderMap, StatusCode};
use messenger_relay_core::{SIGNATURE_HEADER, WebhookRelay};
use serde::Deserialize;
use tokio::net::TcpListener;
use tokio::signal;
use tower_http::trace::TraceLayer;
use tracing::{debug, error, info, warn};

#[derive(Debug, Deserialize)]
pub struct VerifyQuery {
    #[serde(rename = "hub.mode")]
    pub hub_mode: Option<String>,
    #[serde(rename = "hub.verify_token")]
    pub hub_verify_token: Option<String>,
    #[serde(rename = "hub.challenge")]
    pub hub_challenge: Option<String>,
}

#[derive(Clone)]
struct ListenerState {
    relay: Arc<WebhookRelay>,
}

pub fn router(relay: WebhookRelay, path: &str) -> Router {
    let state = ListenerState {
        relay: Arc::new(relay),
    };
    Router::new()
        .route(
            path,
            get(verify_subscription)
                .head(method_not_allowed)
                .post(receive_delivery),
        )
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

pub async fn serve(listener: TcpListener, app: Router) -> std::io::Result<()> {
    if let Ok(addr) = listener.local_addr() {
        info!(%addr, "webhook relay listening");
    }
    axum::serve(listener, app)
        .with_graceful_shutdown(wait_for_shutdown())
        .await
}

async fn wait_for_shutdown() {
    signal::ctrl_c().await.ok();
    info!("shutting down");
}

// axum answers HEAD with the GET handler unless HEAD is routed explicitly.
async fn method_not_allowed() -> StatusCode {
    StatusCode::METHOD_NOT_ALLOWED
}

async fn verify_subscription(
    State(state): State<ListenerState>,
    Query(params): Query<VerifyQuery>,
) -> Response {
    debug!(mode = ?params.hub_mode, "subscription verification request");
    match state.relay.verify_subscription(
        params.hub_verify_token.as_deref(),
        params.hub_challenge.as_deref(),
    ) {
        Ok(challenge) => (StatusCode::OK, challenge).into_response(),
        Err(err) => {
            warn!(%err, "invalid verification token");
            StatusCode::FORBIDDEN.into_response()
        }
    }
}

async fn receive_delivery(
    State(state): State<ListenerState>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let signature = match headers.get(SIGNATURE_HEADER).map(|value| value.to_str()) {
        Some(Ok(value)) => Some(value.to_string()),
        Some(Err(_)) => {
            warn!("signature header is not valid ascii");
            return StatusCode::FORBIDDEN.into_response();
        }
        None => None,
    };

    let relay = state.relay.clone();
    let outcome =
        tokio::task::spawn_blocking(move || relay.handle_delivery(&body, signature.as_deref()))
            .await;
    match outcome {
        Ok(Ok(_report)) => StatusCode::OK.into_response(),
        Ok(Err(err)) => {
            warn!(%err, "rejected webhook delivery");
            let status =
                StatusCode::from_u16(err.status_code()).unwrap_or(StatusCode::BAD_REQUEST);
            if status == StatusCode::BAD_REQUEST {
                (status, "Bad Request").into_response()
            } else {
                status.into_response()
            }
        }
        Err(join_err) => {
            error!(%join_err, "webhook processing panicked");
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}
