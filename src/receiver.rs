//! Local webhook endpoint to post test notifications against
//!
//! `POST /webhook` decodes and checks alertmanager notifications and logs them,
//! `GET /metrics` exposes the prometheus meters of the process.
use std::{
    net::{IpAddr, SocketAddr},
    sync::Arc,
};

use anyhow::{Context, Result};
use axum::{
    extract::{rejection::JsonRejection, Extension, Json},
    http::{header::CONTENT_TYPE, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Router,
};
use once_cell::sync::Lazy;
use prometheus::{Encoder, TextEncoder};
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

use crate::{alert::Notification, metrics::RECEIVED_NOTIFICATIONS, settings::Settings};

#[derive(Debug, Deserialize, Clone)]
pub struct ReceiverSettings {
    pub bind_address: IpAddr,
    pub port: u16,
}

impl ReceiverSettings {
    pub fn global() -> &'static Self {
        &Settings::global().receiver
    }

    pub fn to_socket_addr(&self) -> SocketAddr {
        SocketAddr::new(self.bind_address, self.port)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
/// json body of every webhook answer
pub struct Reply {
    pub error: bool,
    pub message: String,
}

impl Reply {
    fn respond(status: StatusCode, message: String) -> (StatusCode, Json<Reply>) {
        (status, Json(Reply { error: !status.is_success(), message }))
    }
}

struct State {
    /// decoded notifications are handed on to this channel if present
    tx: Option<mpsc::Sender<Notification>>,
}

async fn webhook(
    Extension(state): Extension<Arc<State>>,
    notification: Result<Json<Notification>, JsonRejection>,
) -> (StatusCode, Json<Reply>) {
    let notification = match notification {
        Ok(Json(notification)) => notification,
        Err(err) => {
            RECEIVED_NOTIFICATIONS.with_label_values(&["invalid"]).inc();
            tracing::warn!("failed to deserialize notification: {}", err);
            return Reply::respond(
                StatusCode::BAD_REQUEST,
                format!("could not parse the request body: {}", err),
            );
        }
    };

    if let Err(err) = notification.validate() {
        RECEIVED_NOTIFICATIONS.with_label_values(&["invalid"]).inc();
        tracing::warn!(group_key = %notification.group_key, "rejected notification: {}", err);
        return Reply::respond(StatusCode::BAD_REQUEST, err.to_string());
    }

    RECEIVED_NOTIFICATIONS
        .with_label_values(&[notification.status.as_str()])
        .inc();

    tracing::info!(
        receiver = %notification.receiver,
        status = %notification.status,
        group_key = %notification.group_key,
        "received {} alerts",
        notification.alerts.len()
    );
    for alert in notification.alerts.iter() {
        tracing::debug!(
            fingerprint = %alert.fingerprint,
            open_ended = alert.is_open_ended(),
            labels = ?alert.labels,
            annotations = ?alert.annotations,
            "{} alert starting at {}",
            alert.status,
            alert.starts_at
        );
    }

    let message = format!("received {} alerts", notification.alerts.len());

    if let Some(tx) = &state.tx {
        if tx.send(notification).await.is_err() {
            tracing::debug!("nobody listens for received notifications anymore");
        }
    }

    Reply::respond(StatusCode::OK, message)
}

async fn metrics_handler() -> Response {
    let mut buffer = vec![];
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();

    match encoder.encode(&metric_families, &mut buffer) {
        Ok(()) => ([(CONTENT_TYPE, encoder.format_type().to_string())], buffer).into_response(),
        Err(err) => (StatusCode::INTERNAL_SERVER_ERROR, err.to_string()).into_response(),
    }
}

/// routes of the receiver, every accepted notification is forwarded to `tx`
pub fn router(tx: Option<mpsc::Sender<Notification>>) -> Router {
    Lazy::force(&RECEIVED_NOTIFICATIONS);

    Router::new()
        .route("/webhook", post(webhook))
        .route("/metrics", get(metrics_handler))
        .layer(Extension(Arc::new(State { tx })))
}

pub async fn run(settings: &ReceiverSettings) -> Result<()> {
    let addr = settings.to_socket_addr();
    tracing::info!("listening for notifications on http://{}/webhook", addr);

    axum::Server::try_bind(&addr)
        .with_context(|| format!("could not bind to {}", addr))?
        .serve(router(None).into_make_service())
        .await
        .context("webhook receiver crashed")?;

    Ok(())
}
