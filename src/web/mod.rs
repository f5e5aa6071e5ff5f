//! Browser front end
//!
//! A thin axum adapter over [`GmailClient`]: status, message list and detail,
//! a compose form, logout, and the web variant of the OAuth consent flow.

pub mod pages;
pub mod routes;

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use axum::http::StatusCode;
use axum::response::{Html, IntoResponse, Response};
use axum::Router;

use crate::auth::oauth::random_state;
use crate::error::{ErrorKind, GmailBridgeError, Result};
use crate::gmail::client::GmailClient;

/// How long an issued OAuth `state` stays redeemable
const STATE_TTL: Duration = Duration::from_secs(10 * 60);

/// Most outstanding OAuth `state` values kept at once
const MAX_PENDING_STATES: usize = 256;

/// Shared state of the web UI
#[derive(Clone)]
pub struct AppState {
    pub gmail: Arc<GmailClient>,

    /// Where Google sends the browser back after consent
    pub redirect_uri: String,

    /// OAuth `state` values issued and not yet redeemed, with their issue time
    pending_states: Arc<Mutex<HashMap<String, Instant>>>,
}

impl AppState {
    pub fn new(gmail: Arc<GmailClient>, redirect_uri: impl Into<String>) -> Self {
        Self {
            gmail,
            redirect_uri: redirect_uri.into(),
            pending_states: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    fn issue_state(&self) -> String {
        let state = random_state();
        self.remember_state(state.clone(), Instant::now());
        state
    }

    /// Record an issued state, dropping expired entries and the oldest beyond capacity
    fn remember_state(&self, state: String, now: Instant) {
        let mut pending = self.pending_states.lock().unwrap_or_else(|e| e.into_inner());
        pending.retain(|_, issued| now.saturating_duration_since(*issued) < STATE_TTL);

        while pending.len() >= MAX_PENDING_STATES {
            let Some(oldest) = pending
                .iter()
                .min_by_key(|(_, issued)| **issued)
                .map(|(state, _)| state.clone())
            else {
                break;
            };
            pending.remove(&oldest);
        }

        pending.insert(state, now);
    }

    /// Redeem a `state` value; each one is accepted once, within its lifetime
    fn redeem_state(&self, state: &str) -> bool {
        self.pending_states
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .remove(state)
            .map_or(false, |issued| issued.elapsed() < STATE_TTL)
    }

    #[cfg(test)]
    fn pending_state_count(&self) -> usize {
        self.pending_states.lock().unwrap_or_else(|e| e.into_inner()).len()
    }
}

/// Build the web router
pub fn router(state: AppState) -> Router {
    routes::routes().with_state(state)
}

/// Serve the web UI until the process is stopped
pub async fn serve(state: AppState, port: u16) -> Result<()> {
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!("Web UI listening on http://{}", listener.local_addr()?);

    axum::serve(listener, router(state)).await?;
    Ok(())
}

/// Error rendered as an HTML page with a status derived from its kind
#[derive(Debug)]
pub struct WebError(GmailBridgeError);

impl WebError {
    pub fn status(&self) -> StatusCode {
        status_for(&self.0)
    }
}

pub fn status_for(err: &GmailBridgeError) -> StatusCode {
    match err.kind() {
        ErrorKind::Auth => StatusCode::UNAUTHORIZED,
        ErrorKind::Validation => StatusCode::BAD_REQUEST,
        ErrorKind::Upstream => StatusCode::BAD_GATEWAY,
        ErrorKind::Internal => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

impl<E> From<E> for WebError
where
    E: Into<GmailBridgeError>,
{
    fn from(err: E) -> Self {
        WebError(err.into())
    }
}

impl IntoResponse for WebError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!("Request failed: {}", self.0);
        } else {
            tracing::warn!("Request rejected: {}", self.0);
        }

        let title = status.canonical_reason().unwrap_or("Error");
        let page = pages::error_page(title, &self.0.to_string(), self.0.kind() == ErrorKind::Auth);
        (status, Html(page)).into_response()
    }
}
