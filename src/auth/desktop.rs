//! One-time desktop bootstrap of the OAuth credential
//!
//! Opens the consent page in the system browser and receives the
//! authorization code on a loopback listener.

use std::sync::{Arc, Mutex};

use axum::{extract::Query, response::Html, routing::get, Router};
use tokio::sync::oneshot;

use crate::auth::credential::Credential;
use crate::auth::oauth::{random_state, CallbackParams, TokenManager};
use crate::error::{AuthError, GmailBridgeError, Result};

const CALLBACK_PATH: &str = "/oauth2callback";

/// Run the interactive authorization flow and persist the resulting credential
pub async fn run(manager: &TokenManager, port: u16) -> Result<Credential> {
    let addr = std::net::SocketAddr::from(([127, 0, 0, 1], port));
    let listener = tokio::net::TcpListener::bind(addr).await?;
    let redirect_uri = format!("http://{}{}", listener.local_addr()?, CALLBACK_PATH);

    let state = random_state();
    let auth_url = manager.authorization_url(&redirect_uri, &state);
    eprintln!("\nPlease visit this URL to authenticate:");
    eprintln!("{}\n", auth_url);

    if let Err(e) = open::that(&auth_url) {
        eprintln!("Could not open browser automatically: {}", e);
        eprintln!("Please open the URL manually.");
    }

    let (tx, rx) = oneshot::channel::<Result<String>>();
    let tx = Arc::new(Mutex::new(Some(tx)));

    let callback_handler = move |Query(params): Query<CallbackParams>| {
        let tx = tx.clone();
        let state = state.clone();
        async move {
            let outcome = params.into_code(&state);
            let page = match &outcome {
                Ok(_) => "<html><body><h1>Authentication successful!</h1><p>You can close this window.</p></body></html>",
                Err(_) => "<html><body><h1>Authentication failed</h1><p>Return to the terminal for details.</p></body></html>",
            };
            if let Some(tx) = tx.lock().ok().and_then(|mut guard| guard.take()) {
                let _ = tx.send(outcome);
            }
            Html(page)
        }
    };

    let app = Router::new().route(CALLBACK_PATH, get(callback_handler));

    tracing::info!("Waiting for authentication callback on {}", redirect_uri);

    let server = axum::serve(listener, app);

    tokio::select! {
        result = server => {
            match result {
                Ok(()) => Err(AuthError::NoAuthCode.into()),
                Err(e) => Err(GmailBridgeError::Auth(AuthError::CallbackError {
                    message: e.to_string(),
                })),
            }
        }
        code = rx => {
            let code = code.map_err(|_| AuthError::NoAuthCode)??;
            eprintln!("Received authorization code, exchanging for tokens...");
            manager.exchange_code(&code, &redirect_uri).await
        }
    }
}
