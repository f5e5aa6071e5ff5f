//! Route handlers for the web UI

use axum::extract::{Path, Query, State};
use axum::response::{Html, IntoResponse, Redirect, Response};
use axum::routing::get;
use axum::{Form, Router};
use serde::Deserialize;

use crate::auth::oauth::CallbackParams;
use crate::auth::TokenManager;
use crate::error::{AuthError, ErrorKind, Result};
use crate::gmail::mime::SendRequest;
use crate::web::{pages, status_for, AppState, WebError};

/// Messages shown by the list view when no count is given
pub const DEFAULT_PAGE_SIZE: u32 = 5;

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/", get(index))
        .route("/messages", get(list_messages))
        .route("/messages/:id", get(show_message))
        .route("/send", get(send_form).post(send_message))
        .route("/logout", get(logout))
        .route("/auth/gmail", get(start_auth))
        .route("/auth/gmail/callback", get(finish_auth))
}

#[derive(Debug, Deserialize)]
struct ListParams {
    #[serde(default)]
    q: Option<String>,
    #[serde(default)]
    max_results: Option<u32>,
}

/// Compose form fields; missing fields arrive as empty strings
#[derive(Debug, Default, Deserialize)]
struct SendForm {
    #[serde(default)]
    to: String,
    #[serde(default)]
    subject: String,
    #[serde(default)]
    body: String,
}

async fn index(State(state): State<AppState>) -> Html<String> {
    Html(pages::status_page(&state.gmail.auth_status().await))
}

async fn list_messages(
    State(state): State<AppState>,
    Query(params): Query<ListParams>,
) -> std::result::Result<Html<String>, WebError> {
    let query = params.q.unwrap_or_default();
    let messages = state
        .gmail
        .list_messages(&query, Some(params.max_results.unwrap_or(DEFAULT_PAGE_SIZE)))
        .await?;
    Ok(Html(pages::message_list(&messages, &query)))
}

async fn show_message(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> std::result::Result<Html<String>, WebError> {
    let detail = state.gmail.get_message(&id).await?;
    Ok(Html(pages::message_detail(&detail)))
}

async fn send_form() -> Html<String> {
    Html(pages::send_form(None, "", "", ""))
}

async fn send_message(
    State(state): State<AppState>,
    Form(form): Form<SendForm>,
) -> std::result::Result<Response, WebError> {
    let request = SendRequest::new(form.to.clone(), form.subject.clone(), form.body.clone());

    match state.gmail.send_message(&request).await {
        Ok(receipt) => Ok(Html(pages::sent_page(&receipt)).into_response()),
        Err(e) if e.kind() == ErrorKind::Validation => {
            let page = pages::send_form(Some(&e.to_string()), &form.to, &form.subject, &form.body);
            Ok((status_for(&e), Html(page)).into_response())
        }
        Err(e) => Err(e.into()),
    }
}

async fn logout(State(state): State<AppState>) -> std::result::Result<Redirect, WebError> {
    state.gmail.logout()?;
    Ok(Redirect::to("/"))
}

fn token_manager(state: &AppState) -> Result<&TokenManager> {
    let authenticator = state.gmail.authenticator();
    authenticator.token_manager().ok_or_else(|| {
        AuthError::UnsupportedMode {
            mode: authenticator.mode().as_str().to_string(),
        }
        .into()
    })
}

async fn start_auth(State(state): State<AppState>) -> std::result::Result<Redirect, WebError> {
    let manager = token_manager(&state)?;
    let oauth_state = state.issue_state();
    Ok(Redirect::to(&manager.authorization_url(&state.redirect_uri, &oauth_state)))
}

async fn finish_auth(
    State(state): State<AppState>,
    Query(params): Query<CallbackParams>,
) -> std::result::Result<Redirect, WebError> {
    let manager = token_manager(&state)?;

    let expected = params
        .state
        .clone()
        .filter(|s| state.redeem_state(s))
        .ok_or(AuthError::StateMismatch)?;
    let code = params.into_code(&expected)?;

    manager.exchange_code(&code, &state.redirect_uri).await?;
    tracing::info!("Gmail connected through the web flow");

    Ok(Redirect::to("/"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::{Authenticator, Credential, CredentialStore, FileCredentialStore};
    use crate::config::OAuthClient;
    use crate::gmail::client::GmailClient;
    use crate::web::router;
    use axum::body::Body;
    use axum::http::{header, Request, StatusCode};
    use chrono::{Duration, Utc};
    use std::sync::Arc;
    use tower::ServiceExt;

    struct Fixture {
        _dir: tempfile::TempDir,
        store: Arc<FileCredentialStore>,
        state: AppState,
    }

    fn fixture(api_base: &str, token_uri: &str) -> Fixture {
        let dir = tempfile::tempdir().unwrap();
        let store = Arc::new(FileCredentialStore::new(dir.path().join("token.json")));
        let oauth = OAuthClient {
            client_id: "client-id".to_string(),
            client_secret: "client-secret".to_string(),
            auth_uri: "https://accounts.google.com/o/oauth2/auth".to_string(),
            token_uri: token_uri.to_string(),
        };
        let manager = TokenManager::new(oauth, vec!["scope-a".to_string()], store.clone());
        let gmail = GmailClient::new(Arc::new(Authenticator::OAuth(manager)), api_base);
        Fixture {
            _dir: dir,
            store,
            state: AppState::new(Arc::new(gmail), "http://localhost:5000/auth/gmail/callback"),
        }
    }

    fn offline() -> Fixture {
        fixture("http://127.0.0.1:9", "http://127.0.0.1:9/token")
    }

    fn connect(store: &FileCredentialStore) {
        store
            .save(&Credential {
                access_token: "ok".to_string(),
                refresh_token: Some("1//refresh".to_string()),
                token_type: "Bearer".to_string(),
                expires_at: Some(Utc::now() + Duration::hours(1)),
                scopes: vec![],
            })
            .unwrap();
    }

    async fn get(state: &AppState, uri: &str) -> (StatusCode, String, Option<String>) {
        let response = router(state.clone())
            .oneshot(Request::get(uri).body(Body::empty()).unwrap())
            .await
            .unwrap();
        read(response).await
    }

    async fn read(response: Response) -> (StatusCode, String, Option<String>) {
        let status = response.status();
        let location = response
            .headers()
            .get(header::LOCATION)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, String::from_utf8_lossy(&bytes).into_owned(), location)
    }

    #[tokio::test]
    async fn test_index_reports_status() {
        let fx = offline();
        let (status, body, _) = get(&fx.state, "/").await;
        assert_eq!(status, StatusCode::OK);
        assert!(body.contains("Not connected"));

        connect(&fx.store);
        let (_, body, _) = get(&fx.state, "/").await;
        assert!(body.contains("Connected to Gmail"));
    }

    #[tokio::test]
    async fn test_messages_require_auth() {
        let fx = offline();
        let (status, body, _) = get(&fx.state, "/messages").await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert!(body.contains("/auth/gmail"));
    }

    #[tokio::test]
    async fn test_messages_list_defaults_and_escaping() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/users/me/messages")
            .match_query(mockito::Matcher::UrlEncoded("maxResults".into(), "5".into()))
            .with_status(200)
            .with_body(r#"{"messages":[{"id":"m1","threadId":"t1"}]}"#)
            .create_async()
            .await;
        server
            .mock("GET", "/users/me/messages/m1")
            .match_query(mockito::Matcher::Any)
            .with_status(200)
            .with_body(
                r#"{"id":"m1","threadId":"t1","snippet":"hi","payload":{"headers":[{"name":"Subject","value":"<img src=x onerror=alert(1)>"}]}}"#,
            )
            .create_async()
            .await;

        let fx = fixture(&server.url(), "http://127.0.0.1:9/token");
        connect(&fx.store);

        let (status, body, _) = get(&fx.state, "/messages").await;
        assert_eq!(status, StatusCode::OK);
        assert!(body.contains("&lt;img src=x onerror=alert(1)&gt;"));
        assert!(!body.contains("<img"));
        assert!(body.contains(r#"href="/messages/m1""#));
    }

    #[tokio::test]
    async fn test_upstream_failure_is_bad_gateway() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/users/me/messages")
            .match_query(mockito::Matcher::Any)
            .with_status(500)
            .create_async()
            .await;

        let fx = fixture(&server.url(), "http://127.0.0.1:9/token");
        connect(&fx.store);

        let (status, _, _) = get(&fx.state, "/messages?q=anything").await;
        assert_eq!(status, StatusCode::BAD_GATEWAY);
    }

    #[tokio::test]
    async fn test_send_validation_error_is_bad_request() {
        let fx = offline();
        connect(&fx.store);

        let response = router(fx.state.clone())
            .oneshot(
                Request::post("/send")
                    .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
                    .body(Body::from("to=&subject=Hi&body=Hello"))
                    .unwrap(),
            )
            .await
            .unwrap();
        let (status, body, _) = read(response).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body.contains("Missing required field: to"));
        assert!(body.contains(r#"value="Hi""#));
    }

    #[tokio::test]
    async fn test_send_form_renders() {
        let fx = offline();
        let (status, body, _) = get(&fx.state, "/send").await;
        assert_eq!(status, StatusCode::OK);
        assert!(body.contains(r#"<form method="post" action="/send">"#));
    }

    #[tokio::test]
    async fn test_logout_redirects_and_clears() {
        let fx = offline();
        connect(&fx.store);

        let (status, _, location) = get(&fx.state, "/logout").await;
        assert_eq!(status, StatusCode::SEE_OTHER);
        assert_eq!(location.as_deref(), Some("/"));
        assert!(fx.store.load().unwrap().is_none());
    }

    #[tokio::test]
    async fn test_web_oauth_flow() {
        let mut server = mockito::Server::new_async().await;
        let token = server
            .mock("POST", "/token")
            .match_body(mockito::Matcher::AllOf(vec![
                mockito::Matcher::UrlEncoded("code".into(), "auth-code".into()),
                mockito::Matcher::UrlEncoded(
                    "redirect_uri".into(),
                    "http://localhost:5000/auth/gmail/callback".into(),
                ),
            ]))
            .with_status(200)
            .with_body(r#"{"access_token":"fresh","refresh_token":"1//r","expires_in":3599,"scope":"scope-a"}"#)
            .expect(1)
            .create_async()
            .await;

        let fx = fixture("http://127.0.0.1:9", &format!("{}/token", server.url()));

        let (status, _, location) = get(&fx.state, "/auth/gmail").await;
        assert_eq!(status, StatusCode::SEE_OTHER);
        let location = location.unwrap();
        assert!(location.starts_with("https://accounts.google.com/o/oauth2/auth?"));
        let issued = location.split("state=").nth(1).unwrap().to_string();

        // A forged state is refused without contacting the token endpoint
        let (status, _, _) = get(&fx.state, "/auth/gmail/callback?code=auth-code&state=forged").await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);

        let uri = format!("/auth/gmail/callback?code=auth-code&state={}", issued);
        let (status, _, location) = get(&fx.state, &uri).await;
        assert_eq!(status, StatusCode::SEE_OTHER);
        assert_eq!(location.as_deref(), Some("/"));
        token.assert_async().await;
        assert_eq!(fx.store.load().unwrap().unwrap().access_token, "fresh");

        // States are single use
        let (status, _, _) = get(&fx.state, &uri).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }
}
