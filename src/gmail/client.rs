//! Gmail API client
//!
//! The single component that talks to Gmail. Every call obtains a valid access
//! token from the [`Authenticator`] first; a 401 from Gmail triggers exactly
//! one forced refresh and one retry.

use std::sync::Arc;

use reqwest::StatusCode;

use crate::auth::{AuthStatus, Authenticator};
use crate::config::gmail::USER_ID;
use crate::error::{AuthError, GmailBridgeError, Result, UpstreamError, ValidationError};
use crate::gmail::mime::{build_message, encode_raw_message, extract_email_content, find_header, SendRequest};
use crate::gmail::query::{clamp_max_results, SearchFilter};
use crate::gmail::types::*;

/// Gmail API client
pub struct GmailClient {
    /// HTTP client
    http_client: reqwest::Client,

    /// Token source
    authenticator: Arc<Authenticator>,

    /// API root, e.g. `https://gmail.googleapis.com/gmail/v1`
    base_url: String,
}

impl GmailClient {
    /// Create a new Gmail client
    pub fn new(authenticator: Arc<Authenticator>, base_url: impl Into<String>) -> Self {
        Self {
            http_client: reqwest::Client::new(),
            authenticator,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    pub fn authenticator(&self) -> &Authenticator {
        &self.authenticator
    }

    /// Base URL for messages
    fn messages_url(&self) -> String {
        format!("{}/users/{}/messages", self.base_url, USER_ID)
    }

    /// Send a request with a valid token, refreshing and retrying once on 401
    async fn execute<F>(&self, build: F) -> Result<reqwest::Response>
    where
        F: Fn(&str) -> reqwest::RequestBuilder,
    {
        let token = self.authenticator.access_token().await?;
        let response = build(&token).send().await?;
        if response.status() != StatusCode::UNAUTHORIZED {
            return Ok(response);
        }

        tracing::info!("Gmail rejected the access token, refreshing and retrying once");
        let token = self.authenticator.force_refresh().await?;
        Ok(build(&token).send().await?)
    }

    // ==================== Message Operations ====================

    /// List messages matching a Gmail search query, newest first
    pub async fn list_messages(&self, query: &str, max_results: Option<u32>) -> Result<Vec<MessageSummary>> {
        let max = clamp_max_results(max_results);
        let url = self.messages_url();
        let query = query.trim();

        tracing::debug!("Listing messages (q='{}', maxResults={})", query, max);

        let response = self
            .execute(|token| {
                let request = self
                    .http_client
                    .get(&url)
                    .bearer_auth(token)
                    .query(&[("maxResults", max)]);
                if query.is_empty() {
                    request
                } else {
                    request.query(&[("q", query)])
                }
            })
            .await?;

        if !response.status().is_success() {
            return Err(api_error(response, None).await);
        }

        let message_list: MessageList = response.json().await?;

        let mut results = Vec::with_capacity(message_list.messages.len());
        for msg_ref in message_list.messages {
            match self.fetch_message(&msg_ref.id).await {
                Ok(message) => results.push(summarize(message, msg_ref.thread_id)),
                Err(GmailBridgeError::Upstream(UpstreamError::MessageNotFound { message_id })) => {
                    tracing::warn!("Message {} disappeared before it could be fetched", message_id);
                }
                Err(e) => return Err(e),
            }
        }

        Ok(results)
    }

    /// Search messages with structured options
    pub async fn search_messages(&self, filter: &SearchFilter) -> Result<Vec<MessageSummary>> {
        let query = filter.to_query()?;
        self.list_messages(&query, filter.max_results).await
    }

    /// Get a message with parsed content
    pub async fn get_message(&self, message_id: &str) -> Result<MessageDetail> {
        let message_id = message_id.trim();
        if message_id.is_empty() {
            return Err(ValidationError::MissingField {
                field: "id".to_string(),
            }
            .into());
        }

        let message = self.fetch_message(message_id).await?;
        let payload = message.payload.as_ref();
        let to = header_or(payload, "to", "");
        let label_ids = message.label_ids.clone();

        Ok(MessageDetail {
            summary: summarize(message, None),
            to,
            label_ids,
        })
    }

    async fn fetch_message(&self, message_id: &str) -> Result<Message> {
        let url = format!("{}/{}", self.messages_url(), urlencoding::encode(message_id));

        let response = self
            .execute(|token| {
                self.http_client
                    .get(&url)
                    .bearer_auth(token)
                    .query(&[("format", "full")])
            })
            .await?;

        if response.status().is_success() {
            Ok(response.json().await?)
        } else {
            Err(api_error(response, Some(message_id)).await)
        }
    }

    /// Send a plain-text email
    pub async fn send_message(&self, request: &SendRequest) -> Result<SendReceipt> {
        request.check()?;

        let raw_message = build_message(request);
        let body = SendMessageRequest {
            raw: encode_raw_message(&raw_message),
        };
        let url = format!("{}/send", self.messages_url());

        let response = self
            .execute(|token| self.http_client.post(&url).bearer_auth(token).json(&body))
            .await?;

        if !response.status().is_success() {
            return Err(api_error(response, None).await);
        }

        let message: Message = response.json().await?;
        tracing::info!("Sent message {}", message.id);

        Ok(SendReceipt {
            status: "sent",
            id: message.id,
            thread_id: message.thread_id,
        })
    }

    // ==================== Session ====================

    /// Report authentication status; never fails
    pub async fn auth_status(&self) -> AuthStatus {
        self.authenticator.status().await
    }

    /// Discard the local credential
    pub fn logout(&self) -> Result<()> {
        self.authenticator.logout()
    }
}

fn header_or(payload: Option<&MessagePart>, name: &str, default: &str) -> String {
    payload
        .and_then(|p| find_header(p, name))
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .unwrap_or(default)
        .to_string()
}

fn summarize(message: Message, listed_thread_id: Option<String>) -> MessageSummary {
    let payload = message.payload.as_ref();
    let content = payload.map(extract_email_content).unwrap_or_default();

    let body = if !content.text.is_empty() {
        content.text
    } else {
        if !content.html.is_empty() {
            tracing::debug!("Message {} has no text/plain part, using HTML body", message.id);
        }
        content.html
    };

    MessageSummary {
        subject: header_or(payload, "subject", "No Subject"),
        sender: header_or(payload, "from", "Unknown"),
        date: header_or(payload, "date", "Unknown"),
        thread_id: message
            .thread_id
            .clone()
            .or(listed_thread_id)
            .unwrap_or_default(),
        snippet: message.snippet.clone().unwrap_or_default(),
        body,
        id: message.id,
    }
}

/// Map a non-success Gmail response onto the error taxonomy
async fn api_error(response: reqwest::Response, message_id: Option<&str>) -> GmailBridgeError {
    let status = response.status();
    let text = response.text().await.unwrap_or_default();
    let message = serde_json::from_str::<ApiErrorBody>(&text)
        .ok()
        .map(|body| body.error.message)
        .filter(|m| !m.is_empty())
        .unwrap_or(text);

    tracing::debug!("Gmail API error ({}): {}", status, message);

    match (status, message_id) {
        (StatusCode::UNAUTHORIZED, _) => AuthError::Rejected { message }.into(),
        (StatusCode::FORBIDDEN, _) => UpstreamError::InsufficientPermissions { message }.into(),
        (StatusCode::NOT_FOUND, Some(id)) => UpstreamError::MessageNotFound {
            message_id: id.to_string(),
        }
        .into(),
        (StatusCode::TOO_MANY_REQUESTS, _) => UpstreamError::RateLimited { message }.into(),
        _ => UpstreamError::RequestFailed {
            status: status.as_u16(),
            message,
        }
        .into(),
    }
}
