//! Gmail API type definitions and the record shapes handed to adapters
//!
//! The API types mirror Gmail responses and are used for deserialization only.

use serde::{Deserialize, Serialize};

/// A Gmail message part (MIME part)
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct MessagePart {
    /// MIME type of this part
    pub mime_type: Option<String>,

    /// Filename for attachments
    pub filename: Option<String>,

    /// Headers for this part
    #[serde(default)]
    pub headers: Vec<Header>,

    /// Body of this part
    pub body: Option<MessagePartBody>,

    /// Nested parts (for multipart messages)
    #[serde(default)]
    pub parts: Vec<MessagePart>,
}

/// Header in a message part
#[derive(Debug, Clone, Deserialize)]
pub struct Header {
    pub name: String,
    pub value: String,
}

/// Body of a message part
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct MessagePartBody {
    /// Attachment ID (if this is an attachment)
    pub attachment_id: Option<String>,

    /// Base64url-encoded data
    pub data: Option<String>,
}

/// A Gmail message
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    pub id: String,

    pub thread_id: Option<String>,

    #[serde(default)]
    pub label_ids: Vec<String>,

    /// Snippet (preview text)
    pub snippet: Option<String>,

    /// Message payload (MIME structure)
    pub payload: Option<MessagePart>,
}

/// List of messages response
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MessageList {
    /// Messages in this page; absent when nothing matched
    #[serde(default)]
    pub messages: Vec<MessageRef>,
}

/// Reference to a message (id and thread_id only)
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MessageRef {
    pub id: String,
    pub thread_id: Option<String>,
}

/// Request to send a message
#[derive(Debug, Clone, Serialize)]
pub struct SendMessageRequest {
    /// Base64url-encoded RFC 822 message
    pub raw: String,
}

/// Google API error envelope
#[derive(Debug, Deserialize)]
pub struct ApiErrorBody {
    pub error: ApiErrorDetail,
}

#[derive(Debug, Deserialize)]
pub struct ApiErrorDetail {
    #[serde(default)]
    pub message: String,
}

/// Summary of a message as exposed to the web and MCP adapters
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MessageSummary {
    pub id: String,
    pub thread_id: String,
    pub subject: String,
    pub sender: String,
    pub date: String,
    pub snippet: String,
    /// Message body, preferring the text/plain part over HTML
    pub body: String,
}

/// Full view of a single message
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MessageDetail {
    #[serde(flatten)]
    pub summary: MessageSummary,
    pub to: String,
    pub label_ids: Vec<String>,
}

/// Confirmation of a sent message
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SendReceipt {
    pub status: &'static str,
    pub id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub thread_id: Option<String>,
}
