//! Message composition, validation, and content extraction

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
use schemars::JsonSchema;
use serde::Deserialize;
use validator::Validate;

use crate::error::{GmailBridgeError, Result, ValidationError};
use crate::gmail::types::MessagePart;

/// An outgoing plain-text message
#[derive(Debug, Clone, Deserialize, JsonSchema, Validate)]
pub struct SendRequest {
    /// Recipient email address
    #[validate(custom = "plausible_address")]
    pub to: String,

    /// Subject line
    #[validate(custom = "not_blank")]
    pub subject: String,

    /// Message body (plain text)
    #[validate(custom = "not_blank")]
    pub body: String,
}

impl SendRequest {
    pub fn new(to: impl Into<String>, subject: impl Into<String>, body: impl Into<String>) -> Self {
        Self {
            to: to.into(),
            subject: subject.into(),
            body: body.into(),
        }
    }

    /// Check the request before anything is sent
    pub fn check(&self) -> Result<()> {
        let Err(errors) = self.validate() else {
            return Ok(());
        };

        let fields = errors.field_errors();
        let err = if fields.contains_key("to") {
            if self.to.trim().is_empty() {
                ValidationError::MissingField {
                    field: "to".to_string(),
                }
            } else {
                ValidationError::InvalidEmail {
                    email: self.to.clone(),
                }
            }
        } else {
            let field = ["subject", "body"]
                .into_iter()
                .find(|f| fields.contains_key(f))
                .unwrap_or("request");
            ValidationError::MissingField {
                field: field.to_string(),
            }
        };

        Err(GmailBridgeError::Validation(err))
    }
}

fn plausible_address(value: &str) -> std::result::Result<(), validator::ValidationError> {
    if validate_email(value.trim()) {
        Ok(())
    } else {
        Err(validator::ValidationError::new("email"))
    }
}

fn not_blank(value: &str) -> std::result::Result<(), validator::ValidationError> {
    if value.trim().is_empty() {
        Err(validator::ValidationError::new("blank"))
    } else {
        Ok(())
    }
}

/// Validate an email address
pub fn validate_email(email: &str) -> bool {
    let parts: Vec<&str> = email.split('@').collect();
    if parts.len() != 2 {
        return false;
    }
    let (local, domain) = (parts[0], parts[1]);

    !local.is_empty()
        && !domain.is_empty()
        && !email.chars().any(|c| c.is_whitespace() || c.is_control())
        && domain.contains('.')
        && !domain.starts_with('.')
        && !domain.ends_with('.')
}

/// Encode text for MIME header (RFC 2047)
pub fn encode_mime_header(text: &str) -> String {
    if text.chars().all(|c| c.is_ascii() && c != '\r' && c != '\n') {
        return text.to_string();
    }

    format!(
        "=?UTF-8?B?{}?=",
        base64::engine::general_purpose::STANDARD.encode(text.as_bytes())
    )
}

/// Encode a raw email message for Gmail API (base64url, no padding)
pub fn encode_raw_message(message: &str) -> String {
    URL_SAFE_NO_PAD.encode(message.as_bytes())
}

/// Decode base64url data from Gmail API
/// Handles both padded and non-padded base64url encoding
pub fn decode_base64url(data: &str) -> Result<Vec<u8>> {
    URL_SAFE_NO_PAD
        .decode(data)
        .or_else(|_| base64::engine::general_purpose::URL_SAFE.decode(data))
        .or_else(|_| base64::engine::general_purpose::STANDARD.decode(data))
        .map_err(|e| {
            GmailBridgeError::Validation(ValidationError::InvalidParameter {
                name: "base64 data".to_string(),
                message: e.to_string(),
            })
        })
}

/// Decode base64url data to a string, replacing invalid UTF-8
pub fn decode_base64url_string(data: &str) -> Result<String> {
    let bytes = decode_base64url(data)?;
    Ok(String::from_utf8_lossy(&bytes).into_owned())
}

/// Build the RFC 822 text of a plain-text message
pub fn build_message(request: &SendRequest) -> String {
    let body = request.body.replace("\r\n", "\n").replace('\n', "\r\n");
    let encoding = if body.is_ascii() { "7bit" } else { "8bit" };

    let lines = [
        format!("To: {}", request.to.trim()),
        format!("Subject: {}", encode_mime_header(request.subject.trim())),
        "MIME-Version: 1.0".to_string(),
        "Content-Type: text/plain; charset=UTF-8".to_string(),
        format!("Content-Transfer-Encoding: {}", encoding),
        String::new(),
        body,
    ];

    lines.join("\r\n")
}

/// Text and HTML bodies found in a message
#[derive(Debug, Clone, Default)]
pub struct EmailContent {
    pub text: String,
    pub html: String,
}

/// Recursively extract body content from MIME message parts
pub fn extract_email_content(message_part: &MessagePart) -> EmailContent {
    let mut content = EmailContent::default();

    let mime_type = message_part.mime_type.as_deref().unwrap_or("");

    if let Some(data) = message_part.body.as_ref().and_then(|b| b.data.as_ref()) {
        // Attachments and inline binaries are skipped
        if mime_type.starts_with("text/") && message_part.filename.as_deref().unwrap_or("").is_empty() {
            match decode_base64url_string(data) {
                Ok(decoded) => {
                    if mime_type == "text/plain" {
                        content.text = decoded;
                    } else if mime_type == "text/html" {
                        content.html = decoded;
                    }
                }
                Err(e) => {
                    tracing::debug!("Failed to decode {} part: {}", mime_type, e);
                }
            }
        }
    }

    for part in &message_part.parts {
        let nested = extract_email_content(part);
        content.text.push_str(&nested.text);
        content.html.push_str(&nested.html);
    }

    content
}

/// Find header value by name (case-insensitive)
pub fn find_header<'a>(part: &'a MessagePart, name: &str) -> Option<&'a str> {
    part.headers
        .iter()
        .find(|h| h.name.eq_ignore_ascii_case(name))
        .map(|h| h.value.as_str())
}

/// Shorten text to at most `max_chars` characters, on a char boundary
pub fn excerpt(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        Some((idx, _)) => format!("{}...", text[..idx].trim_end()),
        None => text.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gmail::types::{Header, MessagePartBody};

    #[test]
    fn test_validate_email_valid() {
        assert!(validate_email("test@example.com"));
        assert!(validate_email("user.name@domain.co.uk"));
        assert!(validate_email("a@b.co"));
    }

    #[test]
    fn test_validate_email_invalid() {
        assert!(!validate_email(""));
        assert!(!validate_email("not-an-email"));
        assert!(!validate_email("@domain.com"));
        assert!(!validate_email("user@"));
        assert!(!validate_email("user@.com"));
        assert!(!validate_email("user@domain."));
        assert!(!validate_email("user@example.com\r\nBcc: victim@example.com"));
    }

    #[test]
    fn test_check_send_request() {
        assert!(SendRequest::new("x@y.com", "Hi", "Hello").check().is_ok());

        let err = SendRequest::new("", "Hi", "Hello").check().unwrap_err();
        assert!(matches!(
            err,
            GmailBridgeError::Validation(ValidationError::MissingField { ref field }) if field == "to"
        ));

        let err = SendRequest::new("nobody", "Hi", "Hello").check().unwrap_err();
        assert!(matches!(
            err,
            GmailBridgeError::Validation(ValidationError::InvalidEmail { .. })
        ));

        let err = SendRequest::new("x@y.com", "  ", "Hello").check().unwrap_err();
        assert!(matches!(
            err,
            GmailBridgeError::Validation(ValidationError::MissingField { ref field }) if field == "subject"
        ));

        let err = SendRequest::new("x@y.com", "Hi", "").check().unwrap_err();
        assert!(matches!(
            err,
            GmailBridgeError::Validation(ValidationError::MissingField { ref field }) if field == "body"
        ));
    }

    #[test]
    fn test_encode_mime_header_ascii() {
        assert_eq!(encode_mime_header("Hello World"), "Hello World");
    }

    #[test]
    fn test_encode_mime_header_unicode() {
        let encoded = encode_mime_header("Héllo Wörld");
        assert!(encoded.starts_with("=?UTF-8?B?"));
        assert!(encoded.ends_with("?="));
    }

    #[test]
    fn test_decode_base64url() {
        let decoded = decode_base64url_string("SGVsbG8gV29ybGQ").unwrap();
        assert_eq!(decoded, "Hello World");
    }

    #[test]
    fn test_build_message() {
        let message = build_message(&SendRequest::new("x@y.com", "Hi", "Hello\nthere"));
        assert!(message.starts_with("To: x@y.com\r\nSubject: Hi\r\n"));
        assert!(message.contains("Content-Type: text/plain; charset=UTF-8"));
        assert!(message.contains("Content-Transfer-Encoding: 7bit"));
        assert!(message.ends_with("\r\n\r\nHello\r\nthere"));

        let unicode = build_message(&SendRequest::new("x@y.com", "Grüße", "Schöne Grüße"));
        assert!(unicode.contains("Subject: =?UTF-8?B?"));
        assert!(unicode.contains("Content-Transfer-Encoding: 8bit"));
    }

    fn text_part(mime_type: &str, text: &str) -> MessagePart {
        MessagePart {
            mime_type: Some(mime_type.to_string()),
            body: Some(MessagePartBody {
                attachment_id: None,
                data: Some(encode_raw_message(text)),
            }),
            ..Default::default()
        }
    }

    #[test]
    fn test_extract_multipart_content() {
        let payload = MessagePart {
            mime_type: Some("multipart/alternative".to_string()),
            headers: vec![Header {
                name: "Subject".to_string(),
                value: "Status".to_string(),
            }],
            parts: vec![
                text_part("text/plain", "plain body"),
                text_part("text/html", "<p>html body</p>"),
            ],
            ..Default::default()
        };

        let content = extract_email_content(&payload);
        assert_eq!(content.text, "plain body");
        assert_eq!(content.html, "<p>html body</p>");
        assert_eq!(find_header(&payload, "subject"), Some("Status"));
        assert_eq!(find_header(&payload, "From"), None);
    }

    #[test]
    fn test_extract_skips_text_attachments() {
        let mut attachment = text_part("text/plain", "attached notes");
        attachment.filename = Some("notes.txt".to_string());
        let payload = MessagePart {
            mime_type: Some("multipart/mixed".to_string()),
            parts: vec![text_part("text/plain", "body"), attachment],
            ..Default::default()
        };

        assert_eq!(extract_email_content(&payload).text, "body");
    }

    #[test]
    fn test_excerpt() {
        assert_eq!(excerpt("short", 200), "short");
        assert_eq!(excerpt("héllo wörld", 5), "héllo...");
    }
}
