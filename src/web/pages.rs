//! HTML rendering for the web UI
//!
//! Every value that originates from Gmail or from the user is escaped here.

use html_escape::{decode_html_entities, encode_double_quoted_attribute, encode_text};

use crate::auth::{AuthState, AuthStatus};
use crate::gmail::mime::excerpt;
use crate::gmail::types::{MessageDetail, MessageSummary, SendReceipt};

/// Characters of body text shown per message in the list view
pub const EXCERPT_CHARS: usize = 200;

const STYLE: &str = r#"
  body { font-family: -apple-system, BlinkMacSystemFont, "Segoe UI", Roboto, sans-serif; max-width: 760px; margin: 2rem auto; padding: 0 1rem; color: #1f2328; }
  nav a { margin-right: 1rem; }
  .message { border-bottom: 1px solid #d0d7de; padding: 0.75rem 0; }
  .meta { color: #59636e; font-size: 0.9rem; }
  .error { color: #cf222e; }
  pre { white-space: pre-wrap; }
  label { display: block; margin-top: 0.75rem; }
  input, textarea { width: 100%; }
"#;

/// Wrap a page body in the shared layout
pub fn layout(title: &str, body: &str) -> String {
    format!(
        r#"<!DOCTYPE html>
<html lang="en">
<head>
<meta charset="utf-8">
<title>{title} - Gmail Bridge</title>
<style>{style}</style>
</head>
<body>
<nav><a href="/">Home</a><a href="/messages">Messages</a><a href="/send">Send</a><a href="/logout">Log out</a></nav>
<h1>{title}</h1>
{body}
</body>
</html>"#,
        title = encode_text(title),
        style = STYLE,
        body = body,
    )
}

pub fn status_page(status: &AuthStatus) -> String {
    let body = match status.status {
        AuthState::Authenticated => {
            let expiry = status
                .expiry
                .map(|e| format!(" Token valid until {}.", e.format("%Y-%m-%d %H:%M UTC")))
                .unwrap_or_default();
            format!(
                r#"<p>Connected to Gmail ({mode}).{expiry}</p><p><a href="/messages">View messages</a></p>"#,
                mode = encode_text(status.mode),
                expiry = expiry,
            )
        }
        AuthState::Expired => {
            r#"<p>Token expired. It will be refreshed on the next request.</p><p><a href="/messages">View messages</a></p>"#
                .to_string()
        }
        AuthState::Unauthenticated => {
            r#"<p>Not connected.</p><p><a href="/auth/gmail">Connect Gmail</a> or run <code>gmail-bridge auth</code>.</p>"#
                .to_string()
        }
    };

    layout("Gmail status", &body)
}

pub fn message_list(messages: &[MessageSummary], query: &str) -> String {
    let mut body = format!(
        r#"<form method="get" action="/messages"><input name="q" value="{}" placeholder="Gmail search, e.g. is:unread"></form>"#,
        encode_double_quoted_attribute(query)
    );

    if messages.is_empty() {
        body.push_str("<p>No messages found.</p>");
    }

    for message in messages {
        let snippet = decode_html_entities(&message.snippet);
        let text = if message.body.trim().is_empty() {
            excerpt(&snippet, EXCERPT_CHARS)
        } else {
            excerpt(message.body.trim(), EXCERPT_CHARS)
        };

        body.push_str(&format!(
            r#"<div class="message"><a href="/messages/{href}"><strong>{subject}</strong></a><div class="meta">{sender} &middot; {date}</div><p>{text}</p></div>"#,
            href = encode_double_quoted_attribute(&urlencoding::encode(&message.id)),
            subject = encode_text(&message.subject),
            sender = encode_text(&message.sender),
            date = encode_text(&message.date),
            text = encode_text(&text),
        ));
    }

    layout("Messages", &body)
}

pub fn message_detail(detail: &MessageDetail) -> String {
    let summary = &detail.summary;
    let labels = detail.label_ids.join(", ");
    let body = format!(
        r#"<div class="meta"><div>From: {sender}</div><div>To: {to}</div><div>Date: {date}</div><div>Labels: {labels}</div></div><pre>{text}</pre>"#,
        sender = encode_text(&summary.sender),
        to = encode_text(&detail.to),
        date = encode_text(&summary.date),
        labels = encode_text(&labels),
        text = encode_text(&summary.body),
    );

    layout(&summary.subject, &body)
}

/// The compose form, optionally with an error and the previously entered values
pub fn send_form(error: Option<&str>, to: &str, subject: &str, body: &str) -> String {
    let error = error
        .map(|e| format!(r#"<p class="error">{}</p>"#, encode_text(e)))
        .unwrap_or_default();

    let form = format!(
        r#"{error}<form method="post" action="/send">
<label>To <input name="to" type="email" value="{to}"></label>
<label>Subject <input name="subject" value="{subject}"></label>
<label>Message <textarea name="body" rows="10">{body}</textarea></label>
<p><button type="submit">Send</button></p>
</form>"#,
        error = error,
        to = encode_double_quoted_attribute(to),
        subject = encode_double_quoted_attribute(subject),
        body = encode_text(body),
    );

    layout("Send a message", &form)
}

pub fn sent_page(receipt: &SendReceipt) -> String {
    let body = format!(
        r#"<p>Message sent. ID: <code>{}</code></p><p><a href="/send">Send another</a></p>"#,
        encode_text(&receipt.id)
    );
    layout("Sent", &body)
}

pub fn error_page(title: &str, message: &str, connect_hint: bool) -> String {
    let mut body = format!(r#"<p class="error">{}</p>"#, encode_text(message));
    if connect_hint {
        body.push_str(r#"<p><a href="/auth/gmail">Connect Gmail</a></p>"#);
    }
    layout(title, &body)
}
