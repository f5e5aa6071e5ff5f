//! Gmail API module
//!
//! Contains the API types, message composition, search translation, and the
//! client used by every front end.

pub mod client;
pub mod mime;
pub mod query;
pub mod types;

pub use client::GmailClient;
pub use mime::SendRequest;
pub use query::SearchFilter;
