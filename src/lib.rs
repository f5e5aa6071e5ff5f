//! Gmail Bridge Library
//!
//! Read and send Gmail messages through a browser UI or a Model Context
//! Protocol (MCP) tool server. Both front ends share one [`GmailClient`],
//! which owns the authenticated session.

pub mod auth;
pub mod config;
pub mod error;
pub mod gmail;
pub mod mcp;
pub mod web;

pub use config::Config;
pub use error::{GmailBridgeError, Result};
pub use gmail::GmailClient;
