//! MCP (Model Context Protocol) module
//!
//! Exposes the Gmail client as four tools over JSON-RPC.

pub mod server;
pub mod tools;
pub mod types;
