// MCP layer: JSON-RPC 2.0 messages, sessions and method dispatch

pub mod handler;
pub mod jsonrpc;
pub mod session;

pub use handler::{McpReply, McpServer};
pub use session::SessionStore;
