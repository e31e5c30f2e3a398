//! Model Context Protocol (MCP) plumbing: envelopes, transports, the
//! correlating client channel and the tool server loop.

pub mod channel;
pub mod client;
pub mod envelope;
pub mod schema;
pub mod server;
pub mod transport;

pub use channel::TransportChannel;
pub use client::{MCPClient, MCPConnectionState};
pub use envelope::{JsonRpcMessage, RequestId};
pub use server::ToolServer;
pub use transport::{memory_pair, LineTransport, MCPTransport, MemoryTransport, ServerTarget, StdioTransport};
