//! MCP server surface (stdio transport).
pub mod server;
pub mod tools;
