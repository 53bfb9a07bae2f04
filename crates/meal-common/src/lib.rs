pub mod error;
pub mod mcp_api;
pub mod openai;
pub mod redis;
