pub mod config;
pub mod mcp;
pub mod resources;
pub mod tools;
