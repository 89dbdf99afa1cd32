//! Language-server adapter: stdio JSON-RPC transport, server pool, and the
//! `lsp` tool.

pub mod client;
pub mod languages;
pub mod tool;
pub mod transport;

pub use client::{LspManager, LspServer};
pub use languages::{ServerRecipe, recipe_for};
pub use tool::LspTool;
