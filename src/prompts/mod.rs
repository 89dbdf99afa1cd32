//! Layered, cache-amortized system-prompt assembly.

pub mod component;
pub mod engine;
pub mod intent;

pub use component::{PromptComponent, Requirements, parse_component};
pub use engine::{FocusFile, PYTHON_ENV_VAR, PromptContext, PromptEngine};
pub use intent::detect_intent;
