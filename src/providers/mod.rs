//! Image Generation Backends
//!
//! This module provides a unified interface over the services that perform
//! the actual image synthesis and editing.
//!
//! # Architecture
//!
//! ```text
//!             ┌───────────────────────────┐
//!             │  GenerationService Trait  │
//!             └─────────────┬─────────────┘
//!                           │
//!              ┌────────────┴────────────┐
//!              │                         │
//!        ┌─────┴─────┐             ┌─────┴─────┐
//!        │  Gemini   │             │  Dry run  │
//!        └───────────┘             └───────────┘
//! ```

pub mod traits;
pub mod http_client;
pub mod gemini;
pub mod dry_run;

// Re-export commonly used types
pub use traits::{
    GenerationService,
    GenerationError,
    GenerationResult,
    GeneratorFactory,
};
