//! Mockup session state machine
//!
//! This module contains the workflow core:
//! - Session aggregate and its transitions
//! - Phase-gated orchestration of generation and edit calls
//! - Registry of live sessions

mod error;
mod machine;
mod registry;
mod state;

pub use error::{Phase, SessionError};
pub use machine::MockupSession;
pub use registry::SessionManager;
pub use state::{HistoryEntry, SelectedProduct, SessionSnapshot};
