pub mod tui;

// Re-export commonly used types
pub use hadash_core::{
    error::{DashError, DashResult},
    types::FailoverTarget,
    DashConfig, HttpBackend,
};
