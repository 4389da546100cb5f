//! # SALV Common Library
//!
//! Shared code for the sales-audit lifecycle engine:
//! - Database initialization and persisted models
//! - Configuration resolution (CLI > env > TOML > defaults)
//! - Timezone-aware scheduling time utilities
//! - Common error type

pub mod config;
pub mod db;
pub mod error;
pub mod time;

pub use error::{Error, Result};
