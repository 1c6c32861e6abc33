//! Deal win-probability features and scoring
//!
//! Turns won/lost CRM deal exports plus an activity log into a per-deal
//! feature table, and trains/scores a win-probability model on it.

pub mod config;
pub mod error;
pub mod model;
pub mod outputs;
pub mod pipeline;
pub mod timestamp;

pub use error::{PipelineError, PipelineResult};
