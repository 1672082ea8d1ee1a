//! Bagcheck Core Library
//!
//! Thermal bag inspection: rubric, model-backed inspector, result
//! presentation and the web surface that serves them.

pub mod config;
pub mod inspection;
pub mod presentation;
pub mod rubric;
pub mod web;

// Re-export key types for convenience
pub use config::Config;
pub use inspection::{
    parse_verdict, InspectionError, InspectionRequest, InspectionVerdict, Inspector,
    OpenAiInspector,
};
pub use presentation::{analyze, present, DisplayKind, DisplayResult};
pub use rubric::{Rubric, DEFAULT_RUBRIC};
