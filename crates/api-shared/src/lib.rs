//! # API Shared
//!
//! Shared request/response types and services for the techcard APIs.
//!
//! Contains:
//! - Wire types for the REST endpoints (`types` module), with OpenAPI schemas
//! - Shared services like `HealthService`
//!
//! Used by `api-rest` and the workspace runner.

pub mod health;
pub mod types;

pub use health::HealthService;
pub use types::*;
