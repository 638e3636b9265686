//! ABOUTME: Core types, errors, request IDs, and tracing utilities
//! ABOUTME: Foundation crate used by all other pushcast components

pub mod error;
pub mod id;
pub mod telemetry;

pub use error::{Error, Result};
pub use id::RequestId;
