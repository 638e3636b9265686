//! ABOUTME: Batch transport implementations for push backends
//! ABOUTME: Contains the JSON-over-HTTP multicast transport

pub mod http;

pub use http::{HttpTransport, DEFAULT_ENDPOINT};
