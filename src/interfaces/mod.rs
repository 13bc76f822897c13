//! Outward-facing adapters. The HTTP API is the only one today.

pub mod http;

pub use http::{build_app, build_router, serve, ErrorResponse, ServerError};
