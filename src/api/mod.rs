//! HTTP API Module
//!
//! Provides a REST API for write operations and cluster management.

mod http;

pub use http::HttpServer;
