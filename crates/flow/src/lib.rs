//! HTTP client library for the flow-analysis engine.
//!
//! The analysis engine is a separate deployment; this crate wraps its
//! REST API and exposes it to the worker through the
//! [`FlowAnalyzer`](kgraph_core::analyzer::FlowAnalyzer) seam.

pub mod client;

pub use client::{FlowApiClient, FlowApiError};
