//! `kgraph-worker` library crate.
//!
//! Re-exports the execution bridge for integration testing. The binary
//! entrypoint lives in `main.rs`.

pub mod dispatcher;
