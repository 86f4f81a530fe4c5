//! Complaint desk HTTP and WebSocket server.
//!
//! The binary in `main.rs` wires configuration, storage and background jobs
//! around the router built here; integration tests drive the same router over
//! the in-memory store.

pub mod app;
pub mod config;
pub mod error;
pub mod extractors;
pub mod jobs;
pub mod middleware;
pub mod routes;
pub mod services;
