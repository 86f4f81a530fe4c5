//! Domain layer for the complaint desk backend.
//!
//! This crate contains:
//! - Domain models (Complaint, ComplaintHistory, Notification, User)
//! - Storage traits implemented by the persistence crate
//! - An in-memory store used by tests and local tooling
//! - The complaint lifecycle, notification fan-out and OTP services

pub mod memory;
pub mod models;
pub mod services;
pub mod store;

pub use store::{StoreError, Stores};
