//! Shared utilities for the complaint desk backend.
//!
//! - Bearer token issue/validation
//! - Password hashing with Argon2id
//! - Digest comparison for hashed secrets
//! - Validation rules reused by request DTOs

pub mod crypto;
pub mod jwt;
pub mod password;
pub mod validation;
