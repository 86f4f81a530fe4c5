//! HTTP route handlers.

pub mod auth;
pub mod comments;
pub mod complaints;
pub mod health;
pub mod notifications;
pub mod password_reset;
pub mod profile;
pub mod ws;
