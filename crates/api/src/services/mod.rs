//! Application services layered over the domain: authentication, email and
//! startup bootstrap.

pub mod admin_bootstrap;
pub mod auth;
pub mod email;

pub use auth::{AuthError, AuthResult, AuthService, Registration};
pub use email::{EmailError, EmailService};
