//! Domain models for the complaint desk.

pub mod comment;
pub mod complaint;
pub mod history;
pub mod notification;
pub mod realtime;
pub mod user;

pub use comment::ComplaintComment;
pub use complaint::{Complaint, ComplaintStatus, Priority};
pub use history::ComplaintHistory;
pub use notification::Notification;
pub use user::{User, UserRole};
