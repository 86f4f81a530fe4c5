//! Database entity definitions.
//!
//! Entities are direct mappings to database rows. Enum columns are stored as
//! text, so conversion into domain models is fallible.

pub mod comment;
pub mod complaint;
pub mod notification;
pub mod security_key;
pub mod user;

pub use comment::CommentEntity;
pub use complaint::{ComplaintEntity, ComplaintHistoryEntity, ComplaintStatsEntity};
pub use notification::NotificationEntity;
pub use security_key::SecurityKeyEntity;
pub use user::UserEntity;
