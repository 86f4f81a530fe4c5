//! Repository implementations of the domain store traits.

pub mod comment;
pub mod complaint;
pub mod notification;
pub mod security_key;
pub mod user;

pub use comment::CommentRepository;
pub use complaint::ComplaintRepository;
pub use notification::NotificationRepository;
pub use security_key::SecurityKeyRepository;
pub use user::UserRepository;

use domain::StoreError;

/// Converts a batch of rows, failing on the first corrupt one.
pub(crate) fn into_models<E, M>(rows: Vec<E>) -> Result<Vec<M>, StoreError>
where
    M: TryFrom<E, Error = StoreError>,
{
    rows.into_iter().map(M::try_from).collect()
}
