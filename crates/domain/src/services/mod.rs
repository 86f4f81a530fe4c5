//! Domain services.
//!
//! Services contain business logic that operates on domain models.

pub mod clock;
pub mod lifecycle;
pub mod notification;
pub mod otp;
pub mod registry;

pub use clock::{Clock, ManualClock, SystemClock};
pub use lifecycle::{Actor, ComplaintLifecycle, LifecycleError};
pub use notification::{NotificationEngine, NotificationError};
pub use otp::{OtpError, OtpPolicy, OtpStore};
pub use registry::{ConnectionHandle, ConnectionId, ConnectionRegistry, PushOutcome};
