//! Session orchestration: inbound subscription, transcript store,
//! announcement overlay, and the signal fan-out for the presence
//! controller.

pub mod announce;
pub mod coordinator;
pub mod events;

pub use announce::AnnouncementBoard;
pub use coordinator::{EventSource, Outbound, SessionCoordinator, SessionHandle};
pub use events::{Announcement, InboundEvent};
