//! Lock-free plumbing between the audio thread and the main/UI thread.

pub mod active_set;
pub mod flags;
pub mod name_pool;
pub mod queue;

pub use active_set::{ActiveLink, ActiveSet, Participant};
pub use flags::SharedFlags;
pub use name_pool::{NameBuffer, NameError, NameHandle, NamePool, NAME_CAPACITY};
pub use queue::{channel, EventReceiver, EventSender, QueueError};
