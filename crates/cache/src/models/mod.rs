//! Domain models for cached messages

mod message;
mod since;
mod topic;

pub use message::{Attachment, Event, Message, MessageBuilder};
pub use since::SinceMarker;
pub use topic::Topic;
