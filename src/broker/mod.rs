pub mod engine;
pub mod message;
pub mod topic;

pub use engine::{Broker, DEFAULT_IDLE_TIMEOUT};
pub use message::{Message, MessageId};
pub use topic::Topic;
