pub mod event;
pub mod message;

pub use event::{Event, EventState};
pub use message::{Action, Message};
