//! Minimal mail composition: the multipart container attachments are
//! appended to, message serialization, and read-back for inspection.

pub mod inspect;
pub mod message;
pub mod multipart;

pub use message::{ComposeStats, MessageBuilder};
pub use multipart::{BodyPart, Multipart};
