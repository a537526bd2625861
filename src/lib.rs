//! `buildmail`: attachments for build notification mail.
//!
//! This crate resolves workspace file patterns into attachments under a
//! cumulative size ceiling, packages the build log (optionally zipped), and
//! writes the result as a multipart message.

pub mod attach;
pub mod compose;
pub mod config;
pub mod error;
pub mod listener;
pub mod model;
pub mod template;
pub mod workspace;
