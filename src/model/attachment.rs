//! Attachment patterns and entries.
//!
//! Entries do NOT hold their content. The payload is only read when the
//! composer opens the entry's source while writing the message.

use std::fmt;
use std::io::Read;

use crate::error::{AttachError, Result};

use super::content_type;

/// Raw attachment pattern as configured for a notification.
///
/// May contain template tokens and several comma-separated globs.
#[derive(Debug, Clone, PartialEq, Eq, Default, serde::Serialize, serde::Deserialize)]
pub struct AttachmentSpec {
    pattern: String,
}

impl AttachmentSpec {
    pub fn new(pattern: impl Into<String>) -> Self {
        Self {
            pattern: pattern.into(),
        }
    }

    pub fn pattern(&self) -> &str {
        &self.pattern
    }

    /// `true` if no attachments were requested.
    pub fn is_blank(&self) -> bool {
        self.pattern.trim().is_empty()
    }

    /// Split an already expanded pattern into its non-blank globs.
    pub fn sub_patterns(expanded: &str) -> Vec<&str> {
        expanded
            .split(',')
            .map(str::trim)
            .filter(|p| !p.is_empty())
            .collect()
    }
}

/// Something that can open a fresh read stream over attachment content.
pub trait ContentSource: Send + Sync {
    fn open(&self) -> Result<Box<dyn Read + Send>>;
}

/// A named, typed, lazily readable attachment handed to the composer.
pub struct AttachmentEntry {
    name: String,
    content_type: String,
    content_id: Option<String>,
    size: Option<u64>,
    source: Box<dyn ContentSource>,
}

impl AttachmentEntry {
    /// Build an entry, deriving the content type from the name's extension.
    ///
    /// Fails if the name is empty or contains control characters, since it
    /// ends up verbatim in MIME headers.
    pub fn new(name: impl Into<String>, source: Box<dyn ContentSource>) -> Result<Self> {
        let name = name.into();
        validate_name(&name)?;
        let content_type = content_type::for_file_name(&name).to_string();
        Ok(Self {
            name,
            content_type,
            content_id: None,
            size: None,
            source,
        })
    }

    /// Set the content id to `<name>` so HTML bodies can reference the part.
    pub fn with_content_id(mut self) -> Self {
        self.content_id = Some(format!("<{}>", self.name));
        self
    }

    /// Record the size the entry was admitted with.
    pub fn with_size(mut self, size: u64) -> Self {
        self.size = Some(size);
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn content_type(&self) -> &str {
        &self.content_type
    }

    pub fn content_id(&self) -> Option<&str> {
        self.content_id.as_deref()
    }

    /// Size known at collection time. `None` for generated content.
    pub fn size(&self) -> Option<u64> {
        self.size
    }

    pub fn open_stream(&self) -> Result<Box<dyn Read + Send>> {
        self.source.open()
    }
}

impl fmt::Debug for AttachmentEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AttachmentEntry")
            .field("name", &self.name)
            .field("content_type", &self.content_type)
            .field("content_id", &self.content_id)
            .field("size", &self.size)
            .finish_non_exhaustive()
    }
}

fn validate_name(name: &str) -> Result<()> {
    if name.trim().is_empty() {
        return Err(AttachError::Messaging("attachment name is empty".into()));
    }
    if name.chars().any(char::is_control) {
        return Err(AttachError::Messaging(format!(
            "attachment name {name:?} contains control characters"
        )));
    }
    Ok(())
}
