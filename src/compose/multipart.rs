//! Outbound multipart container.

use crate::model::attachment::AttachmentEntry;

/// One part of a multipart body.
#[derive(Debug)]
pub enum BodyPart {
    /// Inline text such as the notification body.
    Text { content_type: String, body: String },
    Attachment(AttachmentEntry),
}

/// Ordered list of body parts. Parts are only ever appended.
#[derive(Debug)]
pub struct Multipart {
    subtype: String,
    parts: Vec<BodyPart>,
}

impl Multipart {
    pub fn new(subtype: impl Into<String>) -> Self {
        Self {
            subtype: subtype.into(),
            parts: Vec::new(),
        }
    }

    /// A `multipart/mixed` container.
    pub fn mixed() -> Self {
        Self::new("mixed")
    }

    pub fn subtype(&self) -> &str {
        &self.subtype
    }

    pub fn add_text(&mut self, content_type: impl Into<String>, body: impl Into<String>) {
        self.parts.push(BodyPart::Text {
            content_type: content_type.into(),
            body: body.into(),
        });
    }

    pub fn add_body_part(&mut self, entry: AttachmentEntry) {
        self.parts.push(BodyPart::Attachment(entry));
    }

    pub fn parts(&self) -> &[BodyPart] {
        &self.parts
    }

    /// Attachment entries in the order they were added.
    pub fn attachments(&self) -> impl Iterator<Item = &AttachmentEntry> {
        self.parts.iter().filter_map(|p| match p {
            BodyPart::Attachment(entry) => Some(entry),
            BodyPart::Text { .. } => None,
        })
    }

    pub fn len(&self) -> usize {
        self.parts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.parts.is_empty()
    }
}

impl Default for Multipart {
    fn default() -> Self {
        Self::mixed()
    }
}
