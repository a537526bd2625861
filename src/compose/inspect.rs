//! Read back the attachments of a composed message.

use std::path::Path;

use mail_parser::{MessageParser, MimeHeaders};

use crate::error::{AttachError, Result};

/// An attachment found in a parsed message.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct AttachmentInfo {
    pub filename: String,
    pub content_type: String,
    /// Decoded size in bytes.
    pub size: u64,
    pub content_id: Option<String>,
}

/// List attachments of a raw RFC 5322 message.
pub fn list_attachments(raw_message: &[u8]) -> Result<Vec<AttachmentInfo>> {
    let msg = MessageParser::default()
        .parse(raw_message)
        .ok_or_else(|| AttachError::Messaging("Failed to parse message".into()))?;

    let mut result = Vec::new();
    for (idx, part) in msg.attachments().enumerate() {
        let filename = part
            .attachment_name()
            .map(String::from)
            .unwrap_or_else(|| format!("attachment_{idx}"));

        let content_type = part
            .content_type()
            .map(|ct: &mail_parser::ContentType| match ct.subtype() {
                Some(sub) => format!("{}/{sub}", ct.ctype()),
                None => ct.ctype().to_string(),
            })
            .unwrap_or_else(|| "application/octet-stream".to_string());

        result.push(AttachmentInfo {
            filename,
            content_type,
            size: part.contents().len() as u64,
            content_id: part.content_id().map(String::from),
        });
    }
    Ok(result)
}

/// Decoded content of the attachment named `filename`, if present.
pub fn extract_attachment(raw_message: &[u8], filename: &str) -> Result<Option<Vec<u8>>> {
    let msg = MessageParser::default()
        .parse(raw_message)
        .ok_or_else(|| AttachError::Messaging("Failed to parse message".into()))?;
    Ok(msg
        .attachments()
        .find(|part| part.attachment_name() == Some(filename))
        .map(|part| part.contents().to_vec()))
}

/// [`list_attachments`] for a message stored on disk.
pub fn inspect_file(path: &Path) -> Result<Vec<AttachmentInfo>> {
    let raw = std::fs::read(path).map_err(|e| AttachError::io(path, e))?;
    list_attachments(&raw)
}
