//! Serialize a multipart notification as an RFC 5322 message.
//!
//! Each entry's stream is opened exactly once and read fully before its part
//! is built, so a part that cannot be read is dropped whole instead of
//! leaving a truncated part behind. Attachment bodies are always base64.

use std::io::{Read, Write};
use std::time::SystemTime;

use chrono::{DateTime, Utc};
use lettre::message::header::{ContentDisposition, ContentId, ContentTransferEncoding, ContentType};
use lettre::message::{Body, Mailbox, MultiPart, SinglePart};
use lettre::Message;
use sha2::{Digest, Sha256};
use tracing::{debug, warn};

use crate::error::{AttachError, Result};
use crate::listener::Listener;
use crate::model::attachment::AttachmentEntry;

use super::multipart::{BodyPart, Multipart};

/// Counts returned after writing a message.
#[derive(Debug, Default, Clone, PartialEq, Eq, serde::Serialize)]
pub struct ComposeStats {
    pub text_parts: usize,
    pub attachments: usize,
    /// Attachments whose content could not be read.
    pub omitted: usize,
    /// Bytes of attachment content before encoding.
    pub attachment_bytes: u64,
}

/// Envelope headers for a notification message.
#[derive(Debug, Clone)]
pub struct MessageBuilder {
    from: String,
    to: Vec<String>,
    subject: String,
    date: DateTime<Utc>,
}

impl MessageBuilder {
    pub fn new(from: impl Into<String>, subject: impl Into<String>) -> Self {
        Self {
            from: from.into(),
            to: Vec::new(),
            subject: subject.into(),
            date: Utc::now(),
        }
    }

    pub fn to(mut self, recipient: impl Into<String>) -> Self {
        self.to.push(recipient.into());
        self
    }

    pub fn date(mut self, date: DateTime<Utc>) -> Self {
        self.date = date;
        self
    }

    /// Write the full message.
    ///
    /// Fails before writing anything if there is no recipient, an address
    /// does not parse, or a header value contains a line break. The progress
    /// callback receives `(current, total)` parts.
    pub fn write_to(
        &self,
        multipart: &Multipart,
        out: &mut dyn Write,
        listener: &dyn Listener,
        progress: &dyn Fn(usize, usize),
    ) -> Result<ComposeStats> {
        let mut builder = Message::builder()
            .from(mailbox(&self.from)?)
            .subject(single_line("Subject", &self.subject)?)
            .date(SystemTime::from(self.date))
            .message_id(Some(self.message_id(multipart)));
        if self.to.is_empty() {
            return Err(AttachError::Messaging("message has no recipients".into()));
        }
        for recipient in &self.to {
            builder = builder.to(mailbox(recipient)?);
        }

        let mut stats = ComposeStats::default();
        let mut body = MultiPart::mixed().build();
        let total = multipart.len();
        for (i, part) in multipart.parts().iter().enumerate() {
            progress(i, total);
            match part {
                BodyPart::Text { content_type, body: text } => {
                    body = body.singlepart(text_part(content_type, text)?);
                    stats.text_parts += 1;
                }
                BodyPart::Attachment(entry) => match read_entry(entry) {
                    Ok(content) => {
                        let len = content.len() as u64;
                        body = body.singlepart(attachment_part(entry, content)?);
                        stats.attachments += 1;
                        stats.attachment_bytes += len;
                    }
                    Err(e) => {
                        warn!(name = entry.name(), error = %e, "Dropping unreadable attachment");
                        listener.error(&format!(
                            "Error reading `{}' for attachment - {e}",
                            entry.name()
                        ));
                        stats.omitted += 1;
                    }
                },
            }
        }

        let message = builder
            .multipart(body)
            .map_err(|e| AttachError::Messaging(e.to_string()))?;
        out.write_all(&message.formatted())?;
        out.flush()?;
        progress(total, total);

        debug!(?stats, "Composed message");
        Ok(stats)
    }

    /// `<digest@buildmail>` from the subject, date and attachment names.
    fn message_id(&self, multipart: &Multipart) -> String {
        let mut hasher = Sha256::new();
        hasher.update(self.subject.as_bytes());
        hasher.update(self.date.to_rfc3339().as_bytes());
        for entry in multipart.attachments() {
            hasher.update(entry.name().as_bytes());
        }
        let digest = hex::encode(hasher.finalize());
        format!("<{}@buildmail>", &digest[..24])
    }
}

fn mailbox(address: &str) -> Result<Mailbox> {
    single_line("Address", address)?
        .parse::<Mailbox>()
        .map_err(|e| AttachError::Messaging(format!("invalid address '{address}': {e}")))
}

/// Reject values that would spill into further header lines.
fn single_line<'a>(header: &str, value: &'a str) -> Result<&'a str> {
    if value.contains(['\r', '\n']) {
        return Err(AttachError::Messaging(format!(
            "{header} must not contain line breaks"
        )));
    }
    Ok(value)
}

fn content_type(value: &str) -> Result<ContentType> {
    ContentType::parse(value)
        .map_err(|e| AttachError::Messaging(format!("invalid content type '{value}': {e}")))
}

fn text_part(mime: &str, text: &str) -> Result<SinglePart> {
    let header = content_type(&format!("{mime}; charset=utf-8"))?;
    Ok(SinglePart::builder().header(header).body(text.to_string()))
}

fn attachment_part(entry: &AttachmentEntry, content: Vec<u8>) -> Result<SinglePart> {
    let body = Body::new_with_encoding(content, ContentTransferEncoding::Base64)
        .map_err(|_| AttachError::Messaging(format!("cannot encode `{}'", entry.name())))?;
    let mut part = SinglePart::builder()
        .header(content_type(entry.content_type())?)
        .header(ContentDisposition::attachment(entry.name()));
    if let Some(id) = entry.content_id() {
        part = part.header(ContentId::from(id.to_string()));
    }
    Ok(part.body(body))
}

/// Open the entry's stream once and read it fully. The stream is closed on return.
fn read_entry(entry: &AttachmentEntry) -> Result<Vec<u8>> {
    let mut stream = entry.open_stream()?;
    let mut content = Vec::new();
    stream.read_to_end(&mut content)?;
    Ok(content)
}

#[cfg(test)]
mod tests {
    use super::*;
    use mail_parser::{MessageParser, MimeHeaders};

    use crate::listener::{Level, RecordingListener};
    use crate::model::attachment::ContentSource;

    struct Fixed(&'static [u8]);

    impl ContentSource for Fixed {
        fn open(&self) -> Result<Box<dyn Read + Send>> {
            Ok(Box::new(self.0))
        }
    }

    struct Broken;

    impl ContentSource for Broken {
        fn open(&self) -> Result<Box<dyn Read + Send>> {
            Err(std::io::Error::new(std::io::ErrorKind::NotFound, "gone").into())
        }
    }

    fn fixed_date() -> DateTime<Utc> {
        DateTime::parse_from_rfc3339("2024-01-04T10:00:00Z")
            .unwrap()
            .with_timezone(&Utc)
    }

    fn write(builder: &MessageBuilder, multipart: &Multipart) -> Result<(Vec<u8>, ComposeStats)> {
        let mut out: Vec<u8> = Vec::new();
        let stats = builder.write_to(multipart, &mut out, &RecordingListener::new(), &|_, _| {})?;
        Ok((out, stats))
    }

    #[test]
    fn test_write_message_structure() {
        let mut multipart = Multipart::mixed();
        multipart.add_text("text/plain", "Build succeeded");
        multipart.add_body_part(
            AttachmentEntry::new("a.txt", Box::new(Fixed(b"hello")))
                .unwrap()
                .with_content_id(),
        );

        let builder = MessageBuilder::new("ci@example.com", "Build #1")
            .to("dev@example.com")
            .date(fixed_date());
        let (out, stats) = write(&builder, &multipart).unwrap();
        assert_eq!(stats.text_parts, 1);
        assert_eq!(stats.attachments, 1);
        assert_eq!(stats.attachment_bytes, 5);

        let text = String::from_utf8(out.clone()).unwrap();
        assert!(text.contains("To: dev@example.com\r\n"));
        assert!(text.contains("Content-ID: <a.txt>\r\n"));
        assert!(text.contains("aGVsbG8=\r\n"));

        let parsed = MessageParser::default().parse(&out).unwrap();
        assert_eq!(parsed.subject(), Some("Build #1"));
        assert!(parsed
            .body_text(0)
            .is_some_and(|body| body.contains("Build succeeded")));
        let attachment = parsed.attachments().next().unwrap();
        assert_eq!(attachment.attachment_name(), Some("a.txt"));
        assert_eq!(attachment.contents(), b"hello");
    }

    #[test]
    fn test_non_ascii_subject_round_trips() {
        let builder = MessageBuilder::new("ci@example.com", "Compilación rota")
            .to("dev@example.com")
            .date(fixed_date());
        let mut multipart = Multipart::mixed();
        multipart.add_text("text/plain", "see log");
        let (out, _) = write(&builder, &multipart).unwrap();
        assert!(out.is_ascii());
        let parsed = MessageParser::default().parse(&out).unwrap();
        assert_eq!(parsed.subject(), Some("Compilación rota"));
    }

    #[test]
    fn test_line_breaks_in_headers_are_rejected() {
        let mut multipart = Multipart::mixed();
        multipart.add_text("text/plain", "body");

        let injected_subject = MessageBuilder::new("ci@example.com", "Build ok\r\nBcc: x@evil.example")
            .to("dev@example.com");
        let mut out: Vec<u8> = Vec::new();
        let err = injected_subject
            .write_to(&multipart, &mut out, &RecordingListener::new(), &|_, _| {})
            .unwrap_err();
        assert!(matches!(err, AttachError::Messaging(_)));
        assert!(out.is_empty());

        let injected_recipient =
            MessageBuilder::new("ci@example.com", "Build ok").to("dev@example.com\nBcc: x@evil.example");
        assert!(write(&injected_recipient, &multipart).is_err());
    }

    #[test]
    fn test_recipient_required_and_validated() {
        let multipart = Multipart::mixed();
        let none = MessageBuilder::new("ci@example.com", "x");
        assert!(write(&none, &multipart)
            .unwrap_err()
            .to_string()
            .contains("no recipients"));

        let bad = MessageBuilder::new("ci@example.com", "x").to("not an address");
        assert!(write(&bad, &multipart)
            .unwrap_err()
            .to_string()
            .contains("invalid address"));
    }

    #[test]
    fn test_base64_lines_are_wrapped() {
        let mut multipart = Multipart::mixed();
        let content: &'static [u8] = &[0xAB; 300];
        multipart.add_body_part(AttachmentEntry::new("blob.bin", Box::new(Fixed(content))).unwrap());
        let builder = MessageBuilder::new("ci@example.com", "x")
            .to("dev@example.com")
            .date(fixed_date());
        let (out, _) = write(&builder, &multipart).unwrap();
        let text = String::from_utf8(out).unwrap();
        assert!(text.lines().all(|l| l.len() <= 998));
        assert!(text.lines().any(|l| l.len() == 76));
        assert!(text.contains("Content-Transfer-Encoding: base64"));
    }

    #[test]
    fn test_unreadable_attachment_is_omitted() {
        let mut multipart = Multipart::mixed();
        multipart.add_body_part(AttachmentEntry::new("gone.log", Box::new(Broken)).unwrap());
        multipart.add_body_part(AttachmentEntry::new("ok.log", Box::new(Fixed(b"ok"))).unwrap());
        let listener = RecordingListener::new();
        let mut out: Vec<u8> = Vec::new();
        let stats = MessageBuilder::new("ci@example.com", "x")
            .to("dev@example.com")
            .date(fixed_date())
            .write_to(&multipart, &mut out, &listener, &|_, _| {})
            .unwrap();
        assert_eq!(stats.attachments, 1);
        assert_eq!(stats.omitted, 1);
        let text = String::from_utf8(out).unwrap();
        assert!(!text.contains("gone.log"));
        assert!(listener.messages(Level::Error)[0].starts_with("Error reading `gone.log'"));
    }

    #[test]
    fn test_message_id_is_stable_for_same_input() {
        let builder = MessageBuilder::new("ci@example.com", "x").date(fixed_date());
        let multipart = Multipart::mixed();
        let id = builder.message_id(&multipart);
        assert_eq!(id, builder.message_id(&multipart));
        assert!(id.starts_with('<') && id.ends_with("@buildmail>"));
        assert_eq!(id.len(), "<@buildmail>".len() + 24);
    }

    #[test]
    fn test_progress_reaches_total() {
        let mut multipart = Multipart::mixed();
        multipart.add_text("text/plain", "a");
        multipart.add_text("text/plain", "b");
        let seen = std::cell::RefCell::new(Vec::new());
        MessageBuilder::new("ci@example.com", "x")
            .to("dev@example.com")
            .write_to(&multipart, &mut Vec::<u8>::new(), &RecordingListener::new(), &|c, t| {
                seen.borrow_mut().push((c, t))
            })
            .unwrap();
        assert_eq!(*seen.borrow(), vec![(0, 2), (1, 2), (2, 2)]);
    }
}
