//! The build log as a single, optionally compressed attachment.

use std::fs::File;
use std::io::{Cursor, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, LazyLock};

use regex::bytes::Regex;
use tracing::debug;

use crate::compose::Multipart;
use crate::error::{AttachError, Result};
use crate::listener::Listener;
use crate::model::attachment::{AttachmentEntry, ContentSource};
use crate::model::budget::SizeBudget;

use super::compress::{Compressor, ZipCompressor};

/// Name of the plain log attachment, and of the entry inside the archive.
pub const LOG_NAME: &str = "build.log";

/// Name of the compressed log attachment.
pub const COMPRESSED_LOG_NAME: &str = "build.zip";

/// Hidden console annotations: `ESC[8mha:<payload>ESC[0m`.
static CONSOLE_NOTE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?-u)\x1b\[8mha:[^\x1b]*\x1b\[0m").expect("console note regex is valid")
});

/// Access to a build's console log.
pub trait BuildLog: Send + Sync {
    /// Length of the raw log as stored, before rendering.
    fn raw_length(&self) -> Result<u64>;

    /// Write the rendered log text starting at byte `offset` of the raw log.
    fn write_log_to(&self, offset: u64, sink: &mut dyn Write) -> Result<()>;
}

/// A console log stored in a file.
///
/// Rendering removes console annotations, so the text written can be
/// shorter than [`BuildLog::raw_length`].
#[derive(Debug, Clone)]
pub struct FileBuildLog {
    path: PathBuf,
}

impl FileBuildLog {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl BuildLog for FileBuildLog {
    fn raw_length(&self) -> Result<u64> {
        std::fs::metadata(&self.path)
            .map(|m| m.len())
            .map_err(|e| AttachError::io(&self.path, e))
    }

    fn write_log_to(&self, offset: u64, sink: &mut dyn Write) -> Result<()> {
        let mut file = File::open(&self.path).map_err(|e| AttachError::io(&self.path, e))?;
        file.seek(SeekFrom::Start(offset))
            .map_err(|e| AttachError::io(&self.path, e))?;
        let mut raw = Vec::new();
        file.read_to_end(&mut raw)
            .map_err(|e| AttachError::io(&self.path, e))?;

        let text = CONSOLE_NOTE.replace_all(&raw, &b""[..]);
        debug!(
            path = %self.path.display(),
            raw = raw.len(),
            rendered = text.len(),
            "Rendered build log"
        );
        sink.write_all(&text)
            .map_err(|e| AttachError::io(&self.path, e))?;
        Ok(())
    }
}

/// Renders the whole log into memory each time it is opened.
struct RenderedLog {
    log: Arc<dyn BuildLog>,
    compressor: Option<Arc<dyn Compressor>>,
}

impl ContentSource for RenderedLog {
    fn open(&self) -> Result<Box<dyn Read + Send>> {
        let mut buf: Vec<u8> = Vec::new();
        self.log.write_log_to(0, &mut buf)?;
        let stream: Box<dyn Read + Send> = Box::new(Cursor::new(buf));
        match &self.compressor {
            Some(compressor) => compressor.wrap(LOG_NAME, stream),
            None => Ok(stream),
        }
    }
}

/// Produces the build log attachment.
pub struct LogAttachmentBuilder {
    compressor: Arc<dyn Compressor>,
}

impl LogAttachmentBuilder {
    /// Builder compressing with [`ZipCompressor`].
    pub fn new() -> Self {
        Self::with_compressor(Arc::new(ZipCompressor::new()))
    }

    pub fn with_compressor(compressor: Arc<dyn Compressor>) -> Self {
        Self { compressor }
    }

    /// Build the log entry.
    ///
    /// Returns `Ok(None)` when the raw log alone reaches the ceiling. The
    /// check uses the uncompressed length even when `compress` is set, and
    /// compares against the ceiling only: the log does not draw on the
    /// running total of other attachments.
    pub fn build(
        &self,
        log: Arc<dyn BuildLog>,
        budget: &SizeBudget,
        compress: bool,
        listener: &dyn Listener,
    ) -> Result<Option<AttachmentEntry>> {
        let raw_length = log.raw_length()?;
        if budget.exceeds_ceiling(raw_length) {
            listener.info(
                "Skipping build log attachment - too large for maximum attachments size",
            );
            return Ok(None);
        }

        if compress {
            listener.info("Request made to compress build log");
        }

        let source = RenderedLog {
            log,
            compressor: compress.then(|| Arc::clone(&self.compressor)),
        };
        let name = if compress { COMPRESSED_LOG_NAME } else { LOG_NAME };
        AttachmentEntry::new(name, Box::new(source)).map(Some)
    }

    /// Build the log entry and append it to `multipart`.
    ///
    /// Never fails: problems are reported to `listener` and the attachment
    /// is left out. Returns `true` if a part was added.
    pub fn attach(
        &self,
        multipart: &mut Multipart,
        log: Arc<dyn BuildLog>,
        budget: &SizeBudget,
        compress: bool,
        listener: &dyn Listener,
    ) -> bool {
        match self.build(log, budget, compress, listener) {
            Ok(Some(entry)) => {
                multipart.add_body_part(entry);
                true
            }
            Ok(None) => false,
            Err(e) => {
                listener.error(&format!("Error attaching build log to message: {e}"));
                false
            }
        }
    }
}

impl Default for LogAttachmentBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::listener::{Level, RecordingListener};

    /// In-memory log with a configurable raw length.
    struct MemoryLog {
        text: &'static str,
        raw_length: u64,
    }

    impl BuildLog for MemoryLog {
        fn raw_length(&self) -> Result<u64> {
            Ok(self.raw_length)
        }

        fn write_log_to(&self, offset: u64, sink: &mut dyn Write) -> Result<()> {
            sink.write_all(&self.text.as_bytes()[offset as usize..])?;
            Ok(())
        }
    }

    fn log(text: &'static str) -> Arc<dyn BuildLog> {
        Arc::new(MemoryLog {
            text,
            raw_length: text.len() as u64,
        })
    }

    fn read_all(entry: &AttachmentEntry) -> Vec<u8> {
        let mut buf = Vec::new();
        entry.open_stream().unwrap().read_to_end(&mut buf).unwrap();
        buf
    }

    #[test]
    fn test_plain_log() {
        let listener = RecordingListener::new();
        let entry = LogAttachmentBuilder::new()
            .build(log("Started\nFinished: SUCCESS\n"), &SizeBudget::unlimited(), false, &listener)
            .unwrap()
            .unwrap();
        assert_eq!(entry.name(), "build.log");
        assert_eq!(entry.content_type(), "text/plain");
        assert_eq!(read_all(&entry), b"Started\nFinished: SUCCESS\n");
        assert!(listener.diagnostics().is_empty());
    }

    #[test]
    fn test_compressed_log_holds_single_build_log_entry() {
        let listener = RecordingListener::new();
        let text = "0123456789012345678901234567890123456789012345678\n";
        assert_eq!(text.len(), 50);
        let entry = LogAttachmentBuilder::new()
            .build(log(text), &SizeBudget::new(0), true, &listener)
            .unwrap()
            .unwrap();
        assert_eq!(entry.name(), "build.zip");
        assert_eq!(entry.content_type(), "application/zip");
        assert_eq!(
            listener.messages(Level::Info),
            vec!["Request made to compress build log"]
        );

        let mut archive = zip::ZipArchive::new(Cursor::new(read_all(&entry))).unwrap();
        assert_eq!(archive.len(), 1);
        let mut inner = archive.by_index(0).unwrap();
        assert_eq!(inner.name(), "build.log");
        let mut rendered = String::new();
        inner.read_to_string(&mut rendered).unwrap();
        assert_eq!(rendered, text);
    }

    #[test]
    fn test_skipped_when_raw_length_reaches_ceiling() {
        let listener = RecordingListener::new();
        let oversized: Arc<dyn BuildLog> = Arc::new(MemoryLog {
            text: "tiny",
            raw_length: 4096,
        });
        for compress in [false, true] {
            let built = LogAttachmentBuilder::new()
                .build(Arc::clone(&oversized), &SizeBudget::new(4096), compress, &listener)
                .unwrap();
            assert!(built.is_none());
        }
        assert!(listener.messages(Level::Info)[0].starts_with("Skipping build log attachment"));
        assert!(listener.messages(Level::Error).is_empty());
    }

    #[test]
    fn test_ceiling_ignores_running_total() {
        let mut budget = SizeBudget::new(100);
        budget.commit(90);
        let entry = LogAttachmentBuilder::new()
            .build(log("twenty bytes of log\n"), &budget, false, &RecordingListener::new())
            .unwrap();
        assert!(entry.is_some());
        assert_eq!(budget.used(), 90);
    }

    #[test]
    fn test_attach_reports_errors_and_omits_part() {
        let listener = RecordingListener::new();
        let missing: Arc<dyn BuildLog> = Arc::new(FileBuildLog::new("/no/such/build/log"));
        let mut multipart = Multipart::mixed();
        let added = LogAttachmentBuilder::new().attach(
            &mut multipart,
            missing,
            &SizeBudget::unlimited(),
            false,
            &listener,
        );
        assert!(!added);
        assert!(multipart.is_empty());
        assert!(listener.messages(Level::Error)[0]
            .starts_with("Error attaching build log to message:"));
    }

    #[test]
    fn test_file_log_strips_console_notes() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("log");
        let raw = b"Started by user \x1b[8mha:AAAAlh+LCAAAAAAA/w==\x1b[0madmin\nDone\n";
        std::fs::write(&path, raw).unwrap();

        let file_log = FileBuildLog::new(&path);
        assert_eq!(file_log.raw_length().unwrap(), raw.len() as u64);

        let mut out: Vec<u8> = Vec::new();
        file_log.write_log_to(0, &mut out).unwrap();
        assert_eq!(out, b"Started by user admin\nDone\n");

        let mut tail: Vec<u8> = Vec::new();
        file_log.write_log_to(raw.len() as u64 - 5, &mut tail).unwrap();
        assert_eq!(tail, b"Done\n");
    }
}
