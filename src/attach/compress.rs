//! Single-entry archive transform for attachment streams.

use std::io::{Cursor, Read, Write};

use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipWriter};

use crate::error::{AttachError, Result};

/// Wraps a stream into an archive containing one entry.
pub trait Compressor: Send + Sync {
    /// Archive `input` as an entry called `entry_name`, returning the archive bytes as a stream.
    fn wrap(&self, entry_name: &str, input: Box<dyn Read + Send>)
        -> Result<Box<dyn Read + Send>>;
}

/// Builds a deflated zip archive in memory.
#[derive(Debug, Clone, Copy)]
pub struct ZipCompressor {
    level: Option<i64>,
}

impl ZipCompressor {
    pub fn new() -> Self {
        Self { level: None }
    }

    /// Deflate level 0-9. `None` uses the library default.
    pub fn with_level(level: Option<i64>) -> Self {
        Self { level }
    }
}

impl Default for ZipCompressor {
    fn default() -> Self {
        Self::new()
    }
}

impl Compressor for ZipCompressor {
    fn wrap(
        &self,
        entry_name: &str,
        mut input: Box<dyn Read + Send>,
    ) -> Result<Box<dyn Read + Send>> {
        let options = SimpleFileOptions::default()
            .compression_method(CompressionMethod::Deflated)
            .compression_level(self.level)
            .large_file(true);

        let mut writer = ZipWriter::new(Cursor::new(Vec::<u8>::new()));
        writer.start_file(entry_name, options)?;
        std::io::copy(&mut input, &mut writer)
            .map_err(|e| AttachError::Compression(format!("writing '{entry_name}': {e}")))?;
        writer.flush()?;
        let mut archive = writer.finish()?;
        archive.set_position(0);
        Ok(Box::new(archive))
    }
}
