//! Build workspace access.
//!
//! The collector only sees these traits, so a workspace may live on the
//! local disk or behind a remote agent connection.

pub mod local;

use std::fmt;
use std::io::Read;
use std::sync::Arc;

use crate::error::Result;
use crate::model::attachment::ContentSource;

pub use local::LocalWorkspace;

/// A build's working directory.
pub trait Workspace: Send + Sync {
    /// All files matching a single glob pattern, in provider order.
    ///
    /// An empty result is not an error.
    fn list(&self, pattern: &str) -> Result<Vec<Arc<dyn WorkspaceFile>>>;
}

/// A file inside a workspace.
pub trait WorkspaceFile: Send + Sync + fmt::Debug {
    /// Base name, used as the attachment name.
    fn name(&self) -> &str;

    /// Full location for diagnostics.
    fn remote(&self) -> String;

    /// Current length in bytes.
    fn length(&self) -> Result<u64>;

    fn open_read(&self) -> Result<Box<dyn Read + Send>>;
}

/// Content source that reopens a workspace file every time it is read.
pub struct FileSource(pub Arc<dyn WorkspaceFile>);

impl ContentSource for FileSource {
    fn open(&self) -> Result<Box<dyn Read + Send>> {
        self.0.open_read()
    }
}
