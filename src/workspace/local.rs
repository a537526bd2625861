//! Workspace backed by a directory on the local filesystem.
//!
//! Patterns use Ant-style semantics relative to the workspace root:
//! `*` and `?` stay within one path segment, `**` spans directories, and a
//! trailing `/` means "everything below".
//!
//! Symlinks to files are listed under the link's own name. Symlinked
//! directories are not descended into, and unreadable subdirectories are
//! skipped.

use std::fs::File;
use std::io::{BufReader, Read};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use globset::{Glob, GlobBuilder, GlobMatcher, GlobSet, GlobSetBuilder};
use tracing::debug;
use walkdir::{DirEntry, WalkDir};

use crate::error::{AttachError, Result};

use super::{Workspace, WorkspaceFile};

/// Directories never descended into when default excludes are on.
const EXCLUDED_DIRS: &[&str] = &[".git", ".svn", ".hg", ".bzr", "CVS", "SCCS", "_darcs"];

/// File patterns ignored when default excludes are on.
const EXCLUDED_FILES: &[&str] = &[
    "**/*~",
    "**/#*#",
    "**/.#*",
    "**/%*%",
    "**/._*",
    "**/.DS_Store",
    "**/.cvsignore",
    "**/vssver.scc",
    "**/.gitattributes",
    "**/.gitignore",
    "**/.gitmodules",
    "**/.hgignore",
    "**/.hgsub",
    "**/.hgsubstate",
    "**/.hgtags",
    "**/.bzrignore",
];

/// A workspace rooted at a local directory.
#[derive(Debug, Clone)]
pub struct LocalWorkspace {
    root: PathBuf,
    excludes: Option<GlobSet>,
}

impl LocalWorkspace {
    /// Open a workspace with the usual VCS and editor files excluded.
    pub fn open(root: impl AsRef<Path>) -> Result<Self> {
        Self::with_default_excludes(root, true)
    }

    pub fn with_default_excludes(root: impl AsRef<Path>, default_excludes: bool) -> Result<Self> {
        let root = root.as_ref().to_path_buf();
        let meta = std::fs::metadata(&root).map_err(|e| AttachError::io(&root, e))?;
        if !meta.is_dir() {
            return Err(AttachError::io(
                &root,
                std::io::Error::new(std::io::ErrorKind::NotADirectory, "not a directory"),
            ));
        }

        let excludes = if default_excludes {
            let mut builder = GlobSetBuilder::new();
            for pattern in EXCLUDED_FILES {
                builder.add(Glob::new(pattern).map_err(|e| invalid(pattern, e))?);
            }
            Some(builder.build().map_err(|e| invalid("default excludes", e))?)
        } else {
            None
        };

        Ok(Self { root, excludes })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn is_excluded(&self, relative: &str) -> bool {
        self.excludes
            .as_ref()
            .is_some_and(|set| set.is_match(relative))
    }
}

impl Workspace for LocalWorkspace {
    fn list(&self, pattern: &str) -> Result<Vec<Arc<dyn WorkspaceFile>>> {
        let matcher = compile(pattern)?;
        let prune = self.excludes.is_some();

        let walker = WalkDir::new(&self.root)
            .follow_links(false)
            .sort_by_file_name()
            .into_iter()
            .filter_entry(|e| {
                !(prune
                    && e.depth() > 0
                    && e.file_type().is_dir()
                    && EXCLUDED_DIRS.iter().any(|d| e.file_name() == *d))
            });

        let mut files: Vec<Arc<dyn WorkspaceFile>> = Vec::new();
        for entry in walker {
            let entry = match entry {
                Ok(entry) => entry,
                Err(e) if e.depth() == 0 => {
                    let path = e.path().unwrap_or(self.root.as_path()).to_path_buf();
                    return Err(AttachError::io(path, e.into()));
                }
                Err(e) => {
                    debug!(error = %e, "Skipping unreadable workspace entry");
                    continue;
                }
            };
            if !is_file(&entry) {
                continue;
            }
            let Ok(rel) = entry.path().strip_prefix(&self.root) else {
                continue;
            };
            let relative = rel.to_string_lossy().replace('\\', "/");
            if matcher.is_match(&relative) && !self.is_excluded(&relative) {
                files.push(Arc::new(LocalFile::new(entry.into_path())));
            }
        }

        debug!(
            root = %self.root.display(),
            pattern = pattern,
            count = files.len(),
            "Listed workspace files"
        );
        Ok(files)
    }
}

/// Regular files, and symlinks whose target is a regular file.
fn is_file(entry: &DirEntry) -> bool {
    entry.file_type().is_file() || (entry.path_is_symlink() && entry.path().is_file())
}

/// Normalize an Ant-style pattern and compile it.
fn compile(pattern: &str) -> Result<GlobMatcher> {
    let mut normalized = pattern.trim().replace('\\', "/");
    while let Some(rest) = normalized.strip_prefix("./") {
        normalized = rest.to_string();
    }
    if normalized.ends_with('/') {
        normalized.push_str("**");
    }
    let glob = GlobBuilder::new(&normalized)
        .literal_separator(true)
        .build()
        .map_err(|e| invalid(pattern, e))?;
    Ok(glob.compile_matcher())
}

fn invalid(pattern: &str, e: globset::Error) -> AttachError {
    AttachError::InvalidPattern {
        pattern: pattern.to_string(),
        reason: e.kind().to_string(),
    }
}

/// A regular file on local disk.
#[derive(Debug, Clone)]
pub struct LocalFile {
    path: PathBuf,
    name: String,
}

impl LocalFile {
    pub fn new(path: PathBuf) -> Self {
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.to_string_lossy().into_owned());
        Self { path, name }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl WorkspaceFile for LocalFile {
    fn name(&self) -> &str {
        &self.name
    }

    fn remote(&self) -> String {
        self.path.display().to_string()
    }

    fn length(&self) -> Result<u64> {
        std::fs::metadata(&self.path)
            .map(|m| m.len())
            .map_err(|e| AttachError::io(&self.path, e))
    }

    fn open_read(&self) -> Result<Box<dyn Read + Send>> {
        let file = File::open(&self.path).map_err(|e| AttachError::io(&self.path, e))?;
        Ok(Box::new(BufReader::new(file)))
    }
}
