//! Attachment collection: workspace files and the build log.
//!
//! Everything here degrades to "fewer attachments": problems become
//! diagnostics on the [`Listener`] and the notification still goes out.

pub mod build_log;
pub mod compress;

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tracing::debug;

use crate::compose::Multipart;
use crate::error::{AttachError, Result};
use crate::listener::Listener;
use crate::model::attachment::{AttachmentEntry, AttachmentSpec};
use crate::model::budget::{Admission, SizeBudget};
use crate::template::TemplateExpander;
use crate::workspace::{FileSource, Workspace, WorkspaceFile};

pub use build_log::{BuildLog, FileBuildLog, LogAttachmentBuilder};
pub use compress::{Compressor, ZipCompressor};

/// Shared cancellation signal, e.g. tripped when the build is aborted.
#[derive(Debug, Clone, Default)]
pub struct CancelFlag(Arc<AtomicBool>);

impl CancelFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }

    /// `Err(Interrupted)` once cancelled.
    pub fn check(&self) -> Result<()> {
        if self.is_cancelled() {
            Err(AttachError::Interrupted)
        } else {
            Ok(())
        }
    }
}

/// Collaborators for one notification.
pub struct AttachContext<'a> {
    /// `None` when no workspace was resolved for the build.
    pub workspace: Option<&'a dyn Workspace>,
    pub expander: &'a dyn TemplateExpander,
    pub listener: &'a dyn Listener,
    pub cancel: CancelFlag,
}

impl<'a> AttachContext<'a> {
    pub fn new(
        workspace: Option<&'a dyn Workspace>,
        expander: &'a dyn TemplateExpander,
        listener: &'a dyn Listener,
    ) -> Self {
        Self {
            workspace,
            expander,
            listener,
            cancel: CancelFlag::new(),
        }
    }

    pub fn with_cancel(mut self, cancel: CancelFlag) -> Self {
        self.cancel = cancel;
        self
    }
}

/// Why a file was left out.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SkipReason {
    TooLarge { size: u64 },
}

/// What happened to a single candidate file.
#[derive(Debug)]
pub enum FileOutcome {
    Attached(AttachmentEntry),
    Skipped(SkipReason),
    /// The entry could not be built; carries the failure message.
    Failed(String),
}

/// Resolves an attachment pattern into entries within a size budget.
#[derive(Debug, Clone)]
pub struct AttachmentCollector {
    spec: AttachmentSpec,
}

impl AttachmentCollector {
    pub fn new(spec: AttachmentSpec) -> Self {
        Self { spec }
    }

    pub fn spec(&self) -> &AttachmentSpec {
        &self.spec
    }

    /// Collect entries, reporting every problem to the listener.
    ///
    /// On an I/O error the entries gathered before it are returned. On
    /// interruption nothing is returned and the budget is put back to
    /// where it was before the call.
    pub fn collect(&self, ctx: &AttachContext<'_>, budget: &mut SizeBudget) -> Vec<AttachmentEntry> {
        let checkpoint = budget.checkpoint();
        let mut entries = Vec::new();
        match self.try_collect(ctx, budget, &mut entries) {
            Ok(()) => entries,
            Err(AttachError::Interrupted) => {
                ctx.listener.error(&format!(
                    "Interrupted in processing attachments: {}",
                    AttachError::Interrupted
                ));
                budget.restore(checkpoint);
                Vec::new()
            }
            Err(e) => {
                ctx.listener
                    .error(&format!("Error accessing files to attach: {e}"));
                entries
            }
        }
    }

    /// Collect and append every entry to `multipart`. Returns how many were added.
    pub fn attach(
        &self,
        multipart: &mut Multipart,
        ctx: &AttachContext<'_>,
        budget: &mut SizeBudget,
    ) -> usize {
        let entries = self.collect(ctx, budget);
        let count = entries.len();
        for entry in entries {
            multipart.add_body_part(entry);
        }
        count
    }

    /// Collect entries into `out`, stopping at the first I/O error or interruption.
    ///
    /// Missing workspace, blank patterns, patterns without matches, invalid
    /// globs and files over budget are reported and skipped.
    pub fn try_collect(
        &self,
        ctx: &AttachContext<'_>,
        budget: &mut SizeBudget,
        out: &mut Vec<AttachmentEntry>,
    ) -> Result<()> {
        let Some(workspace) = ctx.workspace else {
            ctx.listener
                .error(&format!("Error: {}!", AttachError::NoWorkspace));
            return Ok(());
        };
        if self.spec.is_blank() {
            return Ok(());
        }

        let expanded = ctx.expander.expand(self.spec.pattern());
        debug!(raw = self.spec.pattern(), expanded = %expanded, "Expanded attachment pattern");

        for pattern in AttachmentSpec::sub_patterns(&expanded) {
            ctx.cancel.check()?;

            let files = match workspace.list(pattern) {
                Ok(files) => files,
                Err(e @ AttachError::InvalidPattern { .. }) => {
                    ctx.listener.error(&e.to_string());
                    continue;
                }
                Err(e) => return Err(e),
            };

            if files.is_empty() {
                ctx.listener
                    .info(&format!("No file(s) found to attach for {pattern}"));
                continue;
            }

            for file in files {
                ctx.cancel.check()?;
                match consider(&file, budget)? {
                    FileOutcome::Attached(entry) => {
                        out.push(entry);
                        ctx.listener
                            .info(&format!("File {} was attached", file.remote()));
                    }
                    FileOutcome::Skipped(SkipReason::TooLarge { size }) => {
                        ctx.listener.info(&format!(
                            "Skipping `{}' ({size} bytes) - too large for maximum attachments size",
                            file.name()
                        ));
                    }
                    FileOutcome::Failed(message) => {
                        ctx.listener.info(&format!(
                            "Error adding `{}' as attachment - {message}",
                            file.name()
                        ));
                    }
                }
            }
        }
        Ok(())
    }
}

/// Decide a single file against the budget. Only I/O errors escape.
fn consider(file: &Arc<dyn WorkspaceFile>, budget: &mut SizeBudget) -> Result<FileOutcome> {
    let size = file.length()?;
    if let Admission::Rejected { .. } = budget.check(size) {
        return Ok(FileOutcome::Skipped(SkipReason::TooLarge { size }));
    }

    match AttachmentEntry::new(file.name(), Box::new(FileSource(Arc::clone(file)))) {
        Ok(entry) => {
            budget.commit(size);
            Ok(FileOutcome::Attached(entry.with_content_id().with_size(size)))
        }
        Err(e) => Ok(FileOutcome::Failed(e.to_string())),
    }
}
