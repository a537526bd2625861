//! Cumulative attachment size accounting.

/// Source of the configured attachment ceiling.
pub trait SizeLimit {
    /// Maximum total attachment size in bytes. Zero or negative means unlimited.
    fn max_attachment_size(&self) -> i64;
}

impl SizeLimit for i64 {
    fn max_attachment_size(&self) -> i64 {
        *self
    }
}

/// Result of asking a [`SizeBudget`] whether a candidate fits.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Admission {
    Accepted,
    /// Adding the candidate would reach or exceed the ceiling.
    Rejected { size: u64, used: u64, ceiling: u64 },
}

/// Running total of attached bytes against a fixed ceiling.
///
/// One budget is shared by every pattern and file of a single notification,
/// so the ceiling applies to the sum of all attachments. A candidate is
/// admitted only if `ceiling <= 0` or `used + size < ceiling`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SizeBudget {
    ceiling: i64,
    used: u64,
}

/// Snapshot of [`SizeBudget::used`] that can be restored later.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Checkpoint(u64);

impl SizeBudget {
    pub fn new(ceiling: i64) -> Self {
        Self { ceiling, used: 0 }
    }

    /// A budget that admits everything.
    pub fn unlimited() -> Self {
        Self::new(0)
    }

    pub fn from_limit(limit: &dyn SizeLimit) -> Self {
        Self::new(limit.max_attachment_size())
    }

    /// The ceiling in bytes, or `None` when unlimited.
    pub fn ceiling(&self) -> Option<u64> {
        if self.ceiling > 0 {
            Some(self.ceiling as u64)
        } else {
            None
        }
    }

    pub fn is_unlimited(&self) -> bool {
        self.ceiling().is_none()
    }

    /// Bytes committed so far.
    pub fn used(&self) -> u64 {
        self.used
    }

    /// Check a candidate without committing it.
    pub fn check(&self, size: u64) -> Admission {
        match self.ceiling() {
            None => Admission::Accepted,
            Some(ceiling) => {
                if self.used.saturating_add(size) < ceiling {
                    Admission::Accepted
                } else {
                    Admission::Rejected {
                        size,
                        used: self.used,
                        ceiling,
                    }
                }
            }
        }
    }

    /// Add an accepted candidate to the running total.
    pub fn commit(&mut self, size: u64) {
        self.used = self.used.saturating_add(size);
    }

    /// True if a single item of `size` bytes alone reaches the ceiling.
    pub fn exceeds_ceiling(&self, size: u64) -> bool {
        self.ceiling().is_some_and(|ceiling| size >= ceiling)
    }

    pub fn checkpoint(&self) -> Checkpoint {
        Checkpoint(self.used)
    }

    pub fn restore(&mut self, checkpoint: Checkpoint) {
        self.used = checkpoint.0;
    }
}

impl Default for SizeBudget {
    fn default() -> Self {
        Self::unlimited()
    }
}
