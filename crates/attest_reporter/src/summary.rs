use attest_types::Status;

/// Tally of written results by status.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, serde::Serialize)]
pub struct RunSummary {
    pub passed: usize,
    pub failed: usize,
    pub broken: usize,
    pub skipped: usize,
}

impl RunSummary {
    /// Counts a result. A result written without a status counts as broken.
    pub fn record(&mut self, status: Option<Status>) {
        match status {
            Some(Status::Passed) => self.passed += 1,
            Some(Status::Failed) => self.failed += 1,
            Some(Status::Broken) | None => self.broken += 1,
            Some(Status::Skipped) => self.skipped += 1,
        }
    }

    #[must_use]
    pub const fn total(&self) -> usize {
        self.passed + self.failed + self.broken + self.skipped
    }

    #[must_use]
    pub const fn is_success(&self) -> bool {
        self.failed == 0 && self.broken == 0
    }
}
