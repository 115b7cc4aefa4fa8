//! Feedback extraction
//!
//! Reviewer-labeled transactions are the only training signal. Sources
//! return them newest first and never return an unlabeled row.

pub mod sqlite;

pub use sqlite::SqliteFeedbackRepository;

use crate::error::Result;
use crate::types::FeedbackRecord;

/// A read-only source of labeled feedback
#[cfg_attr(test, mockall::automock)]
pub trait FeedbackSource {
    /// Fetch every labeled, feedback-flagged record, newest first
    ///
    /// Fails with `DataUnavailable` when there is nothing to train on.
    fn fetch(&self) -> Result<Vec<FeedbackRecord>>;
}

/// Count (fraud, legitimate) labels in a batch
pub fn class_counts(records: &[FeedbackRecord]) -> (usize, usize) {
    let fraud = records.iter().filter(|r| r.label).count();
    (fraud, records.len() - fraud)
}
