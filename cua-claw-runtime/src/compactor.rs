//! Log compactor for bounding outbound request size.

use crate::log::{Candidate, InteractionLog};
use tracing::debug;

/// Limits applied when reducing the log to a candidate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CompactionPolicy {
    /// Number of newest items always kept.
    pub keep_tail: usize,
    /// Number of newest screenshot-bearing results kept.
    pub keep_images: usize,
}

impl Default for CompactionPolicy {
    fn default() -> Self {
        Self {
            keep_tail: 8,
            keep_images: 1,
        }
    }
}

/// Structural compactor: selects a bounded subset of the log.
///
/// The result is not guaranteed to satisfy pairing or adjacency; that is the
/// enforcer's job.
#[derive(Debug, Clone, Default)]
pub struct Compactor {
    policy: CompactionPolicy,
}

impl Compactor {
    pub fn new(policy: CompactionPolicy) -> Self {
        Self { policy }
    }

    pub fn policy(&self) -> CompactionPolicy {
        self.policy
    }

    /// Compact using the configured tail length.
    pub fn compact(&self, log: &InteractionLog) -> Candidate {
        self.compact_with_tail(log, self.policy.keep_tail)
    }

    /// Compact with an explicit tail length.
    ///
    /// # Arguments
    /// * `log` - Full interaction log
    /// * `keep_tail` - Length of the contiguous suffix to keep
    ///
    /// # Returns
    /// Candidate holding the tail, the newest user instruction, and at most
    /// `keep_images` screenshot results
    pub fn compact_with_tail(&self, log: &InteractionLog, keep_tail: usize) -> Candidate {
        let start = log.len().saturating_sub(keep_tail);
        let mut candidate = Candidate::from_positions(start..log.len());

        if let Some(user) = log.last_user_position() {
            candidate.insert(user);
        }

        let images: Vec<usize> = candidate
            .positions()
            .filter(|&position| {
                log.get(position)
                    .map(|item| item.has_visual_artifact())
                    .unwrap_or(false)
            })
            .collect();
        let excess = images.len().saturating_sub(self.policy.keep_images);
        for &position in &images[..excess] {
            candidate.remove(position);
        }

        debug!(
            "Compacted {} items to {} (tail {}, dropped {} screenshots)",
            log.len(),
            candidate.len(),
            keep_tail,
            excess
        );

        candidate
    }
}
