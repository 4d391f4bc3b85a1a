//! Append-only interaction log and request candidates.

use crate::types::InteractionItem;
use serde::Serialize;
use std::collections::BTreeSet;

/// Authoritative history of one session.
///
/// Items are only ever appended. A position, once assigned, always names the
/// same item, which is what lets candidates refer to items by position.
#[derive(Debug, Clone, Default, Serialize)]
#[serde(transparent)]
pub struct InteractionLog {
    items: Vec<InteractionItem>,
}

impl InteractionLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a log from previously recorded items.
    pub fn from_items(items: Vec<InteractionItem>) -> Self {
        Self { items }
    }

    /// Append an item and return its position.
    pub fn push(&mut self, item: InteractionItem) -> usize {
        self.items.push(item);
        self.items.len() - 1
    }

    pub fn items(&self) -> &[InteractionItem] {
        &self.items
    }

    pub fn get(&self, position: usize) -> Option<&InteractionItem> {
        self.items.get(position)
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn last(&self) -> Option<&InteractionItem> {
        self.items.last()
    }

    /// True when the newest item is an assistant message.
    pub fn is_terminal(&self) -> bool {
        self.last().map(InteractionItem::is_terminal).unwrap_or(false)
    }

    /// Position of the newest user instruction.
    pub fn last_user_position(&self) -> Option<usize> {
        self.items.iter().rposition(InteractionItem::is_user_message)
    }

    /// Text of the newest assistant message, if the log ends with one.
    pub fn final_message(&self) -> Option<String> {
        self.last()
            .filter(|item| item.is_terminal())
            .and_then(InteractionItem::message_text)
    }

    /// Copies of all items with image data omitted.
    pub fn redacted(&self) -> Vec<InteractionItem> {
        self.items.iter().map(InteractionItem::redacted).collect()
    }
}

/// Subset of log positions proposed for one outbound request.
///
/// Positions are kept sorted, so any materialized request preserves the
/// log's relative order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Candidate {
    positions: BTreeSet<usize>,
}

impl Candidate {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every position of a log with `len` items.
    pub fn full(len: usize) -> Self {
        Self {
            positions: (0..len).collect(),
        }
    }

    pub fn from_positions(positions: impl IntoIterator<Item = usize>) -> Self {
        Self {
            positions: positions.into_iter().collect(),
        }
    }

    pub fn contains(&self, position: usize) -> bool {
        self.positions.contains(&position)
    }

    /// Returns true if the position was not already present.
    pub fn insert(&mut self, position: usize) -> bool {
        self.positions.insert(position)
    }

    pub fn remove(&mut self, position: usize) -> bool {
        self.positions.remove(&position)
    }

    pub fn len(&self) -> usize {
        self.positions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.positions.is_empty()
    }

    /// Positions in ascending log order.
    pub fn positions(&self) -> impl Iterator<Item = usize> + '_ {
        self.positions.iter().copied()
    }

    /// Resolve positions against the log, skipping any that are out of range.
    pub fn materialize(&self, log: &InteractionLog) -> Vec<InteractionItem> {
        self.positions
            .iter()
            .filter_map(|&position| log.get(position).cloned())
            .collect()
    }

    /// Number of image-bearing results in the candidate.
    pub fn visual_artifacts(&self, log: &InteractionLog) -> usize {
        self.positions
            .iter()
            .filter_map(|&position| log.get(position))
            .filter(|item| item.has_visual_artifact())
            .count()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
mod tests {
    use super::*;

    #[test]
    fn test_push_returns_position() {
        let mut log = InteractionLog::new();
        assert_eq!(log.push(InteractionItem::user("first")), 0);
        assert_eq!(log.push(InteractionItem::assistant("second")), 1);
        assert_eq!(log.len(), 2);
    }

    #[test]
    fn test_terminal_detection() {
        let mut log = InteractionLog::new();
        assert!(!log.is_terminal());
        log.push(InteractionItem::user("go"));
        assert!(!log.is_terminal());
        log.push(InteractionItem::assistant("done"));
        assert!(log.is_terminal());
        assert_eq!(log.final_message().unwrap(), "done");
    }

    #[test]
    fn test_last_user_position() {
        let log = InteractionLog::from_items(vec![
            InteractionItem::user("one"),
            InteractionItem::assistant("ok"),
            InteractionItem::user("two"),
            InteractionItem::assistant("ok"),
        ]);
        assert_eq!(log.last_user_position(), Some(2));
    }

    #[test]
    fn test_candidate_materializes_in_log_order() {
        let log = InteractionLog::from_items(vec![
            InteractionItem::user("a"),
            InteractionItem::assistant("b"),
            InteractionItem::user("c"),
        ]);
        let candidate = Candidate::from_positions([2, 0]);
        let items = candidate.materialize(&log);
        assert_eq!(items.len(), 2);
        assert_eq!(items[0].message_text().unwrap(), "a");
        assert_eq!(items[1].message_text().unwrap(), "c");
    }

    #[test]
    fn test_full_candidate() {
        let candidate = Candidate::full(3);
        assert_eq!(candidate.positions().collect::<Vec<_>>(), vec![0, 1, 2]);
    }
}
