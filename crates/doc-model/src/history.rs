//! Snapshot-based undo/redo over two bounded stacks.

use std::collections::VecDeque;

/// Maximum number of undo steps kept.
pub const HISTORY_DEPTH: usize = 10;

/// Undo/redo stacks of full snapshots.
///
/// The oldest undo entry is evicted once `depth` is exceeded. Recording a new
/// snapshot always clears the redo stack.
#[derive(Debug, Clone)]
pub struct History<S> {
    undo: VecDeque<S>,
    redo: VecDeque<S>,
    depth: usize,
}

impl<S> History<S> {
    pub fn new() -> Self {
        Self::with_depth(HISTORY_DEPTH)
    }

    /// A depth of zero is bumped to one so undo always has room for a step.
    pub fn with_depth(depth: usize) -> Self {
        Self { undo: VecDeque::new(), redo: VecDeque::new(), depth: depth.max(1) }
    }

    pub fn depth(&self) -> usize {
        self.depth
    }

    /// Push the pre-mutation state and invalidate redo.
    pub fn record_before_mutation(&mut self, current: S) {
        push_bounded(&mut self.undo, current, self.depth);
        self.redo.clear();
    }

    /// Pop the latest undo snapshot, parking `current` on the redo stack.
    /// `None` means there is nothing to undo and nothing changed.
    pub fn undo(&mut self, current: S) -> Option<S> {
        let previous = self.undo.pop_back()?;
        push_bounded(&mut self.redo, current, self.depth);
        Some(previous)
    }

    /// Symmetric to [`History::undo`].
    pub fn redo(&mut self, current: S) -> Option<S> {
        let next = self.redo.pop_back()?;
        push_bounded(&mut self.undo, current, self.depth);
        Some(next)
    }

    pub fn can_undo(&self) -> bool {
        !self.undo.is_empty()
    }

    pub fn can_redo(&self) -> bool {
        !self.redo.is_empty()
    }

    pub fn undo_len(&self) -> usize {
        self.undo.len()
    }

    pub fn redo_len(&self) -> usize {
        self.redo.len()
    }

    pub fn clear(&mut self) {
        self.undo.clear();
        self.redo.clear();
    }
}

impl<S> Default for History<S> {
    fn default() -> Self {
        Self::new()
    }
}

fn push_bounded<S>(stack: &mut VecDeque<S>, value: S, depth: usize) {
    stack.push_back(value);
    while stack.len() > depth {
        stack.pop_front();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn undo_on_empty_history_is_none() {
        let mut history: History<u32> = History::new();
        assert_eq!(history.undo(7), None);
        assert!(!history.can_redo());
    }

    #[test]
    fn undo_then_redo_swaps_snapshots() {
        let mut history = History::new();
        history.record_before_mutation(1);

        assert_eq!(history.undo(2), Some(1));
        assert_eq!(history.redo(1), Some(2));
        assert_eq!(history.undo_len(), 1);
        assert_eq!(history.redo_len(), 0);
    }

    #[test]
    fn recording_clears_redo() {
        let mut history = History::new();
        history.record_before_mutation(1);
        history.undo(2);
        assert!(history.can_redo());

        history.record_before_mutation(1);
        assert!(!history.can_redo());
    }

    #[test]
    fn oldest_entries_are_evicted_past_depth() {
        let mut history = History::new();
        for state in 0..15 {
            history.record_before_mutation(state);
        }
        assert_eq!(history.undo_len(), HISTORY_DEPTH);

        let mut current = 15;
        let mut undone = Vec::new();
        while let Some(previous) = history.undo(current) {
            undone.push(previous);
            current = previous;
        }
        assert_eq!(undone, vec![14, 13, 12, 11, 10, 9, 8, 7, 6, 5]);
    }

    #[test]
    fn custom_depth_is_respected() {
        let mut history = History::with_depth(2);
        for state in 0..5 {
            history.record_before_mutation(state);
        }
        assert_eq!(history.undo_len(), 2);
        assert_eq!(History::<u8>::with_depth(0).depth(), 1);
    }
}
