//! Snapshot-based undo/redo.
//!
//! Snapshots are shared behind [`Arc`] so handing one back to the caller on
//! undo never copies the state.

use std::sync::Arc;

/// Linear history of immutable snapshots with a cursor.
///
/// `entries[cursor]` is the current state. Pushing while the cursor is not
/// at the end discards the redo tail.
#[derive(Debug, Clone)]
pub struct EditHistory<T> {
    entries: Vec<Arc<T>>,
    cursor: usize,
    capacity: usize,
}

impl<T> EditHistory<T> {
    /// Start a history at `initial`. A `capacity` below 1 is raised to 1.
    pub fn new(initial: T, capacity: usize) -> Self {
        Self {
            entries: vec![Arc::new(initial)],
            cursor: 0,
            capacity: capacity.max(1),
        }
    }

    /// Record a new state after the cursor.
    pub fn push(&mut self, snapshot: T) {
        self.entries.truncate(self.cursor + 1);
        self.entries.push(Arc::new(snapshot));
        if self.entries.len() > self.capacity {
            let excess = self.entries.len() - self.capacity;
            self.entries.drain(..excess);
        }
        self.cursor = self.entries.len() - 1;
    }

    /// Step back one state. `None` when already at the oldest entry.
    pub fn undo(&mut self) -> Option<Arc<T>> {
        if !self.can_undo() {
            return None;
        }
        self.cursor -= 1;
        Some(self.current())
    }

    /// Step forward one state. `None` when already at the newest entry.
    pub fn redo(&mut self) -> Option<Arc<T>> {
        if !self.can_redo() {
            return None;
        }
        self.cursor += 1;
        Some(self.current())
    }

    pub fn can_undo(&self) -> bool {
        self.cursor > 0
    }

    pub fn can_redo(&self) -> bool {
        self.cursor + 1 < self.entries.len()
    }

    pub fn current(&self) -> Arc<T> {
        Arc::clone(&self.entries[self.cursor])
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn cursor(&self) -> usize {
        self.cursor
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_undo_redo_walks_the_cursor() {
        let mut history = EditHistory::new(0, 10);
        history.push(1);
        history.push(2);

        assert_eq!(*history.undo().unwrap(), 1);
        assert_eq!(*history.undo().unwrap(), 0);
        assert!(history.undo().is_none());
        assert_eq!(*history.current(), 0);

        assert_eq!(*history.redo().unwrap(), 1);
        assert_eq!(*history.redo().unwrap(), 2);
        assert!(history.redo().is_none());
    }

    #[test]
    fn test_push_discards_redo_tail() {
        let mut history = EditHistory::new("a", 10);
        history.push("b");
        history.push("c");
        history.undo();
        history.undo();
        history.push("d");

        assert_eq!(history.len(), 2);
        assert!(!history.can_redo());
        assert_eq!(*history.undo().unwrap(), "a");
    }

    #[test]
    fn test_capacity_drops_oldest() {
        let mut history = EditHistory::new(0, 3);
        for i in 1..=5 {
            history.push(i);
        }
        assert_eq!(history.len(), 3);
        assert_eq!(history.cursor(), 2);
        assert_eq!(*history.undo().unwrap(), 4);
        assert_eq!(*history.undo().unwrap(), 3);
        assert!(history.undo().is_none());
    }

    #[test]
    fn test_undo_shares_snapshots() {
        let mut history = EditHistory::new(vec![1, 2, 3], 4);
        history.push(vec![4]);
        let a = history.undo().unwrap();
        let b = history.current();
        assert!(Arc::ptr_eq(&a, &b));
    }
}
