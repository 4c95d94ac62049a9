//! FIFO queue of cells waiting to be sent to the engine.
//!
//! The queue stores handles only; the worksheet keeps ownership of the cells.
//! Elements leave exclusively from the head and enter at the tail, one at a
//! time or as a contiguous folded subtree.

use std::collections::VecDeque;

use rustc_hash::FxHashSet;
use tracing::debug;

use crate::document::{CellId, CellTree};

/// Ordered, duplicate-free collection of input cells awaiting dispatch.
#[derive(Debug, Default)]
pub struct EvaluationQueue {
    /// Cells in dispatch order.
    order: VecDeque<CellId>,
    /// Membership index, kept in lockstep with `order`.
    members: FxHashSet<CellId>,
}

impl EvaluationQueue {
    /// Create an empty queue.
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether the cell is currently queued.
    pub fn is_in_queue(&self, cell: CellId) -> bool {
        self.members.contains(&cell)
    }

    /// Append a cell at the tail.
    ///
    /// Non-input cells and cells already in the queue are ignored. Returns
    /// `true` if the cell was added.
    pub fn add_to_queue(&mut self, tree: &impl CellTree, cell: CellId) -> bool {
        if !tree.is_input_cell(cell) || !self.members.insert(cell) {
            return false;
        }
        self.order.push_back(cell);
        true
    }

    /// Append every input cell of the cell's hidden subtree, in document order.
    ///
    /// The cell itself is not enqueued. Returns the number of cells added.
    pub fn add_hidden_tree_to_queue(&mut self, tree: &impl CellTree, cell: CellId) -> usize {
        let mut added = 0;
        for &child in tree.hidden_children(cell) {
            if self.add_to_queue(tree, child) {
                added += 1;
            }
            added += self.add_hidden_tree_to_queue(tree, child);
        }
        if added > 0 {
            debug!("Queued {} cells from hidden tree of {}", added, cell);
        }
        added
    }

    /// Cell at the head, without removing it.
    pub fn first(&self) -> Option<CellId> {
        self.order.front().copied()
    }

    /// Drop the head of the queue.
    ///
    /// # Panics
    ///
    /// Panics if the queue is empty. Callers check [`is_empty`](Self::is_empty)
    /// first; removing from an empty queue is a bug in the caller.
    pub fn remove_first(&mut self) -> CellId {
        let cell = self
            .order
            .pop_front()
            .expect("remove_first called on an empty evaluation queue");
        self.members.remove(&cell);
        cell
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    /// Drop every queued cell. Cell outcomes are left untouched.
    pub fn clear(&mut self) {
        self.order.clear();
        self.members.clear();
    }

    /// Number of queued cells.
    pub fn len(&self) -> usize {
        self.order.len()
    }

    /// Walk the queue from head to tail.
    pub fn iter(&self) -> impl Iterator<Item = CellId> + '_ {
        self.order.iter().copied()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::{CellKind, Worksheet};

    #[test]
    fn test_fifo_order() {
        let mut sheet = Worksheet::new();
        let cells: Vec<_> = (0..4)
            .map(|i| sheet.push(CellKind::Input, format!("c{i}")))
            .collect();

        let mut queue = EvaluationQueue::new();
        for &c in &cells {
            assert!(queue.add_to_queue(&sheet, c));
        }

        let mut drained = Vec::new();
        while let Some(head) = queue.first() {
            drained.push(head);
            queue.remove_first();
        }
        assert_eq!(drained, cells);
        assert!(queue.is_empty());
        assert_eq!(queue.first(), None);
    }

    #[test]
    fn test_duplicate_is_noop() {
        let mut sheet = Worksheet::new();
        let a = sheet.push(CellKind::Input, "a");
        let b = sheet.push(CellKind::Input, "b");

        let mut queue = EvaluationQueue::new();
        queue.add_to_queue(&sheet, a);
        queue.add_to_queue(&sheet, b);
        assert!(!queue.add_to_queue(&sheet, a));

        assert_eq!(queue.len(), 2);
        assert_eq!(queue.iter().collect::<Vec<_>>(), vec![a, b]);
    }

    #[test]
    fn test_non_input_cells_rejected() {
        let mut sheet = Worksheet::new();
        let text = sheet.push(CellKind::Text, "prose");
        let title = sheet.push(CellKind::Title, "Title");

        let mut queue = EvaluationQueue::new();
        assert!(!queue.add_to_queue(&sheet, text));
        assert!(!queue.add_to_queue(&sheet, title));
        assert!(queue.is_empty());
    }

    #[test]
    fn test_hidden_tree_contiguous_after_existing() {
        let mut sheet = Worksheet::new();
        let x = sheet.push(CellKind::Input, "x");
        let section = sheet.push(CellKind::Section, "S");
        let a = sheet.push(CellKind::Input, "a");
        sheet.push(CellKind::Text, "between");
        let b = sheet.push(CellKind::Input, "b");
        let c = sheet.push(CellKind::Input, "c");
        sheet.fold(section).unwrap();

        let mut queue = EvaluationQueue::new();
        queue.add_to_queue(&sheet, x);
        assert_eq!(queue.add_hidden_tree_to_queue(&sheet, section), 3);
        assert_eq!(queue.iter().collect::<Vec<_>>(), vec![x, a, b, c]);
    }

    #[test]
    fn test_hidden_tree_recurses_into_nested_folds() {
        let mut sheet = Worksheet::new();
        let title = sheet.push(CellKind::Title, "T");
        let a = sheet.push(CellKind::Input, "a");
        let sub = sheet.push(CellKind::Section, "S");
        let b = sheet.push(CellKind::Input, "b");
        sheet.fold(sub).unwrap();
        let c = sheet.push(CellKind::Input, "c");
        sheet.fold(title).unwrap();

        let mut queue = EvaluationQueue::new();
        queue.add_hidden_tree_to_queue(&sheet, title);
        assert_eq!(queue.iter().collect::<Vec<_>>(), vec![a, b, c]);
    }

    #[test]
    fn test_hidden_tree_without_children_is_noop() {
        let mut sheet = Worksheet::new();
        let section = sheet.push(CellKind::Section, "empty");
        let input = sheet.push(CellKind::Input, "x");

        let mut queue = EvaluationQueue::new();
        assert_eq!(queue.add_hidden_tree_to_queue(&sheet, section), 0);
        assert_eq!(queue.add_hidden_tree_to_queue(&sheet, input), 0);
        assert!(queue.is_empty());
    }

    #[test]
    fn test_clear_resets_membership() {
        let mut sheet = Worksheet::new();
        let a = sheet.push(CellKind::Input, "a");

        let mut queue = EvaluationQueue::new();
        queue.add_to_queue(&sheet, a);
        queue.clear();

        assert!(queue.is_empty());
        assert_eq!(queue.len(), 0);
        assert!(!queue.is_in_queue(a));
        assert!(queue.add_to_queue(&sheet, a));
    }

    #[test]
    #[should_panic(expected = "empty evaluation queue")]
    fn test_remove_first_on_empty_panics() {
        let mut queue = EvaluationQueue::new();
        queue.remove_first();
    }
}
