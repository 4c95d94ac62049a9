//! Property tests for the evaluation queue invariants.

use std::collections::HashSet;

use proptest::prelude::*;
use quill_core::{CellId, CellKind, CellTree, EvaluationQueue, Worksheet};

#[derive(Debug, Clone)]
enum Op {
    Add(usize),
    AddHidden(usize),
    RemoveFirst,
    Clear,
}

fn op_strategy() -> impl Strategy<Value = Op> {
    prop_oneof![
        4 => (0usize..64).prop_map(Op::Add),
        2 => (0usize..3).prop_map(Op::AddHidden),
        3 => Just(Op::RemoveFirst),
        1 => Just(Op::Clear),
    ]
}

/// Three folded sections with mixed content, followed by loose cells.
fn build_worksheet() -> (Worksheet, Vec<CellId>, Vec<CellId>) {
    let mut sheet = Worksheet::new();
    let mut sections = Vec::new();
    for s in 0..3 {
        let section = sheet.push(CellKind::Section, format!("Section {s}"));
        sheet.push(CellKind::Input, format!("s{s}a"));
        sheet.push(CellKind::Text, "notes");
        sheet.push(CellKind::Input, format!("s{s}b"));
        sections.push(section);
    }
    for &section in &sections {
        sheet.fold(section).unwrap();
    }
    for i in 0..4 {
        sheet.push(CellKind::Input, format!("loose{i}"));
    }
    sheet.push(CellKind::Text, "trailing text");

    let cells = sheet.document_order();
    (sheet, cells, sections)
}

proptest! {
    #[test]
    fn size_agrees_with_walk(ops in prop::collection::vec(op_strategy(), 0..80)) {
        let (sheet, cells, sections) = build_worksheet();
        let mut queue = EvaluationQueue::new();

        for op in ops {
            match op {
                Op::Add(i) => {
                    queue.add_to_queue(&sheet, cells[i % cells.len()]);
                }
                Op::AddHidden(i) => {
                    queue.add_hidden_tree_to_queue(&sheet, sections[i]);
                }
                Op::RemoveFirst => {
                    if !queue.is_empty() {
                        queue.remove_first();
                    }
                }
                Op::Clear => queue.clear(),
            }

            prop_assert_eq!(queue.len(), queue.iter().count());
            prop_assert_eq!(queue.is_empty(), queue.first().is_none());

            let unique: HashSet<CellId> = queue.iter().collect();
            prop_assert_eq!(unique.len(), queue.len());
            prop_assert!(queue.iter().all(|c| sheet.is_input_cell(c)));
            prop_assert!(queue.iter().all(|c| queue.is_in_queue(c)));
        }
    }

    #[test]
    fn fifo_order_for_distinct_cells(n in 1usize..40) {
        let mut sheet = Worksheet::new();
        let cells: Vec<CellId> = (0..n)
            .map(|i| sheet.push(CellKind::Input, format!("c{i}")))
            .collect();

        let mut queue = EvaluationQueue::new();
        for &c in &cells {
            queue.add_to_queue(&sheet, c);
            // Repeats never grow the queue
            queue.add_to_queue(&sheet, c);
        }
        prop_assert_eq!(queue.len(), n);

        let mut drained = Vec::new();
        while let Some(head) = queue.first() {
            drained.push(head);
            queue.remove_first();
        }
        prop_assert_eq!(drained, cells);
        prop_assert!(queue.is_empty());
    }
}
