//! Arena-backed worksheet tree.

use tracing::debug;

use crate::error::{Error, Result};

use super::cell::{CellId, CellKind, GroupCell};

/// Read access to the worksheet shape.
///
/// This is everything the evaluation queue needs from the document. Handles
/// that no longer resolve behave like leaf, non-input cells.
pub trait CellTree {
    /// Whether the cell carries engine-evaluable input.
    fn is_input_cell(&self, id: CellId) -> bool;

    /// Whether the cell's subtree is currently collapsed.
    fn is_folded(&self, id: CellId) -> bool;

    /// Children of the cell's hidden subtree, in document order.
    fn hidden_children(&self, id: CellId) -> &[CellId];

    /// Whether the cell owns a nested subtree.
    fn has_hidden_children(&self, id: CellId) -> bool {
        !self.hidden_children(id).is_empty()
    }
}

#[derive(Debug)]
struct Slot {
    generation: u32,
    cell: Option<GroupCell>,
}

/// A worksheet: top-level group cells, each heading optionally owning a
/// folded subtree of further group cells.
#[derive(Debug, Default)]
pub struct Worksheet {
    slots: Vec<Slot>,
    free: Vec<u32>,
    top_level: Vec<CellId>,
    len: usize,
}

impl Worksheet {
    /// Create an empty worksheet.
    pub fn new() -> Self {
        Self::default()
    }

    fn alloc(&mut self, kind: CellKind, input: String) -> CellId {
        let id = match self.free.pop() {
            Some(index) => CellId::new(index, self.slots[index as usize].generation),
            None => {
                self.slots.push(Slot {
                    generation: 0,
                    cell: None,
                });
                CellId::new((self.slots.len() - 1) as u32, 0)
            }
        };
        self.slots[id.index()].cell = Some(GroupCell::new(id, kind, input));
        self.len += 1;
        id
    }

    /// Append a cell at the end of the visible document.
    pub fn push(&mut self, kind: CellKind, input: impl Into<String>) -> CellId {
        let id = self.alloc(kind, input.into());
        self.top_level.push(id);
        id
    }

    /// Insert a cell directly after `anchor`, at the same tree level.
    pub fn insert_after(
        &mut self,
        anchor: CellId,
        kind: CellKind,
        input: impl Into<String>,
    ) -> Result<CellId> {
        let parent = self.get(anchor).ok_or(Error::CellNotFound(anchor))?.parent;
        let pos = self.position_in_parent(anchor, parent)?;

        let id = self.alloc(kind, input.into());
        if let Some(cell) = self.get_mut(id) {
            cell.parent = parent;
        }
        self.siblings_mut(parent).insert(pos + 1, id);
        Ok(id)
    }

    /// Remove a cell together with its hidden subtree.
    ///
    /// Every removed handle stops resolving immediately.
    pub fn remove(&mut self, id: CellId) -> Result<GroupCell> {
        let parent = self.get(id).ok_or(Error::CellNotFound(id))?.parent;
        let pos = self.position_in_parent(id, parent)?;
        self.siblings_mut(parent).remove(pos);

        let mut doomed = Vec::new();
        self.collect_subtree(id, &mut doomed);

        let mut removed = None;
        for cell_id in doomed {
            let slot = &mut self.slots[cell_id.index()];
            let cell = slot.cell.take();
            slot.generation = slot.generation.wrapping_add(1);
            self.free.push(cell_id.index);
            self.len -= 1;
            if cell_id == id {
                removed = cell;
            }
        }

        debug!("Removed {} from worksheet", id);
        removed.ok_or(Error::CellNotFound(id))
    }

    /// Look up a cell. Stale handles return `None`.
    pub fn get(&self, id: CellId) -> Option<&GroupCell> {
        self.slots
            .get(id.index())
            .filter(|slot| slot.generation == id.generation)
            .and_then(|slot| slot.cell.as_ref())
    }

    pub(crate) fn get_mut(&mut self, id: CellId) -> Option<&mut GroupCell> {
        self.slots
            .get_mut(id.index())
            .filter(|slot| slot.generation == id.generation)
            .and_then(|slot| slot.cell.as_mut())
    }

    /// Whether the handle still resolves.
    pub fn contains(&self, id: CellId) -> bool {
        self.get(id).is_some()
    }

    /// Visible (top-level) cells in document order.
    pub fn top_level(&self) -> &[CellId] {
        &self.top_level
    }

    /// Folded heading that owns this cell, if any.
    pub fn parent(&self, id: CellId) -> Option<CellId> {
        self.get(id).and_then(|cell| cell.parent)
    }

    /// Replace the input text of a cell.
    pub fn set_input(&mut self, id: CellId, input: impl Into<String>) -> Result<()> {
        let cell = self.get_mut(id).ok_or(Error::CellNotFound(id))?;
        cell.input = input.into();
        Ok(())
    }

    /// Fold a heading: the following siblings up to the next heading of the
    /// same or a higher level move into its hidden subtree.
    ///
    /// Returns `false` if the heading was already folded.
    pub fn fold(&mut self, id: CellId) -> Result<bool> {
        let cell = self.get(id).ok_or(Error::CellNotFound(id))?;
        let level = cell.kind.heading_level().ok_or_else(|| {
            Error::InvalidOperation(format!("{} is not a heading and cannot be folded", id))
        })?;
        if cell.folded {
            return Ok(false);
        }
        let parent = cell.parent;
        let pos = self.position_in_parent(id, parent)?;

        let siblings = self.siblings(parent);
        let end = siblings[pos + 1..]
            .iter()
            .position(|&sibling| {
                self.get(sibling)
                    .and_then(|c| c.kind.heading_level())
                    .is_some_and(|l| l <= level)
            })
            .map(|offset| pos + 1 + offset)
            .unwrap_or(siblings.len());

        let moved: Vec<CellId> = self.siblings_mut(parent).drain(pos + 1..end).collect();
        for &child in &moved {
            if let Some(c) = self.get_mut(child) {
                c.parent = Some(id);
            }
        }

        debug!("Folded {} ({} cells hidden)", id, moved.len());
        if let Some(heading) = self.get_mut(id) {
            heading.hidden = moved;
            heading.folded = true;
        }
        Ok(true)
    }

    /// Unfold a heading, splicing its hidden subtree back in after it.
    ///
    /// Returns `false` if the heading was not folded.
    pub fn unfold(&mut self, id: CellId) -> Result<bool> {
        let cell = self.get(id).ok_or(Error::CellNotFound(id))?;
        if !cell.folded {
            return Ok(false);
        }
        let parent = cell.parent;
        let pos = self.position_in_parent(id, parent)?;

        let hidden = match self.get_mut(id) {
            Some(heading) => {
                heading.folded = false;
                std::mem::take(&mut heading.hidden)
            }
            None => return Err(Error::CellNotFound(id)),
        };
        for &child in &hidden {
            if let Some(c) = self.get_mut(child) {
                c.parent = parent;
            }
        }

        debug!("Unfolded {} ({} cells shown)", id, hidden.len());
        self.siblings_mut(parent).splice(pos + 1..pos + 1, hidden);
        Ok(true)
    }

    /// Every cell, hidden ones included, in document order.
    pub fn document_order(&self) -> Vec<CellId> {
        let mut order = Vec::with_capacity(self.len);
        for &id in &self.top_level {
            self.collect_subtree(id, &mut order);
        }
        order
    }

    /// Number of live cells, hidden ones included.
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    fn collect_subtree(&self, id: CellId, out: &mut Vec<CellId>) {
        out.push(id);
        for &child in self.hidden_children(id) {
            self.collect_subtree(child, out);
        }
    }

    fn siblings(&self, parent: Option<CellId>) -> &[CellId] {
        match parent {
            Some(p) => self.hidden_children(p),
            None => self.top_level.as_slice(),
        }
    }

    fn siblings_mut(&mut self, parent: Option<CellId>) -> &mut Vec<CellId> {
        let slot = parent.and_then(|p| {
            self.slots
                .get_mut(p.index())
                .filter(|slot| slot.generation == p.generation)
        });
        match slot.and_then(|slot| slot.cell.as_mut()) {
            Some(cell) => &mut cell.hidden,
            None => &mut self.top_level,
        }
    }

    fn position_in_parent(&self, id: CellId, parent: Option<CellId>) -> Result<usize> {
        self.siblings(parent)
            .iter()
            .position(|&c| c == id)
            .ok_or(Error::CellNotFound(id))
    }
}

impl CellTree for Worksheet {
    fn is_input_cell(&self, id: CellId) -> bool {
        self.get(id).is_some_and(GroupCell::is_input_cell)
    }

    fn is_folded(&self, id: CellId) -> bool {
        self.get(id).is_some_and(GroupCell::is_folded)
    }

    fn hidden_children(&self, id: CellId) -> &[CellId] {
        self.get(id).map(|cell| cell.hidden.as_slice()).unwrap_or(&[])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn section_with_inputs(sheet: &mut Worksheet) -> (CellId, Vec<CellId>) {
        let section = sheet.push(CellKind::Section, "Results");
        let a = sheet.push(CellKind::Input, "a: 1");
        let text = sheet.push(CellKind::Text, "some words");
        let b = sheet.push(CellKind::Input, "b: 2");
        (section, vec![a, text, b])
    }

    #[test]
    fn test_empty_worksheet() {
        let sheet = Worksheet::new();
        assert!(sheet.is_empty());
        assert!(sheet.document_order().is_empty());
    }

    #[test]
    fn test_fold_hides_following_cells() {
        let mut sheet = Worksheet::new();
        let (section, children) = section_with_inputs(&mut sheet);

        assert!(sheet.fold(section).unwrap());
        assert_eq!(sheet.top_level(), &[section]);
        assert_eq!(sheet.hidden_children(section), children.as_slice());
        assert!(sheet.is_folded(section));
        assert!(sheet.has_hidden_children(section));
        assert_eq!(sheet.parent(children[0]), Some(section));

        // Folding twice is a no-op
        assert!(!sheet.fold(section).unwrap());
    }

    #[test]
    fn test_fold_stops_at_same_level_heading() {
        let mut sheet = Worksheet::new();
        let first = sheet.push(CellKind::Section, "One");
        let a = sheet.push(CellKind::Input, "a");
        let sub = sheet.push(CellKind::Subsection, "One.One");
        let b = sheet.push(CellKind::Input, "b");
        let second = sheet.push(CellKind::Section, "Two");
        let c = sheet.push(CellKind::Input, "c");

        sheet.fold(first).unwrap();
        assert_eq!(sheet.top_level(), &[first, second, c]);
        assert_eq!(sheet.hidden_children(first), &[a, sub, b]);
    }

    #[test]
    fn test_nested_fold_keeps_document_order() {
        let mut sheet = Worksheet::new();
        let title = sheet.push(CellKind::Title, "Doc");
        let section = sheet.push(CellKind::Section, "S");
        let a = sheet.push(CellKind::Input, "a");
        let b = sheet.push(CellKind::Input, "b");

        sheet.fold(section).unwrap();
        sheet.fold(title).unwrap();

        assert_eq!(sheet.top_level(), &[title]);
        assert_eq!(sheet.hidden_children(title), &[section]);
        assert_eq!(sheet.document_order(), vec![title, section, a, b]);
    }

    #[test]
    fn test_unfold_restores_cells() {
        let mut sheet = Worksheet::new();
        let (section, children) = section_with_inputs(&mut sheet);
        let tail = sheet.push(CellKind::Input, "tail");

        sheet.fold(section).unwrap();
        assert!(sheet.unfold(section).unwrap());

        let mut expected = vec![section];
        expected.extend(children.iter().copied());
        expected.push(tail);
        assert_eq!(sheet.top_level(), expected.as_slice());
        assert!(!sheet.has_hidden_children(section));
        assert_eq!(sheet.parent(children[0]), None);
        assert!(!sheet.unfold(section).unwrap());
    }

    #[test]
    fn test_fold_input_cell_is_invalid() {
        let mut sheet = Worksheet::new();
        let input = sheet.push(CellKind::Input, "x");
        let err = sheet.fold(input).unwrap_err();
        assert!(matches!(err, Error::InvalidOperation(_)));
    }

    #[test]
    fn test_remove_invalidates_subtree_handles() {
        let mut sheet = Worksheet::new();
        let (section, children) = section_with_inputs(&mut sheet);
        sheet.fold(section).unwrap();

        let removed = sheet.remove(section).unwrap();
        assert_eq!(removed.kind(), CellKind::Section);
        assert!(!sheet.contains(section));
        for child in children {
            assert!(!sheet.contains(child));
            assert!(!sheet.is_input_cell(child));
        }
        assert!(sheet.is_empty());
    }

    #[test]
    fn test_reused_slot_does_not_resolve_old_handle() {
        let mut sheet = Worksheet::new();
        let old = sheet.push(CellKind::Input, "old");
        sheet.remove(old).unwrap();
        let new = sheet.push(CellKind::Input, "new");

        assert_eq!(old.index(), new.index());
        assert!(sheet.get(old).is_none());
        assert_eq!(sheet.get(new).unwrap().input(), "new");
    }

    #[test]
    fn test_insert_after_inside_hidden_tree() {
        let mut sheet = Worksheet::new();
        let (section, children) = section_with_inputs(&mut sheet);
        sheet.fold(section).unwrap();

        let inserted = sheet
            .insert_after(children[0], CellKind::Input, "between")
            .unwrap();
        assert_eq!(sheet.hidden_children(section)[1], inserted);
        assert_eq!(sheet.parent(inserted), Some(section));
    }

    #[test]
    fn test_set_input_on_stale_handle() {
        let mut sheet = Worksheet::new();
        let id = sheet.push(CellKind::Input, "x");
        sheet.remove(id).unwrap();
        assert!(matches!(
            sheet.set_input(id, "y"),
            Err(Error::CellNotFound(_))
        ));
    }
}
