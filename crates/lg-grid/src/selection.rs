//! Rows checked for bulk actions

use lg_core::RecordId;

/// Checked record ids in the order they were checked
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SelectionSet {
    ids: Vec<RecordId>,
}

impl SelectionSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Flip one row. Returns whether it is now selected.
    pub fn toggle(&mut self, id: RecordId) -> bool {
        match self.ids.iter().position(|selected| *selected == id) {
            Some(idx) => {
                self.ids.remove(idx);
                false
            }
            None => {
                self.ids.push(id);
                true
            }
        }
    }

    /// Header checkbox: select or deselect every visible row
    pub fn set_all(&mut self, visible: &[RecordId], checked: bool) {
        if checked {
            for id in visible {
                if !self.contains(*id) {
                    self.ids.push(*id);
                }
            }
        } else {
            self.ids.retain(|id| !visible.contains(id));
        }
    }

    /// Whether every visible row is selected (false for an empty page)
    pub fn all_selected(&self, visible: &[RecordId]) -> bool {
        !visible.is_empty() && visible.iter().all(|id| self.contains(*id))
    }

    pub fn contains(&self, id: RecordId) -> bool {
        self.ids.contains(&id)
    }

    pub fn clear(&mut self) {
        self.ids.clear();
    }

    pub fn ids(&self) -> &[RecordId] {
        &self.ids
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }
}
