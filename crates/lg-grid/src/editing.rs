//! Inline cell editing state machine
//!
//! At most one cell is in edit mode. The editor only tracks state; commits
//! are issued by the grid, which reports back through [`CellEditor::finish`]
//! and [`CellEditor::mark_failed`]. Both are keyed by cell so a completion
//! arriving after the user moved on leaves the new edit alone.

use lg_core::record::{FieldKey, Record};
use lg_core::{RecordId, Value};

use crate::GridError;

/// Keys the editor reacts to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EditKey {
    Enter,
    Escape,
    Tab,
    BackTab,
}

/// The cell currently in edit mode
#[derive(Debug, Clone, PartialEq)]
pub struct EditingCell<F> {
    pub record_id: RecordId,
    pub field: F,
    /// Value when editing began
    pub original: Value,
    /// Text typed so far
    pub pending: String,
    /// Message from the last failed commit
    pub error: Option<String>,
}

impl<F: FieldKey> EditingCell<F> {
    pub fn is_at(&self, record_id: RecordId, field: F) -> bool {
        self.record_id == record_id && self.field == field
    }

    /// Whether the pending text differs from the original value
    pub fn is_dirty(&self) -> bool {
        self.pending != self.original.to_string()
    }
}

#[derive(Debug, Clone)]
pub struct CellEditor<F> {
    current: Option<EditingCell<F>>,
}

impl<F: FieldKey> Default for CellEditor<F> {
    fn default() -> Self {
        Self { current: None }
    }
}

impl<F: FieldKey> CellEditor<F> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn current(&self) -> Option<&EditingCell<F>> {
        self.current.as_ref()
    }

    pub fn is_editing(&self) -> bool {
        self.current.is_some()
    }

    /// Put a cell into edit mode, seeded with its current value.
    ///
    /// Any cell already in edit mode is replaced and returned; its pending
    /// text is not committed here.
    pub fn begin<R>(&mut self, record: &R, field: F) -> Result<Option<EditingCell<F>>, GridError>
    where
        R: Record<Field = F>,
    {
        if !R::is_editable(field) {
            return Err(GridError::NotEditable(field.name()));
        }
        let original = record.value(field);
        let cell = EditingCell {
            record_id: record.id(),
            field,
            pending: original.to_string(),
            original,
            error: None,
        };
        Ok(self.current.replace(cell))
    }

    pub fn set_pending(&mut self, text: impl Into<String>) -> Result<(), GridError> {
        let cell = self.current.as_mut().ok_or(GridError::NotEditing)?;
        cell.pending = text.into();
        Ok(())
    }

    /// Leave edit mode, dropping the pending text
    pub fn cancel(&mut self) -> Option<EditingCell<F>> {
        self.current.take()
    }

    /// Leave edit mode after a successful commit of this cell
    pub fn finish(&mut self, record_id: RecordId, field: F) -> bool {
        match &self.current {
            Some(cell) if cell.is_at(record_id, field) => {
                self.current = None;
                true
            }
            _ => false,
        }
    }

    /// Keep the cell open and attach the commit error
    pub fn mark_failed(&mut self, record_id: RecordId, field: F, message: impl Into<String>) {
        if let Some(cell) = self.current.as_mut() {
            if cell.is_at(record_id, field) {
                cell.error = Some(message.into());
            }
        }
    }

    /// Drop the edit if its record is gone from the page
    pub fn retain_visible(&mut self, visible: &[RecordId]) -> Option<EditingCell<F>> {
        match &self.current {
            Some(cell) if !visible.contains(&cell.record_id) => self.current.take(),
            _ => None,
        }
    }

    /// Cell reached by Tab (or Shift+Tab when `backward`).
    ///
    /// Cells are ordered row by row over `visible`, then by `editable`
    /// within a row. There is no wraparound: `None` at either edge.
    pub fn next_position(
        &self,
        visible: &[RecordId],
        editable: &[F],
        backward: bool,
    ) -> Option<(RecordId, F)> {
        let cell = self.current.as_ref()?;
        let row = visible.iter().position(|id| *id == cell.record_id)?;
        let col = editable.iter().position(|f| *f == cell.field)?;
        let width = editable.len();
        let index = row * width + col;

        let target = if backward {
            index.checked_sub(1)?
        } else {
            index + 1
        };
        if target >= visible.len() * width {
            return None;
        }
        Some((visible[target / width], editable[target % width]))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use lg_core::{Lead, LeadField, NewLead};
    use uuid::Uuid;

    fn lead(last: &str) -> Lead {
        Lead::from_draft(
            Uuid::new_v4(),
            Uuid::new_v4(),
            NewLead::new("Test", last).with_phone("555 0100 200"),
            Utc::now(),
        )
    }

    #[test]
    fn test_non_editable_field_stays_idle() {
        let mut editor = CellEditor::new();
        let err = editor.begin(&lead("Hopper"), LeadField::Id).unwrap_err();
        assert_eq!(err, GridError::NotEditable("id"));
        assert!(!editor.is_editing());
    }

    #[test]
    fn test_begin_seeds_current_value() {
        let mut editor = CellEditor::new();
        let record = lead("Hopper");
        editor.begin(&record, LeadField::LastName).unwrap();
        let cell = editor.current().unwrap();
        assert_eq!(cell.pending, "Hopper");
        assert!(!cell.is_dirty());
    }

    #[test]
    fn test_switching_cells_replaces_edit() {
        let mut editor = CellEditor::new();
        let a = lead("Hopper");
        let b = lead("Lovelace");
        editor.begin(&a, LeadField::LastName).unwrap();
        editor.set_pending("Changed").unwrap();

        let previous = editor.begin(&b, LeadField::Email).unwrap().unwrap();
        assert_eq!(previous.pending, "Changed");
        assert!(editor.current().unwrap().is_at(b.id, LeadField::Email));
    }

    #[test]
    fn test_stale_completion_ignored() {
        let mut editor = CellEditor::new();
        let a = lead("Hopper");
        let b = lead("Lovelace");
        editor.begin(&a, LeadField::LastName).unwrap();
        editor.begin(&b, LeadField::LastName).unwrap();
        editor.mark_failed(a.id, LeadField::LastName, "boom");
        assert!(!editor.finish(a.id, LeadField::LastName));
        assert_eq!(editor.current().unwrap().error, None);
    }

    #[test]
    fn test_tab_order_clamps_at_edges() {
        let mut editor = CellEditor::new();
        let rows = [lead("A"), lead("B")];
        let visible: Vec<_> = rows.iter().map(|r| r.id).collect();
        let editable = LeadField::EDITABLE;

        editor.begin(&rows[0], LeadField::Notes).unwrap();
        assert_eq!(
            editor.next_position(&visible, &editable, false),
            Some((rows[1].id, LeadField::FirstName))
        );

        editor.begin(&rows[1], LeadField::Notes).unwrap();
        assert_eq!(editor.next_position(&visible, &editable, false), None);

        editor.begin(&rows[0], LeadField::FirstName).unwrap();
        assert_eq!(editor.next_position(&visible, &editable, true), None);
        assert_eq!(
            editor.next_position(&visible, &editable, false),
            Some((rows[0].id, LeadField::LastName))
        );
    }

    #[test]
    fn test_set_pending_requires_edit() {
        let mut editor = CellEditor::<LeadField>::new();
        assert_eq!(editor.set_pending("x"), Err(GridError::NotEditing));
    }
}
