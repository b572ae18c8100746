//! Schema binding between a concrete record type and the generic grid

use std::fmt::Debug;
use std::hash::Hash;

use chrono::{DateTime, Utc};

use crate::{OrgId, RecordId, UserId, ValidationError, Value};

/// A column of a record type, usually a field-less enum
pub trait FieldKey: Copy + Eq + Hash + Debug + Send + Sync + 'static {
    /// Every column in schema order
    fn all() -> &'static [Self];

    /// Column name as stored remotely
    fn name(&self) -> &'static str;

    fn from_name(name: &str) -> Option<Self> {
        Self::all().iter().copied().find(|f| f.name() == name)
    }

    /// Map a CSV header to a column.
    ///
    /// Headers are trimmed, lowercased, and spaces and dashes become
    /// underscores before matching the column name.
    fn from_header(header: &str) -> Option<Self> {
        Self::from_name(&normalize_header(header))
    }
}

/// Lowercase a header and fold spaces and dashes into underscores
pub fn normalize_header(header: &str) -> String {
    header
        .trim()
        .to_lowercase()
        .chars()
        .map(|c| if c == ' ' || c == '-' { '_' } else { c })
        .collect()
}

/// A record stored in a remote table
pub trait Record: Clone + Debug + Send + Sync + 'static {
    type Field: FieldKey;

    /// Insert payload; the store assigns identity, tenant and timestamps
    type Draft: Clone + Debug + Send + Sync + 'static;

    /// Remote table holding this record type
    const TABLE: &'static str;

    /// Singular noun for user-facing messages
    const NOUN: &'static str;

    fn id(&self) -> RecordId;

    fn organization_id(&self) -> OrgId;

    fn value(&self, field: Self::Field) -> Value;

    /// Assign one field. Type mismatches are validation errors.
    fn set_value(&mut self, field: Self::Field, value: Value) -> Result<(), ValidationError>;

    /// Fields allowed into inline edit mode, in Tab order
    fn editable_fields() -> &'static [Self::Field];

    /// Fields fixed at creation
    fn immutable_fields() -> &'static [Self::Field];

    /// Fields an import row must provide
    fn required_fields() -> &'static [Self::Field];

    /// Field matched by free-text search
    fn search_field() -> Self::Field;

    /// Parse user-entered text for a field
    fn parse_value(field: Self::Field, raw: &str) -> Result<Value, ValidationError>;

    /// Build an insert payload from parsed values
    fn draft_from(values: &[(Self::Field, Value)]) -> Result<Self::Draft, ValidationError>;

    /// Record the owning user on a draft
    fn stamp_owner(draft: &mut Self::Draft, user_id: UserId);

    /// Materialize a stored record from a draft
    fn from_draft(id: RecordId, organization_id: OrgId, draft: Self::Draft, now: DateTime<Utc>) -> Self;

    /// Bump modification metadata after a remote update
    fn touch(&mut self, _now: DateTime<Utc>) {}

    fn is_editable(field: Self::Field) -> bool {
        Self::editable_fields().contains(&field)
    }

    fn is_immutable(field: Self::Field) -> bool {
        Self::immutable_fields().contains(&field)
    }

    /// Merge the fields present in `patch` over this record.
    ///
    /// Absent fields keep their current value and immutable fields are never
    /// overwritten. The merge is all-or-nothing.
    fn apply(&mut self, patch: &Patch<Self::Field>) -> Result<(), ValidationError> {
        let mut merged = self.clone();
        for (field, value) in patch.iter() {
            if Self::is_immutable(*field) {
                continue;
            }
            merged.set_value(*field, value.clone())?;
        }
        *self = merged;
        Ok(())
    }

    /// Every field of this record as a patch
    fn snapshot(&self) -> Patch<Self::Field> {
        Self::Field::all()
            .iter()
            .map(|field| (*field, self.value(*field)))
            .collect()
    }
}

/// An ordered set of field assignments
#[derive(Debug, Clone, PartialEq)]
pub struct Patch<F> {
    changes: Vec<(F, Value)>,
}

impl<F: FieldKey> Patch<F> {
    pub fn new() -> Self {
        Self { changes: Vec::new() }
    }

    pub fn single(field: F, value: impl Into<Value>) -> Self {
        let mut patch = Self::new();
        patch.set(field, value);
        patch
    }

    /// Assign a field, replacing an earlier assignment to it
    pub fn set(&mut self, field: F, value: impl Into<Value>) {
        let value = value.into();
        match self.changes.iter_mut().find(|(f, _)| *f == field) {
            Some(entry) => entry.1 = value,
            None => self.changes.push((field, value)),
        }
    }

    pub fn with(mut self, field: F, value: impl Into<Value>) -> Self {
        self.set(field, value);
        self
    }

    pub fn get(&self, field: F) -> Option<&Value> {
        self.changes
            .iter()
            .find(|(f, _)| *f == field)
            .map(|(_, v)| v)
    }

    pub fn iter(&self) -> impl Iterator<Item = &(F, Value)> {
        self.changes.iter()
    }

    pub fn fields(&self) -> impl Iterator<Item = F> + '_ {
        self.changes.iter().map(|(f, _)| *f)
    }

    pub fn len(&self) -> usize {
        self.changes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.changes.is_empty()
    }
}

impl<F: FieldKey> Default for Patch<F> {
    fn default() -> Self {
        Self::new()
    }
}

impl<F: FieldKey> FromIterator<(F, Value)> for Patch<F> {
    fn from_iter<I: IntoIterator<Item = (F, Value)>>(iter: I) -> Self {
        let mut patch = Self::new();
        for (field, value) in iter {
            patch.set(field, value);
        }
        patch
    }
}
