//! Remote data source contract
//!
//! The grid talks to its backing table only through [`Repository`] and
//! [`ChangeFeed`]. Every call carries a [`TenantScope`]; implementations
//! must treat rows of other organizations as nonexistent.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

use crate::record::{FieldKey, Patch, Record};
use crate::{OrgId, RecordId, RemoteError, Value};

/// Sort direction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum SortDirection {
    #[default]
    Ascending,
    Descending,
}

impl SortDirection {
    pub fn toggled(self) -> Self {
        match self {
            SortDirection::Ascending => SortDirection::Descending,
            SortDirection::Descending => SortDirection::Ascending,
        }
    }

    pub fn is_ascending(self) -> bool {
        self == SortDirection::Ascending
    }
}

/// Organization every remote call is restricted to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TenantScope {
    pub organization_id: OrgId,
}

/// A row predicate
#[derive(Debug, Clone, PartialEq)]
pub enum Filter<F> {
    Eq(F, Value),
    Gte(F, Value),
    Lte(F, Value),
}

impl<F: FieldKey> Filter<F> {
    pub fn field(&self) -> F {
        match self {
            Filter::Eq(f, _) | Filter::Gte(f, _) | Filter::Lte(f, _) => *f,
        }
    }

    pub fn value(&self) -> &Value {
        match self {
            Filter::Eq(_, v) | Filter::Gte(_, v) | Filter::Lte(_, v) => v,
        }
    }

    /// Evaluate against a record held in memory
    pub fn matches<R: Record<Field = F>>(&self, record: &R) -> bool {
        let actual = record.value(self.field());
        let ordering = actual.compare(self.value());
        match self {
            Filter::Eq(..) => ordering.is_eq(),
            Filter::Gte(..) => !actual.is_null() && ordering.is_ge(),
            Filter::Lte(..) => !actual.is_null() && ordering.is_le(),
        }
    }
}

/// Case-insensitive substring search on one field
#[derive(Debug, Clone, PartialEq)]
pub struct Search<F> {
    pub field: F,
    pub needle: String,
}

/// A filtered, sorted, paginated read
#[derive(Debug, Clone, PartialEq)]
pub struct Query<F> {
    pub scope: TenantScope,
    pub filters: Vec<Filter<F>>,
    pub search: Option<Search<F>>,
    pub sort: Option<(F, SortDirection)>,
    /// `(offset, limit)`
    pub range: Option<(usize, usize)>,
}

impl<F: FieldKey> Query<F> {
    pub fn new(scope: TenantScope) -> Self {
        Self {
            scope,
            filters: Vec::new(),
            search: None,
            sort: None,
            range: None,
        }
    }

    pub fn filter(mut self, filter: Filter<F>) -> Self {
        self.filters.push(filter);
        self
    }

    pub fn search(mut self, field: F, needle: impl Into<String>) -> Self {
        self.search = Some(Search {
            field,
            needle: needle.into(),
        });
        self
    }

    pub fn sort(mut self, field: F, direction: SortDirection) -> Self {
        self.sort = Some((field, direction));
        self
    }

    pub fn range(mut self, offset: usize, limit: usize) -> Self {
        self.range = Some((offset, limit));
        self
    }

    /// Whether a record passes the tenant scope, filters and search
    pub fn matches<R: Record<Field = F>>(&self, record: &R) -> bool {
        record.organization_id() == self.scope.organization_id
            && self.filters.iter().all(|f| f.matches(record))
            && self
                .search
                .as_ref()
                .map(|s| record.value(s.field).contains_text(&s.needle))
                .unwrap_or(true)
    }
}

/// One page of rows plus the exact count of matching rows
#[derive(Debug, Clone, PartialEq)]
pub struct Page<R> {
    pub rows: Vec<R>,
    pub total: usize,
}

impl<R> Page<R> {
    pub fn empty() -> Self {
        Self { rows: Vec::new(), total: 0 }
    }
}

/// Typed CRUD access to one remote table
#[async_trait]
pub trait Repository<R: Record>: Send + Sync {
    /// Read one page of matching rows
    async fn fetch_page(&self, query: &Query<R::Field>) -> Result<Page<R>, RemoteError>;

    /// Read one row by id
    async fn fetch_one(&self, scope: &TenantScope, id: RecordId) -> Result<Option<R>, RemoteError>;

    /// Insert a row; the store assigns id, tenant and timestamps
    async fn insert(&self, scope: &TenantScope, draft: R::Draft) -> Result<R, RemoteError>;

    /// Update one row, returning the columns the store sent back
    async fn update(
        &self,
        scope: &TenantScope,
        id: RecordId,
        patch: &Patch<R::Field>,
    ) -> Result<Patch<R::Field>, RemoteError>;

    /// Apply one patch to many rows in a single request
    async fn update_many(
        &self,
        scope: &TenantScope,
        ids: &[RecordId],
        patch: &Patch<R::Field>,
    ) -> Result<Vec<R>, RemoteError>;

    /// Delete one row
    async fn delete(&self, scope: &TenantScope, id: RecordId) -> Result<(), RemoteError>;
}

/// Kind of a table mutation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ChangeKind {
    Insert,
    Update,
    Delete,
}

/// A mutation observed on a remote table
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChangeEvent {
    pub kind: ChangeKind,
    pub table: &'static str,
    pub record_id: Option<RecordId>,
}

/// Push notifications of table mutations
pub trait ChangeFeed: Send + Sync {
    fn subscribe(&self) -> broadcast::Receiver<ChangeEvent>;
}
