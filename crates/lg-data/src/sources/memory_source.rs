//! In-memory table for any record type

use async_trait::async_trait;
use chrono::Utc;
use lg_core::record::{FieldKey, Patch, Record};
use lg_core::{
    ChangeEvent, ChangeFeed, ChangeKind, Page, Query, RecordId, RemoteError, Repository,
    SortDirection, TenantScope, ValidationError,
};
use parking_lot::RwLock;
use tokio::sync::broadcast;
use tracing::debug;
use uuid::Uuid;

/// Capacity of the change notification channel
const CHANGE_CHANNEL_CAPACITY: usize = 256;

/// A table held in memory.
///
/// Behaves like the remote store: tenant scoped, rejects writes to
/// immutable columns, and publishes a change event after every write.
pub struct MemoryRepository<R: Record> {
    rows: RwLock<Vec<R>>,
    changes: broadcast::Sender<ChangeEvent>,
}

impl<R: Record> MemoryRepository<R> {
    pub fn new() -> Self {
        Self::with_rows(Vec::new())
    }

    pub fn with_rows(rows: Vec<R>) -> Self {
        let (changes, _) = broadcast::channel(CHANGE_CHANNEL_CAPACITY);
        Self {
            rows: RwLock::new(rows),
            changes,
        }
    }

    /// Every stored row, across all tenants
    pub fn snapshot(&self) -> Vec<R> {
        self.rows.read().clone()
    }

    pub fn len(&self) -> usize {
        self.rows.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.read().is_empty()
    }

    pub fn get(&self, id: RecordId) -> Option<R> {
        self.rows.read().iter().find(|row| row.id() == id).cloned()
    }

    fn publish(&self, kind: ChangeKind, record_id: RecordId) {
        // No subscribers is fine
        let _ = self.changes.send(ChangeEvent {
            kind,
            table: R::TABLE,
            record_id: Some(record_id),
        });
    }

    fn check_mutable(patch: &Patch<R::Field>) -> Result<(), RemoteError> {
        match patch.fields().find(|field| R::is_immutable(*field)) {
            Some(field) => Err(ValidationError::Immutable { field: field.name() }.into()),
            None => Ok(()),
        }
    }
}

impl<R: Record> Default for MemoryRepository<R> {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl<R: Record> Repository<R> for MemoryRepository<R> {
    async fn fetch_page(&self, query: &Query<R::Field>) -> Result<Page<R>, RemoteError> {
        let mut matching: Vec<R> = self
            .rows
            .read()
            .iter()
            .filter(|row| query.matches(*row))
            .cloned()
            .collect();

        if let Some((field, direction)) = query.sort {
            matching.sort_by(|a, b| {
                let ordering = a.value(field).compare(&b.value(field));
                match direction {
                    SortDirection::Ascending => ordering,
                    SortDirection::Descending => ordering.reverse(),
                }
            });
        }

        let total = matching.len();
        let rows = match query.range {
            Some((offset, limit)) => matching.into_iter().skip(offset).take(limit).collect(),
            None => matching,
        };
        debug!(table = R::TABLE, total, returned = rows.len(), "memory fetch");
        Ok(Page { rows, total })
    }

    async fn fetch_one(&self, scope: &TenantScope, id: RecordId) -> Result<Option<R>, RemoteError> {
        Ok(self
            .rows
            .read()
            .iter()
            .find(|row| row.id() == id && row.organization_id() == scope.organization_id)
            .cloned())
    }

    async fn insert(&self, scope: &TenantScope, draft: R::Draft) -> Result<R, RemoteError> {
        let record = R::from_draft(Uuid::new_v4(), scope.organization_id, draft, Utc::now());
        self.rows.write().push(record.clone());
        self.publish(ChangeKind::Insert, record.id());
        Ok(record)
    }

    async fn update(
        &self,
        scope: &TenantScope,
        id: RecordId,
        patch: &Patch<R::Field>,
    ) -> Result<Patch<R::Field>, RemoteError> {
        Self::check_mutable(patch)?;
        let returned = {
            let mut rows = self.rows.write();
            let row = rows
                .iter_mut()
                .find(|row| row.id() == id && row.organization_id() == scope.organization_id)
                .ok_or(RemoteError::NotFound(id))?;
            row.apply(patch)?;
            row.touch(Utc::now());
            row.snapshot()
        };
        self.publish(ChangeKind::Update, id);
        Ok(returned)
    }

    async fn update_many(
        &self,
        scope: &TenantScope,
        ids: &[RecordId],
        patch: &Patch<R::Field>,
    ) -> Result<Vec<R>, RemoteError> {
        Self::check_mutable(patch)?;
        let updated = {
            let mut rows = self.rows.write();
            let now = Utc::now();

            // Validate against copies so a bad patch leaves every row untouched
            let mut staged = Vec::new();
            for (idx, row) in rows.iter().enumerate() {
                if ids.contains(&row.id()) && row.organization_id() == scope.organization_id {
                    let mut copy = row.clone();
                    copy.apply(patch)?;
                    copy.touch(now);
                    staged.push((idx, copy));
                }
            }
            for (idx, copy) in &staged {
                rows[*idx] = copy.clone();
            }
            staged.into_iter().map(|(_, row)| row).collect::<Vec<_>>()
        };
        for row in &updated {
            self.publish(ChangeKind::Update, row.id());
        }
        Ok(updated)
    }

    async fn delete(&self, scope: &TenantScope, id: RecordId) -> Result<(), RemoteError> {
        {
            let mut rows = self.rows.write();
            let position = rows
                .iter()
                .position(|row| row.id() == id && row.organization_id() == scope.organization_id)
                .ok_or(RemoteError::NotFound(id))?;
            rows.remove(position);
        }
        self.publish(ChangeKind::Delete, id);
        Ok(())
    }
}

impl<R: Record> ChangeFeed for MemoryRepository<R> {
    fn subscribe(&self) -> broadcast::Receiver<ChangeEvent> {
        self.changes.subscribe()
    }
}
