#![allow(dead_code)]

use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use lg_core::record::{Patch, Record};
use lg_core::{
    ChangeEvent, ChangeFeed, GridSettings, Lead, NewLead, Page, Query, RecordId, RecordingNotifier,
    RemoteError, Repository, Session, TenantScope,
};
use lg_data::MemoryRepository;
use lg_grid::{GridBuilder, LeadGrid};
use parking_lot::Mutex;
use tokio::sync::broadcast;
use uuid::Uuid;

/// Memory store that counts calls and fails on demand
pub struct ScriptedRepository<R: Record> {
    store: MemoryRepository<R>,
    fail_ids: Mutex<HashSet<RecordId>>,
    fail_insert_calls: Mutex<HashSet<usize>>,
    fetch_delay: Mutex<Option<Duration>>,
    fetch_failures: AtomicBool,
    partial_returns: AtomicBool,
    last_query: Mutex<Option<Query<R::Field>>>,
    pub fetches: AtomicUsize,
    pub inserts: AtomicUsize,
    pub updates: AtomicUsize,
    pub bulk_updates: AtomicUsize,
    pub deletes: AtomicUsize,
}

impl<R: Record> ScriptedRepository<R> {
    pub fn new() -> Self {
        Self {
            store: MemoryRepository::new(),
            fail_ids: Mutex::new(HashSet::new()),
            fail_insert_calls: Mutex::new(HashSet::new()),
            fetch_delay: Mutex::new(None),
            fetch_failures: AtomicBool::new(false),
            partial_returns: AtomicBool::new(false),
            last_query: Mutex::new(None),
            fetches: AtomicUsize::new(0),
            inserts: AtomicUsize::new(0),
            updates: AtomicUsize::new(0),
            bulk_updates: AtomicUsize::new(0),
            deletes: AtomicUsize::new(0),
        }
    }

    /// The wrapped store, for writes that bypass the counters
    pub fn store(&self) -> &MemoryRepository<R> {
        &self.store
    }

    /// Updates and deletes of this id fail
    pub fn fail_on(&self, id: RecordId) {
        self.fail_ids.lock().insert(id);
    }

    /// The n-th insert call (1-based) fails
    pub fn fail_insert_call(&self, n: usize) {
        self.fail_insert_calls.lock().insert(n);
    }

    pub fn delay_fetches(&self, delay: Duration) {
        *self.fetch_delay.lock() = Some(delay);
    }

    /// Page fetches fail from now on
    pub fn fail_fetches(&self) {
        self.fetch_failures.store(true, Ordering::SeqCst);
    }

    /// Updates return only the patched columns
    pub fn return_partial_rows(&self) {
        self.partial_returns.store(true, Ordering::SeqCst);
    }

    pub fn last_query(&self) -> Option<Query<R::Field>> {
        self.last_query.lock().clone()
    }

    pub fn count(counter: &AtomicUsize) -> usize {
        counter.load(Ordering::SeqCst)
    }

    fn check(&self, id: RecordId) -> Result<(), RemoteError> {
        if self.fail_ids.lock().contains(&id) {
            return Err(RemoteError::Server(format!("injected failure for {}", id)));
        }
        Ok(())
    }
}

#[async_trait]
impl<R: Record> Repository<R> for ScriptedRepository<R> {
    async fn fetch_page(&self, query: &Query<R::Field>) -> Result<Page<R>, RemoteError> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        *self.last_query.lock() = Some(query.clone());
        let delay = *self.fetch_delay.lock();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        if self.fetch_failures.load(Ordering::SeqCst) {
            return Err(RemoteError::Network("timeout".to_string()));
        }
        self.store.fetch_page(query).await
    }

    async fn fetch_one(&self, scope: &TenantScope, id: RecordId) -> Result<Option<R>, RemoteError> {
        self.store.fetch_one(scope, id).await
    }

    async fn insert(&self, scope: &TenantScope, draft: R::Draft) -> Result<R, RemoteError> {
        let call = self.inserts.fetch_add(1, Ordering::SeqCst) + 1;
        if self.fail_insert_calls.lock().contains(&call) {
            return Err(RemoteError::Network("connection reset".to_string()));
        }
        self.store.insert(scope, draft).await
    }

    async fn update(
        &self,
        scope: &TenantScope,
        id: RecordId,
        patch: &Patch<R::Field>,
    ) -> Result<Patch<R::Field>, RemoteError> {
        self.updates.fetch_add(1, Ordering::SeqCst);
        self.check(id)?;
        let full = self.store.update(scope, id, patch).await?;
        if self.partial_returns.load(Ordering::SeqCst) {
            return Ok(patch
                .fields()
                .filter_map(|field| full.get(field).map(|value| (field, value.clone())))
                .collect());
        }
        Ok(full)
    }

    async fn update_many(
        &self,
        scope: &TenantScope,
        ids: &[RecordId],
        patch: &Patch<R::Field>,
    ) -> Result<Vec<R>, RemoteError> {
        self.bulk_updates.fetch_add(1, Ordering::SeqCst);
        for id in ids {
            self.check(*id)?;
        }
        self.store.update_many(scope, ids, patch).await
    }

    async fn delete(&self, scope: &TenantScope, id: RecordId) -> Result<(), RemoteError> {
        self.deletes.fetch_add(1, Ordering::SeqCst);
        self.check(id)?;
        self.store.delete(scope, id).await
    }
}

impl<R: Record> ChangeFeed for ScriptedRepository<R> {
    fn subscribe(&self) -> broadcast::Receiver<ChangeEvent> {
        self.store.subscribe()
    }
}

pub fn session() -> Session {
    Session {
        user_id: Uuid::new_v4(),
        organization_id: Uuid::new_v4(),
        email: "agent@example.com".to_string(),
    }
}

/// `Lead00`, `Lead01`, ... inserted for the session's organization
pub async fn seed(repo: &ScriptedRepository<Lead>, session: &Session, count: usize) -> Vec<Lead> {
    let mut leads = Vec::with_capacity(count);
    for i in 0..count {
        let draft = NewLead::new(format!("Agent{:02}", i), format!("Lead{:02}", i))
            .with_phone(format!("555 01{:02} 000", i));
        leads.push(repo.store().insert(&session.scope(), draft).await.unwrap());
    }
    leads
}

pub struct Fixture {
    pub repo: Arc<ScriptedRepository<Lead>>,
    pub notifier: Arc<RecordingNotifier>,
    pub session: Session,
    pub grid: LeadGrid,
    pub leads: Vec<Lead>,
}

impl Fixture {
    /// A grid over `count` seeded leads, not yet mounted
    pub async fn new(count: usize, settings: GridSettings) -> Self {
        let repo = Arc::new(ScriptedRepository::<Lead>::new());
        let session = session();
        let leads = seed(&repo, &session, count).await;
        let notifier = Arc::new(RecordingNotifier::new());
        let grid = GridBuilder::<Lead>::new(repo.clone(), session.clone())
            .with_change_feed(repo.clone())
            .with_notifier(notifier.clone())
            .with_settings(settings)
            .build()
            .unwrap();
        Self {
            repo,
            notifier,
            session,
            grid,
            leads,
        }
    }

    /// A mounted grid over `count` seeded leads
    pub async fn mounted(count: usize) -> Self {
        let fixture = Self::new(count, GridSettings::default()).await;
        fixture.grid.mount().await.unwrap();
        fixture
    }

    pub fn fetches(&self) -> usize {
        self.repo.fetches.load(Ordering::SeqCst)
    }

    pub fn stored(&self, id: RecordId) -> Lead {
        self.repo.store().get(id).unwrap()
    }
}
