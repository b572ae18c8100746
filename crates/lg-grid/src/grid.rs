//! The grid orchestrator
//!
//! [`RecordGrid`] owns the rows of the current page together with the sort,
//! page, selection and editing state. Sub-components only compute intents;
//! every mutation of the row cache happens here, and only after the remote
//! source confirmed it.
//!
//! State lives behind a `parking_lot::RwLock` that is never held across an
//! `.await`. Completions check the mounted flag first, and page fetches
//! carry a sequence number so a slow response never overwrites a newer one.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Weak};

use async_trait::async_trait;
use lg_core::record::{FieldKey, Patch, Record};
use lg_core::{
    AuthProvider, CallStatus, ChangeFeed, Filter, GridSettings, Lead, LeadField, Notification,
    Notifier, Page, Query, RecordId, RemoteError, Repository, Session, TenantScope,
    TracingNotifier, ValidationError,
};
use parking_lot::{Mutex, RwLock};
use tracing::{debug, error, info, warn};

use crate::editing::{CellEditor, EditKey, EditingCell};
use crate::pagination::Paginator;
use crate::realtime::{RealtimeBridge, RefreshTarget};
use crate::selection::SelectionSet;
use crate::sort::SortState;
use crate::GridError;

/// The lead table grid
pub type LeadGrid = RecordGrid<Lead>;

/// Outcome of a bulk delete
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DeleteReport {
    pub deleted: Vec<RecordId>,
    pub failed: Vec<(RecordId, RemoteError)>,
}

impl DeleteReport {
    pub fn failure_count(&self) -> usize {
        self.failed.len()
    }

    pub fn is_complete(&self) -> bool {
        self.failed.is_empty()
    }
}

/// "1 lead", "3 leads"
fn count_of(count: usize, noun: &str) -> String {
    if count == 1 {
        format!("1 {}", noun)
    } else {
        format!("{} {}s", count, noun)
    }
}

struct GridState<R: Record> {
    rows: Vec<R>,
    sort: SortState<R::Field>,
    pages: Paginator,
    selection: SelectionSet,
    editor: CellEditor<R::Field>,
    search: Option<String>,
    filters: Vec<Filter<R::Field>>,
    /// Query behind `rows`, if they are still current
    loaded: Option<Query<R::Field>>,
}

impl<R: Record> GridState<R> {
    fn visible_ids(&self) -> Vec<RecordId> {
        self.sort
            .sorted_view(&self.rows)
            .iter()
            .map(|row| row.id())
            .collect()
    }

    fn row_mut(&mut self, id: RecordId) -> Option<&mut R> {
        self.rows.iter_mut().find(|row| row.id() == id)
    }
}

struct GridInner<R: Record> {
    repository: Arc<dyn Repository<R>>,
    feed: Option<Arc<dyn ChangeFeed>>,
    notifier: Arc<dyn Notifier>,
    session: Session,
    settings: GridSettings,
    state: RwLock<GridState<R>>,
    bridge: Mutex<Option<RealtimeBridge>>,
    mounted: AtomicBool,
    fetch_seq: AtomicU64,
}

/// Remote query for the current sort, page, search and filters
fn query_for<R: Record>(scope: TenantScope, state: &GridState<R>) -> Query<R::Field> {
    let mut query = Query::new(scope);
    query.filters = state.filters.clone();
    if let Some(needle) = &state.search {
        query = query.search(R::search_field(), needle.clone());
    }
    if let Some((field, direction)) = state.sort.as_query_sort() {
        query = query.sort(field, direction);
    }
    let (offset, limit) = state.pages.range();
    query.range(offset, limit)
}

impl<R: Record> GridInner<R> {
    fn query_for(&self, state: &GridState<R>) -> Query<R::Field> {
        query_for(self.session.scope(), state)
    }

    fn is_mounted(&self) -> bool {
        self.mounted.load(Ordering::SeqCst)
    }

    fn notify(&self, notification: Notification) {
        self.notifier.notify(notification);
    }
}

/// Builds a [`RecordGrid`] from its collaborators
pub struct GridBuilder<R: Record> {
    repository: Arc<dyn Repository<R>>,
    session: Session,
    feed: Option<Arc<dyn ChangeFeed>>,
    notifier: Arc<dyn Notifier>,
    settings: GridSettings,
    initial_page: Option<Page<R>>,
}

impl<R: Record> GridBuilder<R> {
    pub fn new(repository: Arc<dyn Repository<R>>, session: Session) -> Self {
        Self {
            repository,
            session,
            feed: None,
            notifier: Arc::new(TracingNotifier),
            settings: GridSettings::default(),
            initial_page: None,
        }
    }

    /// Start from whoever is signed in
    pub async fn from_auth(
        repository: Arc<dyn Repository<R>>,
        auth: &dyn AuthProvider,
    ) -> Result<Self, GridError> {
        let session = auth.current_session().await?;
        Ok(Self::new(repository, session))
    }

    pub fn with_change_feed(mut self, feed: Arc<dyn ChangeFeed>) -> Self {
        self.feed = Some(feed);
        self
    }

    pub fn with_notifier(mut self, notifier: Arc<dyn Notifier>) -> Self {
        self.notifier = notifier;
        self
    }

    pub fn with_settings(mut self, settings: GridSettings) -> Self {
        self.settings = settings;
        self
    }

    /// Rows already fetched for page 1 with no sort, search or filter.
    /// Mounting and `refresh(false)` reuse them instead of fetching.
    pub fn with_initial_page(mut self, page: Page<R>) -> Self {
        self.initial_page = Some(page);
        self
    }

    pub fn build(self) -> Result<RecordGrid<R>, GridError> {
        let pages = Paginator::new(
            self.settings.page_size,
            self.settings.page_size_options.clone(),
        )?;
        let mut state = GridState {
            rows: Vec::new(),
            sort: SortState::new(),
            pages,
            selection: SelectionSet::new(),
            editor: CellEditor::new(),
            search: None,
            filters: Vec::new(),
            loaded: None,
        };
        if let Some(page) = self.initial_page {
            state.pages.set_total(page.total);
            state.rows = page.rows;
            state.loaded = Some(query_for(self.session.scope(), &state));
        }

        Ok(RecordGrid {
            inner: Arc::new(GridInner {
                repository: self.repository,
                feed: self.feed,
                notifier: self.notifier,
                session: self.session,
                settings: self.settings,
                state: RwLock::new(state),
                bridge: Mutex::new(None),
                mounted: AtomicBool::new(false),
                fetch_seq: AtomicU64::new(0),
            }),
        })
    }
}

/// Editable, paginated view over one remote table
pub struct RecordGrid<R: Record> {
    inner: Arc<GridInner<R>>,
}

impl<R: Record> Clone for RecordGrid<R> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

impl<R: Record> RecordGrid<R> {
    pub fn builder(repository: Arc<dyn Repository<R>>, session: Session) -> GridBuilder<R> {
        GridBuilder::new(repository, session)
    }

    /// Start the realtime bridge and load the first page
    pub async fn mount(&self) -> Result<(), GridError> {
        if self.inner.mounted.swap(true, Ordering::SeqCst) {
            return Ok(());
        }
        if let Some(feed) = &self.inner.feed {
            let target: Arc<dyn RefreshTarget> = Arc::new(GridRefresher {
                inner: Arc::downgrade(&self.inner),
            });
            let bridge = RealtimeBridge::start(
                R::TABLE,
                feed.subscribe(),
                self.inner.settings.debounce(),
                target,
            );
            *self.inner.bridge.lock() = Some(bridge);
        }
        info!(
            table = R::TABLE,
            organization = %self.inner.session.organization_id,
            "grid mounted"
        );

        if self.is_current() {
            debug!(table = R::TABLE, "using initial page");
            return Ok(());
        }
        self.load(false).await
    }

    /// Stop the realtime bridge. Requests still in flight complete without
    /// touching grid state.
    pub fn unmount(&self) {
        if !self.inner.mounted.swap(false, Ordering::SeqCst) {
            return;
        }
        if let Some(mut bridge) = self.inner.bridge.lock().take() {
            bridge.stop();
        }
        self.inner.fetch_seq.fetch_add(1, Ordering::SeqCst);
        {
            let mut state = self.inner.state.write();
            state.loaded = None;
            state.editor.cancel();
        }
        info!(table = R::TABLE, "grid unmounted");
    }

    pub fn is_mounted(&self) -> bool {
        self.inner.is_mounted()
    }

    /// Whether the realtime bridge is listening
    pub fn is_listening(&self) -> bool {
        self.inner
            .bridge
            .lock()
            .as_ref()
            .map(RealtimeBridge::is_running)
            .unwrap_or(false)
    }

    /// Report through the grid's notifier, for flows outside the grid
    pub(crate) fn notify(&self, notification: Notification) {
        self.inner.notify(notification);
    }

    fn ensure_mounted(&self) -> Result<(), GridError> {
        if self.inner.is_mounted() {
            Ok(())
        } else {
            Err(GridError::Unmounted)
        }
    }

    /// Re-fetch the current page.
    ///
    /// Without `force` the call is skipped when the rows already match the
    /// current sort, page and filters. A forced refresh also clears the
    /// selection. Returns whether a fetch was issued.
    pub async fn refresh(&self, force: bool) -> Result<bool, GridError> {
        self.ensure_mounted()?;
        if !force && self.is_current() {
            debug!(table = R::TABLE, "refresh skipped, rows are current");
            return Ok(false);
        }
        self.load(force).await?;
        if force && self.inner.is_mounted() {
            self.inner.notify(Notification::success(
                "Success",
                format!("{} refreshed successfully", capitalized(R::TABLE)),
            ));
        }
        Ok(true)
    }

    fn is_current(&self) -> bool {
        let state = self.inner.state.read();
        state.loaded.as_ref() == Some(&self.inner.query_for(&state))
    }

    /// Fetch the current page into the row cache.
    ///
    /// When the reported total no longer reaches the current page, the page
    /// is clamped and the fetch repeated once.
    pub(crate) async fn load(&self, clear_selection: bool) -> Result<(), GridError> {
        let inner = &self.inner;
        for attempt in 0..2 {
            if !inner.is_mounted() {
                return Ok(());
            }
            let query = {
                let state = inner.state.read();
                inner.query_for(&state)
            };
            let seq = inner.fetch_seq.fetch_add(1, Ordering::SeqCst) + 1;
            let result = inner.repository.fetch_page(&query).await;

            if !inner.is_mounted() {
                debug!(table = R::TABLE, "fetch completed after unmount");
                return Ok(());
            }
            if inner.fetch_seq.load(Ordering::SeqCst) != seq {
                debug!(table = R::TABLE, seq, "fetch superseded");
                return Ok(());
            }

            let page = match result {
                Ok(page) => page,
                Err(err) => {
                    error!(table = R::TABLE, error = %err, "fetch failed");
                    inner.notify(Notification::error(
                        format!("Error fetching {}", R::TABLE),
                        err.to_string(),
                    ));
                    return Err(err.into());
                }
            };

            let refetch = {
                let mut state = inner.state.write();
                let clamped = state.pages.set_total(page.total);
                if clamped && attempt == 0 {
                    true
                } else {
                    debug!(
                        table = R::TABLE,
                        rows = page.rows.len(),
                        total = page.total,
                        page = state.pages.current_page(),
                        "page loaded"
                    );
                    state.rows = page.rows;
                    state.loaded = if clamped { None } else { Some(query) };
                    if clear_selection {
                        state.selection.clear();
                    }
                    let visible = state.visible_ids();
                    if let Some(cell) = state.editor.retain_visible(&visible) {
                        debug!(record = %cell.record_id, "edited record left the page");
                    }
                    false
                }
            };
            if !refetch {
                break;
            }
            debug!(table = R::TABLE, total = page.total, "page out of range, refetching");
        }
        Ok(())
    }

    /// Rows of the current page in display order
    pub fn rows(&self) -> Vec<R> {
        let state = self.inner.state.read();
        state.sort.sorted_view(&state.rows)
    }

    pub fn row(&self, id: RecordId) -> Option<R> {
        self.inner
            .state
            .read()
            .rows
            .iter()
            .find(|row| row.id() == id)
            .cloned()
    }

    pub fn visible_ids(&self) -> Vec<RecordId> {
        self.inner.state.read().visible_ids()
    }

    pub fn paginator(&self) -> Paginator {
        self.inner.state.read().pages.clone()
    }

    pub fn current_page(&self) -> usize {
        self.inner.state.read().pages.current_page()
    }

    pub fn total_pages(&self) -> usize {
        self.inner.state.read().pages.total_pages()
    }

    pub fn total_records(&self) -> usize {
        self.inner.state.read().pages.total_records()
    }

    pub fn page_label(&self) -> String {
        self.inner.state.read().pages.label()
    }

    pub fn sort_state(&self) -> SortState<R::Field> {
        self.inner.state.read().sort
    }

    pub fn search(&self) -> Option<String> {
        self.inner.state.read().search.clone()
    }

    pub fn settings(&self) -> &GridSettings {
        &self.inner.settings
    }

    pub fn session(&self) -> &Session {
        &self.inner.session
    }

    /// Header click; keeps the current page
    pub async fn set_sort(&self, column: R::Field) -> Result<(), GridError> {
        {
            let mut state = self.inner.state.write();
            state.sort.set_sort(column);
            debug!(column = column.name(), direction = ?state.sort.direction(), "sort changed");
        }
        self.load(false).await
    }

    pub async fn clear_sort(&self) -> Result<(), GridError> {
        {
            self.inner.state.write().sort.clear();
        }
        self.load(false).await
    }

    /// Go to a page, clamped to the available range. Returns the page shown.
    pub async fn set_page(&self, page: usize) -> Result<usize, GridError> {
        self.move_page(|pages| pages.set_page(page)).await
    }

    pub async fn next_page(&self) -> Result<usize, GridError> {
        self.move_page(Paginator::next).await
    }

    pub async fn previous_page(&self) -> Result<usize, GridError> {
        self.move_page(Paginator::previous).await
    }

    async fn move_page<F>(&self, step: F) -> Result<usize, GridError>
    where
        F: FnOnce(&mut Paginator) -> usize,
    {
        let (before, after) = {
            let mut state = self.inner.state.write();
            let before = state.pages.current_page();
            (before, step(&mut state.pages))
        };
        if before != after {
            self.load(false).await?;
        }
        Ok(self.current_page())
    }

    /// Pick another page size and go back to page 1
    pub async fn set_page_size(&self, size: usize) -> Result<(), GridError> {
        {
            self.inner.state.write().pages.set_page_size(size)?;
        }
        self.load(false).await
    }

    /// Substring search on the record's search field; `None` clears it
    pub async fn set_search(&self, needle: Option<String>) -> Result<(), GridError> {
        {
            let mut state = self.inner.state.write();
            state.search = needle.filter(|n| !n.trim().is_empty());
            state.pages.set_page(1);
        }
        self.load(false).await
    }

    pub async fn set_filters(&self, filters: Vec<Filter<R::Field>>) -> Result<(), GridError> {
        {
            let mut state = self.inner.state.write();
            state.filters = filters;
            state.pages.set_page(1);
        }
        self.load(false).await
    }

    /// Insert without notifying or refreshing
    pub(crate) async fn insert_draft(&self, mut draft: R::Draft) -> Result<R, GridError> {
        self.ensure_mounted()?;
        R::stamp_owner(&mut draft, self.inner.session.user_id);
        let scope = self.inner.session.scope();
        Ok(self.inner.repository.insert(&scope, draft).await?)
    }

    /// Create a record. The new row shows up through the refresh that
    /// follows, so ordering and paging stay consistent.
    pub async fn create_record(&self, draft: R::Draft) -> Result<R, GridError> {
        match self.insert_draft(draft).await {
            Ok(record) => {
                info!(table = R::TABLE, record = %record.id(), "record created");
                self.inner.notify(Notification::success(
                    "Success",
                    format!("{} created successfully.", capitalized(R::NOUN)),
                ));
                if let Err(err) = self.load(false).await {
                    debug!(error = %err, "refresh after create failed");
                }
                Ok(record)
            }
            Err(GridError::Unmounted) => Err(GridError::Unmounted),
            Err(err) => {
                warn!(table = R::TABLE, error = %err, "create failed");
                self.inner.notify(Notification::error(
                    "Error",
                    format!("Failed to create {}. Please try again.", R::NOUN),
                ));
                Err(err)
            }
        }
    }

    /// Update one record and merge the returned columns into the cached row
    pub async fn update_record(&self, id: RecordId, patch: Patch<R::Field>) -> Result<(), GridError> {
        self.ensure_mounted()?;
        if let Some(field) = patch.fields().find(|field| R::is_immutable(*field)) {
            return Err(ValidationError::Immutable { field: field.name() }.into());
        }
        let scope = self.inner.session.scope();
        match self.inner.repository.update(&scope, id, &patch).await {
            Ok(returned) => {
                self.merge_returned(id, &returned);
                Ok(())
            }
            Err(err) => {
                warn!(table = R::TABLE, record = %id, error = %err, "update failed");
                self.inner.notify(Notification::error(
                    "Error",
                    format!("Failed to update {}. Please try again.", R::NOUN),
                ));
                Err(err.into())
            }
        }
    }

    /// Merge fields the remote returned; absent fields keep their local value
    fn merge_returned(&self, id: RecordId, returned: &Patch<R::Field>) -> bool {
        if !self.inner.is_mounted() {
            return false;
        }
        let mut state = self.inner.state.write();
        match state.row_mut(id) {
            Some(row) => {
                if let Err(err) = row.apply(returned) {
                    warn!(record = %id, error = %err, "returned row did not merge");
                }
                true
            }
            None => false,
        }
    }

    /// Delete each id independently, then refresh.
    ///
    /// Rows that were deleted stay deleted when others fail. The selection
    /// is cleared either way.
    pub async fn delete_records(&self, ids: &[RecordId]) -> Result<DeleteReport, GridError> {
        self.ensure_mounted()?;
        let scope = self.inner.session.scope();
        let mut report = DeleteReport::default();
        for id in ids {
            match self.inner.repository.delete(&scope, *id).await {
                Ok(()) => report.deleted.push(*id),
                Err(err) => {
                    warn!(table = R::TABLE, record = %id, error = %err, "delete failed");
                    report.failed.push((*id, err));
                }
            }
        }

        if !self.inner.is_mounted() {
            return Ok(report);
        }
        {
            self.inner.state.write().selection.clear();
        }
        if report.is_complete() {
            info!(table = R::TABLE, deleted = report.deleted.len(), "records deleted");
            self.inner.notify(Notification::success(
                "Success",
                format!("Successfully deleted {}.", count_of(report.deleted.len(), R::NOUN)),
            ));
        } else {
            self.inner.notify(Notification::error(
                "Error",
                format!(
                    "Failed to delete {}. Please try again.",
                    count_of(report.failure_count(), R::NOUN)
                ),
            ));
        }

        if let Err(err) = self.load(false).await {
            debug!(error = %err, "refresh after delete failed");
        }
        Ok(report)
    }

    pub async fn delete_selected(&self) -> Result<DeleteReport, GridError> {
        let ids = self.selected();
        self.delete_records(&ids).await
    }

    /// Apply one patch to many records in a single request
    pub async fn bulk_update(
        &self,
        ids: &[RecordId],
        patch: Patch<R::Field>,
    ) -> Result<Vec<R>, GridError> {
        let message = format!("Successfully updated {}.", count_of(ids.len(), R::NOUN));
        self.apply_bulk(ids, &patch, message).await
    }

    async fn apply_bulk(
        &self,
        ids: &[RecordId],
        patch: &Patch<R::Field>,
        success: String,
    ) -> Result<Vec<R>, GridError> {
        self.ensure_mounted()?;
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        if let Some(field) = patch.fields().find(|field| R::is_immutable(*field)) {
            return Err(ValidationError::Immutable { field: field.name() }.into());
        }
        let scope = self.inner.session.scope();
        match self.inner.repository.update_many(&scope, ids, patch).await {
            Ok(updated) => {
                if self.inner.is_mounted() {
                    let mut state = self.inner.state.write();
                    for row in &updated {
                        if let Some(slot) = state.row_mut(row.id()) {
                            *slot = row.clone();
                        }
                    }
                    state.selection.clear();
                }
                info!(table = R::TABLE, updated = updated.len(), "bulk update applied");
                self.inner.notify(Notification::success("Success", success));
                Ok(updated)
            }
            Err(err) => {
                warn!(table = R::TABLE, error = %err, "bulk update failed");
                self.inner.notify(Notification::error(
                    "Error",
                    format!("Failed to update {}s. Please try again.", R::NOUN),
                ));
                Err(err.into())
            }
        }
    }

    pub fn toggle_selected(&self, id: RecordId) -> bool {
        self.inner.state.write().selection.toggle(id)
    }

    /// Header checkbox over the visible rows
    pub fn select_all(&self, checked: bool) {
        let mut state = self.inner.state.write();
        let visible = state.visible_ids();
        state.selection.set_all(&visible, checked);
    }

    pub fn all_selected(&self) -> bool {
        let state = self.inner.state.read();
        state.selection.all_selected(&state.visible_ids())
    }

    pub fn clear_selection(&self) {
        self.inner.state.write().selection.clear();
    }

    pub fn selected(&self) -> Vec<RecordId> {
        self.inner.state.read().selection.ids().to_vec()
    }

    pub fn editing(&self) -> Option<EditingCell<R::Field>> {
        self.inner.state.read().editor.current().cloned()
    }

    /// Put a cell into edit mode.
    ///
    /// A different cell already in edit mode is left without committing,
    /// unless `commit_on_leave` is set; then a changed value is committed
    /// first and a failed commit keeps the old cell open.
    pub async fn start_edit(&self, id: RecordId, field: R::Field) -> Result<(), GridError> {
        let leaving = {
            let state = self.inner.state.read();
            if let Some(cell) = state.editor.current() {
                if cell.is_at(id, field) {
                    return Ok(());
                }
            }
            if !R::is_editable(field) {
                return Err(GridError::NotEditable(field.name()));
            }
            if !state.rows.iter().any(|row| row.id() == id) {
                return Err(GridError::UnknownRecord(id));
            }
            state.editor.current().cloned()
        };
        if let Some(cell) = leaving {
            self.leave_cell(cell).await?;
        }
        self.begin_edit(id, field)
    }

    fn begin_edit(&self, id: RecordId, field: R::Field) -> Result<(), GridError> {
        let mut state = self.inner.state.write();
        let GridState { rows, editor, .. } = &mut *state;
        let record = rows
            .iter()
            .find(|row| row.id() == id)
            .ok_or(GridError::UnknownRecord(id))?;
        editor.begin(record, field)?;
        Ok(())
    }

    async fn leave_cell(&self, cell: EditingCell<R::Field>) -> Result<(), GridError> {
        if self.inner.settings.commit_on_leave && cell.is_dirty() {
            return self.commit(cell).await;
        }
        if cell.is_dirty() {
            debug!(
                record = %cell.record_id,
                field = cell.field.name(),
                "pending edit discarded"
            );
        }
        Ok(())
    }

    /// Replace the pending text of the cell in edit mode
    pub fn set_pending(&self, text: impl Into<String>) -> Result<(), GridError> {
        self.inner.state.write().editor.set_pending(text)
    }

    pub fn cancel_edit(&self) -> Option<EditingCell<R::Field>> {
        self.inner.state.write().editor.cancel()
    }

    /// Keyboard input while a cell is in edit mode.
    ///
    /// Enter commits and stays open on failure. Escape discards. Tab and
    /// Shift+Tab move to the neighbouring editable cell without wrapping.
    pub async fn handle_key(&self, key: EditKey) -> Result<(), GridError> {
        match key {
            EditKey::Escape => {
                let dropped = self.cancel_edit();
                if let Some(cell) = dropped {
                    debug!(record = %cell.record_id, field = cell.field.name(), "edit cancelled");
                }
                Ok(())
            }
            EditKey::Enter => {
                let cell = {
                    let state = self.inner.state.read();
                    state.editor.current().cloned()
                };
                let cell = cell.ok_or(GridError::NotEditing)?;
                self.commit(cell).await
            }
            EditKey::Tab | EditKey::BackTab => {
                let (cell, target) = {
                    let state = self.inner.state.read();
                    let visible = state.visible_ids();
                    let target = state.editor.next_position(
                        &visible,
                        R::editable_fields(),
                        key == EditKey::BackTab,
                    );
                    (state.editor.current().cloned(), target)
                };
                let cell = cell.ok_or(GridError::NotEditing)?;
                let Some((id, field)) = target else {
                    return Ok(());
                };
                self.leave_cell(cell).await?;
                self.begin_edit(id, field)
            }
        }
    }

    async fn commit(&self, cell: EditingCell<R::Field>) -> Result<(), GridError> {
        let EditingCell {
            record_id,
            field,
            pending,
            ..
        } = cell;

        let value = match R::parse_value(field, &pending) {
            Ok(value) => value,
            Err(err) => {
                {
                    self.inner
                        .state
                        .write()
                        .editor
                        .mark_failed(record_id, field, err.to_string());
                }
                self.inner.notify(Notification::error(
                    format!("Error updating {}", R::NOUN),
                    err.to_string(),
                ));
                return Err(err.into());
            }
        };

        let scope = self.inner.session.scope();
        let patch = Patch::single(field, value);
        let result = self.inner.repository.update(&scope, record_id, &patch).await;
        if !self.inner.is_mounted() {
            return result.map(|_| ()).map_err(GridError::from);
        }

        match result {
            Ok(returned) => {
                let mut state = self.inner.state.write();
                if let Some(row) = state.row_mut(record_id) {
                    if let Err(err) = row.apply(&returned) {
                        warn!(record = %record_id, error = %err, "returned row did not merge");
                    }
                }
                state.editor.finish(record_id, field);
                debug!(record = %record_id, field = field.name(), "cell committed");
                Ok(())
            }
            Err(err) => {
                warn!(record = %record_id, field = field.name(), error = %err, "cell commit failed");
                {
                    self.inner
                        .state
                        .write()
                        .editor
                        .mark_failed(record_id, field, err.to_string());
                }
                self.inner.notify(Notification::error(
                    format!("Error updating {}", R::NOUN),
                    err.to_string(),
                ));
                Err(err.into())
            }
        }
    }
}

impl RecordGrid<Lead> {
    /// Set the call status of many leads at once
    pub async fn bulk_update_status(
        &self,
        ids: &[RecordId],
        status: CallStatus,
    ) -> Result<Vec<Lead>, GridError> {
        let message = format!(
            "Successfully updated {} to {}.",
            count_of(ids.len(), Lead::NOUN),
            status.label()
        );
        let patch = Patch::single(LeadField::CallStatus, status);
        self.apply_bulk(ids, &patch, message).await
    }

    /// Show only leads in one call status; `None` shows all
    pub async fn set_status_filter(&self, status: Option<CallStatus>) -> Result<(), GridError> {
        let filters = status
            .map(|status| vec![Filter::Eq(LeadField::CallStatus, status.into())])
            .unwrap_or_default();
        self.set_filters(filters).await
    }
}

fn capitalized(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

/// Realtime refresh target holding the grid weakly
struct GridRefresher<R: Record> {
    inner: Weak<GridInner<R>>,
}

#[async_trait]
impl<R: Record> RefreshTarget for GridRefresher<R> {
    async fn refresh_now(&self) {
        let Some(inner) = self.inner.upgrade() else {
            return;
        };
        let grid = RecordGrid { inner };
        debug!(table = R::TABLE, "realtime refresh");
        if let Err(err) = grid.load(false).await {
            debug!(table = R::TABLE, error = %err, "realtime refresh failed");
        }
    }
}
