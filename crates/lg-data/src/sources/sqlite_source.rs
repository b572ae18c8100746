//! SQLite-backed `leads` table

use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use lg_core::record::{FieldKey, Patch, Record};
use lg_core::{
    CallStatus, ChangeEvent, ChangeFeed, ChangeKind, Filter, Lead, LeadField, NewLead, Page, Query,
    RecordId, RemoteError, Repository, SortDirection, TenantScope, ValidationError, Value,
};
use parking_lot::Mutex;
use rusqlite::types::Value as SqlValue;
use rusqlite::{params_from_iter, Connection, Row};
use tokio::sync::broadcast;
use tracing::{debug, info};
use uuid::Uuid;

use crate::DataError;

const SCHEMA: &str = "
    CREATE TABLE IF NOT EXISTS leads (
        id TEXT PRIMARY KEY,
        organization_id TEXT NOT NULL,
        user_id TEXT NOT NULL,
        first_name TEXT NOT NULL,
        last_name TEXT NOT NULL,
        email TEXT,
        phone TEXT,
        company_name TEXT,
        timezone TEXT,
        call_status TEXT NOT NULL DEFAULT 'pending',
        call_attempts INTEGER NOT NULL DEFAULT 0,
        notes TEXT,
        source TEXT,
        last_called_at TEXT,
        created_at TEXT NOT NULL,
        updated_at TEXT NOT NULL
    );
    CREATE INDEX IF NOT EXISTS idx_leads_organization ON leads(organization_id);
";

const CHANGE_CHANNEL_CAPACITY: usize = 256;

/// Lead table stored in a SQLite database.
///
/// Blocking SQLite work runs on the blocking pool. Every successful write is
/// published on the change feed.
pub struct SqliteLeadStore {
    conn: Arc<Mutex<Connection>>,
    changes: broadcast::Sender<ChangeEvent>,
}

impl SqliteLeadStore {
    /// Open (and create if needed) a database file
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, DataError> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let conn = Connection::open(path)?;
        info!(path = %path.display(), "opened lead database");
        Self::from_connection(conn)
    }

    /// Private in-memory database
    pub fn open_in_memory() -> Result<Self, DataError> {
        Self::from_connection(Connection::open_in_memory()?)
    }

    fn from_connection(conn: Connection) -> Result<Self, DataError> {
        conn.execute_batch(SCHEMA)?;
        let (changes, _) = broadcast::channel(CHANGE_CHANNEL_CAPACITY);
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
            changes,
        })
    }

    /// Run blocking work against the connection
    async fn with_conn<T, F>(&self, work: F) -> Result<T, DataError>
    where
        T: Send + 'static,
        F: FnOnce(&mut Connection) -> Result<T, DataError> + Send + 'static,
    {
        let conn = self.conn.clone();
        tokio::task::spawn_blocking(move || {
            let mut conn = conn.lock();
            work(&mut conn)
        })
        .await?
    }

    fn publish(&self, kind: ChangeKind, record_id: RecordId) {
        let _ = self.changes.send(ChangeEvent {
            kind,
            table: Lead::TABLE,
            record_id: Some(record_id),
        });
    }

    /// Count rows of one organization
    pub async fn count(&self, scope: &TenantScope) -> Result<usize, DataError> {
        let org = scope.organization_id.to_string();
        self.with_conn(move |conn| {
            let count: i64 = conn.query_row(
                "SELECT COUNT(*) FROM leads WHERE organization_id = ?1",
                [org],
                |row| row.get(0),
            )?;
            Ok(count as usize)
        })
        .await
    }
}

fn column_list() -> String {
    LeadField::ALL
        .iter()
        .map(|field| field.name())
        .collect::<Vec<_>>()
        .join(", ")
}

fn to_sql(value: &Value) -> SqlValue {
    match value {
        Value::Null => SqlValue::Null,
        Value::Text(s) => SqlValue::Text(s.clone()),
        Value::Int(v) => SqlValue::Integer(*v),
        Value::Bool(v) => SqlValue::Integer(i64::from(*v)),
        Value::Timestamp(ts) => SqlValue::Text(ts.to_rfc3339()),
    }
}

fn parse_uuid(raw: String) -> Result<Uuid, DataError> {
    Uuid::parse_str(&raw).map_err(|e| DataError::Corrupt(format!("bad uuid '{}': {}", raw, e)))
}

fn parse_ts(raw: String) -> Result<DateTime<Utc>, DataError> {
    DateTime::parse_from_rfc3339(&raw)
        .map(|ts| ts.with_timezone(&Utc))
        .map_err(|e| DataError::Corrupt(format!("bad timestamp '{}': {}", raw, e)))
}

/// Decode a row selected with [`column_list`]
fn row_to_lead(row: &Row<'_>) -> Result<Lead, DataError> {
    let status: String = row.get(9)?;
    Ok(Lead {
        id: parse_uuid(row.get(0)?)?,
        organization_id: parse_uuid(row.get(1)?)?,
        user_id: parse_uuid(row.get(2)?)?,
        first_name: row.get(3)?,
        last_name: row.get(4)?,
        email: row.get(5)?,
        phone: row.get(6)?,
        company_name: row.get(7)?,
        timezone: row.get(8)?,
        call_status: status.parse::<CallStatus>()?,
        call_attempts: row.get(10)?,
        notes: row.get(11)?,
        source: row.get(12)?,
        last_called_at: row.get::<_, Option<String>>(13)?.map(parse_ts).transpose()?,
        created_at: parse_ts(row.get(14)?)?,
        updated_at: parse_ts(row.get(15)?)?,
    })
}

fn lead_params(lead: &Lead) -> Vec<SqlValue> {
    LeadField::ALL
        .iter()
        .map(|field| to_sql(&lead.value(*field)))
        .collect()
}

/// WHERE clause and parameters for a query, tenant filter first
fn where_clause(query: &Query<LeadField>) -> (String, Vec<SqlValue>) {
    let mut clause = String::from(" WHERE organization_id = ?1");
    let mut params = vec![SqlValue::Text(query.scope.organization_id.to_string())];

    for filter in &query.filters {
        let op = match filter {
            Filter::Eq(..) => "=",
            Filter::Gte(..) => ">=",
            Filter::Lte(..) => "<=",
        };
        params.push(to_sql(filter.value()));
        clause.push_str(&format!(" AND {} {} ?{}", filter.field().name(), op, params.len()));
    }

    if let Some(search) = &query.search {
        let escaped = search
            .needle
            .replace('\\', "\\\\")
            .replace('%', "\\%")
            .replace('_', "\\_");
        params.push(SqlValue::Text(format!("%{}%", escaped)));
        clause.push_str(&format!(
            " AND {} LIKE ?{} ESCAPE '\\'",
            search.field.name(),
            params.len()
        ));
    }

    (clause, params)
}

fn select_one(conn: &Connection, scope: &TenantScope, id: RecordId) -> Result<Option<Lead>, DataError> {
    let sql = format!(
        "SELECT {} FROM leads WHERE id = ?1 AND organization_id = ?2",
        column_list()
    );
    let mut stmt = conn.prepare(&sql)?;
    let mut rows = stmt.query([id.to_string(), scope.organization_id.to_string()])?;
    match rows.next()? {
        Some(row) => row_to_lead(row).map(Some),
        None => Ok(None),
    }
}

fn write_lead(conn: &Connection, lead: &Lead) -> Result<(), DataError> {
    let assignments = LeadField::ALL
        .iter()
        .enumerate()
        .skip(1)
        .map(|(idx, field)| format!("{} = ?{}", field.name(), idx + 1))
        .collect::<Vec<_>>()
        .join(", ");
    let sql = format!("UPDATE leads SET {} WHERE id = ?1", assignments);
    conn.execute(&sql, params_from_iter(lead_params(lead)))?;
    Ok(())
}

fn check_mutable(patch: &Patch<LeadField>) -> Result<(), DataError> {
    match patch.fields().find(|field| Lead::is_immutable(*field)) {
        Some(field) => Err(ValidationError::Immutable { field: field.name() }.into()),
        None => Ok(()),
    }
}

#[async_trait]
impl Repository<Lead> for SqliteLeadStore {
    async fn fetch_page(&self, query: &Query<LeadField>) -> Result<Page<Lead>, RemoteError> {
        let query = query.clone();
        let page = self
            .with_conn(move |conn| {
                let (clause, mut params) = where_clause(&query);

                let count_sql = format!("SELECT COUNT(*) FROM leads{}", clause);
                let total: i64 =
                    conn.query_row(&count_sql, params_from_iter(params.iter()), |row| row.get(0))?;

                let mut sql = format!("SELECT {} FROM leads{}", column_list(), clause);
                match query.sort {
                    Some((field, direction)) => {
                        let dir = match direction {
                            SortDirection::Ascending => "ASC",
                            SortDirection::Descending => "DESC",
                        };
                        sql.push_str(&format!(
                            " ORDER BY {} COLLATE NOCASE {}, {} {}, rowid",
                            field.name(),
                            dir,
                            field.name(),
                            dir
                        ));
                    }
                    None => sql.push_str(" ORDER BY rowid"),
                }
                if let Some((offset, limit)) = query.range {
                    params.push(SqlValue::Integer(limit as i64));
                    params.push(SqlValue::Integer(offset as i64));
                    sql.push_str(&format!(" LIMIT ?{} OFFSET ?{}", params.len() - 1, params.len()));
                }

                let mut stmt = conn.prepare(&sql)?;
                let mut rows = stmt.query(params_from_iter(params.iter()))?;
                let mut leads = Vec::new();
                while let Some(row) = rows.next()? {
                    leads.push(row_to_lead(row)?);
                }
                Ok(Page {
                    rows: leads,
                    total: total as usize,
                })
            })
            .await?;
        debug!(total = page.total, returned = page.rows.len(), "sqlite fetch");
        Ok(page)
    }

    async fn fetch_one(&self, scope: &TenantScope, id: RecordId) -> Result<Option<Lead>, RemoteError> {
        let scope = *scope;
        Ok(self.with_conn(move |conn| select_one(conn, &scope, id)).await?)
    }

    async fn insert(&self, scope: &TenantScope, draft: NewLead) -> Result<Lead, RemoteError> {
        let lead = Lead::from_draft(Uuid::new_v4(), scope.organization_id, draft, Utc::now());
        let params = lead_params(&lead);
        self.with_conn(move |conn| {
            let placeholders = (1..=params.len())
                .map(|idx| format!("?{}", idx))
                .collect::<Vec<_>>()
                .join(", ");
            let sql = format!(
                "INSERT INTO leads ({}) VALUES ({})",
                column_list(),
                placeholders
            );
            conn.execute(&sql, params_from_iter(params))?;
            Ok(())
        })
        .await?;
        self.publish(ChangeKind::Insert, lead.id);
        Ok(lead)
    }

    async fn update(
        &self,
        scope: &TenantScope,
        id: RecordId,
        patch: &Patch<LeadField>,
    ) -> Result<Patch<LeadField>, RemoteError> {
        check_mutable(patch)?;
        let scope = *scope;
        let patch = patch.clone();
        let returned = self
            .with_conn(move |conn| {
                let mut lead = select_one(conn, &scope, id)?.ok_or(DataError::NotFound(id))?;
                lead.apply(&patch)?;
                lead.touch(Utc::now());
                write_lead(conn, &lead)?;
                Ok(lead.snapshot())
            })
            .await?;
        self.publish(ChangeKind::Update, id);
        Ok(returned)
    }

    async fn update_many(
        &self,
        scope: &TenantScope,
        ids: &[RecordId],
        patch: &Patch<LeadField>,
    ) -> Result<Vec<Lead>, RemoteError> {
        check_mutable(patch)?;
        let scope = *scope;
        let ids = ids.to_vec();
        let patch = patch.clone();
        let updated = self
            .with_conn(move |conn| {
                let tx = conn.transaction()?;
                let now = Utc::now();
                let mut updated = Vec::new();
                for id in ids {
                    // Ids outside the tenant or already gone are skipped
                    if let Some(mut lead) = select_one(&tx, &scope, id)? {
                        lead.apply(&patch)?;
                        lead.touch(now);
                        write_lead(&tx, &lead)?;
                        updated.push(lead);
                    }
                }
                tx.commit()?;
                Ok(updated)
            })
            .await?;
        for lead in &updated {
            self.publish(ChangeKind::Update, lead.id);
        }
        Ok(updated)
    }

    async fn delete(&self, scope: &TenantScope, id: RecordId) -> Result<(), RemoteError> {
        let scope = *scope;
        self.with_conn(move |conn| {
            let removed = conn.execute(
                "DELETE FROM leads WHERE id = ?1 AND organization_id = ?2",
                [id.to_string(), scope.organization_id.to_string()],
            )?;
            if removed == 0 {
                return Err(DataError::NotFound(id));
            }
            Ok(())
        })
        .await?;
        self.publish(ChangeKind::Delete, id);
        Ok(())
    }
}

impl ChangeFeed for SqliteLeadStore {
    fn subscribe(&self) -> broadcast::Receiver<ChangeEvent> {
        self.changes.subscribe()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scope() -> TenantScope {
        TenantScope {
            organization_id: Uuid::new_v4(),
        }
    }

    async fn seeded(scope: &TenantScope) -> SqliteLeadStore {
        let store = SqliteLeadStore::open_in_memory().unwrap();
        for (first, last, company) in [
            ("Ada", "lovelace", "Analytical"),
            ("Grace", "Hopper", "Navy"),
            ("Alan", "Turing", "Bletchley"),
            ("Barbara", "Liskov", "MIT"),
        ] {
            store
                .insert(scope, NewLead::new(first, last).with_phone("555 0100 200").with_company(company))
                .await
                .unwrap();
        }
        store
    }

    #[tokio::test]
    async fn test_roundtrip_through_sql() {
        let scope = scope();
        let store = seeded(&scope).await;
        let page = store.fetch_page(&Query::new(scope)).await.unwrap();
        assert_eq!(page.total, 4);
        assert_eq!(page.rows[0].first_name, "Ada");
        assert_eq!(page.rows[0].call_status, CallStatus::Pending);
        assert_eq!(page.rows[0].organization_id, scope.organization_id);
    }

    #[tokio::test]
    async fn test_sort_is_case_insensitive_and_paged() {
        let scope = scope();
        let store = seeded(&scope).await;
        let query = Query::new(scope)
            .sort(LeadField::LastName, SortDirection::Ascending)
            .range(1, 2);
        let page = store.fetch_page(&query).await.unwrap();
        assert_eq!(page.total, 4);
        let names: Vec<_> = page.rows.iter().map(|l| l.last_name.as_str()).collect();
        assert_eq!(names, vec!["Liskov", "lovelace"]);
    }

    #[tokio::test]
    async fn test_search_escapes_wildcards() {
        let scope = scope();
        let store = seeded(&scope).await;
        let hits = store
            .fetch_page(&Query::new(scope).search(LeadField::LastName, "OP"))
            .await
            .unwrap();
        assert_eq!(hits.total, 1);
        let none = store
            .fetch_page(&Query::new(scope).search(LeadField::LastName, "%"))
            .await
            .unwrap();
        assert_eq!(none.total, 0);
    }

    #[tokio::test]
    async fn test_update_returns_row_and_publishes() {
        let scope = scope();
        let store = seeded(&scope).await;
        let mut changes = store.subscribe();
        let id = store.fetch_page(&Query::new(scope)).await.unwrap().rows[0].id;

        let patch = Patch::single(LeadField::Notes, "call back tuesday");
        let returned = store.update(&scope, id, &patch).await.unwrap();
        assert_eq!(returned.get(LeadField::Notes), Some(&Value::from("call back tuesday")));
        assert_eq!(changes.recv().await.unwrap().kind, ChangeKind::Update);

        let stored = store.fetch_one(&scope, id).await.unwrap().unwrap();
        assert_eq!(stored.notes.as_deref(), Some("call back tuesday"));
    }

    #[tokio::test]
    async fn test_other_tenant_cannot_delete() {
        let scope = scope();
        let store = seeded(&scope).await;
        let id = store.fetch_page(&Query::new(scope)).await.unwrap().rows[0].id;
        let theirs = TenantScope {
            organization_id: Uuid::new_v4(),
        };
        let err = store.delete(&theirs, id).await.unwrap_err();
        assert_eq!(err, RemoteError::NotFound(id));
        assert_eq!(store.count(&scope).await.unwrap(), 4);
    }

    #[tokio::test]
    async fn test_update_many_in_one_transaction() {
        let scope = scope();
        let store = seeded(&scope).await;
        let ids: Vec<_> = store
            .fetch_page(&Query::new(scope))
            .await
            .unwrap()
            .rows
            .iter()
            .map(|l| l.id)
            .collect();
        let patch = Patch::single(LeadField::CallStatus, CallStatus::NoAnswer);
        let updated = store.update_many(&scope, &ids[..3], &patch).await.unwrap();
        assert_eq!(updated.len(), 3);

        let filtered = store
            .fetch_page(&Query::new(scope).filter(Filter::Eq(LeadField::CallStatus, CallStatus::NoAnswer.into())))
            .await
            .unwrap();
        assert_eq!(filtered.total, 3);
    }
}
