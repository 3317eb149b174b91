/*!
 * Repository layer for database operations.
 *
 * This module provides a high-level API for all database operations,
 * abstracting away the SQL details and providing type-safe access.
 * Timestamps are stored as RFC 3339 strings in UTC with microsecond
 * precision, so lexical order matches chronological order.
 */

use anyhow::{Context, Result};
use chrono::{DateTime, SecondsFormat, Utc};
use log::debug;
use rusqlite::{params, params_from_iter, Connection, OptionalExtension};

use super::connection::DatabaseConnection;
use crate::glossary::GlossaryTerm;
use crate::memory::{source_hash, MemoryEntry};
use crate::workflow::{Actor, Page, RequestFilter, TranslationRequest, WorkflowEvent};

/// Repository for database operations
#[derive(Clone)]
pub struct Repository {
    /// Database connection
    db: DatabaseConnection,
}

/// Raw `workflow_events` row before parsing
struct EventRow {
    id: String,
    request_id: String,
    event_type: String,
    actor_id: String,
    actor_name: String,
    actor_role: String,
    timestamp: String,
    details: String,
}

impl EventRow {
    fn from_row(row: &rusqlite::Row) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            request_id: row.get(1)?,
            event_type: row.get(2)?,
            actor_id: row.get(3)?,
            actor_name: row.get(4)?,
            actor_role: row.get(5)?,
            timestamp: row.get(6)?,
            details: row.get(7)?,
        })
    }

    fn into_event(self) -> Result<WorkflowEvent> {
        Ok(WorkflowEvent {
            event_type: self.event_type.parse()?,
            actor: Actor {
                id: self.actor_id,
                name: self.actor_name,
                role: self.actor_role.parse()?,
            },
            timestamp: parse_timestamp(&self.timestamp)?,
            details: serde_json::from_str(&self.details)
                .with_context(|| format!("Corrupt details of event {}", self.id))?,
            id: self.id,
            request_id: self.request_id,
        })
    }
}

const EVENT_COLUMNS: &str =
    "e.id, e.request_id, e.event_type, e.actor_id, e.actor_name, e.actor_role, e.timestamp, e.details";

impl Repository {
    /// Create a new repository with the given database connection
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }

    /// Create a repository with the default database location
    pub fn new_default() -> Result<Self> {
        let db = DatabaseConnection::new_default()?;
        Ok(Self::new(db))
    }

    /// Create a repository with an in-memory database (for testing)
    pub fn new_in_memory() -> Result<Self> {
        let db = DatabaseConnection::new_in_memory()?;
        Ok(Self::new(db))
    }

    pub fn connection(&self) -> &DatabaseConnection {
        &self.db
    }

    // =========================================================================
    // Translation Request Operations
    // =========================================================================

    /// Insert a new request together with its creation events
    pub async fn insert_request(
        &self,
        request: &TranslationRequest,
        events: Vec<WorkflowEvent>,
    ) -> Result<()> {
        let request = request.clone();

        self.db
            .transaction_async(move |tx| {
                let document = serde_json::to_string(&request)?;
                tx.execute(
                    r#"
                    INSERT INTO translation_requests (
                        id, content_id, source_language, target_language, status, priority,
                        domain, translator_id, deadline, created_at, updated_at, version, document
                    ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)
                    "#,
                    params![
                        request.id,
                        request.content_id,
                        request.source_language,
                        request.target_language,
                        request.status().to_string(),
                        request.workflow.priority.rank(),
                        request.domain(),
                        request.translator_id(),
                        request.workflow.deadline.as_ref().map(format_timestamp),
                        format_timestamp(&request.created_at),
                        format_timestamp(&request.updated_at),
                        request.version,
                        document,
                    ],
                )?;
                Self::append_events_sync(tx, &events)?;
                Ok(())
            })
            .await
    }

    /// Get a request by ID
    pub async fn get_request(&self, request_id: &str) -> Result<Option<TranslationRequest>> {
        let request_id = request_id.to_string();

        self.db
            .execute_async(move |conn| {
                let document: Option<String> = conn
                    .query_row(
                        "SELECT document FROM translation_requests WHERE id = ?1",
                        [&request_id],
                        |row| row.get(0),
                    )
                    .optional()?;

                document.map(|d| parse_request(&d)).transpose()
            })
            .await
    }

    /// Persist a modified request and its events in one transaction
    ///
    /// The write only happens when the stored version still equals
    /// `request.version`; the stored copy then carries `version + 1`.
    /// Returns `false` on a version conflict, in which case nothing is
    /// written. Callers bump their own copy on success.
    pub async fn commit_request(
        &self,
        request: &TranslationRequest,
        events: Vec<WorkflowEvent>,
    ) -> Result<bool> {
        let expected_version = request.version;
        let mut next = request.clone();
        next.version += 1;

        self.db
            .transaction_async(move |tx| {
                let document = serde_json::to_string(&next)?;
                let changed = tx.execute(
                    r#"
                    UPDATE translation_requests
                    SET status = ?1, priority = ?2, domain = ?3, translator_id = ?4, deadline = ?5,
                        updated_at = ?6, version = ?7, document = ?8
                    WHERE id = ?9 AND version = ?10
                    "#,
                    params![
                        next.status().to_string(),
                        next.workflow.priority.rank(),
                        next.domain(),
                        next.translator_id(),
                        next.workflow.deadline.as_ref().map(format_timestamp),
                        format_timestamp(&next.updated_at),
                        next.version,
                        document,
                        next.id,
                        expected_version,
                    ],
                )?;

                if changed == 0 {
                    debug!("Version conflict on request {} (expected v{})", next.id, expected_version);
                    return Ok(false);
                }

                Self::append_events_sync(tx, &events)?;
                Ok(true)
            })
            .await
    }

    /// Requests in `requested` status, highest priority first, then oldest first
    pub async fn list_pending(&self, limit: Option<usize>) -> Result<Vec<TranslationRequest>> {
        let limit = limit.map(|l| l as i64).unwrap_or(-1);

        self.db
            .execute_async(move |conn| {
                let mut stmt = conn.prepare(
                    r#"
                    SELECT document FROM translation_requests
                    WHERE status = 'requested'
                    ORDER BY priority DESC, created_at ASC, id ASC
                    LIMIT ?1
                    "#,
                )?;
                let documents = stmt
                    .query_map([limit], |row| row.get::<_, String>(0))?
                    .collect::<rusqlite::Result<Vec<_>>>()?;

                documents.iter().map(|d| parse_request(d)).collect()
            })
            .await
    }

    /// Filtered, paginated search; newest requests first
    pub async fn search_requests(
        &self,
        filter: &RequestFilter,
        default_page_size: usize,
    ) -> Result<Page<TranslationRequest>> {
        let filter = filter.clone();
        let page_size = filter.page_size.unwrap_or(default_page_size).max(1);
        let page = filter.page;

        self.db
            .execute_async(move |conn| {
                let mut clauses: Vec<String> = Vec::new();
                let mut values: Vec<rusqlite::types::Value> = Vec::new();

                if !filter.statuses.is_empty() {
                    let placeholders = vec!["?"; filter.statuses.len()].join(", ");
                    clauses.push(format!("status IN ({})", placeholders));
                    values.extend(filter.statuses.iter().map(|s| s.to_string().into()));
                }
                let equals = [
                    ("content_id", filter.content_id.clone()),
                    ("source_language", filter.source_language.clone()),
                    ("target_language", filter.target_language.clone()),
                    ("translator_id", filter.translator_id.clone()),
                    ("domain", filter.domain.clone()),
                ];
                for (column, value) in equals {
                    if let Some(value) = value {
                        clauses.push(format!("{} = ?", column));
                        values.push(value.into());
                    }
                }
                if let Some(priority) = filter.priority {
                    clauses.push("priority = ?".to_string());
                    values.push(priority.rank().into());
                }
                if let Some(from) = filter.created_from {
                    clauses.push("created_at >= ?".to_string());
                    values.push(format_timestamp(&from).into());
                }
                if let Some(to) = filter.created_to {
                    clauses.push("created_at <= ?".to_string());
                    values.push(format_timestamp(&to).into());
                }

                let where_sql = if clauses.is_empty() {
                    String::new()
                } else {
                    format!("WHERE {}", clauses.join(" AND "))
                };

                let total: i64 = conn.query_row(
                    &format!("SELECT COUNT(*) FROM translation_requests {}", where_sql),
                    params_from_iter(values.iter()),
                    |row| row.get(0),
                )?;

                let mut paged = values.clone();
                paged.push((page_size as i64).into());
                paged.push(((page * page_size) as i64).into());

                let mut stmt = conn.prepare(&format!(
                    "SELECT document FROM translation_requests {} ORDER BY created_at DESC, id ASC LIMIT ? OFFSET ?",
                    where_sql
                ))?;
                let documents = stmt
                    .query_map(params_from_iter(paged.iter()), |row| row.get::<_, String>(0))?
                    .collect::<rusqlite::Result<Vec<_>>>()?;

                let items = documents
                    .iter()
                    .map(|d| parse_request(d))
                    .collect::<Result<Vec<_>>>()?;

                Ok(Page {
                    items,
                    total: total as usize,
                    page,
                    page_size,
                })
            })
            .await
    }

    /// Requests created inside `[from, to]`, oldest first
    pub async fn list_requests_created_between(
        &self,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Vec<TranslationRequest>> {
        self.db
            .execute_async(move |conn| {
                let mut stmt = conn.prepare(
                    r#"
                    SELECT document FROM translation_requests
                    WHERE created_at >= ?1 AND created_at <= ?2
                    ORDER BY created_at ASC
                    "#,
                )?;
                let documents = stmt
                    .query_map(params![format_timestamp(&from), format_timestamp(&to)], |row| {
                        row.get::<_, String>(0)
                    })?
                    .collect::<rusqlite::Result<Vec<_>>>()?;

                documents.iter().map(|d| parse_request(d)).collect()
            })
            .await
    }

    // =========================================================================
    // Workflow Event Operations
    // =========================================================================

    fn append_events_sync(conn: &Connection, events: &[WorkflowEvent]) -> Result<()> {
        let mut stmt = conn.prepare_cached(
            r#"
            INSERT INTO workflow_events (
                id, request_id, event_type, actor_id, actor_name, actor_role, timestamp, details
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
            "#,
        )?;

        for event in events {
            stmt.execute(params![
                event.id,
                event.request_id,
                event.event_type.to_string(),
                event.actor.id,
                event.actor.name,
                event.actor.role.to_string(),
                format_timestamp(&event.timestamp),
                serde_json::to_string(&event.details)?,
            ])?;
        }
        Ok(())
    }

    /// Events of one request in append order
    pub async fn events_for_request(&self, request_id: &str) -> Result<Vec<WorkflowEvent>> {
        let request_id = request_id.to_string();

        self.db
            .execute_async(move |conn| {
                let mut stmt = conn.prepare(&format!(
                    "SELECT {} FROM workflow_events e WHERE e.request_id = ?1 ORDER BY e.seq ASC",
                    EVENT_COLUMNS
                ))?;
                let rows = stmt
                    .query_map([&request_id], EventRow::from_row)?
                    .collect::<rusqlite::Result<Vec<_>>>()?;

                rows.into_iter().map(EventRow::into_event).collect()
            })
            .await
    }

    /// All events, whatever their timestamp, of the requests created inside `[from, to]`
    pub async fn events_for_requests_created_between(
        &self,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Vec<WorkflowEvent>> {
        self.db
            .execute_async(move |conn| {
                let mut stmt = conn.prepare(&format!(
                    r#"
                    SELECT {} FROM workflow_events e
                    JOIN translation_requests r ON r.id = e.request_id
                    WHERE r.created_at >= ?1 AND r.created_at <= ?2
                    ORDER BY e.seq ASC
                    "#,
                    EVENT_COLUMNS
                ))?;
                let rows = stmt
                    .query_map(
                        params![format_timestamp(&from), format_timestamp(&to)],
                        EventRow::from_row,
                    )?
                    .collect::<rusqlite::Result<Vec<_>>>()?;

                rows.into_iter().map(EventRow::into_event).collect()
            })
            .await
    }

    // =========================================================================
    // Translation Memory Operations
    // =========================================================================

    /// Every persisted TM entry, oldest first
    pub async fn load_memory_entries(&self) -> Result<Vec<MemoryEntry>> {
        self.db
            .execute_async(|conn| {
                let mut stmt = conn.prepare(
                    r#"
                    SELECT id, source_text, target_text, source_language, target_language, domain,
                           context, confidence, verified, usage_count, created_by, created_at
                    FROM tm_entries ORDER BY seq ASC
                    "#,
                )?;
                let entries = stmt
                    .query_map([], |row| {
                        let created_at: String = row.get(11)?;
                        let created_at = DateTime::parse_from_rfc3339(&created_at)
                            .map_err(|e| {
                                rusqlite::Error::FromSqlConversionFailure(11, rusqlite::types::Type::Text, Box::new(e))
                            })?
                            .with_timezone(&Utc);

                        Ok(MemoryEntry {
                            id: row.get(0)?,
                            source_text: row.get(1)?,
                            target_text: row.get(2)?,
                            source_language: row.get(3)?,
                            target_language: row.get(4)?,
                            domain: row.get(5)?,
                            context: row.get(6)?,
                            confidence: row.get(7)?,
                            verified: row.get(8)?,
                            usage_count: row.get::<_, i64>(9)?.max(0) as u64,
                            created_by: row.get(10)?,
                            created_at,
                        })
                    })?
                    .collect::<rusqlite::Result<Vec<_>>>()?;

                Ok(entries)
            })
            .await
    }

    /// Insert an entry and drop the entries it superseded or evicted, atomically
    pub async fn store_memory_entry(&self, entry: &MemoryEntry, removed_ids: Vec<String>) -> Result<()> {
        let entry = entry.clone();

        self.db
            .transaction_async(move |tx| {
                tx.execute(
                    r#"
                    INSERT INTO tm_entries (
                        id, source_hash, source_text, target_text, source_language, target_language,
                        domain, context, confidence, verified, usage_count, created_by, created_at
                    ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)
                    "#,
                    params![
                        entry.id,
                        source_hash(&entry.source_text),
                        entry.source_text,
                        entry.target_text,
                        entry.source_language,
                        entry.target_language,
                        entry.domain,
                        entry.context,
                        entry.confidence,
                        entry.verified,
                        entry.usage_count as i64,
                        entry.created_by,
                        format_timestamp(&entry.created_at),
                    ],
                )?;
                Self::delete_memory_entries_sync(tx, &removed_ids)?;
                Ok(())
            })
            .await
    }

    /// Delete TM entries by id
    pub async fn delete_memory_entries(&self, ids: Vec<String>) -> Result<()> {
        self.db
            .transaction_async(move |tx| Self::delete_memory_entries_sync(tx, &ids))
            .await
    }

    fn delete_memory_entries_sync(conn: &Connection, ids: &[String]) -> Result<()> {
        let mut stmt = conn.prepare_cached("DELETE FROM tm_entries WHERE id = ?1")?;
        for id in ids {
            stmt.execute([id])?;
        }
        Ok(())
    }

    pub async fn increment_memory_usage(&self, entry_id: &str) -> Result<()> {
        let entry_id = entry_id.to_string();

        self.db
            .execute_async(move |conn| {
                conn.execute(
                    "UPDATE tm_entries SET usage_count = usage_count + 1 WHERE id = ?1",
                    [&entry_id],
                )?;
                Ok(())
            })
            .await
    }

    // =========================================================================
    // Glossary Operations
    // =========================================================================

    pub async fn load_glossary_terms(&self) -> Result<Vec<GlossaryTerm>> {
        self.db
            .execute_async(|conn| {
                let mut stmt = conn.prepare("SELECT id, document FROM glossary_terms ORDER BY term ASC")?;
                let rows = stmt
                    .query_map([], |row| Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?)))?
                    .collect::<rusqlite::Result<Vec<_>>>()?;

                rows.into_iter()
                    .map(|(id, document)| {
                        serde_json::from_str(&document)
                            .with_context(|| format!("Corrupt glossary term {}", id))
                    })
                    .collect()
            })
            .await
    }

    pub async fn upsert_glossary_term(&self, term: &GlossaryTerm) -> Result<()> {
        let term = term.clone();

        self.db
            .execute_async(move |conn| {
                conn.execute(
                    r#"
                    INSERT INTO glossary_terms (id, term, source_language, domain, document, updated_at)
                    VALUES (?1, ?2, ?3, ?4, ?5, ?6)
                    ON CONFLICT(id) DO UPDATE SET
                        term = excluded.term,
                        source_language = excluded.source_language,
                        domain = excluded.domain,
                        document = excluded.document,
                        updated_at = excluded.updated_at
                    "#,
                    params![
                        term.id,
                        term.term,
                        term.source_language,
                        term.domain,
                        serde_json::to_string(&term)?,
                        format_timestamp(&Utc::now()),
                    ],
                )?;
                Ok(())
            })
            .await
    }
}

/// Storage format of every timestamp column
pub fn format_timestamp(at: &DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn parse_timestamp(value: &str) -> Result<DateTime<Utc>> {
    Ok(DateTime::parse_from_rfc3339(value)
        .with_context(|| format!("Invalid timestamp: {}", value))?
        .with_timezone(&Utc))
}

fn parse_request(document: &str) -> Result<TranslationRequest> {
    serde_json::from_str(document).context("Corrupt translation request document")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app_config::RateType;
    use crate::workflow::{NewRequestParams, Priority, RequestMetadata, RequestStatus};
    use chrono::Duration;

    fn create_test_repo() -> Repository {
        Repository::new_in_memory().expect("Failed to create test repository")
    }

    fn request(id: &str, priority: Priority, created_at: DateTime<Utc>) -> TranslationRequest {
        TranslationRequest::new(
            id.to_string(),
            NewRequestParams {
                content_id: format!("content-{}", id),
                source_language: "en".to_string(),
                target_language: "es".to_string(),
                text: "Good morning class".to_string(),
                context: None,
                priority,
                deadline: None,
                metadata: RequestMetadata {
                    domain: Some("education".to_string()),
                    ..RequestMetadata::default()
                },
            },
            RateType::PerWord,
            0.1,
            250.0,
            created_at,
        )
    }

    fn creation_event(request: &TranslationRequest) -> WorkflowEvent {
        WorkflowEvent::status_change(
            &request.id,
            None,
            RequestStatus::Requested,
            &Actor::system(),
            request.created_at,
        )
    }

    async fn insert(repo: &Repository, request: &TranslationRequest) {
        repo.insert_request(request, vec![creation_event(request)])
            .await
            .expect("Failed to insert request");
    }

    fn memory_entry(id: &str, source: &str) -> MemoryEntry {
        MemoryEntry {
            id: id.to_string(),
            source_text: source.to_string(),
            target_text: format!("es:{}", source),
            source_language: "en".to_string(),
            target_language: "es".to_string(),
            domain: None,
            context: None,
            confidence: 85.0,
            verified: false,
            usage_count: 0,
            created_by: "test".to_string(),
            created_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn test_insertRequest_shouldStoreDocumentAndEvent() {
        let repo = create_test_repo();
        let req = request("req-1", Priority::High, Utc::now());

        insert(&repo, &req).await;

        let loaded = repo.get_request("req-1").await.unwrap().expect("Request not found");
        assert_eq!(loaded.id, req.id);
        assert_eq!(loaded.source.text, "Good morning class");
        assert_eq!(loaded.workflow.priority, Priority::High);
        assert_eq!(loaded.created_at, req.created_at);

        let events = repo.events_for_request("req-1").await.unwrap();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].new_status(), Some(RequestStatus::Requested));
    }

    #[tokio::test]
    async fn test_getRequest_unknown_shouldReturnNone() {
        let repo = create_test_repo();
        assert!(repo.get_request("missing").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_commitRequest_shouldBumpVersion() {
        let repo = create_test_repo();
        let mut req = request("req-1", Priority::Normal, Utc::now());
        insert(&repo, &req).await;

        req.workflow.status = RequestStatus::Withdrawn;
        let committed = repo.commit_request(&req, vec![]).await.unwrap();

        assert!(committed);
        let loaded = repo.get_request("req-1").await.unwrap().unwrap();
        assert_eq!(loaded.version, 1);
        assert_eq!(loaded.status(), RequestStatus::Withdrawn);
    }

    #[tokio::test]
    async fn test_commitRequest_staleVersion_shouldWriteNothing() {
        let repo = create_test_repo();
        let req = request("req-1", Priority::Normal, Utc::now());
        insert(&repo, &req).await;

        let mut first = req.clone();
        first.workflow.status = RequestStatus::Withdrawn;
        assert!(repo.commit_request(&first, vec![]).await.unwrap());

        let mut stale = req.clone();
        stale.workflow.priority = Priority::Urgent;
        let event = WorkflowEvent::status_change(
            &req.id,
            Some(RequestStatus::Requested),
            RequestStatus::Withdrawn,
            &Actor::system(),
            Utc::now(),
        );
        let committed = repo.commit_request(&stale, vec![event]).await.unwrap();

        assert!(!committed);
        let loaded = repo.get_request("req-1").await.unwrap().unwrap();
        assert_eq!(loaded.workflow.priority, Priority::Normal);
        assert_eq!(repo.events_for_request("req-1").await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_listPending_shouldOrderByPriorityThenAge() {
        let repo = create_test_repo();
        let t0 = Utc::now() - Duration::hours(3);
        insert(&repo, &request("old-normal", Priority::Normal, t0)).await;
        insert(&repo, &request("new-urgent", Priority::Urgent, t0 + Duration::hours(2))).await;
        insert(&repo, &request("new-normal", Priority::Normal, t0 + Duration::hours(1))).await;

        let mut withdrawn = request("withdrawn", Priority::Urgent, t0);
        insert(&repo, &withdrawn).await;
        withdrawn.workflow.status = RequestStatus::Withdrawn;
        repo.commit_request(&withdrawn, vec![]).await.unwrap();

        let pending = repo.list_pending(None).await.unwrap();
        let ids: Vec<&str> = pending.iter().map(|r| r.id.as_str()).collect();

        assert_eq!(ids, vec!["new-urgent", "old-normal", "new-normal"]);
        assert_eq!(repo.list_pending(Some(1)).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_searchRequests_shouldFilterAndPaginate() {
        let repo = create_test_repo();
        let t0 = Utc::now() - Duration::days(1);
        for i in 0..5 {
            insert(&repo, &request(&format!("req-{}", i), Priority::Normal, t0 + Duration::minutes(i))).await;
        }
        insert(&repo, &request("req-high", Priority::High, t0)).await;

        let filter = RequestFilter {
            priority: Some(Priority::Normal),
            page: 1,
            page_size: Some(2),
            ..RequestFilter::default()
        };
        let page = repo.search_requests(&filter, 20).await.unwrap();

        assert_eq!(page.total, 5);
        assert_eq!(page.total_pages(), 3);
        let ids: Vec<&str> = page.items.iter().map(|r| r.id.as_str()).collect();
        assert_eq!(ids, vec!["req-2", "req-1"]);

        let by_status = RequestFilter {
            statuses: vec![RequestStatus::Assigned],
            ..RequestFilter::default()
        };
        assert_eq!(repo.search_requests(&by_status, 20).await.unwrap().total, 0);
    }

    #[tokio::test]
    async fn test_eventsForRequestsCreatedBetween_shouldOnlyIncludeWindow() {
        let repo = create_test_repo();
        let now = Utc::now();
        insert(&repo, &request("inside", Priority::Normal, now - Duration::hours(1))).await;
        insert(&repo, &request("outside", Priority::Normal, now - Duration::days(10))).await;

        let from = now - Duration::days(1);
        let requests = repo.list_requests_created_between(from, now).await.unwrap();
        let events = repo.events_for_requests_created_between(from, now).await.unwrap();

        assert_eq!(requests.len(), 1);
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].request_id, "inside");
    }

    #[tokio::test]
    async fn test_storeMemoryEntry_shouldPersistAndRemoveSuperseded() {
        let repo = create_test_repo();
        repo.store_memory_entry(&memory_entry("tm-1", "Good morning"), vec![]).await.unwrap();
        repo.store_memory_entry(&memory_entry("tm-2", "Good morning"), vec!["tm-1".to_string()])
            .await
            .unwrap();
        repo.increment_memory_usage("tm-2").await.unwrap();

        let entries = repo.load_memory_entries().await.unwrap();

        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].id, "tm-2");
        assert_eq!(entries[0].usage_count, 1);
    }

    #[tokio::test]
    async fn test_deleteMemoryEntries_shouldKeepOthersInOrder() {
        let repo = create_test_repo();
        for (id, text) in [("a", "one"), ("b", "two"), ("c", "three")] {
            repo.store_memory_entry(&memory_entry(id, text), vec![]).await.unwrap();
        }

        repo.delete_memory_entries(vec!["b".to_string()]).await.unwrap();

        let ids: Vec<String> = repo.load_memory_entries().await.unwrap().into_iter().map(|e| e.id).collect();
        assert_eq!(ids, vec!["a", "c"]);
    }

    #[tokio::test]
    async fn test_upsertGlossaryTerm_shouldReplaceExisting() {
        let repo = create_test_repo();
        let term = GlossaryTerm::new("kid", "en", "education").with_translation("es", "niño", true);
        repo.upsert_glossary_term(&term).await.unwrap();

        let updated = term.clone().with_synonym("child");
        repo.upsert_glossary_term(&updated).await.unwrap();

        let terms = repo.load_glossary_terms().await.unwrap();
        assert_eq!(terms, vec![updated]);
    }

    #[test]
    fn test_formatTimestamp_shouldRoundTrip() {
        let now = Utc::now();
        let parsed = parse_timestamp(&format_timestamp(&now)).unwrap();
        assert_eq!(parsed.timestamp_micros(), now.timestamp_micros());
    }
}
