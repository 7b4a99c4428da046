//! SQLite-backed [`ConvergeStore`].
//!
//! One `rusqlite::Connection` behind a `Mutex`: SQLite only allows one
//! writer at a time anyway, so the `Mutex` just makes that explicit instead
//! of relying on `SQLITE_BUSY` retries.

use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Mutex;
use std::time::Duration;

use chrono::{DateTime, Utc};
use converge_types::{
    now, ActionOverride, AgentPolicy, ChainState, CommitLink, CommitRole, ComplianceThresholds,
    ConvergeError, Embedding, Event, EventType, FindingCategory, FindingSeverity, Intent,
    IntentSemantic, IntentTechnical, QueueLock, ReviewStatus, ReviewTask, RiskLevel, RiskPolicy,
    SecurityFinding, Status,
};
use rusqlite::{params, Connection, OptionalExtension, Row};

use crate::dialect::{SqliteDialect, StoreDialect};
use crate::schema::SCHEMA;
use crate::{ConvergeStore, EventFilter};

fn map_err(context: &str, err: rusqlite::Error) -> ConvergeError {
    let dialect = SqliteDialect;
    let message = err.to_string();
    if dialect.is_integrity_error(&message) {
        ConvergeError::Conflict(format!("{context}: {message}"))
    } else {
        ConvergeError::Other(anyhow::anyhow!("{context}: {message}"))
    }
}

fn json_err(context: &str, err: serde_json::Error) -> ConvergeError {
    ConvergeError::Invalid(format!("{context}: {err}"))
}

fn to_rfc3339(ts: DateTime<Utc>) -> String {
    ts.to_rfc3339()
}

fn parse_ts(s: &str) -> Result<DateTime<Utc>, ConvergeError> {
    DateTime::parse_from_rfc3339(s)
        .map(|d| d.with_timezone(&Utc))
        .map_err(|e| ConvergeError::Invalid(format!("bad timestamp '{s}': {e}")))
}

/// A SQLite-backed implementation of [`ConvergeStore`].
pub struct SqliteStore {
    conn: Mutex<Connection>,
}

impl SqliteStore {
    /// Opens (creating if absent) a SQLite database at `path` and applies
    /// the schema. `:memory:` is accepted for tests.
    pub fn open(path: &Path) -> Result<Self, ConvergeError> {
        let conn = Connection::open(path)
            .map_err(|e| ConvergeError::Other(anyhow::anyhow!("opening store at {}: {e}", path.display())))?;
        Self::from_connection(conn)
    }

    pub fn open_in_memory() -> Result<Self, ConvergeError> {
        let conn = Connection::open_in_memory()
            .map_err(|e| ConvergeError::Other(anyhow::anyhow!("opening in-memory store: {e}")))?;
        Self::from_connection(conn)
    }

    fn from_connection(conn: Connection) -> Result<Self, ConvergeError> {
        conn.execute_batch(SCHEMA).map_err(|e| map_err("applying schema", e))?;
        Ok(SqliteStore { conn: Mutex::new(conn) })
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Connection> {
        self.conn.lock().expect("sqlite store mutex poisoned")
    }
}

// -- row <-> model conversions ---------------------------------------------

fn row_to_event(row: &Row) -> rusqlite::Result<(i64, String, String, String, Option<String>, Option<String>, Option<String>, String, Option<String>)> {
    Ok((
        row.get(0)?,
        row.get(1)?,
        row.get(2)?,
        row.get(3)?,
        row.get(4)?,
        row.get(5)?,
        row.get(6)?,
        row.get(7)?,
        row.get(8)?,
    ))
}

fn event_from_row(
    (id, event_type, timestamp, trace_id, intent_id, agent_id, tenant_id, payload, evidence): (
        i64,
        String,
        String,
        String,
        Option<String>,
        Option<String>,
        Option<String>,
        String,
        Option<String>,
    ),
) -> Result<Event, ConvergeError> {
    Ok(Event {
        id: Some(id),
        event_type: event_type.parse::<EventType>().map_err(|e| ConvergeError::Invalid(e.to_string()))?,
        timestamp: parse_ts(&timestamp)?,
        trace_id,
        intent_id,
        agent_id,
        tenant_id,
        payload: serde_json::from_str(&payload).map_err(|e| json_err("event payload", e))?,
        evidence: evidence
            .map(|e| serde_json::from_str(&e).map_err(|err| json_err("event evidence", err)))
            .transpose()?,
    })
}

fn intent_from_row(row: &Row) -> rusqlite::Result<Result<Intent, ConvergeError>> {
    let id: String = row.get(0)?;
    let tenant_id: Option<String> = row.get(1)?;
    let plan_id: Option<String> = row.get(2)?;
    let source: String = row.get(3)?;
    let status: String = row.get(4)?;
    let created_at: String = row.get(5)?;
    let risk_level: String = row.get(6)?;
    let priority: i64 = row.get(7)?;
    let semantic: String = row.get(8)?;
    let technical: String = row.get(9)?;
    let checks_required: String = row.get(10)?;
    let dependencies: String = row.get(11)?;
    let target: String = row.get(12)?;
    let retries: i64 = row.get(13)?;
    let created_by: Option<String> = row.get(14)?;
    let origin_type: String = row.get(15)?;

    Ok((|| {
        Ok(Intent {
            id,
            tenant_id,
            plan_id,
            source,
            target,
            status: parse_status(&status)?,
            retries: retries as u32,
            created_at: parse_ts(&created_at)?,
            created_by,
            risk_level: parse_risk_level(&risk_level)?,
            priority: priority as u8,
            origin_type,
            semantic: serde_json::from_str(&semantic).map_err(|e| json_err("intent semantic", e))?,
            technical: serde_json::from_str(&technical).map_err(|e| json_err("intent technical", e))?,
            checks_required: serde_json::from_str(&checks_required)
                .map_err(|e| json_err("intent checks_required", e))?,
            dependencies: serde_json::from_str(&dependencies).map_err(|e| json_err("intent dependencies", e))?,
        })
    })())
}

fn parse_status(s: &str) -> Result<Status, ConvergeError> {
    match s {
        "ready" => Ok(Status::Ready),
        "validated" => Ok(Status::Validated),
        "queued" => Ok(Status::Queued),
        "merged" => Ok(Status::Merged),
        "rejected" => Ok(Status::Rejected),
        "blocked" => Ok(Status::Blocked),
        other => Err(ConvergeError::Invalid(format!("unknown intent status '{other}'"))),
    }
}

fn parse_risk_level(s: &str) -> Result<RiskLevel, ConvergeError> {
    match s {
        "low" => Ok(RiskLevel::Low),
        "medium" => Ok(RiskLevel::Medium),
        "high" => Ok(RiskLevel::High),
        "critical" => Ok(RiskLevel::Critical),
        other => Err(ConvergeError::Invalid(format!("unknown risk level '{other}'"))),
    }
}

fn parse_commit_role(s: &str) -> Result<CommitRole, ConvergeError> {
    match s {
        "head" => Ok(CommitRole::Head),
        "base" => Ok(CommitRole::Base),
        "merge" => Ok(CommitRole::Merge),
        other => Err(ConvergeError::Invalid(format!("unknown commit role '{other}'"))),
    }
}

fn parse_review_status(s: &str) -> Result<ReviewStatus, ConvergeError> {
    match s {
        "pending" => Ok(ReviewStatus::Pending),
        "assigned" => Ok(ReviewStatus::Assigned),
        "completed" => Ok(ReviewStatus::Completed),
        "cancelled" => Ok(ReviewStatus::Cancelled),
        "escalated" => Ok(ReviewStatus::Escalated),
        other => Err(ConvergeError::Invalid(format!("unknown review status '{other}'"))),
    }
}

fn parse_finding_category(s: &str) -> Result<FindingCategory, ConvergeError> {
    match s {
        "sast" => Ok(FindingCategory::Sast),
        "sca" => Ok(FindingCategory::Sca),
        "secrets" => Ok(FindingCategory::Secrets),
        other => Err(ConvergeError::Invalid(format!("unknown finding category '{other}'"))),
    }
}

fn parse_finding_severity(s: &str) -> Result<FindingSeverity, ConvergeError> {
    match s {
        "critical" => Ok(FindingSeverity::Critical),
        "high" => Ok(FindingSeverity::High),
        "medium" => Ok(FindingSeverity::Medium),
        "low" => Ok(FindingSeverity::Low),
        "info" => Ok(FindingSeverity::Info),
        other => Err(ConvergeError::Invalid(format!("unknown finding severity '{other}'"))),
    }
}

impl ConvergeStore for SqliteStore {
    fn append_event(&self, mut event: Event) -> Result<Event, ConvergeError> {
        let conn = self.lock();
        let payload = serde_json::to_string(&event.payload).map_err(|e| json_err("event payload", e))?;
        let evidence = event
            .evidence
            .as_ref()
            .map(serde_json::to_string)
            .transpose()
            .map_err(|e| json_err("event evidence", e))?;
        conn.execute(
            "INSERT INTO events (event_type, timestamp, trace_id, intent_id, agent_id, tenant_id, payload, evidence)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?)",
            params![
                event.event_type.to_string(),
                to_rfc3339(event.timestamp),
                event.trace_id,
                event.intent_id,
                event.agent_id,
                event.tenant_id,
                payload,
                evidence,
            ],
        )
        .map_err(|e| map_err("appending event", e))?;
        event.id = Some(conn.last_insert_rowid());
        Ok(event)
    }

    fn query_events(&self, filter: &EventFilter) -> Result<Vec<Event>, ConvergeError> {
        let conn = self.lock();
        let mut sql = String::from(
            "SELECT id, event_type, timestamp, trace_id, intent_id, agent_id, tenant_id, payload, evidence FROM events WHERE 1=1",
        );
        let mut bind: Vec<Box<dyn rusqlite::ToSql>> = Vec::new();
        if let Some(v) = &filter.event_type {
            sql.push_str(" AND event_type = ?");
            bind.push(Box::new(v.clone()));
        }
        if let Some(v) = &filter.intent_id {
            sql.push_str(" AND intent_id = ?");
            bind.push(Box::new(v.clone()));
        }
        if let Some(v) = &filter.agent_id {
            sql.push_str(" AND agent_id = ?");
            bind.push(Box::new(v.clone()));
        }
        if let Some(v) = &filter.tenant_id {
            sql.push_str(" AND tenant_id = ?");
            bind.push(Box::new(v.clone()));
        }
        if let Some(v) = filter.since {
            sql.push_str(" AND timestamp >= ?");
            bind.push(Box::new(to_rfc3339(v)));
        }
        if let Some(v) = filter.until {
            sql.push_str(" AND timestamp < ?");
            bind.push(Box::new(to_rfc3339(v)));
        }
        sql.push_str(" ORDER BY id DESC LIMIT ?");
        bind.push(Box::new(filter.limit.max(0)));

        let mut stmt = conn.prepare(&sql).map_err(|e| map_err("preparing event query", e))?;
        let params: Vec<&dyn rusqlite::ToSql> = bind.iter().map(|b| b.as_ref()).collect();
        let rows = stmt
            .query_map(params.as_slice(), row_to_event)
            .map_err(|e| map_err("querying events", e))?;
        let mut events = Vec::new();
        for row in rows {
            events.push(event_from_row(row.map_err(|e| map_err("reading event row", e))?)?);
        }
        Ok(events)
    }

    fn count_events(&self, filter: &EventFilter) -> Result<i64, ConvergeError> {
        Ok(self.query_events(&EventFilter { limit: i64::MAX, ..filter.clone() })?.len() as i64)
    }

    fn prune_events(
        &self,
        before: DateTime<Utc>,
        tenant_id: Option<&str>,
        dry_run: bool,
    ) -> Result<i64, ConvergeError> {
        let conn = self.lock();
        let before_s = to_rfc3339(before);
        let count: i64 = match tenant_id {
            Some(t) => conn
                .query_row(
                    "SELECT COUNT(*) FROM events WHERE timestamp < ? AND tenant_id = ?",
                    params![before_s, t],
                    |r| r.get(0),
                )
                .map_err(|e| map_err("counting prunable events", e))?,
            None => conn
                .query_row("SELECT COUNT(*) FROM events WHERE timestamp < ?", params![before_s], |r| r.get(0))
                .map_err(|e| map_err("counting prunable events", e))?,
        };
        if dry_run || count == 0 {
            return Ok(count);
        }
        match tenant_id {
            Some(t) => conn
                .execute("DELETE FROM events WHERE timestamp < ? AND tenant_id = ?", params![before_s, t])
                .map_err(|e| map_err("pruning events", e))?,
            None => conn
                .execute("DELETE FROM events WHERE timestamp < ?", params![before_s])
                .map_err(|e| map_err("pruning events", e))?,
        };
        Ok(count)
    }

    fn upsert_intent(&self, intent: &Intent) -> Result<(), ConvergeError> {
        let conn = self.lock();
        let semantic = serde_json::to_string(&intent.semantic).map_err(|e| json_err("intent semantic", e))?;
        let technical = serde_json::to_string(&intent.technical).map_err(|e| json_err("intent technical", e))?;
        let checks_required =
            serde_json::to_string(&intent.checks_required).map_err(|e| json_err("intent checks_required", e))?;
        let dependencies =
            serde_json::to_string(&intent.dependencies).map_err(|e| json_err("intent dependencies", e))?;
        conn.execute(
            "INSERT INTO intents (id, tenant_id, plan_id, source, target, status, retries, created_at,
                                   created_by, risk_level, priority, origin_type, semantic, technical,
                                   checks_required, dependencies)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
             ON CONFLICT(id) DO UPDATE SET
                tenant_id = excluded.tenant_id,
                plan_id = excluded.plan_id,
                source = excluded.source,
                target = excluded.target,
                status = excluded.status,
                retries = excluded.retries,
                created_by = excluded.created_by,
                risk_level = excluded.risk_level,
                priority = excluded.priority,
                origin_type = excluded.origin_type,
                semantic = excluded.semantic,
                technical = excluded.technical,
                checks_required = excluded.checks_required,
                dependencies = excluded.dependencies",
            params![
                intent.id,
                intent.tenant_id,
                intent.plan_id,
                intent.source,
                intent.target,
                intent.status.to_string(),
                intent.retries,
                to_rfc3339(intent.created_at),
                intent.created_by,
                intent.risk_level.to_string(),
                intent.priority,
                intent.origin_type,
                semantic,
                technical,
                checks_required,
                dependencies,
            ],
        )
        .map_err(|e| map_err("upserting intent", e))?;
        Ok(())
    }

    fn get_intent(&self, intent_id: &str) -> Result<Option<Intent>, ConvergeError> {
        let conn = self.lock();
        conn.query_row(
            "SELECT id, tenant_id, plan_id, source, status, created_at, risk_level, priority,
                    semantic, technical, checks_required, dependencies, target, retries, created_by, origin_type
             FROM intents WHERE id = ?",
            params![intent_id],
            intent_from_row,
        )
        .optional()
        .map_err(|e| map_err("fetching intent", e))?
        .transpose()
    }

    fn list_intents(
        &self,
        status: Option<Status>,
        tenant_id: Option<&str>,
        limit: i64,
    ) -> Result<Vec<Intent>, ConvergeError> {
        let conn = self.lock();
        let base = "SELECT id, tenant_id, plan_id, source, status, created_at, risk_level, priority,
                            semantic, technical, checks_required, dependencies, target, retries, created_by, origin_type
                     FROM intents WHERE 1=1";
        let mut sql = base.to_string();
        let mut bind: Vec<Box<dyn rusqlite::ToSql>> = Vec::new();
        if let Some(s) = status {
            sql.push_str(" AND status = ?");
            bind.push(Box::new(s.to_string()));
        }
        if let Some(t) = tenant_id {
            sql.push_str(" AND tenant_id = ?");
            bind.push(Box::new(t.to_string()));
        }
        sql.push_str(" ORDER BY created_at ASC LIMIT ?");
        bind.push(Box::new(limit.max(0)));

        let mut stmt = conn.prepare(&sql).map_err(|e| map_err("preparing intent query", e))?;
        let params: Vec<&dyn rusqlite::ToSql> = bind.iter().map(|b| b.as_ref()).collect();
        let rows = stmt
            .query_map(params.as_slice(), intent_from_row)
            .map_err(|e| map_err("listing intents", e))?;
        let mut out = Vec::new();
        for row in rows {
            out.push(row.map_err(|e| map_err("reading intent row", e))??);
        }
        Ok(out)
    }

    fn update_intent_status(
        &self,
        intent_id: &str,
        status: Status,
        retries: Option<u32>,
    ) -> Result<(), ConvergeError> {
        let conn = self.lock();
        let changed = match retries {
            Some(r) => conn
                .execute(
                    "UPDATE intents SET status = ?, retries = ? WHERE id = ?",
                    params![status.to_string(), r, intent_id],
                )
                .map_err(|e| map_err("updating intent status", e))?,
            None => conn
                .execute("UPDATE intents SET status = ? WHERE id = ?", params![status.to_string(), intent_id])
                .map_err(|e| map_err("updating intent status", e))?,
        };
        if changed == 0 {
            return Err(ConvergeError::NotFound(format!("intent '{intent_id}'")));
        }
        Ok(())
    }

    fn upsert_agent_policy(&self, policy: &AgentPolicy) -> Result<(), ConvergeError> {
        let conn = self.lock();
        let data = serde_json::to_string(policy).map_err(|e| json_err("agent policy", e))?;
        let tenant_id = policy.tenant_id.clone().unwrap_or_default();
        conn.execute(
            "INSERT INTO agent_policies (agent_id, tenant_id, data, updated_at) VALUES (?, ?, ?, ?)
             ON CONFLICT(agent_id, tenant_id) DO UPDATE SET data = excluded.data, updated_at = excluded.updated_at",
            params![policy.agent_id, tenant_id, data, to_rfc3339(now())],
        )
        .map_err(|e| map_err("upserting agent policy", e))?;
        Ok(())
    }

    fn get_agent_policy(
        &self,
        agent_id: &str,
        tenant_id: Option<&str>,
    ) -> Result<Option<AgentPolicy>, ConvergeError> {
        let conn = self.lock();
        let tenant_id = tenant_id.unwrap_or("");
        let data: Option<String> = conn
            .query_row(
                "SELECT data FROM agent_policies WHERE agent_id = ? AND tenant_id = ?",
                params![agent_id, tenant_id],
                |r| r.get(0),
            )
            .optional()
            .map_err(|e| map_err("fetching agent policy", e))?;
        data.map(|d| serde_json::from_str(&d).map_err(|e| json_err("agent policy", e))).transpose()
    }

    fn list_agent_policies(&self, tenant_id: Option<&str>) -> Result<Vec<AgentPolicy>, ConvergeError> {
        let conn = self.lock();
        let mut stmt = match tenant_id {
            Some(_) => conn.prepare("SELECT data FROM agent_policies WHERE tenant_id = ?"),
            None => conn.prepare("SELECT data FROM agent_policies"),
        }
        .map_err(|e| map_err("preparing agent policy listing", e))?;
        let rows = if let Some(t) = tenant_id {
            stmt.query_map(params![t], |r| r.get::<_, String>(0))
        } else {
            stmt.query_map([], |r| r.get::<_, String>(0))
        }
        .map_err(|e| map_err("listing agent policies", e))?;
        let mut out = Vec::new();
        for row in rows {
            let data = row.map_err(|e| map_err("reading agent policy row", e))?;
            out.push(serde_json::from_str(&data).map_err(|e| json_err("agent policy", e))?);
        }
        Ok(out)
    }

    fn upsert_risk_policy(&self, tenant_id: &str, policy: &RiskPolicy) -> Result<(), ConvergeError> {
        let conn = self.lock();
        let data = serde_json::to_string(policy).map_err(|e| json_err("risk policy", e))?;
        conn.execute(
            "INSERT INTO risk_policies (tenant_id, data, updated_at) VALUES (?, ?, ?)
             ON CONFLICT(tenant_id) DO UPDATE SET data = excluded.data, updated_at = excluded.updated_at",
            params![tenant_id, data, to_rfc3339(now())],
        )
        .map_err(|e| map_err("upserting risk policy", e))?;
        Ok(())
    }

    fn get_risk_policy(&self, tenant_id: &str) -> Result<Option<RiskPolicy>, ConvergeError> {
        let conn = self.lock();
        let data: Option<String> = conn
            .query_row("SELECT data FROM risk_policies WHERE tenant_id = ?", params![tenant_id], |r| r.get(0))
            .optional()
            .map_err(|e| map_err("fetching risk policy", e))?;
        data.map(|d| serde_json::from_str(&d).map_err(|e| json_err("risk policy", e))).transpose()
    }

    fn upsert_compliance_thresholds(
        &self,
        tenant_id: &str,
        thresholds: &ComplianceThresholds,
    ) -> Result<(), ConvergeError> {
        let conn = self.lock();
        let data = serde_json::to_string(thresholds).map_err(|e| json_err("compliance thresholds", e))?;
        conn.execute(
            "INSERT INTO compliance_thresholds (tenant_id, data, updated_at) VALUES (?, ?, ?)
             ON CONFLICT(tenant_id) DO UPDATE SET data = excluded.data, updated_at = excluded.updated_at",
            params![tenant_id, data, to_rfc3339(now())],
        )
        .map_err(|e| map_err("upserting compliance thresholds", e))?;
        Ok(())
    }

    fn get_compliance_thresholds(
        &self,
        tenant_id: &str,
    ) -> Result<Option<ComplianceThresholds>, ConvergeError> {
        let conn = self.lock();
        let data: Option<String> = conn
            .query_row(
                "SELECT data FROM compliance_thresholds WHERE tenant_id = ?",
                params![tenant_id],
                |r| r.get(0),
            )
            .optional()
            .map_err(|e| map_err("fetching compliance thresholds", e))?;
        data.map(|d| serde_json::from_str(&d).map_err(|e| json_err("compliance thresholds", e))).transpose()
    }

    fn upsert_commit_link(&self, link: &CommitLink) -> Result<(), ConvergeError> {
        let conn = self.lock();
        let dialect = SqliteDialect;
        conn.execute(
            &dialect.insert_or_ignore_sql("commit_links", &["intent_id", "repo", "sha", "role"]),
            params![link.intent_id, link.repo, link.sha, role_str(link.role)],
        )
        .map_err(|e| map_err("upserting commit link", e))?;
        Ok(())
    }

    fn list_commit_links(&self, intent_id: &str) -> Result<Vec<CommitLink>, ConvergeError> {
        let conn = self.lock();
        let mut stmt = conn
            .prepare("SELECT intent_id, repo, sha, role FROM commit_links WHERE intent_id = ?")
            .map_err(|e| map_err("preparing commit link query", e))?;
        let rows = stmt
            .query_map(params![intent_id], |r| {
                Ok((r.get::<_, String>(0)?, r.get::<_, String>(1)?, r.get::<_, String>(2)?, r.get::<_, String>(3)?))
            })
            .map_err(|e| map_err("listing commit links", e))?;
        let mut out = Vec::new();
        for row in rows {
            let (intent_id, repo, sha, role) = row.map_err(|e| map_err("reading commit link row", e))?;
            out.push(CommitLink { intent_id, repo, sha, role: parse_commit_role(&role)? });
        }
        Ok(out)
    }

    fn upsert_embedding(&self, embedding: &Embedding) -> Result<(), ConvergeError> {
        let conn = self.lock();
        let vector = serde_json::to_string(&embedding.vector).map_err(|e| json_err("embedding vector", e))?;
        conn.execute(
            "INSERT INTO embeddings (intent_id, model, dimension, checksum, vector, generated_at)
             VALUES (?, ?, ?, ?, ?, ?)
             ON CONFLICT(intent_id, model) DO UPDATE SET
                dimension = excluded.dimension, checksum = excluded.checksum,
                vector = excluded.vector, generated_at = excluded.generated_at",
            params![
                embedding.intent_id,
                embedding.model,
                embedding.dimension as i64,
                embedding.checksum,
                vector,
                to_rfc3339(embedding.generated_at),
            ],
        )
        .map_err(|e| map_err("upserting embedding", e))?;
        Ok(())
    }

    fn get_embedding(&self, intent_id: &str, model: &str) -> Result<Option<Embedding>, ConvergeError> {
        let conn = self.lock();
        conn.query_row(
            "SELECT intent_id, model, dimension, checksum, vector, generated_at FROM embeddings
             WHERE intent_id = ? AND model = ?",
            params![intent_id, model],
            embedding_from_row,
        )
        .optional()
        .map_err(|e| map_err("fetching embedding", e))?
        .transpose()
    }

    fn list_embeddings(&self, model: &str) -> Result<Vec<Embedding>, ConvergeError> {
        let conn = self.lock();
        let mut stmt = conn
            .prepare("SELECT intent_id, model, dimension, checksum, vector, generated_at FROM embeddings WHERE model = ?")
            .map_err(|e| map_err("preparing embedding query", e))?;
        let rows = stmt.query_map(params![model], embedding_from_row).map_err(|e| map_err("listing embeddings", e))?;
        let mut out = Vec::new();
        for row in rows {
            out.push(row.map_err(|e| map_err("reading embedding row", e))??);
        }
        Ok(out)
    }

    fn delete_embedding(&self, intent_id: &str, model: &str) -> Result<(), ConvergeError> {
        let conn = self.lock();
        conn.execute("DELETE FROM embeddings WHERE intent_id = ? AND model = ?", params![intent_id, model])
            .map_err(|e| map_err("deleting embedding", e))?;
        Ok(())
    }

    fn acquire_queue_lock(
        &self,
        lock_name: &str,
        holder_pid: i64,
        ttl: Duration,
    ) -> Result<bool, ConvergeError> {
        let conn = self.lock();
        let now_ts = now();
        let expires_at = now_ts + chrono::Duration::from_std(ttl).unwrap_or(chrono::Duration::seconds(300));

        let existing: Option<String> = conn
            .query_row("SELECT expires_at FROM queue_locks WHERE lock_name = ?", params![lock_name], |r| r.get(0))
            .optional()
            .map_err(|e| map_err("checking queue lock", e))?;

        if let Some(expires_at_s) = existing {
            let expires_at = parse_ts(&expires_at_s)?;
            if expires_at > now_ts {
                return Ok(false);
            }
        }

        conn.execute(
            "INSERT INTO queue_locks (lock_name, holder_pid, acquired_at, expires_at) VALUES (?, ?, ?, ?)
             ON CONFLICT(lock_name) DO UPDATE SET
                holder_pid = excluded.holder_pid, acquired_at = excluded.acquired_at, expires_at = excluded.expires_at",
            params![lock_name, holder_pid, to_rfc3339(now_ts), to_rfc3339(expires_at)],
        )
        .map_err(|e| map_err("acquiring queue lock", e))?;
        Ok(true)
    }

    fn release_queue_lock(&self, lock_name: &str, holder_pid: i64) -> Result<bool, ConvergeError> {
        let conn = self.lock();
        let changed = conn
            .execute(
                "DELETE FROM queue_locks WHERE lock_name = ? AND holder_pid = ?",
                params![lock_name, holder_pid],
            )
            .map_err(|e| map_err("releasing queue lock", e))?;
        Ok(changed > 0)
    }

    fn force_release_queue_lock(&self, lock_name: &str) -> Result<bool, ConvergeError> {
        let conn = self.lock();
        let changed = conn
            .execute("DELETE FROM queue_locks WHERE lock_name = ?", params![lock_name])
            .map_err(|e| map_err("force-releasing queue lock", e))?;
        Ok(changed > 0)
    }

    fn get_queue_lock_info(&self, lock_name: &str) -> Result<Option<QueueLock>, ConvergeError> {
        let conn = self.lock();
        conn.query_row(
            "SELECT lock_name, holder_pid, acquired_at, expires_at FROM queue_locks WHERE lock_name = ?",
            params![lock_name],
            |r| {
                Ok((r.get::<_, String>(0)?, r.get::<_, i64>(1)?, r.get::<_, String>(2)?, r.get::<_, String>(3)?))
            },
        )
        .optional()
        .map_err(|e| map_err("fetching queue lock info", e))?
        .map(|(lock_name, holder_pid, acquired_at, expires_at)| {
            Ok(QueueLock {
                lock_name,
                holder_pid,
                acquired_at: parse_ts(&acquired_at)?,
                expires_at: parse_ts(&expires_at)?,
            })
        })
        .transpose()
    }

    fn is_duplicate_delivery(&self, delivery_id: &str) -> Result<bool, ConvergeError> {
        let conn = self.lock();
        let now_ts = to_rfc3339(now());
        let found: Option<i64> = conn
            .query_row(
                "SELECT 1 FROM deliveries WHERE delivery_id = ? AND expires_at > ?",
                params![delivery_id, now_ts],
                |r| r.get(0),
            )
            .optional()
            .map_err(|e| map_err("checking delivery dedup", e))?;
        Ok(found.is_some())
    }

    fn record_delivery(&self, delivery_id: &str, ttl: Duration) -> Result<(), ConvergeError> {
        let conn = self.lock();
        let now_ts = now();
        let expires_at = now_ts + chrono::Duration::from_std(ttl).unwrap_or(chrono::Duration::hours(24));
        let dialect = SqliteDialect;
        conn.execute(
            &dialect.insert_or_ignore_sql("deliveries", &["delivery_id", "received_at", "expires_at"]),
            params![delivery_id, to_rfc3339(now_ts), to_rfc3339(expires_at)],
        )
        .map_err(|e| map_err("recording delivery", e))?;
        Ok(())
    }

    fn get_chain_state(&self, chain_id: &str) -> Result<Option<ChainState>, ConvergeError> {
        let conn = self.lock();
        conn.query_row(
            "SELECT chain_id, last_hash, event_count, updated_at FROM chain_state WHERE chain_id = ?",
            params![chain_id],
            |r| {
                Ok((r.get::<_, String>(0)?, r.get::<_, String>(1)?, r.get::<_, i64>(2)?, r.get::<_, String>(3)?))
            },
        )
        .optional()
        .map_err(|e| map_err("fetching chain state", e))?
        .map(|(chain_id, last_hash, event_count, updated_at)| {
            Ok(ChainState { chain_id, last_hash, event_count, updated_at: parse_ts(&updated_at)? })
        })
        .transpose()
    }

    fn save_chain_state(&self, state: &ChainState) -> Result<(), ConvergeError> {
        let conn = self.lock();
        conn.execute(
            "INSERT INTO chain_state (chain_id, last_hash, event_count, updated_at) VALUES (?, ?, ?, ?)
             ON CONFLICT(chain_id) DO UPDATE SET
                last_hash = excluded.last_hash, event_count = excluded.event_count, updated_at = excluded.updated_at",
            params![state.chain_id, state.last_hash, state.event_count, to_rfc3339(state.updated_at)],
        )
        .map_err(|e| map_err("saving chain state", e))?;
        Ok(())
    }

    fn upsert_review_task(&self, task: &ReviewTask) -> Result<(), ConvergeError> {
        let conn = self.lock();
        conn.execute(
            "INSERT INTO review_tasks (id, intent_id, status, reviewer, priority, sla_deadline,
                                        trigger_reason, resolution, notes)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
             ON CONFLICT(id) DO UPDATE SET
                status = excluded.status, reviewer = excluded.reviewer, priority = excluded.priority,
                sla_deadline = excluded.sla_deadline, trigger_reason = excluded.trigger_reason,
                resolution = excluded.resolution, notes = excluded.notes",
            params![
                task.id,
                task.intent_id,
                review_status_str(task.status),
                task.reviewer,
                task.priority,
                to_rfc3339(task.sla_deadline),
                task.trigger,
                task.resolution,
                task.notes,
            ],
        )
        .map_err(|e| map_err("upserting review task", e))?;
        Ok(())
    }

    fn get_review_task(&self, id: &str) -> Result<Option<ReviewTask>, ConvergeError> {
        let conn = self.lock();
        conn.query_row(
            "SELECT id, intent_id, status, reviewer, priority, sla_deadline, trigger_reason, resolution, notes
             FROM review_tasks WHERE id = ?",
            params![id],
            review_task_from_row,
        )
        .optional()
        .map_err(|e| map_err("fetching review task", e))?
        .transpose()
    }

    fn list_review_tasks(
        &self,
        intent_id: Option<&str>,
        status: Option<ReviewStatus>,
    ) -> Result<Vec<ReviewTask>, ConvergeError> {
        let conn = self.lock();
        let mut sql = String::from(
            "SELECT id, intent_id, status, reviewer, priority, sla_deadline, trigger_reason, resolution, notes
             FROM review_tasks WHERE 1=1",
        );
        let mut bind: Vec<Box<dyn rusqlite::ToSql>> = Vec::new();
        if let Some(i) = intent_id {
            sql.push_str(" AND intent_id = ?");
            bind.push(Box::new(i.to_string()));
        }
        if let Some(s) = status {
            sql.push_str(" AND status = ?");
            bind.push(Box::new(review_status_str(s).to_string()));
        }
        let mut stmt = conn.prepare(&sql).map_err(|e| map_err("preparing review task query", e))?;
        let params: Vec<&dyn rusqlite::ToSql> = bind.iter().map(|b| b.as_ref()).collect();
        let rows = stmt
            .query_map(params.as_slice(), review_task_from_row)
            .map_err(|e| map_err("listing review tasks", e))?;
        let mut out = Vec::new();
        for row in rows {
            out.push(row.map_err(|e| map_err("reading review task row", e))??);
        }
        Ok(out)
    }

    fn upsert_security_finding(&self, finding: &SecurityFinding) -> Result<(), ConvergeError> {
        let conn = self.lock();
        conn.execute(
            "INSERT INTO security_findings (id, scanner, category, severity, file, line, rule, evidence,
                                             confidence, intent_id, tenant_id, timestamp)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
             ON CONFLICT(id) DO UPDATE SET
                scanner = excluded.scanner, category = excluded.category, severity = excluded.severity,
                file = excluded.file, line = excluded.line, rule = excluded.rule, evidence = excluded.evidence,
                confidence = excluded.confidence, intent_id = excluded.intent_id, tenant_id = excluded.tenant_id",
            params![
                finding.id,
                finding.scanner,
                category_str(finding.category),
                severity_str(finding.severity),
                finding.file,
                finding.line,
                finding.rule,
                finding.evidence,
                finding.confidence,
                finding.intent_id,
                finding.tenant_id,
                to_rfc3339(finding.timestamp),
            ],
        )
        .map_err(|e| map_err("upserting security finding", e))?;
        Ok(())
    }

    fn count_findings_by_severity(
        &self,
        tenant_id: Option<&str>,
    ) -> Result<BTreeMap<String, i64>, ConvergeError> {
        let conn = self.lock();
        let mut stmt = match tenant_id {
            Some(_) => conn.prepare(
                "SELECT severity, COUNT(*) FROM security_findings WHERE tenant_id = ? GROUP BY severity",
            ),
            None => conn.prepare("SELECT severity, COUNT(*) FROM security_findings GROUP BY severity"),
        }
        .map_err(|e| map_err("preparing finding count query", e))?;
        let rows = if let Some(t) = tenant_id {
            stmt.query_map(params![t], |r| Ok((r.get::<_, String>(0)?, r.get::<_, i64>(1)?)))
        } else {
            stmt.query_map([], |r| Ok((r.get::<_, String>(0)?, r.get::<_, i64>(1)?)))
        }
        .map_err(|e| map_err("counting findings by severity", e))?;
        let mut out = BTreeMap::new();
        for row in rows {
            let (severity, count) = row.map_err(|e| map_err("reading finding count row", e))?;
            out.insert(severity, count);
        }
        Ok(out)
    }

    fn close(&self) -> Result<(), ConvergeError> {
        // rusqlite flushes on drop; nothing extra needed for SQLite, but the
        // method exists so callers can shut a store down uniformly across
        // dialects that do need an explicit disconnect.
        Ok(())
    }
}

fn role_str(role: CommitRole) -> &'static str {
    match role {
        CommitRole::Head => "head",
        CommitRole::Base => "base",
        CommitRole::Merge => "merge",
    }
}

fn review_status_str(status: ReviewStatus) -> &'static str {
    match status {
        ReviewStatus::Pending => "pending",
        ReviewStatus::Assigned => "assigned",
        ReviewStatus::Completed => "completed",
        ReviewStatus::Cancelled => "cancelled",
        ReviewStatus::Escalated => "escalated",
    }
}

fn category_str(category: FindingCategory) -> &'static str {
    match category {
        FindingCategory::Sast => "sast",
        FindingCategory::Sca => "sca",
        FindingCategory::Secrets => "secrets",
    }
}

fn severity_str(severity: FindingSeverity) -> &'static str {
    match severity {
        FindingSeverity::Critical => "critical",
        FindingSeverity::High => "high",
        FindingSeverity::Medium => "medium",
        FindingSeverity::Low => "low",
        FindingSeverity::Info => "info",
    }
}

fn embedding_from_row(row: &Row) -> rusqlite::Result<Result<Embedding, ConvergeError>> {
    let intent_id: String = row.get(0)?;
    let model: String = row.get(1)?;
    let dimension: i64 = row.get(2)?;
    let checksum: String = row.get(3)?;
    let vector: String = row.get(4)?;
    let generated_at: String = row.get(5)?;
    Ok((|| {
        Ok(Embedding {
            intent_id,
            model,
            dimension: dimension as usize,
            checksum,
            vector: serde_json::from_str(&vector).map_err(|e| json_err("embedding vector", e))?,
            generated_at: parse_ts(&generated_at)?,
        })
    })())
}

fn review_task_from_row(row: &Row) -> rusqlite::Result<Result<ReviewTask, ConvergeError>> {
    let id: String = row.get(0)?;
    let intent_id: String = row.get(1)?;
    let status: String = row.get(2)?;
    let reviewer: Option<String> = row.get(3)?;
    let priority: i64 = row.get(4)?;
    let sla_deadline: String = row.get(5)?;
    let trigger: String = row.get(6)?;
    let resolution: Option<String> = row.get(7)?;
    let notes: Option<String> = row.get(8)?;
    Ok((|| {
        Ok(ReviewTask {
            id,
            intent_id,
            status: parse_review_status(&status)?,
            reviewer,
            priority: priority as u8,
            sla_deadline: parse_ts(&sla_deadline)?,
            trigger,
            resolution,
            notes,
        })
    })())
}

#[cfg(test)]
mod tests {
    use super::*;
    use converge_types::IntentSemantic;
    use serde_json::json;

    fn store() -> SqliteStore {
        SqliteStore::open_in_memory().unwrap()
    }

    #[test]
    fn append_and_query_events_round_trips() {
        let s = store();
        let e = Event::new(EventType::IntentCreated, "trace-1", json!({"a": 1})).with_intent("i-1");
        let appended = s.append_event(e).unwrap();
        assert!(appended.id.is_some());

        let found = s.query_events(&EventFilter::new().with_intent_id("i-1")).unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].payload["a"], 1);
    }

    #[test]
    fn upsert_intent_then_get_round_trips() {
        let s = store();
        let mut intent = Intent::new("i-1", "feature/x", "main");
        intent.semantic = IntentSemantic { problem: Some("p".into()), ..Default::default() };
        s.upsert_intent(&intent).unwrap();

        let fetched = s.get_intent("i-1").unwrap().unwrap();
        assert_eq!(fetched.source, "feature/x");
        assert_eq!(fetched.semantic.problem.as_deref(), Some("p"));
    }

    #[test]
    fn update_intent_status_changes_status_and_retries() {
        let s = store();
        s.upsert_intent(&Intent::new("i-1", "a", "b")).unwrap();
        s.update_intent_status("i-1", Status::Queued, Some(2)).unwrap();

        let fetched = s.get_intent("i-1").unwrap().unwrap();
        assert_eq!(fetched.status, Status::Queued);
        assert_eq!(fetched.retries, 2);
    }

    #[test]
    fn update_intent_status_on_missing_intent_is_not_found() {
        let s = store();
        let err = s.update_intent_status("missing", Status::Queued, None).unwrap_err();
        assert!(matches!(err, ConvergeError::NotFound(_)));
    }

    #[test]
    fn queue_lock_acquire_blocks_until_expiry() {
        let s = store();
        assert!(s.acquire_queue_lock("queue", 100, Duration::from_secs(300)).unwrap());
        assert!(!s.acquire_queue_lock("queue", 200, Duration::from_secs(300)).unwrap());
        assert!(s.release_queue_lock("queue", 100).unwrap());
        assert!(s.acquire_queue_lock("queue", 200, Duration::from_secs(300)).unwrap());
    }

    #[test]
    fn queue_lock_expired_is_stealable() {
        let s = store();
        assert!(s.acquire_queue_lock("queue", 100, Duration::from_secs(0)).unwrap());
        assert!(s.acquire_queue_lock("queue", 200, Duration::from_secs(300)).unwrap());
    }

    #[test]
    fn duplicate_delivery_detection() {
        let s = store();
        assert!(!s.is_duplicate_delivery("d-1").unwrap());
        s.record_delivery("d-1", Duration::from_secs(86400)).unwrap();
        assert!(s.is_duplicate_delivery("d-1").unwrap());
    }

    #[test]
    fn agent_policy_round_trips_with_overrides() {
        let s = store();
        let mut policy = AgentPolicy {
            agent_id: "agent-1".into(),
            tenant_id: None,
            atl: 2,
            max_risk_score: 50.0,
            max_blast_severity: 3.0,
            min_test_coverage: 0.7,
            require_compliance_pass: true,
            require_human_approval: false,
            require_dual_approval_on_critical: true,
            allow_actions: vec!["merge".into()],
            action_overrides: BTreeMap::new(),
            expires_at: None,
        };
        policy.action_overrides.insert(
            "merge".into(),
            ActionOverride { max_risk_score: Some(30.0), max_blast_severity: None, require_human_approval: None },
        );
        s.upsert_agent_policy(&policy).unwrap();

        let fetched = s.get_agent_policy("agent-1", None).unwrap().unwrap();
        assert_eq!(fetched.atl, 2);
        assert_eq!(fetched.action_overrides["merge"].max_risk_score, Some(30.0));
    }

    #[test]
    fn chain_state_saves_and_loads() {
        let s = store();
        let state = ChainState { chain_id: "main".into(), last_hash: "abc".into(), event_count: 5, updated_at: now() };
        s.save_chain_state(&state).unwrap();
        let fetched = s.get_chain_state("main").unwrap().unwrap();
        assert_eq!(fetched.last_hash, "abc");
        assert_eq!(fetched.event_count, 5);
    }

    #[test]
    fn commit_link_insert_or_ignore_is_idempotent() {
        let s = store();
        let link = CommitLink { intent_id: "i-1".into(), repo: "r".into(), sha: "sha1".into(), role: CommitRole::Head };
        s.upsert_commit_link(&link).unwrap();
        s.upsert_commit_link(&link).unwrap();
        assert_eq!(s.list_commit_links("i-1").unwrap().len(), 1);
    }

    #[test]
    fn security_finding_counts_group_by_severity() {
        let s = store();
        for (id, sev) in [("f-1", FindingSeverity::High), ("f-2", FindingSeverity::High), ("f-3", FindingSeverity::Low)] {
            s.upsert_security_finding(&SecurityFinding {
                id: id.into(),
                scanner: "pattern".into(),
                category: FindingCategory::Secrets,
                severity: sev,
                file: "a.rs".into(),
                line: 1,
                rule: "r1".into(),
                evidence: "".into(),
                confidence: "medium".into(),
                intent_id: None,
                tenant_id: None,
                timestamp: now(),
            })
            .unwrap();
        }
        let counts = s.count_findings_by_severity(None).unwrap();
        assert_eq!(counts["high"], 2);
        assert_eq!(counts["low"], 1);
    }
}
