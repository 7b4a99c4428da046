//! The relational schema shared by every dialect.
//!
//! Written against a portable SQL vocabulary; the SQLite-specific pieces
//! (`AUTOINCREMENT`, `INSERT OR IGNORE`) are isolated to the dialect layer
//! that executes this script.

pub const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS events (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    event_type TEXT NOT NULL,
    timestamp TEXT NOT NULL,
    trace_id TEXT NOT NULL,
    intent_id TEXT,
    agent_id TEXT,
    tenant_id TEXT,
    payload TEXT NOT NULL,
    evidence TEXT
);
CREATE INDEX IF NOT EXISTS idx_events_intent_id ON events(intent_id);
CREATE INDEX IF NOT EXISTS idx_events_event_type ON events(event_type);
CREATE INDEX IF NOT EXISTS idx_events_tenant_id ON events(tenant_id);
CREATE INDEX IF NOT EXISTS idx_events_timestamp ON events(timestamp);

CREATE TABLE IF NOT EXISTS intents (
    id TEXT PRIMARY KEY,
    tenant_id TEXT,
    plan_id TEXT,
    source TEXT NOT NULL,
    target TEXT NOT NULL,
    status TEXT NOT NULL,
    retries INTEGER NOT NULL DEFAULT 0,
    created_at TEXT NOT NULL,
    created_by TEXT,
    risk_level TEXT NOT NULL,
    priority INTEGER NOT NULL DEFAULT 3,
    origin_type TEXT NOT NULL DEFAULT 'human',
    semantic TEXT NOT NULL DEFAULT '{}',
    technical TEXT NOT NULL DEFAULT '{}',
    checks_required TEXT NOT NULL DEFAULT '[]',
    dependencies TEXT NOT NULL DEFAULT '[]'
);
CREATE INDEX IF NOT EXISTS idx_intents_status ON intents(status);
CREATE INDEX IF NOT EXISTS idx_intents_tenant_id ON intents(tenant_id);

CREATE TABLE IF NOT EXISTS commit_links (
    intent_id TEXT NOT NULL,
    repo TEXT NOT NULL,
    sha TEXT NOT NULL,
    role TEXT NOT NULL,
    PRIMARY KEY (intent_id, repo, sha, role)
);

CREATE TABLE IF NOT EXISTS agent_policies (
    agent_id TEXT NOT NULL,
    tenant_id TEXT NOT NULL DEFAULT '',
    data TEXT NOT NULL,
    updated_at TEXT NOT NULL,
    PRIMARY KEY (agent_id, tenant_id)
);

CREATE TABLE IF NOT EXISTS risk_policies (
    tenant_id TEXT PRIMARY KEY,
    data TEXT NOT NULL,
    updated_at TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS compliance_thresholds (
    tenant_id TEXT PRIMARY KEY,
    data TEXT NOT NULL,
    updated_at TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS embeddings (
    intent_id TEXT NOT NULL,
    model TEXT NOT NULL,
    dimension INTEGER NOT NULL,
    checksum TEXT NOT NULL,
    vector TEXT NOT NULL,
    generated_at TEXT NOT NULL,
    PRIMARY KEY (intent_id, model)
);

CREATE TABLE IF NOT EXISTS queue_locks (
    lock_name TEXT PRIMARY KEY,
    holder_pid INTEGER NOT NULL,
    acquired_at TEXT NOT NULL,
    expires_at TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS deliveries (
    delivery_id TEXT PRIMARY KEY,
    received_at TEXT NOT NULL,
    expires_at TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS chain_state (
    chain_id TEXT PRIMARY KEY,
    last_hash TEXT NOT NULL,
    event_count INTEGER NOT NULL,
    updated_at TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS review_tasks (
    id TEXT PRIMARY KEY,
    intent_id TEXT NOT NULL,
    status TEXT NOT NULL,
    reviewer TEXT,
    priority INTEGER NOT NULL DEFAULT 3,
    sla_deadline TEXT NOT NULL,
    trigger_reason TEXT NOT NULL,
    resolution TEXT,
    notes TEXT
);
CREATE INDEX IF NOT EXISTS idx_review_tasks_intent_id ON review_tasks(intent_id);

CREATE TABLE IF NOT EXISTS security_findings (
    id TEXT PRIMARY KEY,
    scanner TEXT NOT NULL,
    category TEXT NOT NULL,
    severity TEXT NOT NULL,
    file TEXT NOT NULL DEFAULT '',
    line INTEGER NOT NULL DEFAULT 0,
    rule TEXT NOT NULL DEFAULT '',
    evidence TEXT NOT NULL DEFAULT '',
    confidence TEXT NOT NULL DEFAULT 'medium',
    intent_id TEXT,
    tenant_id TEXT,
    timestamp TEXT NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_security_findings_severity ON security_findings(severity);
"#;
