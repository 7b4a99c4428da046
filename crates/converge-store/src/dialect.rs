//! The backend-specific seam between the portable [`crate::ConvergeStore`]
//! trait and a concrete SQL engine.
//!
//! Every dialect differs in exactly six places: how it opens a connection,
//! how it spells a bound parameter, how an `INSERT ... ON CONFLICT` names the
//! excluded row, how it tells a unique-constraint violation apart from any
//! other failure, how it writes an insert-or-ignore statement, and how it
//! shuts down. Everything else — the schema, the query shapes, the row
//! mapping — is shared.
pub trait StoreDialect: Send + Sync {
    /// The bound-parameter placeholder for the Nth parameter (1-indexed).
    /// SQLite spells every parameter `?`; Postgres spells the Nth one `$N`.
    fn placeholder(&self, index: usize) -> String;

    /// The prefix used to reference the row that would have been inserted,
    /// inside an `ON CONFLICT DO UPDATE` clause. SQLite: `excluded`.
    /// Postgres (without a named target) also uses `excluded`, but a future
    /// dialect speaking a different upsert grammar could differ.
    fn excluded_prefix(&self) -> &'static str;

    /// Whether `message` (the lowercased error text) describes a unique- or
    /// primary-key constraint violation rather than some other failure.
    fn is_integrity_error(&self, message: &str) -> bool;

    /// An `INSERT ... <verb> INTO` statement for `table(columns)` that
    /// silently no-ops on a primary-key conflict.
    fn insert_or_ignore_sql(&self, table: &str, columns: &[&str]) -> String;
}

/// Joins `n` placeholders with `, ` using the dialect's own spelling.
pub fn placeholders(dialect: &dyn StoreDialect, n: usize) -> String {
    (1..=n)
        .map(|i| dialect.placeholder(i))
        .collect::<Vec<_>>()
        .join(", ")
}

pub struct SqliteDialect;

impl StoreDialect for SqliteDialect {
    fn placeholder(&self, _index: usize) -> String {
        "?".to_string()
    }

    fn excluded_prefix(&self) -> &'static str {
        "excluded"
    }

    fn is_integrity_error(&self, message: &str) -> bool {
        let m = message.to_lowercase();
        m.contains("unique constraint") || m.contains("constraint failed")
    }

    fn insert_or_ignore_sql(&self, table: &str, columns: &[&str]) -> String {
        let cols = columns.join(", ");
        let ph = placeholders(self, columns.len());
        format!("INSERT OR IGNORE INTO {table} ({cols}) VALUES ({ph})")
    }
}

/// Sketch of a Postgres dialect: the same six touchpoints, filled in against
/// `tokio_postgres`/`$N` parameter syntax. Not wired to a live connection
/// pool — `converge-store` ships SQLite only, matching this corpus's other
/// storage crate.
#[allow(dead_code)]
pub struct PostgresDialect;

impl StoreDialect for PostgresDialect {
    fn placeholder(&self, index: usize) -> String {
        format!("${index}")
    }

    fn excluded_prefix(&self) -> &'static str {
        "excluded"
    }

    fn is_integrity_error(&self, message: &str) -> bool {
        message.to_lowercase().contains("duplicate key value violates unique constraint")
    }

    fn insert_or_ignore_sql(&self, table: &str, columns: &[&str]) -> String {
        let cols = columns.join(", ");
        let ph = placeholders(self, columns.len());
        format!("INSERT INTO {table} ({cols}) VALUES ({ph}) ON CONFLICT DO NOTHING")
    }
}
