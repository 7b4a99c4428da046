//! The `ScmPort` trait: pure I/O boundary between the queue processor and
//! whatever version control system backs a repository.

use converge_types::Simulation;

#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct LogEntry {
    pub sha: String,
    pub author: String,
    pub date: String,
    pub subject: String,
    pub files: Vec<String>,
}

pub trait ScmPort {
    /// Simulates merging `source` into `target` without mutating any
    /// working state. Must be safe to call repeatedly and concurrently.
    fn simulate_merge(&self, source: &str, target: &str) -> anyhow::Result<Simulation>;

    /// Performs the merge in an isolated working copy and atomically
    /// updates `target` to the resulting commit. Returns the merge SHA.
    /// On failure the caller's working copy must be left untouched.
    fn execute_merge_safe(&self, source: &str, target: &str) -> anyhow::Result<String>;

    /// Returns up to `max_commits` log entries for archaeology /
    /// provenance lookups, newest first.
    fn log_entries(&self, max_commits: usize) -> anyhow::Result<Vec<LogEntry>>;
}
