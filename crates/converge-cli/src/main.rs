use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Result;
use clap::{Parser, Subcommand, ValueEnum};
use converge_core::{DrainOptions, Engine, Projections};
use converge_events::{verify_chain, EventLog};
use converge_scm::GitScm;
use converge_store::{ConvergeStore, SqliteStore};
use converge_types::Status;

#[derive(Parser, Debug)]
#[command(name = "converge", version)]
#[command(about = "Event-sourced merge-queue coordination")]
struct Cli {
    /// Path to the SQLite store (created if missing).
    #[arg(long, default_value = "converge.sqlite", global = true)]
    store: PathBuf,

    /// Working tree the SCM port operates against.
    #[arg(long, default_value = ".", global = true)]
    repo: PathBuf,

    /// Restrict the command to one tenant.
    #[arg(long, global = true)]
    tenant: Option<String>,

    #[command(subcommand)]
    cmd: Commands,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum StatusArg {
    Ready,
    Validated,
    Queued,
    Merged,
    Rejected,
    Blocked,
}

impl From<StatusArg> for Status {
    fn from(value: StatusArg) -> Self {
        match value {
            StatusArg::Ready => Status::Ready,
            StatusArg::Validated => Status::Validated,
            StatusArg::Queued => Status::Queued,
            StatusArg::Merged => Status::Merged,
            StatusArg::Rejected => Status::Rejected,
            StatusArg::Blocked => Status::Blocked,
        }
    }
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Drain the merge queue: simulate, merge, retry, or reject each eligible intent.
    ProcessQueue {
        /// Merge target branch.
        #[arg(long, default_value = "main")]
        target: String,
        /// Max intents to process this run.
        #[arg(long, default_value_t = 50)]
        limit: usize,
        /// Max retries before rejecting a failed merge.
        #[arg(long, default_value_t = converge_core::DEFAULT_MAX_RETRIES)]
        max_retries: u32,
        /// Don't auto-confirm successful merges (leave them queued for manual confirmation).
        #[arg(long)]
        no_auto_confirm: bool,
    },
    /// List intents in the queue, optionally filtered by status.
    InspectQueue {
        #[arg(long, value_enum)]
        status: Option<StatusArg>,
    },
    /// Re-walk the event log's tamper-evident hash chain and report whether it's intact.
    VerifyChain,
    /// Initialize (or re-initialize) the audit hash chain from the current log.
    InitChain,
    /// Print the five-check SLO compliance report.
    ComplianceReport,
}

fn open_store(path: &PathBuf) -> Result<Arc<dyn ConvergeStore>> {
    let store = SqliteStore::open(path)?;
    Ok(Arc::new(store))
}

fn main() -> Result<()> {
    tracing_subscriber::fmt::init();
    let cli = Cli::parse();
    let store = open_store(&cli.store)?;

    match cli.cmd {
        Commands::ProcessQueue { target, limit, max_retries, no_auto_confirm } => {
            let engine = Engine::new(store, Arc::new(GitScm::new(cli.repo.clone())));
            let options =
                DrainOptions { target: &target, auto_confirm: !no_auto_confirm, max_retries, ..DrainOptions::default() };
            let decisions = engine.process_queue(limit, &options)?;
            println!("{}", serde_json::to_string_pretty(&decisions_to_json(&decisions))?);
        }
        Commands::InspectQueue { status } => {
            let engine = Engine::new(store, Arc::new(GitScm::new(cli.repo.clone())));
            let intents = engine.inspect_queue(status.map(Status::from), cli.tenant.as_deref())?;
            println!("{}", serde_json::to_string_pretty(&intents)?);
        }
        Commands::VerifyChain => {
            let log = EventLog::new(store.clone());
            let result = verify_chain(&log, store.as_ref())?;
            println!("{}", serde_json::to_string_pretty(&result)?);
            if !result.valid {
                std::process::exit(1);
            }
        }
        Commands::InitChain => {
            let log = EventLog::new(store.clone());
            let result = converge_events::initialize_chain(&log, store.as_ref())?;
            println!("{}", serde_json::to_string_pretty(&result)?);
        }
        Commands::ComplianceReport => {
            let projections = Projections::new(store);
            let report = projections.compliance_report(cli.tenant.as_deref())?;
            println!("{}", serde_json::to_string_pretty(&report)?);
            if !report.passed {
                std::process::exit(1);
            }
        }
    }

    Ok(())
}

fn decisions_to_json(decisions: &[converge_core::QueueDecision]) -> serde_json::Value {
    use converge_core::QueueDecisionKind::*;
    serde_json::Value::Array(
        decisions
            .iter()
            .map(|d| {
                let kind = match &d.decision {
                    Merged { commit } => serde_json::json!({"kind": "merged", "commit": commit}),
                    Requeued { retries, error } => serde_json::json!({"kind": "requeued", "retries": retries, "error": error}),
                    Rejected { retries, error } => serde_json::json!({"kind": "rejected", "retries": retries, "error": error}),
                    DependencyBlocked { unmet } => serde_json::json!({"kind": "dependency_blocked", "unmet": unmet}),
                    PolicyBlocked { reasons } => serde_json::json!({"kind": "policy_blocked", "reasons": reasons}),
                    AuthorizationDenied { reasons } => serde_json::json!({"kind": "authorization_denied", "reasons": reasons}),
                };
                serde_json::json!({"intent_id": d.intent_id, "decision": kind})
            })
            .collect(),
    )
}
