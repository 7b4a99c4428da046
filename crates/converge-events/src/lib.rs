//! The typed event-log facade and tamper-evident audit chain.

mod chain;
mod log;

pub use chain::{compute_event_hash, initialize_chain, verify_chain, ChainInitResult, ChainVerifyResult};
pub use log::EventLog;
