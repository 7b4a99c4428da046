//! Scanner adapter interface, ported from `ports.SecurityScannerPort` (the
//! port itself is absent from the retrieval pack; its shape is inferred from
//! every adapter in `adapters/security/*.py` implementing the same
//! `scanner_name` / `is_available` / `scan` trio).

use std::path::Path;

use converge_types::SecurityFinding;

/// Options threaded through to a scanner; mirrors the `**options` kwargs bag
/// the reference adapters read ad hoc (`severity`, `timeout`, `command`, ...).
#[derive(Debug, Clone, Default)]
pub struct ScanOptions {
    pub intent_id: Option<String>,
    pub tenant_id: Option<String>,
    pub timeout_seconds: u64,
}

pub trait SecurityScannerPort {
    fn scanner_name(&self) -> &str;

    /// Whether this scanner's backing tool is present and runnable.
    fn is_available(&self) -> bool;

    fn scan(&self, path: &Path, options: &ScanOptions) -> anyhow::Result<Vec<SecurityFinding>>;
}
