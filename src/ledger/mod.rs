//! Case, evidence and export persistence
//!
//! The ledger is append-only: cases, evidence items and export records are
//! inserted once and never updated or deleted here.

pub mod memory;
pub mod sqlite;

pub use memory::MemoryLedger;
pub use sqlite::SqliteLedger;

use crate::error::Result;
use crate::models::{Case, EvidenceItem, ExportRecord};

/// Storage collaborator for the engine
pub trait Ledger: Send + Sync {
    fn insert_case(&self, case: &Case) -> Result<()>;

    fn get_case(&self, case_id: &str) -> Result<Option<Case>>;

    fn list_cases(&self) -> Result<Vec<Case>>;

    fn insert_evidence(&self, item: &EvidenceItem) -> Result<()>;

    /// Evidence of one case in insertion order
    fn evidence_for_case(&self, case_id: &str) -> Result<Vec<EvidenceItem>>;

    fn insert_export(&self, record: &ExportRecord) -> Result<()>;

    /// Export history of one case in insertion order
    fn exports_for_case(&self, case_id: &str) -> Result<Vec<ExportRecord>>;
}
