//! In-process ledger for tests and one-shot runs

use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use crate::error::{EngineError, Result};
use crate::models::{Case, EvidenceItem, ExportRecord};

use super::Ledger;

#[derive(Debug, Default)]
pub struct MemoryLedger {
    cases: RwLock<Vec<Case>>,
    evidence: RwLock<Vec<EvidenceItem>>,
    exports: RwLock<Vec<ExportRecord>>,
}

impl MemoryLedger {
    pub fn new() -> Self {
        Self::default()
    }
}

fn read<T>(lock: &RwLock<T>) -> Result<RwLockReadGuard<'_, T>> {
    lock.read().map_err(|_| EngineError::Ledger("ledger lock poisoned".to_string()))
}

fn write<T>(lock: &RwLock<T>) -> Result<RwLockWriteGuard<'_, T>> {
    lock.write().map_err(|_| EngineError::Ledger("ledger lock poisoned".to_string()))
}

impl Ledger for MemoryLedger {
    fn insert_case(&self, case: &Case) -> Result<()> {
        let mut cases = write(&self.cases)?;
        if cases.iter().any(|c| c.case_id == case.case_id) {
            return Err(EngineError::Ledger(format!("case {} already exists", case.case_id)));
        }
        cases.push(case.clone());
        Ok(())
    }

    fn get_case(&self, case_id: &str) -> Result<Option<Case>> {
        Ok(read(&self.cases)?.iter().find(|c| c.case_id == case_id).cloned())
    }

    fn list_cases(&self) -> Result<Vec<Case>> {
        Ok(read(&self.cases)?.clone())
    }

    fn insert_evidence(&self, item: &EvidenceItem) -> Result<()> {
        let mut evidence = write(&self.evidence)?;
        if evidence.iter().any(|e| e.evidence_id == item.evidence_id) {
            return Err(EngineError::Ledger(format!("evidence {} already exists", item.evidence_id)));
        }
        evidence.push(item.clone());
        Ok(())
    }

    fn evidence_for_case(&self, case_id: &str) -> Result<Vec<EvidenceItem>> {
        Ok(read(&self.evidence)?
            .iter()
            .filter(|e| e.case_id == case_id)
            .cloned()
            .collect())
    }

    fn insert_export(&self, record: &ExportRecord) -> Result<()> {
        let mut exports = write(&self.exports)?;
        if exports.iter().any(|e| e.export_id == record.export_id) {
            return Err(EngineError::Ledger(format!("export {} already exists", record.export_id)));
        }
        exports.push(record.clone());
        Ok(())
    }

    fn exports_for_case(&self, case_id: &str) -> Result<Vec<ExportRecord>> {
        Ok(read(&self.exports)?
            .iter()
            .filter(|e| e.case_id == case_id)
            .cloned()
            .collect())
    }
}
