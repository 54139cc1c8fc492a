//! List use case - every installed package.

use anyhow::Result;

use crate::runtime::Runtime;
use crate::state::{InstallationRecord, RecordRepository};

pub struct ListUseCase<'a, R: Runtime + ?Sized> {
    records: RecordRepository<'a, R>,
}

impl<'a, R: Runtime + ?Sized> ListUseCase<'a, R> {
    pub fn new(records: RecordRepository<'a, R>) -> Self {
        Self { records }
    }

    /// Installed records ordered by name, then version.
    pub fn list(&self) -> Result<Vec<InstallationRecord>> {
        Ok(self.records.load_all()?.iter().cloned().collect())
    }
}
