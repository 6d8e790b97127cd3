use std::fs::{File, OpenOptions};
use std::path::{Path, PathBuf};

use crate::error::AdmissionResult;
use crate::shared_data::CrossingRecord;

/// Append-only CSV file of crossings. The header row is written with the
/// first record of a new file.
#[derive(Debug, Clone)]
pub struct CrossingLog {
    path: PathBuf,
}

impl CrossingLog {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn append(&self, record: &CrossingRecord) -> AdmissionResult<()> {
        self.append_all(std::slice::from_ref(record))
    }

    pub fn append_all(&self, records: &[CrossingRecord]) -> AdmissionResult<()> {
        let file_exists = self.path.exists();
        let file = OpenOptions::new().append(true).create(true).open(&self.path)?;
        let mut wtr = csv::WriterBuilder::new()
            .has_headers(!file_exists)
            .from_writer(file);
        for record in records {
            wtr.serialize(record)?;
        }
        wtr.flush()?;
        Ok(())
    }

    pub fn read_all(&self) -> AdmissionResult<Vec<CrossingRecord>> {
        let file = File::open(&self.path)?;
        let mut rdr = csv::Reader::from_reader(file);
        let mut records = Vec::new();
        for result in rdr.deserialize() {
            records.push(result?);
        }
        Ok(records)
    }
}
