// src/record/codec.rs
//! Reading and writing records on disk

use super::Record;
use crate::error::{PostError, PostResult};
use std::fs;
use std::io::{BufReader, BufWriter, Write};
use std::path::Path;
use tempfile::NamedTempFile;
use tracing::debug;

/// Persistence collaborator for records
pub trait RecordCodec {
    /// Load a full record into memory; trials get ids from their position
    fn read(&self, path: &Path) -> PostResult<Record>;

    /// Persist a record. Either the complete file appears at `path` or nothing does.
    fn write(&self, path: &Path, record: &Record) -> PostResult<()>;
}

/// JSON encoding of the record model
#[derive(Debug, Clone, Default)]
pub struct JsonRecordCodec {
    pretty: bool,
}

impl JsonRecordCodec {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn pretty() -> Self {
        Self { pretty: true }
    }
}

impl RecordCodec for JsonRecordCodec {
    fn read(&self, path: &Path) -> PostResult<Record> {
        let file = fs::File::open(path)?;
        let mut record: Record = serde_json::from_reader(BufReader::new(file))
            .map_err(|e| PostError::Codec(format!("failed to decode {}: {}", path.display(), e)))?;
        record.source = path.to_path_buf();
        record.assign_trial_ids();

        debug!(path = %path.display(), trials = record.trials.len(), "record loaded");
        Ok(record)
    }

    fn write(&self, path: &Path, record: &Record) -> PostResult<()> {
        let directory = match path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        };
        fs::create_dir_all(directory)?;

        let staging = NamedTempFile::new_in(directory)?;
        {
            let mut writer = BufWriter::new(staging.as_file());
            if self.pretty {
                serde_json::to_writer_pretty(&mut writer, record)?;
            } else {
                serde_json::to_writer(&mut writer, record)?;
            }
            writer.flush()?;
        }
        staging.as_file().sync_all()?;
        staging
            .persist(path)
            .map_err(|e| PostError::Codec(format!("failed to persist {}: {}", path.display(), e.error)))?;

        debug!(path = %path.display(), trials = record.trials.len(), "record written");
        Ok(())
    }
}
