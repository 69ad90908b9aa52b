// src/passes/drop_list.rs
//! Deferred trial removal
//!
//! Passes only mark trials; the marked trials are removed in one step after
//! every pass has run, so trial positions never shift mid-pipeline.

use crate::record::{Record, TrialId};
use std::collections::BTreeMap;
use std::fmt;
use tracing::info;

/// Why a trial was marked for removal
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DropReason {
    /// The trial has no dynamics pass while only dynamics trials are kept
    NoDynamicsPass,
    /// Too few frames to filter
    TooShort { frames: usize },
    /// Estimated cutoff reached the Nyquist frequency
    CutoffAtNyquist,
}

impl fmt::Display for DropReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DropReason::NoDynamicsPass => write!(f, "no dynamics pass"),
            DropReason::TooShort { frames } => write!(f, "too short to filter ({} frames)", frames),
            DropReason::CutoffAtNyquist => write!(f, "cutoff at or above Nyquist"),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct DropList {
    // The first reason a trial was marked is the one kept
    entries: BTreeMap<TrialId, DropReason>,
}

impl DropList {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn mark(&mut self, id: TrialId, reason: DropReason) {
        self.entries.entry(id).or_insert(reason);
    }

    pub fn contains(&self, id: TrialId) -> bool {
        self.entries.contains_key(&id)
    }

    pub fn reason(&self, id: TrialId) -> Option<DropReason> {
        self.entries.get(&id).copied()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Remove every marked trial from the record, returning how many were removed
    pub fn apply(&self, record: &mut Record) -> usize {
        if self.entries.is_empty() {
            return 0;
        }
        let before = record.trials.len();
        record.trials.retain(|trial| match self.entries.get(&trial.id) {
            Some(reason) => {
                info!(trial = trial.id.0, name = %trial.original_name, %reason, "dropping trial");
                false
            }
            None => true,
        });
        before - record.trials.len()
    }
}
