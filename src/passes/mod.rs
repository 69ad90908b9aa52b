// src/passes/mod.rs
//! Post-processing passes over an in-memory record
//!
//! Passes run in a fixed causal order (review, resample, cleanup, recompute)
//! and share a [`DropList`] that is applied once at the end.

pub mod cleanup;
pub mod drop_list;
pub mod recompute;
pub mod resample;
pub mod review;

pub use cleanup::{clean_up_record, CleanupSummary};
pub use drop_list::{DropList, DropReason};
pub use recompute::{recompute_record, RootHistory};
pub use resample::{resample_record, ResampleSummary};
pub use review::{reconcile_reviews, review_folder, ReviewSummary};

use crate::record::{PassKind, Record};
use tracing::info;

/// Mark every trial without a dynamics pass
pub fn mark_trials_without_dynamics(record: &Record, drops: &mut DropList) -> usize {
    let mut marked = 0;
    for trial in &record.trials {
        if !trial.has_pass_kind(PassKind::Dynamics) {
            drops.mark(trial.id, DropReason::NoDynamicsPass);
            marked += 1;
        }
    }
    if marked > 0 {
        info!(trials = marked, "trials without a dynamics pass will be dropped");
    }
    marked
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::test_support::*;

    #[test]
    fn test_mark_trials_without_dynamics() {
        let mut record = single_pass_record(vec![walking_trial(20, 100.0), walking_trial(20, 100.0)]);
        let derived = record.trials[1].passes[0].derive(PassKind::Dynamics);
        record.trials[1].append_pass(derived);

        let mut drops = DropList::new();
        assert_eq!(mark_trials_without_dynamics(&record, &mut drops), 1);
        assert!(drops.contains(record.trials[0].id));
        assert!(!drops.contains(record.trials[1].id));
    }
}
