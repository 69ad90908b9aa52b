// src/passes/review.rs
//! Merge manual review flags into missing-GRF annotations

use crate::config::constants::paths::{REVIEW_FILE_NAME, REVIEW_FLAGS_KEY, SEGMENT_FOLDER_PREFIX};
use crate::error::{PostErrorBuilder, PostResult};
use crate::record::{MissingGrfReason, Record, Trial};
use serde_json::Value;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// What reconciliation did to one trial
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReviewOutcome {
    /// Flags were applied; `flagged` frames became manual-review
    Incorporated { flagged: usize },
    /// No usable review file; every frame became manual-review
    Missing,
    /// The review covered fewer frames than the trial; every frame became manual-review
    Undersized { flags: usize, frames: usize },
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReviewSummary {
    pub incorporated: usize,
    pub defaulted: usize,
}

/// Folder next to the record holding review files, if it exists
pub fn review_folder(record_path: &Path, folder_name: &str) -> Option<PathBuf> {
    let folder = record_path.parent().unwrap_or_else(|| Path::new(".")).join(folder_name);
    folder.is_dir().then_some(folder)
}

/// Location of a trial segment's review file
pub fn review_path(review_folder: &Path, trial: &Trial) -> PathBuf {
    review_folder
        .join(&trial.original_name)
        .join(format!("{}{}", SEGMENT_FOLDER_PREFIX, trial.split_index + 1))
        .join(REVIEW_FILE_NAME)
}

/// Read the per-frame missing-GRF flags from a review file
pub fn load_review_flags(path: &Path) -> PostResult<Vec<bool>> {
    let contents = fs::read_to_string(path)?;
    let review: Value = serde_json::from_str(&contents)?;
    let flags = review
        .get(REVIEW_FLAGS_KEY)
        .and_then(Value::as_array)
        .ok_or_else(|| {
            PostErrorBuilder::new("review file")
                .invalid_data(&format!("{} has no '{}' array", path.display(), REVIEW_FLAGS_KEY))
        })?;

    flags
        .iter()
        .map(|flag| {
            flag.as_bool().ok_or_else(|| {
                PostErrorBuilder::new("review file")
                    .invalid_data(&format!("{} contains a non-boolean flag", path.display()))
            })
        })
        .collect()
}

/// Apply review flags to one trial's reasons
///
/// A review at least as long as the trial is authoritative for flagged frames
/// only: `true` sets manual-review, `false` keeps whatever reason was already
/// there. Extra trailing flags are ignored. A missing or shorter review marks
/// every frame manual-review.
pub fn reconcile_reasons(reasons: &mut [MissingGrfReason], flags: Option<&[bool]>) -> ReviewOutcome {
    match flags {
        Some(flags) if flags.len() >= reasons.len() => {
            let mut flagged = 0;
            for (reason, &flag) in reasons.iter_mut().zip(flags) {
                if flag {
                    *reason = MissingGrfReason::ManualReview;
                    flagged += 1;
                }
            }
            ReviewOutcome::Incorporated { flagged }
        }
        other => {
            reasons.fill(MissingGrfReason::ManualReview);
            match other {
                Some(flags) => ReviewOutcome::Undersized {
                    flags: flags.len(),
                    frames: reasons.len(),
                },
                None => ReviewOutcome::Missing,
            }
        }
    }
}

/// Reconcile every trial of a record against the review files under `review_folder`
pub fn reconcile_reviews(record: &mut Record, review_folder: &Path) -> ReviewSummary {
    let mut summary = ReviewSummary::default();

    for trial in &mut record.trials {
        let path = review_path(review_folder, trial);
        let flags = if path.is_file() {
            match load_review_flags(&path) {
                Ok(flags) => Some(flags),
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "unreadable review file, treating trial as unreviewed");
                    None
                }
            }
        } else {
            None
        };

        match reconcile_reasons(&mut trial.missing_grf_reason, flags.as_deref()) {
            ReviewOutcome::Incorporated { flagged } => {
                info!(path = %path.display(), flagged, "user reviews incorporated");
                summary.incorporated += 1;
            }
            ReviewOutcome::Undersized { flags, frames } => {
                warn!(
                    path = %path.display(),
                    flags,
                    frames,
                    "review file has fewer missing GRF flags than the trial has frames, marking all frames for manual review"
                );
                summary.defaulted += 1;
            }
            ReviewOutcome::Missing => {
                warn!(trial = %trial.original_name, "no review file, marking all frames for manual review");
                summary.defaulted += 1;
            }
        }
    }

    summary
}
