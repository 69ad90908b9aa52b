// src/pipeline.rs
//! Record and batch drivers
//!
//! A record is read whole, mutated by the enabled passes in causal order and
//! written once. In batch mode every record is processed in isolation: a
//! failure is reported and the batch moves on.

use crate::config::constants::paths::{DEFAULT_GEOMETRY_FOLDER, RECORD_EXTENSION};
use crate::config::PostProcessConfig;
use crate::error::{PostError, PostErrorBuilder, PostResult};
use crate::passes::{
    clean_up_record, mark_trials_without_dynamics, reconcile_reviews, recompute_record, resample_record,
    review_folder, CleanupSummary, DropList, ResampleSummary, ReviewSummary, RootHistory,
};
use crate::record::{PassKind, Record, RecordCodec};
use crate::skeleton::{PassSkeletons, SkeletonLoader};
use std::path::{Path, PathBuf};
use tracing::{error, info, warn};

/// What happened to one record
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RecordReport {
    pub trials_in: usize,
    pub trials_out: usize,
    pub reviews: Option<ReviewSummary>,
    pub resample: Option<ResampleSummary>,
    pub cleanup: Option<CleanupSummary>,
    pub recomputed_passes: usize,
}

impl RecordReport {
    pub fn dropped(&self) -> usize {
        self.trials_in - self.trials_out
    }
}

/// Results of a batch run
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BatchSummary {
    pub processed: usize,
    pub skipped_existing: usize,
    pub skipped_prerequisite: usize,
    pub failed: Vec<(PathBuf, String)>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BatchOutcome {
    /// Every record was processed or skipped
    Success,
    /// Some records failed and some did not
    PartialFailure,
    /// Every attempted record failed
    TotalFailure,
}

impl BatchSummary {
    pub fn outcome(&self) -> BatchOutcome {
        if self.failed.is_empty() {
            BatchOutcome::Success
        } else if self.processed == 0 && self.skipped_prerequisite == 0 {
            BatchOutcome::TotalFailure
        } else {
            BatchOutcome::PartialFailure
        }
    }
}

/// One record to process and where its output goes
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordJob {
    pub input: PathBuf,
    pub output: PathBuf,
}

pub struct Pipeline<'a> {
    config: PostProcessConfig,
    codec: &'a dyn RecordCodec,
    loader: &'a dyn SkeletonLoader,
}

impl<'a> Pipeline<'a> {
    pub fn new(config: PostProcessConfig, codec: &'a dyn RecordCodec, loader: &'a dyn SkeletonLoader) -> PostResult<Self> {
        config.validate()?;
        if config.only_reviewed {
            warn!("only_reviewed is reserved and has no effect");
        }
        Ok(Self { config, codec, loader })
    }

    pub fn config(&self) -> &PostProcessConfig {
        &self.config
    }

    /// Geometry folder handed to the skeleton loader for records under `input`
    pub fn geometry_folder(&self, input: &Path) -> PathBuf {
        match &self.config.geometry_folder {
            Some(folder) => folder.clone(),
            None => input
                .parent()
                .unwrap_or_else(|| Path::new("."))
                .join(DEFAULT_GEOMETRY_FOLDER),
        }
    }

    /// Process a single record file or every record below a directory
    ///
    /// A single file surfaces its first fatal error; a directory never fails
    /// because of one record.
    pub fn run(&self, input: &Path, output: &Path) -> PostResult<BatchSummary> {
        let geometry = self.geometry_folder(input);
        info!(geometry = %geometry.display(), "geometry folder");

        if input.is_file() {
            let mut summary = BatchSummary::default();
            match self.process_record(input, output, &geometry) {
                Ok(_) => summary.processed += 1,
                Err(e) if e.is_record_skip() => {
                    info!(path = %input.display(), reason = %e, "skipping record");
                    summary.skipped_prerequisite += 1;
                }
                Err(e) => return Err(e),
            }
            return Ok(summary);
        }

        if !input.is_dir() {
            return Err(PostErrorBuilder::new("input")
                .configuration(&format!("{} is neither a record file nor a directory", input.display())));
        }

        let (jobs, skipped_existing) = discover_records(input, output)?;
        info!(records = jobs.len(), skipped_existing, "post-processing batch");
        let mut summary = BatchSummary {
            skipped_existing,
            ..Default::default()
        };

        for (index, job) in jobs.iter().enumerate() {
            info!(record = index + 1, of = jobs.len(), path = %job.input.display(), "reading record");
            match self.process_record(&job.input, &job.output, &geometry) {
                Ok(_) => summary.processed += 1,
                Err(e) if e.is_record_skip() => {
                    info!(path = %job.input.display(), reason = %e, "skipping record");
                    summary.skipped_prerequisite += 1;
                }
                Err(e) => {
                    error!(path = %job.input.display(), error = %e, "record failed");
                    summary.failed.push((job.input.clone(), e.to_string()));
                }
            }
        }

        info!(
            processed = summary.processed,
            skipped_existing = summary.skipped_existing,
            skipped_prerequisite = summary.skipped_prerequisite,
            failed = summary.failed.len(),
            "batch complete"
        );
        Ok(summary)
    }

    /// Read, process and write one record; nothing is written unless every pass succeeds
    pub fn process_record(&self, input: &Path, output: &Path, geometry_folder: &Path) -> PostResult<RecordReport> {
        let mut record = self.codec.read(input)?;
        let report = self.process_in_memory(&mut record, geometry_folder)?;
        self.codec.write(output, &record)?;
        info!(
            path = %output.display(),
            trials = report.trials_out,
            dropped = report.dropped(),
            "record written"
        );
        Ok(report)
    }

    /// Run every enabled pass over a loaded record
    pub fn process_in_memory(&self, record: &mut Record, geometry_folder: &Path) -> PostResult<RecordReport> {
        record.validate()?;
        let config = &self.config;
        let mut report = RecordReport {
            trials_in: record.trials.len(),
            ..Default::default()
        };
        let mut drops = DropList::new();

        if config.only_dynamics {
            if !record.has_pass_kind(PassKind::Dynamics) {
                return Err(PostError::MissingPrerequisite(format!(
                    "{} does not have any dynamics processing passes",
                    record.source.display()
                )));
            }
            mark_trials_without_dynamics(record, &mut drops);
        }

        if let Some(folder) = review_folder(&record.source, &config.review_folder_name) {
            report.reviews = Some(reconcile_reviews(record, &folder));
        }

        if let Some(target_hz) = config.target_sample_rate_hz {
            report.resample = Some(resample_record(record, target_hz)?);
        }

        if config.needs_skeletons() {
            let mut skeletons = PassSkeletons::load(record, self.loader, geometry_folder)?;

            if config.clean_up_noise {
                report.cleanup = Some(clean_up_record(
                    record,
                    &mut skeletons,
                    self.loader,
                    geometry_folder,
                    &mut drops,
                )?);
            }

            let history = RootHistory {
                len: config.root_history_len,
                stride: config.root_history_stride,
            };
            report.recomputed_passes = recompute_record(record, &mut skeletons, &drops, history)?;
        }

        drops.apply(record);
        report.trials_out = record.trials.len();
        Ok(report)
    }
}

/// Find every record below `input_dir` and mirror its relative path under `output_dir`
///
/// Records whose output already exists are left out and counted.
pub fn discover_records(input_dir: &Path, output_dir: &Path) -> PostResult<(Vec<RecordJob>, usize)> {
    let pattern = format!(
        "{}/**/*.{}",
        glob::Pattern::escape(&input_dir.to_string_lossy()),
        RECORD_EXTENSION
    );
    let paths = glob::glob(&pattern)
        .map_err(|e| PostErrorBuilder::new("record discovery").configuration(&e.to_string()))?;

    let mut jobs = Vec::new();
    let mut skipped_existing = 0;
    for entry in paths {
        let input = entry.map_err(|e| PostError::Io(e.into()))?;
        if !input.is_file() {
            continue;
        }
        let relative = input.strip_prefix(input_dir).map_err(|e| {
            PostErrorBuilder::new("record discovery").invalid_data(&format!("{}: {}", input.display(), e))
        })?;
        let output = output_dir.join(relative);
        if output.exists() {
            info!(input = %input.display(), output = %output.display(), "skipping record, output already exists");
            skipped_existing += 1;
            continue;
        }
        jobs.push(RecordJob { input, output });
    }
    Ok((jobs, skipped_existing))
}
