//! b3d-post: post-processing passes for recorded biomechanics datasets
//!
//! A record holds one subject's trials; each trial carries force plates and an
//! append-only chain of processing passes (kinematics fit, dynamics fit,
//! filtered passes). This crate rewrites records in place:
//!
//! - Review reconciliation merges manual missing-GRF flags into the record
//! - Resampling moves every trial to a common sample rate
//! - Noise cleanup appends a zero-phase lowpass pass with physically consistent
//!   root accelerations and plausible centers of pressure
//! - Recompute regenerates torques, residuals and root histories
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use b3d_post::{JsonRecordCodec, Pipeline, PointMassLoader, PostProcessConfig};
//! use std::path::Path;
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = PostProcessConfig {
//!         clean_up_noise: true,
//!         target_sample_rate_hz: Some(100),
//!         ..Default::default()
//!     };
//!     let codec = JsonRecordCodec::new();
//!     let pipeline = Pipeline::new(config, &codec, &PointMassLoader)?;
//!
//!     let summary = pipeline.run(Path::new("raw/"), Path::new("processed/"))?;
//!     println!("processed {} records", summary.processed);
//!     Ok(())
//! }
//! ```

#![warn(clippy::all)]

pub mod config;
pub mod error;
pub mod passes;
pub mod pipeline;
pub mod processing;
pub mod record;
pub mod skeleton;

// Re-export commonly used types for convenience
pub use config::{ConfigLoader, PostProcessConfig};
pub use error::{PostError, PostResult, Stage};
pub use pipeline::{BatchOutcome, BatchSummary, Pipeline, RecordReport};
pub use record::{JsonRecordCodec, Record, RecordCodec};
pub use skeleton::{PointMassLoader, Skeleton, SkeletonLoader};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Library name
pub const NAME: &str = env!("CARGO_PKG_NAME");
