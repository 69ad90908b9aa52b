// src/error.rs
//! Unified error handling for the post-processing pipeline
//!
//! Every pass, the codecs and the skeleton collaborator report failures through
//! [`PostError`]. Recoverable data-quality problems (short trials, anomalous
//! cutoffs, undersized review files) never surface here: they are logged and
//! folded into the drop list or the missing-GRF annotations instead.

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Pipeline stage in which a processing error occurred
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Stage {
    Resample,
    Cleanup,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Stage::Resample => write!(f, "RESAMPLE"),
            Stage::Cleanup => write!(f, "CLEANUP"),
        }
    }
}

/// Unified error type for the entire post-processing system
#[derive(Debug, Error)]
pub enum PostError {
    /// Configuration and setup errors
    #[error("[CONFIG] Configuration error in {component}: {reason}")]
    Configuration { component: String, reason: String },

    /// Record contents that violate the data model
    #[error("[DATA] Invalid {data_type}: {reason}")]
    InvalidData { data_type: String, reason: String },

    /// Signal processing errors inside a pass
    #[error("[{stage}] {reason}")]
    Processing { stage: Stage, reason: String },

    /// The record cannot be processed under the current configuration
    #[error("[SKIP] {0}")]
    MissingPrerequisite(String),

    /// The skeleton collaborator could not build a body model
    #[error("[SKELETON] Failed to load skeleton for processing pass {pass_index}: {reason}")]
    SkeletonLoad { pass_index: usize, reason: String },

    /// Explicit velocity/acceleration overrides were not preserved by recomputation
    #[error("[RECOMPUTE] Explicit overrides changed during recompute (trial {trial}, pass {pass})")]
    RecomputeMismatch { trial: usize, pass: usize },

    #[error("[CODEC] {0}")]
    Codec(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("Config error: {0}")]
    Config(#[from] config::ConfigError),
}

impl PostError {
    /// Whether this error skips the record rather than failing it
    pub fn is_record_skip(&self) -> bool {
        matches!(self, PostError::MissingPrerequisite(_))
    }
}

/// Result type alias for post-processing operations
pub type PostResult<T> = Result<T, PostError>;

/// Error builder for convenient error construction
pub struct PostErrorBuilder {
    component: String,
}

impl PostErrorBuilder {
    pub fn new(component: &str) -> Self {
        Self {
            component: component.to_string(),
        }
    }

    pub fn configuration(self, reason: &str) -> PostError {
        PostError::Configuration {
            component: self.component,
            reason: reason.to_string(),
        }
    }

    pub fn invalid_data(self, reason: &str) -> PostError {
        PostError::InvalidData {
            data_type: self.component,
            reason: reason.to_string(),
        }
    }

    pub fn processing(self, stage: Stage, reason: &str) -> PostError {
        PostError::Processing {
            stage,
            reason: format!("{}: {}", self.component, reason),
        }
    }
}
