// src/config/mod.rs
//! Post-processing configuration

pub mod constants;
pub mod loader;

pub use constants::*;
pub use loader::ConfigLoader;

use crate::error::{PostErrorBuilder, PostResult};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Options controlling which passes run over each record
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct PostProcessConfig {
    /// Reserved: filtering to reviewed segments is not implemented
    #[serde(default)]
    pub only_reviewed: bool,

    #[serde(default)]
    pub only_dynamics: bool,

    #[serde(default)]
    pub clean_up_noise: bool,

    #[serde(default)]
    pub recompute_values: bool,

    #[serde(default = "defaults::root_history_len")]
    pub root_history_len: usize,

    #[serde(default = "defaults::root_history_stride")]
    pub root_history_stride: usize,

    #[serde(default)]
    pub target_sample_rate_hz: Option<u32>,

    #[serde(default)]
    pub geometry_folder: Option<PathBuf>,

    #[serde(default = "defaults::review_folder_name")]
    pub review_folder_name: String,
}

mod defaults {
    use crate::config::constants::*;

    pub fn root_history_len() -> usize {
        recompute::DEFAULT_ROOT_HISTORY_LEN
    }

    pub fn root_history_stride() -> usize {
        recompute::DEFAULT_ROOT_HISTORY_STRIDE
    }

    pub fn review_folder_name() -> String {
        paths::DEFAULT_REVIEW_FOLDER.to_string()
    }
}

impl Default for PostProcessConfig {
    fn default() -> Self {
        Self {
            only_reviewed: false,
            only_dynamics: false,
            clean_up_noise: false,
            recompute_values: false,
            root_history_len: defaults::root_history_len(),
            root_history_stride: defaults::root_history_stride(),
            target_sample_rate_hz: None,
            geometry_folder: None,
            review_folder_name: defaults::review_folder_name(),
        }
    }
}

impl PostProcessConfig {
    /// Reject option combinations no pass can honor
    pub fn validate(&self) -> PostResult<()> {
        if self.root_history_stride == 0 {
            return Err(PostErrorBuilder::new("root_history_stride").configuration("stride must be at least 1"));
        }
        if self.root_history_len > recompute::MAX_ROOT_HISTORY_LEN {
            return Err(PostErrorBuilder::new("root_history_len").configuration(&format!(
                "history length {} exceeds the maximum of {}",
                self.root_history_len,
                recompute::MAX_ROOT_HISTORY_LEN
            )));
        }
        if self.target_sample_rate_hz == Some(0) {
            return Err(PostErrorBuilder::new("target_sample_rate_hz").configuration("sample rate must be positive"));
        }
        if self.review_folder_name.is_empty() {
            return Err(PostErrorBuilder::new("review_folder_name").configuration("folder name must not be empty"));
        }
        Ok(())
    }

    /// Whether any pass needs the per-pass skeletons
    pub fn needs_skeletons(&self) -> bool {
        self.clean_up_noise || self.recompute_values || self.target_sample_rate_hz.is_some()
    }
}
