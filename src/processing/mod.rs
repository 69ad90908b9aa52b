// src/processing/mod.rs
//! Signal utilities shared by the post-processing passes

pub mod filters;
pub mod resampling;
pub mod spectrum;
pub mod windowing;

pub use filters::{butterworth_lowpass, filtfilt, filtfilt_rows, lowpass_filter, repair_boundaries, IirCoefficients};
pub use resampling::{resample_discrete, resample_discrete_to_length, resample_poly, resample_to_rate};
pub use spectrum::{estimate_cutoff_frequency, estimate_matrix_cutoff, welch_psd, PowerSpectrum};
pub use windowing::{generate_window, WindowType};
