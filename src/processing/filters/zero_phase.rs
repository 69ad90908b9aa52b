// src/processing/filters/zero_phase.rs
//! Forward-backward (zero-phase) filtering and edge repair

use super::{butterworth_lowpass, lfilter_zi, IirCoefficients, IirFilter};
use crate::error::{PostErrorBuilder, PostResult, Stage};
use ndarray::{Array2, ArrayView2, Axis};

/// Number of samples reflected onto each end before filtering
pub fn pad_length(coefficients: &IirCoefficients) -> usize {
    3 * coefficients.a.len().max(coefficients.b.len())
}

/// Apply `coefficients` forward then backward so the result has no group delay
///
/// Each end is extended by an odd reflection of `pad_length` samples and both
/// passes start from the steady-state filter condition scaled to the first
/// sample, which keeps constant and slowly varying signals free of transients.
pub fn filtfilt(coefficients: &IirCoefficients, signal: &[f64]) -> PostResult<Vec<f64>> {
    let padlen = pad_length(coefficients);
    if signal.len() <= padlen {
        return Err(PostErrorBuilder::new("filtfilt").processing(
            Stage::Cleanup,
            &format!("signal of {} samples must be longer than the {} sample pad", signal.len(), padlen),
        ));
    }

    let extended = odd_extension(signal, padlen);
    let zi = lfilter_zi(coefficients)?;

    let scaled = |scale: f64| zi.iter().map(|z| z * scale).collect::<Vec<_>>();

    let mut forward = IirFilter::with_state(coefficients.clone(), scaled(extended[0]));
    let mut output = forward.process(&extended);

    output.reverse();
    let mut backward = IirFilter::with_state(coefficients.clone(), scaled(output[0]));
    let mut output = backward.process(&output);
    output.reverse();

    Ok(output[padlen..output.len() - padlen].to_vec())
}

/// Zero-phase filter every row of a `(channels, frames)` matrix
pub fn filtfilt_rows(coefficients: &IirCoefficients, matrix: ArrayView2<f64>) -> PostResult<Array2<f64>> {
    let mut filtered = Array2::zeros(matrix.raw_dim());
    for (source, mut target) in matrix.axis_iter(Axis(0)).zip(filtered.axis_iter_mut(Axis(0))) {
        let row = filtfilt(coefficients, &source.to_vec())?;
        for (slot, value) in target.iter_mut().zip(row) {
            *slot = value;
        }
    }
    Ok(filtered)
}

/// Zero-phase Butterworth lowpass of a single signal
pub fn lowpass_filter(signal: &[f64], order: usize, cutoff_hz: f64, sample_rate_hz: f64) -> PostResult<Vec<f64>> {
    let coefficients = butterworth_lowpass(order, cutoff_hz, sample_rate_hz)?;
    filtfilt(&coefficients, signal)
}

/// Overwrite the first and last frame of every row with its interior neighbor
///
/// Finite-differenced velocities and accelerations carry edge artifacts in
/// their boundary frames. Matrices with fewer than two frames are left alone.
pub fn repair_boundaries(matrix: &mut Array2<f64>) {
    let frames = matrix.ncols();
    if frames < 2 {
        return;
    }
    for mut row in matrix.rows_mut() {
        row[0] = row[1];
        row[frames - 1] = row[frames - 2];
    }
}

fn odd_extension(signal: &[f64], padlen: usize) -> Vec<f64> {
    let n = signal.len();
    let first = signal[0];
    let last = signal[n - 1];

    let mut extended = Vec::with_capacity(n + 2 * padlen);
    extended.extend((1..=padlen).rev().map(|i| 2.0 * first - signal[i]));
    extended.extend_from_slice(signal);
    extended.extend((1..=padlen).map(|i| 2.0 * last - signal[n - 1 - i]));
    extended
}
