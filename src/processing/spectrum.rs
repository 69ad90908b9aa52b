// src/processing/spectrum.rs
//! Power spectral density estimation and adaptive cutoff selection

use crate::config::constants::signal::{CUTOFF_POWER_FRACTION, MAX_WELCH_SEGMENT_SAMPLES, MIN_CUTOFF_FREQUENCY_HZ};
use crate::processing::windowing::{generate_window, WindowType};
use ndarray::ArrayView2;
use rustfft::{num_complex::Complex, FftPlanner};

/// One-sided power spectral density
#[derive(Debug, Clone, PartialEq)]
pub struct PowerSpectrum {
    pub frequencies: Vec<f64>,
    pub density: Vec<f64>,
}

impl PowerSpectrum {
    pub fn total_power(&self) -> f64 {
        self.density.iter().sum()
    }

    /// Lowest frequency at which the cumulative power reaches `fraction` of the total
    pub fn rolloff_frequency(&self, fraction: f64) -> f64 {
        let target_power = fraction * self.total_power();
        let mut cumulative_power = 0.0;

        for (frequency, &power) in self.frequencies.iter().zip(&self.density) {
            cumulative_power += power;
            if cumulative_power >= target_power {
                return *frequency;
            }
        }

        self.frequencies.last().copied().unwrap_or(0.0)
    }
}

/// Welch's averaged periodogram
///
/// Segments of `segment_len` samples (capped at the signal length) overlap by
/// half, are mean-detrended and Hann windowed, and are scaled as a density in
/// units²/Hz.
pub fn welch_psd(signal: &[f64], sample_rate_hz: f64, segment_len: usize) -> PowerSpectrum {
    let nperseg = segment_len.min(signal.len());
    if nperseg == 0 || sample_rate_hz <= 0.0 {
        return PowerSpectrum { frequencies: Vec::new(), density: Vec::new() };
    }

    let noverlap = nperseg / 2;
    let step = nperseg - noverlap;
    let segment_count = (signal.len() - noverlap) / step;

    let window = generate_window(WindowType::Hann, nperseg);
    let scale = 1.0 / (sample_rate_hz * window.iter().map(|w| w * w).sum::<f64>());
    let bins = nperseg / 2 + 1;

    let fft = FftPlanner::<f64>::new().plan_fft_forward(nperseg);
    let mut buffer = vec![Complex::new(0.0, 0.0); nperseg];
    let mut density = vec![0.0; bins];

    for segment in 0..segment_count {
        let samples = &signal[segment * step..segment * step + nperseg];
        let mean = samples.iter().sum::<f64>() / nperseg as f64;
        for ((slot, &x), &w) in buffer.iter_mut().zip(samples).zip(&window) {
            *slot = Complex::new((x - mean) * w, 0.0);
        }

        fft.process(&mut buffer);

        for (k, value) in buffer.iter().take(bins).enumerate() {
            density[k] += value.norm_sqr() * scale;
        }
    }

    // Fold the negative frequencies onto the positive ones; DC and Nyquist are unique
    let last_doubled = if nperseg % 2 == 0 { bins - 1 } else { bins };
    for power in density.iter_mut().take(last_doubled).skip(1) {
        *power *= 2.0;
    }
    for power in &mut density {
        *power /= segment_count as f64;
    }

    let frequencies = (0..bins).map(|k| k as f64 * sample_rate_hz / nperseg as f64).collect();
    PowerSpectrum { frequencies, density }
}

/// Frequency below which 99% of the signal's power lies
///
/// Returns 0.0 for empty or constant signals; callers apply their own floor.
pub fn estimate_cutoff_frequency(signal: &[f64], sample_rate_hz: f64) -> f64 {
    let spectrum = welch_psd(signal, sample_rate_hz, MAX_WELCH_SEGMENT_SAMPLES);
    if spectrum.frequencies.is_empty() || spectrum.total_power() <= 0.0 {
        return 0.0;
    }
    spectrum.rolloff_frequency(CUTOFF_POWER_FRACTION)
}

/// Maximum per-row cutoff of a `(channels, frames)` matrix, floored at 1 Hz
pub fn estimate_matrix_cutoff(matrix: ArrayView2<f64>, sample_rate_hz: f64) -> f64 {
    matrix
        .rows()
        .into_iter()
        .map(|row| estimate_cutoff_frequency(&row.to_vec(), sample_rate_hz))
        .fold(MIN_CUTOFF_FREQUENCY_HZ, f64::max)
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::Array2;
    use std::f64::consts::PI;

    fn sine(freq_hz: f64, fs: f64, n: usize) -> Vec<f64> {
        (0..n).map(|i| (2.0 * PI * freq_hz * i as f64 / fs).sin()).collect()
    }

    #[test]
    fn test_welch_frequency_axis() {
        let spectrum = welch_psd(&sine(5.0, 100.0, 200), 100.0, 1024);
        assert_eq!(spectrum.frequencies.len(), 101);
        assert_eq!(spectrum.frequencies[0], 0.0);
        assert!((spectrum.frequencies[100] - 50.0).abs() < 1e-12);
    }

    #[test]
    fn test_welch_peak_at_signal_frequency() {
        let spectrum = welch_psd(&sine(10.0, 100.0, 400), 100.0, 100);
        let (peak_index, _) = spectrum
            .density
            .iter()
            .enumerate()
            .fold((0, 0.0), |best, (i, &p)| if p > best.1 { (i, p) } else { best });
        assert!((spectrum.frequencies[peak_index] - 10.0).abs() < 1e-9);
    }

    #[test]
    fn test_cutoff_of_slow_sine() {
        // 2 Hz over exactly 4 periods: Hann leakage reaches the neighbouring 2.5 Hz bin
        let cutoff = estimate_cutoff_frequency(&sine(2.0, 100.0, 200), 100.0);
        assert!((cutoff - 2.5).abs() < 1e-9, "cutoff was {}", cutoff);
    }

    #[test]
    fn test_cutoff_of_alternating_signal_is_nyquist() {
        let alternating: Vec<f64> = (0..40).map(|i| if i % 2 == 0 { 1.0 } else { -1.0 }).collect();
        let cutoff = estimate_cutoff_frequency(&alternating, 200.0);
        assert!((cutoff - 100.0).abs() < 1e-9);
    }

    #[test]
    fn test_cutoff_degenerate_signals() {
        assert_eq!(estimate_cutoff_frequency(&[], 100.0), 0.0);
        assert_eq!(estimate_cutoff_frequency(&[3.0; 64], 100.0), 0.0);
    }

    #[test]
    fn test_matrix_cutoff_floor() {
        let constant = Array2::from_elem((3, 50), 1.5);
        assert_eq!(estimate_matrix_cutoff(constant.view(), 100.0), MIN_CUTOFF_FREQUENCY_HZ);
    }

    #[test]
    fn test_matrix_cutoff_takes_maximum_row() {
        let slow = sine(2.0, 100.0, 200);
        let fast = sine(20.0, 100.0, 200);
        let matrix = Array2::from_shape_fn((2, 200), |(r, c)| if r == 0 { slow[c] } else { fast[c] });
        let cutoff = estimate_matrix_cutoff(matrix.view(), 100.0);
        assert!(cutoff >= 20.0 && cutoff <= 21.0, "cutoff was {}", cutoff);
    }
}
