// src/processing/resampling.rs
//! Sample-rate conversion for categorical series and dense matrices

use crate::config::constants::signal::{RESAMPLE_HALF_LEN_FACTOR, RESAMPLE_KAISER_BETA};
use crate::error::{PostErrorBuilder, PostResult, Stage};
use crate::processing::windowing::{generate_window, WindowType};
use ndarray::{Array2, ArrayView2};
use std::f64::consts::PI;

/// Nearest-neighbor resampling for flags and other categorical series
///
/// Output sample `i` takes the input sample at `round(i * old_rate / new_rate)`,
/// clamped into the input. Ties round to even. No values are synthesized, so
/// every output element is a copy of some input element.
pub fn resample_discrete<T: Clone>(signal: &[T], old_rate: f64, new_rate: f64) -> Vec<T> {
    if signal.is_empty() || old_rate <= 0.0 || new_rate <= 0.0 {
        return Vec::new();
    }
    let output_len = (signal.len() as f64 * new_rate / old_rate).ceil() as usize;
    resample_discrete_to_length(signal, old_rate, new_rate, output_len)
}

/// Nearest-neighbor resampling that produces exactly `output_len` samples
///
/// Used when the frame count is dictated by a dense matrix resampled alongside
/// the series, so floating-point rounding in the length cannot desynchronize them.
pub fn resample_discrete_to_length<T: Clone>(signal: &[T], old_rate: f64, new_rate: f64, output_len: usize) -> Vec<T> {
    if signal.is_empty() || old_rate <= 0.0 || new_rate <= 0.0 {
        return Vec::new();
    }

    let ratio = old_rate / new_rate;
    let last = signal.len() - 1;

    (0..output_len)
        .map(|i| {
            let source = (i as f64 * ratio).round_ties_even();
            let index = if source <= 0.0 { 0 } else { (source as usize).min(last) };
            signal[index].clone()
        })
        .collect()
}

/// Polyphase rational resampling of every row of `matrix` by `up / down`
///
/// The anti-aliasing filter is a Kaiser-windowed sinc whose half length is ten
/// times the larger (reduced) rate factor. Edges are zero padded. The output has
/// `ceil(ncols * up / down)` columns and the same number of rows.
pub fn resample_poly(matrix: ArrayView2<f64>, up: usize, down: usize) -> PostResult<Array2<f64>> {
    if up == 0 || down == 0 {
        return Err(PostErrorBuilder::new("resample_poly").processing(Stage::Resample, "rate factors must be positive"));
    }

    let g = gcd(up, down);
    let (up, down) = (up / g, down / g);
    if up == down {
        return Ok(matrix.to_owned());
    }

    let (rows, n_in) = matrix.dim();
    if n_in == 0 {
        return Ok(Array2::zeros((rows, 0)));
    }

    let n_out = (n_in * up).div_ceil(down);
    let (taps, n_pre_remove) = polyphase_taps(up, down, n_in, n_out);

    let mut output = Array2::zeros((rows, n_out));
    for (j, out_col) in (n_pre_remove..n_pre_remove + n_out).enumerate() {
        let t = out_col * down;
        // Input samples i whose upsampled position up*i is within reach of tap t - up*i
        let i_hi = (t / up).min(n_in - 1);
        let i_lo = if t + 1 > taps.len() {
            (t + 1 - taps.len()).div_ceil(up)
        } else {
            0
        };
        if i_lo > i_hi {
            continue;
        }
        for row in 0..rows {
            let mut acc = 0.0;
            for i in i_lo..=i_hi {
                acc += taps[t - up * i] * matrix[[row, i]];
            }
            output[[row, j]] = acc;
        }
    }

    Ok(output)
}

/// Resample a matrix captured at `old_rate_hz` so it is sampled at `new_rate_hz`
pub fn resample_to_rate(matrix: ArrayView2<f64>, old_rate_hz: u32, new_rate_hz: u32) -> PostResult<Array2<f64>> {
    resample_poly(matrix, new_rate_hz as usize, old_rate_hz as usize)
}

/// Build the padded anti-aliasing filter and the number of leading outputs to discard
fn polyphase_taps(up: usize, down: usize, n_in: usize, n_out: usize) -> (Vec<f64>, usize) {
    let max_rate = up.max(down);
    let half_len = RESAMPLE_HALF_LEN_FACTOR * max_rate;
    let mut design = lowpass_fir(2 * half_len + 1, 1.0 / max_rate as f64);
    for tap in &mut design {
        *tap *= up as f64;
    }

    let n_pre_pad = down - half_len % down;
    let n_pre_remove = (half_len + n_pre_pad) / down;
    let mut n_post_pad = 0;
    while upfirdn_output_len(design.len() + n_pre_pad + n_post_pad, n_in, up, down) < n_out + n_pre_remove {
        n_post_pad += 1;
    }

    let mut taps = vec![0.0; n_pre_pad];
    taps.extend(design);
    taps.extend(std::iter::repeat(0.0).take(n_post_pad));
    (taps, n_pre_remove)
}

fn upfirdn_output_len(filter_len: usize, n_in: usize, up: usize, down: usize) -> usize {
    ((n_in - 1) * up + filter_len - 1) / down + 1
}

/// Windowed-sinc lowpass with unity DC gain; `cutoff` is a fraction of Nyquist
fn lowpass_fir(num_taps: usize, cutoff: f64) -> Vec<f64> {
    let alpha = 0.5 * (num_taps - 1) as f64;
    let window = generate_window(WindowType::Kaiser(RESAMPLE_KAISER_BETA), num_taps);

    let mut taps: Vec<f64> = window
        .iter()
        .enumerate()
        .map(|(i, w)| cutoff * sinc(cutoff * (i as f64 - alpha)) * w)
        .collect();

    let dc_gain: f64 = taps.iter().sum();
    for tap in &mut taps {
        *tap /= dc_gain;
    }
    taps
}

fn sinc(x: f64) -> f64 {
    if x == 0.0 {
        1.0
    } else {
        (PI * x).sin() / (PI * x)
    }
}

fn gcd(a: usize, b: usize) -> usize {
    if b == 0 {
        a
    } else {
        gcd(b, a % b)
    }
}
