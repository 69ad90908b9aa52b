// src/processing/filters/iir.rs
//! IIR (Infinite Impulse Response) digital filters

use super::IirCoefficients;
use crate::config::constants::signal::{MAX_FILTER_ORDER, MIN_FILTER_ORDER};
use crate::error::{PostErrorBuilder, PostResult, Stage};
use nalgebra::{DMatrix, DVector};
use rustfft::num_complex::Complex;
use std::f64::consts::PI;

/// IIR filter in transposed direct form II
pub struct IirFilter {
    coefficients: IirCoefficients,
    state: Vec<f64>,
}

impl IirFilter {
    /// Create filter from coefficients with a zeroed state
    pub fn new(coefficients: IirCoefficients) -> Self {
        let order = coefficients.order();
        Self {
            coefficients,
            state: vec![0.0; order],
        }
    }

    /// Create filter whose delay line starts at `initial_state`
    pub fn with_state(coefficients: IirCoefficients, initial_state: Vec<f64>) -> Self {
        let mut filter = Self::new(coefficients);
        for (slot, value) in filter.state.iter_mut().zip(initial_state) {
            *slot = value;
        }
        filter
    }

    /// Process single sample
    pub fn process_sample(&mut self, input: f64) -> f64 {
        let b = &self.coefficients.b;
        let a = &self.coefficients.a;
        let order = self.state.len();
        if order == 0 {
            return b[0] * input;
        }

        let output = b[0] * input + self.state[0];
        for i in 0..order - 1 {
            self.state[i] = coefficient(b, i + 1) * input + self.state[i + 1] - coefficient(a, i + 1) * output;
        }
        self.state[order - 1] = coefficient(b, order) * input - coefficient(a, order) * output;

        output
    }

    /// Filter a whole signal, carrying the state across samples
    pub fn process(&mut self, input: &[f64]) -> Vec<f64> {
        input.iter().map(|&x| self.process_sample(x)).collect()
    }
}

fn coefficient(values: &[f64], index: usize) -> f64 {
    values.get(index).copied().unwrap_or(0.0)
}

/// Design a digital Butterworth lowpass
///
/// The analog prototype's poles are prewarped and mapped through the bilinear
/// transform; all zeros sit at z = -1 and the numerator is scaled for unity
/// gain at DC.
pub fn butterworth_lowpass(order: usize, cutoff_hz: f64, sample_rate_hz: f64) -> PostResult<IirCoefficients> {
    if !(MIN_FILTER_ORDER..=MAX_FILTER_ORDER).contains(&order) {
        return Err(PostErrorBuilder::new("butterworth").processing(
            Stage::Cleanup,
            &format!("order must be {}-{}", MIN_FILTER_ORDER, MAX_FILTER_ORDER),
        ));
    }
    let nyquist = sample_rate_hz / 2.0;
    if cutoff_hz <= 0.0 || cutoff_hz >= nyquist {
        return Err(PostErrorBuilder::new("butterworth").processing(
            Stage::Cleanup,
            &format!("cutoff {} Hz must lie in (0, {}) Hz", cutoff_hz, nyquist),
        ));
    }

    // Pre-warp frequency for bilinear transform (normalized sample rate of 2)
    let normalized_cutoff = cutoff_hz / nyquist;
    let warped = 4.0 * (PI * normalized_cutoff / 2.0).tan();

    let digital_poles: Vec<Complex<f64>> = (0..order)
        .map(|k| {
            let m = 2.0 * k as f64 + 1.0 - order as f64;
            let analog = -Complex::from_polar(1.0, PI * m / (2.0 * order as f64)) * warped;
            (Complex::new(4.0, 0.0) + analog) / (Complex::new(4.0, 0.0) - analog)
        })
        .collect();

    let a: Vec<f64> = polynomial_from_roots(&digital_poles).iter().map(|c| c.re).collect();

    let gain = a.iter().sum::<f64>() / 2f64.powi(order as i32);
    let b = binomial_row(order).into_iter().map(|c| c * gain).collect();

    Ok(IirCoefficients { b, a })
}

/// Steady-state initial conditions for a unit step input
///
/// Solves `(I - Aᵀ) zi = b[1..] - a[1..] * b[0]` where `A` is the companion
/// matrix of the denominator.
pub fn lfilter_zi(coefficients: &IirCoefficients) -> PostResult<Vec<f64>> {
    let order = coefficients.order();
    if order == 0 {
        return Ok(Vec::new());
    }
    let a = &coefficients.a;
    let b = &coefficients.b;

    // I - Aᵀ: column 0 carries a[1..], the superdiagonal carries the negated shifted identity
    let system = DMatrix::from_fn(order, order, |row, col| {
        let mut value = if row == col { 1.0 } else { 0.0 };
        if col == 0 {
            value += coefficient(a, row + 1);
        }
        if col == row + 1 {
            value -= 1.0;
        }
        value
    });
    let rhs = DVector::from_iterator(order, (1..=order).map(|i| coefficient(b, i) - coefficient(a, i) * b[0]));

    let zi = system
        .lu()
        .solve(&rhs)
        .ok_or_else(|| PostErrorBuilder::new("lfilter_zi").processing(Stage::Cleanup, "singular filter state system"))?;
    Ok(zi.iter().copied().collect())
}

fn polynomial_from_roots(roots: &[Complex<f64>]) -> Vec<Complex<f64>> {
    let mut coefficients = vec![Complex::new(1.0, 0.0)];
    for root in roots {
        let mut next = coefficients.clone();
        next.push(Complex::new(0.0, 0.0));
        for i in 1..next.len() {
            next[i] -= root * coefficients[i - 1];
        }
        coefficients = next;
    }
    coefficients
}

fn binomial_row(n: usize) -> Vec<f64> {
    let mut row = vec![1.0];
    for k in 0..n {
        let next = row[k] * (n - k) as f64 / (k + 1) as f64;
        row.push(next);
    }
    row
}
