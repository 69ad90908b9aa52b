// src/processing/windowing.rs
//! Window functions for spectral estimation and FIR design

use std::f64::consts::PI;

/// Window function types
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum WindowType {
    /// Periodic Hann, the variant used for spectral estimation
    Hann,
    /// Symmetric Kaiser with the given beta, used for filter design
    Kaiser(f64),
}

/// Generate `size` samples of the given window
pub fn generate_window(window_type: WindowType, size: usize) -> Vec<f64> {
    if size == 0 {
        return Vec::new();
    }
    if size == 1 {
        return vec![1.0];
    }

    match window_type {
        WindowType::Hann => (0..size)
            .map(|i| 0.5 - 0.5 * (2.0 * PI * i as f64 / size as f64).cos())
            .collect(),
        WindowType::Kaiser(beta) => {
            let i0_beta = modified_bessel_i0(beta);
            (0..size)
                .map(|i| {
                    let n = 2.0 * i as f64 / (size - 1) as f64 - 1.0;
                    let arg = beta * (1.0 - n * n).max(0.0).sqrt();
                    modified_bessel_i0(arg) / i0_beta
                })
                .collect()
        }
    }
}

// Approximation of modified Bessel function I0 (Abramowitz & Stegun 9.8.1/9.8.2)
fn modified_bessel_i0(x: f64) -> f64 {
    let ax = x.abs();
    if ax < 3.75 {
        let y = (x / 3.75).powi(2);
        1.0 + y * (3.5156229 + y * (3.0899424 + y * (1.2067492
            + y * (0.2659732 + y * (0.0360768 + y * 0.0045813)))))
    } else {
        let y = 3.75 / ax;
        (ax.exp() / ax.sqrt()) * (0.39894228 + y * (0.01328592
            + y * (0.00225319 + y * (-0.00157565 + y * (0.00916281
            + y * (-0.02057706 + y * (0.02635537 + y * (-0.01647633
            + y * 0.00392377))))))))
    }
}
