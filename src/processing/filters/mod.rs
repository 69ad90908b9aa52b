// src/processing/filters/mod.rs
//! Digital filters for kinematic signal smoothing

pub mod iir;
pub mod zero_phase;

pub use iir::*;
pub use zero_phase::*;

/// Filter coefficients for IIR filters, normalized so that `a[0] == 1`
#[derive(Debug, Clone, PartialEq)]
pub struct IirCoefficients {
    pub b: Vec<f64>, // Numerator coefficients
    pub a: Vec<f64>, // Denominator coefficients
}

impl IirCoefficients {
    /// Filter order
    pub fn order(&self) -> usize {
        self.a.len().max(self.b.len()) - 1
    }

    /// Gain at 0 Hz
    pub fn dc_gain(&self) -> f64 {
        self.b.iter().sum::<f64>() / self.a.iter().sum::<f64>()
    }
}
