// src/record/force_plate.rs
//! Force plate signals, shared by every pass of a trial

use crate::error::{PostErrorBuilder, PostResult};
use ndarray::Array2;
use serde::{Deserialize, Serialize};

/// Rows in a force plate resampling matrix: CoP, force, moment
pub const FORCE_PLATE_MATRIX_ROWS: usize = 9;

/// Per-frame ground reaction data from one plate
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ForcePlate {
    pub forces: Vec<[f64; 3]>,
    pub moments: Vec<[f64; 3]>,
    pub centers_of_pressure: Vec<[f64; 3]>,
    pub ground_heights: Vec<f64>,
}

impl ForcePlate {
    pub fn num_frames(&self) -> usize {
        self.forces.len()
    }

    /// Stack CoP, force and moment into a `(9, frames)` matrix
    pub fn resampling_matrix(&self) -> Array2<f64> {
        let frames = self.num_frames();
        let mut matrix = Array2::zeros((FORCE_PLATE_MATRIX_ROWS, frames));
        for t in 0..frames {
            let columns = [self.centers_of_pressure[t], self.forces[t], self.moments[t]];
            for (block, vector) in columns.iter().enumerate() {
                for axis in 0..3 {
                    matrix[[block * 3 + axis, t]] = vector[axis];
                }
            }
        }
        matrix
    }

    /// Regenerate every per-frame series from a resampling matrix and ground heights
    pub fn set_resampling_matrix(&mut self, matrix: &Array2<f64>, ground_heights: Vec<f64>) -> PostResult<()> {
        if matrix.nrows() != FORCE_PLATE_MATRIX_ROWS {
            return Err(PostErrorBuilder::new("force plate").invalid_data(&format!(
                "resampling matrix must have {} rows, got {}",
                FORCE_PLATE_MATRIX_ROWS,
                matrix.nrows()
            )));
        }

        let column = |block: usize, t: usize| -> [f64; 3] {
            [matrix[[block * 3, t]], matrix[[block * 3 + 1, t]], matrix[[block * 3 + 2, t]]]
        };
        let frames = matrix.ncols();
        self.centers_of_pressure = (0..frames).map(|t| column(0, t)).collect();
        self.forces = (0..frames).map(|t| column(1, t)).collect();
        self.moments = (0..frames).map(|t| column(2, t)).collect();
        self.ground_heights = ground_heights;
        Ok(())
    }

    /// Check that every series covers the same frames
    pub fn validate_shapes(&self) -> PostResult<()> {
        let frames = self.num_frames();
        if self.moments.len() != frames || self.centers_of_pressure.len() != frames {
            return Err(PostErrorBuilder::new("force plate").invalid_data(&format!(
                "series lengths differ: forces {}, moments {}, CoPs {}",
                frames,
                self.moments.len(),
                self.centers_of_pressure.len()
            )));
        }
        Ok(())
    }
}
