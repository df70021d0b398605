//! # Local trajectory window
//!
//! The trajectory controller operates on a short window of the reference
//! trajectory around the bike's current position. The window is supplied by
//! the caller each cycle as three equal length sequences of X positions,
//! Y positions and heading references, and is borrowed by the controller for
//! the duration of the cycle only.
//!
//! Index 0 of the window is always treated as the "previous" point, the
//! closest point search starts at index 1.

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External
use nalgebra::Vector2;

// Internal
use crate::traj_ctrl::{TrajCtrlError, MIN_WINDOW_LEN};

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// A borrowed window of the reference trajectory.
#[derive(Debug, Copy, Clone)]
pub struct LocalTrajectory<'a> {
    x_m: &'a [f64],
    y_m: &'a [f64],
    psi_rad: &'a [f64]
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl<'a> LocalTrajectory<'a> {

    /// Build a window from a packed buffer laid out as
    /// `[X_0..X_{N-1}, Y_0..Y_{N-1}, Psi_0..Psi_{N-1}]`.
    ///
    /// The number of points must be given explicitly and must match the
    /// buffer length.
    pub fn from_buffer(
        buffer: &'a [f64], num_points: usize
    ) -> Result<Self, TrajCtrlError> {
        if buffer.len() % 3 != 0 || buffer.len() / 3 != num_points {
            return Err(TrajCtrlError::BufferLengthMismatch {
                expected: num_points.saturating_mul(3),
                found: buffer.len()
            })
        }

        let (x_m, rest) = buffer.split_at(num_points);
        let (y_m, psi_rad) = rest.split_at(num_points);

        Self::from_slices(x_m, y_m, psi_rad)
    }

    /// Build a window from separate X, Y and heading sequences.
    pub fn from_slices(
        x_m: &'a [f64], y_m: &'a [f64], psi_rad: &'a [f64]
    ) -> Result<Self, TrajCtrlError> {
        if y_m.len() != x_m.len() || psi_rad.len() != x_m.len() {
            return Err(TrajCtrlError::BufferLengthMismatch {
                expected: 3 * x_m.len(),
                found: x_m.len() + y_m.len() + psi_rad.len()
            })
        }

        if x_m.len() < MIN_WINDOW_LEN {
            return Err(TrajCtrlError::InvalidWindow(x_m.len()))
        }

        Ok(Self { x_m, y_m, psi_rad })
    }

    /// Number of waypoints in the window.
    pub fn num_points(&self) -> usize {
        self.x_m.len()
    }

    /// Position of the waypoint at `index`.
    ///
    /// # Panics
    /// - If `index` is not less than `num_points()`.
    pub fn point(&self, index: usize) -> Vector2<f64> {
        Vector2::new(self.x_m[index], self.y_m[index])
    }

    /// Heading reference of the waypoint at `index`.
    ///
    /// # Panics
    /// - If `index` is not less than `num_points()`.
    pub fn heading(&self, index: usize) -> f64 {
        self.psi_rad[index]
    }

    /// Pack the window back into the `[X.., Y.., Psi..]` buffer layout.
    pub fn to_buffer(&self) -> Vec<f64> {
        let mut buffer = Vec::with_capacity(3 * self.num_points());
        buffer.extend_from_slice(self.x_m);
        buffer.extend_from_slice(self.y_m);
        buffer.extend_from_slice(self.psi_rad);
        buffer
    }
}
