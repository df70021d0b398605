//! Localisation types

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External
use nalgebra::Vector2;
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// Estimated pose of the bike in the trajectory frame.
#[derive(Debug, Copy, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Pose {
    /// Position of the bike
    ///
    /// Units: meters
    pub position_m: Vector2<f64>,

    /// Heading of the bike, not wrapped to any particular range.
    ///
    /// Units: radians
    pub heading_rad: f64
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl Pose {
    /// Create a new pose from the position and heading.
    pub fn new(x_m: f64, y_m: f64, heading_rad: f64) -> Self {
        Self {
            position_m: Vector2::new(x_m, y_m),
            heading_rad
        }
    }

    /// Get the unit vector pointing in the direction of the bike's heading.
    pub fn forward2(&self) -> Vector2<f64> {
        Vector2::new(self.heading_rad.cos(), self.heading_rad.sin())
    }
}
