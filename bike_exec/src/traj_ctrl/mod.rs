//! # Trajectory control module
//!
//! Trajectory control is responsible for keeping the bike on the reference
//! trajectory. Unlike a rover which can be commanded to steer directly, a
//! self-balancing bike is steered by leaning it, so the output of this
//! module is a roll angle reference which the balance controller tracks.
//!
//! Each cycle the controller:
//!
//!  1. Searches the local trajectory window forward from index 1 for the
//!     closest waypoint.
//!  1. Decides whether the bike has already passed that waypoint, in which
//!     case the heading of the next waypoint is tracked instead.
//!  1. Computes the lateral (cross-track) error and the wrapped heading
//!     error against the tracked waypoint.
//!  1. Feeds the rate of change of the heading reference through a first
//!     order discrete filter to get a feedforward steering demand.
//!  1. Adds a saturated proportional correction on the errors, limits the
//!     total steer demand to +/- pi/4, and converts it to a roll reference
//!     using the bicycle model.
//!
//! The only state carried between cycles is the filter state, owned by the
//! `TrajCtrl` instance.

// ---------------------------------------------------------------------------
// MODULES
// ---------------------------------------------------------------------------

pub mod controllers;
pub mod params;
pub mod search;
pub mod state;

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// Internal
pub use controllers::*;
pub use params::*;
pub use search::*;
pub use state::*;
use util::params::LoadError;

// ---------------------------------------------------------------------------
// CONSTANTS
// ---------------------------------------------------------------------------

/// Minimum number of waypoints in a local trajectory window.
pub const MIN_WINDOW_LEN: usize = 4;

/// Gravitational acceleration used in the steer to roll transform.
///
/// Units: meters/second^2
pub const GRAVITY_MSS: f64 = 9.81;

/// Limit on the magnitude of the steer angle demand.
///
/// Units: radians
pub const MAX_STEER_DEM_RAD: f64 = std::f64::consts::FRAC_PI_4;

// ---------------------------------------------------------------------------
// ENUMERATIONS
// ---------------------------------------------------------------------------

/// Potential errors that can occur during processing of the module.
///
/// All of these are caused by the inputs of the cycle. None of them leave the
/// controller in a modified state, the caller should correct the inputs for
/// the next cycle.
#[derive(Debug, thiserror::Error)]
pub enum TrajCtrlError {
    #[error("Could not load parameters: {0}")]
    ParamLoadError(LoadError),

    /// The local trajectory window has fewer than `MIN_WINDOW_LEN` points.
    #[error("Local trajectory window must contain at least 4 points, found {0}")]
    InvalidWindow(usize),

    /// The packed trajectory buffer doesn't match the declared number of
    /// points.
    #[error("Expected a trajectory buffer of length {expected}, found {found}")]
    BufferLengthMismatch {
        expected: usize,
        found: usize
    },

    /// The velocity is zero, negative, infinite or NaN.
    #[error("Velocity must be positive and finite, found {0} m/s")]
    NonPositiveVelocity(f64),

    /// The waypoint before the closest point coincides with the bike's
    /// position, so the direction from it to the bike is undefined.
    #[error("The waypoint before the closest point ({idx}) coincides with the bike position")]
    DegenerateGeometry {
        idx: usize
    },

    /// The segment from the closest point to the next waypoint has zero
    /// length, so the heading reference rate is undefined.
    #[error("The trajectory segment starting at waypoint {idx} has zero length")]
    DegenerateSegment {
        idx: usize
    },

    /// The heading reference rate is not finite, e.g. because of a NaN
    /// heading in the window.
    #[error("Heading reference rate at waypoint {idx} is not finite ({value} rad/s)")]
    NonFiniteHeadingRate {
        idx: usize,
        value: f64
    }
}
