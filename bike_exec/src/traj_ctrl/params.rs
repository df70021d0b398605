//! Trajectory control parameters

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// Parameters for trajectory control, as loaded from `traj_ctrl.toml`.
#[derive(Deserialize, Debug, Clone, Copy)]
pub struct Params {
    /// Geometry of the bike
    pub bike: BikeParams,

    /// Error controller gains
    pub gains: TrajGains,

    /// Heading rate feedforward filter
    pub filter: FilterCoeffs
}

/// Bike geometry used by the steer to roll transform.
#[derive(Deserialize, Serialize, Debug, Clone, Copy, PartialEq)]
pub struct BikeParams {
    /// Distance from the rear axle to the centre of mass
    ///
    /// Units: meters
    pub lr_m: f64,

    /// Distance from the front axle to the centre of mass
    ///
    /// Units: meters
    pub lf_m: f64,

    /// Steering axis angle, couples the handlebar angle to the effective
    /// steer angle at the ground.
    ///
    /// Units: radians
    pub lambda_rad: f64
}

/// Gains on the lateral and heading errors.
#[derive(Deserialize, Serialize, Debug, Clone, Copy, PartialEq)]
pub struct TrajGains {
    /// Proportional gain on the saturated lateral error
    pub k1: f64,

    /// Proportional gain on the heading error
    pub k2: f64,

    /// Saturation limit on the magnitude of the lateral error
    ///
    /// Units: meters
    pub e1_max_m: f64
}

/// State space coefficients of the first order discrete filter shaping the
/// heading reference rate into a steer demand.
///
/// ```text
/// x[k+1] = ad * x[k] + bd * u[k]
/// y[k]   = c  * x[k] + d  * u[k]
/// ```
#[derive(Deserialize, Serialize, Debug, Clone, Copy, PartialEq)]
pub struct FilterCoeffs {
    pub ad: f64,
    pub bd: f64,
    pub c: f64,
    pub d: f64
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl Params {
    /// Load the parameters from a file relative to the params directory.
    pub fn load(params_path: &str) -> Result<Self, super::TrajCtrlError> {
        util::params::load(params_path).map_err(super::TrajCtrlError::ParamLoadError)
    }
}

impl FilterCoeffs {
    /// A filter whose output is its input.
    pub fn passthrough() -> Self {
        Self {
            ad: 0.0,
            bd: 0.0,
            c: 0.0,
            d: 1.0
        }
    }
}
