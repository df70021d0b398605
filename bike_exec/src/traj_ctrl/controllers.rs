//! # Trajectory controllers module
//!
//! This module provides the control law used by TrajCtrl: the error
//! calculations, the heading rate feedforward filter, and the conversion of
//! the resulting steer demand into a roll reference.

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External
use std::f64::consts::{PI, TAU};
use log::debug;
use nalgebra::Vector2;
use serde::Serialize;

// Internal
use super::{BikeParams, FilterCoeffs, TrajGains, GRAVITY_MSS, MAX_STEER_DEM_RAD};
use util::maths::{clamp, floor_mod, sign, wrap_angle};

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// First order discrete filter from the heading reference rate to the
/// feedforward steer demand.
///
/// The coefficients are passed in on every step, only the state is kept.
#[derive(Debug, Serialize, Clone, Copy, Default, PartialEq)]
pub struct HeadingRateFilter {
    x: f64
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl HeadingRateFilter {

    /// Create a new filter with zero state.
    pub fn new() -> Self {
        Self::default()
    }

    /// Step the filter with input `u`, returning the output.
    ///
    /// The output is computed from the state before the update.
    pub fn step(&mut self, coeffs: &FilterCoeffs, u: f64) -> f64 {
        let x_next = coeffs.ad * self.x + coeffs.bd * u;
        let y = coeffs.c * self.x + coeffs.d * u;

        self.x = x_next;

        y
    }

    /// Current filter state.
    pub fn state(&self) -> f64 {
        self.x
    }

    /// Reset the state to zero.
    pub fn reset(&mut self) {
        self.x = 0.0;
    }
}

// ---------------------------------------------------------------------------
// FUNCTIONS
// ---------------------------------------------------------------------------

/// Calculate the lateral error of `position_m` from the line through
/// `ref_point_m` with heading `ref_heading_rad`.
///
/// Positive if the bike is to the left of the line (right hand rule about Z).
pub fn calc_lat_error(
    position_m: &Vector2<f64>,
    ref_point_m: &Vector2<f64>,
    ref_heading_rad: f64
) -> f64 {
    let dx = position_m[0] - ref_point_m[0];
    let dy = position_m[1] - ref_point_m[1];

    dy * ref_heading_rad.cos() - dx * ref_heading_rad.sin()
}

/// Calculate the heading error, wrapped to `(-pi, pi]`.
pub fn calc_head_error(heading_rad: f64, ref_heading_rad: f64) -> f64 {
    wrap_angle(heading_rad - ref_heading_rad)
}

/// Limit the change in heading reference between two waypoints to
/// `[-pi, pi]`.
pub fn limit_heading_change(d_psi_ref_rad: f64) -> f64 {
    let mut d = d_psi_ref_rad;

    if d >= PI {
        d = floor_mod(d, -TAU);
    }
    if d <= -PI {
        d = floor_mod(d, TAU);
    }

    d
}

/// Steer demand from the lateral and heading errors.
///
/// The lateral error is saturated at `e1_max_m` before the gain is applied.
pub fn steer_from_errors(gains: &TrajGains, lat_error_m: f64, head_error_rad: f64) -> f64 {
    -gains.k1 * sign(lat_error_m) * lat_error_m.abs().min(gains.e1_max_m)
        - gains.k2 * head_error_rad
}

/// Limit the steer demand to `[-pi/4, pi/4]`.
pub fn saturate_steer(delta_ref_rad: f64) -> f64 {
    let limited = clamp(delta_ref_rad, -MAX_STEER_DEM_RAD, MAX_STEER_DEM_RAD);

    if limited != delta_ref_rad {
        debug!("Steer demand {:.4} rad limited to {:.4} rad", delta_ref_rad, limited);
    }

    limited
}

/// Convert a steer demand into the roll angle which gives the same lateral
/// acceleration at `speed_ms`.
pub fn steer_to_roll(bike: &BikeParams, delta_ref_rad: f64, speed_ms: f64) -> f64 {
    let eff_delta_ref_rad = delta_ref_rad * bike.lambda_rad.sin();

    -(eff_delta_ref_rad.tan() * (speed_ms * speed_ms / (bike.lr_m + bike.lf_m)) / GRAVITY_MSS)
        .atan()
}
