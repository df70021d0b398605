//! # Closest point search
//!
//! Locates the waypoint the bike is currently tracking within the local
//! trajectory window.

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External
use log::trace;
use nalgebra::Vector2;

// Internal
use super::TrajCtrlError;
use crate::traj::LocalTrajectory;

// ---------------------------------------------------------------------------
// FUNCTIONS
// ---------------------------------------------------------------------------

/// Find the closest waypoint to `position_m`, searching forward from index 1.
///
/// The index advances while the next waypoint is at least as close as the
/// current one, so ties move forward. The search never looks behind index 1
/// and stops at `N - 2`, so the returned index always has a successor.
pub fn find_closest_point(traj: &LocalTrajectory, position_m: &Vector2<f64>) -> usize {
    let last_idx = traj.num_points() - 2;
    let mut idx = 1;

    while idx < last_idx
        && (traj.point(idx) - position_m).norm_squared()
            >= (traj.point(idx + 1) - position_m).norm_squared()
    {
        idx += 1;
    }

    idx
}

/// Select which waypoint's heading to track given the closest point `idx`.
///
/// The distance from the preceding waypoint to the bike is projected onto the
/// heading at `idx`. If the projection is at least as long as the segment
/// `idx - 1 -> idx` the bike has already passed `idx` and `idx + 1` is
/// returned, otherwise `idx`.
pub fn select_heading_index(
    traj: &LocalTrajectory,
    position_m: &Vector2<f64>,
    idx: usize
) -> Result<usize, TrajCtrlError> {
    let prev = traj.point(idx - 1);
    let diff = prev - position_m;

    if diff[0] == 0.0 && diff[1] == 0.0 {
        return Err(TrajCtrlError::DegenerateGeometry { idx: idx - 1 })
    }

    let dist_prev_m = diff.norm();

    // Not atan2, the angle of the line is only defined modulo pi. A vertical
    // line gives +/- pi/2.
    let alpha_star_rad = (diff[1] / diff[0]).atan();

    let projected_dist_m = (dist_prev_m * (alpha_star_rad - traj.heading(idx)).cos()).abs();
    let segment_len_m = (traj.point(idx) - prev).norm();

    trace!(
        "Projected distance past waypoint {}: {:.6} m (segment {:.6} m)",
        idx - 1, projected_dist_m, segment_len_m
    );

    if projected_dist_m >= segment_len_m {
        Ok(idx + 1)
    }
    else {
        Ok(idx)
    }
}
