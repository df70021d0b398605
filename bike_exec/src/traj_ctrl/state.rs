//! Trajectory control module state

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External
use log::trace;
use serde::Serialize;

// Internal
use super::*;
use crate::{loc::Pose, traj::LocalTrajectory};

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// Trajectory controller.
///
/// Holds the heading rate filter state between cycles. Each instance is
/// independent, so several controllers may run side by side (e.g. in
/// simulation), but a single instance must be processed sequentially.
#[derive(Debug, Default, Clone)]
pub struct TrajCtrl {
    /// Feedforward filter, the only state carried between cycles
    filter: HeadingRateFilter
}

/// Input data for one trajectory control cycle.
///
/// All parameters are supplied fresh each cycle so that the caller may
/// schedule them online.
#[derive(Debug, Clone, Copy)]
pub struct InputData<'a> {
    /// Local trajectory window
    pub traj: LocalTrajectory<'a>,

    /// Estimated pose of the bike
    pub pose: Pose,

    /// Forward speed of the bike
    ///
    /// Units: meters/second
    pub speed_ms: f64,

    pub bike: BikeParams,
    pub gains: TrajGains,
    pub filter: FilterCoeffs
}

/// Output of one trajectory control cycle.
#[derive(Debug, Clone, Copy, Default, Serialize, PartialEq)]
pub struct OutputData {
    /// Roll reference for the balance controller
    ///
    /// Units: radians
    pub roll_ref_rad: f64,

    /// Index within the supplied window of the point before the closest
    /// point, used by the caller to re-window the trajectory next cycle.
    pub closest_point_idx_out: usize
}

/// The status report containing the intermediate quantities of the cycle.
#[derive(Debug, Clone, Copy, Default, Serialize, PartialEq)]
pub struct StatusReport {
    /// Closest point found by the search
    pub closest_point_idx: usize,

    /// Point whose heading was tracked
    pub heading_idx: usize,

    /// The tracked reference point and heading
    pub ref_x_m: f64,
    pub ref_y_m: f64,
    pub ref_psi_rad: f64,

    /// Lateral error to the tracked point (e1)
    pub lat_error_m: f64,

    /// Heading error to the tracked point (e2)
    pub head_error_rad: f64,

    /// Change in heading reference between the closest point and the next
    pub d_psi_ref_rad: f64,

    /// Heading reference rate fed to the filter
    pub dpsi_ref_rads: f64,

    /// Filter state after this cycle
    pub filter_state: f64,

    /// Feedforward steer demand from the filter
    pub delta_ref_psi_rad: f64,

    /// Steer demand from the lateral and heading errors
    pub delta_ref_error_rad: f64,

    /// Total steer demand after the limit
    pub delta_ref_rad: f64,

    /// If true the lateral error was above `e1_max_m`
    pub lat_error_saturated: bool,

    /// If true the total steer demand was limited
    pub steer_saturated: bool,

    /// Output roll reference
    pub roll_ref_rad: f64
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl TrajCtrl {

    /// Create a new controller with zero filter state.
    pub fn new() -> Self {
        Self::default()
    }

    /// Process one trajectory control cycle.
    ///
    /// All inputs are validated before the filter is stepped, so an error
    /// leaves the controller exactly as it was.
    pub fn proc(
        &mut self,
        input: &InputData
    ) -> Result<(OutputData, StatusReport), TrajCtrlError> {

        let traj = &input.traj;
        let pos = &input.pose.position_m;
        let mut report = StatusReport::default();

        // ---- VALIDATION ----

        if traj.num_points() < MIN_WINDOW_LEN {
            return Err(TrajCtrlError::InvalidWindow(traj.num_points()))
        }

        // Written so that NaN is rejected too
        if !(input.speed_ms > 0.0 && input.speed_ms.is_finite()) {
            return Err(TrajCtrlError::NonPositiveVelocity(input.speed_ms))
        }

        // ---- TARGET SELECTION ----

        let idx = find_closest_point(traj, pos);
        let heading_idx = select_heading_index(traj, pos, idx)?;

        let ref_point_m = traj.point(idx);
        let ref_psi_rad = traj.heading(heading_idx);

        let seg_len_m = (traj.point(idx + 1) - ref_point_m).norm();
        if seg_len_m == 0.0 {
            return Err(TrajCtrlError::DegenerateSegment { idx })
        }

        report.closest_point_idx = idx;
        report.heading_idx = heading_idx;
        report.ref_x_m = ref_point_m[0];
        report.ref_y_m = ref_point_m[1];
        report.ref_psi_rad = ref_psi_rad;

        // ---- ERRORS ----

        report.lat_error_m = calc_lat_error(pos, &ref_point_m, ref_psi_rad);
        report.head_error_rad = calc_head_error(input.pose.heading_rad, ref_psi_rad);
        report.lat_error_saturated = report.lat_error_m.abs() > input.gains.e1_max_m;

        // ---- HEADING RATE FEEDFORWARD ----

        report.d_psi_ref_rad = limit_heading_change(
            traj.heading(idx + 1) - traj.heading(idx)
        );

        let ts_psi_s = seg_len_m / input.speed_ms;
        report.dpsi_ref_rads = report.d_psi_ref_rad / ts_psi_s;

        if !report.dpsi_ref_rads.is_finite() {
            return Err(TrajCtrlError::NonFiniteHeadingRate {
                idx,
                value: report.dpsi_ref_rads
            })
        }

        report.delta_ref_psi_rad = self.filter.step(&input.filter, report.dpsi_ref_rads);
        report.filter_state = self.filter.state();

        // ---- STEER AND ROLL ----

        report.delta_ref_error_rad = steer_from_errors(
            &input.gains, report.lat_error_m, report.head_error_rad
        );

        let delta_ref_rad = report.delta_ref_psi_rad + report.delta_ref_error_rad;
        report.delta_ref_rad = saturate_steer(delta_ref_rad);
        report.steer_saturated = report.delta_ref_rad != delta_ref_rad;

        report.roll_ref_rad = steer_to_roll(&input.bike, report.delta_ref_rad, input.speed_ms);

        trace!("TrajCtrl report: {:?}", report);

        let output = OutputData {
            roll_ref_rad: report.roll_ref_rad,
            closest_point_idx_out: idx - 1
        };

        Ok((output, report))
    }

    /// Current filter state.
    pub fn filter_state(&self) -> f64 {
        self.filter.state()
    }

    /// Reset the filter state to zero, e.g. when a new trajectory is loaded.
    pub fn reset(&mut self) {
        self.filter.reset();
    }
}

#[cfg(test)]
mod test {
    use super::*;

    const BIKE: BikeParams = BikeParams {
        lr_m: 0.4,
        lf_m: 0.6,
        lambda_rad: 1.15
    };

    fn input<'a>(traj: LocalTrajectory<'a>, pose: Pose, gains: TrajGains) -> InputData<'a> {
        InputData {
            traj,
            pose,
            speed_ms: 1.0,
            bike: BIKE,
            gains,
            filter: FilterCoeffs::passthrough()
        }
    }

    fn unit_gains() -> TrajGains {
        TrajGains { k1: 1.0, k2: 1.0, e1_max_m: 1.0 }
    }

    #[test]
    fn test_on_path_straight_line() {
        let buffer = [
            0.0, 1.0, 2.0, 3.0, 4.0,
            0.0, 0.0, 0.0, 0.0, 0.0,
            0.0, 0.0, 0.0, 0.0, 0.0
        ];
        let traj = LocalTrajectory::from_buffer(&buffer, 5).unwrap();
        let mut ctrl = TrajCtrl::new();

        let (out, report) = ctrl
            .proc(&input(traj, Pose::new(0.5, 0.0, 0.0), unit_gains()))
            .unwrap();

        assert_eq!(report.closest_point_idx, 1);
        assert_eq!(report.heading_idx, 1);
        assert!(report.lat_error_m.abs() < 1e-12);
        assert_eq!(report.head_error_rad, 0.0);
        assert_eq!(report.dpsi_ref_rads, 0.0);
        assert_eq!(out.roll_ref_rad, 0.0);
        assert_eq!(out.closest_point_idx_out, 0);
        assert_eq!(ctrl.filter_state(), 0.0);
    }

    #[test]
    fn test_steer_saturation() {
        let x = [0.0, 1.0, 2.0, 3.0, 4.0];
        let y = [0.0; 5];
        let psi = [0.0; 5];
        let traj = LocalTrajectory::from_slices(&x, &y, &psi).unwrap();
        let gains = TrajGains { k1: 10.0, k2: 10.0, e1_max_m: 1.0 };
        let mut ctrl = TrajCtrl::new();

        // Far to the left and pointing left, demand is strongly negative
        let (out, report) = ctrl
            .proc(&input(traj, Pose::new(1.2, 3.0, 0.5), gains))
            .unwrap();
        assert!(report.lat_error_saturated);
        assert!(report.steer_saturated);
        assert_eq!(report.delta_ref_rad, -MAX_STEER_DEM_RAD);
        assert!(out.roll_ref_rad > 0.0);

        // And the mirror image
        let (out, report) = ctrl
            .proc(&input(traj, Pose::new(1.2, -3.0, -0.5), gains))
            .unwrap();
        assert_eq!(report.delta_ref_rad, MAX_STEER_DEM_RAD);
        assert!(out.roll_ref_rad < 0.0);
    }

    #[test]
    fn test_errors_leave_state_untouched() {
        let x = [0.0, 1.0, 2.0, 3.0, 4.0];
        let y = [0.0; 5];
        let psi = [0.0, 0.0, 0.1, 0.2, 0.3];
        let traj = LocalTrajectory::from_slices(&x, &y, &psi).unwrap();
        let coeffs = FilterCoeffs { ad: 0.5, bd: 1.0, c: 1.0, d: 0.0 };
        let mut ctrl = TrajCtrl::new();

        // Prime the filter with a non-zero state
        let mut data = input(traj, Pose::new(1.6, 0.1, 0.1), unit_gains());
        data.filter = coeffs;
        ctrl.proc(&data).unwrap();
        let state = ctrl.filter_state();
        assert!(state != 0.0);

        // Zero and negative speed
        data.speed_ms = 0.0;
        match ctrl.proc(&data) {
            Err(TrajCtrlError::NonPositiveVelocity(_)) => (),
            r => panic!("Expected NonPositiveVelocity, got {:?}", r)
        }
        data.speed_ms = -1.0;
        assert!(ctrl.proc(&data).is_err());
        data.speed_ms = f64::NAN;
        assert!(ctrl.proc(&data).is_err());
        assert_eq!(ctrl.filter_state(), state);

        // Infinite speed would give a zero segment time and a 0/0 rate
        data.speed_ms = f64::INFINITY;
        match ctrl.proc(&data) {
            Err(TrajCtrlError::NonPositiveVelocity(v)) => assert!(v.is_infinite()),
            r => panic!("Expected NonPositiveVelocity, got {:?}", r)
        }
        assert_eq!(ctrl.filter_state(), state);

        // A valid cycle afterwards still gives a finite roll
        data.speed_ms = 1.0;
        let (out, _) = ctrl.proc(&data).unwrap();
        assert!(out.roll_ref_rad.is_finite());
        assert!(ctrl.filter_state().is_finite());
        let state = ctrl.filter_state();

        // Bike exactly on the waypoint before the closest point
        data.speed_ms = 1.0;
        data.pose = Pose::new(0.0, 0.0, 0.0);
        match ctrl.proc(&data) {
            Err(TrajCtrlError::DegenerateGeometry { idx: 0 }) => (),
            r => panic!("Expected DegenerateGeometry, got {:?}", r)
        }
        assert_eq!(ctrl.filter_state(), state);
    }

    #[test]
    fn test_degenerate_segment() {
        let coeffs = FilterCoeffs { ad: 0.5, bd: 1.0, c: 1.0, d: 0.0 };
        let mut ctrl = TrajCtrl::new();

        // Prime the filter on a good window
        let x = [0.0, 1.0, 2.0, 3.0, 4.0];
        let y = [0.0; 5];
        let psi = [0.0, 0.0, 0.1, 0.2, 0.3];
        let traj = LocalTrajectory::from_slices(&x, &y, &psi).unwrap();
        let mut data = input(traj, Pose::new(1.6, 0.1, 0.1), unit_gains());
        data.filter = coeffs;
        ctrl.proc(&data).unwrap();
        let state = ctrl.filter_state();
        assert!(state != 0.0);

        let x = [0.0, 1.0, 1.0, 1.0];
        let y = [0.0; 4];
        let psi = [0.0; 4];
        data.traj = LocalTrajectory::from_slices(&x, &y, &psi).unwrap();
        data.pose = Pose::new(0.2, 0.1, 0.0);

        match ctrl.proc(&data) {
            Err(TrajCtrlError::DegenerateSegment { idx: 2 }) => (),
            r => panic!("Expected DegenerateSegment, got {:?}", r)
        }
        assert_eq!(ctrl.filter_state(), state);
    }

    #[test]
    fn test_nan_heading_rejected() {
        let coeffs = FilterCoeffs { ad: 0.5, bd: 1.0, c: 1.0, d: 0.0 };
        let x = [0.0, 1.0, 2.0, 3.0, 4.0];
        let y = [0.0; 5];
        let psi = [0.0, 0.0, f64::NAN, 0.2, 0.3];
        let traj = LocalTrajectory::from_slices(&x, &y, &psi).unwrap();
        let mut data = input(traj, Pose::new(1.2, 0.1, 0.0), unit_gains());
        data.filter = coeffs;
        let mut ctrl = TrajCtrl::new();

        match ctrl.proc(&data) {
            Err(TrajCtrlError::NonFiniteHeadingRate { idx: 1, .. }) => (),
            r => panic!("Expected NonFiniteHeadingRate, got {:?}", r)
        }
        assert_eq!(ctrl.filter_state(), 0.0);
    }

    #[test]
    fn test_instances_are_independent() {
        let x = [0.0, 1.0, 2.0, 3.0, 4.0];
        let y = [0.0, 0.0, 0.1, 0.3, 0.6];
        let psi = [0.0, 0.05, 0.15, 0.25, 0.35];
        let traj = LocalTrajectory::from_slices(&x, &y, &psi).unwrap();
        let mut data = input(traj, Pose::new(1.1, 0.05, 0.04), unit_gains());
        data.filter = FilterCoeffs { ad: 0.8, bd: 0.2, c: 1.0, d: 0.3 };

        let mut a = TrajCtrl::new();
        let mut b = TrajCtrl::new();

        let first_a = a.proc(&data).unwrap();
        a.proc(&data).unwrap();

        // b has only seen one cycle, so must match a's first cycle
        let first_b = b.proc(&data).unwrap();
        assert_eq!(first_a, first_b);
        assert!(a.filter_state() != b.filter_state());

        a.reset();
        assert_eq!(a.filter_state(), 0.0);
        assert_eq!(a.proc(&data).unwrap(), first_b);
    }

    /// Two consecutive cycles on an arc against a recorded trace, including
    /// the filter state carried between them.
    #[test]
    fn test_regression_trace() {
        const TOL: f64 = 1e-12;

        let radius_m = 10.0;
        let theta: Vec<f64> = (0..8).map(|k| k as f64 * 0.05).collect();
        let x: Vec<f64> = theta.iter().map(|t| radius_m * t.sin()).collect();
        let y: Vec<f64> = theta.iter().map(|t| radius_m * (1.0 - t.cos())).collect();
        let traj = LocalTrajectory::from_slices(&x, &y, &theta).unwrap();

        let mut data = InputData {
            traj,
            pose: Pose::new(1.2, 0.15, 0.08),
            speed_ms: 2.5,
            bike: BikeParams {
                lr_m: 0.4,
                lf_m: 0.6,
                lambda_rad: 66f64.to_radians()
            },
            gains: TrajGains { k1: 0.8, k2: 1.5, e1_max_m: 0.3 },
            filter: FilterCoeffs { ad: 0.9, bd: 0.5, c: 0.2, d: 0.1 }
        };
        let mut ctrl = TrajCtrl::new();

        // ---- Cycle 1 ----
        let (out, report) = ctrl.proc(&data).unwrap();

        assert_eq!(report.closest_point_idx, 2);
        assert_eq!(report.heading_idx, 3);
        assert_eq!(out.closest_point_idx_out, 1);
        assert!((report.lat_error_m - 0.06878172731132741).abs() < TOL);
        assert!((report.head_error_rad - -0.06999999999999984).abs() < TOL);
        assert!((report.dpsi_ref_rads - 0.2500260435656632).abs() < TOL);
        assert!((report.delta_ref_psi_rad - 0.025002604356566323).abs() < TOL);
        assert!((report.delta_ref_error_rad - 0.04997461815093783).abs() < TOL);
        assert!((report.delta_ref_rad - 0.07497722250750416).abs() < TOL);
        assert!((out.roll_ref_rad - -0.04367914469254854).abs() < TOL);
        assert!((ctrl.filter_state() - 0.1250130217828316).abs() < TOL);

        // ---- Cycle 2 ----
        data.pose = Pose::new(1.7, 0.2, 0.12);
        let (out, report) = ctrl.proc(&data).unwrap();

        assert_eq!(report.closest_point_idx, 3);
        assert_eq!(report.heading_idx, 4);
        assert_eq!(out.closest_point_idx_out, 2);
        assert!((report.lat_error_m - 0.04511227875389005).abs() < TOL);
        assert!((report.head_error_rad - -0.08000000000000007).abs() < TOL);
        assert!((report.dpsi_ref_rads - 0.25002604356566344).abs() < TOL);
        assert!((report.delta_ref_psi_rad - 0.050005208713132666).abs() < TOL);
        assert!((report.delta_ref_error_rad - 0.08391017699688806).abs() < TOL);
        assert!((report.delta_ref_rad - 0.13391538571002073).abs() < TOL);
        assert!((out.roll_ref_rad - -0.07817356867510465).abs() < TOL);
        assert!((ctrl.filter_state() - 0.23752474138738017).abs() < TOL);
    }
}
