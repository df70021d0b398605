//! # Closed loop simulation
//!
//! Runs the trajectory controller against a kinematic bike model. The balance
//! controller is assumed to track the roll reference perfectly, so the roll
//! reference maps directly onto a yaw rate:
//!
//! ```text
//! psi_dot = -g * tan(roll) / v
//! ```
//!
//! which is the inverse of the steer to roll transform used by TrajCtrl.
//!
//! The simulation also plays the part of the caller that owns the full
//! reference trajectory, cutting a local window out of it each cycle and
//! moving that window along using the controller's index feedback.

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External
use log::{debug, info, warn};
use nalgebra::Vector2;
use serde::{Deserialize, Serialize};
use thiserror::Error;

// Internal
use crate::{
    loc::Pose,
    traj::LocalTrajectory,
    traj_ctrl::{self, InputData, StatusReport, TrajCtrl, TrajCtrlError, GRAVITY_MSS}
};
use util::{
    archive::{ArchiveError, Archived, Archiver},
    maths::sign,
    session::Session
};

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// Parameters of the simulation, as loaded from `bike_sim.toml`.
#[derive(Deserialize, Debug, Clone)]
pub struct SimParams {
    /// Period of one control cycle
    ///
    /// Units: seconds
    pub cycle_period_s: f64,

    /// Constant forward speed of the bike
    ///
    /// Units: meters/second
    pub speed_ms: f64,

    /// Maximum number of cycles to run
    pub num_cycles: usize,

    /// Number of points in the local trajectory window
    pub window_len: usize,

    /// Initial offset of the bike to the left of the first path point
    ///
    /// Units: meters
    pub init_lat_offset_m: f64,

    /// Initial heading offset of the bike from the first path point
    ///
    /// Units: radians
    pub init_head_offset_rad: f64,

    /// The reference path to follow
    pub path: PathSpec
}

/// Specification of a reference path.
#[derive(Deserialize, Serialize, Debug, Clone, Copy, PartialEq)]
#[serde(tag = "type")]
pub enum PathSpec {
    /// A straight line along the X axis
    Straight {
        length_m: f64,
        point_sep_m: f64
    },

    /// A circular arc starting at the origin heading along X. A positive
    /// sweep turns left, a negative one right.
    Arc {
        radius_m: f64,
        sweep_rad: f64,
        point_sep_m: f64
    }
}

/// The full reference trajectory.
#[derive(Debug, Clone, Default)]
pub struct RefPath {
    x_m: Vec<f64>,
    y_m: Vec<f64>,
    psi_rad: Vec<f64>
}

/// Cuts the local window out of the reference path.
#[derive(Debug, Clone, Copy)]
pub struct WindowManager {
    /// Index of the first window point in the reference path
    start: usize,

    /// Number of points in each window
    len: usize
}

/// Kinematic model of the bike.
#[derive(Debug, Clone, Copy)]
pub struct KinematicBike {
    pub pose: Pose,
    pub speed_ms: f64,
    pub roll_rad: f64
}

/// Archived state of the bike each cycle.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct BikeState {
    pub cycle: usize,
    pub sim_time_s: f64,
    pub x_m: f64,
    pub y_m: f64,
    pub heading_rad: f64,
    pub roll_rad: f64,
    pub window_start: usize,
    pub ctrl_ok: bool
}

/// The whole simulation.
pub struct Simulation {
    params: SimParams,
    ctrl_params: traj_ctrl::Params,

    path: RefPath,
    window: WindowManager,
    bike: KinematicBike,
    traj_ctrl: TrajCtrl,

    cycle: usize,
    state: Option<BikeState>,
    arch_state: Archiver,
    report: Option<StatusReport>,
    arch_report: Archiver
}

// ---------------------------------------------------------------------------
// ENUMERATIONS
// ---------------------------------------------------------------------------

/// Errors which can occur in the simulation.
#[derive(Debug, Error)]
pub enum SimError {
    #[error("Point separation must be positive, found {0} m")]
    InvalidPointSep(f64),

    #[error("Path has {num_points} points, at least {window_len} are needed to fill a window")]
    PathTooShort {
        num_points: usize,
        window_len: usize
    },

    #[error("Window of {0} points is shorter than the minimum of {}", traj_ctrl::MIN_WINDOW_LEN)]
    WindowTooShort(usize),

    #[error("Could not build the local trajectory: {0}")]
    WindowError(TrajCtrlError),

    #[error("Could not archive simulation data: {0}")]
    ArchiveError(ArchiveError)
}

/// Status of the simulation after a step.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum SimStatus {
    Running,
    Finished
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl RefPath {
    /// Generate the path from its specification.
    pub fn from_spec(spec: &PathSpec) -> Result<Self, SimError> {
        let mut path = Self::default();

        match *spec {
            PathSpec::Straight { length_m, point_sep_m } => {
                if !(point_sep_m > 0.0) {
                    return Err(SimError::InvalidPointSep(point_sep_m))
                }

                let num_points = (length_m / point_sep_m).floor() as usize + 1;

                for i in 0..num_points {
                    path.push(i as f64 * point_sep_m, 0.0, 0.0);
                }
            },
            PathSpec::Arc { radius_m, sweep_rad, point_sep_m } => {
                if !(point_sep_m > 0.0) {
                    return Err(SimError::InvalidPointSep(point_sep_m))
                }

                // Left turns have their centre on +Y, right turns on -Y
                let side = sign(sweep_rad);
                let step_rad = point_sep_m / radius_m;
                let num_points = (sweep_rad.abs() / step_rad).floor() as usize + 1;

                for i in 0..num_points {
                    let theta = i as f64 * step_rad;
                    path.push(
                        radius_m * theta.sin(),
                        side * radius_m * (1.0 - theta.cos()),
                        side * theta
                    );
                }
            }
        }

        Ok(path)
    }

    fn push(&mut self, x_m: f64, y_m: f64, psi_rad: f64) {
        self.x_m.push(x_m);
        self.y_m.push(y_m);
        self.psi_rad.push(psi_rad);
    }

    /// Number of points in the path.
    pub fn num_points(&self) -> usize {
        self.x_m.len()
    }

    /// Pose at the given path point.
    pub fn pose(&self, index: usize) -> Pose {
        Pose::new(self.x_m[index], self.y_m[index], self.psi_rad[index])
    }
}

impl WindowManager {
    /// Create a new window of `len` points at the start of the path.
    pub fn new(len: usize) -> Result<Self, SimError> {
        if len < traj_ctrl::MIN_WINDOW_LEN {
            return Err(SimError::WindowTooShort(len))
        }

        Ok(Self { start: 0, len })
    }

    /// Index of the first window point in the path.
    pub fn start(&self) -> usize {
        self.start
    }

    /// Pack the current window of `path` into a `[X.., Y.., Psi..]` buffer.
    pub fn buffer(&self, path: &RefPath) -> Result<Vec<f64>, SimError> {
        let range = self.start..(self.start + self.len);

        let window = LocalTrajectory::from_slices(
            &path.x_m[range.clone()],
            &path.y_m[range.clone()],
            &path.psi_rad[range]
        ).map_err(SimError::WindowError)?;

        Ok(window.to_buffer())
    }

    /// Move the window along by the controller's index feedback, stopping
    /// at the end of the path.
    pub fn advance(&mut self, closest_point_idx_out: usize, path: &RefPath) {
        let last_start = path.num_points() - self.len;
        self.start = (self.start + closest_point_idx_out).min(last_start);
    }

    /// True if the window is at the end of the path and the tracked point is
    /// the last one the controller can select.
    pub fn is_at_end(&self, closest_point_idx_out: usize, path: &RefPath) -> bool {
        self.start + self.len == path.num_points()
            && closest_point_idx_out + 1 >= self.len - 2
    }
}

impl KinematicBike {
    /// Step the bike forward by `dt_s` with the given roll.
    pub fn step(&mut self, roll_rad: f64, dt_s: f64) {
        self.roll_rad = roll_rad;

        let yaw_rate_rads = -GRAVITY_MSS * roll_rad.tan() / self.speed_ms;

        let forward: Vector2<f64> = self.pose.forward2();
        self.pose.position_m += forward * (self.speed_ms * dt_s);
        self.pose.heading_rad += yaw_rate_rads * dt_s;
    }
}

impl Simulation {
    /// Build the simulation from its parameters.
    ///
    /// The bike starts at the first path point, offset by the initial lateral
    /// and heading offsets.
    pub fn new(params: SimParams, ctrl_params: traj_ctrl::Params) -> Result<Self, SimError> {
        let path = RefPath::from_spec(&params.path)?;
        let window = WindowManager::new(params.window_len)?;

        if path.num_points() < params.window_len {
            return Err(SimError::PathTooShort {
                num_points: path.num_points(),
                window_len: params.window_len
            })
        }

        let start = path.pose(0);
        let left = Vector2::new(-start.heading_rad.sin(), start.heading_rad.cos());
        let pose = Pose {
            position_m: start.position_m + left * params.init_lat_offset_m,
            heading_rad: start.heading_rad + params.init_head_offset_rad
        };

        info!(
            "Simulation path has {} points, window of {}",
            path.num_points(), params.window_len
        );

        Ok(Self {
            bike: KinematicBike {
                pose,
                speed_ms: params.speed_ms,
                roll_rad: 0.0
            },
            params,
            ctrl_params,
            path,
            window,
            traj_ctrl: TrajCtrl::new(),
            cycle: 0,
            state: None,
            arch_state: Archiver::default(),
            report: None,
            arch_report: Archiver::default()
        })
    }

    /// Open the archive files within the session.
    pub fn init_archives(&mut self, session: &Session) -> Result<(), SimError> {
        self.arch_state = Archiver::from_path(session, "sim/bike_state.csv")
            .map_err(SimError::ArchiveError)?;
        self.arch_report = Archiver::from_path(session, "traj_ctrl/status_report.csv")
            .map_err(SimError::ArchiveError)?;

        Ok(())
    }

    /// Run one control cycle and advance the bike.
    pub fn step(&mut self) -> Result<SimStatus, SimError> {
        if self.cycle >= self.params.num_cycles {
            return Ok(SimStatus::Finished)
        }

        let buffer = self.window.buffer(&self.path)?;
        let traj = LocalTrajectory::from_buffer(&buffer, self.params.window_len)
            .map_err(SimError::WindowError)?;

        let input = InputData {
            traj,
            pose: self.bike.pose,
            speed_ms: self.bike.speed_ms,
            bike: self.ctrl_params.bike,
            gains: self.ctrl_params.gains,
            filter: self.ctrl_params.filter
        };

        let mut status = SimStatus::Running;

        let (roll_ref_rad, ctrl_ok) = match self.traj_ctrl.proc(&input) {
            Ok((output, report)) => {
                self.report = Some(report);

                if self.window.is_at_end(output.closest_point_idx_out, &self.path) {
                    status = SimStatus::Finished;
                }
                self.window.advance(output.closest_point_idx_out, &self.path);

                (output.roll_ref_rad, true)
            },
            Err(e) => {
                // The bike keeps moving so the next cycle's inputs change
                warn!("TrajCtrl rejected cycle {}: {}", self.cycle, e);
                self.report = None;
                (0.0, false)
            }
        };

        self.bike.step(roll_ref_rad, self.params.cycle_period_s);

        self.state = Some(BikeState {
            cycle: self.cycle,
            sim_time_s: self.cycle as f64 * self.params.cycle_period_s,
            x_m: self.bike.pose.position_m[0],
            y_m: self.bike.pose.position_m[1],
            heading_rad: self.bike.pose.heading_rad,
            roll_rad: self.bike.roll_rad,
            window_start: self.window.start(),
            ctrl_ok
        });

        self.cycle += 1;

        if status == SimStatus::Finished {
            debug!("End of path reached after {} cycles", self.cycle);
        }

        Ok(status)
    }

    /// The simulated bike.
    pub fn bike(&self) -> &KinematicBike {
        &self.bike
    }

    /// Status report of the last cycle, if the controller accepted it.
    pub fn report(&self) -> Option<&StatusReport> {
        self.report.as_ref()
    }

    /// Number of cycles run so far.
    pub fn cycle(&self) -> usize {
        self.cycle
    }
}

impl Archived for Simulation {
    fn write(&mut self) -> Result<(), ArchiveError> {
        if let Some(ref state) = self.state {
            self.arch_state.serialise(state)?;
        }
        if let Some(ref report) = self.report {
            self.arch_report.serialise(report)?;
        }

        Ok(())
    }
}
