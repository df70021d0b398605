//! Bike trajectory control simulation executable.
//!
//! # Architecture
//!
//! The general execution methodology consists of:
//!
//!     - Initialise the session and logging
//!     - Load the TrajCtrl and simulation parameters
//!     - Main loop:
//!         - Cut the local trajectory window out of the reference path
//!         - Trajectory control processing
//!         - Kinematic bike step
//!         - Archive the cycle
//!
//! An optional single argument gives the simulation parameter file to use,
//! relative to the params directory, otherwise `bike_sim.toml` is used.

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External
use log::{debug, info};
use std::env;
use color_eyre::{Report, eyre::{WrapErr, eyre}};

// Internal
use bike_lib::{
    sim::{SimParams, SimStatus, Simulation},
    traj_ctrl
};
use util::{
    archive::Archived,
    logger::{logger_init, LevelFilter},
    session::Session
};

// ---------------------------------------------------------------------------
// CONSTANTS
// ---------------------------------------------------------------------------

/// Default simulation parameter file.
const DEFAULT_SIM_PARAMS: &str = "bike_sim.toml";

/// Number of cycles between progress messages.
const PROGRESS_INTERVAL_CYCLES: usize = 250;

// ---------------------------------------------------------------------------
// FUNCTIONS
// ---------------------------------------------------------------------------

/// Executable main function, entry point.
fn main() -> Result<(), Report> {
    color_eyre::install()?;

    // ---- EARLY INITIALISATION ----

    // Initialise session
    let session = Session::new(
        "bike_exec", 
        "sessions"
    ).wrap_err("Failed to create the session")?;

    // Initialise logger
    logger_init(LevelFilter::Debug, &session)
        .wrap_err("Failed to initialise logging")?;

    info!("Bike Trajectory Control Simulation\n");
    info!("Session directory: {:?}\n", session.session_root);

    // ---- LOAD PARAMETERS ----

    let args: Vec<String> = env::args().collect();

    debug!("CLI arguments: {:?}", args);

    let sim_params_path = match args.len() {
        1 => DEFAULT_SIM_PARAMS,
        2 => args[1].as_str(),
        n => return Err(eyre!(
            "Expected either zero or one argument, found {}", n - 1
        ))
    };

    let sim_params: SimParams = util::params::load(sim_params_path)
        .wrap_err("Could not load simulation params")?;
    let ctrl_params = traj_ctrl::Params::load("traj_ctrl.toml")
        .wrap_err("Could not load TrajCtrl params")?;

    info!("Parameters loaded");
    debug!("Simulation: {:#?}", sim_params);
    debug!("TrajCtrl: {:#?}", ctrl_params);

    // ---- INITIALISE SIMULATION ----

    let mut sim = Simulation::new(sim_params, ctrl_params)
        .wrap_err("Failed to initialise the simulation")?;
    sim.init_archives(&session)
        .wrap_err("Failed to initialise the simulation archives")?;

    info!("Simulation initialised\n");

    // ---- MAIN LOOP ----

    loop {
        let status = sim.step().wrap_err("Simulation step failed")?;

        sim.write().wrap_err("Failed to archive the cycle")?;

        if sim.cycle() % PROGRESS_INTERVAL_CYCLES == 0 {
            let bike = sim.bike();
            info!(
                "Cycle {:5}: pos = ({:.3}, {:.3}) m, heading = {:.3} rad, roll = {:.4} rad",
                sim.cycle(),
                bike.pose.position_m[0],
                bike.pose.position_m[1],
                bike.pose.heading_rad,
                bike.roll_rad
            );
        }

        if status == SimStatus::Finished {
            break;
        }
    }

    info!("Simulation finished after {} cycles", sim.cycle());

    if let Some(report) = sim.report() {
        info!(
            "Final errors: lateral = {:.4} m, heading = {:.4} rad",
            report.lat_error_m, report.head_error_rad
        );
    }

    Ok(())
}
