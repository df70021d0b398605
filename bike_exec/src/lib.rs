//! # Bike trajectory control library
//!
//! Provides the trajectory controller of a self-balancing two wheeled
//! vehicle, along with the types it operates on and a simple kinematic
//! simulation used to exercise it in closed loop.

// ---------------------------------------------------------------------------
// MODULES
// ---------------------------------------------------------------------------

pub mod loc;
pub mod sim;
pub mod traj;
pub mod traj_ctrl;
