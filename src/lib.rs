
//! Motionopt is a trajectory optimization toolbox for articulated mechanisms.
//! Given a dynamics engine for a mechanism (plugged in behind the
//! [`simulation::DynamicsEngine`] trait), it searches for per-joint actuation
//! profiles that bring a designated end-effector to a target position with
//! approximately minimal actuation effort, subject to joint position limits.
//! The trajectory is represented as a low-dimensional clamped B-spline per
//! degree of freedom, so the nonlinear program runs over a handful of control
//! points per joint rather than a full per-time-step trajectory.

pub mod motion;
pub mod motion_optimization;
pub mod optimization;
pub mod simulation;
pub mod utils;
